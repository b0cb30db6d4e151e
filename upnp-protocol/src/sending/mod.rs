//! Handlers for messages we originate.

mod action;
mod event;
mod notification;
mod search;
mod subscription;

pub use action::SendingAction;
pub use event::{evented_values, SendingEvent};
pub use notification::SendingNotification;
pub use search::SendingSearch;
pub use subscription::{SendingRenewal, SendingSubscribe, SendingUnsubscribe};
