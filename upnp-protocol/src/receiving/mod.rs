//! Handlers for messages other control points and devices send us.

mod action;
mod event;
mod notification;
mod retrieval;
mod search;
mod subscribe;

pub use action::ReceivingAction;
pub use event::ReceivingEvent;
pub use notification::{ReceivingNotification, ReceivingSearchResponse};
pub use retrieval::ReceivingRetrieval;
pub use search::ReceivingSearch;
pub use subscribe::{ReceivingSubscribe, ReceivingUnsubscribe};
