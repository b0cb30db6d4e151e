use std::sync::Arc;
use std::thread;

use upnp_discovery::ssdp::advertisement_usns;
use upnp_discovery::{NotificationSubtype, OutgoingDatagramMessage};
use upnp_model::Device;

use crate::context::ProtocolContext;
use crate::error::{ProtocolError, Result};
use crate::protocol::AsyncProtocol;

/// `NOTIFY` alive or byebye for every entry of a local device tree, repeated as configured
pub struct SendingNotification {
    ctx: ProtocolContext,
    device: Arc<Device>,
    subtype: NotificationSubtype,
}

impl SendingNotification {
    pub fn alive(ctx: ProtocolContext, device: Arc<Device>) -> Self {
        Self {
            ctx,
            device,
            subtype: NotificationSubtype::Alive,
        }
    }

    pub fn byebye(ctx: ProtocolContext, device: Arc<Device>) -> Self {
        Self {
            ctx,
            device,
            subtype: NotificationSubtype::ByeBye,
        }
    }

    fn messages(&self) -> Result<Vec<OutgoingDatagramMessage>> {
        let usns = advertisement_usns(&self.device);
        match self.subtype {
            NotificationSubtype::ByeBye => Ok(usns.iter().map(OutgoingDatagramMessage::byebye).collect()),
            NotificationSubtype::Alive => {
                let location = self.ctx.descriptor_location(self.device.udn(), None).ok_or_else(|| {
                    ProtocolError::Failed(format!("no stream server address to advertise {}", self.device.udn()))
                })?;
                let max_age = self.device.identity.max_age_seconds;
                Ok(usns
                    .iter()
                    .map(|usn| OutgoingDatagramMessage::alive(usn, &location, max_age, self.ctx.server_token()))
                    .collect())
            }
        }
    }
}

impl AsyncProtocol for SendingNotification {
    fn name(&self) -> &'static str {
        match self.subtype {
            NotificationSubtype::Alive => "SendingNotificationAlive",
            NotificationSubtype::ByeBye => "SendingNotificationByebye",
        }
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let messages = self.messages()?;
        let config = self.ctx.config();
        tracing::debug!(
            "Sending {} {} notification(s) for {}",
            messages.len(),
            self.subtype.as_str(),
            self.device.udn()
        );
        for round in 0..config.notification_bulk_repeats.max(1) {
            if round > 0 {
                thread::sleep(config.notification_bulk_interval);
            }
            for message in &messages {
                self.ctx.router.send_datagram(message)?;
            }
        }
        Ok(())
    }
}
