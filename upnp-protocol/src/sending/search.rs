use std::thread;

use upnp_discovery::{NotificationType, OutgoingDatagramMessage};

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;

/// Multicast M-SEARCH, repeated as configured
pub struct SendingSearch {
    ctx: ProtocolContext,
    target: NotificationType,
    mx: u32,
}

impl SendingSearch {
    pub fn new(ctx: ProtocolContext, target: NotificationType, mx: u32) -> Self {
        Self { ctx, target, mx }
    }
}

impl AsyncProtocol for SendingSearch {
    fn name(&self) -> &'static str {
        "SendingSearch"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let config = self.ctx.config();
        let message = OutgoingDatagramMessage::search(&self.target, self.mx, self.ctx.server_token());
        tracing::debug!("Searching for {} (MX {})", self.target, self.mx);
        for round in 0..config.search_bulk_repeats.max(1) {
            if round > 0 {
                thread::sleep(config.search_bulk_interval);
            }
            self.ctx.router.send_datagram(&message)?;
        }
        Ok(())
    }
}
