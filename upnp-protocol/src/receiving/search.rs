use std::thread;
use std::time::Duration;

use rand::Rng;
use upnp_discovery::ssdp::{self, MAN_DISCOVER};
use upnp_discovery::{IncomingDatagramMessage, NotificationType, OutgoingDatagramMessage};
use upnp_model::header;

use crate::context::ProtocolContext;
use crate::error::Result;
use crate::protocol::AsyncProtocol;

/// Longest response delay honored, whatever MX asks for
const MAX_MX_SECONDS: u32 = 5;

/// Inbound M-SEARCH: answer for every advertised local device
pub struct ReceivingSearch {
    ctx: ProtocolContext,
    datagram: IncomingDatagramMessage,
}

impl ReceivingSearch {
    pub fn new(ctx: ProtocolContext, datagram: IncomingDatagramMessage) -> Self {
        Self { ctx, datagram }
    }

    fn target(&self) -> Option<NotificationType> {
        let man = self.datagram.headers.get(header::MAN)?;
        if man.trim().trim_matches('"') != MAN_DISCOVER.trim_matches('"') {
            tracing::debug!("Ignoring M-SEARCH with MAN {} from {}", man, self.datagram.source);
            return None;
        }
        let raw = self.datagram.search_target()?;
        match raw.parse() {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::debug!("Ignoring M-SEARCH for unsupported target {}: {}", raw, e);
                None
            }
        }
    }

    fn response_delay(&self) -> Duration {
        let mx = self
            .datagram
            .mx()
            .unwrap_or(self.ctx.config().search_mx)
            .min(MAX_MX_SECONDS);
        if mx == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..u64::from(mx) * 1000))
    }
}

impl AsyncProtocol for ReceivingSearch {
    fn name(&self) -> &'static str {
        "ReceivingSearch"
    }

    fn execute(self: Box<Self>) -> Result<()> {
        let Some(target) = self.target() else {
            return Ok(());
        };

        let devices = self.ctx.registry.advertised_local_devices();
        if devices.is_empty() {
            return Ok(());
        }

        thread::sleep(self.response_delay());

        for device in devices {
            let Some(location) = self
                .ctx
                .descriptor_location(device.udn(), self.datagram.local_address)
            else {
                tracing::warn!("No stream server address to answer search for {}", device.udn());
                continue;
            };
            for (search_target, usn) in ssdp::search_responses(&device, &target) {
                let response = OutgoingDatagramMessage::search_response(
                    self.datagram.source,
                    &search_target,
                    &usn,
                    &location,
                    device.identity.max_age_seconds,
                    self.ctx.server_token(),
                );
                self.ctx.router.send_datagram(&response)?;
            }
        }
        Ok(())
    }
}

