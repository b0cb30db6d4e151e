//! Background thread that runs the registry maintenance sweep.

use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::registry::Registry;

/// Calls [`Registry::maintain`] every `interval` until stopped or the registry is dropped
pub struct RegistryMaintainer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl RegistryMaintainer {
    pub fn start(registry: Weak<Registry>, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("upnp-registry-maintainer".to_string())
            .spawn(move || {
                tracing::debug!("Registry maintainer running every {:?}", interval);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => match registry.upgrade() {
                            Some(registry) => registry.maintain(),
                            None => break,
                        },
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Registry maintainer stopped");
            })?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for the current sweep to finish
    pub fn stop(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                tracing::error!("Registry maintainer thread panicked");
            }
        }
    }
}

impl Drop for RegistryMaintainer {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
    }
}
