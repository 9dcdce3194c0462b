use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use shared::protocol::DISCOVERY_MESSAGE;
use crate::cache_manager::{Applied, CacheHandle};
use crate::ssdp::message::{self, Message};
use crate::ssdp::response;
use crate::transport::Transport;

/// First pause after a failed receive; doubles up to RECV_BACKOFF_MAX
const RECV_BACKOFF_START: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// The loop gives up once this many receives fail in a row
const MAX_RECV_FAILURES: u32 = 20;

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Advertised CACHE-CONTROL max-age on replies
    pub max_age_secs: u64,
    /// Where discovery broadcasts go
    pub multicast_dest: SocketAddr,
    pub recv_buffer: usize,
}

/// Dispatch core: turns inbound datagrams into cache updates and replies.
/// Each datagram is handled on its own task; sends are best effort.
#[derive(Clone)]
pub struct Relay {
    transport: Arc<dyn Transport>,
    cache: CacheHandle,
    settings: Arc<RelaySettings>,
}

impl Relay {
    pub fn new(transport: Arc<dyn Transport>, cache: CacheHandle, settings: RelaySettings) -> Self {
        Self {
            transport,
            cache,
            settings: Arc::new(settings),
        }
    }

    /// Send the discovery request once out of every interface
    pub async fn discover(&self) {
        tracing::debug!("Sending out M-SEARCH");
        for iface in self.transport.interfaces() {
            tracing::debug!("Sending M-SEARCH via {}", iface);
            if let Err(e) = self
                .transport
                .send_on(iface, DISCOVERY_MESSAGE.as_bytes(), self.settings.multicast_dest)
                .await
            {
                tracing::debug!("Failed to send M-SEARCH via {}: {}", iface, e);
            }
        }
    }

    /// Handle one parsed datagram from `from`
    pub async fn handle(&self, message: Message, from: SocketAddr) {
        match message {
            Message::Announcement(announcement) => {
                match self.cache.announce(announcement, from.ip(), Utc::now()).await {
                    Ok(Applied::Dropped) => {
                        tracing::warn!("Dropped announcement from {}", from);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("Failed to apply announcement: {}", e);
                    }
                }
            }
            Message::Search => self.answer(from).await,
            Message::Unrecognized => {}
        }
    }

    async fn answer(&self, requester: SocketAddr) {
        tracing::debug!("Received M-SEARCH request from {}", requester);

        let plan = match self.cache.search(requester.ip(), Utc::now()).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!("Failed to read cache: {}", e);
                return;
            }
        };

        if plan.rediscover {
            self.discover().await;
        }

        for device in &plan.devices {
            let payload = response::render(device, self.settings.max_age_secs);
            if let Err(e) = self.transport.send_to(payload.as_bytes(), requester).await {
                tracing::debug!("[{}] Failed to answer {}: {}", device.usn, requester, e);
            }
        }
    }

    /// Receive loop. Runs until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        tracing::info!("Relay listening");
        let mut buf = vec![0u8; self.settings.recv_buffer];
        let mut failures = 0u32;
        let mut backoff = RECV_BACKOFF_START;

        loop {
            tokio::select! {
                received = self.transport.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => {
                            failures = 0;
                            backoff = RECV_BACKOFF_START;
                            let message = message::parse(&buf[..len]);
                            if message == Message::Unrecognized {
                                tracing::trace!("Ignoring datagram from {}", from);
                                continue;
                            }
                            let relay = self.clone();
                            tokio::spawn(async move {
                                relay.handle(message, from).await;
                            });
                        }
                        Err(e) => {
                            failures += 1;
                            if failures >= MAX_RECV_FAILURES {
                                bail!("Giving up after {} failed receives: {}", failures, e);
                            }
                            tracing::warn!("Failed to receive datagram: {}", e);
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = cancel.cancelled() => {
                                    tracing::info!("Relay shutting down");
                                    break;
                                }
                            }
                            backoff = (backoff * 2).min(RECV_BACKOFF_MAX);
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
