use std::net::IpAddr;
use std::thread;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, oneshot};
use anyhow::Result;
use shared::types::DeviceRecord;
use crate::cache::registry::{Registry, Upsert};
use crate::cache::scheduler::Scheduler;
use crate::ssdp::message::{Announcement, Liveness};
use crate::ssdp::response;

/// What an announcement did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Refreshed,
    Removed,
    Ignored,
    /// New device dropped because the registry could not grow
    Dropped,
}

/// Everything a search handler needs, taken under one lock
#[derive(Debug, Clone)]
pub struct SearchPlan {
    /// Sweep ran; the caller owes the network a discovery broadcast
    pub rediscover: bool,
    /// Devices to answer with, already filtered for the requester
    pub devices: Vec<DeviceRecord>,
}

/// Registry behaviour knobs
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub ignore_byebye: bool,
}

/// Commands sent to the cache thread
pub enum CacheCommand {
    Announce {
        announcement: Announcement,
        source: IpAddr,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Applied>,
    },
    Search {
        requester: IpAddr,
        now: DateTime<Utc>,
        reply: oneshot::Sender<SearchPlan>,
    },
    GetAll(oneshot::Sender<Vec<DeviceRecord>>),
    GetByType(String, oneshot::Sender<Vec<DeviceRecord>>),
    GetOne(String, oneshot::Sender<Option<DeviceRecord>>),
    Shutdown,
}

/// Handle to the cache thread. Every command runs to completion before the
/// next one starts, so each message's lookup-then-mutate is atomic.
#[derive(Clone)]
pub struct CacheHandle {
    tx: mpsc::Sender<CacheCommand>,
}

impl CacheHandle {
    /// Spawn the cache thread, which owns the registry and the scheduler
    pub fn spawn(
        mut registry: Registry,
        mut scheduler: Scheduler,
        policy: CachePolicy,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<CacheCommand>(256);

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    CacheCommand::Announce { announcement, source, now, reply } => {
                        let applied = apply(&mut registry, &announcement, source, now, policy);
                        let _ = reply.send(applied);
                    }
                    CacheCommand::Search { requester, now, reply } => {
                        let rediscover = scheduler.poll(now);
                        if rediscover {
                            let expired = registry.sweep_expired(now, policy.ttl);
                            for usn in &expired {
                                tracing::debug!("[{}] Timed out, removing", usn);
                            }
                            if !expired.is_empty() {
                                tracing::info!(
                                    "Swept {} expired devices, {} remain",
                                    expired.len(),
                                    registry.len()
                                );
                            }
                        }
                        let devices = registry
                            .iter()
                            .filter(|device| response::should_answer(device, requester))
                            .cloned()
                            .collect();
                        let _ = reply.send(SearchPlan { rediscover, devices });
                    }
                    CacheCommand::GetAll(reply) => {
                        let _ = reply.send(registry.iter().cloned().collect());
                    }
                    CacheCommand::GetByType(service_type, reply) => {
                        let devices = registry
                            .iter()
                            .filter(|device| device.service_type == service_type)
                            .cloned()
                            .collect();
                        let _ = reply.send(devices);
                    }
                    CacheCommand::GetOne(usn, reply) => {
                        let _ = reply.send(registry.find(&usn).cloned());
                    }
                    CacheCommand::Shutdown => {
                        tracing::info!("Cache thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Apply an alive or byebye announcement
    pub async fn announce(
        &self,
        announcement: Announcement,
        source: IpAddr,
        now: DateTime<Utc>,
    ) -> Result<Applied> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::Announce { announcement, source, now, reply }).await?;
        Ok(rx.await?)
    }

    /// Run the scheduler check and snapshot the devices to answer `requester` with
    pub async fn search(&self, requester: IpAddr, now: DateTime<Utc>) -> Result<SearchPlan> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::Search { requester, now, reply }).await?;
        Ok(rx.await?)
    }

    /// Get all devices
    pub async fn get_all(&self) -> Result<Vec<DeviceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::GetAll(reply)).await?;
        Ok(rx.await?)
    }

    /// Get devices by service type
    pub async fn get_by_type(&self, service_type: String) -> Result<Vec<DeviceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::GetByType(service_type, reply)).await?;
        Ok(rx.await?)
    }

    /// Get a single device by usn
    pub async fn get_one(&self, usn: String) -> Result<Option<DeviceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::GetOne(usn, reply)).await?;
        Ok(rx.await?)
    }

    /// Shutdown the cache thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(CacheCommand::Shutdown).await?;
        Ok(())
    }
}

/// Announcement transitions:
///
/// | known | liveness | action                                   |
/// |-------|----------|------------------------------------------|
/// | no    | alive    | insert                                   |
/// | no    | byebye   | nothing                                  |
/// | yes   | alive    | refresh last_seen                        |
/// | yes   | byebye   | remove, unless byebye is being ignored   |
fn apply(
    registry: &mut Registry,
    announcement: &Announcement,
    source: IpAddr,
    now: DateTime<Utc>,
    policy: CachePolicy,
) -> Applied {
    let usn = announcement.usn.as_str();

    match announcement.liveness {
        Liveness::Alive => {
            match registry.upsert_alive(
                usn,
                &announcement.service_type,
                &announcement.location,
                source,
                now,
            ) {
                Upsert::Inserted => {
                    tracing::debug!(
                        "[{}] Device is now alive, location: {}, type: {}",
                        usn,
                        announcement.location,
                        announcement.service_type
                    );
                    Applied::Inserted
                }
                Upsert::Refreshed => Applied::Refreshed,
                Upsert::Ignored => Applied::Ignored,
                Upsert::OutOfMemory => {
                    tracing::warn!("[{}] Out of memory, dropping new device", usn);
                    Applied::Dropped
                }
            }
        }
        Liveness::ByeBye => {
            if registry.find(usn).is_none() {
                return Applied::Ignored;
            }
            tracing::debug!("[{}] Device is down", usn);
            if policy.ignore_byebye {
                return Applied::Ignored;
            }
            registry.remove(usn);
            Applied::Removed
        }
    }
}
