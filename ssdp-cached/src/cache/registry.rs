use std::collections::HashMap;
use std::net::IpAddr;
use chrono::{DateTime, Duration, Utc};
use shared::types::DeviceRecord;

/// Result of recording an alive announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// New usn, record created
    Inserted,
    /// Known usn, last_seen moved forward; location and type kept as first seen
    Refreshed,
    /// Empty usn, nothing stored
    Ignored,
    /// Could not grow the map; the registry is unchanged
    OutOfMemory,
}

/// In-memory device cache keyed by usn
#[derive(Debug, Default)]
pub struct Registry {
    devices: HashMap<String, DeviceRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, usn: &str) -> Option<&DeviceRecord> {
        self.devices.get(usn)
    }

    /// Refresh a known device or insert a new one.
    pub fn upsert_alive(
        &mut self,
        usn: &str,
        service_type: &str,
        location: &str,
        source: IpAddr,
        now: DateTime<Utc>,
    ) -> Upsert {
        if usn.is_empty() {
            return Upsert::Ignored;
        }

        if let Some(device) = self.devices.get_mut(usn) {
            if now > device.last_seen {
                device.last_seen = now;
            }
            return Upsert::Refreshed;
        }

        // Reserve before building the record so a failure leaves the map as it was
        if self.devices.try_reserve(1).is_err() {
            return Upsert::OutOfMemory;
        }

        self.devices.insert(
            usn.to_string(),
            DeviceRecord {
                usn: usn.to_string(),
                service_type: service_type.to_string(),
                location: location.to_string(),
                source,
                first_seen: now,
                last_seen: now,
            },
        );
        Upsert::Inserted
    }

    pub fn remove(&mut self, usn: &str) -> Option<DeviceRecord> {
        self.devices.remove(usn)
    }

    /// Drop every device whose last_seen + ttl is before `now`.
    /// A deadline past the end of time never expires. Returns the removed usns.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>, ttl: Duration) -> Vec<String> {
        let mut expired = Vec::new();
        self.devices.retain(|usn, device| {
            let keep = match device.last_seen.checked_add_signed(ttl) {
                Some(deadline) => deadline >= now,
                None => true,
            };
            if !keep {
                expired.push(usn.clone());
            }
            keep
        });
        expired
    }

    /// All cached devices, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
