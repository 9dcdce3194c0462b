use std::net::IpAddr;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// A cached SSDP advertisement.
/// Shared between the relay daemon and its inspection API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Unique service name, the cache key
    pub usn: String,

    /// NT from announcements, ST from search responses
    pub service_type: String,

    /// Description URL, forwarded untouched
    pub location: String,

    /// Address the first announcement arrived from
    pub source: IpAddr,

    /// First time this device was seen
    pub first_seen: DateTime<Utc>,

    /// Last alive announcement or search response for this usn
    pub last_seen: DateTime<Utc>,
}
