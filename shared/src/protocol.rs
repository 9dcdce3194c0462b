use std::net::Ipv4Addr;

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP port
pub const SSDP_PORT: u16 = 1900;

/// Value of the SERVER header on every reply the cache sends
pub const SERVER_ID: &str = "UPnP Cache";

/// Advertised CACHE-CONTROL max-age, in seconds
pub const DEFAULT_MAX_AGE_SECS: u64 = 1800;

/// Records not refreshed for this long are dropped
pub const DEFAULT_TTL_SECS: u64 = 12 * 3600;

/// Minimum gap between two sweep-and-rediscover cycles
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1800;

/// Active discovery request, asks every device on the segment to answer
pub const DISCOVERY_MESSAGE: &str = "M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:1900\r\n\
MAN: \"ssdp:discover\"\r\n\
MX: 5\r\n\
ST: ssdp:all\r\n\
\r\n";

/// Request-line prefixes used to classify inbound datagrams
pub const NOTIFY_PREFIX: &str = "NOTIFY ";
pub const RESPONSE_PREFIX: &str = "HTTP/1.1 200";
pub const SEARCH_PREFIX: &str = "M-SEARCH ";

/// API path prefix
pub const API_PREFIX: &str = "/v1";
