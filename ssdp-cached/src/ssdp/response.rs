use std::net::IpAddr;
use shared::protocol::SERVER_ID;
use shared::types::DeviceRecord;

/// A device is never reported back to the address it was learned from.
pub fn should_answer(device: &DeviceRecord, requester: IpAddr) -> bool {
    device.source != requester
}

/// Render a cached device as a search response.
/// Only LOCATION, ST and USN are carried over from the announcement.
pub fn render(device: &DeviceRecord, max_age_secs: u64) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         LOCATION: {}\r\n\
         SERVER: {}\r\n\
         CACHE-CONTROL: max-age={}\r\n\
         EXT:\r\n\
         ST: {}\r\n\
         USN: {}\r\n\
         \r\n",
        device.location, SERVER_ID, max_age_secs, device.service_type, device.usn,
    )
}
