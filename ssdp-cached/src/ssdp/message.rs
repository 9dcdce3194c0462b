use shared::protocol::{NOTIFY_PREFIX, RESPONSE_PREFIX, SEARCH_PREFIX};

/// Notification subtype of an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    ByeBye,
}

/// A NOTIFY announcement or a search response, reduced to what the cache keeps.
/// Missing headers are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub liveness: Liveness,
    pub usn: String,
    pub service_type: String,
    pub location: String,
}

/// Classified inbound datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Announcement(Announcement),
    Search,
    Unrecognized,
}

/// Classify a raw datagram by its request line and extract the cached fields.
pub fn parse(datagram: &[u8]) -> Message {
    let text = String::from_utf8_lossy(datagram);

    if text.starts_with(NOTIFY_PREFIX) || text.starts_with(RESPONSE_PREFIX) {
        Message::Announcement(parse_announcement(&text))
    } else if text.starts_with(SEARCH_PREFIX) {
        Message::Search
    } else {
        Message::Unrecognized
    }
}

fn parse_announcement(text: &str) -> Announcement {
    // Anything other than an explicit byebye counts as alive
    let liveness = match header(text, "nts") {
        Some(nts) if nts.to_ascii_lowercase().starts_with("ssdp:byebye") => Liveness::ByeBye,
        _ => Liveness::Alive,
    };

    // NT in NOTIFY, ST in search responses
    let service_type = header(text, "nt").or_else(|| header(text, "st"));

    Announcement {
        liveness,
        usn: header(text, "usn").unwrap_or_default().to_string(),
        service_type: service_type.unwrap_or_default().to_string(),
        location: header(text, "location").unwrap_or_default().to_string(),
    }
}

/// Value of the first header whose whole name matches `name`, ignoring case.
/// Leading blanks are skipped and the value ends at the first carriage return.
fn header<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.split('\n')
        .skip(1)
        .take_while(|line| !line.trim_end_matches('\r').is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| {
            let value = value.trim_start_matches([' ', '\t']);
            value.split('\r').next().unwrap_or_default()
        })
}
