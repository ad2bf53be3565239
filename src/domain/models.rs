use chrono::NaiveDateTime;
use serde::Serialize;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event type as reported by a device. Values outside `entry`/`exit` are kept
/// verbatim so they can be stored and listed without being rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    Entry,
    Exit,
    Other(String),
}

impl EventType {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "entry" => Self::Entry,
            "exit" => Self::Exit,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device_id: i64,
    pub created_at: NaiveDateTime,
    pub event_type: EventType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceEvent {
    pub device_id: i64,
    pub created_at: NaiveDateTime,
    pub event_type: EventType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub device_id: i64,
    pub client_id: Option<i64>,
    pub name: String,
    pub mac_address: String,
    pub location: String,
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{EventType, format_timestamp};

    #[test]
    fn keeps_unknown_event_types_verbatim() {
        assert_eq!(EventType::from_raw("entry"), EventType::Entry);
        assert_eq!(EventType::from_raw("exit"), EventType::Exit);
        assert_eq!(
            EventType::from_raw("Entry"),
            EventType::Other("Entry".to_string())
        );
        assert_eq!(EventType::from_raw("tailgate").as_str(), "tailgate");
    }

    #[test]
    fn formats_timestamps_with_second_resolution() {
        let timestamp = NaiveDate::from_ymd_opt(2020, 2, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 3))
            .expect("valid timestamp");
        assert_eq!(format_timestamp(&timestamp), "2020-02-09 07:05:03");
    }
}
