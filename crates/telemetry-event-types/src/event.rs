//! Decoded peripheral events and the payload posted to the collector.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal identifier decoded from the peripheral (e.g. `"B"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCode(String);

impl EventCode {
    /// Build a code from a decoded tag. Surrounding whitespace and control
    /// characters are stripped; `None` if nothing is left.
    pub fn new(tag: &str) -> Option<Self> {
        let trimmed = tag.trim_matches(|c: char| c.is_whitespace() || c.is_control());
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn category(&self) -> SignalCategory {
        SignalCategory::from_code(self)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation class of a signal, as shown by the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SignalCategory {
    Blue,
    Red,
    Green,
    /// Any tag outside the known set. Still reported to the collector.
    #[default]
    Unclassified,
}

impl SignalCategory {
    pub fn from_code(code: &EventCode) -> Self {
        match code.as_str() {
            "B" => Self::Blue,
            "R" => Self::Red,
            "G" => Self::Green,
            _ => Self::Unclassified,
        }
    }

    pub fn color_name(&self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Green => "green",
            Self::Unclassified => "white",
        }
    }
}

/// One decoded telemetry event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "event")]
    event_code: EventCode,
    #[serde(rename = "ts", with = "iso_millis")]
    timestamp: DateTime<Utc>,
    /// `<code>_<unix millis>`; the collector pairs auxiliary uploads with it.
    #[serde(rename = "img_id")]
    correlation_tag: String,
}

impl EventRecord {
    /// Build a record decoded at `decoded_at`, truncated to millisecond precision.
    pub fn new(event_code: EventCode, decoded_at: DateTime<Utc>) -> Self {
        let timestamp = decoded_at.trunc_subsecs(3);
        let correlation_tag = format!("{}_{}", event_code, timestamp.timestamp_millis());
        Self {
            event_code,
            timestamp,
            correlation_tag,
        }
    }

    /// Build a record stamped with the current time.
    pub fn now(event_code: EventCode) -> Self {
        Self::new(event_code, Utc::now())
    }

    pub fn event_code(&self) -> &EventCode {
        &self.event_code
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn correlation_tag(&self) -> &str {
        &self.correlation_tag
    }
}

/// ISO-8601 UTC with exactly three fractional digits and a `Z` suffix.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
