//! Notification payload decoding.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use telemetry_event_types::EventCode;
use thiserror::Error;

/// Standard alphabet; padding optional since some transports strip it.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a notification could not become an event. The event is dropped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no data received")]
    Missing,

    #[error("notification decoded to an empty tag")]
    Empty,

    #[error("notification is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("notification is not valid UTF-8")]
    InvalidUtf8,
}

/// Decode a base64 characteristic value into an event code.
pub fn decode_notification(raw: Option<&str>) -> Result<EventCode, DecodeError> {
    let raw = raw.ok_or(DecodeError::Missing)?.trim();
    if raw.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = BASE64.decode(raw)?;
    let tag = String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
    EventCode::new(&tag).ok_or(DecodeError::Empty)
}
