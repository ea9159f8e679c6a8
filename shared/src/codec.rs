//! JSON codec for collector messages
//!
//! Both publish paths share one payload shape:
//! ```text
//! {"temperature":22.50,"humidity":55.25,"pm25":null,"pm10":null}
//! ```
//!
//! The persistent channel wraps it in a typed envelope:
//! ```text
//! {"type":"UPDATE_DATA","payload":{...}}
//! ```
//!
//! Numbers are always rendered with exactly two fractional digits, which
//! `serde_json` would not do for values such as `22.5`, so measurement
//! fields are written as pre-formatted raw JSON numbers.

use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::Reading;

/// Errors that can occur while encoding or inspecting messages
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Wire form of a reading
#[derive(Debug, Serialize)]
pub struct SensorPayload {
    #[serde(serialize_with = "two_decimals")]
    temperature: f32,
    #[serde(serialize_with = "two_decimals")]
    humidity: f32,
    #[serde(serialize_with = "optional_two_decimals")]
    pm25: Option<f32>,
    #[serde(serialize_with = "optional_two_decimals")]
    pm10: Option<f32>,
}

impl From<&Reading> for SensorPayload {
    fn from(reading: &Reading) -> Self {
        Self {
            temperature: reading.temperature(),
            humidity: reading.humidity(),
            pm25: reading.pm25(),
            pm10: reading.pm10(),
        }
    }
}

/// Messages sent over the persistent channel
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundMessage {
    #[serde(rename = "UPDATE_DATA")]
    UpdateData(SensorPayload),
}

fn two_decimals<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    let raw = RawValue::from_string(format!("{:.2}", value)).map_err(S::Error::custom)?;
    raw.serialize(serializer)
}

fn optional_two_decimals<S: Serializer>(
    value: &Option<f32>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => two_decimals(v, serializer),
        None => serializer.serialize_none(),
    }
}

/// Encode the bare payload used as the fallback HTTP body
pub fn encode_payload(reading: &Reading) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&SensorPayload::from(reading))?)
}

/// Encode the persistent channel envelope for a reading
pub fn encode_update(reading: &Reading) -> Result<String, CodecError> {
    let message = OutboundMessage::UpdateData(SensorPayload::from(reading));
    Ok(serde_json::to_string(&message)?)
}

/// Extract the `type` field from an inbound text message, if it is JSON
pub fn inbound_kind(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value.get("type")?.as_str().map(str::to_owned)
}
