//! Wire formats.
//!
//! Heartbeats are UTF-8 JSON objects `{"uuid": "...", "sound": "..."}` sent as
//! single datagrams. Snapshot responses are one JSON array of
//! `{"uuid", "instrument", "activeSince"}` objects.

use crate::kind::Kind;
use crate::registry::ParticipantRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Heartbeat is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Malformed heartbeat: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Heartbeat has an empty uuid")]
    EmptyId,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Heartbeat payload as it appears on the wire.
///
/// Unknown fields are rejected rather than passed through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Heartbeat {
    /// Participant identifier, chosen by the emitter
    pub uuid: String,
    /// Kind code (see [`Kind::from_code`])
    pub sound: String,
}

/// A validated heartbeat, ready to be applied to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEvent {
    pub id: String,
    pub kind: Kind,
}

/// Snapshot entry as reported to query clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotEntry<'a> {
    uuid: &'a str,
    instrument: &'a Kind,
    active_since: u64,
}

/// Decode one heartbeat datagram.
///
/// Unknown kind codes are not an error; they decode to [`Kind::Unknown`].
pub fn decode(bytes: &[u8]) -> Result<ParticipantEvent, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    // Only a JSON object is a heartbeat; serde would also fill the struct
    // from a positional array
    let object: Map<String, Value> = serde_json::from_str(text)?;
    let heartbeat: Heartbeat = serde_json::from_value(Value::Object(object))?;

    if heartbeat.uuid.is_empty() {
        return Err(DecodeError::EmptyId);
    }

    Ok(ParticipantEvent {
        kind: Kind::from_code(&heartbeat.sound),
        id: heartbeat.uuid,
    })
}

/// Encode the heartbeat an emitter broadcasts.
pub fn encode_heartbeat(id: &str, kind: &Kind) -> Vec<u8> {
    let heartbeat = Heartbeat {
        uuid: id.to_string(),
        sound: kind.code().to_string(),
    };
    serde_json::to_vec(&heartbeat).expect("Heartbeat serialization should not fail")
}

/// Encode a snapshot as a single response buffer.
pub fn encode_snapshot(records: &[ParticipantRecord]) -> Result<Vec<u8>, EncodeError> {
    let entries: Vec<SnapshotEntry<'_>> = records
        .iter()
        .map(|record| SnapshotEntry {
            uuid: &record.id,
            instrument: &record.kind,
            active_since: record.last_seen_ms,
        })
        .collect();

    Ok(serde_json::to_vec(&entries)?)
}
