//! Kind vocabulary shared by every emitter and the collector.
//!
//! Emitters put a short symbolic code (the "sound") on the wire; the collector
//! reports the human-readable label (the "instrument"). Both sides must agree
//! on this table.

use serde::{Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Label reported for codes that have no mapping.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KindParseError {
    #[error("Unknown instrument: {0} (expected one of piano, trumpet, flute, violin, drum)")]
    UnknownLabel(String),
}

/// Status category carried by a heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Piano,
    Trumpet,
    Flute,
    Violin,
    Drum,
    /// A code with no mapping. The raw code is kept for diagnostics.
    Unknown(String),
}

impl Kind {
    /// Every kind with a known mapping.
    pub const KNOWN: [Kind; 5] = [
        Kind::Piano,
        Kind::Trumpet,
        Kind::Flute,
        Kind::Violin,
        Kind::Drum,
    ];

    /// Map a wire code to a kind. Never fails: unrecognised codes become `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "ti-ta-ti" => Kind::Piano,
            "pouet" => Kind::Trumpet,
            "trulu" => Kind::Flute,
            "gzi-gzi" => Kind::Violin,
            "boum-boum" => Kind::Drum,
            other => Kind::Unknown(other.to_string()),
        }
    }

    /// The wire code emitted for this kind.
    pub fn code(&self) -> &str {
        match self {
            Kind::Piano => "ti-ta-ti",
            Kind::Trumpet => "pouet",
            Kind::Flute => "trulu",
            Kind::Violin => "gzi-gzi",
            Kind::Drum => "boum-boum",
            Kind::Unknown(code) => code,
        }
    }

    /// The human-readable label reported to query clients.
    pub fn label(&self) -> &str {
        match self {
            Kind::Piano => "piano",
            Kind::Trumpet => "trumpet",
            Kind::Flute => "flute",
            Kind::Violin => "violin",
            Kind::Drum => "drum",
            Kind::Unknown(_) => UNKNOWN_LABEL,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Kind::Unknown(_))
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parses a *label* (e.g. "piano"), as typed on an emitter command line.
impl FromStr for Kind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Kind::KNOWN
            .into_iter()
            .find(|kind| kind.label() == wanted)
            .ok_or_else(|| KindParseError::UnknownLabel(s.to_string()))
    }
}

// Serialize as the label, which is what query clients see
impl Serialize for Kind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_map_to_labels() {
        assert_eq!(Kind::from_code("ti-ta-ti").label(), "piano");
        assert_eq!(Kind::from_code("pouet").label(), "trumpet");
        assert_eq!(Kind::from_code("trulu").label(), "flute");
        assert_eq!(Kind::from_code("gzi-gzi").label(), "violin");
        assert_eq!(Kind::from_code("boum-boum").label(), "drum");
    }

    #[test]
    fn test_unknown_code_is_explicit() {
        let kind = Kind::from_code("bzzz");
        assert!(kind.is_unknown());
        assert_eq!(kind.label(), UNKNOWN_LABEL);
        // Raw code survives for logging
        assert_eq!(kind.code(), "bzzz");
    }

    #[test]
    fn test_code_and_from_code_agree() {
        for kind in Kind::KNOWN {
            assert_eq!(Kind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn test_parse_label() {
        assert_eq!("piano".parse::<Kind>().unwrap(), Kind::Piano);
        assert_eq!(" Drum ".parse::<Kind>().unwrap(), Kind::Drum);
    }

    #[test]
    fn test_parse_rejects_unknown_label() {
        let err = "banjo".parse::<Kind>().unwrap_err();
        assert_eq!(err, KindParseError::UnknownLabel("banjo".into()));
        // Labels only, not wire codes
        assert!("ti-ta-ti".parse::<Kind>().is_err());
    }

    #[test]
    fn test_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Kind::Violin).unwrap(), "\"violin\"");
        assert_eq!(
            serde_json::to_string(&Kind::Unknown("x".into())).unwrap(),
            "\"unknown\""
        );
    }
}
