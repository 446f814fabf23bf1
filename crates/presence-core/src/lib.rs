//! presence-core: Shared library for heartbeat-based presence tracking.
//!
//! This crate provides the runtime-agnostic pieces of the collector:
//! - The kind vocabulary shared by emitters and the collector
//! - Heartbeat decoding and snapshot encoding
//! - The liveness registry and its staleness sweep
//! - A clock abstraction so expiry can be tested deterministically

pub mod clock;
pub mod codec;
pub mod kind;
pub mod protocol;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{DecodeError, EncodeError, Heartbeat, ParticipantEvent};
pub use kind::{Kind, KindParseError};
pub use registry::{ParticipantRecord, Registry, UpsertOutcome};
