//! Liveness registry.
//!
//! The registry is the single owner of participant records. It tracks:
//! - Which participants have been heard from recently
//! - Their most recently reported kind
//! - When the registry last heard from them (by its own clock)
//!
//! Expiry is sweep-based: nothing is removed until [`Registry::sweep`] runs.
//! Callers share one registry behind an `Arc`; all methods take `&self`.

use crate::clock::{Clock, SystemClock};
use crate::kind::Kind;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info};

/// A participant as last seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    /// Identifier supplied by the participant
    pub id: String,
    /// Most recently reported kind
    pub kind: Kind,
    /// Registry clock reading at the last update (epoch ms)
    pub last_seen_ms: u64,
}

/// Result of applying a heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First heartbeat from this id (or first since it expired)
    Joined,
    /// Existing record refreshed
    Refreshed,
}

/// Concurrent map of participant id to its latest record.
pub struct Registry {
    clock: Arc<dyn Clock>,
    records: RwLock<HashMap<String, ParticipantRecord>>,
}

impl Registry {
    /// Create an empty registry stamping records with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty registry on the system clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock::new()))
    }

    /// Record a heartbeat from `id`.
    ///
    /// Creates the record if missing, otherwise replaces its kind and refreshes
    /// its last-seen time. `last_seen_ms` never decreases for a given id.
    pub fn upsert(&self, id: &str, kind: Kind) -> UpsertOutcome {
        let mut records = self.write();
        // Read the clock under the lock so concurrent upserts for one id
        // apply in the same order as their timestamps
        let now = self.clock.now_ms();

        if let Some(record) = records.get_mut(id) {
            record.kind = kind;
            record.last_seen_ms = record.last_seen_ms.max(now);
            return UpsertOutcome::Refreshed;
        }

        info!("Participant joined: {} ({})", id, kind);
        records.insert(
            id.to_string(),
            ParticipantRecord {
                id: id.to_string(),
                kind,
                last_seen_ms: now,
            },
        );
        UpsertOutcome::Joined
    }

    /// Remove every record silent for longer than `threshold`.
    ///
    /// The clock is read once, so all records are judged against the same
    /// instant. Returns the number of records removed.
    pub fn sweep(&self, threshold: Duration) -> usize {
        let mut records = self.write();
        let now = self.clock.now_ms();
        Self::sweep_locked(&mut records, now, threshold)
    }

    fn sweep_locked(
        records: &mut HashMap<String, ParticipantRecord>,
        now_ms: u64,
        threshold: Duration,
    ) -> usize {
        let threshold_ms = threshold.as_millis() as u64;
        let before = records.len();

        // Exactly at the threshold is still alive
        records.retain(|id, record| {
            let silent_for = now_ms.saturating_sub(record.last_seen_ms);
            let keep = silent_for <= threshold_ms;
            if !keep {
                info!(
                    "Participant expired: {} ({}), silent for {}ms",
                    id, record.kind, silent_for
                );
            }
            keep
        });

        let removed = before - records.len();
        if removed > 0 {
            debug!("Sweep removed {} of {} record(s)", removed, before);
        }
        removed
    }

    /// Copy of all current records, ordered by id.
    ///
    /// The returned vector is detached from the registry; later updates do not
    /// affect it.
    pub fn snapshot(&self) -> Vec<ParticipantRecord> {
        let mut snapshot: Vec<_> = self.read().values().cloned().collect();
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        snapshot
    }

    /// Copy of a single record.
    pub fn get(&self, id: &str) -> Option<ParticipantRecord> {
        self.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Records are only ever written whole, so a poisoned lock still guards a
    // consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ParticipantRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ParticipantRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_system_clock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const THRESHOLD: Duration = Duration::from_millis(5_000);

    fn registry_at(start_ms: u64) -> (Arc<ManualClock>, Registry) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let registry = Registry::new(clock.clone());
        (clock, registry)
    }

    // ==================== Upsert ====================

    #[test]
    fn test_upsert_creates_record() {
        let (_, registry) = registry_at(1_000);

        assert_eq!(registry.upsert("a1", Kind::Piano), UpsertOutcome::Joined);

        let record = registry.get("a1").unwrap();
        assert_eq!(record.kind, Kind::Piano);
        assert_eq!(record.last_seen_ms, 1_000);
    }

    #[test]
    fn test_upsert_is_idempotent_per_id() {
        let (clock, registry) = registry_at(0);

        registry.upsert("a1", Kind::Piano);
        for _ in 0..10 {
            clock.advance(Duration::from_millis(100));
            assert_eq!(registry.upsert("a1", Kind::Piano), UpsertOutcome::Refreshed);
        }

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_replaces_kind() {
        let (_, registry) = registry_at(0);

        registry.upsert("a1", Kind::Piano);
        registry.upsert("a1", Kind::Drum);

        assert_eq!(registry.get("a1").unwrap().kind, Kind::Drum);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_upsert_refreshes_last_seen() {
        let (clock, registry) = registry_at(1_000);

        registry.upsert("a1", Kind::Piano);
        clock.advance(Duration::from_millis(750));
        registry.upsert("a1", Kind::Piano);

        assert_eq!(registry.get("a1").unwrap().last_seen_ms, 1_750);
    }

    #[test]
    fn test_last_seen_never_decreases() {
        let (clock, registry) = registry_at(10_000);

        registry.upsert("a1", Kind::Piano);
        // Clock stepping backwards must not rewind the record
        clock.set(4_000);
        registry.upsert("a1", Kind::Flute);

        let record = registry.get("a1").unwrap();
        assert_eq!(record.last_seen_ms, 10_000);
        assert_eq!(record.kind, Kind::Flute);
    }

    // ==================== Sweep ====================

    #[test]
    fn test_sweep_boundary_is_retained() {
        let (clock, registry) = registry_at(0);
        registry.upsert("a1", Kind::Piano);

        clock.set(5_000);
        assert_eq!(registry.sweep(THRESHOLD), 0);
        assert_eq!(registry.len(), 1);

        clock.set(5_001);
        assert_eq!(registry.sweep(THRESHOLD), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_removes_consecutive_stale_entries() {
        let (clock, registry) = registry_at(0);

        // Several records expiring together, with a live one among them
        registry.upsert("a", Kind::Piano);
        registry.upsert("b", Kind::Trumpet);
        registry.upsert("c", Kind::Flute);
        clock.set(3_000);
        registry.upsert("d", Kind::Violin);
        registry.upsert("e", Kind::Drum);

        clock.set(6_000);
        assert_eq!(registry.sweep(THRESHOLD), 3);

        let ids: Vec<_> = registry.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["d", "e"]);
    }

    #[test]
    fn test_sweep_removes_everything_stale() {
        let (clock, registry) = registry_at(0);
        for i in 0..50 {
            registry.upsert(&format!("p{i}"), Kind::Drum);
        }

        clock.set(60_000);
        assert_eq!(registry.sweep(THRESHOLD), 50);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let (clock, registry) = registry_at(0);
        registry.upsert("a1", Kind::Piano);
        clock.set(10_000);
        registry.upsert("b2", Kind::Piano);

        assert_eq!(registry.sweep(THRESHOLD), 1);
        assert_eq!(registry.sweep(THRESHOLD), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_expired_participant_rejoins() {
        let (clock, registry) = registry_at(0);
        registry.upsert("a1", Kind::Piano);

        clock.set(9_000);
        registry.sweep(THRESHOLD);
        assert_eq!(registry.upsert("a1", Kind::Piano), UpsertOutcome::Joined);
        assert_eq!(registry.get("a1").unwrap().last_seen_ms, 9_000);
    }

    // ==================== Snapshot ====================

    #[test]
    fn test_snapshot_is_isolated() {
        let (clock, registry) = registry_at(0);
        registry.upsert("a1", Kind::Piano);

        let snapshot = registry.snapshot();

        clock.set(1_000);
        registry.upsert("a1", Kind::Drum);
        registry.upsert("b2", Kind::Flute);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind, Kind::Piano);
        assert_eq!(snapshot[0].last_seen_ms, 0);
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let (_, registry) = registry_at(0);
        registry.upsert("c", Kind::Piano);
        registry.upsert("a", Kind::Piano);
        registry.upsert("b", Kind::Piano);

        let ids: Vec<_> = registry.snapshot().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    // ==================== Concurrency ====================

    #[test]
    fn test_concurrent_upserts_distinct_ids() {
        let registry = Arc::new(Registry::new(Arc::new(ManualClock::new(0))));

        let handles: Vec<_> = (0..16)
            .map(|t| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let kind = Kind::KNOWN[i % Kind::KNOWN.len()].clone();
                        registry.upsert(&format!("t{t}-{i}"), kind);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 16 * 100);
        for record in snapshot {
            let i: usize = record.id.rsplit('-').next().unwrap().parse().unwrap();
            assert_eq!(record.kind, Kind::KNOWN[i % Kind::KNOWN.len()]);
        }
    }

    #[test]
    fn test_concurrent_upsert_and_sweep() {
        let clock = Arc::new(ManualClock::new(0));
        let registry = Arc::new(Registry::new(clock.clone()));

        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..1_000 {
                    registry.upsert(&format!("p{}", i % 10), Kind::Piano);
                }
            })
        };
        let sweeper = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    registry.sweep(THRESHOLD);
                    let _ = registry.snapshot();
                }
            })
        };

        writer.join().unwrap();
        sweeper.join().unwrap();

        // Clock never moved, so nothing could have expired
        assert_eq!(registry.len(), 10);
    }
}
