//! Membership registry: who is online, who is believed down.
//!
//! The registry holds two partitions keyed by address. Conflicts are resolved
//! last-write-wins on `lastUpdate`, so merging is idempotent and the order in
//! which snapshots arrive does not change the outcome.
//!
//! Invariants held across every public method:
//! - an address is in at most one partition
//! - the local node's own record is in exactly one partition
//! - offline records older than [`OFFLINE_TTL_MS`] are dropped on every merge
//! - a record's `lastUpdate` never decreases

use crate::record::{PeerList, PeerRecord};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Offline records older than this are forgotten (24 hours).
pub const OFFLINE_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Maximum randomly sampled targets in a fan-out (monitors come on top).
pub const MAX_SAMPLED_TARGETS: usize = 20;

/// Which partition holds a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

/// What a merge changed. Used for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records installed into the online partition
    pub installed_online: usize,
    /// Records installed into the offline partition
    pub installed_offline: usize,
    /// Online records evicted by a newer offline fact
    pub evicted_online: usize,
    /// Offline records dropped for exceeding the TTL
    pub purged: usize,
}

impl MergeOutcome {
    /// True if the merge left the registry untouched.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// In-memory store of known peers.
///
/// Not synchronized; the engine serializes access behind a single lock.
#[derive(Debug, Clone)]
pub struct MembershipRegistry {
    /// Our own address
    local_address: String,
    /// Whether we advertise ourselves as a monitor
    local_monitor: bool,
    online: HashMap<String, PeerRecord>,
    offline: HashMap<String, PeerRecord>,
}

impl MembershipRegistry {
    /// Create a registry with ourselves seeded online at `now_ms`.
    pub fn new(local_address: impl Into<String>, local_monitor: bool, now_ms: u64) -> Self {
        let local_address = local_address.into();
        let mut online = HashMap::new();
        online.insert(
            local_address.clone(),
            PeerRecord::new(local_address.clone(), local_monitor, now_ms),
        );

        Self {
            local_address,
            local_monitor,
            online,
            offline: HashMap::new(),
        }
    }

    /// Our own record, wherever it currently sits.
    pub fn self_record(&self) -> Option<&PeerRecord> {
        self.online
            .get(&self.local_address)
            .or_else(|| self.offline.get(&self.local_address))
    }

    /// Whether we are currently in the online partition.
    pub fn is_self_online(&self) -> bool {
        self.online.contains_key(&self.local_address)
    }

    /// Look up a record and the partition holding it.
    pub fn get(&self, address: &str) -> Option<(&PeerRecord, Presence)> {
        if let Some(record) = self.online.get(address) {
            return Some((record, Presence::Online));
        }
        self.offline
            .get(address)
            .map(|record| (record, Presence::Offline))
    }

    /// Number of online records, ourselves included when online.
    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Number of offline records.
    pub fn offline_count(&self) -> usize {
        self.offline.len()
    }

    /// Refresh our own timestamp and (re)insert ourselves online.
    pub fn touch_self(&mut self, now_ms: u64) {
        self.place_self(Presence::Online, now_ms);
    }

    /// Stamp ourselves and move into the online partition.
    pub fn set_self_online(&mut self, now_ms: u64) {
        self.place_self(Presence::Online, now_ms);
    }

    /// Stamp ourselves and move into the offline partition.
    pub fn set_self_offline(&mut self, now_ms: u64) {
        self.place_self(Presence::Offline, now_ms);
    }

    fn place_self(&mut self, presence: Presence, now_ms: u64) {
        let previous = self
            .online
            .remove(&self.local_address)
            .or_else(|| self.offline.remove(&self.local_address));
        let last_update = previous.map_or(now_ms, |r| r.last_update.max(now_ms));
        let record = PeerRecord::new(self.local_address.clone(), self.local_monitor, last_update);

        match presence {
            Presence::Online => self.online.insert(self.local_address.clone(), record),
            Presence::Offline => self.offline.insert(self.local_address.clone(), record),
        };
    }

    /// Reconcile an incoming snapshot into the registry.
    ///
    /// Online pass first, then offline pass, then the TTL purge. Records about
    /// ourselves are ignored: our own state only changes locally.
    pub fn merge(&mut self, incoming: &PeerList, now_ms: u64) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for record in &incoming.online {
            if self.is_foreign_noise(record) {
                continue;
            }

            // Online wins ties against offline, same as the offline pass below
            let install = match self.get(&record.address) {
                None => true,
                Some((existing, Presence::Online)) => record.last_update > existing.last_update,
                Some((existing, Presence::Offline)) => record.last_update >= existing.last_update,
            };

            if install {
                self.offline.remove(&record.address);
                self.online.insert(record.address.clone(), record.clone());
                outcome.installed_online += 1;
            }
        }

        for record in incoming.offline.iter().flatten() {
            if self.is_foreign_noise(record) {
                continue;
            }

            // A fresher or equally fresh online observation wins
            let online_update = self.online.get(&record.address).map(|r| r.last_update);
            if online_update.is_some_and(|t| t >= record.last_update) {
                continue;
            }

            let newer = self
                .offline
                .get(&record.address)
                .is_none_or(|e| record.last_update > e.last_update);

            if newer {
                self.offline.insert(record.address.clone(), record.clone());
                outcome.installed_offline += 1;

                if online_update.is_some() {
                    self.online.remove(&record.address);
                    outcome.evicted_online += 1;
                }
            }
        }

        outcome.purged = self.purge_expired(now_ms);
        outcome
    }

    fn is_foreign_noise(&self, record: &PeerRecord) -> bool {
        record.address.is_empty() || record.address == self.local_address
    }

    fn purge_expired(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(OFFLINE_TTL_MS);
        let before = self.offline.len();
        let local = &self.local_address;

        self.offline
            .retain(|address, record| address == local || record.last_update >= cutoff);

        before - self.offline.len()
    }

    /// Locally observed failure: move an online peer offline.
    ///
    /// Returns true if the peer was online. We never mark ourselves this way.
    pub fn move_offline(&mut self, address: &str, now_ms: u64) -> bool {
        if address == self.local_address {
            return false;
        }

        match self.online.remove(address) {
            Some(mut record) => {
                record.last_update = record.last_update.max(now_ms);
                self.offline.insert(address.to_string(), record);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the registry, optionally with the offline partition.
    pub fn snapshot(&self, include_offline: bool) -> PeerList {
        let online = self.online.values().cloned().collect();

        if include_offline {
            PeerList::with_offline(online, self.offline.values().cloned().collect())
        } else {
            PeerList::online(online)
        }
    }

    /// Uniform random sample of at most `count` online records.
    pub fn sample_online(&self, count: usize, exclude_self: bool) -> Vec<PeerRecord> {
        self.sample_online_with(count, exclude_self, &mut rand::rng())
    }

    /// [`sample_online`](Self::sample_online) with a caller-supplied RNG.
    ///
    /// Partial Fisher-Yates over the candidates: only the first `count` slots
    /// are shuffled into place.
    pub fn sample_online_with<R: Rng + ?Sized>(
        &self,
        count: usize,
        exclude_self: bool,
        rng: &mut R,
    ) -> Vec<PeerRecord> {
        let mut candidates: Vec<&PeerRecord> = self
            .online
            .values()
            .filter(|r| !(exclude_self && r.address == self.local_address))
            .collect();

        let take = count.min(candidates.len());
        for i in 0..take {
            let j = rng.random_range(i..candidates.len());
            candidates.swap(i, j);
        }

        candidates.truncate(take);
        candidates.into_iter().cloned().collect()
    }

    /// Online monitors other than ourselves.
    pub fn monitors(&self) -> Vec<PeerRecord> {
        self.online
            .values()
            .filter(|r| r.is_monitor && r.address != self.local_address)
            .cloned()
            .collect()
    }

    /// Fan-out targets: a random sample plus every monitor, deduplicated.
    pub fn gossip_targets(&self) -> Vec<PeerRecord> {
        let mut seen = HashSet::new();

        self.sample_online(MAX_SAMPLED_TARGETS, true)
            .into_iter()
            .chain(self.monitors())
            .filter(|r| seen.insert(r.address.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const LOCAL: &str = "https://localhost:3000/";
    const X: &str = "https://x:3000/";
    const Y: &str = "https://y:3000/";
    const Z: &str = "https://z:3000/";

    const HOUR_MS: u64 = 60 * 60 * 1000;
    const NOW: u64 = 1_700_000_000_000;

    fn registry() -> MembershipRegistry {
        MembershipRegistry::new(LOCAL, false, NOW)
    }

    fn peer(address: &str, last_update: u64) -> PeerRecord {
        PeerRecord::new(address, false, last_update)
    }

    fn monitor(address: &str, last_update: u64) -> PeerRecord {
        PeerRecord::new(address, true, last_update)
    }

    fn online(records: Vec<PeerRecord>) -> PeerList {
        PeerList::online(records)
    }

    fn offline(records: Vec<PeerRecord>) -> PeerList {
        PeerList::with_offline(vec![], records)
    }

    /// Sorted view for comparing registries.
    fn state(reg: &MembershipRegistry) -> (Vec<PeerRecord>, Vec<PeerRecord>) {
        let list = reg.snapshot(true);
        let mut on = list.online;
        let mut off = list.offline.unwrap_or_default();
        on.sort_by(|a, b| a.address.cmp(&b.address));
        off.sort_by(|a, b| a.address.cmp(&b.address));
        (on, off)
    }

    fn assert_partitioned(reg: &MembershipRegistry) {
        let (on, off) = state(reg);
        for record in &on {
            assert!(
                !off.iter().any(|r| r.address == record.address),
                "{} present in both partitions",
                record.address
            );
        }
        let self_count = on
            .iter()
            .chain(off.iter())
            .filter(|r| r.address == LOCAL)
            .count();
        assert_eq!(self_count, 1, "local record must be in exactly one partition");
    }

    // ==================== Construction ====================

    #[test]
    fn test_new_registry_seeds_self_online() {
        let reg = registry();

        let list = reg.snapshot(false);
        assert_eq!(list.online.len(), 1);
        assert_eq!(list.online[0].address, LOCAL);
        assert!(!list.online[0].is_monitor);
        assert!(reg.is_self_online());
        assert!(list.offline.is_none());
    }

    #[test]
    fn test_new_monitor_registry() {
        let reg = MembershipRegistry::new(LOCAL, true, NOW);
        assert!(reg.self_record().unwrap().is_monitor);
    }

    // ==================== Online pass ====================

    #[test]
    fn test_merge_adds_unknown_online_peer() {
        let mut reg = registry();

        let outcome = reg.merge(&online(vec![peer(X, NOW)]), NOW);

        assert_eq!(outcome.installed_online, 1);
        assert_eq!(reg.online_count(), 2);
        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Online));
    }

    #[test]
    fn test_merge_ignores_older_online_record() {
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        let outcome = reg.merge(&online(vec![peer(X, NOW - 10_000)]), NOW);

        assert!(outcome.is_noop());
        assert_eq!(reg.get(X).unwrap().0.last_update, NOW);
    }

    #[test]
    fn test_merge_ignores_equal_online_record() {
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        let outcome = reg.merge(&online(vec![monitor(X, NOW)]), NOW);

        assert!(outcome.is_noop());
        assert!(!reg.get(X).unwrap().0.is_monitor);
    }

    #[test]
    fn test_merge_newer_online_replaces_record() {
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        reg.merge(&online(vec![monitor(X, NOW + 5)]), NOW);

        let (record, presence) = reg.get(X).unwrap();
        assert_eq!(presence, Presence::Online);
        assert_eq!(record.last_update, NOW + 5);
        assert!(record.is_monitor);
    }

    #[test]
    fn test_merge_newer_online_revives_offline_peer() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW - 100)]), NOW);
        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Offline));

        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Online));
        assert_eq!(reg.offline_count(), 0);
    }

    #[test]
    fn test_merge_stale_online_does_not_revive_newer_offline() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW)]), NOW);

        let outcome = reg.merge(&online(vec![peer(X, NOW - 100)]), NOW);

        assert!(outcome.is_noop());
        let (record, presence) = reg.get(X).unwrap();
        assert_eq!(presence, Presence::Offline);
        assert_eq!(record.last_update, NOW);
    }

    // ==================== Offline pass ====================

    #[test]
    fn test_offline_report_older_than_online_is_skipped() {
        // Local has X online at t=100; a report of X offline at t=90 loses.
        let mut reg = MembershipRegistry::new(LOCAL, false, 200);
        reg.merge(&online(vec![peer(X, 100)]), 200);

        reg.merge(&offline(vec![peer(X, 90)]), 200);

        let (record, presence) = reg.get(X).unwrap();
        assert_eq!(presence, Presence::Online);
        assert_eq!(record.last_update, 100);
        assert!(!reg.snapshot(true).is_offline(X));
    }

    #[test]
    fn test_offline_report_equal_to_online_is_skipped() {
        let mut reg = MembershipRegistry::new(LOCAL, false, 200);
        reg.merge(&online(vec![peer(X, 100)]), 200);

        let outcome = reg.merge(&offline(vec![peer(X, 100)]), 200);

        assert!(outcome.is_noop());
        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Online));
    }

    #[test]
    fn test_newer_offline_report_evicts_online() {
        // Local has X online at t=100; a report of X offline at t=150 wins.
        let mut reg = MembershipRegistry::new(LOCAL, false, 200);
        reg.merge(&online(vec![peer(X, 100)]), 200);

        let outcome = reg.merge(&offline(vec![peer(X, 150)]), 200);

        assert_eq!(outcome.installed_offline, 1);
        assert_eq!(outcome.evicted_online, 1);
        let (record, presence) = reg.get(X).unwrap();
        assert_eq!(presence, Presence::Offline);
        assert_eq!(record.last_update, 150);
        assert!(!reg.snapshot(true).is_online(X));
    }

    #[test]
    fn test_online_report_wins_tie_against_offline() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW)]), NOW);

        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Online));
        assert_partitioned(&reg);
    }

    #[test]
    fn test_offline_report_updates_older_offline_record() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW - 50)]), NOW);

        reg.merge(&offline(vec![peer(X, NOW - 10)]), NOW);
        assert_eq!(reg.get(X).unwrap().0.last_update, NOW - 10);

        let outcome = reg.merge(&offline(vec![peer(X, NOW - 30)]), NOW);
        assert!(outcome.is_noop());
        assert_eq!(reg.get(X).unwrap().0.last_update, NOW - 10);
    }

    #[test]
    fn test_online_and_offline_in_same_snapshot() {
        let mut reg = registry();
        let incoming = PeerList::with_offline(vec![peer(X, NOW), peer(Y, NOW)], vec![peer(Y, NOW + 1)]);

        reg.merge(&incoming, NOW);

        assert_eq!(reg.get(X).map(|(_, p)| p), Some(Presence::Online));
        assert_eq!(reg.get(Y).map(|(_, p)| p), Some(Presence::Offline));
        assert_partitioned(&reg);
    }

    // ==================== Self handling ====================

    #[test]
    fn test_merge_ignores_records_about_self() {
        let mut reg = registry();

        let outcome = reg.merge(
            &PeerList::with_offline(vec![monitor(LOCAL, NOW + 99)], vec![peer(LOCAL, NOW + 100)]),
            NOW,
        );

        assert!(outcome.is_noop());
        assert!(reg.is_self_online());
        assert_eq!(reg.self_record().unwrap().last_update, NOW);
        assert!(!reg.self_record().unwrap().is_monitor);
    }

    #[test]
    fn test_merge_ignores_empty_address() {
        let mut reg = registry();
        let outcome = reg.merge(&online(vec![peer("", NOW)]), NOW);
        assert!(outcome.is_noop());
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn test_touch_self_advances_timestamp() {
        let mut reg = registry();
        reg.touch_self(NOW + 1_000);

        assert_eq!(reg.self_record().unwrap().last_update, NOW + 1_000);
        assert!(reg.is_self_online());
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn test_touch_self_never_moves_backwards() {
        let mut reg = registry();
        reg.touch_self(NOW - 5_000);
        assert_eq!(reg.self_record().unwrap().last_update, NOW);
    }

    #[test]
    fn test_touch_self_reinserts_online_after_offline() {
        let mut reg = registry();
        reg.set_self_offline(NOW + 1);

        reg.touch_self(NOW + 2);

        assert!(reg.is_self_online());
        assert_eq!(reg.offline_count(), 0);
        assert_partitioned(&reg);
    }

    #[test]
    fn test_set_self_offline_and_online() {
        let mut reg = registry();

        reg.set_self_offline(NOW + 10);
        assert!(!reg.is_self_online());
        assert!(reg.snapshot(true).is_offline(LOCAL));
        assert!(!reg.snapshot(true).is_online(LOCAL));
        assert_eq!(reg.self_record().unwrap().last_update, NOW + 10);

        reg.set_self_online(NOW + 20);
        assert!(reg.is_self_online());
        assert!(!reg.snapshot(true).is_offline(LOCAL));
        assert_eq!(reg.self_record().unwrap().last_update, NOW + 20);
    }

    #[test]
    fn test_self_offline_survives_purge() {
        let mut reg = registry();
        reg.set_self_offline(NOW);

        reg.merge(&PeerList::default(), NOW + 2 * OFFLINE_TTL_MS);

        assert!(!reg.is_self_online());
        assert!(reg.snapshot(true).is_offline(LOCAL));
    }

    // ==================== Local failure detection ====================

    #[test]
    fn test_move_offline() {
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW)]), NOW);

        let moved = reg.move_offline(X, NOW + 500);

        assert!(moved);
        let (record, presence) = reg.get(X).unwrap();
        assert_eq!(presence, Presence::Offline);
        assert_eq!(record.last_update, NOW + 500);
    }

    #[test]
    fn test_move_offline_unknown_or_offline_peer() {
        let mut reg = registry();
        assert!(!reg.move_offline(X, NOW));

        reg.merge(&offline(vec![peer(Y, NOW)]), NOW);
        assert!(!reg.move_offline(Y, NOW + 1));
        assert_eq!(reg.get(Y).unwrap().0.last_update, NOW);
    }

    #[test]
    fn test_move_offline_self_ignored() {
        let mut reg = registry();
        assert!(!reg.move_offline(LOCAL, NOW + 1));
        assert!(reg.is_self_online());
    }

    #[test]
    fn test_move_offline_keeps_timestamp_monotonic() {
        // Peer clock ahead of ours
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW + 60_000)]), NOW);

        reg.move_offline(X, NOW);

        assert_eq!(reg.get(X).unwrap().0.last_update, NOW + 60_000);
    }

    // ==================== Purge ====================

    #[test]
    fn test_merge_purges_expired_offline() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW), peer(Y, NOW + HOUR_MS)]), NOW + HOUR_MS);

        let later = NOW + OFFLINE_TTL_MS + 1;
        let outcome = reg.merge(&PeerList::default(), later);

        assert_eq!(outcome.purged, 1);
        assert!(reg.get(X).is_none());
        assert_eq!(reg.get(Y).map(|(_, p)| p), Some(Presence::Offline));
    }

    #[test]
    fn test_incoming_expired_offline_is_not_retained() {
        let mut reg = registry();
        let ancient = NOW - OFFLINE_TTL_MS - 1;

        reg.merge(&offline(vec![peer(X, ancient)]), NOW);

        assert!(reg.get(X).is_none());
    }

    #[test]
    fn test_purge_only_runs_on_merge() {
        let mut reg = registry();
        reg.merge(&offline(vec![peer(X, NOW)]), NOW);

        // Reads and other mutations don't purge
        reg.touch_self(NOW + 2 * OFFLINE_TTL_MS);
        assert!(reg.get(X).is_some());

        reg.merge(&PeerList::default(), NOW + 2 * OFFLINE_TTL_MS);
        assert!(reg.get(X).is_none());
    }

    // ==================== Merge properties ====================

    #[test]
    fn test_merge_is_idempotent() {
        let mut reg = registry();
        reg.merge(&online(vec![peer(X, NOW - 10), peer(Z, NOW)]), NOW);

        let snapshot = PeerList::with_offline(
            vec![peer(X, NOW), monitor(Y, NOW + 1)],
            vec![peer(Z, NOW + 2), peer("https://w:3000/", NOW - 1)],
        );

        reg.merge(&snapshot, NOW);
        let once = state(&reg);

        let outcome = reg.merge(&snapshot, NOW);
        assert!(outcome.is_noop());
        assert_eq!(state(&reg), once);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = PeerList::with_offline(vec![peer(X, NOW + 1), peer(Y, NOW)], vec![peer(Z, NOW + 3)]);
        let b = PeerList::with_offline(vec![peer(Z, NOW + 2)], vec![peer(X, NOW + 4), peer(Y, NOW)]);

        let mut ab = registry();
        ab.merge(&a, NOW);
        ab.merge(&b, NOW);

        let mut ba = registry();
        ba.merge(&b, NOW);
        ba.merge(&a, NOW);

        assert_eq!(state(&ab), state(&ba));
    }

    #[test]
    fn test_random_operations_preserve_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let addresses = [X, Y, Z, LOCAL, "https://w:3000/"];
        let mut reg = registry();
        let mut high_water: HashMap<String, u64> = HashMap::new();

        for step in 0..2_000u64 {
            let now = NOW + step * 1_000;
            let address = addresses[rng.random_range(0..addresses.len())];
            let stamp = now - rng.random_range(0..5_000);
            let record = peer(address, stamp);

            match rng.random_range(0..6) {
                0 => {
                    reg.merge(&online(vec![record]), now);
                }
                1 => {
                    reg.merge(&offline(vec![record]), now);
                }
                2 => {
                    reg.move_offline(address, now);
                }
                3 => reg.touch_self(now),
                4 => reg.set_self_offline(now),
                _ => reg.set_self_online(now),
            }

            assert_partitioned(&reg);

            let (on, off) = state(&reg);
            for record in on.iter().chain(off.iter()) {
                let seen = high_water.entry(record.address.clone()).or_insert(0);
                assert!(
                    record.last_update >= *seen,
                    "lastUpdate for {} went backwards",
                    record.address
                );
                *seen = record.last_update;
            }
        }
    }

    // ==================== Sampling and targets ====================

    fn populated() -> MembershipRegistry {
        let mut reg = registry();
        reg.merge(
            &online(vec![peer(X, NOW), monitor(Y, NOW), peer(Z, NOW)]),
            NOW,
        );
        reg
    }

    #[test]
    fn test_sample_online_excludes_self() {
        let reg = populated();

        let sample = reg.sample_online(2, true);

        assert_eq!(sample.len(), 2);
        assert!(sample.iter().all(|r| r.address != LOCAL));
        assert_ne!(sample[0].address, sample[1].address);
    }

    #[test]
    fn test_sample_online_bounded_by_available() {
        let reg = populated();

        assert_eq!(reg.sample_online(10, true).len(), 3);
        assert_eq!(reg.sample_online(10, false).len(), 4);
        assert!(reg.sample_online(0, true).is_empty());
    }

    #[test]
    fn test_sample_online_only_self() {
        let reg = registry();
        assert!(reg.sample_online(1, true).is_empty());
        assert_eq!(reg.sample_online(1, false)[0].address, LOCAL);
    }

    #[test]
    fn test_sample_online_skips_offline_peers() {
        let mut reg = populated();
        reg.move_offline(X, NOW + 1);
        reg.move_offline(Z, NOW + 1);

        let sample = reg.sample_online(5, true);
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].address, Y);
    }

    #[test]
    fn test_sample_online_is_roughly_uniform() {
        let reg = populated();
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..3_000 {
            for record in reg.sample_online_with(1, true, &mut rng) {
                *counts.entry(record.address).or_insert(0) += 1;
            }
        }

        assert_eq!(counts.len(), 3);
        for (address, count) in counts {
            assert!(
                (800..1_200).contains(&count),
                "{address} picked {count} times out of 3000"
            );
        }
    }

    #[test]
    fn test_monitors_exclude_self_and_offline() {
        let mut reg = MembershipRegistry::new(LOCAL, true, NOW);
        reg.merge(&online(vec![peer(X, NOW), monitor(Y, NOW), monitor(Z, NOW)]), NOW);
        reg.move_offline(Z, NOW + 1);

        let monitors = reg.monitors();

        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].address, Y);
    }

    #[test]
    fn test_gossip_targets_dedupes_monitors() {
        let reg = populated();

        let targets = reg.gossip_targets();

        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|r| r.address != LOCAL));
        assert_eq!(targets.iter().filter(|r| r.address == Y).count(), 1);
    }

    #[test]
    fn test_gossip_targets_always_include_monitors() {
        let mut reg = registry();
        let peers: Vec<_> = (0..40)
            .map(|i| peer(&format!("https://node-{i}:3000/"), NOW))
            .chain(std::iter::once(monitor(Y, NOW)))
            .collect();
        reg.merge(&online(peers), NOW);

        for _ in 0..20 {
            let targets = reg.gossip_targets();
            assert!(targets.len() >= MAX_SAMPLED_TARGETS);
            assert!(targets.len() <= MAX_SAMPLED_TARGETS + 1);
            assert!(targets.iter().any(|r| r.address == Y));
        }
    }

    #[test]
    fn test_snapshot_has_no_side_effects() {
        let reg = populated();
        let before = state(&reg);

        let _ = reg.snapshot(true);
        let _ = reg.snapshot(false);

        assert_eq!(state(&reg), before);
    }
}
