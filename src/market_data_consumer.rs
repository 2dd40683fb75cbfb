//! Participant-side consumer of the incremental multicast stream, with the
//! snapshot-driven gap-recovery state machine (§4.8).
//!
//! Grounded in full on
//! `trading/market_data/MarketDataConsumer.{hpp,cc}`: `recv_callback`'s
//! fast-path/recovery-entry logic, `queue_message`'s duplicate-key
//! detection, and `check_snapshot_sync`'s five-step recovery algorithm.
//! The two multicast sockets and their poll loop are out of scope (§1); this
//! module models the state machine and is driven by whatever feeds it
//! decoded `(sequence_number, MarketUpdate)` pairs per source socket.

use std::collections::BTreeMap;

use crate::types::{MarketUpdate, MarketUpdateType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Normal,
    Recovering,
}

/// Where a message on the wire came from; the consumer keys its two queued
/// buffers by this (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSocket {
    Incremental,
    Snapshot,
}

pub struct MarketDataConsumer {
    next_expected_sequence_number: u64,
    state: ConsumerState,
    snapshot_queued: BTreeMap<u64, MarketUpdate>,
    incremental_queued: BTreeMap<u64, MarketUpdate>,
    /// Updates ready to be forwarded into the trade engine's input queue,
    /// in replay order. The socket-join/leave side effects of entering and
    /// leaving RECOVERING are out of scope; callers observe `state()` to
    /// know when to join/leave the snapshot group.
    pub replayed: Vec<MarketUpdate>,
}

impl MarketDataConsumer {
    pub fn new() -> Self {
        MarketDataConsumer {
            next_expected_sequence_number: 1,
            state: ConsumerState::Normal,
            snapshot_queued: BTreeMap::new(),
            incremental_queued: BTreeMap::new(),
            replayed: Vec::new(),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn next_expected_sequence_number(&self) -> u64 {
        self.next_expected_sequence_number
    }

    /// Feed one decoded message and its source socket. Returns any updates
    /// ready for immediate forward (normal-path) or via recovery replay.
    pub fn on_message(
        &mut self,
        source: SourceSocket,
        sequence_number: u64,
        update: MarketUpdate,
    ) -> Vec<MarketUpdate> {
        if source == SourceSocket::Snapshot && self.state == ConsumerState::Normal {
            // §4.8: unexpected snapshot traffic while not recovering.
            return Vec::new();
        }

        let already_recovering = self.state == ConsumerState::Recovering;
        let gap = source == SourceSocket::Incremental
            && sequence_number != self.next_expected_sequence_number;
        if already_recovering || gap {
            if !already_recovering {
                self.enter_recovery();
            }
            self.queue_message(source, sequence_number, update);
            return self.attempt_recovery();
        }

        // Normal path, incremental only (snapshot traffic while NORMAL was
        // handled above).
        self.next_expected_sequence_number += 1;
        vec![update]
    }

    fn enter_recovery(&mut self) {
        self.state = ConsumerState::Recovering;
        self.snapshot_queued.clear();
        self.incremental_queued.clear();
    }

    fn queue_message(&mut self, source: SourceSocket, sequence_number: u64, update: MarketUpdate) {
        match source {
            SourceSocket::Snapshot => {
                if self.snapshot_queued.contains_key(&sequence_number) {
                    // A duplicate key means the publisher began a new cycle
                    // mid-recovery; restart with the new cycle (§4.8).
                    self.snapshot_queued.clear();
                }
                self.snapshot_queued.insert(sequence_number, update);
            }
            SourceSocket::Incremental => {
                self.incremental_queued.insert(sequence_number, update);
            }
        }
    }

    /// Runs the five-step recovery check after every enqueue (§4.8). On
    /// success, returns the replay batch and leaves RECOVERING.
    fn attempt_recovery(&mut self) -> Vec<MarketUpdate> {
        // Step 1: lowest-keyed snapshot message must be SNAPSHOT_START.
        let Some((_, first)) = self.snapshot_queued.iter().next() else {
            return Vec::new();
        };
        if first.kind != MarketUpdateType::SnapshotStart {
            self.snapshot_queued.clear();
            return Vec::new();
        }

        // Step 2: snapshot keys must be contiguous from 0.
        let mut snapshot_body = Vec::new();
        let mut expected_key = 0u64;
        for (&key, msg) in self.snapshot_queued.iter() {
            if key != expected_key {
                return Vec::new();
            }
            if msg.kind != MarketUpdateType::SnapshotStart
                && msg.kind != MarketUpdateType::SnapshotEnd
            {
                snapshot_body.push(*msg);
            }
            expected_key += 1;
        }

        // Step 3: highest key must be SNAPSHOT_END.
        let Some((_, last)) = self.snapshot_queued.iter().next_back() else {
            return Vec::new();
        };
        if last.kind != MarketUpdateType::SnapshotEnd {
            return Vec::new();
        }
        let join_point = last.order_id;

        // Step 4: incrementals strictly contiguous from join_point + 1,
        // discarding anything at or below the join point.
        let mut incremental_body = Vec::new();
        let mut expected_seq = join_point + 1;
        for (&seq, msg) in self.incremental_queued.iter() {
            if seq <= join_point {
                continue;
            }
            if seq != expected_seq {
                return Vec::new();
            }
            incremental_body.push(*msg);
            expected_seq += 1;
        }
        let last_replayed = expected_seq.saturating_sub(1);
        if last_replayed < join_point {
            return Vec::new();
        }

        // Step 5: success. Replay snapshot body, then incrementals, in order.
        let mut out = snapshot_body;
        out.extend(incremental_body);

        self.next_expected_sequence_number = last_replayed + 1;
        self.state = ConsumerState::Normal;
        self.snapshot_queued.clear();
        self.incremental_queued.clear();
        out
    }
}

impl Default for MarketDataConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn update(kind: MarketUpdateType, order_id: u64) -> MarketUpdate {
        MarketUpdate {
            kind,
            order_id,
            ticker_id: 0,
            side: Side::Buy,
            price: 100,
            quantity: 1,
            priority: 1,
        }
    }

    #[test]
    fn normal_path_forwards_and_increments() {
        let mut c = MarketDataConsumer::new();
        let out = c.on_message(SourceSocket::Incremental, 1, update(MarketUpdateType::Add, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(c.next_expected_sequence_number(), 2);
        assert_eq!(c.state(), ConsumerState::Normal);
    }

    #[test]
    fn gap_recovery_end_to_end() {
        // Matches spec §8 scenario 4: consumer at expected=42 sees seq=45,
        // queues 45/46/47 while recovering, then a full snapshot cycle
        // arrives joining at 44; recovery replays 2 orders then 45-47.
        let mut c = MarketDataConsumer::new();
        c.next_expected_sequence_number = 42;

        let out = c.on_message(SourceSocket::Incremental, 45, update(MarketUpdateType::Add, 99));
        assert!(out.is_empty());
        assert_eq!(c.state(), ConsumerState::Recovering);

        let out = c.on_message(SourceSocket::Incremental, 46, update(MarketUpdateType::Add, 100));
        assert!(out.is_empty());
        let out = c.on_message(SourceSocket::Incremental, 47, update(MarketUpdateType::Add, 101));
        assert!(out.is_empty());

        c.on_message(
            SourceSocket::Snapshot,
            0,
            update(MarketUpdateType::SnapshotStart, 44),
        );
        c.on_message(SourceSocket::Snapshot, 1, update(MarketUpdateType::Clear, 0));
        c.on_message(SourceSocket::Snapshot, 2, update(MarketUpdateType::Add, 1));
        c.on_message(SourceSocket::Snapshot, 3, update(MarketUpdateType::Add, 2));
        let out = c.on_message(
            SourceSocket::Snapshot,
            4,
            update(MarketUpdateType::SnapshotEnd, 44),
        );

        assert_eq!(c.state(), ConsumerState::Normal);
        assert_eq!(c.next_expected_sequence_number(), 48);
        // 3 snapshot-body messages (clear + 2 adds) + 3 incrementals (45,46,47)
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn duplicate_snapshot_key_restarts_cycle() {
        let mut c = MarketDataConsumer::new();
        c.next_expected_sequence_number = 10;
        c.on_message(SourceSocket::Incremental, 20, update(MarketUpdateType::Add, 1));
        c.on_message(
            SourceSocket::Snapshot,
            0,
            update(MarketUpdateType::SnapshotStart, 19),
        );
        c.on_message(SourceSocket::Snapshot, 1, update(MarketUpdateType::Clear, 0));
        c.on_message(SourceSocket::Snapshot, 2, update(MarketUpdateType::Add, 1));
        // duplicate key 0 signals a new cycle; buffer clears and restarts
        c.on_message(
            SourceSocket::Snapshot,
            0,
            update(MarketUpdateType::SnapshotStart, 25),
        );
        assert_eq!(c.snapshot_queued.len(), 1);
        assert_eq!(c.state(), ConsumerState::Recovering);
    }
}
