//! Reconstructs per-ticker book state from the teed incremental stream and
//! periodically publishes a full snapshot framed by SNAPSHOT_START/END.
//!
//! Mirrors `exchange/market_data/SnapshotSynthesizer.{hpp,cc}`:
//! `add_to_snapshot`'s ADD/MODIFY/CANCEL state machine with a strict +1
//! sequence assert, and `publish_snapshot`'s exact framing (§4.7).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::{MarketUpdate, MarketUpdateType, OrderId, TickerId};

/// Interval between snapshot cycles (§4.7: "now - last_snapshot_time > 60s").
pub const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);

/// A stream of pre-built `(sequence_number, MarketUpdate)` messages, framed
/// per §4.7, ready to be handed to a sender. Kept as plain data rather than
/// writing straight to a socket so it is independently testable.
pub struct SnapshotCycle {
    pub messages: Vec<(u64, MarketUpdate)>,
}

pub struct SnapshotSynthesizer {
    /// `ticker_orders[ticker_id]` maps live `market_order_id -> MarketUpdate`
    /// (the last-known ADD/MODIFY state of that order).
    ticker_orders: Vec<HashMap<OrderId, MarketUpdate>>,
    last_increment_sequence_number: u64,
    seen_first: bool,
    last_snapshot_time: Instant,
}

impl SnapshotSynthesizer {
    pub fn new(max_tickers: usize) -> Self {
        SnapshotSynthesizer {
            ticker_orders: (0..max_tickers).map(|_| HashMap::new()).collect(),
            last_increment_sequence_number: 0,
            seen_first: false,
            last_snapshot_time: Instant::now(),
        }
    }

    /// Feed one teed incremental message. Asserts strict `+1` monotonicity:
    /// the tee is gap-free by construction (§4.7), so a gap here is a bug.
    pub fn add_to_snapshot(&mut self, sequence_number: u64, update: &MarketUpdate) {
        if self.seen_first {
            assert_eq!(
                sequence_number,
                self.last_increment_sequence_number + 1,
                "snapshot synthesizer saw a gap in the (gap-free-by-construction) teed stream"
            );
        }
        self.last_increment_sequence_number = sequence_number;
        self.seen_first = true;

        let ticker_id = update.ticker_id as usize;
        if ticker_id >= self.ticker_orders.len() {
            return;
        }
        let table = &mut self.ticker_orders[ticker_id];
        match update.kind {
            MarketUpdateType::Add => {
                assert!(
                    !table.contains_key(&update.order_id),
                    "synthesizer ADD for an order_id already tracked: {}",
                    update.order_id
                );
                table.insert(update.order_id, *update);
            }
            MarketUpdateType::Modify => {
                let existing = table.get_mut(&update.order_id).unwrap_or_else(|| {
                    panic!(
                        "synthesizer MODIFY for an untracked order_id: {}",
                        update.order_id
                    )
                });
                assert_eq!(existing.side, update.side, "MODIFY changed side");
                existing.price = update.price;
                existing.quantity = update.quantity;
            }
            MarketUpdateType::Cancel => {
                table.remove(&update.order_id).unwrap_or_else(|| {
                    panic!(
                        "synthesizer CANCEL for an untracked order_id: {}",
                        update.order_id
                    )
                });
            }
            MarketUpdateType::Trade
            | MarketUpdateType::Clear
            | MarketUpdateType::SnapshotStart
            | MarketUpdateType::SnapshotEnd
            | MarketUpdateType::Invalid => {}
        }
    }

    pub fn due_for_publish(&self, now: Instant) -> bool {
        now.duration_since(self.last_snapshot_time) > SNAPSHOT_INTERVAL
    }

    /// Builds one full snapshot cycle: SNAPSHOT_START, then per ticker a
    /// CLEAR followed by every live order (in no mandated order), then
    /// SNAPSHOT_END. Every message carries a fresh snapshot-local sequence
    /// number starting at 0 (§4.7).
    pub fn publish_snapshot(&mut self, now: Instant) -> SnapshotCycle {
        self.last_snapshot_time = now;
        let join_point = self.last_increment_sequence_number;
        let mut messages = Vec::new();
        let mut seq: u64 = 0;

        messages.push((
            seq,
            MarketUpdate {
                kind: MarketUpdateType::SnapshotStart,
                order_id: join_point,
                ..MarketUpdate::invalid()
            },
        ));
        seq += 1;

        for (ticker_id, table) in self.ticker_orders.iter().enumerate() {
            messages.push((
                seq,
                MarketUpdate {
                    kind: MarketUpdateType::Clear,
                    ticker_id: ticker_id as TickerId,
                    ..MarketUpdate::invalid()
                },
            ));
            seq += 1;
            for order in table.values() {
                messages.push((seq, *order));
                seq += 1;
            }
        }

        messages.push((
            seq,
            MarketUpdate {
                kind: MarketUpdateType::SnapshotEnd,
                order_id: join_point,
                ..MarketUpdate::invalid()
            },
        ));

        SnapshotCycle { messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn add(ticker_id: TickerId, order_id: OrderId) -> MarketUpdate {
        MarketUpdate {
            kind: MarketUpdateType::Add,
            order_id,
            ticker_id,
            side: Side::Buy,
            price: 100,
            quantity: 5,
            priority: 1,
        }
    }

    #[test]
    fn add_modify_cancel_round_trip() {
        let mut s = SnapshotSynthesizer::new(1);
        s.add_to_snapshot(1, &add(0, 10));
        let mut modify = add(0, 10);
        modify.kind = MarketUpdateType::Modify;
        modify.quantity = 3;
        s.add_to_snapshot(2, &modify);
        let mut cancel = add(0, 10);
        cancel.kind = MarketUpdateType::Cancel;
        s.add_to_snapshot(3, &cancel);

        assert!(s.ticker_orders[0].is_empty());
    }

    #[test]
    #[should_panic(expected = "gap")]
    fn gap_in_teed_stream_is_fatal() {
        let mut s = SnapshotSynthesizer::new(1);
        s.add_to_snapshot(1, &add(0, 10));
        s.add_to_snapshot(3, &add(0, 11));
    }

    #[test]
    fn snapshot_framing_matches_spec() {
        let mut s = SnapshotSynthesizer::new(2);
        s.add_to_snapshot(1, &add(0, 10));
        s.add_to_snapshot(2, &add(1, 20));

        let cycle = s.publish_snapshot(Instant::now());
        assert_eq!(cycle.messages[0].0, 0);
        assert_eq!(cycle.messages[0].1.kind, MarketUpdateType::SnapshotStart);
        assert_eq!(cycle.messages[0].1.order_id, 2);
        let last = cycle.messages.last().unwrap();
        assert_eq!(last.1.kind, MarketUpdateType::SnapshotEnd);
        assert_eq!(last.1.order_id, 2);
        assert_eq!(last.0, cycle.messages.len() as u64 - 1);
        // two CLEARs (one per ticker) plus two ADDs plus START/END
        assert_eq!(cycle.messages.len(), 6);
    }

    #[test]
    fn fresh_cycle_resets_sequence_space() {
        let mut s = SnapshotSynthesizer::new(1);
        s.add_to_snapshot(1, &add(0, 10));
        let first = s.publish_snapshot(Instant::now());
        let second = s.publish_snapshot(Instant::now());
        assert_eq!(first.messages[0].0, 0);
        assert_eq!(second.messages[0].0, 0);
    }
}
