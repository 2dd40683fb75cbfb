//! Participant-side order book: reconstructs resting orders from the
//! incremental/snapshot stream, keyed by `market_order_id` only (no
//! per-client lookup — the consumer did not submit most of these orders).
//!
//! List-surgery mirrors the exchange-side book and
//! `trading/strategy/MarketOrderBook.hpp`'s `add_order`/`remove_order`/
//! `add_order_at_price`/`remove_order_at_price`. Adds the BBO cache and
//! change hook that file defines (`update_bbo`), with a `BboListener`
//! trait as the seam for a strategy implementation to sit behind.

use crate::pool::Pool;
use crate::types::{
    MarketUpdate, MarketUpdateType, OrderId, Price, PoolIndex, Priority, Quantity, Side,
    TickerId, MAX_PRICE_LEVELS, POOL_INDEX_INVALID, QUANTITY_INVALID,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbo {
    pub bid_price: Option<Price>,
    pub bid_quantity: Quantity,
    pub ask_price: Option<Price>,
    pub ask_quantity: Quantity,
}

impl Bbo {
    fn empty() -> Self {
        Bbo {
            bid_price: None,
            bid_quantity: QUANTITY_INVALID,
            ask_price: None,
            ask_quantity: QUANTITY_INVALID,
        }
    }
}

/// Called whenever the top of either side changes. The strategy/trade-engine
/// implementation behind this trait is out of scope (§1); only the seam is
/// built here.
pub trait BboListener {
    fn on_bbo_update(&mut self, ticker_id: TickerId, bbo: &Bbo);
}

pub struct NullBboListener;
impl BboListener for NullBboListener {
    fn on_bbo_update(&mut self, _ticker_id: TickerId, _bbo: &Bbo) {}
}

#[derive(Debug, Clone, Copy)]
struct MarketOrder {
    order_id: OrderId,
    side: Side,
    price: Price,
    quantity: Quantity,
    priority: Priority,
    prev: PoolIndex,
    next: PoolIndex,
}

#[derive(Debug, Clone, Copy)]
struct MarketOrdersAtPrice {
    side: Side,
    price: Price,
    first_order: PoolIndex,
    prev_entry: PoolIndex,
    next_entry: PoolIndex,
}

pub struct ConsumerBook {
    ticker_id: TickerId,
    orders: Pool<MarketOrder>,
    levels: Pool<MarketOrdersAtPrice>,
    bids_by_price: PoolIndex,
    asks_by_price: PoolIndex,
    price_index: Vec<PoolIndex>,
    oid_to_order: std::collections::HashMap<OrderId, PoolIndex>,
    bbo: Bbo,
}

impl ConsumerBook {
    pub fn new(ticker_id: TickerId, max_orders: usize, max_levels: usize) -> Self {
        ConsumerBook {
            ticker_id,
            orders: Pool::new(max_orders),
            levels: Pool::new(max_levels.max(MAX_PRICE_LEVELS)),
            bids_by_price: POOL_INDEX_INVALID,
            asks_by_price: POOL_INDEX_INVALID,
            price_index: vec![POOL_INDEX_INVALID; MAX_PRICE_LEVELS],
            oid_to_order: std::collections::HashMap::new(),
            bbo: Bbo::empty(),
        }
    }

    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
    }

    pub fn bbo(&self) -> &Bbo {
        &self.bbo
    }

    fn side_head(&self, side: Side) -> PoolIndex {
        match side {
            Side::Buy => self.bids_by_price,
            Side::Sell => self.asks_by_price,
            Side::Invalid => POOL_INDEX_INVALID,
        }
    }

    fn set_side_head(&mut self, side: Side, idx: PoolIndex) {
        match side {
            Side::Buy => self.bids_by_price = idx,
            Side::Sell => self.asks_by_price = idx,
            Side::Invalid => {}
        }
    }

    fn level_for_price(&self, price: Price) -> Option<PoolIndex> {
        let idx = self.price_index[price as usize % MAX_PRICE_LEVELS];
        if idx == POOL_INDEX_INVALID || self.levels.get(idx).price != price {
            return None;
        }
        Some(idx)
    }

    fn insert_level(&mut self, side: Side, price: Price) -> PoolIndex {
        let new_level = self.levels.allocate(MarketOrdersAtPrice {
            side,
            price,
            first_order: POOL_INDEX_INVALID,
            prev_entry: POOL_INDEX_INVALID,
            next_entry: POOL_INDEX_INVALID,
        });
        self.price_index[price as usize % MAX_PRICE_LEVELS] = new_level;

        let head = self.side_head(side);
        if head == POOL_INDEX_INVALID {
            let level = self.levels.get_mut(new_level);
            level.prev_entry = new_level;
            level.next_entry = new_level;
            self.set_side_head(side, new_level);
            return new_level;
        }

        let better = |candidate: Price| match side {
            Side::Sell => price < candidate,
            Side::Buy => price > candidate,
            Side::Invalid => false,
        };

        let mut cursor = head;
        let mut insert_before = None;
        loop {
            let cursor_price = self.levels.get(cursor).price;
            if better(cursor_price) {
                insert_before = Some(cursor);
                break;
            }
            let next = self.levels.get(cursor).next_entry;
            if next == head {
                break;
            }
            cursor = next;
        }

        match insert_before {
            Some(target) => {
                let prev = self.levels.get(target).prev_entry;
                self.levels.get_mut(new_level).prev_entry = prev;
                self.levels.get_mut(new_level).next_entry = target;
                self.levels.get_mut(prev).next_entry = new_level;
                self.levels.get_mut(target).prev_entry = new_level;
                if target == head {
                    self.set_side_head(side, new_level);
                }
            }
            None => {
                let tail = self.levels.get(head).prev_entry;
                self.levels.get_mut(new_level).prev_entry = tail;
                self.levels.get_mut(new_level).next_entry = head;
                self.levels.get_mut(tail).next_entry = new_level;
                self.levels.get_mut(head).prev_entry = new_level;
            }
        }
        new_level
    }

    fn remove_level(&mut self, level_idx: PoolIndex) {
        let level = *self.levels.get(level_idx);
        let head = self.side_head(level.side);
        if level.next_entry == level_idx {
            self.set_side_head(level.side, POOL_INDEX_INVALID);
        } else {
            self.levels.get_mut(level.prev_entry).next_entry = level.next_entry;
            self.levels.get_mut(level.next_entry).prev_entry = level.prev_entry;
            if head == level_idx {
                self.set_side_head(level.side, level.next_entry);
            }
        }
        self.price_index[level.price as usize % MAX_PRICE_LEVELS] = POOL_INDEX_INVALID;
        self.levels.deallocate(level_idx);
    }

    fn insert_order_into_level(&mut self, level_idx: PoolIndex, order_idx: PoolIndex) {
        let first_order = self.levels.get(level_idx).first_order;
        if first_order == POOL_INDEX_INVALID {
            {
                let order = self.orders.get_mut(order_idx);
                order.prev = order_idx;
                order.next = order_idx;
            }
            self.levels.get_mut(level_idx).first_order = order_idx;
        } else {
            let tail_idx = self.orders.get(first_order).prev;
            {
                let order = self.orders.get_mut(order_idx);
                order.prev = tail_idx;
                order.next = first_order;
            }
            self.orders.get_mut(tail_idx).next = order_idx;
            self.orders.get_mut(first_order).prev = order_idx;
        }
    }

    fn add_order(&mut self, order_idx: PoolIndex) {
        let (order_id, side, price) = {
            let order = self.orders.get(order_idx);
            (order.order_id, order.side, order.price)
        };
        let level_idx = match self.level_for_price(price) {
            Some(idx) => idx,
            None => self.insert_level(side, price),
        };
        self.insert_order_into_level(level_idx, order_idx);
        self.oid_to_order.insert(order_id, order_idx);
    }

    fn remove_order_from_level(&mut self, order_idx: PoolIndex) {
        let order = *self.orders.get(order_idx);
        let level_idx = self
            .level_for_price(order.price)
            .expect("consumer order references a price with no level");
        if order.prev == order_idx {
            self.remove_level(level_idx);
        } else {
            self.orders.get_mut(order.prev).next = order.next;
            self.orders.get_mut(order.next).prev = order.prev;
            let level = self.levels.get_mut(level_idx);
            if level.first_order == order_idx {
                level.first_order = order.next;
            }
        }
        self.orders.deallocate(order_idx);
    }

    fn recompute_bbo(&self, side: Side) -> (Option<Price>, Quantity) {
        let head = self.side_head(side);
        if head == POOL_INDEX_INVALID {
            return (None, QUANTITY_INVALID);
        }
        let level = self.levels.get(head);
        let mut qty = 0u32;
        let mut cursor = level.first_order;
        loop {
            qty += self.orders.get(cursor).quantity;
            cursor = self.orders.get(cursor).next;
            if cursor == level.first_order {
                break;
            }
        }
        (Some(level.price), qty)
    }

    fn update_bbo(&mut self, bid_updated: bool, ask_updated: bool, listener: &mut dyn BboListener) {
        if !bid_updated && !ask_updated {
            return;
        }
        if bid_updated {
            let (price, qty) = self.recompute_bbo(Side::Buy);
            self.bbo.bid_price = price;
            self.bbo.bid_quantity = qty;
        }
        if ask_updated {
            let (price, qty) = self.recompute_bbo(Side::Sell);
            self.bbo.ask_price = price;
            self.bbo.ask_quantity = qty;
        }
        listener.on_bbo_update(self.ticker_id, &self.bbo);
    }

    /// Applies one market-update message (ADD/MODIFY/CANCEL; TRADE/CLEAR/
    /// snapshot-framing messages are consumed structurally elsewhere and
    /// ignored here, matching the synthesizer's table in §4.7).
    pub fn on_market_update(&mut self, update: &MarketUpdate, listener: &mut dyn BboListener) {
        match update.kind {
            MarketUpdateType::Add => {
                let order_idx = self.orders.allocate(MarketOrder {
                    order_id: update.order_id,
                    side: update.side,
                    price: update.price,
                    quantity: update.quantity,
                    priority: update.priority,
                    prev: POOL_INDEX_INVALID,
                    next: POOL_INDEX_INVALID,
                });
                self.add_order(order_idx);
                self.update_bbo(update.side == Side::Buy, update.side == Side::Sell, listener);
            }
            MarketUpdateType::Modify => {
                let order_idx = *self
                    .oid_to_order
                    .get(&update.order_id)
                    .unwrap_or_else(|| panic!("MODIFY for untracked order {}", update.order_id));
                self.orders.get_mut(order_idx).quantity = update.quantity;
                self.update_bbo(update.side == Side::Buy, update.side == Side::Sell, listener);
            }
            MarketUpdateType::Cancel => {
                let order_idx = self.oid_to_order.remove(&update.order_id).unwrap_or_else(|| {
                    panic!("CANCEL for untracked order {}", update.order_id)
                });
                let side = self.orders.get(order_idx).side;
                self.remove_order_from_level(order_idx);
                self.update_bbo(side == Side::Buy, side == Side::Sell, listener);
            }
            MarketUpdateType::Clear => {
                self.orders = Pool::new(self.orders.capacity());
                self.levels = Pool::new(self.levels.capacity());
                self.bids_by_price = POOL_INDEX_INVALID;
                self.asks_by_price = POOL_INDEX_INVALID;
                self.price_index = vec![POOL_INDEX_INVALID; MAX_PRICE_LEVELS];
                self.oid_to_order.clear();
                self.bbo = Bbo::empty();
            }
            MarketUpdateType::Trade
            | MarketUpdateType::SnapshotStart
            | MarketUpdateType::SnapshotEnd
            | MarketUpdateType::Invalid => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(order_id: OrderId, side: Side, price: Price, quantity: Quantity) -> MarketUpdate {
        MarketUpdate {
            kind: MarketUpdateType::Add,
            order_id,
            ticker_id: 0,
            side,
            price,
            quantity,
            priority: 1,
        }
    }

    #[test]
    fn bbo_tracks_best_price_each_side() {
        let mut book = ConsumerBook::new(0, 16, 16);
        let mut listener = NullBboListener;
        book.on_market_update(&add(1, Side::Buy, 100, 5), &mut listener);
        book.on_market_update(&add(2, Side::Buy, 101, 3), &mut listener);
        book.on_market_update(&add(3, Side::Sell, 105, 7), &mut listener);

        assert_eq!(book.bbo().bid_price, Some(101));
        assert_eq!(book.bbo().bid_quantity, 3);
        assert_eq!(book.bbo().ask_price, Some(105));
    }

    #[test]
    fn cancel_removes_order_and_updates_bbo() {
        let mut book = ConsumerBook::new(0, 16, 16);
        let mut listener = NullBboListener;
        book.on_market_update(&add(1, Side::Buy, 100, 5), &mut listener);
        let mut cancel = add(1, Side::Buy, 100, 0);
        cancel.kind = MarketUpdateType::Cancel;
        book.on_market_update(&cancel, &mut listener);
        assert_eq!(book.bbo().bid_price, None);
    }

    struct RecordingListener(Vec<Bbo>);
    impl BboListener for RecordingListener {
        fn on_bbo_update(&mut self, _ticker_id: TickerId, bbo: &Bbo) {
            self.0.push(*bbo);
        }
    }

    #[test]
    fn listener_is_invoked_on_bbo_change() {
        let mut book = ConsumerBook::new(0, 16, 16);
        let mut listener = RecordingListener(Vec::new());
        book.on_market_update(&add(1, Side::Buy, 100, 5), &mut listener);
        assert_eq!(listener.0.len(), 1);
        assert_eq!(listener.0[0].bid_price, Some(100));
    }
}
