//! Exchange-side order book: price-time priority matching over arena-indexed
//! intrusive circular lists, one per ticker.
//!
//! The list-surgery algorithms (insert/remove order, insert/remove level)
//! and `match`/`checkForMatch`/`add`/`cancel` bodies mirror
//! `exchange/matching/OrderBook.{hpp,cc}`, restructured from raw prev/next
//! pointers onto pool indices.

use ahash::AHashMap;

use crate::pool::Pool;
use crate::ring_queue::RingQueue;
use crate::types::{
    ClientId, ClientResponse, ClientResponseType, MarketUpdate, MarketUpdateType, OrderId, Price,
    PoolIndex, Priority, Quantity, Side, TickerId, MAX_CLIENTS, MAX_PRICE_LEVELS,
    POOL_INDEX_INVALID, PRICE_INVALID, PRIORITY_INVALID, QUANTITY_INVALID,
};

#[derive(Debug, Clone, Copy)]
struct Order {
    client_id: ClientId,
    client_order_id: OrderId,
    market_order_id: OrderId,
    side: Side,
    price: Price,
    quantity: Quantity,
    priority: Priority,
    prev: PoolIndex,
    next: PoolIndex,
}

#[derive(Debug, Clone, Copy)]
struct OrdersAtPrice {
    side: Side,
    price: Price,
    first_order: PoolIndex,
    prev_entry: PoolIndex,
    next_entry: PoolIndex,
}

/// Per-instrument price-time priority book. Owned and mutated by exactly one
/// thread (the matching engine's).
pub struct Book {
    ticker_id: TickerId,
    orders: Pool<Order>,
    levels: Pool<OrdersAtPrice>,
    bids_by_price: PoolIndex,
    asks_by_price: PoolIndex,
    price_index: Vec<PoolIndex>,
    cid_oid_to_order: AHashMap<(ClientId, OrderId), PoolIndex>,
    next_market_order_id: OrderId,
}

impl Book {
    pub fn new(ticker_id: TickerId, max_orders: usize, max_levels: usize) -> Self {
        Book {
            ticker_id,
            orders: Pool::new(max_orders),
            levels: Pool::new(max_levels.max(MAX_PRICE_LEVELS)),
            bids_by_price: POOL_INDEX_INVALID,
            asks_by_price: POOL_INDEX_INVALID,
            price_index: vec![POOL_INDEX_INVALID; MAX_PRICE_LEVELS],
            cid_oid_to_order: AHashMap::with_capacity(MAX_CLIENTS * 4),
            next_market_order_id: 1,
        }
    }

    pub fn ticker_id(&self) -> TickerId {
        self.ticker_id
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

    /// Best bid price, if any resting bids exist.
    pub fn best_bid(&self) -> Option<Price> {
        if self.bids_by_price == POOL_INDEX_INVALID {
            None
        } else {
            Some(self.levels.get(self.bids_by_price).price)
        }
    }

    /// Best ask price, if any resting asks exist.
    pub fn best_ask(&self) -> Option<Price> {
        if self.asks_by_price == POOL_INDEX_INVALID {
            None
        } else {
            Some(self.levels.get(self.asks_by_price).price)
        }
    }

    fn level_for_price(&self, price: Price) -> Option<PoolIndex> {
        let idx = self.price_index[price as usize % MAX_PRICE_LEVELS];
        if idx == POOL_INDEX_INVALID {
            return None;
        }
        if self.levels.get(idx).price != price {
            // A different price currently occupies this slot: the
            // price-range contract (spec §9 open question) has been
            // violated. Surfaced loudly rather than silently mismatched.
            debug_assert!(
                false,
                "price index collision: slot {} holds price {} while {} was requested",
                price as usize % MAX_PRICE_LEVELS,
                self.levels.get(idx).price,
                price
            );
            return None;
        }
        Some(idx)
    }

    fn next_priority(&self, price: Price) -> Priority {
        match self.level_for_price(price) {
            None => 1,
            Some(level_idx) => {
                let level = self.levels.get(level_idx);
                if level.first_order == POOL_INDEX_INVALID {
                    1
                } else {
                    let tail = self.orders.get(self.orders.get(level.first_order).prev);
                    tail.priority + 1
                }
            }
        }
    }

    /// Splice order `order_idx` into `level_idx`'s circular order list,
    /// appending at the tail (the current head's `prev`).
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

    /// Locate the correct position and splice a brand-new level for `side`
    /// at `price` into the side's circular level list; promote it to head
    /// if it is now the best price.
    fn insert_level(&mut self, side: Side, price: Price) -> PoolIndex {
        let new_level = self.levels.allocate(OrdersAtPrice {
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

        // Walk from head looking for the first level whose price the new
        // level should be inserted before.
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
                // New level is the worst price: append at the tail (head's prev).
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

    fn remove_order_from_level(&mut self, order_idx: PoolIndex) {
        let order = *self.orders.get(order_idx);
        let level_idx = self
            .level_for_price(order.price)
            .expect("order references a price with no level");
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

    fn remove_order(&mut self, order_idx: PoolIndex) {
        let order = *self.orders.get(order_idx);
        self.cid_oid_to_order
            .remove(&(order.client_id, order.client_order_id));
        self.remove_order_from_level(order_idx);
    }

    fn add_order(&mut self, order_idx: PoolIndex) {
        let (side, price) = {
            let order = self.orders.get(order_idx);
            (order.side, order.price)
        };
        let level_idx = match self.level_for_price(price) {
            Some(idx) => idx,
            None => self.insert_level(side, price),
        };
        self.insert_order_into_level(level_idx, order_idx);
    }

    /// `fill = min(resting.quantity, leaves)`. Deducts from both sides,
    /// emits FILLED to both parties, then CANCEL (fully filled) or MODIFY
    /// (partial) for the resting order.
    fn do_match(
        &mut self,
        ticker_id: TickerId,
        client_id: ClientId,
        side: Side,
        client_order_id: OrderId,
        new_market_order_id: OrderId,
        resting_idx: PoolIndex,
        leaves_quantity: &mut Quantity,
        responses: &RingQueue<ClientResponse>,
        market_updates: &RingQueue<MarketUpdate>,
    ) {
        let order_quantity = self.orders.get(resting_idx).quantity;
        let fill_quantity = order_quantity.min(*leaves_quantity);
        *leaves_quantity -= fill_quantity;
        self.orders.get_mut(resting_idx).quantity -= fill_quantity;

        let resting_price = self.orders.get(resting_idx).price;
        responses.push(ClientResponse {
            kind: ClientResponseType::Filled,
            client_id,
            ticker_id,
            client_order_id,
            market_order_id: new_market_order_id,
            side,
            price: resting_price,
            exec_quantity: fill_quantity,
            leaves_quantity: *leaves_quantity,
        });

        let resting = *self.orders.get(resting_idx);
        responses.push(ClientResponse {
            kind: ClientResponseType::Filled,
            client_id: resting.client_id,
            ticker_id,
            client_order_id: resting.client_order_id,
            market_order_id: resting.market_order_id,
            side: resting.side,
            price: resting_price,
            exec_quantity: fill_quantity,
            leaves_quantity: resting.quantity,
        });

        if resting.quantity == 0 {
            market_updates.push(MarketUpdate {
                kind: MarketUpdateType::Cancel,
                order_id: resting.market_order_id,
                ticker_id,
                side: resting.side,
                price: resting.price,
                quantity: order_quantity,
                priority: PRIORITY_INVALID,
            });
            self.remove_order(resting_idx);
        } else {
            market_updates.push(MarketUpdate {
                kind: MarketUpdateType::Modify,
                order_id: resting.market_order_id,
                ticker_id,
                side: resting.side,
                price: resting.price,
                quantity: resting.quantity,
                priority: resting.priority,
            });
        }
    }

    fn check_for_match(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        ticker_id: TickerId,
        side: Side,
        price: Price,
        quantity: Quantity,
        new_market_order_id: OrderId,
        responses: &RingQueue<ClientResponse>,
        market_updates: &RingQueue<MarketUpdate>,
    ) -> Quantity {
        let mut leaves_quantity = quantity;
        if side == Side::Buy {
            while leaves_quantity > 0 && self.asks_by_price != POOL_INDEX_INVALID {
                let ask_level = self.levels.get(self.asks_by_price);
                if price < ask_level.price {
                    break;
                }
                let ask_order = self.levels.get(self.asks_by_price).first_order;
                self.do_match(
                    ticker_id,
                    client_id,
                    side,
                    client_order_id,
                    new_market_order_id,
                    ask_order,
                    &mut leaves_quantity,
                    responses,
                    market_updates,
                );
            }
        } else if side == Side::Sell {
            while leaves_quantity > 0 && self.bids_by_price != POOL_INDEX_INVALID {
                let bid_level = self.levels.get(self.bids_by_price);
                if price > bid_level.price {
                    break;
                }
                let bid_order = self.levels.get(self.bids_by_price).first_order;
                self.do_match(
                    ticker_id,
                    client_id,
                    side,
                    client_order_id,
                    new_market_order_id,
                    bid_order,
                    &mut leaves_quantity,
                    responses,
                    market_updates,
                );
            }
        }
        leaves_quantity
    }

    /// Accept a new limit order: ACCEPTED, then match, then rest any residual.
    pub fn add(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        ticker_id: TickerId,
        side: Side,
        price: Price,
        quantity: Quantity,
        responses: &RingQueue<ClientResponse>,
        market_updates: &RingQueue<MarketUpdate>,
    ) {
        assert_eq!(ticker_id, self.ticker_id, "add() routed to the wrong book");
        let new_market_order_id = self.next_market_order_id;
        self.next_market_order_id += 1;

        responses.push(ClientResponse {
            kind: ClientResponseType::Accepted,
            client_id,
            ticker_id,
            client_order_id,
            market_order_id: new_market_order_id,
            side,
            price,
            exec_quantity: 0,
            leaves_quantity: quantity,
        });

        let leaves_quantity = self.check_for_match(
            client_id,
            client_order_id,
            ticker_id,
            side,
            price,
            quantity,
            new_market_order_id,
            responses,
            market_updates,
        );

        if leaves_quantity > 0 {
            let priority = self.next_priority(price);
            let order_idx = self.orders.allocate(Order {
                client_id,
                client_order_id,
                market_order_id: new_market_order_id,
                side,
                price,
                quantity: leaves_quantity,
                priority,
                prev: POOL_INDEX_INVALID,
                next: POOL_INDEX_INVALID,
            });
            self.cid_oid_to_order
                .insert((client_id, client_order_id), order_idx);
            self.add_order(order_idx);
            market_updates.push(MarketUpdate {
                kind: MarketUpdateType::Add,
                order_id: new_market_order_id,
                ticker_id,
                side,
                price,
                quantity: leaves_quantity,
                priority,
            });
        }
    }

    /// Cancel a resting order by (client_id, client_order_id). Never matches.
    pub fn cancel(
        &mut self,
        client_id: ClientId,
        client_order_id: OrderId,
        ticker_id: TickerId,
        responses: &RingQueue<ClientResponse>,
        market_updates: &RingQueue<MarketUpdate>,
    ) {
        match self.cid_oid_to_order.get(&(client_id, client_order_id)).copied() {
            None => {
                responses.push(ClientResponse {
                    kind: ClientResponseType::CancelRejected,
                    client_id,
                    ticker_id,
                    client_order_id,
                    market_order_id: crate::types::ORDER_ID_INVALID,
                    side: Side::Invalid,
                    price: PRICE_INVALID,
                    exec_quantity: QUANTITY_INVALID,
                    leaves_quantity: QUANTITY_INVALID,
                });
            }
            Some(order_idx) => {
                let order = *self.orders.get(order_idx);
                responses.push(ClientResponse {
                    kind: ClientResponseType::Cancelled,
                    client_id,
                    ticker_id,
                    client_order_id,
                    market_order_id: order.market_order_id,
                    side: order.side,
                    price: order.price,
                    exec_quantity: QUANTITY_INVALID,
                    leaves_quantity: order.quantity,
                });
                market_updates.push(MarketUpdate {
                    kind: MarketUpdateType::Cancel,
                    order_id: order.market_order_id,
                    ticker_id,
                    side: order.side,
                    price: order.price,
                    quantity: 0,
                    priority: order.priority,
                });
                self.remove_order(order_idx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn book() -> Book {
        Book::new(0, 64, 64)
    }

    #[test]
    fn cross_and_rest() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(64);
        let md: RingQueue<MarketUpdate> = RingQueue::new(64);

        b.add(1, 1, 0, Side::Buy, 100, 10, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::Accepted);
        let add_update = md.pop().unwrap();
        assert_eq!(add_update.kind, MarketUpdateType::Add);
        assert_eq!(add_update.priority, 1);

        b.add(2, 1, 0, Side::Sell, 98, 4, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::Accepted);
        let f1 = rsp.pop().unwrap();
        assert_eq!(f1.kind, ClientResponseType::Filled);
        assert_eq!(f1.exec_quantity, 4);
        let f2 = rsp.pop().unwrap();
        assert_eq!(f2.kind, ClientResponseType::Filled);
        assert_eq!(f2.exec_quantity, 4);
        let modify = md.pop().unwrap();
        assert_eq!(modify.kind, MarketUpdateType::Modify);
        assert_eq!(modify.quantity, 6);

        assert_eq!(b.best_bid(), Some(100));
        assert_eq!(b.best_ask(), None);
    }

    #[test]
    fn price_time_priority() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(64);
        let md: RingQueue<MarketUpdate> = RingQueue::new(64);

        b.add(1, 1, 0, Side::Buy, 100, 5, &rsp, &md);
        rsp.pop();
        md.pop();
        b.add(2, 1, 0, Side::Buy, 100, 7, &rsp, &md);
        rsp.pop();
        md.pop();
        b.add(3, 1, 0, Side::Sell, 100, 10, &rsp, &md);

        rsp.pop(); // ACCEPTED for incoming sell
        let f1 = rsp.pop().unwrap(); // FILLED for incoming, against c=1
        assert_eq!(f1.exec_quantity, 5);
        let f2 = rsp.pop().unwrap(); // FILLED for c=1
        assert_eq!(f2.client_id, 1);
        assert_eq!(f2.exec_quantity, 5);
        let cancel_md = md.pop().unwrap();
        assert_eq!(cancel_md.kind, MarketUpdateType::Cancel);

        let f3 = rsp.pop().unwrap(); // FILLED for incoming, against c=2
        assert_eq!(f3.exec_quantity, 5);
        let f4 = rsp.pop().unwrap(); // FILLED for c=2
        assert_eq!(f4.client_id, 2);
        assert_eq!(f4.exec_quantity, 5);
        assert_eq!(f4.leaves_quantity, 2);
        let modify_md = md.pop().unwrap();
        assert_eq!(modify_md.kind, MarketUpdateType::Modify);
        assert_eq!(modify_md.quantity, 2);
        assert_eq!(modify_md.priority, 2);
    }

    #[test]
    fn cancel_reject_on_empty_book() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(8);
        let md: RingQueue<MarketUpdate> = RingQueue::new(8);
        b.cancel(9, 9, 0, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::CancelRejected);
        assert!(md.is_empty());
    }

    #[test]
    fn cancel_wrong_client_for_existing_order_id_is_rejected() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(8);
        let md: RingQueue<MarketUpdate> = RingQueue::new(8);
        b.add(1, 1, 0, Side::Buy, 100, 10, &rsp, &md);
        rsp.pop();
        md.pop();
        // same client_order_id value, different client: must not resolve to c=1's order.
        b.cancel(2, 1, 0, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::CancelRejected);
    }

    #[test]
    fn equal_price_crosses() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(8);
        let md: RingQueue<MarketUpdate> = RingQueue::new(8);
        b.add(1, 1, 0, Side::Sell, 100, 5, &rsp, &md);
        rsp.pop();
        md.pop();
        b.add(2, 1, 0, Side::Buy, 100, 5, &rsp, &md);
        rsp.pop(); // accepted
        let filled = rsp.pop().unwrap();
        assert_eq!(filled.kind, ClientResponseType::Filled);
    }

    #[test]
    fn rests_without_fill_below_best_ask() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(8);
        let md: RingQueue<MarketUpdate> = RingQueue::new(8);
        b.add(1, 1, 0, Side::Sell, 100, 5, &rsp, &md);
        rsp.pop();
        md.pop();
        b.add(2, 1, 0, Side::Buy, 99, 5, &rsp, &md);
        rsp.pop(); // accepted
        let add_update = md.pop().unwrap();
        assert_eq!(add_update.kind, MarketUpdateType::Add);
        assert_eq!(b.best_bid(), Some(99));
        assert_eq!(b.best_ask(), Some(100));
    }

    #[test]
    fn double_cancel_second_is_rejected() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(8);
        let md: RingQueue<MarketUpdate> = RingQueue::new(8);
        b.add(1, 1, 0, Side::Buy, 100, 10, &rsp, &md);
        rsp.pop();
        md.pop();
        b.cancel(1, 1, 0, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::Cancelled);
        md.pop();
        b.cancel(1, 1, 0, &rsp, &md);
        assert_eq!(rsp.pop().unwrap().kind, ClientResponseType::CancelRejected);
    }

    #[test]
    fn multiple_levels_stay_sorted() {
        let mut b = book();
        let rsp: RingQueue<ClientResponse> = RingQueue::new(32);
        let md: RingQueue<MarketUpdate> = RingQueue::new(32);
        for price in [101, 99, 103, 100] {
            b.add(1, price, 0, Side::Sell, price, 1, &rsp, &md);
            rsp.pop();
            md.pop();
        }
        assert_eq!(b.best_ask(), Some(99));
    }

    /// Walks a side's level list from its head, collecting prices in
    /// `next_entry` order (used to assert sortedness invariants).
    fn level_prices(b: &Book, side: Side) -> Vec<Price> {
        let mut out = Vec::new();
        let head = match side {
            Side::Buy => b.bids_by_price,
            Side::Sell => b.asks_by_price,
            Side::Invalid => return out,
        };
        if head == POOL_INDEX_INVALID {
            return out;
        }
        let mut cursor = head;
        loop {
            out.push(b.levels.get(cursor).price);
            cursor = b.levels.get(cursor).next_entry;
            if cursor == head {
                break;
            }
        }
        out
    }

    proptest! {
        #[test]
        fn book_never_crosses_and_stays_sorted(
            ops in prop::collection::vec(
                (0u32..4, 0u64..6, any::<bool>(), 95u64..106, 1u32..10),
                1..80,
            )
        ) {
            let mut b = book();
            let rsp: RingQueue<ClientResponse> = RingQueue::new(256);
            let md: RingQueue<MarketUpdate> = RingQueue::new(256);

            for (client_id, order_id, is_buy, price, quantity) in ops {
                let side = if is_buy { Side::Buy } else { Side::Sell };
                if order_id % 3 == 0 {
                    b.cancel(client_id, order_id, 0, &rsp, &md);
                } else {
                    b.add(client_id, order_id, 0, side, price, quantity, &rsp, &md);
                }
                while rsp.pop().is_some() {}
                while md.pop().is_some() {}

                if let (Some(bid), Some(ask)) = (b.best_bid(), b.best_ask()) {
                    prop_assert!(bid < ask, "book crossed: bid {} >= ask {}", bid, ask);
                }

                let bids = level_prices(&b, Side::Buy);
                for w in bids.windows(2) {
                    prop_assert!(w[0] > w[1], "bid levels not strictly decreasing: {:?}", bids);
                }
                let asks = level_prices(&b, Side::Sell);
                for w in asks.windows(2) {
                    prop_assert!(w[0] < w[1], "ask levels not strictly increasing: {:?}", asks);
                }
            }
        }
    }
}
