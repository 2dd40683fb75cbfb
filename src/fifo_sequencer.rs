//! Batches per-arrival client requests and linearises them by kernel
//! receive time before publishing into the matching engine's request queue.
//!
//! Mirrors `exchange/order_server/FifoSequencer.hpp`: `add_client_request`
//! per decoded request, `sequence_and_publish` at end-of-batch. Overflow of
//! the fixed-capacity batch is fatal (§4.5, §7) — the batch is sized to
//! exceed worst-case burst, so hitting the limit is a configuration bug.

use crate::ring_queue::RingQueue;
use crate::types::{ClientRequest, MAX_PENDING_REQUESTS};

#[derive(Clone, Copy)]
struct RecvTimeClientRequest {
    recv_time: u64,
    request: ClientRequest,
}

pub struct FifoSequencer {
    pending: Vec<RecvTimeClientRequest>,
}

impl FifoSequencer {
    pub fn new() -> Self {
        FifoSequencer {
            pending: Vec::with_capacity(MAX_PENDING_REQUESTS),
        }
    }

    /// Queue one request observed at `rx_time` (nanoseconds, monotonic).
    pub fn add_client_request(&mut self, rx_time: u64, request: ClientRequest) {
        assert!(
            self.pending.len() < MAX_PENDING_REQUESTS,
            "FIFO sequencer batch overflow: more than {MAX_PENDING_REQUESTS} pending requests"
        );
        self.pending.push(RecvTimeClientRequest {
            recv_time: rx_time,
            request,
        });
    }

    /// Stable-sort the batch by `rx_time` (ties broken by arrival/insertion
    /// order per §5) and publish it into `engine_requests` in that order.
    pub fn sequence_and_publish(&mut self, engine_requests: &RingQueue<ClientRequest>) {
        if self.pending.is_empty() {
            return;
        }
        self.pending.sort_by_key(|r| r.recv_time);
        for entry in self.pending.drain(..) {
            engine_requests.push(entry.request);
        }
    }
}

impl Default for FifoSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientRequestType, Side};

    fn req(order_id: u64) -> ClientRequest {
        ClientRequest {
            kind: ClientRequestType::New,
            client_id: 0,
            ticker_id: 0,
            order_id,
            side: Side::Buy,
            price: 100,
            quantity: 1,
        }
    }

    #[test]
    fn sorts_batch_by_receive_time_across_clients() {
        let mut seq = FifoSequencer::new();
        seq.add_client_request(200, req(1));
        seq.add_client_request(100, req(2));
        seq.add_client_request(150, req(3));

        let queue: RingQueue<ClientRequest> = RingQueue::new(8);
        seq.sequence_and_publish(&queue);

        assert_eq!(queue.pop().unwrap().order_id, 2);
        assert_eq!(queue.pop().unwrap().order_id, 3);
        assert_eq!(queue.pop().unwrap().order_id, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut seq = FifoSequencer::new();
        seq.add_client_request(100, req(1));
        seq.add_client_request(100, req(2));

        let queue: RingQueue<ClientRequest> = RingQueue::new(8);
        seq.sequence_and_publish(&queue);

        assert_eq!(queue.pop().unwrap().order_id, 1);
        assert_eq!(queue.pop().unwrap().order_id, 2);
    }

    #[test]
    #[should_panic(expected = "FIFO sequencer batch overflow")]
    fn overflow_is_fatal() {
        let mut seq = FifoSequencer::new();
        for i in 0..=MAX_PENDING_REQUESTS {
            seq.add_client_request(i as u64, req(i as u64));
        }
    }
}
