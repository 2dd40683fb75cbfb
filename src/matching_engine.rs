//! Single-threaded dispatcher: drains the inbound request queue in FIFO
//! order and invokes the right per-ticker book's `add`/`cancel`.
//!
//! Mirrors `exchange/matching/MatchingEngine.{hpp,cc}`: `run`'s read-index
//! only advances after `process_client_request` returns, so `stop` never
//! drops an in-flight request (§4.4, §5's cooperative-shutdown guarantee).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::order_book::Book;
use crate::ring_queue::RingQueue;
use crate::types::{ClientRequest, ClientRequestType, ClientResponse, MarketUpdate, TickerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineLifecycle {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl EngineLifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineLifecycle::Running,
            2 => EngineLifecycle::Stopping,
            _ => EngineLifecycle::Idle,
        }
    }
}

pub struct MatchingEngine {
    books: Vec<Book>,
    requests: Arc<RingQueue<ClientRequest>>,
    responses: Arc<RingQueue<ClientResponse>>,
    market_updates: Arc<RingQueue<MarketUpdate>>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl MatchingEngine {
    /// `books` must be indexed by `ticker_id` (one `Book` per configured
    /// ticker, per §2's array-of-books model).
    pub fn new(
        books: Vec<Book>,
        requests: Arc<RingQueue<ClientRequest>>,
        responses: Arc<RingQueue<ClientResponse>>,
        market_updates: Arc<RingQueue<MarketUpdate>>,
    ) -> Self {
        MatchingEngine {
            books,
            requests,
            responses,
            market_updates,
            state: Arc::new(AtomicU8::new(EngineLifecycle::Idle as u8)),
            handle: None,
        }
    }

    pub fn lifecycle(&self) -> EngineLifecycle {
        EngineLifecycle::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Spawns the dispatcher thread. No-op if already running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.state
            .store(EngineLifecycle::Running as u8, Ordering::Release);

        let mut books = std::mem::take(&mut self.books);
        let requests = Arc::clone(&self.requests);
        let responses = Arc::clone(&self.responses);
        let market_updates = Arc::clone(&self.market_updates);
        let state = Arc::clone(&self.state);

        self.handle = Some(thread::spawn(move || {
            tracing::info!("matching engine thread started");
            while EngineLifecycle::from_u8(state.load(Ordering::Acquire))
                == EngineLifecycle::Running
            {
                match requests.peek_read() {
                    Some(request) => {
                        let request = *request;
                        process_client_request(&mut books, &request, &responses, &market_updates);
                        requests.commit_read();
                    }
                    None => continue,
                }
            }
            tracing::info!("matching engine thread exiting");
        }));
    }

    /// Flips the run flag; the thread exits after finishing any in-flight
    /// request. Does not join — callers sleep/await as the deployment's
    /// shutdown sequencing requires (§5).
    pub fn stop(&mut self) {
        self.state
            .store(EngineLifecycle::Stopping as u8, Ordering::Release);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.state
            .store(EngineLifecycle::Idle as u8, Ordering::Release);
    }
}

fn process_client_request(
    books: &mut [Book],
    request: &ClientRequest,
    responses: &RingQueue<ClientResponse>,
    market_updates: &RingQueue<MarketUpdate>,
) {
    let ticker_id = request.ticker_id as usize;
    assert!(
        ticker_id < books.len(),
        "client request routed to unconfigured ticker {}",
        request.ticker_id
    );
    let book = &mut books[ticker_id];
    match request.kind {
        ClientRequestType::New => book.add(
            request.client_id,
            request.order_id,
            request.ticker_id as TickerId,
            request.side,
            request.price,
            request.quantity,
            responses,
            market_updates,
        ),
        ClientRequestType::Cancel => book.cancel(
            request.client_id,
            request.order_id,
            request.ticker_id as TickerId,
            responses,
            market_updates,
        ),
        ClientRequestType::Invalid => {
            panic!("received invalid client request type: caller contract violation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClientResponseType, Side};
    use std::time::Duration;

    #[test]
    fn processes_add_then_cancel_end_to_end() {
        let books = vec![Book::new(0, 64, 64)];
        let requests: Arc<RingQueue<ClientRequest>> = Arc::new(RingQueue::new(16));
        let responses: Arc<RingQueue<ClientResponse>> = Arc::new(RingQueue::new(16));
        let market_updates: Arc<RingQueue<MarketUpdate>> = Arc::new(RingQueue::new(16));

        let mut engine = MatchingEngine::new(
            books,
            Arc::clone(&requests),
            Arc::clone(&responses),
            Arc::clone(&market_updates),
        );
        engine.start();

        requests.push(ClientRequest {
            kind: ClientRequestType::New,
            client_id: 1,
            ticker_id: 0,
            order_id: 1,
            side: Side::Buy,
            price: 100,
            quantity: 10,
        });

        let accepted = loop {
            if let Some(r) = responses.pop() {
                break r;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(accepted.kind, ClientResponseType::Accepted);

        requests.push(ClientRequest {
            kind: ClientRequestType::Cancel,
            client_id: 1,
            ticker_id: 0,
            order_id: 1,
            side: Side::Invalid,
            price: 0,
            quantity: 0,
        });
        let cancelled = loop {
            if let Some(r) = responses.pop() {
                break r;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(cancelled.kind, ClientResponseType::Cancelled);

        engine.stop();
        engine.join();
    }
}
