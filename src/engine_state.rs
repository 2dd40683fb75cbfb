//! Exchange-side process wiring: builds one `Book` per configured ticker,
//! the matching engine that owns them, the TCP order gateway in front of it,
//! and the market-data publisher/snapshot synthesizer fed by its output
//! queue (§6's "process interface" is exactly this set of constructor
//! arguments plumbed together).

use std::io;
use std::net::{SocketAddr, TcpListener, UdpSocket};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::matching_engine::MatchingEngine;
use crate::market_data_publisher::MarketDataPublisher;
use crate::message_codec::encode_mdp_market_update;
use crate::order_book::Book;
use crate::order_gateway::OrderGateway;
use crate::ring_queue::RingQueue;
use crate::snapshot_synthesizer::{SnapshotCycle, SnapshotSynthesizer};
use crate::types::{
    ClientRequest, ClientResponse, MarketUpdate, CLIENT_QUEUE_DEPTH, MD_QUEUE_DEPTH,
};

/// Owns every long-lived piece of the exchange process and their shared
/// queues. Dropping it does not stop the background threads; call `stop()`
/// then `join()` for an orderly shutdown (§5).
pub struct ExchangeProcess {
    pub matching_engine: MatchingEngine,
    pub order_gateway: OrderGateway,
    pub publisher: MarketDataPublisher,
    pub synthesizer: SnapshotSynthesizer,
    snapshot_queue: Arc<RingQueue<(u64, MarketUpdate)>>,
    /// Outbound socket for the snapshot multicast group, separate from the
    /// publisher's incremental socket (§6's "two multicast groups").
    snapshot_socket: UdpSocket,
    snapshot_dest: SocketAddr,
}

impl ExchangeProcess {
    pub fn build(config: &EngineConfig) -> std::io::Result<Self> {
        let max_ticker_id = config.tickers.iter().copied().max().unwrap_or(0);
        let books: Vec<Book> = (0..=max_ticker_id)
            .map(|ticker_id| {
                Book::new(
                    ticker_id,
                    config.max_orders_per_ticker as usize,
                    config.max_levels_per_ticker as usize,
                )
            })
            .collect();

        let requests: Arc<RingQueue<ClientRequest>> = Arc::new(RingQueue::new(CLIENT_QUEUE_DEPTH));
        let responses: Arc<RingQueue<ClientResponse>> = Arc::new(RingQueue::new(CLIENT_QUEUE_DEPTH));
        let market_updates: Arc<RingQueue<MarketUpdate>> = Arc::new(RingQueue::new(MD_QUEUE_DEPTH));
        let snapshot_queue: Arc<RingQueue<(u64, MarketUpdate)>> =
            Arc::new(RingQueue::new(MD_QUEUE_DEPTH));

        let matching_engine = MatchingEngine::new(
            books,
            Arc::clone(&requests),
            Arc::clone(&responses),
            Arc::clone(&market_updates),
        );

        let listener = TcpListener::bind(&config.tcp_bind_addr)?;
        let order_gateway = OrderGateway::new(listener, Arc::clone(&requests), Arc::clone(&responses))?;

        let publish_socket = UdpSocket::bind("0.0.0.0:0")?;
        let dest = format!("{}:{}", config.incremental.group, config.incremental.port)
            .parse()
            .expect("incremental multicast address must be valid");
        let publisher = MarketDataPublisher::new(
            publish_socket,
            dest,
            Arc::clone(&market_updates),
            Arc::clone(&snapshot_queue),
        )?;

        let synthesizer = SnapshotSynthesizer::new(books_len(max_ticker_id));

        let snapshot_socket = UdpSocket::bind("0.0.0.0:0")?;
        snapshot_socket.set_nonblocking(true)?;
        let snapshot_dest = format!("{}:{}", config.snapshot.group, config.snapshot.port)
            .parse()
            .expect("snapshot multicast address must be valid");

        Ok(ExchangeProcess {
            matching_engine,
            order_gateway,
            publisher,
            synthesizer,
            snapshot_queue,
            snapshot_socket,
            snapshot_dest,
        })
    }

    /// Drains whatever the publisher has teed so far into the synthesizer's
    /// running state. Intended to be polled on the same thread that drives
    /// periodic snapshot publication (§4.7).
    pub fn drain_teed_updates(&mut self) {
        while let Some(&(sequence_number, update)) = self.snapshot_queue.peek_read() {
            self.synthesizer.add_to_snapshot(sequence_number, &update);
            self.snapshot_queue.commit_read();
        }
    }

    /// Builds one snapshot cycle from the synthesizer's current state and
    /// emits every framed message on the snapshot multicast socket (§4.7,
    /// §6's "two multicast groups"). Symmetric to
    /// `market_data_publisher::publish_one`'s incremental send.
    pub fn publish_snapshot(&mut self, now: std::time::Instant) -> SnapshotCycle {
        let cycle = self.synthesizer.publish_snapshot(now);
        for &(sequence_number, update) in &cycle.messages {
            let wire = encode_mdp_market_update(sequence_number, &update);
            match self.snapshot_socket.send_to(&wire, self.snapshot_dest) {
                Ok(n) if n == wire.len() => {}
                Ok(n) => panic!("short send on snapshot multicast socket: {n} of {}", wire.len()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    panic!("snapshot multicast send would block: datagram size must fit the socket buffer by construction");
                }
                Err(e) => panic!("snapshot multicast send failed: {e}"),
            }
        }
        cycle
    }

    pub fn start(&mut self) {
        self.matching_engine.start();
        self.publisher.start();
    }

    pub fn stop(&mut self) {
        self.matching_engine.stop();
        self.publisher.stop();
        self.order_gateway
            .running_handle()
            .store(false, std::sync::atomic::Ordering::Release);
    }

    pub fn join(&mut self) {
        self.matching_engine.join();
        self.publisher.join();
    }
}

fn books_len(max_ticker_id: crate::types::TickerId) -> usize {
    max_ticker_id as usize + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let config = EngineConfig::from_iter(std::iter::empty()).unwrap();
        let exchange = ExchangeProcess::build(&config).unwrap();
        assert_eq!(exchange.matching_engine.lifecycle(), crate::matching_engine::EngineLifecycle::Idle);
    }
}
