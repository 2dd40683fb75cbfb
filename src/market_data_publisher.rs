//! Drains the matching engine's market-update queue, emits each update on
//! the incremental multicast channel, and tees a sequence-numbered copy to
//! the snapshot synthesizer.
//!
//! Mirrors `exchange/market_data/MarketDataPublisher.hpp`'s field layout
//! (the `.cc` run loop itself was an empty stub in the original source, so
//! the emit/tee/increment body below is built directly from §4.6's three
//! numbered steps).

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::message_codec::encode_mdp_market_update;
use crate::ring_queue::RingQueue;
use crate::types::MarketUpdate;

/// Sends one fully-framed `MDPMarketUpdate` datagram per update, tees the
/// same `(sequence_number, update)` pair onto `snapshot_queue` for the
/// synthesizer, then advances the global sequence counter. Non-blocking;
/// a short send is a fatal configuration error (§4.6, §7).
pub struct MarketDataPublisher {
    socket: UdpSocket,
    dest: std::net::SocketAddr,
    market_updates: Arc<RingQueue<MarketUpdate>>,
    snapshot_queue: Arc<RingQueue<(u64, MarketUpdate)>>,
    next_sequence_number: u64,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MarketDataPublisher {
    pub fn new(
        socket: UdpSocket,
        dest: std::net::SocketAddr,
        market_updates: Arc<RingQueue<MarketUpdate>>,
        snapshot_queue: Arc<RingQueue<(u64, MarketUpdate)>>,
    ) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(MarketDataPublisher {
            socket,
            dest,
            market_updates,
            snapshot_queue,
            next_sequence_number: 1,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let market_updates = Arc::clone(&self.market_updates);
        let snapshot_queue = Arc::clone(&self.snapshot_queue);
        let socket = self.socket.try_clone().expect("duplicate publisher socket");
        let dest = self.dest;
        let mut next_sequence_number = self.next_sequence_number;

        self.handle = Some(thread::spawn(move || {
            tracing::info!("market data publisher thread started");
            while running.load(Ordering::Acquire) {
                match market_updates.peek_read() {
                    Some(update) => {
                        let update = *update;
                        publish_one(&socket, dest, next_sequence_number, &update, &snapshot_queue);
                        next_sequence_number += 1;
                        market_updates.commit_read();
                    }
                    None => continue,
                }
            }
            tracing::info!("market data publisher thread exiting");
        }));
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn publish_one(
    socket: &UdpSocket,
    dest: std::net::SocketAddr,
    sequence_number: u64,
    update: &MarketUpdate,
    snapshot_queue: &RingQueue<(u64, MarketUpdate)>,
) {
    let wire = encode_mdp_market_update(sequence_number, update);
    match socket.send_to(&wire, dest) {
        Ok(n) if n == wire.len() => {}
        Ok(n) => panic!("short send on incremental multicast socket: {n} of {}", wire.len()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            panic!("incremental multicast send would block: datagram size must fit the socket buffer by construction");
        }
        Err(e) => panic!("incremental multicast send failed: {e}"),
    }
    snapshot_queue.push((sequence_number, *update));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketUpdateType, Side};
    use std::net::SocketAddr;
    use std::time::Duration;

    #[test]
    fn emits_and_tees_with_incrementing_sequence() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let recv_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        recv_socket.set_nonblocking(true).unwrap();
        let dest: SocketAddr = recv_socket.local_addr().unwrap();

        let market_updates: Arc<RingQueue<MarketUpdate>> = Arc::new(RingQueue::new(8));
        let snapshot_queue: Arc<RingQueue<(u64, MarketUpdate)>> = Arc::new(RingQueue::new(8));

        let mut publisher = MarketDataPublisher::new(
            socket,
            dest,
            Arc::clone(&market_updates),
            Arc::clone(&snapshot_queue),
        )
        .unwrap();
        publisher.start();

        market_updates.push(MarketUpdate {
            kind: MarketUpdateType::Add,
            order_id: 1,
            ticker_id: 0,
            side: Side::Buy,
            price: 100,
            quantity: 5,
            priority: 1,
        });

        let teed = loop {
            if let Some(v) = snapshot_queue.pop() {
                break v;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(teed.0, 1);

        let mut buf = [0u8; 64];
        let mut received = None;
        for _ in 0..200 {
            if let Ok((n, _)) = recv_socket.recv_from(&mut buf) {
                received = Some(n);
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(received.is_some());

        publisher.stop();
        publisher.join();
    }
}
