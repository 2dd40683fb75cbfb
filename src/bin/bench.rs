//! Synthetic throughput benchmark: feeds a single `Book` a stream of
//! alternating-side limit orders and reports per-order latency
//! percentiles via `HighResultionCounter` + `perf_stats`.

use continuum_match_engine_core::high_resolution_timer::HighResultionCounter;
use continuum_match_engine_core::order_book::Book;
use continuum_match_engine_core::perf_stats::{calculate_perf, print_stats};
use continuum_match_engine_core::ring_queue::RingQueue;
use continuum_match_engine_core::text_output_tool::print_separator;
use continuum_match_engine_core::types::{ClientResponse, MarketUpdate, Side};

fn main() {
    let order_count: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(100_000);
    let cpu_ghz: f64 = std::env::args()
        .nth(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(3.0);

    let mut book = Book::new(0, order_count + 16, 4096);
    let responses: RingQueue<ClientResponse> = RingQueue::new(1 << 16);
    let market_updates: RingQueue<MarketUpdate> = RingQueue::new(1 << 16);

    let mut latencies_ns = Vec::with_capacity(order_count);
    for i in 0..order_count {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        let price: u64 = 10_000 + (i as u64 % 50);
        let timer = HighResultionCounter::start(cpu_ghz);
        book.add(
            1,
            i as u64,
            0,
            side,
            price,
            10,
            &responses,
            &market_updates,
        );
        latencies_ns.push(timer.ns() as u32);
        responses.pop();
        while market_updates.pop().is_some() {}
    }

    print_separator(40);
    println!("orders processed: {order_count}");
    if let Some(stats) = calculate_perf(latencies_ns) {
        print_stats(&stats);
    }
}
