//! Exchange process entry point: parses `EngineConfig`, pins the calling
//! thread's preferred cores where configured, wires up the matching engine,
//! order gateway, publisher, and snapshot synthesizer, and drives the poll
//! loop until interrupted.

use std::time::Instant;

use continuum_match_engine_core::config::EngineConfig;
use continuum_match_engine_core::cpu_affinity::set_core;
use continuum_match_engine_core::engine_state::ExchangeProcess;
use continuum_match_engine_core::logging;

fn main() {
    logging::init();

    let config = match EngineConfig::from_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    for &core in &config.core_pins {
        if !set_core(core) {
            tracing::warn!("failed to pin to core {core}, continuing unpinned");
        }
    }

    let mut exchange = ExchangeProcess::build(&config).expect("failed to build exchange process");
    tracing::info!(tag = %config.instance_tag, tickers = ?config.tickers, "starting exchange process");
    exchange.start();

    loop {
        exchange.order_gateway.poll_once();
        exchange.drain_teed_updates();

        if exchange.synthesizer.due_for_publish(Instant::now()) {
            let cycle = exchange.publish_snapshot(Instant::now());
            tracing::info!(messages = cycle.messages.len(), "published snapshot cycle");
        }
    }
}
