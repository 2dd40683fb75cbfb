pub mod config;
pub mod consumer_book;
pub mod cpu_affinity;
pub mod engine_state;
pub mod error;
pub mod fifo_sequencer;
pub mod high_resolution_timer;
pub mod logging;
pub mod market_data_consumer;
pub mod market_data_publisher;
pub mod matching_engine;
pub mod message_codec;
pub mod number_tool;
pub mod order_book;
pub mod order_gateway;
pub mod perf_stats;
pub mod pool;
pub mod ring_queue;
pub mod snapshot_synthesizer;
pub mod text_output_tool;
pub mod types;
