pub mod ports;
pub mod event_bus;
pub mod repository;
pub mod session_store;
pub mod cache;
pub mod aggregator;
pub mod transcript;
pub mod dispatcher;
pub mod history;
pub mod lifecycle;
pub mod stream_parser;
pub mod coordinator;
