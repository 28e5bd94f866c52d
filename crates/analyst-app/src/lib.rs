//! Repository Analyst client: WASM entry point.
//!
//! This crate is the composition root (DI wiring layer). It picks the
//! storage and transport adapters and exposes the coordinator to
//! JavaScript as [`AnalystClient`].

mod client;
mod config;


pub use client::AnalystClient;
pub use config::{CONFIG_STORAGE_KEY, load_config, merge_json};

use wasm_bindgen::prelude::*;

/// WASM entry point, runs when the module is instantiated
#[wasm_bindgen(start)]
pub fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Repository analyst client starting...");
}
