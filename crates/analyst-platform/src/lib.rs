//! Browser adapters implementing the analyst-core ports via wasm-bindgen.

pub mod rest;
pub mod storage;
pub mod transport;

pub use rest::HttpRestClient;
