pub mod analysis;
pub mod message;
pub mod event;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod tests;

pub use error::AnalystError;
pub type Result<T> = std::result::Result<T, AnalystError>;
