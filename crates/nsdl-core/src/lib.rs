pub mod config;
pub mod error;
pub mod logging;
pub mod progress;

// Pipeline: resolve -> select -> fetch
pub mod catalog;
pub mod checksum;
pub mod fetch;
pub mod http;
pub mod inventory;
pub mod resolver;
pub mod selection;
