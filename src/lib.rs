pub mod cli;
pub mod config;
pub mod contract;
pub mod encoding;
pub mod extract;
pub mod import;
pub mod load_config;
pub mod manifest;
pub mod markdown;
pub mod rehome;
pub mod store;
