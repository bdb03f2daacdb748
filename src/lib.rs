pub mod analysis;
pub mod config;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod stats;
pub mod table;
