pub mod client;
pub mod config;
pub mod informer;
pub mod models;
pub mod objects;
pub mod utils;
