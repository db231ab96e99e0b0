pub mod config;
pub mod error;
pub mod fs;
pub mod graph;
pub mod net;
pub mod service;
pub mod watcher;
