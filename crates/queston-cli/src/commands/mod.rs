pub mod common;
pub mod config;
pub mod stats;
pub mod task;
pub mod timer;
