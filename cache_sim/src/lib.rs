pub mod cache;
pub mod config;
pub mod hierarchy;
pub mod memory;
pub mod sim;
pub mod stat;
pub mod tracer;
