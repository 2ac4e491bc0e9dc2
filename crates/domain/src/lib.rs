pub mod chart;
pub mod chat;
pub mod config;
pub mod error;
pub mod stream;
pub mod tool;
pub mod trace;
