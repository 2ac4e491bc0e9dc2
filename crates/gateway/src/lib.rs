//! tubechat HTTP server: API routes, chat runtime and CLI plumbing.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
