//! REST handlers for the non-WebSocket surface (spec §6.2).

pub mod knowledge;
pub mod prompts;
pub mod sessions;
pub mod specialists;
pub mod tools_http;
