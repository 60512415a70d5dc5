//! desk_lib: the runnable side of the document desk. HTTP adapters for the
//! core ports, configuration, and the WebSocket surface the UI talks to.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
