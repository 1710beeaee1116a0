//! Yearbook REST API library.
//!
//! The server binary is a thin wrapper around [`routes::router`]; keeping the
//! application here lets the CLI and the integration tests reuse it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod routes;
pub mod services;
pub mod state;
