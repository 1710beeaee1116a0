//! Yearbook Core - Shared domain types.
//!
//! This crate provides the domain model used by every yearbook component:
//! - `server` - The REST API backend
//! - `cli` - Command-line tools for migrations and administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Username derivation, post validation and post
//! content hashing all live here so they can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Usernames, grades, posts, post IDs and new-user records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
