//! Business logic services for the yearbook server.
//!
//! # Services
//!
//! - `auth` - Bearer-token revalidation, username checks, OAuth login completion

pub mod auth;
