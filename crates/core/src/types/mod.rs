//! Core types for the yearbook.
//!
//! This module provides type-safe wrappers for the yearbook's domain concepts.

pub mod grade;
pub mod post;
pub mod post_id;
pub mod user;
pub mod user_id;
pub mod username;

pub use grade::{Grade, GradeError};
pub use post::{Post, PostError, PostLimits};
pub use post_id::{PostId, PostIdError};
pub use user::NewUser;
pub use user_id::UserId;
pub use username::{EmailPolicy, Username, UsernameError};
