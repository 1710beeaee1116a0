//! Storage-assigned user keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Surrogate key of a row in `yearbook.user`.
///
/// Assigned by the store on insert. Users are addressed by [`Username`]
/// everywhere else.
///
/// [`Username`]: super::Username
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct UserId(i32);

impl UserId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
