//! Content-derived post identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Length of a SHA3-256 digest in bytes.
const DIGEST_LENGTH: usize = 32;

/// Error returned when a string is not a well-formed post ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid post id '{0}'")]
pub struct PostIdError(pub String);

/// A post's external identifier: the hex-encoded SHA3-256 digest of the
/// post's canonical serialization.
///
/// Post IDs are only ever computed server-side. [`PostId::parse`] exists to
/// validate IDs coming back in from URLs and the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct PostId(String);

impl PostId {
    /// Hash arbitrary bytes into a post ID.
    #[must_use]
    pub fn digest(bytes: &[u8]) -> Self {
        let hash = Sha3_256::digest(bytes);
        Self(hex::encode(hash))
    }

    /// Parse a hex-encoded post ID.
    ///
    /// # Errors
    ///
    /// Returns `PostIdError` unless the input is 64 lowercase hex characters.
    pub fn parse(s: &str) -> Result<Self, PostIdError> {
        let well_formed = s.len() == DIGEST_LENGTH * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if well_formed {
            Ok(Self(s.to_owned()))
        } else {
            Err(PostIdError(s.to_owned()))
        }
    }

    /// Returns the post ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PostId {
    type Err = PostIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PostId {
    type Error = PostIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.0
    }
}
