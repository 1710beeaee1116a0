//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;

use yearbook_core::{Grade, PostId, UserId, Username};

/// A stored yearbook user (domain type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    /// Surrogate key assigned by storage.
    pub id: UserId,
    /// Canonical `first.last` username.
    pub username: Username,
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Organizational email.
    pub email: String,
    /// Grade level.
    pub grade: Grade,
    /// When the user was created.
    pub register_date: DateTime<Utc>,
    /// Optional nickname.
    pub nickname: Option<String>,
    /// Profile picture URL.
    pub profile_pic: Option<String>,
    /// Free-form bio.
    pub bio: Option<String>,
    /// Senior will.
    pub will: Option<String>,
    /// Whether the user has completed their first login.
    pub registered: bool,
    /// Ids of posts addressed to this user, oldest first.
    pub inbound_posts: Vec<PostId>,
    /// Ids of posts sent by this user, oldest first.
    pub outbound_posts: Vec<PostId>,
}

/// A partial profile update.
///
/// `None` leaves a field unchanged. Build it with [`UserPatch::new`] so that
/// empty strings are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPatch {
    /// The user to update.
    pub username: Username,
    /// New nickname.
    pub nickname: Option<String>,
    /// New profile picture URL.
    pub profile_pic: Option<String>,
    /// New bio.
    pub bio: Option<String>,
    /// New will.
    pub will: Option<String>,
    /// New grade.
    pub grade: Option<Grade>,
}

impl UserPatch {
    /// Create a patch for `username` that changes nothing.
    #[must_use]
    pub const fn new(username: Username) -> Self {
        Self {
            username,
            nickname: None,
            profile_pic: None,
            bio: None,
            will: None,
            grade: None,
        }
    }

    /// Set the nickname unless `value` is absent or empty.
    #[must_use]
    pub fn nickname(mut self, value: Option<String>) -> Self {
        self.nickname = non_empty(value);
        self
    }

    /// Set the profile picture unless `value` is absent or empty.
    #[must_use]
    pub fn profile_pic(mut self, value: Option<String>) -> Self {
        self.profile_pic = non_empty(value);
        self
    }

    /// Set the bio unless `value` is absent or empty.
    #[must_use]
    pub fn bio(mut self, value: Option<String>) -> Self {
        self.bio = non_empty(value);
        self
    }

    /// Set the will unless `value` is absent or empty.
    #[must_use]
    pub fn will(mut self, value: Option<String>) -> Self {
        self.will = non_empty(value);
        self
    }

    /// Set the grade unless `value` is absent.
    #[must_use]
    pub const fn grade(mut self, value: Option<Grade>) -> Self {
        self.grade = value;
        self
    }

    /// Whether applying this patch would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.profile_pic.is_none()
            && self.bio.is_none()
            && self.will.is_none()
            && self.grade.is_none()
    }

    /// Apply the patch to an in-memory user.
    pub fn apply(&self, user: &mut User) {
        if let Some(nickname) = &self.nickname {
            user.nickname = Some(nickname.clone());
        }
        if let Some(profile_pic) = &self.profile_pic {
            user.profile_pic = Some(profile_pic.clone());
        }
        if let Some(bio) = &self.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(will) = &self.will {
            user.will = Some(will.clone());
        }
        if let Some(grade) = self.grade {
            user.grade = grade;
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// The latest access token issued to an identity-provider subject.
#[derive(Debug, Clone)]
pub struct StoredToken {
    /// Identity-provider subject id.
    pub sub: String,
    /// Access token.
    pub token: SecretString,
    /// Email the provider reported for the subject.
    pub email: String,
}

impl StoredToken {
    /// Whether `presented` is exactly the stored token.
    ///
    /// Equal-length tokens are compared in constant time.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let stored = self.token.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        stored.len() == presented.len() && bool::from(stored.ct_eq(presented))
    }
}
