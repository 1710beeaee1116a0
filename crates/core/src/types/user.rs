//! New-user records, validated before they reach storage.

use chrono::{DateTime, SubsecRound, Utc};

use super::grade::Grade;
use super::username::{EmailPolicy, Username, UsernameError};

/// A validated user that has not been stored yet.
///
/// Names and email are derived from the username so they can never
/// disagree with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Canonical `first.last` username.
    pub username: Username,
    /// First name, as it appears in the username.
    pub firstname: String,
    /// Last name, as it appears in the username.
    pub lastname: String,
    /// Organizational email reconstructed from the username.
    pub email: String,
    /// Grade level.
    pub grade: Grade,
    /// When the user was created.
    pub register_date: DateTime<Utc>,
    /// Whether the user has completed their first login.
    pub registered: bool,
}

impl NewUser {
    /// Build a new user from an organizational email.
    ///
    /// # Errors
    ///
    /// Returns the `UsernameError` from [`EmailPolicy::username_from_email`].
    pub fn new(
        email: &str,
        grade: Grade,
        registered: bool,
        policy: &EmailPolicy,
    ) -> Result<Self, UsernameError> {
        let username = policy.username_from_email(email)?;
        Ok(Self::from_username(username, grade, registered, policy))
    }

    /// Build a new user from an already-validated username.
    #[must_use]
    pub fn from_username(
        username: Username,
        grade: Grade,
        registered: bool,
        policy: &EmailPolicy,
    ) -> Self {
        Self {
            firstname: username.firstname().to_owned(),
            lastname: username.lastname().to_owned(),
            email: policy.email_for(&username),
            username,
            grade,
            register_date: Utc::now().trunc_subsecs(6),
            registered,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_derives_fields() {
        let policy = EmailPolicy::new("@school.org", 64);
        let user = NewUser::new("cool.dude@school.org", Grade::Sophomore, false, &policy).unwrap();
        assert_eq!(user.username.as_str(), "cool.dude");
        assert_eq!(user.firstname, "cool");
        assert_eq!(user.lastname, "dude");
        assert_eq!(user.email, "cool.dude@school.org");
        assert_eq!(user.grade, Grade::Sophomore);
        assert!(!user.registered);
    }

    #[test]
    fn test_new_user_rejects_foreign_email() {
        let policy = EmailPolicy::new("@school.org", 64);
        assert!(NewUser::new("cool.dude@gmail.com", Grade::Senior, true, &policy).is_err());
    }
}
