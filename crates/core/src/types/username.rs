//! Usernames derived from organizational email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when deriving or parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// The email is longer than the configured maximum.
    #[error("email must be at most {max} characters")]
    EmailTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email is not longer than the organization suffix itself.
    #[error("email is too short")]
    EmailTooShort,
    /// The email does not end with the organization suffix.
    #[error("email must end with {suffix}")]
    WrongDomain {
        /// The accepted suffix.
        suffix: String,
    },
    /// The username is not of the form `first.last`.
    #[error("malformed username '{0}'")]
    Malformed(String),
}

/// A canonical `first.last` username.
///
/// Usernames are the natural key for users and are embedded directly in
/// posts as sender and recipients.
///
/// ## Constraints
///
/// - Exactly one `.` separating a non-empty first and last name
/// - No `@`, `/` or whitespace
///
/// ## Examples
///
/// ```
/// use yearbook_core::Username;
///
/// let username = Username::parse("jane.doe").unwrap();
/// assert_eq!(username.firstname(), "jane");
/// assert_eq!(username.display_name(), "Jane Doe");
///
/// assert!(Username::parse("jane").is_err());
/// assert!(Username::parse("jane.m.doe").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    /// Parse a username supplied directly (e.g. a post sender or recipient).
    ///
    /// # Errors
    ///
    /// Returns `UsernameError::Malformed` if the input fails [`Username::is_valid`].
    pub fn parse(s: &str) -> Result<Self, UsernameError> {
        if Self::is_valid(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(UsernameError::Malformed(s.to_owned()))
        }
    }

    /// Structural check: exactly one `.` between two non-empty name parts.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        let mut parts = s.split('.');
        let (Some(first), Some(last), None) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        !first.is_empty()
            && !last.is_empty()
            && !s
                .chars()
                .any(|c| c == '@' || c == '/' || c.is_whitespace())
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Username` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Returns the first name component.
    #[must_use]
    pub fn firstname(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    /// Returns the last name component.
    #[must_use]
    pub fn lastname(&self) -> &str {
        self.0.split('.').nth(1).unwrap_or("")
    }

    /// Returns the title-cased display name, e.g. `"Jane Doe"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} {}",
            title_case(self.firstname()),
            title_case(self.lastname())
        )
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Username {
    type Error = UsernameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&s) {
            Ok(Self(s))
        } else {
            Err(UsernameError::Malformed(s))
        }
    }
}

impl From<Username> for String {
    fn from(username: Username) -> Self {
        username.0
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The organization's email rules.
///
/// Maps emails of the form `first.last<suffix>` to usernames and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailPolicy {
    suffix: String,
    max_length: usize,
}

impl EmailPolicy {
    /// Create a policy for the given suffix (including the leading `@`).
    #[must_use]
    pub fn new(suffix: impl Into<String>, max_length: usize) -> Self {
        Self {
            suffix: suffix.into(),
            max_length,
        }
    }

    /// The accepted email suffix, e.g. `@school.org`.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Maximum accepted email length.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    /// Derive the canonical username from an organizational email.
    ///
    /// # Errors
    ///
    /// Returns an error if the email:
    /// - Is longer than the maximum length
    /// - Is not longer than the suffix
    /// - Does not end with the exact suffix
    /// - Does not have exactly one `.` between first and last name
    pub fn username_from_email(&self, email: &str) -> Result<Username, UsernameError> {
        if email.len() > self.max_length {
            return Err(UsernameError::EmailTooLong {
                max: self.max_length,
            });
        }
        if email.len() <= self.suffix.len() {
            return Err(UsernameError::EmailTooShort);
        }

        let local = email
            .strip_suffix(self.suffix.as_str())
            .ok_or_else(|| UsernameError::WrongDomain {
                suffix: self.suffix.clone(),
            })?;

        Username::parse(local)
    }

    /// Reconstruct the email address belonging to a username.
    #[must_use]
    pub fn email_for(&self, username: &Username) -> String {
        format!("{}{}", username.as_str(), self.suffix)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy() -> EmailPolicy {
        EmailPolicy::new("@school.org", 64)
    }

    #[test]
    fn test_username_from_email() {
        let username = policy().username_from_email("sen.der@school.org").unwrap();
        assert_eq!(username.as_str(), "sen.der");
        assert_eq!(username.firstname(), "sen");
        assert_eq!(username.lastname(), "der");
    }

    #[test]
    fn test_email_roundtrip() {
        let policy = policy();
        for email in ["a.b@school.org", "jane.doe@school.org", "o'neil.x@school.org"] {
            let username = policy.username_from_email(email).unwrap();
            assert_eq!(policy.email_for(&username), email);
        }
    }

    #[test]
    fn test_email_too_long() {
        let email = format!("{}.doe@school.org", "j".repeat(60));
        assert!(matches!(
            policy().username_from_email(&email),
            Err(UsernameError::EmailTooLong { max: 64 })
        ));
    }

    #[test]
    fn test_email_too_short() {
        assert_eq!(
            policy().username_from_email("@school.org"),
            Err(UsernameError::EmailTooShort)
        );
        assert_eq!(
            policy().username_from_email("x"),
            Err(UsernameError::EmailTooShort)
        );
    }

    #[test]
    fn test_email_wrong_domain() {
        assert!(matches!(
            policy().username_from_email("jane.doe@gmail.com"),
            Err(UsernameError::WrongDomain { .. })
        ));
        assert!(matches!(
            policy().username_from_email("jane.doe@school.org.evil"),
            Err(UsernameError::WrongDomain { .. })
        ));
    }

    #[test]
    fn test_email_dot_count() {
        assert!(matches!(
            policy().username_from_email("janedoe@school.org"),
            Err(UsernameError::Malformed(_))
        ));
        assert!(matches!(
            policy().username_from_email("jane.m.doe@school.org"),
            Err(UsernameError::Malformed(_))
        ));
    }

    #[test]
    fn test_is_valid() {
        assert!(Username::is_valid("recip.one"));
        assert!(!Username::is_valid("recipone"));
        assert!(!Username::is_valid("recip.one.two"));
        assert!(!Username::is_valid(".one"));
        assert!(!Username::is_valid("recip."));
        assert!(!Username::is_valid("re cip.one"));
        assert!(!Username::is_valid("a@b.c"));
        assert!(!Username::is_valid(""));
    }

    #[test]
    fn test_display_name() {
        let username = Username::parse("jane.doe").unwrap();
        assert_eq!(username.display_name(), "Jane Doe");
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let parsed: Result<Username, _> = serde_json::from_str("\"nodot\"");
        assert!(parsed.is_err());

        let parsed: Username = serde_json::from_str("\"sen.der\"").unwrap();
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"sen.der\"");
    }
}
