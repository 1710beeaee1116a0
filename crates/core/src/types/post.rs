//! Posts: content-hashed messages from one student to others.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer, ser::SerializeSeq};

use super::post_id::PostId;
use super::username::{Username, UsernameError};

/// Errors that can occur when constructing a [`Post`].
#[derive(thiserror::Error, Debug)]
pub enum PostError {
    /// The post has no recipients.
    #[error("a post needs at least one recipient")]
    NoRecipients,
    /// The post has more recipients than allowed.
    #[error("a post can have at most {max} recipients")]
    TooManyRecipients {
        /// Maximum allowed recipients.
        max: usize,
    },
    /// The message is empty.
    #[error("message cannot be empty")]
    EmptyMessage,
    /// The message is longer than allowed.
    #[error("message must be at most {max} characters")]
    MessageTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The post has more images than allowed.
    #[error("a post can have at most {max} images")]
    TooManyImages {
        /// Maximum allowed images.
        max: usize,
    },
    /// The sender or a recipient is not a valid username.
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),
    /// An image is not valid base64.
    #[error("image {index} is not valid base64: {source}")]
    InvalidImage {
        /// Position of the offending image in the request.
        index: usize,
        /// The decoding failure.
        source: base64::DecodeError,
    },
    /// The canonical form used for hashing could not be encoded.
    #[error("failed to encode post for hashing: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Size limits applied when constructing posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostLimits {
    /// Maximum number of recipients on one post.
    pub max_recipients: usize,
    /// Maximum number of images on one post.
    pub max_images: usize,
    /// Maximum message length in characters.
    pub max_message_length: usize,
}

impl Default for PostLimits {
    fn default() -> Self {
        Self {
            max_recipients: 10,
            max_images: 5,
            max_message_length: 2000,
        }
    }
}

/// A post from one sender to one or more recipients.
///
/// Posts are immutable. The [`PostId`] is the SHA3-256 digest of the
/// canonical serialization of every other field, so two posts only share an
/// ID if they agree on sender, recipients, message, images and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    post_id: PostId,
    timestamp: DateTime<Utc>,
    sender: Username,
    recipients: Vec<Username>,
    message: String,
    #[serde(serialize_with = "serialize_images")]
    images: Vec<Vec<u8>>,
}

/// The hashed representation of a post. Field order is part of the format.
#[derive(Serialize)]
struct CanonicalPost<'a> {
    timestamp: &'a DateTime<Utc>,
    sender: &'a Username,
    recipients: &'a [Username],
    message: &'a str,
    #[serde(serialize_with = "serialize_images")]
    images: &'a [Vec<u8>],
}

impl Post {
    /// Validate input and construct a new post stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`Post::new_at`].
    pub fn new<S: AsRef<str>>(
        sender: &str,
        message: &str,
        images: &[S],
        recipients: &[S],
        limits: &PostLimits,
    ) -> Result<Self, PostError> {
        Self::new_at(sender, message, images, recipients, limits, Utc::now())
    }

    /// Validate input and construct a new post with an explicit timestamp.
    ///
    /// Checks run in this order:
    /// 1. recipient count is within `1..=max_recipients`
    /// 2. message is non-empty and within `max_message_length`
    /// 3. image count is within `max_images`
    /// 4. sender and every recipient are valid usernames
    /// 5. every image is valid base64
    ///
    /// Duplicate recipients are collapsed, keeping the first occurrence.
    /// The timestamp is truncated to microseconds so that it survives a
    /// round trip through `PostgreSQL` unchanged.
    ///
    /// # Errors
    ///
    /// Returns the `PostError` for the first failing check.
    pub fn new_at<S: AsRef<str>>(
        sender: &str,
        message: &str,
        images: &[S],
        recipients: &[S],
        limits: &PostLimits,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PostError> {
        if recipients.is_empty() {
            return Err(PostError::NoRecipients);
        }
        if recipients.len() > limits.max_recipients {
            return Err(PostError::TooManyRecipients {
                max: limits.max_recipients,
            });
        }
        if message.is_empty() {
            return Err(PostError::EmptyMessage);
        }
        if message.chars().count() > limits.max_message_length {
            return Err(PostError::MessageTooLong {
                max: limits.max_message_length,
            });
        }
        if images.len() > limits.max_images {
            return Err(PostError::TooManyImages {
                max: limits.max_images,
            });
        }

        let sender = Username::parse(sender)?;
        let mut valid_recipients: Vec<Username> = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let recipient = Username::parse(recipient.as_ref())?;
            if !valid_recipients.contains(&recipient) {
                valid_recipients.push(recipient);
            }
        }

        let images = images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                BASE64
                    .decode(image.as_ref())
                    .map_err(|source| PostError::InvalidImage { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timestamp = timestamp.trunc_subsecs(6);
        let post_id = content_hash(&CanonicalPost {
            timestamp: &timestamp,
            sender: &sender,
            recipients: &valid_recipients,
            message,
            images: &images,
        })?;

        Ok(Self {
            post_id,
            timestamp,
            sender,
            recipients: valid_recipients,
            message: message.to_owned(),
            images,
        })
    }

    /// Rebuild a post from persisted fields without re-validating or re-hashing.
    ///
    /// Only storage backends should call this, with values that were
    /// produced by [`Post::new_at`].
    #[must_use]
    pub const fn restore(
        post_id: PostId,
        timestamp: DateTime<Utc>,
        sender: Username,
        recipients: Vec<Username>,
        message: String,
        images: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            post_id,
            timestamp,
            sender,
            recipients,
            message,
            images,
        }
    }

    /// The content-derived identifier.
    #[must_use]
    pub const fn post_id(&self) -> &PostId {
        &self.post_id
    }

    /// When the post was created.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The sending user.
    #[must_use]
    pub const fn sender(&self) -> &Username {
        &self.sender
    }

    /// The receiving users, in request order.
    #[must_use]
    pub fn recipients(&self) -> &[Username] {
        &self.recipients
    }

    /// The message body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Decoded image payloads.
    #[must_use]
    pub fn images(&self) -> &[Vec<u8>] {
        &self.images
    }
}

fn content_hash(canonical: &CanonicalPost<'_>) -> Result<PostId, PostError> {
    let bytes = serde_json::to_vec(canonical)?;
    Ok(PostId::digest(&bytes))
}

fn serialize_images<S: Serializer>(images: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(images.len()))?;
    for image in images {
        seq.serialize_element(&BASE64.encode(image))?;
    }
    seq.end()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap()
    }

    fn build(message: &str, images: &[&str], recipients: &[&str]) -> Result<Post, PostError> {
        Post::new_at(
            "sen.der",
            message,
            images,
            recipients,
            &PostLimits::default(),
            fixed_time(),
        )
    }

    #[test]
    fn test_new_post_populates_fields() {
        let post = build("hi", &["aGVsbG8="], &["recip.one"]).unwrap();
        assert_eq!(post.sender().as_str(), "sen.der");
        assert_eq!(post.recipients(), &[Username::parse("recip.one").unwrap()]);
        assert_eq!(post.message(), "hi");
        assert_eq!(post.images(), &[b"hello".to_vec()]);
        assert_eq!(post.timestamp(), fixed_time());
    }

    #[test]
    fn test_post_id_is_deterministic() {
        let a = build("hi", &[], &["recip.one"]).unwrap();
        let b = build("hi", &[], &["recip.one"]).unwrap();
        assert_eq!(a.post_id(), b.post_id());
    }

    #[test]
    fn test_post_id_depends_on_content() {
        let a = build("hi", &[], &["recip.one"]).unwrap();
        let b = build("hello", &[], &["recip.one"]).unwrap();
        let c = build("hi", &[], &["recip.two"]).unwrap();
        let d = build("hi", &["aGVsbG8="], &["recip.one"]).unwrap();
        assert_ne!(a.post_id(), b.post_id());
        assert_ne!(a.post_id(), c.post_id());
        assert_ne!(a.post_id(), d.post_id());
    }

    #[test]
    fn test_post_id_depends_on_timestamp() {
        let limits = PostLimits::default();
        let no_images: &[&str] = &[];
        let a = Post::new_at("sen.der", "hi", no_images, &["recip.one"], &limits, fixed_time())
            .unwrap();
        let later = fixed_time() + chrono::Duration::seconds(1);
        let b = Post::new_at("sen.der", "hi", no_images, &["recip.one"], &limits, later).unwrap();
        assert_ne!(a.post_id(), b.post_id());
    }

    #[test]
    fn test_recipient_count_bounds() {
        assert!(matches!(build("hi", &[], &[]), Err(PostError::NoRecipients)));

        let many: Vec<String> = (0..11).map(|i| format!("recip.n{i}")).collect();
        let no_images: &[String] = &[];
        let result = Post::new("sen.der", "hi", no_images, &many, &PostLimits::default());
        assert!(matches!(
            result,
            Err(PostError::TooManyRecipients { max: 10 })
        ));
    }

    #[test]
    fn test_message_bounds() {
        assert!(matches!(
            build("", &[], &["recip.one"]),
            Err(PostError::EmptyMessage)
        ));

        let long = "x".repeat(2001);
        assert!(matches!(
            build(&long, &[], &["recip.one"]),
            Err(PostError::MessageTooLong { max: 2000 })
        ));

        let exact = "x".repeat(2000);
        assert!(build(&exact, &[], &["recip.one"]).is_ok());
    }

    #[test]
    fn test_too_many_images() {
        let images = ["aGk="; 6];
        assert!(matches!(
            build("hi", &images, &["recip.one"]),
            Err(PostError::TooManyImages { max: 5 })
        ));
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(matches!(
            Post::new_at(
                "sender",
                "hi",
                &[] as &[&str],
                &["recip.one"],
                &PostLimits::default(),
                fixed_time()
            ),
            Err(PostError::InvalidUsername(_))
        ));
        assert!(matches!(
            build("hi", &[], &["recip.one", "bad"]),
            Err(PostError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_invalid_base64_is_reported() {
        assert!(matches!(
            build("hi", &["aGVsbG8=", "not base64!"], &["recip.one"]),
            Err(PostError::InvalidImage { index: 1, .. })
        ));
    }

    #[test]
    fn test_count_checks_run_before_username_checks() {
        assert!(matches!(
            build("", &[], &["bad"]),
            Err(PostError::EmptyMessage)
        ));
    }

    #[test]
    fn test_duplicate_recipients_collapse() {
        let post = build("hi", &[], &["recip.one", "recip.two", "recip.one"]).unwrap();
        assert_eq!(post.recipients().len(), 2);
    }

    #[test]
    fn test_timestamp_truncated_to_micros() {
        let precise = Utc.timestamp_opt(1_600_000_000, 123_456_789).unwrap();
        let post = Post::new_at(
            "sen.der",
            "hi",
            &[] as &[&str],
            &["recip.one"],
            &PostLimits::default(),
            precise,
        )
        .unwrap();
        assert_eq!(post.timestamp().timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_serialize_encodes_images_as_base64() {
        let post = build("hi", &["aGVsbG8="], &["recip.one"]).unwrap();
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["images"][0], "aGVsbG8=");
        assert_eq!(json["sender"], "sen.der");
        assert_eq!(json["post_id"], post.post_id().as_str());
    }
}
