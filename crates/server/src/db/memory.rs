//! In-process [`Store`] implementation.
//!
//! Every table lives behind one `RwLock`, so each operation observes and
//! produces a consistent snapshot. Used by tests and local development.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use yearbook_core::{Grade, NewUser, Post, PostId, UserId, Username};

use super::{RepositoryError, Store};
use crate::models::user::{StoredToken, User, UserPatch};

/// A `Store` held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    posts: HashMap<PostId, StoredPost>,
    users: BTreeMap<Username, User>,
    tokens: HashMap<String, StoredToken>,
    next_user_id: i32,
    next_post_seq: u64,
}

struct StoredPost {
    seq: u64,
    post: Post,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn insert_post(&mut self, post: &Post) -> Result<(), RepositoryError> {
        if self.posts.contains_key(post.post_id()) {
            return Err(RepositoryError::Conflict("post already exists".to_owned()));
        }
        self.next_post_seq += 1;
        self.posts.insert(
            post.post_id().clone(),
            StoredPost {
                seq: self.next_post_seq,
                post: post.clone(),
            },
        );
        Ok(())
    }

    fn append_lists(&mut self, post_id: &PostId, sender: &Username, recipients: &[Username]) {
        match self.users.get_mut(sender) {
            Some(user) => push_unique(&mut user.outbound_posts, post_id),
            None => tracing::debug!(%sender, %post_id, "sender has no user row, skipping outbound"),
        }
        for recipient in recipients {
            match self.users.get_mut(recipient) {
                Some(user) => push_unique(&mut user.inbound_posts, post_id),
                None => {
                    tracing::debug!(%recipient, %post_id, "recipient has no user row, skipping inbound");
                }
            }
        }
    }

    /// Posts in feed order: newest first, later inserts first on ties.
    fn sorted_posts<'a>(posts: impl Iterator<Item = &'a StoredPost>) -> Vec<Post> {
        let mut posts: Vec<&StoredPost> = posts.collect();
        posts.sort_by(|a, b| {
            b.post
                .timestamp()
                .cmp(&a.post.timestamp())
                .then(b.seq.cmp(&a.seq))
        });
        posts.into_iter().map(|p| p.post.clone()).collect()
    }
}

fn push_unique(list: &mut Vec<PostId>, post_id: &PostId) {
    if !list.contains(post_id) {
        list.push(post_id.clone());
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn add_post(&self, post: &Post) -> Result<(), RepositoryError> {
        self.tables.write().await.insert_post(post)
    }

    async fn publish_post(&self, post: &Post) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.insert_post(post)?;
        tables.append_lists(post.post_id(), post.sender(), post.recipients());
        Ok(())
    }

    async fn get_post(&self, id: &PostId) -> Result<Post, RepositoryError> {
        self.tables
            .read()
            .await
            .posts
            .get(id)
            .map(|p| p.post.clone())
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_all_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(Tables::sorted_posts(tables.posts.values()))
    }

    async fn get_n_posts(&self, n: u32, offset: u32) -> Result<Vec<Post>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(Tables::sorted_posts(tables.posts.values())
            .into_iter()
            .skip(offset as usize)
            .take(n as usize)
            .collect())
    }

    async fn count_posts(&self) -> Result<u64, RepositoryError> {
        Ok(self.tables.read().await.posts.len() as u64)
    }

    async fn get_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>, RepositoryError> {
        let tables = self.tables.read().await;
        let found = ids.iter().filter_map(|id| {
            let post = tables.posts.get(id);
            if post.is_none() {
                tracing::debug!(post_id = %id, "skipping dangling post id");
            }
            post
        });
        Ok(Tables::sorted_posts(found))
    }

    async fn delete_post(&self, id: &PostId) -> Result<Post, RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.posts.remove(id).ok_or(RepositoryError::NotFound)?;
        for user in tables.users.values_mut() {
            user.inbound_posts.retain(|p| p != id);
            user.outbound_posts.retain(|p| p != id);
        }
        Ok(stored.post)
    }

    async fn add_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.username)
            || tables.users.values().any(|u| u.email == user.email)
        {
            return Err(RepositoryError::Conflict("user already exists".to_owned()));
        }

        tables.next_user_id += 1;
        let stored = User {
            id: UserId::new(tables.next_user_id),
            username: user.username.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            email: user.email.clone(),
            grade: user.grade,
            register_date: user.register_date,
            nickname: None,
            profile_pic: None,
            bio: None,
            will: None,
            registered: user.registered,
            inbound_posts: Vec::new(),
            outbound_posts: Vec::new(),
        };
        tables.users.insert(stored.username.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_user(&self, username: &Username) -> Result<User, RepositoryError> {
        self.tables
            .read()
            .await
            .users
            .get(username)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_all_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn get_all_usernames(&self) -> Result<Vec<Username>, RepositoryError> {
        Ok(self.tables.read().await.users.keys().cloned().collect())
    }

    async fn get_usernames_by_grade(&self, grade: Grade) -> Result<Vec<Username>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|u| u.grade == grade)
            .map(|u| u.username.clone())
            .collect())
    }

    async fn update_user(&self, patch: &UserPatch) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&patch.username)
            .ok_or(RepositoryError::NotFound)?;
        patch.apply(user);
        Ok(user.clone())
    }

    async fn delete_user(&self, username: &Username) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .users
            .remove(username)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_to_and_from(
        &self,
        post_id: &PostId,
        sender: &Username,
        recipients: &[Username],
    ) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .append_lists(post_id, sender, recipients);
        Ok(())
    }

    async fn init_account(
        &self,
        username: &Username,
        profile_pic: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(username)
            .ok_or(RepositoryError::NotFound)?;
        user.registered = true;
        user.profile_pic = profile_pic.map(str::to_owned);
        Ok(())
    }

    async fn insert_token(&self, token: &StoredToken) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .tokens
            .insert(token.sub.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, sub: &str) -> Result<Option<StoredToken>, RepositoryError> {
        Ok(self.tables.read().await.tokens.get(sub).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};
    use secrecy::SecretString;
    use yearbook_core::{EmailPolicy, PostLimits};

    use super::*;

    fn policy() -> EmailPolicy {
        EmailPolicy::new("@school.org", 128)
    }

    fn username(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    async fn seed_user(store: &MemoryStore, name: &str, grade: Grade) -> User {
        let user = NewUser::from_username(username(name), grade, false, &policy());
        store.add_user(&user).await.unwrap()
    }

    fn post(sender: &str, recipients: &[&str], message: &str) -> Post {
        let no_images: &[&str] = &[];
        Post::new(sender, message, no_images, recipients, &PostLimits::default()).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get_post_round_trip() {
        let store = MemoryStore::new();
        let post = post("sen.der", &["recip.one"], "hi");
        store.add_post(&post).await.unwrap();

        assert_eq!(store.get_post(post.post_id()).await.unwrap(), post);
        assert_eq!(store.count_posts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_post_duplicate_is_conflict() {
        let store = MemoryStore::new();
        let post = post("sen.der", &["recip.one"], "hi");
        store.add_post(&post).await.unwrap();

        let result = store.add_post(&post).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_publish_post_fills_lists() {
        let store = MemoryStore::new();
        seed_user(&store, "sen.der", Grade::Freshman).await;
        seed_user(&store, "recip.one", Grade::Senior).await;

        let post = post("sen.der", &["recip.one", "no.body"], "hi");
        store.publish_post(&post).await.unwrap();

        let sender = store.get_user(&username("sen.der")).await.unwrap();
        let recipient = store.get_user(&username("recip.one")).await.unwrap();
        assert_eq!(sender.outbound_posts, vec![post.post_id().clone()]);
        assert_eq!(recipient.inbound_posts, vec![post.post_id().clone()]);

        let (inbound, outbound) = store
            .get_user_inbound_outbound(&username("recip.one"))
            .await
            .unwrap();
        assert_eq!(inbound, vec![post]);
        assert!(outbound.is_empty());
    }

    #[tokio::test]
    async fn test_add_to_and_from_is_idempotent() {
        let store = MemoryStore::new();
        seed_user(&store, "sen.der", Grade::Freshman).await;
        let id = PostId::digest(b"post");

        for _ in 0..2 {
            store
                .add_to_and_from(&id, &username("sen.der"), &[])
                .await
                .unwrap();
        }

        let sender = store.get_user(&username("sen.der")).await.unwrap();
        assert_eq!(sender.outbound_posts, vec![id]);
    }

    #[tokio::test]
    async fn test_delete_post_scrubs_lists() {
        let store = MemoryStore::new();
        seed_user(&store, "sen.der", Grade::Freshman).await;
        seed_user(&store, "recip.one", Grade::Senior).await;
        let post = post("sen.der", &["recip.one"], "hi");
        store.publish_post(&post).await.unwrap();

        store.delete_post(post.post_id()).await.unwrap();

        assert!(matches!(
            store.get_post(post.post_id()).await,
            Err(RepositoryError::NotFound)
        ));
        let sender = store.get_user(&username("sen.der")).await.unwrap();
        let recipient = store.get_user(&username("recip.one")).await.unwrap();
        assert!(sender.outbound_posts.is_empty());
        assert!(recipient.inbound_posts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_post_is_not_found() {
        let store = MemoryStore::new();
        let result = store.delete_post(&PostId::digest(b"nothing")).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_dangling_ids_are_skipped() {
        let store = MemoryStore::new();
        seed_user(&store, "recip.one", Grade::Senior).await;
        let post = post("sen.der", &["recip.one"], "hi");
        store.add_post(&post).await.unwrap();

        let dangling = PostId::digest(b"gone");
        store
            .add_to_and_from(&dangling, &username("sen.der"), &[username("recip.one")])
            .await
            .unwrap();
        store
            .add_to_and_from(post.post_id(), &username("sen.der"), &[username("recip.one")])
            .await
            .unwrap();

        let inbound = store.get_user_inbound(&username("recip.one")).await.unwrap();
        assert_eq!(inbound, vec![post]);
    }

    #[tokio::test]
    async fn test_update_user_leaves_other_fields() {
        let store = MemoryStore::new();
        seed_user(&store, "cool.dude", Grade::Junior).await;
        store
            .update_user(
                &UserPatch::new(username("cool.dude"))
                    .nickname(Some("cd".to_string()))
                    .will(Some("my will".to_string())),
            )
            .await
            .unwrap();

        let updated = store
            .update_user(&UserPatch::new(username("cool.dude")).bio(Some("hello".to_string())))
            .await
            .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.nickname.as_deref(), Some("cd"));
        assert_eq!(updated.will.as_deref(), Some("my will"));
        assert_eq!(updated.grade, Grade::Junior);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_partial_updates_keep_each_field() {
        let store = std::sync::Arc::new(MemoryStore::new());
        seed_user(&store, "cool.dude", Grade::Junior).await;

        let patches = [
            UserPatch::new(username("cool.dude")).nickname(Some("cd".to_string())),
            UserPatch::new(username("cool.dude")).bio(Some("hello".to_string())),
            UserPatch::new(username("cool.dude")).will(Some("my will".to_string())),
            UserPatch::new(username("cool.dude")).profile_pic(Some("me.png".to_string())),
        ];
        let handles: Vec<_> = patches
            .into_iter()
            .map(|patch| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { store.update_user(&patch).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let user = store.get_user(&username("cool.dude")).await.unwrap();
        assert_eq!(user.nickname.as_deref(), Some("cd"));
        assert_eq!(user.bio.as_deref(), Some("hello"));
        assert_eq!(user.will.as_deref(), Some("my will"));
        assert_eq!(user.profile_pic.as_deref(), Some("me.png"));
        assert_eq!(user.grade, Grade::Junior);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .update_user(&UserPatch::new(username("no.body")).bio(Some("x".to_string())))
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_add_user_duplicate_is_conflict() {
        let store = MemoryStore::new();
        seed_user(&store, "cool.dude", Grade::Junior).await;
        let again = NewUser::from_username(username("cool.dude"), Grade::Senior, true, &policy());
        assert!(matches!(
            store.add_user(&again).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_usernames_by_grade() {
        let store = MemoryStore::new();
        seed_user(&store, "b.senior", Grade::Senior).await;
        seed_user(&store, "a.senior", Grade::Senior).await;
        seed_user(&store, "a.junior", Grade::Junior).await;

        let seniors = store.get_usernames_by_grade(Grade::Senior).await.unwrap();
        assert_eq!(seniors, vec![username("a.senior"), username("b.senior")]);
        assert_eq!(store.get_all_usernames().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_posts_newest_first_with_pagination() {
        let store = MemoryStore::new();
        let limits = PostLimits::default();
        let no_images: &[&str] = &[];
        let now = Utc::now();
        let older =
            Post::new_at("a.b", "older", no_images, &["c.d"], &limits, now - Duration::seconds(5))
                .unwrap();
        let newer = Post::new_at("a.b", "newer", no_images, &["c.d"], &limits, now).unwrap();
        store.add_post(&older).await.unwrap();
        store.add_post(&newer).await.unwrap();

        let all = store.get_all_posts().await.unwrap();
        assert_eq!(all, vec![newer.clone(), older.clone()]);
        assert_eq!(store.get_n_posts(1, 0).await.unwrap(), vec![newer]);
        assert_eq!(store.get_n_posts(5, 1).await.unwrap(), vec![older]);
        assert!(store.get_n_posts(5, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_account_registers_user() {
        let store = MemoryStore::new();
        seed_user(&store, "cool.dude", Grade::Freshman).await;
        store
            .init_account(&username("cool.dude"), Some("https://pics.example/me.png"))
            .await
            .unwrap();

        let user = store.get_user(&username("cool.dude")).await.unwrap();
        assert!(user.registered);
        assert_eq!(user.profile_pic.as_deref(), Some("https://pics.example/me.png"));
    }

    #[tokio::test]
    async fn test_init_account_without_picture_leaves_it_unset() {
        let store = MemoryStore::new();
        seed_user(&store, "cool.dude", Grade::Freshman).await;
        store.init_account(&username("cool.dude"), None).await.unwrap();

        let user = store.get_user(&username("cool.dude")).await.unwrap();
        assert!(user.registered);
        assert!(user.profile_pic.is_none());
    }

    #[tokio::test]
    async fn test_insert_token_overwrites() {
        let store = MemoryStore::new();
        for token in ["first", "second"] {
            store
                .insert_token(&StoredToken {
                    sub: "42".to_string(),
                    token: SecretString::from(token),
                    email: "cool.dude@school.org".to_string(),
                })
                .await
                .unwrap();
        }

        let stored = store.get_token("42").await.unwrap().unwrap();
        assert!(stored.matches("second"));
        assert!(store.get_token("43").await.unwrap().is_none());
    }
}
