//! Post moderation commands.
//!
//! ```bash
//! yb-cli post delete 3f2a...e9
//! ```

use yearbook_core::PostId;
use yearbook_server::db::Store;

use super::{CommandError, connect};

/// Delete a post and scrub it from every user's post lists.
///
/// # Errors
///
/// Returns `CommandError` for a malformed id or an unknown post.
pub async fn delete(id: &str) -> Result<(), CommandError> {
    let id = PostId::parse(id)?;

    let store = connect().await?;
    let post = store.delete_post(&id).await?;

    tracing::info!(post_id = %id, sender = %post.sender(), "Post deleted");
    Ok(())
}
