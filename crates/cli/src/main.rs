//! Yearbook CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema and session table)
//! yb-cli migrate
//!
//! # Create a user ahead of their first login
//! yb-cli user add --email jane.doe@school.org --grade senior
//!
//! # Delete a user
//! yb-cli user delete --username jane.doe
//!
//! # Delete a post
//! yb-cli post delete <POST_ID>
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "yb-cli")]
#[command(author, version, about = "Yearbook CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage posts
    Post {
        #[command(subcommand)]
        action: PostAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Add {
        /// Organization email address
        #[arg(short, long)]
        email: String,

        /// Grade (`freshman`, `sophomore`, `junior`, `senior`)
        #[arg(short, long, default_value = "freshman")]
        grade: String,

        /// Mark the user as having completed their first login
        #[arg(long)]
        registered: bool,
    },
    /// Delete a user
    Delete {
        /// Username (`first.last`)
        #[arg(short, long)]
        username: String,
    },
}

#[derive(Subcommand)]
enum PostAction {
    /// Delete a post
    Delete {
        /// Post id (64 hex characters)
        post_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Add {
                email,
                grade,
                registered,
            } => {
                commands::user::add(&email, &grade, registered).await?;
            }
            UserAction::Delete { username } => commands::user::delete(&username).await?,
        },
        Commands::Post { action } => match action {
            PostAction::Delete { post_id } => commands::post::delete(&post_id).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_add() {
        let cli = Cli::try_parse_from([
            "yb-cli",
            "user",
            "add",
            "--email",
            "jane.doe@school.org",
            "--grade",
            "senior",
            "--registered",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Add { registered: true, .. }
            })
        ));
    }

    #[test]
    fn test_parse_post_delete_requires_id() {
        assert!(Cli::try_parse_from(["yb-cli", "post", "delete"]).is_err());
    }
}
