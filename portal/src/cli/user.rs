//! User management CLI subcommands
//!
//! Provides commands for listing, adding, re-roling and deleting accounts.

use crate::auth::password::{hash_password, validate_new_password};
use crate::db::{self, accounts::NewAccount};
use clap::{Parser, Subcommand};
use fritz_portal_common::auth::Role;
use fritz_portal_common::error::{PortalError, PortalResult};
use sqlx::SqlitePool;

/// User management commands
#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List all users
    List,
    /// Add a new user
    Add(AddUser),
    /// Change a user's role
    SetRole(SetRole),
    /// Delete a user and everything they own
    Delete(DeleteUser),
}

/// Arguments for adding a new user
#[derive(Parser, Debug)]
pub struct AddUser {
    /// Email address for the new user
    pub email: String,
    /// Password (min 8 characters)
    #[arg(short, long)]
    pub password: String,
    /// Role (client, admin, superadmin)
    #[arg(short, long, default_value = "client")]
    pub role: Role,
    /// First name
    #[arg(long)]
    pub first_name: Option<String>,
    /// Last name
    #[arg(long)]
    pub last_name: Option<String>,
}

/// Arguments for changing a role
#[derive(Parser, Debug)]
pub struct SetRole {
    /// Email address of the user
    pub email: String,
    /// New role (client, admin, superadmin)
    pub role: Role,
}

/// Arguments for deleting a user
#[derive(Parser, Debug)]
pub struct DeleteUser {
    /// Email address of the user to delete
    pub email: String,
}

async fn require_account(pool: &SqlitePool, email: &str) -> PortalResult<uuid::Uuid> {
    db::accounts::find_by_email(pool, email)
        .await?
        .map(|account| account.id)
        .ok_or_else(|| PortalError::NotFound(format!("User not found: {}", email)))
}

/// Execute a user subcommand, returning the lines to print
pub async fn run(command: UserCommand, pool: &SqlitePool) -> PortalResult<Vec<String>> {
    match command {
        UserCommand::List => {
            let profiles = db::profiles::list(pool).await?;
            if profiles.is_empty() {
                return Ok(vec!["No users found".to_string()]);
            }
            let mut lines = vec![format!("{:<36}  {:<10}  {}", "ID", "ROLE", "EMAIL")];
            lines.extend(profiles.into_iter().map(|profile| {
                format!(
                    "{:<36}  {:<10}  {}",
                    profile.id,
                    profile.role,
                    profile.email.unwrap_or_default()
                )
            }));
            Ok(lines)
        }
        UserCommand::Add(add) => {
            validate_new_password(&add.password)?;
            let password_hash = hash_password(&add.password)?;
            let (account, profile) = db::accounts::create_with_profile(
                pool,
                &NewAccount {
                    email: &add.email,
                    password_hash: &password_hash,
                    first_name: add.first_name.as_deref(),
                    last_name: add.last_name.as_deref(),
                    company_name: None,
                },
                add.role,
            )
            .await?;
            tracing::info!("Created user from CLI: {} ({})", account.email, profile.role);
            Ok(vec![format!("Created {} ({})", account.email, profile.role)])
        }
        UserCommand::SetRole(set) => {
            let id = require_account(pool, &set.email).await?;
            let profile = db::profiles::set_role(pool, id, set.role).await?;
            tracing::info!("Changed role from CLI: {} -> {}", set.email, profile.role);
            Ok(vec![format!("{} is now {}", set.email, profile.role)])
        }
        UserCommand::Delete(delete) => {
            let id = require_account(pool, &delete.email).await?;
            db::accounts::delete_cascade(pool, id).await?;
            tracing::info!("Deleted user from CLI: {}", delete.email);
            Ok(vec![format!("Deleted {}", delete.email)])
        }
    }
}
