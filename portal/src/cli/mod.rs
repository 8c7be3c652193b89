//! CLI module for fritz-portal
//!
//! With no subcommand the server starts; `user` manages accounts directly
//! against the database.

pub mod user;

use clap::{Parser, Subcommand};

/// Fritz Portal - client portal and admin back-office server
#[derive(Parser, Debug)]
#[command(name = "fritz-portal")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    PORTAL_HOST                   Bind address (default: 0.0.0.0)
    PORTAL_PORT                   Listen port (default: 8080)
    PORTAL_LOG_LEVEL              Log level (default: info)
    PORTAL_DATABASE_URL           Database URL (default: sqlite:~/.fritz-portal/portal.db)
    PORTAL_SESSION_SECRET         Session signing key (auto-generated if not set)
    PORTAL_SESSION_TTL_HOURS      Session lifetime in hours (default: 24)
    PORTAL_SECURE_COOKIES         Mark the session cookie Secure (default: false)
    PORTAL_ADMIN_EMAIL            Bootstrap superadmin email
    PORTAL_ADMIN_PASSWORD         Bootstrap superadmin password
    PORTAL_RESEND_API_KEY         Resend API key (emails are only logged if not set)
    PORTAL_SITE_URL               Public URL used in email links
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage portal accounts
    User {
        /// User management subcommand
        #[command(subcommand)]
        command: user::UserCommand,
    },
}
