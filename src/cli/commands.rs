//! CLI command definitions

use clap::{Parser, Subcommand};
use portal::config::ServeArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Identity portal: logins, sessions and token verification", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL (users are kept in memory when unset)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the portal server
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Initialize the database schema
    Init,

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// List registered applications
    ///
    /// Examples:
    ///   portal apps
    ///   portal apps --apps-file /etc/portal/apps.toml
    Apps {
        /// TOML file of `app_name = "secret"` pairs
        #[arg(long, default_value = "apps.toml", env = "PORTAL_APPS_FILE")]
        apps_file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    ///
    /// Examples:
    ///   portal user add alice --password hunter2
    ///   portal user add root --admin
    Add {
        /// Username
        name: String,

        /// Password (one is generated and printed when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Grant the admin flag
        #[arg(long)]
        admin: bool,
    },
}
