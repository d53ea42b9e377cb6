//! Portal CLI entry point

mod cli;

use crate::cli::{Cli, Commands, UserCommands};
use anyhow::{Context, Result};
use clap::Parser;
use portal::auth::password::generate_password;
use portal::auth::AppRegistry;
use portal::config::ServeArgs;
use portal::server::PortalServer;
use portal::storage::{PostgresConfig, PostgresDirectory, UserDirectory};
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const GENERATED_PASSWORD_LENGTH: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Only the commands that touch users need the database
    let get_db_config = || -> Result<PostgresConfig> {
        let url = cli
            .database_url
            .as_deref()
            .context("DATABASE_URL not set")?;
        PostgresConfig::from_url(url).context("Invalid DATABASE_URL")
    };

    match &cli.command {
        Commands::Serve { args } => serve(args, cli.database_url.as_deref()).await,
        Commands::Init => init(get_db_config()?).await,
        Commands::User { command } => user(get_db_config()?, command).await,
        Commands::Apps { apps_file } => apps(apps_file),
    }
}

async fn serve(args: &ServeArgs, database_url: Option<&str>) -> Result<()> {
    let config = args.to_config(database_url).context("Invalid configuration")?;
    let server = PortalServer::launch(config).await?;

    info!("Starting portal server...");
    server.run().await?;

    Ok(())
}

async fn init(db_config: PostgresConfig) -> Result<()> {
    let _directory = PostgresDirectory::connect(db_config).await?;
    println!("Database schema initialized successfully");
    Ok(())
}

async fn user(db_config: PostgresConfig, command: &UserCommands) -> Result<()> {
    let directory = PostgresDirectory::connect(db_config).await?;

    match command {
        UserCommands::Add { name, password, admin } => {
            let generated = password.is_none();
            let password = password
                .clone()
                .unwrap_or_else(|| generate_password(GENERATED_PASSWORD_LENGTH));

            let identity = directory
                .create_user(name, &password, *admin)
                .await
                .with_context(|| format!("Failed to create user {}", name))?;

            println!("Created user {} (id {})", identity.name, identity.id);
            if *admin {
                println!("Admin: yes");
            }
            if generated {
                println!("Password: {}", password);
            }
        }
    }

    Ok(())
}

fn apps(apps_file: &Path) -> Result<()> {
    let registry = AppRegistry::load(apps_file)
        .with_context(|| format!("Failed to load apps from {}", apps_file.display()))?;

    println!("Registered apps ({}):", registry.len());
    if registry.is_empty() {
        println!("  (none)");
    } else {
        for name in registry.names() {
            println!("  {}", name);
        }
    }

    Ok(())
}
