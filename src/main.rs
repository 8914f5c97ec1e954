//! blogdesk - command line client for the blog administration API

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogdesk::{
    config::Config,
    models::{Credentials, RegistrationDetails},
    services::{remaining_seconds, ImageUpload},
    App,
};

#[derive(Parser, Debug)]
#[command(name = "blogdesk", version, about = "Blog administration client")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session
    Login { username: String, password: String },
    /// Create an account and log in as it
    Register {
        username: String,
        email: String,
        password: String,
    },
    /// Show the persisted session and admin status
    Status,
    /// Ask the server who the stored credentials belong to
    Whoami,
    /// Log out and forget the persisted session
    Logout,
    /// Download a profile picture (your own without a user id)
    Avatar {
        user_id: Option<String>,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Replace your profile picture
    SetAvatar { path: PathBuf },
    /// List blogs (only yours with --mine)
    Blogs {
        #[arg(long)]
        mine: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogdesk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load_with_env(&cli.config)?;
    tracing::debug!("Configuration loaded from {}", cli.config.display());

    let app = App::new(config)?;
    app.start().await;

    run(&app, cli.command).await?;

    tracing::debug!(
        "{} requests ({} failed, avg {:.0}us)",
        app.request_stats.total_requests(),
        app.request_stats.failed_requests(),
        app.request_stats.avg_response_time_us()
    );
    Ok(())
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let session = app.session.login(Credentials::new(username, password)).await?;
            let is_admin = app.session.admin_check().await;
            println!(
                "Logged in as {} <{}>{}",
                session.username,
                session.email,
                if is_admin { " (admin)" } else { "" }
            );
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let details = RegistrationDetails::new(username, email, password.clone(), password);
            let session = app.session.register(details).await?;
            println!("Registered {} <{}>", session.username, session.email);
        }
        Command::Status => match app.session.current() {
            Some(session) => {
                let is_admin = app.session.admin_check().await;
                println!("Logged in as {} (id {})", session.username, session.id);
                println!(
                    "Session expires {} ({}s left)",
                    session.expires_at.to_rfc3339(),
                    remaining_seconds(&session)
                );
                println!("Admin: {}", if is_admin { "yes" } else { "no" });
            }
            None => println!("Not logged in"),
        },
        Command::Whoami => match app.session.who_am_i().await {
            Some(session) => println!("{} <{}>", session.username, session.email),
            None => println!("Not logged in"),
        },
        Command::Logout => {
            app.session.logout().await;
            println!("Logged out");
        }
        Command::Avatar { user_id, out } => {
            let url = match user_id {
                Some(id) => app.profile.profile_picture(&id).await,
                None => {
                    if !app.session.is_logged_in() {
                        bail!("Not logged in; pass a user id");
                    }
                    app.profile.my_profile_picture().await
                }
            };
            let Some(url) = url else {
                println!("No profile picture");
                return Ok(());
            };
            let blob = app
                .blobs
                .resolve(&url)
                .context("Profile picture was released before it could be saved")?;
            write_file(&out, &blob.bytes).await?;
            println!("Saved {} ({}, {} bytes)", out.display(), blob.content_type, blob.len());
        }
        Command::SetAvatar { path } => {
            let image = ImageUpload::from_path(&path).await?;
            app.profile.change_profile_picture(image).await?;
            println!("Profile picture updated");
        }
        Command::Blogs { mine } => {
            let blogs = if mine {
                app.blogs.my_blogs().await?
            } else {
                app.blogs.list().await?
            };
            for blog in blogs {
                println!("{:>6}  {}  ({})", blog.id, blog.title, blog.author);
            }
        }
    }
    Ok(())
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write '{}'", path.display()))
}
