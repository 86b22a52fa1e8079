use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Target};
use log::LevelFilter;
use sonch_media::{LoadState, MediaConfig, MediaService};
use sonch_model::{ImageId, PostId};

const PASSWORD_ENV: &str = "SONCH_PASSWORD";

#[derive(Parser)]
#[command(name = "sonch-media", about = "Exercise the sonch media pipeline against a live backend")]
struct Cli {
    /// Backend base URL, overrides config and SONCH_API_URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Session directory holding the credential and cached posts
    #[arg(long, global = true)]
    session_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List posts (cached for the session)
    List,
    /// Show one post
    Get { id: String },
    /// Log in and keep the token in the session directory
    Login {
        email: String,
        /// Falls back to SONCH_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored token and wipe the session directory
    Logout,
    /// Wipe the session directory without contacting the backend
    EndSession,
    /// Compress and upload an image, printing its id
    Upload { path: PathBuf },
    /// Delete a post
    Delete { id: String },
    /// Delete a stored image
    DeleteImage { id: String },
    /// Print the URL an image is served from
    ImageUrl {
        id: String,
        #[arg(long)]
        version: Option<u32>,
    },
    /// Load an image through the retrying queue and write it to disk
    Fetch {
        id: String,
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Write the effective configuration to the config file
    SaveConfig,
}

fn init_logger() {
    Builder::new()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Warn)
        .filter_module("sonch_media", LevelFilter::Debug)
        .init();
}

fn default_session_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("sonch").join("session"))
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();

    let mut config = MediaConfig::load();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(dir) = cli.session_dir {
        config.session_dir = Some(dir);
    }
    if config.session_dir.is_none() {
        config.session_dir = default_session_dir();
    }

    if let Command::SaveConfig = cli.command {
        config.save()?;
        if let Some(path) = MediaConfig::config_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let service = MediaService::from_config(&config)?;

    match cli.command {
        Command::List => {
            for post in service.list_posts().await? {
                println!("{}\t{}\t{}", post.id, post.created_at.to_rfc3339(), post.title);
            }
        }
        Command::Get { id } => {
            let post = service.get_post(&PostId::new(id)?).await?;
            println!("{}", serde_json::to_string_pretty(&post)?);
        }
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => std::env::var(PASSWORD_ENV).with_context(|| {
                    format!("pass --password or set {PASSWORD_ENV}")
                })?,
            };
            service.login(&email, &password).await?;
            println!("logged in as {email}");
        }
        Command::Logout => {
            service.logout().await?;
            println!("logged out");
        }
        Command::EndSession => {
            service.end_session().await?;
            println!("session cleared");
        }
        Command::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("image");
            let stored = service.upload_image(file_name, bytes).await?;
            println!("{}\t{} bytes", stored.id, stored.uploaded_bytes);
        }
        Command::Delete { id } => {
            service.delete_post(&PostId::new(id)?).await?;
        }
        Command::DeleteImage { id } => {
            service.delete_image(&ImageId::new(id)?).await?;
        }
        Command::ImageUrl { id, version } => match service.image_url(Some(&id), version) {
            Some(url) => println!("{url}"),
            None => bail!("no image id given"),
        },
        Command::Fetch { id, out } => {
            let id = ImageId::new(id)?;
            match service.load_image(Some(&id)).await {
                LoadState::Loaded(bytes) => {
                    tokio::fs::write(&out, &bytes)
                        .await
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    println!("{} bytes -> {}", bytes.len(), out.display());
                }
                other => {
                    other.into_bytes()?;
                    bail!("image {id} did not load");
                }
            }
        }
        Command::SaveConfig => {}
    }

    Ok(())
}
