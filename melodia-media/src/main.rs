//! melodia-urls - mint signed media URLs for catalog ids from the shell.
//!
//! Connection settings come from the `MELODIA_S3_*` environment variables.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use melodia_blob::{BlobGateway, ContentDisposition};
use melodia_media::{MediaResolver, TrackId, UserId};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "melodia-urls")]
#[command(about = "Signed media URLs for Melodia tracks and users")]
#[command(version)]
struct Args {
    /// Serve media as a download instead of inline
    #[arg(long, global = true)]
    download: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fast URL pairs for a page of tracks, one JSON line per id
    Pairs {
        #[arg(required = true)]
        track_ids: Vec<TrackId>,
    },
    /// Safe URL pair for one track, `null` if any blob is missing
    Track { track_id: TrackId },
    /// Safe avatar URL for one user, `null` if none was uploaded
    Avatar { user_id: UserId },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let gateway = BlobGateway::connect_env()
        .await
        .context("failed to connect to the media bucket")?;
    let disposition = if args.download {
        ContentDisposition::Attachment
    } else {
        ContentDisposition::Inline
    };
    let resolver = MediaResolver::new(Arc::new(gateway)).with_disposition(disposition);

    match args.command {
        Command::Pairs { track_ids } => {
            let results = resolver.url_pairs(&track_ids).await;
            let mut failed = 0;
            for (track_id, result) in track_ids.iter().zip(results) {
                let line = match result {
                    Ok(pair) => json!({ "track_id": track_id, "audio": pair.audio, "image": pair.image }),
                    Err(err) => {
                        failed += 1;
                        warn!(track_id, error = %err, "could not sign track");
                        json!({ "track_id": track_id, "error": err.to_string() })
                    }
                };
                println!("{}", line);
            }
            if failed > 0 {
                bail!("{} of {} tracks failed to sign", failed, track_ids.len());
            }
            info!(tracks = track_ids.len(), "signed url pairs");
        }
        Command::Track { track_id } => {
            let pair = resolver.url_pair(track_id).await?;
            println!("{}", serde_json::to_string(&pair)?);
        }
        Command::Avatar { user_id } => {
            let url = resolver.avatar_url(user_id).await?;
            println!("{}", serde_json::to_string(&url)?);
        }
    }

    Ok(())
}
