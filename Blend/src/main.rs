mod logging;

use anyhow::{Context, Result};
use blendconfig::Config;
use blendsource::{OverlapEngine, OverlapOptions, OverlapReport};
use blendspotify::SpotifyClient;
use std::process::ExitCode;
use tracing::info;

const USAGE: &str = "Usage: Blend <user> [<user> ...]

Prints the tracks found in the public playlists of every given Spotify user.
Credentials are read from accounts.spotify.client_id and
accounts.spotify.client_secret in config.yaml, or from the
BLEND_CONFIG__ACCOUNTS__SPOTIFY__CLIENT_ID and
BLEND_CONFIG__ACCOUNTS__SPOTIFY__CLIENT_SECRET environment variables.";

#[tokio::main]
async fn main() -> ExitCode {
    let users: Vec<String> = std::env::args().skip(1).collect();

    match run(users).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(users: Vec<String>) -> Result<()> {
    if users.is_empty() || users.iter().any(|u| u == "-h" || u == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load_config("").context("Cannot load configuration")?;
    logging::init(&config);
    info!("Configuration loaded from {}", config.dir());

    let client = SpotifyClient::from_config(&config).context("Cannot set up Spotify client")?;
    let engine = OverlapEngine::new(client, OverlapOptions::from_config(&config));

    println!("Comparing playlists of: {}", users.join(", "));
    let report = engine.run(&users).await?;
    print!("{}", render_report(&report));

    Ok(())
}

fn render_report(report: &OverlapReport) -> String {
    let mut out = format!("Overlap size: {}\n", report.overlap_ids.len());

    if report.names.is_empty() {
        out.push_str("No track is shared by all users\n");
    }
    for name in &report.names {
        out.push_str(&format!("  {}\n", name));
    }
    if report.truncated {
        out.push_str("Some tracks could not be resolved, the list above is incomplete\n");
    }

    out
}
