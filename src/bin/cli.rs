// Deezer Core - stream retrieval and decryption for Deezer media
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use deezer_core::api::{CatalogService, ClientConfig, DeezerClient};
use deezer_core::audio::FfmpegTagger;
use deezer_core::crypto::{build_url, derive_key};
use deezer_core::download::{
    format_bytes, DownloadConfig, Downloader, LinkDownload, MemberObserver, ProgressTracker,
    QualityTier,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deezer-cli")]
#[command(about = "Download tracks, albums and playlists from Deezer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a track, album or playlist link
    Download {
        /// e.g. https://www.deezer.com/album/302127
        link: String,
        /// FLAC, MP3_320, MP3_256 or MP3_128
        #[arg(short, long)]
        quality: Option<QualityTier>,
        /// Output root directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// `arl` cookie of a logged-in session
        #[arg(long, env = "DEEZER_ARL", hide_env_values = true)]
        arl: String,
        /// Collection members downloaded at once
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// JSON download config
        #[arg(long)]
        config: Option<PathBuf>,
        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,
    },
    /// Print the signed stream URL of a track
    Url {
        track_id: u64,
        #[arg(short, long, default_value = "FLAC")]
        quality: QualityTier,
        #[arg(long, env = "DEEZER_ARL", hide_env_values = true)]
        arl: String,
    },
    /// Print the stream key of a track
    Key { track_id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            link,
            quality,
            output,
            arl,
            concurrency,
            config,
            overwrite,
        } => {
            let mut download_config = match config {
                Some(path) => DownloadConfig::load(&path).await?,
                None => DownloadConfig::default(),
            };
            if let Some(output) = output {
                download_config.output_directory = output;
            }
            if let Some(concurrency) = concurrency {
                if concurrency == 0 {
                    bail!("--concurrency must be at least 1");
                }
                download_config.max_concurrent_downloads = concurrency;
            }
            download_config.overwrite |= overwrite;
            let quality = quality.unwrap_or(download_config.default_quality);

            let client = Arc::new(
                DeezerClient::login(&arl, ClientConfig::default())
                    .await
                    .context("login failed")?,
            );
            let downloader = Downloader::new(
                client.clone(),
                client,
                Arc::new(FfmpegTagger::new()),
                download_config,
            );

            let trackers: Arc<Mutex<HashMap<u64, ProgressTracker>>> = Arc::default();
            let observer: MemberObserver = Arc::new(move |track_id, done, total| {
                if let Ok(mut trackers) = trackers.lock() {
                    let tracker = trackers
                        .entry(track_id)
                        .or_insert_with(|| ProgressTracker::new(format!("track {}", track_id)));
                    if tracker.update(done, total) {
                        eprint!("\r{}", tracker.line());
                    }
                }
            });

            match downloader.download_link(&link, quality, Some(observer)).await {
                Ok(LinkDownload::Track(result)) => {
                    eprintln!();
                    println!("{} ({})", result.path.display(), format_bytes(result.bytes));
                }
                Ok(LinkDownload::Collection(results)) => {
                    eprintln!();
                    let mut failed = 0;
                    for result in results {
                        match result {
                            Ok(done) => match done.quality {
                                Some(quality) => println!("{} [{}]", done.path.display(), quality),
                                None => println!("{} [existing]", done.path.display()),
                            },
                            Err(e) => {
                                failed += 1;
                                eprintln!("error: {}", e.user_message());
                            }
                        }
                    }
                    if failed > 0 {
                        bail!("{} member(s) failed", failed);
                    }
                }
                Err(e) => bail!(e.user_message()),
            }
        }
        Commands::Url {
            track_id,
            quality,
            arl,
        } => {
            let client = DeezerClient::login(&arl, ClientConfig::default())
                .await
                .context("login failed")?;
            let enrichment = client.track_enrichment(track_id).await?;
            let url = build_url(
                &enrichment.content_hash,
                quality.code(),
                track_id,
                &enrichment.media_version,
            )?;
            println!("{}", url);
        }
        Commands::Key { track_id } => {
            println!("{}", derive_key(track_id).to_hex());
        }
    }

    Ok(())
}
