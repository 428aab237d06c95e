//! Live download against the real service
//!
//! Requires a logged-in session cookie in `DEEZER_ARL`.
//! Run with: cargo test --test live_download -- --ignored --nocapture

use deezer_core::api::{CatalogService, ClientConfig, DeezerClient};
use deezer_core::audio::FfmpegTagger;
use deezer_core::download::{DownloadConfig, Downloader, QualityTier};
use std::sync::Arc;

/// "Harder, Better, Faster, Stronger" by Daft Punk
const TEST_TRACK_ID: u64 = 3135556;

fn arl() -> Option<String> {
    std::env::var("DEEZER_ARL").ok().filter(|v| !v.is_empty())
}

#[tokio::test]
#[ignore]
async fn test_enrichment_and_download() -> Result<(), Box<dyn std::error::Error>> {
    let Some(arl) = arl() else {
        println!("DEEZER_ARL not set, skipping");
        return Ok(());
    };

    let client = Arc::new(DeezerClient::login(&arl, ClientConfig::default()).await?);

    let enrichment = client.track_enrichment(TEST_TRACK_ID).await?;
    assert_eq!(enrichment.content_hash.len(), 32);
    println!("media version {}", enrichment.media_version);

    let root = tempfile::tempdir()?;
    let config = DownloadConfig {
        output_directory: root.path().to_path_buf(),
        ..Default::default()
    };
    let downloader = Downloader::new(client.clone(), client, Arc::new(FfmpegTagger::new()), config);

    let result = downloader
        .download_track(TEST_TRACK_ID, QualityTier::Mp3_128, None)
        .await?;
    println!("{} bytes -> {}", result.bytes, result.path.display());
    assert!(result.bytes > 0);
    assert!(result.path.exists());

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_unknown_track_is_catalog_error() -> Result<(), Box<dyn std::error::Error>> {
    let Some(arl) = arl() else {
        return Ok(());
    };

    let client = DeezerClient::login(&arl, ClientConfig::default()).await?;
    let err = client.track(999_999_999_999).await.unwrap_err();
    assert!(err.is_catalog_error());
    Ok(())
}
