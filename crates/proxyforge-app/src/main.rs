//! ProxyForge - headless proxy generator
//!
//! Imports media files into an anonymous project, generates a proxy for each
//! of them with FFmpeg and prints where every proxy ended up.
//!
//! Usage: `proxyforge <proxy-dir|-> <media>...`
//!
//! `-` writes proxies to the user cache directory. Settings are read from
//! `<config dir>/proxyforge/settings.json` when present.

use anyhow::{bail, Context, Result};
use proxyforge_core::{uri, AssetKind, KindFilter};
use proxyforge_media::{EncodingProfile, FfmpegEngine, FileAssetLoader};
use proxyforge_project::{Project, ProjectEvent, ProjectSettings, ProxyState};
use proxyforge_timeline::{shared, Clip, Timeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("ProxyForge starting...");
    proxyforge_media::init();

    let mut args = std::env::args().skip(1);
    let Some(proxy_dir) = args.next() else {
        bail!("usage: proxyforge <proxy-dir|-> <media>...");
    };
    let media: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if media.is_empty() {
        bail!("no media files given");
    }

    let mut settings = load_settings()?;
    let proxy_dir = match proxy_dir.as_str() {
        "-" => dirs::cache_dir()
            .context("no cache directory on this platform")?
            .join("proxyforge")
            .join("proxies"),
        dir => PathBuf::from(dir),
    };
    std::fs::create_dir_all(&proxy_dir)
        .with_context(|| format!("cannot create {}", proxy_dir.display()))?;
    let proxy_dir = proxy_dir.canonicalize()?;
    settings.set_proxies_location(Some(&*proxy_dir.to_string_lossy()))?;
    if settings.proxy_profile.is_none() {
        settings.proxy_profile = Some(EncodingProfile::default());
    }
    let idle_timeout = settings.idle_timeout();

    let engine = FfmpegEngine::detect()?;
    info!(ffmpeg = %engine.binary().display(), "Using ffmpeg");

    let mut project = Project::with_backends(
        None,
        Arc::new(FileAssetLoader::new()),
        Arc::new(engine),
    )
    .with_settings(settings);

    project.subscribe(|event| match event {
        ProjectEvent::ErrorLoadingAsset { id, error, .. } => warn!(asset = %id, %error, "Cannot import"),
        ProjectEvent::ProxyFailed { asset_id, error } => warn!(asset = %asset_id, %error, "No proxy"),
        ProjectEvent::ProxiesCreationStarted => info!("Generating proxies"),
        _ => {}
    });

    let timeline = shared(Timeline::new("Imported"));
    for path in &media {
        let id = media_uri(path)?;
        project.create_asset(&id, AssetKind::UriClip);
        timeline.write().add_clip(
            0,
            Clip::new(uri::basename(&id), id.as_str(), AssetKind::UriClip, Duration::ZERO),
        );
    }
    project.use_proxies_for_timeline(&timeline, true);

    wait(&mut project, idle_timeout);
    project.start_proxy_creation();
    wait(&mut project, idle_timeout);

    if project.proxy_state() != ProxyState::Created {
        warn!(state = %project.proxy_state(), "Proxy creation did not finish");
    }

    for asset in project.list_assets(KindFilter::FileBacked) {
        match project.proxy_for(asset.id()) {
            Some(proxy) => println!("{} -> {}", asset.id(), proxy.id()),
            None => println!("{} -> (none)", asset.id()),
        }
    }
    for failure in project.proxy_errors() {
        eprintln!("{}: {}", failure.asset_id, failure.error);
    }

    Ok(())
}

fn load_settings() -> Result<ProjectSettings> {
    let Some(path) = dirs::config_dir().map(|d| d.join("proxyforge").join("settings.json")) else {
        return Ok(ProjectSettings::default());
    };
    if !path.exists() {
        return Ok(ProjectSettings::default());
    }
    info!(path = %path.display(), "Loading settings");
    Ok(ProjectSettings::load(&path)?)
}

fn media_uri(path: &Path) -> Result<String> {
    let absolute = path
        .canonicalize()
        .with_context(|| format!("cannot open {}", path.display()))?;
    Ok(uri::path_to_file_uri(&absolute))
}

/// Pump the project until nothing is outstanding.
fn wait(project: &mut Project, step: Duration) {
    while !project.wait_idle(step) {
        info!(state = %project.proxy_state(), "Still working...");
    }
}
