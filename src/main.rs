//! Loads items from a local asset store into a quad-view scene, prints the
//! slider state of every slice view and saves one capture per view.

use anyhow::{Context, Result, bail};
use clap::Parser;
use mpr_scene::{
    AssetItem, DecoderRegistry, LocalAssetStore, Orientation, PresetCatalog, SessionEvent,
    Session, ViewerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mpr-scene")]
#[command(about = "Multi-planar reslice of volumes from a local asset store")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "app.toml")]
    config: PathBuf,

    /// Asset store root, overrides the configuration
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Directory the captures are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Items (sub-directories of the store) to load
    items: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("mpr-scene v{}", env!("CARGO_PKG_VERSION"));

    let config = ViewerConfig::load(&args.config)?;
    let Some(root) = args.store.clone().or_else(|| config.assetstore.root.clone()) else {
        bail!("No asset store given, use --store or [assetstore] root");
    };

    let presets = match &config.presets.path {
        Some(path) => PresetCatalog::from_file(path)
            .with_context(|| format!("reading presets from {}", path.display()))?,
        None => PresetCatalog::builtin()?,
    };
    let store = Arc::new(LocalAssetStore::new(root));
    let decoders = Arc::new(DecoderRegistry::with_defaults(config.loading.dicom_sort));

    let items: Vec<AssetItem> = if args.items.is_empty() {
        store.items()?
    } else {
        args.items
            .iter()
            .map(|id| AssetItem::new(id.as_str(), id.as_str()))
            .collect()
    };

    let mut session = Session::new(Arc::new(presets), store, decoders, config);
    for item in &items {
        session.select_item(item);
    }
    for event in session.run_until_idle().await {
        if let SessionEvent::LoadFailed { id, message } = event {
            error!("{}: {}", id, message);
        }
    }

    if session.displayed().is_empty() {
        bail!("Nothing could be loaded");
    }

    std::fs::create_dir_all(&args.output)?;
    for orientation in Orientation::ALL {
        let view = session.scene().slice_view(orientation);
        println!(
            "{:<8} range {:?} slice {:?}",
            orientation.name(),
            view.get_slice_range(),
            view.get_slice()
        );
        if let Some(image) = view.capture_native() {
            let path = args.output.join(format!("{}.png", orientation.name()));
            image
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Saved {}", path.display());
        }
    }

    Ok(())
}
