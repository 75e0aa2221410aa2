//! Web Marker command-line shell.
//!
//! Mounts the core overlay against on-disk storage to inspect, export, upload
//! and delete stored page annotations.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use webmarker_core::overlay::{Overlay, OverlayConfig, OverlayEvent, SaveOption, SaveOutcome};
use webmarker_core::storage::{FileStorage, ScenePersistence, Storage};
use webmarker_core::upload::{
    MediaTransport, ObjectOutcome, UploadConfig, UploadMode, UreqTransport,
};
use webmarker_core::viewport::{PageGeometry, TILE_SIZE};
use webmarker_core::Scene;

#[derive(Debug, Parser)]
#[command(name = "webmarker")]
#[command(about = "Inspect, export and publish Web Marker annotations")]
pub struct Cli {
    /// Annotation store directory. Defaults to the platform data directory.
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List pages with a stored annotation.
    List,
    /// Print a summary of a page's annotation as JSON.
    Show {
        #[arg(long)]
        page: String,
    },
    /// Write a page's annotation as SVG.
    Export {
        #[arg(long)]
        page: String,
        /// Output file. Defaults to a timestamped name in the current directory.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write an HTML preview next to the SVG.
        #[arg(long)]
        preview: bool,
        #[command(flatten)]
        surface: SurfaceArgs,
    },
    /// Publish a page's annotation to the media service.
    Upload {
        #[arg(long)]
        page: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Objects)]
        mode: ModeArg,
        #[arg(long)]
        rights_holder: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        /// Session cookie of a logged-in account.
        #[arg(long)]
        cookie: Option<String>,
        #[command(flatten)]
        surface: SurfaceArgs,
    },
    /// Delete a page's annotation.
    Clear {
        #[arg(long)]
        page: String,
    },
}

/// Size of the drawing surface the annotation is mounted on.
#[derive(Debug, Clone, Copy, clap::Args)]
struct SurfaceArgs {
    #[arg(long, default_value_t = 1280.0)]
    width: f64,
    #[arg(long, default_value_t = TILE_SIZE)]
    height: f64,
}

impl SurfaceArgs {
    fn geometry(&self) -> PageGeometry {
        PageGeometry::simple(self.width, self.height, self.height.min(1000.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Single,
    Objects,
}

impl From<ModeArg> for UploadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Single => UploadMode::Single,
            ModeArg::Objects => UploadMode::Objects,
        }
    }
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    page: String,
    objects: Vec<ObjectSummary>,
}

#[derive(Debug, Serialize)]
struct ObjectSummary {
    index: usize,
    kind: &'static str,
    bounds: [f64; 4],
    uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_id: Option<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let storage = Arc::new(open_storage(cli.data_dir.as_deref())?);

    match cli.command {
        Commands::List => {
            for page in run_list(&storage)? {
                println!("{page}");
            }
            Ok(())
        }
        Commands::Show { page } => {
            let output = run_show(&storage, &page)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Export {
            page,
            out,
            preview,
            surface,
        } => run_export(storage, &page, out, preview, surface),
        Commands::Upload {
            page,
            mode,
            rights_holder,
            base_url,
            cookie,
            surface,
        } => {
            let mut config = UploadConfig::default();
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            let mut transport = UreqTransport::new(config.base_url.clone());
            if let Some(cookie) = cookie {
                transport = transport.with_cookie(cookie);
            }
            run_upload(
                storage,
                Arc::new(transport),
                config,
                &page,
                mode.into(),
                rights_holder,
                surface,
            )
        }
        Commands::Clear { page } => {
            pollster::block_on(ScenePersistence::new(storage).delete(&page))
                .with_context(|| format!("failed to delete annotation for {page}"))?;
            println!("Cleared {page}");
            Ok(())
        }
    }
}

fn open_storage(data_dir: Option<&Path>) -> Result<FileStorage> {
    let storage = match data_dir {
        Some(dir) => FileStorage::new(dir.to_path_buf()),
        None => FileStorage::default_location(),
    };
    storage.context("failed to open annotation store")
}

fn run_list<S: Storage>(storage: &Arc<S>) -> Result<Vec<String>> {
    pollster::block_on(ScenePersistence::new(Arc::clone(storage)).list_pages())
        .context("failed to list stored annotations")
}

fn run_show<S: Storage>(storage: &Arc<S>, page: &str) -> Result<ShowOutput> {
    let persistence = ScenePersistence::new(Arc::clone(storage));
    let Some(snapshot) = pollster::block_on(persistence.load(page))
        .with_context(|| format!("failed to load annotation for {page}"))?
    else {
        bail!("no annotation stored for {page}");
    };

    let mut scene = Scene::default();
    scene
        .restore(&snapshot)
        .with_context(|| format!("stored annotation for {page} is unreadable"))?;

    let objects = scene
        .objects()
        .iter()
        .enumerate()
        .map(|(index, object)| {
            let bounds = object.shape.visual_bounds();
            ObjectSummary {
                index,
                kind: object.shape.kind_name(),
                bounds: [bounds.x0, bounds.y0, bounds.width(), bounds.height()],
                uploaded: object.is_uploaded(),
                media_id: object.upload.as_ref().map(|r| r.media_id.clone()),
                item_id: object.upload.as_ref().and_then(|r| r.item_id.clone()),
            }
        })
        .collect();

    Ok(ShowOutput {
        page: page.to_string(),
        objects,
    })
}

fn mount<S: Storage, T: MediaTransport>(
    storage: Arc<S>,
    transport: Arc<T>,
    config: OverlayConfig,
) -> Result<Overlay<S, T>> {
    let page = config.page_url.clone();
    pollster::block_on(Overlay::mount(config, storage, transport, Instant::now()))
        .with_context(|| format!("failed to open annotation for {page}"))
}

fn report_events<S: Storage, T: MediaTransport>(overlay: &mut Overlay<S, T>) {
    for event in overlay.drain_events() {
        match event {
            OverlayEvent::Notice(text) => println!("{text}"),
            OverlayEvent::UploadProgress(progress) => println!("{}", progress.message()),
            other => log::debug!("{:?}", other),
        }
    }
}

fn run_export<S: Storage>(
    storage: Arc<S>,
    page: &str,
    out: Option<PathBuf>,
    preview: bool,
    surface: SurfaceArgs,
) -> Result<()> {
    let config = OverlayConfig::new(page, surface.geometry());
    // Export never talks to the network
    let transport = Arc::new(UreqTransport::new(config.upload.base_url.clone()));
    let mut overlay = mount(storage, transport, config)?;

    let SaveOutcome::Downloaded(drawing) =
        pollster::block_on(overlay.save_drawing(SaveOption::Download))?
    else {
        bail!("export produced no drawing");
    };
    let path = out.unwrap_or_else(|| PathBuf::from(&drawing.filename));
    fs::write(&path, &drawing.svg).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());

    if preview {
        let preview_path = path.with_extension("html");
        fs::write(&preview_path, &drawing.preview_html)
            .with_context(|| format!("failed to write {}", preview_path.display()))?;
        println!("Wrote {}", preview_path.display());
    }
    Ok(())
}

fn run_upload<S: Storage, T: MediaTransport>(
    storage: Arc<S>,
    transport: Arc<T>,
    upload: UploadConfig,
    page: &str,
    mode: UploadMode,
    rights_holder: Option<String>,
    surface: SurfaceArgs,
) -> Result<()> {
    let config = OverlayConfig {
        upload,
        ..OverlayConfig::new(page, surface.geometry())
    };
    let mut overlay = mount(storage, transport, config)?;

    let result = pollster::block_on(overlay.save_drawing(SaveOption::Upload {
        mode,
        rights_holder,
    }));
    report_events(&mut overlay);
    let outcome = result.with_context(|| format!("upload of {page} failed"))?;

    match outcome {
        SaveOutcome::UploadedSingle(unit) => {
            println!("media {} item {}", unit.media_id, unit.item_id.as_deref().unwrap_or("-"));
        }
        SaveOutcome::UploadedObjects(report) => {
            for result in &report.results {
                match &result.outcome {
                    ObjectOutcome::Uploaded { media_id, .. } => {
                        println!("#{} uploaded as media {}", result.index + 1, media_id)
                    }
                    ObjectOutcome::Skipped { media_id, .. } => {
                        println!("#{} already uploaded as media {}", result.index + 1, media_id)
                    }
                    ObjectOutcome::Failed(e) => println!("#{} failed: {}", result.index + 1, e),
                }
            }
        }
        SaveOutcome::Downloaded(_) => {}
    }

    pollster::block_on(overlay.exit());
    report_events(&mut overlay);
    Ok(())
}
