use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn};

use sprite_anchor::config::{PipelineConfig, load_settings};
use sprite_anchor::emit::{self, CropCommandSpec};
use sprite_anchor::fetch::fetch_all;
use sprite_anchor::pipeline::register;
use sprite_anchor::provider::{ArchiveProvider, AssetProvider, MediaWikiProvider};
use sprite_anchor::{
    AnchorAdapter, AnchorMap, AnchorStore, PortraitSize, Selection, create_detector, load_merged,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Register one face anchor per sprite and derive CSS offsets and crop commands from it"
)]
struct Args {
    /// Settings JSON (defaults to config/anchor_settings.json when present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Automatic anchor store
    #[clap(long, global = true)]
    store: Option<PathBuf>,

    /// Manual override file (same shape as the store)
    #[clap(long, global = true)]
    manual: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[clap(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download sprites into the image directory, skipping cached files
    #[clap(alias = "download")]
    Fetch {
        /// Directory to download into
        #[clap(long)]
        images: Option<PathBuf>,

        /// MediaWiki api.php endpoint
        #[clap(long)]
        api_url: Option<String>,

        /// Wiki category listing the sprites
        #[clap(long)]
        category: Option<String>,

        /// Read sprites from a local zip archive instead of the wiki
        #[clap(long, conflicts_with_all = ["api_url", "category"])]
        archive: Option<PathBuf>,
    },

    /// Detect one anchor per image and rewrite the store
    #[clap(alias = "predict")]
    Detect {
        /// Directory containing the sprites
        #[clap(long)]
        images: Option<PathBuf>,

        /// Directory for annotated debug images
        #[clap(long)]
        overlay_dir: Option<PathBuf>,

        /// Do not write annotated debug images
        #[clap(long, conflicts_with = "overlay_dir")]
        no_overlay: bool,

        /// Candidate selection policy
        #[clap(long, value_enum)]
        selection: Option<Selection>,

        /// Face detector to use (rustface, etc.)
        #[clap(long)]
        detector: Option<String>,

        /// Detector model file
        #[clap(long)]
        model: Option<PathBuf>,

        /// Box confidence threshold (0.0-1.0)
        #[clap(long)]
        box_threshold: Option<f32>,
    },

    /// Print CSS offset rules
    Css {
        /// Ratio between stored and displayed image size
        #[clap(long)]
        multiplier: Option<f64>,

        /// Half of the visible window, in CSS pixels
        #[clap(long)]
        inset: Option<f64>,

        /// Class name prefix
        #[clap(long)]
        prefix: Option<String>,
    },

    /// Print wikitext cases for sprites with a non-standard height
    Height {
        /// Height that needs no entry
        #[clap(long)]
        reference_height: Option<u32>,
    },

    /// Print one wikitext switch per stored field
    Switch,

    /// Print crop commands centered on each anchor
    Crop {
        /// Portrait size as WIDTHxHEIGHT
        #[clap(long)]
        portrait: Option<PortraitSize>,

        /// Crop program to invoke
        #[clap(long)]
        program: Option<String>,
    },
}

fn init_logging(args: &Args) {
    let level = match (args.quiet, args.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

/// Fold subcommand flags into the loaded settings.
fn apply_cli_overrides(settings: &mut PipelineConfig, args: &Args) {
    if let Some(store) = &args.store {
        settings.paths.store = store.clone();
    }
    if let Some(manual) = &args.manual {
        settings.paths.manual = manual.clone();
    }

    match &args.command {
        Command::Fetch {
            images,
            api_url,
            category,
            ..
        } => {
            if let Some(images) = images {
                settings.paths.images_dir = images.clone();
            }
            if let Some(api_url) = api_url {
                settings.fetch.api_url = Some(api_url.clone());
            }
            if let Some(category) = category {
                settings.fetch.category = category.clone();
            }
        }
        Command::Detect {
            images,
            overlay_dir,
            no_overlay,
            selection,
            detector,
            model,
            box_threshold,
        } => {
            if let Some(images) = images {
                settings.paths.images_dir = images.clone();
            }
            if let Some(dir) = overlay_dir {
                settings.paths.overlay_dir = Some(dir.clone());
            }
            if *no_overlay {
                settings.paths.overlay_dir = None;
            }
            if let Some(selection) = selection {
                settings.detection.selection = *selection;
            }
            if let Some(detector) = detector {
                settings.detection.detector = detector.clone();
            }
            if let Some(model) = model {
                settings.detection.model_path = model.clone();
            }
            if let Some(threshold) = box_threshold {
                settings.detection.box_threshold = *threshold;
            }
        }
        Command::Css {
            multiplier,
            inset,
            prefix,
        } => {
            if let Some(multiplier) = multiplier {
                settings.css.multiplier = *multiplier;
            }
            if let Some(inset) = inset {
                settings.css.inset = *inset;
            }
            if let Some(prefix) = prefix {
                settings.css.selector_prefix = prefix.clone();
            }
        }
        Command::Height { reference_height } => {
            if let Some(height) = reference_height {
                settings.heights.reference_height = *height;
            }
        }
        Command::Switch => {}
        Command::Crop { portrait, program } => {
            if let Some(portrait) = portrait {
                settings.crop.width = portrait.width;
                settings.crop.height = portrait.height;
            }
            if let Some(program) = program {
                settings.crop.program = program.clone();
            }
        }
    }
}

fn load_anchors(settings: &PipelineConfig) -> Result<AnchorMap> {
    let base = AnchorStore::new(&settings.paths.store);
    let manual = AnchorStore::new(&settings.paths.manual);
    let anchors = load_merged(&base, &manual).with_context(|| {
        format!(
            "failed to load anchors from {} and {}",
            base.path().display(),
            manual.path().display()
        )
    })?;
    if anchors.is_empty() {
        warn!("No anchors found in {}", base.path().display());
    }
    Ok(anchors)
}

fn print_lines(lines: &[String]) -> Result<()> {
    let mut out = io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

fn run_fetch(settings: &PipelineConfig, archive: Option<&PathBuf>) -> Result<()> {
    let provider: Box<dyn AssetProvider> = match archive {
        Some(path) => {
            info!("Reading sprites from archive {}", path.display());
            Box::new(ArchiveProvider::new(path, &settings.detection.extensions))
        }
        None => {
            let Some(api_url) = settings.fetch.api_url.as_deref() else {
                bail!("no wiki endpoint configured; pass --api-url or set fetch.api_url");
            };
            info!("Listing {} on {}", settings.fetch.category, api_url);
            Box::new(MediaWikiProvider::new(
                api_url,
                &settings.fetch.category,
                &settings.fetch.user_agent,
            ))
        }
    };

    let summary = fetch_all(&*provider, &settings.naming, &settings.paths.images_dir)
        .context("failed to fetch sprites")?;
    if summary.failed > 0 {
        warn!("{} download(s) failed; re-run fetch to retry", summary.failed);
    }
    Ok(())
}

fn run_detect(settings: &PipelineConfig) -> Result<()> {
    let detection = &settings.detection;
    info!("Initializing face detector: {}", detection.detector);
    let detector = create_detector(
        &detection.detector,
        &detection.model_path,
        &detection.model_urls,
    )
    .context("Failed to initialize face detector")?;

    let mut adapter =
        AnchorAdapter::new(detector, detection.query()).with_policy(Box::new(detection.selection));
    if let Some(dir) = &settings.paths.overlay_dir {
        adapter = adapter.with_overlay_dir(dir);
    }
    info!(
        "Detecting with {} ({:?} selection)",
        adapter.detector_name(),
        detection.selection
    );

    let store = AnchorStore::new(&settings.paths.store);
    let summary = register(
        &mut adapter,
        &settings.naming,
        &settings.paths.images_dir,
        &detection.extensions,
        &store,
    )
    .context("detection run failed")?;

    if summary.no_detection > 0 {
        warn!(
            "{} image(s) had no detection; add them to {} to include them",
            summary.no_detection,
            settings.paths.manual.display()
        );
    }
    Ok(())
}

/// Main program logic
fn run(args: Args) -> Result<()> {
    init_logging(&args);

    let mut settings = load_settings(args.config.as_deref()).context("Failed to load settings")?;
    apply_cli_overrides(&mut settings, &args);
    settings.validate().context("Invalid settings")?;

    match &args.command {
        Command::Fetch { archive, .. } => run_fetch(&settings, archive.as_ref()),
        Command::Detect { .. } => run_detect(&settings),
        Command::Css { .. } => {
            let anchors = load_anchors(&settings)?;
            print_lines(&emit::css_rules(
                &anchors,
                &settings.css.params(),
                &settings.css.selector_prefix,
            ))
        }
        Command::Height { .. } => {
            let anchors = load_anchors(&settings)?;
            print_lines(&emit::height_switch(
                &anchors,
                settings.heights.reference_height,
            ))
        }
        Command::Switch => {
            let anchors = load_anchors(&settings)?;
            print_lines(&emit::field_switches(&anchors))
        }
        Command::Crop { .. } => {
            let anchors = load_anchors(&settings)?;
            let command = CropCommandSpec {
                program: &settings.crop.program,
                portrait: settings.crop.portrait(),
                naming: &settings.naming,
                extension: &settings.crop.extension,
            };
            print_lines(&emit::crop_commands(&anchors, &command))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    run(args)
}
