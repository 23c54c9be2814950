use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;
#[cfg(unix)]
use tracing::warn;

use quote_maker_rust::export::{BatchExporter, CancelToken, ExportJob, ItemOutcome};
use quote_maker_rust::preview::{PreviewController, PreviewEvent};
use quote_maker_rust::settings::{self, Settings};
use quote_maker_rust::style::{Rgb, StyleConfig};
use quote_maker_rust::{BackgroundImage, Compositor, FontLibrary, load_texts};

#[derive(Parser, Debug)]
#[command(
    name = "quote-maker-rust",
    version,
    about = "Overlay text blocks on a background image"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug, Default)]
struct StyleArgs {
    /// Font family name (falls back to a platform font when missing)
    #[arg(long = "font-family", global = true)]
    font_family: Option<String>,

    /// Font size in points (8-72)
    #[arg(long = "font-size", global = true)]
    font_size: Option<u32>,

    /// Text colour as #RRGGBB or #RGB
    #[arg(long = "color", global = true)]
    color: Option<String>,

    /// Line spacing multiplier (>= 1.0)
    #[arg(long = "line-spacing", global = true)]
    line_spacing: Option<f32>,

    /// Margin applied to all four sides (0-200)
    #[arg(long = "margin", global = true)]
    margin: Option<u32>,

    /// Disable horizontal and vertical centering
    #[arg(long = "no-center", global = true)]
    no_center: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every text over the background into a fresh export directory
    Export {
        /// Background image
        #[arg(short = 'b', long = "background")]
        background: PathBuf,

        /// Text file (.json array or one entry per line)
        #[arg(short = 't', long = "texts")]
        texts: PathBuf,

        /// Directory under which export_<timestamp> is created
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Export scale factor
        #[arg(short = 's', long = "scale")]
        scale: Option<u32>,
    },
    /// Render one text at preview resolution and save it as PNG
    Preview {
        #[arg(short = 'b', long = "background")]
        background: PathBuf,

        #[arg(short = 't', long = "texts")]
        texts: PathBuf,

        /// 0-based index of the text to preview
        #[arg(short = 'i', long = "index", default_value_t = 0)]
        index: usize,

        /// Viewport width
        #[arg(long = "width")]
        width: Option<u32>,

        /// Viewport height
        #[arg(long = "height")]
        height: Option<u32>,

        /// Output PNG path
        #[arg(long = "out")]
        out: PathBuf,
    },
    /// List available font families
    Fonts,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    quote_maker_rust::logging::init(cli.verbose)?;

    let settings_path = cli.read_settings.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let style = apply_style_overrides(&settings.style, &cli.style)?;
    let fonts = FontLibrary::load(Some(&settings.fonts_dir));
    let compositor = Compositor::new(fonts);

    match cli.command {
        Command::Export {
            background,
            texts,
            output,
            scale,
        } => run_export(&settings, style, compositor, &background, &texts, output, scale),
        Command::Preview {
            background,
            texts,
            index,
            width,
            height,
            out,
        } => {
            let viewport = (
                width.unwrap_or(settings.preview_width),
                height.unwrap_or(settings.preview_height),
            );
            run_preview(&settings, style, compositor, &background, &texts, index, viewport, &out)
        }
        Command::Fonts => {
            for family in compositor.fonts().families() {
                println!("{}", family);
            }
            Ok(())
        }
    }
}

fn apply_style_overrides(base: &StyleConfig, args: &StyleArgs) -> Result<StyleConfig> {
    let mut style = base.clone();
    if let Some(family) = args.font_family.as_deref() {
        let family = family.trim();
        if !family.is_empty() {
            style.font_family = family.to_string();
        }
    }
    if let Some(size) = args.font_size {
        style.font_size = size;
    }
    if let Some(color) = args.color.as_deref() {
        style.text_color = Rgb::parse_hex(color)?;
    }
    if let Some(spacing) = args.line_spacing {
        style.line_spacing = spacing;
    }
    if let Some(margin) = args.margin {
        style = style.with_margins(margin);
    }
    if args.no_center {
        style.center_horizontally = false;
        style.center_vertically = false;
    }
    style
        .validate()
        .with_context(|| "invalid style options")?;
    Ok(style)
}

fn run_export(
    settings: &Settings,
    style: StyleConfig,
    compositor: Compositor,
    background: &Path,
    texts: &Path,
    output: Option<PathBuf>,
    scale: Option<u32>,
) -> Result<()> {
    let background = BackgroundImage::open(background)?;
    let entries = load_texts(texts)?;
    let job = ExportJob::new(output.unwrap_or_else(|| settings.output_root.clone()))
        .with_scale_factor(scale.unwrap_or(settings.scale_factor))
        .with_compensation(settings.export_compensation);

    let cancel = CancelToken::new();
    watch_interrupt(&cancel);

    let exporter = BatchExporter::new(compositor);
    let summary = exporter.run(
        &job,
        Some(&background),
        &entries,
        &style,
        |progress| match progress.outcome {
            ItemOutcome::Written(path) => {
                eprintln!("[{}/{}] {}", progress.index + 1, progress.total, path.display())
            }
            ItemOutcome::Failed(err) => {
                eprintln!("[{}/{}] failed: {}", progress.index + 1, progress.total, err)
            }
        },
        &cancel,
    )?;

    println!(
        "{} written, {} failed -> {}",
        summary.written,
        summary.failed,
        summary.output_dir.display()
    );
    if summary.cancelled {
        println!("cancelled, {} skipped", summary.skipped);
        return Ok(());
    }
    if summary.written == 0 {
        return Err(anyhow!("no images were exported"));
    }
    Ok(())
}

#[cfg(unix)]
fn watch_interrupt(cancel: &CancelToken) {
    if let Err(err) = cancel.cancel_on_interrupt() {
        warn!("Ctrl-C will not cancel the export: {}", err);
    }
}

#[cfg(not(unix))]
fn watch_interrupt(_cancel: &CancelToken) {}

#[allow(clippy::too_many_arguments)]
fn run_preview(
    settings: &Settings,
    style: StyleConfig,
    compositor: Compositor,
    background: &Path,
    texts: &Path,
    index: usize,
    viewport: (u32, u32),
    out: &Path,
) -> Result<()> {
    let background = BackgroundImage::open(background)?;
    let entries = load_texts(texts)?;
    if index >= entries.len() {
        return Err(anyhow!(
            "index {} out of range ({} texts loaded)",
            index,
            entries.len()
        ));
    }

    let mut preview = PreviewController::new(compositor, style, viewport)
        .with_compensation(settings.preview_compensation);
    preview.handle(PreviewEvent::BackgroundChanged(Some(background)));
    preview.handle(PreviewEvent::TextsChanged(
        entries.into_iter().map(|entry| entry.text).collect(),
    ));
    preview.handle(PreviewEvent::ActiveIndexChanged(index));
    preview
        .save_frame(out)
        .with_context(|| format!("failed to save preview to {}", out.display()))?;
    if let Some(layout) = preview.layout() {
        info!("text origin at ({:.1}, {:.1})", layout.x, layout.y);
    }
    println!("{}", out.display());
    Ok(())
}
