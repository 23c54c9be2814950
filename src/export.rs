use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, error, info, warn};

use crate::background::BackgroundImage;
use crate::compositor::Compositor;
use crate::error::{ComposeError, Result};
use crate::font::ResolvedFont;
use crate::layout::{EXPORT_COMPENSATION, RenderContext};
use crate::style::StyleConfig;
use crate::texts::TextEntry;

pub const DEFAULT_SCALE_FACTOR: u32 = 2;
const FILE_PREFIX: &str = "image_";

/// Cooperative cancellation flag, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Cancels on SIGINT. A second SIGINT after the first terminates the
    /// process as usual.
    #[cfg(unix)]
    pub fn cancel_on_interrupt(&self) -> std::io::Result<()> {
        use signal_hook::consts::SIGINT;
        use signal_hook::flag;

        flag::register_conditional_shutdown(SIGINT, 130, Arc::clone(&self.0))?;
        flag::register(SIGINT, Arc::clone(&self.0))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Directory under which the timestamped export directory is created.
    pub output_root: PathBuf,
    pub scale_factor: u32,
    pub compensation: f32,
}

impl ExportJob {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            scale_factor: DEFAULT_SCALE_FACTOR,
            compensation: EXPORT_COMPENSATION,
        }
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_compensation(mut self, compensation: f32) -> Self {
        self.compensation = compensation;
        self
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Written(PathBuf),
    Failed(ComposeError),
}

/// Reported after every attempted item, successful or not.
#[derive(Debug)]
pub struct ExportProgress<'a> {
    pub index: usize,
    pub total: usize,
    pub outcome: &'a ItemOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub output_dir: PathBuf,
    pub written: usize,
    pub failed: usize,
    /// Items never attempted because the run was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
    pub files: Vec<PathBuf>,
}

/// Renders every text of a sequence over one background at export
/// resolution, one file per item.
pub struct BatchExporter {
    compositor: Compositor,
}

impl BatchExporter {
    pub fn new(compositor: Compositor) -> Self {
        Self { compositor }
    }

    /// Runs the export. Missing background and empty input fail before the
    /// output directory is created; per-item failures are logged and counted.
    pub fn run<F>(
        &self,
        job: &ExportJob,
        background: Option<&BackgroundImage>,
        texts: &[TextEntry],
        style: &StyleConfig,
        mut on_progress: F,
        cancel: &CancelToken,
    ) -> Result<ExportSummary>
    where
        F: FnMut(&ExportProgress<'_>),
    {
        let background = background
            .ok_or_else(|| ComposeError::Resource("no background image selected".into()))?;
        if texts.is_empty() {
            return Err(ComposeError::Validation("no texts to export".into()));
        }
        if job.scale_factor < 1 {
            return Err(ComposeError::Validation(format!(
                "scale factor {} must be at least 1",
                job.scale_factor
            )));
        }

        let output_dir = create_export_dir(&job.output_root)?;
        info!(
            "exporting {} items to {} at {}x",
            texts.len(),
            output_dir.display(),
            job.scale_factor
        );

        let font = self.compositor.fonts().resolve(&style.font_family);
        if font.substituted {
            warn!(
                "font '{}' not available, export uses {}",
                font.requested,
                font.family().unwrap_or("estimated metrics")
            );
        }
        let context = RenderContext::export().with_compensation(job.compensation);

        let total = texts.len();
        let mut summary = ExportSummary {
            output_dir,
            written: 0,
            failed: 0,
            skipped: 0,
            cancelled: false,
            files: Vec::new(),
        };
        for (position, entry) in texts.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                summary.skipped = total - position;
                info!("export cancelled after {} of {} items", position, total);
                break;
            }
            let outcome = match self.export_item(
                background,
                entry,
                style,
                &font,
                &context,
                job.scale_factor,
                &summary.output_dir,
            ) {
                Ok(path) => {
                    debug!("wrote {}", path.display());
                    summary.written += 1;
                    summary.files.push(path.clone());
                    ItemOutcome::Written(path)
                }
                Err(err) => {
                    error!("failed to export image {}: {}", entry.index + 1, err);
                    summary.failed += 1;
                    ItemOutcome::Failed(err)
                }
            };
            on_progress(&ExportProgress {
                index: position,
                total,
                outcome: &outcome,
            });
        }

        info!(
            "export finished: {} written, {} failed, {} skipped",
            summary.written, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn export_item(
        &self,
        background: &BackgroundImage,
        entry: &TextEntry,
        style: &StyleConfig,
        font: &ResolvedFont,
        context: &RenderContext,
        scale_factor: u32,
        output_dir: &Path,
    ) -> Result<PathBuf> {
        let frame = self.compositor.compose_with_font(
            background,
            &entry.text,
            style,
            font.clone(),
            context,
            scale_factor as f32,
        )?;
        let path = output_dir.join(item_file_name(entry.index));
        frame
            .image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|err| match err {
                image::ImageError::IoError(source) => ComposeError::io(&path, source),
                other => ComposeError::io(&path, std::io::Error::other(other.to_string())),
            })?;
        Ok(path)
    }
}

pub fn item_file_name(index: usize) -> String {
    format!("{}{}.png", FILE_PREFIX, index + 1)
}

fn create_export_dir(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root).map_err(|err| ComposeError::io(root, err))?;
    let base = format!("export_{}", timestamp());
    let mut candidate = root.join(&base);
    let mut attempt = 1;
    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                attempt += 1;
                candidate = root.join(format!("{}_{}", base, attempt));
            }
            Err(err) => return Err(ComposeError::io(&candidate, err)),
        }
    }
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontLibrary;
    use crate::texts::entries_from;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn exporter() -> BatchExporter {
        BatchExporter::new(Compositor::new(FontLibrary::empty()))
    }

    fn background(w: u32, h: u32) -> BackgroundImage {
        let image = RgbaImage::from_pixel(w, h, Rgba([100, 181, 246, 255]));
        BackgroundImage::from_image(DynamicImage::ImageRgba8(image)).unwrap()
    }

    #[test]
    fn file_names_are_one_based() {
        assert_eq!(item_file_name(0), "image_1.png");
        assert_eq!(item_file_name(41), "image_42.png");
    }

    #[test]
    fn timestamp_shape() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }

    #[test]
    fn export_dirs_are_fresh_even_within_one_second() {
        let root = tempfile::tempdir().expect("tempdir");
        let first = create_export_dir(root.path()).unwrap();
        let second = create_export_dir(root.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }

    #[test]
    fn missing_background_fails_before_creating_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let output_root = root.path().join("outputs");
        let err = exporter()
            .run(
                &ExportJob::new(&output_root),
                None,
                &entries_from(["a"]),
                &StyleConfig::default(),
                |_| {},
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::Resource(_)));
        assert!(!output_root.exists());
    }

    #[test]
    fn empty_texts_fail_before_creating_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let output_root = root.path().join("outputs");
        let bg = background(10, 10);
        let err = exporter()
            .run(
                &ExportJob::new(&output_root),
                Some(&bg),
                &[],
                &StyleConfig::default(),
                |_| {},
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(!output_root.exists());
    }

    #[test]
    fn zero_scale_is_rejected() {
        let root = tempfile::tempdir().expect("tempdir");
        let bg = background(10, 10);
        let err = exporter()
            .run(
                &ExportJob::new(root.path().join("o")).with_scale_factor(0),
                Some(&bg),
                &entries_from(["a"]),
                &StyleConfig::default(),
                |_| {},
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
    }

    #[test]
    fn progress_reported_for_every_item() {
        let root = tempfile::tempdir().expect("tempdir");
        let bg = background(20, 30);
        let mut seen = Vec::new();
        let summary = exporter()
            .run(
                &ExportJob::new(root.path()),
                Some(&bg),
                &entries_from(["one", "two", "three"]),
                &StyleConfig::default(),
                |progress| seen.push((progress.index, progress.total)),
                &CancelToken::new(),
            )
            .unwrap();
        assert_eq!(seen, vec![(0, 3), (1, 3), (2, 3)]);
        assert_eq!(summary.written, 3);
        assert!(!summary.cancelled);
    }

    #[cfg(unix)]
    #[test]
    fn interrupt_cancels_the_token() {
        let cancel = CancelToken::new();
        cancel.cancel_on_interrupt().unwrap();
        assert!(!cancel.is_cancelled());
        signal_hook::low_level::raise(signal_hook::consts::SIGINT).unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn cancelled_before_start_writes_nothing() {
        let root = tempfile::tempdir().expect("tempdir");
        let bg = background(20, 30);
        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = exporter()
            .run(
                &ExportJob::new(root.path()),
                Some(&bg),
                &entries_from(["one", "two"]),
                &StyleConfig::default(),
                |_| {},
                &cancel,
            )
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!((summary.written, summary.skipped), (0, 2));
        assert_eq!(std::fs::read_dir(&summary.output_dir).unwrap().count(), 0);
    }
}
