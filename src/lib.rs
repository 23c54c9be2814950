pub mod background;
pub mod compositor;
pub mod error;
pub mod export;
pub mod font;
pub mod layout;
pub mod logging;
mod paths;
pub mod preview;
pub mod settings;
pub mod style;
pub mod texts;

pub use background::BackgroundImage;
pub use compositor::{Compositor, Frame};
pub use error::{ComposeError, Result};
pub use export::{BatchExporter, CancelToken, ExportJob, ExportProgress, ExportSummary, ItemOutcome};
pub use font::{FontLibrary, MeasuredBlock, ResolvedFont, measure};
pub use layout::{LayoutResult, RenderContext, drawn_height, place};
pub use preview::{PreviewController, PreviewEvent};
pub use settings::{Settings, load_settings};
pub use style::{Rgb, StyleConfig};
pub use texts::{TextEntry, load_texts};
