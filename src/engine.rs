//! Boundary to the native recognition engine
//!
//! The engine is handle based and not reentrant. Each trait below mirrors one
//! family of native primitives; dropping a handle, renderer or cursor releases
//! the native object.

use crate::config::{EngineMode, PageSegMode};
use crate::error::OcrError;
use crate::frame::{Frame, Region};
use crate::render::RenderFormat;
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;

/// Hierarchy depth at which iterator results are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IteratorLevel {
    Block = 0,
    Paragraph = 1,
    TextLine = 2,
    #[default]
    Word = 3,
    Symbol = 4,
}

impl FromStr for IteratorLevel {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" | "0" => Ok(Self::Block),
            "para" | "paragraph" | "1" => Ok(Self::Paragraph),
            "line" | "textline" | "2" => Ok(Self::TextLine),
            "word" | "3" => Ok(Self::Word),
            "symbol" | "char" | "4" => Ok(Self::Symbol),
            other => Err(OcrError::InvalidRequest(format!(
                "unknown iterator level '{}'",
                other
            ))),
        }
    }
}

/// Left/top/right/bottom edges as reported by the page iterator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Edges {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl From<Edges> for Region {
    fn from(e: Edges) -> Self {
        Region::from_edges(e.left, e.top, e.right, e.bottom)
    }
}

/// Arguments for creating one output sink
#[derive(Debug, Clone, Copy)]
pub struct SinkSpec<'a> {
    pub format: RenderFormat,
    pub output_base: &'a str,
    /// Only read by the portable-document sink
    pub datapath: Option<&'a str>,
    /// Only read by the portable-document sink
    pub text_only: bool,
}

/// Factory for engine handles
pub trait RecognitionEngine: Send + Sync {
    type Handle: EngineHandle;

    /// Returns the engine identifier (e.g., "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Create a fresh, uninitialized handle
    fn create_handle(&self) -> Result<Self::Handle, OcrError>;
}

/// One native engine instance. Dropping it deletes the native handle.
pub trait EngineHandle {
    type Renderer: Renderer;
    type Cursor<'a>: ResultCursor
    where
        Self: 'a;

    fn init(
        &mut self,
        datapath: Option<&str>,
        language: &str,
        mode: EngineMode,
        config_profiles: &[String],
    ) -> Result<(), OcrError>;

    fn set_page_seg_mode(&mut self, mode: PageSegMode);

    /// Returns false when the engine does not know the variable
    fn set_variable(&mut self, key: &str, value: &str) -> bool;

    fn set_image(&mut self, frame: &Frame<'_>);

    fn set_rectangle(&mut self, region: &Region);

    /// Input name hint, used for zone file lookups
    fn set_input_name(&mut self, name: &str);

    fn utf8_text(&mut self) -> Result<String, OcrError>;

    /// Positional markup for the current image; `page_index` is zero based
    fn hocr_text(&mut self, page_index: u32) -> Result<String, OcrError>;

    fn recognize(&mut self) -> Result<(), OcrError>;

    /// Result iterator over the last recognition, positioned before the start
    fn result_cursor(&mut self) -> Result<Self::Cursor<'_>, OcrError>;

    /// Layout analysis regions at the given level for the current image.
    /// Only regions inside text blocks are reported.
    fn layout_regions(&mut self, level: IteratorLevel) -> Result<Vec<Region>, OcrError>;

    /// Datapath the handle was initialized with
    fn datapath(&self) -> Option<String>;

    fn create_renderer(&mut self, spec: &SinkSpec<'_>) -> Result<Self::Renderer, OcrError>;

    /// Run the engine over every page of `input`, feeding the renderer chain.
    /// Returns false when the engine reports failure.
    fn process_pages(&mut self, input: &Path, renderer: &mut Self::Renderer) -> bool;
}

/// One native renderer. Dropping the head releases the whole chain.
pub trait Renderer: Sized {
    /// Append `next` at the end of this renderer's chain, transferring ownership
    fn insert(&mut self, next: Self);
}

/// Hierarchical result iterator
pub trait ResultCursor {
    fn begin(&mut self);

    /// Text at `level`; `None` when the engine has nothing at this position
    fn text(&self, level: IteratorLevel) -> Option<String>;

    fn confidence(&self, level: IteratorLevel) -> f32;

    fn bounding_box(&self, level: IteratorLevel) -> Option<Edges>;

    /// Advance at `level`; false once exhausted
    fn next(&mut self, level: IteratorLevel) -> bool;
}
