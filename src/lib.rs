//! Session and batch orchestration over a handle-based OCR engine.
//!
//! A [`Recognizer`] turns images, pixel buffers and documents into text,
//! word records, layout regions or rendered files. Each call owns one engine
//! session from creation to disposal.

pub mod batch;
pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extract;
pub mod frame;
pub mod rasterize;
pub mod recognizer;
pub mod render;
pub mod server;
pub mod session;
pub mod tessdata;
pub mod variables;
pub mod words;

pub use batch::{BatchReport, DocumentJob, JobOutcome};
pub use config::{EngineMode, OutputMode, PageSegMode, SessionConfig, VariablePolicy};
pub use engine::{EngineHandle, IteratorLevel, RecognitionEngine, Renderer, ResultCursor};
pub use error::OcrError;
pub use frame::{DecodedImage, Frame, Region};
pub use recognizer::{Recognizer, TextOutput};
pub use render::{RenderFormat, RendererChain};
pub use session::OcrSession;
pub use words::Word;
