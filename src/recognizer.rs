//! Public OCR entry points
//!
//! Every call opens its own session, does its work and disposes the session
//! before returning, whatever the outcome.

use crate::batch::{self, BatchReport, DocumentJob};
use crate::codec::{ImageCodec, ImageCrateCodec, PageResult};
use crate::config::{OutputMode, SessionConfig};
use crate::engine::{EngineHandle, IteratorLevel, RecognitionEngine};
use crate::error::OcrError;
use crate::extract;
use crate::frame::{self, DecodedImage, Frame, Region};
use crate::rasterize::{self, DocumentRasterizer, LopdfRasterizer};
use crate::render::RenderFormat;
use crate::session::OcrSession;
use crate::words::{Word, WordWalker};
use image::DynamicImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A page left out of a multi-page result
#[derive(Debug)]
pub struct PageFailure {
    /// One based position in the input
    pub page: u32,
    pub error: OcrError,
}

/// Recognized text of a multi-page input
#[derive(Debug)]
pub struct TextOutput {
    pub text: String,
    /// Pages seen, including skipped ones
    pub pages: u32,
    pub skipped: Vec<PageFailure>,
}

impl TextOutput {
    pub fn warnings(&self) -> Vec<String> {
        self.skipped
            .iter()
            .map(|f| format!("Skipped page {}: {}", f.page, f.error))
            .collect()
    }
}

/// Engine information exposed to callers
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub struct Recognizer<E: RecognitionEngine> {
    engine: Arc<E>,
    config: SessionConfig,
    codec: Arc<dyn ImageCodec>,
    rasterizer: Arc<dyn DocumentRasterizer>,
}

impl<E: RecognitionEngine> Clone for Recognizer<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: self.config.clone(),
            codec: Arc::clone(&self.codec),
            rasterizer: Arc::clone(&self.rasterizer),
        }
    }
}

impl<E: RecognitionEngine> Recognizer<E> {
    pub fn new(engine: E, config: SessionConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
            codec: Arc::new(ImageCrateCodec),
            rasterizer: Arc::new(LopdfRasterizer),
        }
    }

    pub fn with_codec(mut self, codec: impl ImageCodec + 'static) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl DocumentRasterizer + 'static) -> Self {
        self.rasterizer = Arc::new(rasterizer);
        self
    }

    /// Same engine, codec and rasterizer under a different configuration
    pub fn with_config(&self, config: SessionConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            name: self.engine.name(),
            description: self.engine.description(),
        }
    }

    fn open_session(&self) -> Result<OcrSession<'_, E::Handle>, OcrError> {
        OcrSession::open(self.engine.as_ref(), &self.config)
    }

    /// OCR an image file or a PDF, every page in order
    pub fn ocr_file(&self, path: &Path, roi: Option<Region>) -> Result<TextOutput, OcrError> {
        let input = path.display().to_string();
        let pages = self
            .load_pages(path)
            .map_err(|e| OcrError::recognition(&input, e))?;
        self.ocr_pages(pages, Some(&input), roi)
            .map_err(|e| OcrError::recognition(&input, e))
    }

    fn load_pages(&self, path: &Path) -> Result<Vec<PageResult>, OcrError> {
        if !rasterize::is_pdf(path)? {
            return self.codec.decode_file(path);
        }

        let doc = self.rasterizer.rasterize(path)?;
        let mut pages = Vec::with_capacity(doc.pages().len());
        for page in doc.pages() {
            match self.codec.decode_file(page) {
                Ok(decoded) => pages.extend(decoded),
                Err(e) => pages.push(Err(e)),
            }
        }
        Ok(pages)
    }

    /// OCR an in-memory image
    pub fn ocr_image(&self, image: &DynamicImage, roi: Option<Region>) -> Result<TextOutput, OcrError> {
        self.ocr_pages(self.codec.decode_image(image), None, roi)
            .map_err(|e| OcrError::recognition("in-memory image", e))
    }

    /// OCR decoded pages in order.
    ///
    /// A page that failed to decode or does not form a valid frame is skipped
    /// and recorded; page numbering keeps counting it. Markup output is
    /// wrapped once around all pages.
    pub fn ocr_pages<I>(
        &self,
        pages: I,
        input_name: Option<&str>,
        roi: Option<Region>,
    ) -> Result<TextOutput, OcrError>
    where
        I: IntoIterator<Item = PageResult>,
    {
        let mut session = self.open_session()?;
        let mode = self.config.output_mode;

        let mut text = String::new();
        let mut skipped = Vec::new();
        let mut page_number = 0u32;

        for page in pages {
            page_number += 1;

            let frame_ready = page.and_then(|decoded| {
                let frame = decoded.frame()?;
                frame::submit(session.handle(), &frame, roi.as_ref());
                Ok(())
            });
            if let Err(error) = frame_ready {
                tracing::error!("Skipping page {}: {}", page_number, error);
                skipped.push(PageFailure {
                    page: page_number,
                    error,
                });
                continue;
            }

            let page_text = extract::extract_text(session.handle(), mode, input_name, page_number)?;
            text.push_str(&page_text);
        }

        if mode == OutputMode::Hocr {
            text = extract::wrap_hocr(&text);
        }

        tracing::info!(
            "Recognized {} page(s), {} skipped, {} chars",
            page_number,
            skipped.len(),
            text.len()
        );

        Ok(TextOutput {
            text,
            pages: page_number,
            skipped,
        })
    }

    /// OCR a raw pixel buffer; `bits_per_pixel` is 1, 8, 24 or 32
    pub fn ocr_buffer(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        bits_per_pixel: u32,
        input_name: Option<&str>,
        roi: Option<Region>,
    ) -> Result<String, OcrError> {
        let label = input_name.unwrap_or("pixel buffer");
        let run = || -> Result<String, OcrError> {
            let frame = Frame::new(data, width, height, bits_per_pixel)?;
            let mut session = self.open_session()?;
            frame::submit(session.handle(), &frame, roi.as_ref());
            let text = extract::extract_text(session.handle(), self.config.output_mode, input_name, 1)?;
            Ok(match self.config.output_mode {
                OutputMode::Hocr => extract::wrap_hocr(&text),
                OutputMode::Text => text,
            })
        };
        run().map_err(|e| OcrError::recognition(label, e))
    }

    /// Export one document in every requested format
    pub fn create_document(
        &self,
        input: &Path,
        output_base: &Path,
        formats: &[RenderFormat],
    ) -> Result<Vec<PathBuf>, OcrError> {
        let report = self.create_documents(&[DocumentJob::new(input, output_base)], formats)?;
        report
            .outcomes
            .into_iter()
            .next()
            .map(|outcome| outcome.result)
            .unwrap_or_else(|| Err(OcrError::Internal("batch produced no outcome".to_string())))
            .map_err(|e| OcrError::recognition(input.display().to_string(), e))
    }

    /// Export parallel input/output arrays; see [`Recognizer::create_documents`]
    pub fn create_documents_from<P, Q>(
        &self,
        inputs: &[P],
        output_bases: &[Q],
        formats: &[RenderFormat],
    ) -> Result<BatchReport, OcrError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let jobs = batch::jobs_from(inputs, output_bases)?;
        self.create_documents(&jobs, formats)
    }

    /// Export every job through one session.
    ///
    /// Only precondition failures and session setup fail the call; per-job
    /// failures land in the report.
    pub fn create_documents(
        &self,
        jobs: &[DocumentJob],
        formats: &[RenderFormat],
    ) -> Result<BatchReport, OcrError> {
        if formats.is_empty() {
            return Err(OcrError::InvalidRequest(
                "at least one output format is required".to_string(),
            ));
        }

        let mut session = self.open_session()?;
        Ok(batch::process_batch(
            &mut session,
            jobs,
            formats,
            self.rasterizer.as_ref(),
        ))
    }

    /// Text layout regions of an image at the given level
    pub fn segmented_regions(
        &self,
        image: &DynamicImage,
        level: IteratorLevel,
    ) -> Result<Vec<Region>, OcrError> {
        let run = || -> Result<Vec<Region>, OcrError> {
            let decoded = DecodedImage::from_dynamic(image);
            let frame = decoded.frame()?;
            let mut session = self.open_session()?;
            frame::submit(session.handle(), &frame, None);
            session.handle().layout_regions(level)
        };
        run().map_err(|e| OcrError::recognition("segmentation", e))
    }

    /// Recognize an image and collect its results at `level`
    pub fn words(&self, image: &DynamicImage, level: IteratorLevel) -> Result<Vec<Word>, OcrError> {
        let decoded = DecodedImage::from_dynamic(image);
        let frame = decoded
            .frame()
            .map_err(|e| OcrError::recognition("word extraction", e))?;
        self.walk_words(&frame, level, |words| words.collect())
    }

    /// Recognize a frame and hand the single-pass result sequence to `consume`.
    ///
    /// If recognition or the iterator fails, `consume` sees whatever was
    /// produced before the failure.
    pub fn walk_words<T, F>(&self, frame: &Frame<'_>, level: IteratorLevel, consume: F) -> Result<T, OcrError>
    where
        F: FnOnce(&mut dyn Iterator<Item = Word>) -> T,
    {
        let mut session = self
            .open_session()
            .map_err(|e| OcrError::recognition("word extraction", e))?;
        let handle = session.handle();
        frame::submit(handle, frame, None);

        if let Err(e) = handle.recognize() {
            tracing::warn!("Recognition failed, returning no words: {}", e);
            return Ok(consume(&mut std::iter::empty()));
        }

        // The cursor borrows the session, so the result must be bound before it drops
        let words = match handle.result_cursor() {
            Ok(cursor) => {
                let mut walker = WordWalker::new(cursor, level);
                consume(&mut walker)
            }
            Err(e) => {
                tracing::warn!("No result iterator, returning no words: {}", e);
                consume(&mut std::iter::empty())
            }
        };
        Ok(words)
    }
}
