//! Native Tesseract backend
//!
//! Binds the Tesseract C API through `leptess::capi`. Every native object is
//! wrapped in an owning type whose `Drop` calls the matching delete function,
//! and every string crossing the boundary is copied before it is released.

use crate::config::{EngineMode, PageSegMode};
use crate::engine::{Edges, EngineHandle, IteratorLevel, RecognitionEngine, Renderer, ResultCursor, SinkSpec};
use crate::error::OcrError;
use crate::frame::{Frame, Region};
use crate::render::RenderFormat;
use leptess::capi;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::ptr;

/// Tesseract engine factory
#[derive(Debug, Default, Clone, Copy)]
pub struct LeptessEngine;

impl LeptessEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RecognitionEngine for LeptessEngine {
    type Handle = TessHandle;

    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine via the native C API"
    }

    fn create_handle(&self) -> Result<TessHandle, OcrError> {
        // SAFETY: no preconditions; a null return is handled below.
        let raw = unsafe { capi::TessBaseAPICreate() };
        if raw.is_null() {
            return Err(OcrError::InitializationError(
                "TessBaseAPICreate returned null".to_string(),
            ));
        }
        Ok(TessHandle { raw })
    }
}

/// Layout blocks that carry text; images, rules and noise do not
fn is_text_block(block: capi::TessPolyBlockType) -> bool {
    matches!(
        block,
        capi::TessPolyBlockType_PT_FLOWING_TEXT
            | capi::TessPolyBlockType_PT_HEADING_TEXT
            | capi::TessPolyBlockType_PT_PULLOUT_TEXT
            | capi::TessPolyBlockType_PT_INLINE_EQUATION
            | capi::TessPolyBlockType_PT_TABLE
            | capi::TessPolyBlockType_PT_VERTICAL_TEXT
            | capi::TessPolyBlockType_PT_CAPTION_TEXT
    )
}

fn c_string(value: &str, what: &str) -> Result<CString, OcrError> {
    CString::new(value)
        .map_err(|_| OcrError::InvalidRequest(format!("{} contains a NUL byte", what)))
}

/// Copy a native string and release it with `TessDeleteText`
///
/// # Safety
/// `text` must be null or a string allocated by Tesseract that is not used afterwards.
unsafe fn take_text(text: *mut c_char) -> Option<String> {
    if text.is_null() {
        return None;
    }
    let owned = CStr::from_ptr(text).to_string_lossy().into_owned();
    capi::TessDeleteText(text);
    Some(owned)
}

/// Owned `TessBaseAPI`
pub struct TessHandle {
    raw: *mut capi::TessBaseAPI,
}

impl Drop for TessHandle {
    fn drop(&mut self) {
        // SAFETY: `raw` came from TessBaseAPICreate and is deleted only here.
        unsafe { capi::TessBaseAPIDelete(self.raw) };
    }
}

impl EngineHandle for TessHandle {
    type Renderer = TessRenderer;
    type Cursor<'a> = TessCursor<'a>;

    fn init(
        &mut self,
        datapath: Option<&str>,
        language: &str,
        mode: EngineMode,
        config_profiles: &[String],
    ) -> Result<(), OcrError> {
        let datapath = datapath.map(|d| c_string(d, "datapath")).transpose()?;
        let language = c_string(language, "language")?;
        let profiles = config_profiles
            .iter()
            .map(|p| c_string(p, "config profile"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut profile_ptrs: Vec<*mut c_char> =
            profiles.iter().map(|p| p.as_ptr() as *mut c_char).collect();
        let configs = if profile_ptrs.is_empty() {
            ptr::null_mut()
        } else {
            profile_ptrs.as_mut_ptr()
        };

        // SAFETY: all strings outlive the call; the engine copies what it keeps.
        let rc = unsafe {
            capi::TessBaseAPIInit1(
                self.raw,
                datapath.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
                language.as_ptr(),
                mode as u32 as capi::TessOcrEngineMode,
                configs,
                profile_ptrs.len() as c_int,
            )
        };
        if rc != 0 {
            return Err(OcrError::InitializationError(format!(
                "Tesseract initialization failed for language '{}' (code {})",
                language.to_string_lossy(),
                rc
            )));
        }
        Ok(())
    }

    fn set_page_seg_mode(&mut self, mode: PageSegMode) {
        // SAFETY: initialized handle
        unsafe {
            capi::TessBaseAPISetPageSegMode(self.raw, mode as u32 as capi::TessPageSegMode)
        };
    }

    fn set_variable(&mut self, key: &str, value: &str) -> bool {
        let (Ok(key), Ok(value)) = (CString::new(key), CString::new(value)) else {
            return false;
        };
        // SAFETY: both strings live across the call
        unsafe { capi::TessBaseAPISetVariable(self.raw, key.as_ptr(), value.as_ptr()) != 0 }
    }

    fn set_image(&mut self, frame: &Frame<'_>) {
        // SAFETY: `Frame` guarantees the buffer covers height * bytes_per_line;
        // the engine copies the pixels before returning.
        unsafe {
            capi::TessBaseAPISetImage(
                self.raw,
                frame.data().as_ptr(),
                frame.width() as c_int,
                frame.height() as c_int,
                frame.bytes_per_pixel() as c_int,
                frame.bytes_per_line() as c_int,
            )
        };
    }

    fn set_rectangle(&mut self, region: &Region) {
        // SAFETY: plain integers
        unsafe {
            capi::TessBaseAPISetRectangle(
                self.raw,
                region.x,
                region.y,
                region.width,
                region.height,
            )
        };
    }

    fn set_input_name(&mut self, name: &str) {
        if let Ok(name) = CString::new(name) {
            // SAFETY: the engine copies the name
            unsafe { capi::TessBaseAPISetInputName(self.raw, name.as_ptr()) };
        }
    }

    fn utf8_text(&mut self) -> Result<String, OcrError> {
        // SAFETY: the returned buffer is ours to release
        unsafe { take_text(capi::TessBaseAPIGetUTF8Text(self.raw)) }
            .ok_or_else(|| OcrError::ProcessingError("Failed to get text".to_string()))
    }

    fn hocr_text(&mut self, page_index: u32) -> Result<String, OcrError> {
        // SAFETY: the returned buffer is ours to release
        unsafe { take_text(capi::TessBaseAPIGetHOCRText(self.raw, page_index as c_int)) }
            .ok_or_else(|| OcrError::ProcessingError("Failed to get hOCR text".to_string()))
    }

    fn recognize(&mut self) -> Result<(), OcrError> {
        // SAFETY: a null monitor is allowed
        let rc = unsafe { capi::TessBaseAPIRecognize(self.raw, ptr::null_mut()) };
        if rc != 0 {
            return Err(OcrError::ProcessingError(format!(
                "Failed to recognize text (code {})",
                rc
            )));
        }
        Ok(())
    }

    fn result_cursor(&mut self) -> Result<TessCursor<'_>, OcrError> {
        // SAFETY: the iterator borrows the handle, which `TessCursor` ties to its lifetime
        let ri = unsafe { capi::TessBaseAPIGetIterator(self.raw) };
        if ri.is_null() {
            return Err(OcrError::ProcessingError(
                "No result iterator available".to_string(),
            ));
        }
        // SAFETY: the page iterator is a view into `ri` and is released with it
        let pi = unsafe { capi::TessResultIteratorGetPageIterator(ri) };
        Ok(TessCursor {
            ri,
            pi,
            _handle: PhantomData,
        })
    }

    fn layout_regions(&mut self, level: IteratorLevel) -> Result<Vec<Region>, OcrError> {
        // SAFETY: the returned iterator is owned by us
        let pi = unsafe { capi::TessBaseAPIAnalyseLayout(self.raw) };
        if pi.is_null() {
            return Ok(Vec::new());
        }

        let native_level = level as u32 as capi::TessPageIteratorLevel;
        let mut regions = Vec::new();
        // SAFETY: `pi` stays valid until TessPageIteratorDelete below
        unsafe {
            capi::TessPageIteratorBegin(pi);
            loop {
                let (mut left, mut top, mut right, mut bottom) = (0, 0, 0, 0);
                let is_text = is_text_block(capi::TessPageIteratorBlockType(pi));
                if is_text
                    && capi::TessPageIteratorBoundingBox(
                        pi,
                        native_level,
                        &mut left,
                        &mut top,
                        &mut right,
                        &mut bottom,
                    ) != 0
                {
                    regions.push(Region::from_edges(left, top, right, bottom));
                }
                if capi::TessPageIteratorNext(pi, native_level) == 0 {
                    break;
                }
            }
            capi::TessPageIteratorDelete(pi);
        }
        Ok(regions)
    }

    fn datapath(&self) -> Option<String> {
        // SAFETY: the engine owns the returned string; it is copied immediately
        unsafe {
            let path = capi::TessBaseAPIGetDatapath(self.raw);
            (!path.is_null()).then(|| CStr::from_ptr(path).to_string_lossy().into_owned())
        }
    }

    fn create_renderer(&mut self, spec: &SinkSpec<'_>) -> Result<TessRenderer, OcrError> {
        let base = c_string(spec.output_base, "output base")?;
        let datapath = c_string(spec.datapath.unwrap_or(""), "datapath")?;

        // SAFETY: constructors copy their string arguments
        let raw = unsafe {
            match spec.format {
                RenderFormat::Text => capi::TessTextRendererCreate(base.as_ptr()),
                RenderFormat::Hocr => capi::TessHOcrRendererCreate(base.as_ptr()),
                RenderFormat::Pdf => capi::TessPDFRendererCreate(
                    base.as_ptr(),
                    datapath.as_ptr(),
                    c_int::from(spec.text_only),
                ),
                RenderFormat::Box => capi::TessBoxTextRendererCreate(base.as_ptr()),
                RenderFormat::Unlv => capi::TessUnlvRendererCreate(base.as_ptr()),
            }
        };
        if raw.is_null() {
            return Err(OcrError::ProcessingError(format!(
                "Failed to create {} renderer",
                spec.format
            )));
        }
        Ok(TessRenderer { raw })
    }

    fn process_pages(&mut self, input: &Path, renderer: &mut TessRenderer) -> bool {
        let Ok(input) = CString::new(input.to_string_lossy().as_bytes()) else {
            return false;
        };
        // SAFETY: renderer and handle are both live; no retry config, no timeout
        unsafe {
            capi::TessBaseAPIProcessPages(self.raw, input.as_ptr(), ptr::null(), 0, renderer.raw)
                != 0
        }
    }
}

/// Owned `TessResultRenderer` (and, once linked, everything behind it)
pub struct TessRenderer {
    raw: *mut capi::TessResultRenderer,
}

impl Renderer for TessRenderer {
    fn insert(&mut self, next: Self) {
        // The chain head deletes linked renderers, so `next` must not delete itself
        let next = ManuallyDrop::new(next);
        // SAFETY: both renderers are live; ownership of `next` moves into the chain
        unsafe { capi::TessResultRendererInsert(self.raw, next.raw) };
    }
}

impl Drop for TessRenderer {
    fn drop(&mut self) {
        // SAFETY: deletes this renderer and every renderer inserted behind it
        unsafe { capi::TessDeleteResultRenderer(self.raw) };
    }
}

/// Result iterator borrowed from a handle
pub struct TessCursor<'a> {
    ri: *mut capi::TessResultIterator,
    pi: *mut capi::TessPageIterator,
    _handle: PhantomData<&'a mut TessHandle>,
}

impl ResultCursor for TessCursor<'_> {
    fn begin(&mut self) {
        // SAFETY: live iterator
        unsafe { capi::TessPageIteratorBegin(self.pi) };
    }

    fn text(&self, level: IteratorLevel) -> Option<String> {
        // SAFETY: the returned buffer is ours to release
        unsafe {
            take_text(capi::TessResultIteratorGetUTF8Text(
                self.ri,
                level as u32 as capi::TessPageIteratorLevel,
            ))
        }
    }

    fn confidence(&self, level: IteratorLevel) -> f32 {
        // SAFETY: live iterator
        unsafe {
            capi::TessResultIteratorConfidence(self.ri, level as u32 as capi::TessPageIteratorLevel)
        }
    }

    fn bounding_box(&self, level: IteratorLevel) -> Option<Edges> {
        let mut edges = Edges::default();
        // SAFETY: out-parameters point at live locals
        let found = unsafe {
            capi::TessPageIteratorBoundingBox(
                self.pi,
                level as u32 as capi::TessPageIteratorLevel,
                &mut edges.left,
                &mut edges.top,
                &mut edges.right,
                &mut edges.bottom,
            )
        };
        (found != 0).then_some(edges)
    }

    fn next(&mut self, level: IteratorLevel) -> bool {
        // SAFETY: live iterator
        unsafe { capi::TessPageIteratorNext(self.pi, level as u32 as capi::TessPageIteratorLevel) != 0 }
    }
}

impl Drop for TessCursor<'_> {
    fn drop(&mut self) {
        // SAFETY: the page iterator belongs to `ri` and goes with it
        unsafe { capi::TessResultIteratorDelete(self.ri) };
    }
}
