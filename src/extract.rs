//! Text retrieval after a frame has been submitted

use crate::config::OutputMode;
use crate::engine::EngineHandle;
use crate::error::OcrError;
use std::sync::Mutex;

/// Prologue written once before concatenated page markup
pub const HOCR_BEGIN: &str = "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\"\n    \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\n<head>\n<title></title>\n<meta http-equiv=\"Content-Type\" content=\"text/html;charset=utf-8\" />\n<meta name='ocr-system' content='tesseract' />\n</head>\n<body>\n";

/// Epilogue written once after concatenated page markup
pub const HOCR_END: &str = "</body>\n</html>\n";

// Text retrieval shares engine-global state; one caller at a time per process.
static TEXT_LOCK: Mutex<()> = Mutex::new(());

/// Read the recognized text for the current page.
///
/// `page_number` is one based and only used for markup paging.
pub fn extract_text<H: EngineHandle>(
    handle: &mut H,
    mode: OutputMode,
    input_name: Option<&str>,
    page_number: u32,
) -> Result<String, OcrError> {
    let _guard = TEXT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(name) = input_name.filter(|n| !n.is_empty()) {
        handle.set_input_name(name);
    }

    match mode {
        OutputMode::Text => handle.utf8_text(),
        OutputMode::Hocr => handle.hocr_text(page_number.saturating_sub(1)),
    }
}

/// Wrap concatenated page markup in the document prologue/epilogue
pub fn wrap_hocr(body: &str) -> String {
    let mut doc = String::with_capacity(HOCR_BEGIN.len() + body.len() + HOCR_END.len());
    doc.push_str(HOCR_BEGIN);
    doc.push_str(body);
    doc.push_str(HOCR_END);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_hocr_once() {
        let doc = wrap_hocr("<div class='ocr_page'>1</div><div class='ocr_page'>2</div>");
        assert!(doc.starts_with(HOCR_BEGIN));
        assert!(doc.ends_with(HOCR_END));
        assert_eq!(doc.matches("<body>").count(), 1);
        assert_eq!(doc.matches("</html>").count(), 1);
    }
}
