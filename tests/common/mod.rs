//! Scripted in-process engine that records every native call.
//!
//! Frames are read as text: an 8 bpp frame's bytes are the characters it
//! "contains", one line per row. Inputs handed to the page processor are
//! read from disk; a file starting with `BAD` makes processing fail.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage};
use ocr_session::engine::{Edges, SinkSpec};
use ocr_session::{
    EngineHandle, EngineMode, Frame, IteratorLevel, OcrError, PageSegMode, RecognitionEngine,
    Region, RenderFormat, Renderer, ResultCursor,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    Init {
        datapath: Option<String>,
        language: String,
        mode: EngineMode,
        profiles: Vec<String>,
    },
    PageSegMode(PageSegMode),
    Variable(String, String),
    SetImage {
        width: u32,
        height: u32,
        bits_per_pixel: u32,
    },
    SetRectangle(Region),
    InputName(String),
    Text,
    Hocr(u32),
    Recognize,
    CreateRenderer {
        format: RenderFormat,
        output_base: String,
        datapath: Option<String>,
        text_only: bool,
    },
    Insert,
    ProcessPages(PathBuf),
    Delete,
}

#[derive(Clone, Default)]
pub struct ScriptedEngine {
    log: Arc<Mutex<Vec<Call>>>,
    /// Variable names the engine does not know
    pub unknown_variables: Vec<String>,
    /// Languages that fail initialization
    pub missing_languages: Vec<String>,
    pub fail_recognize: bool,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|c| *c == Call::Create)
    }

    pub fn deleted(&self) -> usize {
        self.count(|c| *c == Call::Delete)
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

impl RecognitionEngine for ScriptedEngine {
    type Handle = ScriptedHandle;

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn description(&self) -> &'static str {
        "In-process engine for tests"
    }

    fn create_handle(&self) -> Result<ScriptedHandle, OcrError> {
        self.record(Call::Create);
        Ok(ScriptedHandle {
            engine: self.clone(),
            datapath: None,
            image: None,
            rect: None,
            recognized: false,
        })
    }
}

pub struct ScriptedHandle {
    engine: ScriptedEngine,
    datapath: Option<String>,
    image: Option<(Vec<u8>, u32, u32)>,
    rect: Option<Region>,
    recognized: bool,
}

impl ScriptedHandle {
    /// Text lines inside the current rectangle
    fn visible_lines(&self) -> Vec<String> {
        let Some((data, width, height)) = &self.image else {
            return Vec::new();
        };
        let (width, height) = (*width as i32, *height as i32);
        let rect = self.rect.unwrap_or(Region::new(0, 0, width, height));

        (rect.y..(rect.y + rect.height).min(height))
            .map(|row| {
                let start = (row * width + rect.x) as usize;
                let end = (row * width + (rect.x + rect.width).min(width)) as usize;
                String::from_utf8_lossy(&data[start..end]).into_owned()
            })
            .collect()
    }

    fn words(&self) -> Vec<(String, Edges)> {
        let mut words = Vec::new();
        for (row, line) in self.visible_lines().iter().enumerate() {
            let mut offset = 0;
            for token in line.split(' ') {
                if !token.is_empty() {
                    words.push((
                        token.to_string(),
                        Edges {
                            left: offset as i32 * 10,
                            top: row as i32 * 20,
                            right: (offset + token.len()) as i32 * 10,
                            bottom: row as i32 * 20 + 16,
                        },
                    ));
                }
                offset += token.len() + 1;
            }
        }
        words
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.engine.record(Call::Delete);
    }
}

impl EngineHandle for ScriptedHandle {
    type Renderer = ScriptedRenderer;
    type Cursor<'a> = ScriptedCursor;

    fn init(
        &mut self,
        datapath: Option<&str>,
        language: &str,
        mode: EngineMode,
        config_profiles: &[String],
    ) -> Result<(), OcrError> {
        self.engine.record(Call::Init {
            datapath: datapath.map(str::to_string),
            language: language.to_string(),
            mode,
            profiles: config_profiles.to_vec(),
        });
        if self.engine.missing_languages.iter().any(|l| l == language) {
            return Err(OcrError::InitializationError(format!(
                "no traineddata for {}",
                language
            )));
        }
        self.datapath = Some(datapath.unwrap_or("/usr/share/tessdata").to_string());
        Ok(())
    }

    fn set_page_seg_mode(&mut self, mode: PageSegMode) {
        self.engine.record(Call::PageSegMode(mode));
    }

    fn set_variable(&mut self, key: &str, value: &str) -> bool {
        self.engine
            .record(Call::Variable(key.to_string(), value.to_string()));
        !self.engine.unknown_variables.iter().any(|k| k == key)
    }

    fn set_image(&mut self, frame: &Frame<'_>) {
        self.engine.record(Call::SetImage {
            width: frame.width(),
            height: frame.height(),
            bits_per_pixel: frame.bits_per_pixel(),
        });
        self.image = Some((frame.data().to_vec(), frame.width(), frame.height()));
        self.rect = None;
        self.recognized = false;
    }

    fn set_rectangle(&mut self, region: &Region) {
        self.engine.record(Call::SetRectangle(*region));
        self.rect = Some(*region);
    }

    fn set_input_name(&mut self, name: &str) {
        self.engine.record(Call::InputName(name.to_string()));
    }

    fn utf8_text(&mut self) -> Result<String, OcrError> {
        self.engine.record(Call::Text);
        Ok(self
            .visible_lines()
            .iter()
            .map(|l| format!("{}\n", l))
            .collect())
    }

    fn hocr_text(&mut self, page_index: u32) -> Result<String, OcrError> {
        self.engine.record(Call::Hocr(page_index));
        Ok(format!(
            "<div class='ocr_page' id='page_{}'>{}</div>\n",
            page_index + 1,
            self.visible_lines().join(" ")
        ))
    }

    fn recognize(&mut self) -> Result<(), OcrError> {
        self.engine.record(Call::Recognize);
        if self.engine.fail_recognize || self.image.is_none() {
            return Err(OcrError::ProcessingError("recognition failed".to_string()));
        }
        self.recognized = true;
        Ok(())
    }

    fn result_cursor(&mut self) -> Result<ScriptedCursor, OcrError> {
        if !self.recognized {
            return Err(OcrError::ProcessingError("not recognized".to_string()));
        }
        Ok(ScriptedCursor {
            words: self.words(),
            pos: 0,
        })
    }

    fn layout_regions(&mut self, _level: IteratorLevel) -> Result<Vec<Region>, OcrError> {
        Ok(self.words().into_iter().map(|(_, e)| Region::from(e)).collect())
    }

    fn datapath(&self) -> Option<String> {
        self.datapath.clone()
    }

    fn create_renderer(&mut self, spec: &SinkSpec<'_>) -> Result<ScriptedRenderer, OcrError> {
        self.engine.record(Call::CreateRenderer {
            format: spec.format,
            output_base: spec.output_base.to_string(),
            datapath: spec.datapath.map(str::to_string),
            text_only: spec.text_only,
        });
        Ok(ScriptedRenderer {
            sinks: vec![(spec.format, spec.output_base.to_string())],
            engine: self.engine.clone(),
        })
    }

    fn process_pages(&mut self, input: &Path, renderer: &mut ScriptedRenderer) -> bool {
        self.engine.record(Call::ProcessPages(input.to_path_buf()));
        let Ok(content) = std::fs::read(input) else {
            return false;
        };
        if content.starts_with(b"BAD") {
            return false;
        }
        for (format, base) in &renderer.sinks {
            let path = format.output_path(Path::new(base));
            if std::fs::write(path, &content).is_err() {
                return false;
            }
        }
        true
    }
}

pub struct ScriptedRenderer {
    pub sinks: Vec<(RenderFormat, String)>,
    engine: ScriptedEngine,
}

impl Renderer for ScriptedRenderer {
    fn insert(&mut self, mut next: Self) {
        self.engine.record(Call::Insert);
        self.sinks.append(&mut next.sinks);
    }
}

pub struct ScriptedCursor {
    words: Vec<(String, Edges)>,
    pos: usize,
}

impl ResultCursor for ScriptedCursor {
    fn begin(&mut self) {
        self.pos = 0;
    }

    fn text(&self, _level: IteratorLevel) -> Option<String> {
        self.words.get(self.pos).map(|(t, _)| t.clone())
    }

    fn confidence(&self, _level: IteratorLevel) -> f32 {
        90.0 - self.pos as f32
    }

    fn bounding_box(&self, _level: IteratorLevel) -> Option<Edges> {
        self.words.get(self.pos).map(|(_, e)| *e)
    }

    fn next(&mut self, _level: IteratorLevel) -> bool {
        self.pos += 1;
        self.pos < self.words.len()
    }
}

/// An 8 bpp image whose single row spells `text`
pub fn text_image(text: &str) -> DynamicImage {
    let img = GrayImage::from_raw(text.len() as u32, 1, text.as_bytes().to_vec())
        .expect("buffer matches geometry");
    DynamicImage::ImageLuma8(img)
}

/// An 8 bpp image with one row per line; lines are padded to equal width
pub fn text_block(lines: &[&str]) -> DynamicImage {
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0);
    let mut data = Vec::with_capacity(width * lines.len());
    for line in lines {
        data.extend_from_slice(line.as_bytes());
        data.extend(std::iter::repeat(b' ').take(width - line.len()));
    }
    DynamicImage::ImageLuma8(
        GrayImage::from_raw(width as u32, lines.len() as u32, data)
            .expect("buffer matches geometry"),
    )
}
