//! Session configuration
//!
//! A `SessionConfig` is fixed before a session starts and applied once per
//! session, right after the engine handle is created.

use crate::cli::EngineArgs;
use crate::error::OcrError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Engine variable that makes the portable-document sink skip page images
pub const TEXTONLY_PDF: &str = "textonly_pdf";

/// Recognition engine mode passed at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    TesseractOnly = 0,
    LstmOnly = 1,
    TesseractLstmCombined = 2,
    #[default]
    Default = 3,
}

impl FromStr for EngineMode {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "legacy" | "tesseract" => Ok(Self::TesseractOnly),
            "1" | "lstm" => Ok(Self::LstmOnly),
            "2" | "combined" => Ok(Self::TesseractLstmCombined),
            "3" | "default" => Ok(Self::Default),
            other => Err(OcrError::InvalidRequest(format!(
                "unknown engine mode '{}'",
                other
            ))),
        }
    }
}

/// Page segmentation mode applied right after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    OsdOnly = 0,
    AutoOsd = 1,
    AutoOnly = 2,
    Auto = 3,
    SingleColumn = 4,
    SingleBlockVertText = 5,
    SingleBlock = 6,
    SingleLine = 7,
    SingleWord = 8,
    CircleWord = 9,
    SingleChar = 10,
    SparseText = 11,
    SparseTextOsd = 12,
    RawLine = 13,
}

impl PageSegMode {
    const ALL: [PageSegMode; 14] = [
        Self::OsdOnly,
        Self::AutoOsd,
        Self::AutoOnly,
        Self::Auto,
        Self::SingleColumn,
        Self::SingleBlockVertText,
        Self::SingleBlock,
        Self::SingleLine,
        Self::SingleWord,
        Self::CircleWord,
        Self::SingleChar,
        Self::SparseText,
        Self::SparseTextOsd,
        Self::RawLine,
    ];

    /// Map a numeric mode; negative values mean "leave the engine default".
    pub fn from_number(value: i32) -> Result<Option<Self>, OcrError> {
        if value < 0 {
            return Ok(None);
        }
        Self::ALL
            .get(value as usize)
            .copied()
            .map(Some)
            .ok_or_else(|| {
                OcrError::InvalidRequest(format!("page segmentation mode {} out of range", value))
            })
    }
}

impl fmt::Display for PageSegMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u32)
    }
}

/// Shape of the text returned by single-shot entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    Text,
    /// Positional markup, wrapped once in a document prologue/epilogue
    Hocr,
}

impl FromStr for OutputMode {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "hocr" => Ok(Self::Hocr),
            other => Err(OcrError::InvalidRequest(format!(
                "unknown output mode '{}'",
                other
            ))),
        }
    }
}

/// What to do when the engine rejects a variable name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariablePolicy {
    /// Keep going without a trace
    #[default]
    Ignore,
    /// Keep going, log each rejected key
    Warn,
    /// Fail session setup on the first rejected key
    Strict,
}

impl FromStr for VariablePolicy {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            other => Err(OcrError::InvalidRequest(format!(
                "unknown variable policy '{}'",
                other
            ))),
        }
    }
}

/// Everything a session needs before its handle is created
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    pub language: String,
    /// Training data directory; `None` lets the engine use its own default
    pub datapath: Option<PathBuf>,
    pub page_seg_mode: Option<PageSegMode>,
    pub engine_mode: EngineMode,
    pub variables: BTreeMap<String, String>,
    pub config_profiles: Vec<String>,
    pub output_mode: OutputMode,
    pub variable_policy: VariablePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl SessionConfig {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            datapath: None,
            page_seg_mode: None,
            engine_mode: EngineMode::Default,
            variables: BTreeMap::new(),
            config_profiles: Vec::new(),
            output_mode: OutputMode::Text,
            variable_policy: VariablePolicy::Ignore,
        }
    }

    pub fn with_datapath(mut self, datapath: impl Into<PathBuf>) -> Self {
        self.datapath = Some(datapath.into());
        self
    }

    pub fn with_page_seg_mode(mut self, mode: PageSegMode) -> Self {
        self.page_seg_mode = Some(mode);
        self
    }

    pub fn with_engine_mode(mut self, mode: EngineMode) -> Self {
        self.engine_mode = mode;
        self
    }

    /// Set an engine variable; a later value for the same key replaces the earlier one.
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn with_config_profile(mut self, name: impl Into<String>) -> Self {
        self.config_profiles.push(name.into());
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_variable_policy(mut self, policy: VariablePolicy) -> Self {
        self.variable_policy = policy;
        self
    }

    /// Whether the portable-document sink should leave out page images
    pub fn text_only_pdf(&self) -> bool {
        self.variables.get(TEXTONLY_PDF).map(String::as_str) == Some("1")
    }

    /// Datapath as handed to the engine
    pub fn datapath_str(&self) -> Option<String> {
        self.datapath
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }
}

/// Parse a `key=value` pair from the command line
pub fn parse_variable(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

impl TryFrom<&EngineArgs> for SessionConfig {
    type Error = OcrError;

    fn try_from(args: &EngineArgs) -> Result<Self, Self::Error> {
        let mut config = SessionConfig::new(args.language.clone())
            .with_engine_mode(args.oem.parse()?)
            .with_output_mode(args.format.parse()?)
            .with_variable_policy(args.variable_policy.parse()?);
        config.page_seg_mode = PageSegMode::from_number(args.psm)?;
        config.datapath = args.tessdata_path.clone();
        for (key, value) in &args.variables {
            config = config.with_variable(key.clone(), value.clone());
        }
        config.config_profiles = args.configs.clone();
        Ok(config)
    }
}
