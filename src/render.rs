//! Output-format renderer chains
//!
//! One chain carries every requested sink so a single engine pass over a
//! document writes all formats side by side, each as `{output_base}.{ext}`.

use crate::engine::{EngineHandle, Renderer, SinkSpec};
use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Output sink kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Text,
    Hocr,
    Pdf,
    Box,
    Unlv,
}

impl RenderFormat {
    /// File extension the engine appends to the output base
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Hocr => "hocr",
            Self::Pdf => "pdf",
            Self::Box => "box",
            Self::Unlv => "unlv",
        }
    }

    pub fn output_path(&self, output_base: &Path) -> PathBuf {
        let mut name = output_base.as_os_str().to_owned();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for RenderFormat {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "hocr" => Ok(Self::Hocr),
            "pdf" => Ok(Self::Pdf),
            "box" => Ok(Self::Box),
            "unlv" => Ok(Self::Unlv),
            other => Err(OcrError::InvalidRequest(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

/// Linked renderers sharing one output base. Dropping it releases every sink.
pub struct RendererChain<R: Renderer> {
    head: R,
    formats: Vec<RenderFormat>,
    output_base: PathBuf,
}

impl<R: Renderer> RendererChain<R> {
    /// Create one sink per format and link them in request order.
    ///
    /// The first format becomes the head; the rest are inserted behind it.
    pub fn build<H>(
        handle: &mut H,
        output_base: &Path,
        formats: &[RenderFormat],
        text_only_pdf: bool,
    ) -> Result<Self, OcrError>
    where
        H: EngineHandle<Renderer = R>,
    {
        let (first, rest) = formats.split_first().ok_or_else(|| {
            OcrError::InvalidRequest("at least one output format is required".to_string())
        })?;

        let base = output_base.to_string_lossy();
        let datapath = if formats.contains(&RenderFormat::Pdf) {
            handle.datapath()
        } else {
            None
        };

        let mut create = |format: RenderFormat| {
            handle.create_renderer(&SinkSpec {
                format,
                output_base: &base,
                datapath: datapath.as_deref(),
                text_only: text_only_pdf,
            })
        };

        let mut head = create(*first)?;
        for format in rest {
            let next = create(*format)?;
            head.insert(next);
        }

        tracing::debug!(
            "Built renderer chain for {} with {} sink(s)",
            base,
            formats.len()
        );

        Ok(Self {
            head,
            formats: formats.to_vec(),
            output_base: output_base.to_path_buf(),
        })
    }

    pub fn head(&mut self) -> &mut R {
        &mut self.head
    }

    /// Formats in chain order
    pub fn formats(&self) -> &[RenderFormat] {
        &self.formats
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Files the chain writes once the engine pass completes
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.formats
            .iter()
            .map(|f| f.output_path(&self.output_base))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_appends_extension() {
        let base = Path::new("/tmp/out/scan.v2");
        assert_eq!(
            RenderFormat::Pdf.output_path(base),
            PathBuf::from("/tmp/out/scan.v2.pdf")
        );
        assert_eq!(
            RenderFormat::Text.output_path(Path::new("page")),
            PathBuf::from("page.txt")
        );
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("TXT".parse::<RenderFormat>().unwrap(), RenderFormat::Text);
        assert_eq!("unlv".parse::<RenderFormat>().unwrap(), RenderFormat::Unlv);
        assert!("docx".parse::<RenderFormat>().is_err());
    }
}
