//! Command-line interface

use crate::batch;
use crate::config::{parse_variable, SessionConfig};
use crate::engine::{IteratorLevel, RecognitionEngine};
use crate::frame::Region;
use crate::recognizer::Recognizer;
use crate::render::RenderFormat;
use crate::server;
use crate::tessdata;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ocr-session")]
#[command(about = "OCR sessions, word extraction and document export")]
#[command(version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    #[command(flatten)]
    pub engine: EngineArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Session settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Language(s) for OCR (e.g., "eng", "eng+deu")
    #[arg(long, short = 'l', env = "OCR_LANGUAGE", default_value = "eng", global = true)]
    pub language: String,

    /// Path to tessdata directory
    #[arg(long, env = "TESSDATA_PREFIX", global = true)]
    pub tessdata_path: Option<PathBuf>,

    /// Download missing traineddata before starting
    #[arg(long, global = true)]
    pub download_tessdata: bool,

    /// Page segmentation mode (0-13, negative keeps the engine default)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true, global = true)]
    pub psm: i32,

    /// Engine mode (legacy, lstm, combined, default)
    #[arg(long, default_value = "default", global = true)]
    pub oem: String,

    /// Engine variable as KEY=VALUE; repeatable, later values win
    #[arg(long = "var", short = 'c', value_parser = parse_variable, global = true)]
    pub variables: Vec<(String, String)>,

    /// Named config profile; repeatable, applied in order
    #[arg(long = "config", global = true)]
    pub configs: Vec<String>,

    /// Text output mode (text, hocr)
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// What to do with variables the engine rejects (ignore, warn, strict)
    #[arg(long, default_value = "ignore", global = true)]
    pub variable_policy: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the recognized text of an image or PDF
    Text {
        input: PathBuf,

        /// Region of interest as X,Y,WIDTH,HEIGHT
        #[arg(long, value_parser = parse_region)]
        rect: Option<Region>,
    },
    /// Print recognized words with confidence and bounding boxes as JSON
    Words {
        input: PathBuf,

        /// Iterator level (block, para, line, word, symbol)
        #[arg(long, default_value = "word")]
        level: String,
    },
    /// Print layout regions as JSON
    Segments {
        input: PathBuf,

        #[arg(long, default_value = "block")]
        level: String,
    },
    /// Export documents through renderer chains
    Documents {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output base per input (no extension), in the same order
        #[arg(long = "output", short = 'o', required = true)]
        outputs: Vec<PathBuf>,

        /// Output formats (text, hocr, pdf, box, unlv)
        #[arg(long = "to", value_delimiter = ',', default_value = "text")]
        formats: Vec<String>,
    },
    /// Run the HTTP server
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "OCR_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCR_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum file size in bytes (default: 50MB)
    #[arg(long, env = "OCR_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,
}

fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<i32> = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid region '{}': {}", s, e))?;
    match parts.as_slice() {
        [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
        _ => Err(format!("expected X,Y,WIDTH,HEIGHT, got '{}'", s)),
    }
}

/// Execute a parsed command line against `engine`
pub async fn run<E>(cli: Cli, engine: E) -> anyhow::Result<()>
where
    E: RecognitionEngine + 'static,
{
    let mut config = SessionConfig::try_from(&cli.engine)?;

    if cli.engine.download_tessdata {
        let dir = config.datapath.clone().unwrap_or_else(tessdata::cache_dir);
        tessdata::ensure_available(&dir, &config.language)?;
        config.datapath = Some(dir);
    }

    let recognizer = Recognizer::new(engine, config);
    tracing::info!("Using {} engine", recognizer.info().name);

    match cli.command {
        Command::Serve(args) => server::run(recognizer, args).await,
        command => tokio::task::spawn_blocking(move || run_blocking(&recognizer, command))
            .await
            .context("OCR worker panicked")?,
    }
}

fn run_blocking<E: RecognitionEngine>(
    recognizer: &Recognizer<E>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Text { input, rect } => {
            let output = recognizer.ocr_file(&input, rect)?;
            for warning in output.warnings() {
                tracing::warn!("{}", warning);
            }
            print!("{}", output.text);
        }
        Command::Words { input, level } => {
            let level: IteratorLevel = level.parse()?;
            let img = image::open(&input)
                .with_context(|| format!("Failed to load image {}", input.display()))?;
            let words = recognizer.words(&img, level)?;
            println!("{}", serde_json::to_string_pretty(&words)?);
        }
        Command::Segments { input, level } => {
            let level: IteratorLevel = level.parse()?;
            let img = image::open(&input)
                .with_context(|| format!("Failed to load image {}", input.display()))?;
            let regions = recognizer.segmented_regions(&img, level)?;
            println!("{}", serde_json::to_string_pretty(&regions)?);
        }
        Command::Documents {
            inputs,
            outputs,
            formats,
        } => {
            let formats = formats
                .iter()
                .map(|f| f.parse::<RenderFormat>())
                .collect::<Result<Vec<_>, _>>()?;
            let jobs = batch::jobs_from(&inputs, &outputs)?;
            let report = recognizer.create_documents(&jobs, &formats)?;

            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(files) => {
                        for file in files {
                            println!("{}", file.display());
                        }
                    }
                    Err(e) => eprintln!("{}: {}", outcome.job.input.display(), e),
                }
            }
            if !report.is_success() {
                anyhow::bail!(
                    "{} of {} document(s) failed",
                    report.failure_count(),
                    report.outcomes.len()
                );
            }
        }
        Command::Serve(_) => unreachable!("serve runs on the async runtime"),
    }

    Ok(())
}
