//! Batch document export
//!
//! Runs many (input, output base) jobs through one session. A failing job is
//! recorded in the report and the loop moves on.

use crate::engine::EngineHandle;
use crate::error::OcrError;
use crate::rasterize::{self, DocumentRasterizer};
use crate::render::{RenderFormat, RendererChain};
use crate::session::OcrSession;
use std::path::{Path, PathBuf};

/// One input document and the base name its outputs are written under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentJob {
    pub input: PathBuf,
    pub output_base: PathBuf,
}

impl DocumentJob {
    pub fn new(input: impl Into<PathBuf>, output_base: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_base: output_base.into(),
        }
    }
}

/// Pair up parallel input and output arrays
pub fn jobs_from<P, Q>(inputs: &[P], output_bases: &[Q]) -> Result<Vec<DocumentJob>, OcrError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    if inputs.len() != output_bases.len() {
        return Err(OcrError::InvalidRequest(format!(
            "input and output arrays must match in length ({} vs {})",
            inputs.len(),
            output_bases.len()
        )));
    }

    Ok(inputs
        .iter()
        .zip(output_bases)
        .map(|(input, base)| DocumentJob::new(input.as_ref(), base.as_ref()))
        .collect())
}

#[derive(Debug)]
pub struct JobOutcome {
    pub job: DocumentJob,
    /// Files written, in format order
    pub result: Result<Vec<PathBuf>, OcrError>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Drive every job through the session's handle
pub fn process_batch<H: EngineHandle>(
    session: &mut OcrSession<'_, H>,
    jobs: &[DocumentJob],
    formats: &[RenderFormat],
    rasterizer: &dyn DocumentRasterizer,
) -> BatchReport {
    let text_only = session.config().text_only_pdf();
    let mut report = BatchReport::default();

    for (i, job) in jobs.iter().enumerate() {
        tracing::info!(
            "Processing document {} of {}: {}",
            i + 1,
            jobs.len(),
            job.input.display()
        );

        let result = process_job(session.handle(), job, formats, text_only, rasterizer);
        if let Err(e) = &result {
            tracing::error!("Skipping {}: {}", job.input.display(), e);
        }

        report.outcomes.push(JobOutcome {
            job: job.clone(),
            result,
        });
    }

    tracing::info!(
        "Batch finished: {} succeeded, {} failed",
        jobs.len() - report.failure_count(),
        report.failure_count()
    );
    report
}

fn process_job<H: EngineHandle>(
    handle: &mut H,
    job: &DocumentJob,
    formats: &[RenderFormat],
    text_only: bool,
    rasterizer: &dyn DocumentRasterizer,
) -> Result<Vec<PathBuf>, OcrError> {
    // Lives until the end of the job so the temporary pages outlast the engine pass
    let rasterized = if rasterize::is_pdf(&job.input)? {
        Some(rasterizer.rasterize(&job.input)?)
    } else {
        None
    };
    let input = rasterized
        .as_ref()
        .map(|doc| doc.list_path())
        .unwrap_or(job.input.as_path());

    let mut chain = RendererChain::build(handle, &job.output_base, formats, text_only)?;

    handle.set_input_name(&input.to_string_lossy());
    if !handle.process_pages(input, chain.head()) {
        return Err(OcrError::ProcessingError(format!(
            "Error during processing of {}",
            job.input.display()
        )));
    }

    Ok(chain.output_paths())
}
