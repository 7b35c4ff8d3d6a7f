//! Engine session lifecycle
//!
//! A session owns exactly one engine handle. Opening it creates the handle,
//! initializes it and applies the configuration; dropping it deletes the
//! handle, on success and error paths alike.

use crate::config::SessionConfig;
use crate::engine::{EngineHandle, RecognitionEngine};
use crate::error::OcrError;
use crate::variables;

pub struct OcrSession<'c, H: EngineHandle> {
    handle: H,
    config: &'c SessionConfig,
    rejected_variables: Vec<String>,
}

impl<'c, H: EngineHandle> OcrSession<'c, H> {
    /// Create, initialize and configure a fresh handle
    pub fn open<E>(engine: &E, config: &'c SessionConfig) -> Result<Self, OcrError>
    where
        E: RecognitionEngine<Handle = H>,
    {
        let mut handle = engine.create_handle()?;
        let datapath = config.datapath_str();

        handle.init(
            datapath.as_deref(),
            &config.language,
            config.engine_mode,
            &config.config_profiles,
        )?;

        if let Some(mode) = config.page_seg_mode {
            handle.set_page_seg_mode(mode);
        }

        let rejected_variables =
            variables::propagate(&mut handle, &config.variables, config.variable_policy)?;

        tracing::debug!(
            "Opened {} session (language: {}, {} variables, {} config profiles)",
            engine.name(),
            config.language,
            config.variables.len(),
            config.config_profiles.len()
        );

        Ok(Self {
            handle,
            config,
            rejected_variables,
        })
    }

    pub fn handle(&mut self) -> &mut H {
        &mut self.handle
    }

    pub fn config(&self) -> &SessionConfig {
        self.config
    }

    /// Variables the engine refused during setup
    pub fn rejected_variables(&self) -> &[String] {
        &self.rejected_variables
    }

    /// Release the handle now rather than at end of scope
    pub fn dispose(self) {
        drop(self);
    }
}

impl<H: EngineHandle> Drop for OcrSession<'_, H> {
    fn drop(&mut self) {
        tracing::debug!("Disposing engine session");
    }
}
