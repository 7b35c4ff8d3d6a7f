use crate::config::VariablePolicy;
use crate::engine::EngineHandle;
use crate::error::OcrError;
use std::collections::BTreeMap;

/// Push every configured variable into a live handle.
///
/// A key the engine rejects does not stop the remaining keys unless the
/// policy is `Strict`. Returns the rejected keys.
pub fn propagate<H: EngineHandle>(
    handle: &mut H,
    variables: &BTreeMap<String, String>,
    policy: VariablePolicy,
) -> Result<Vec<String>, OcrError> {
    let mut rejected = Vec::new();

    for (key, value) in variables {
        if handle.set_variable(key, value) {
            tracing::trace!("Set engine variable {}={}", key, value);
            continue;
        }

        match policy {
            VariablePolicy::Ignore => {}
            VariablePolicy::Warn => tracing::warn!("Engine rejected variable '{}'", key),
            VariablePolicy::Strict => {
                return Err(OcrError::VariableRejected { key: key.clone() });
            }
        }
        rejected.push(key.clone());
    }

    Ok(rejected)
}
