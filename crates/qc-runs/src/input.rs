//! Input resolution: inline payloads, scoped uploads and integrations

use crate::collaborators::{CollaboratorError, ConnectorRegistry, InputLoader, SecretAccessor};
use crate::error::RunError;
use crate::run::{InputSource, Run};
use qc_core::{fingerprint_bytes, fingerprint_input, InputFingerprint, NormalizedInput};
use tracing::debug;

/// Normalized input plus the fingerprint recorded on the result
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedInput {
    pub input: NormalizedInput,
    pub fingerprint: InputFingerprint,
}

/// Upload prefix a run may read from
pub fn upload_scope(tenant_id: &str, run_id: &str) -> String {
    format!("tenants/{}/runs/{}/", tenant_id, run_id)
}

/// Accept only relative paths strictly inside the run's upload scope
pub fn validate_storage_path(tenant_id: &str, run_id: &str, path: &str) -> Result<(), RunError> {
    let reject = || RunError::InvalidStoragePath(path.to_string());

    let ids_are_plain = [tenant_id, run_id]
        .iter()
        .all(|id| !id.is_empty() && !id.contains(['/', '\\']) && *id != "." && *id != "..");
    if !ids_are_plain || path.starts_with('/') || path.contains('\\') {
        return Err(reject());
    }

    let rest = path
        .strip_prefix(upload_scope(tenant_id, run_id).as_str())
        .ok_or_else(reject)?;
    if rest.is_empty() || rest.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(reject());
    }
    Ok(())
}

pub(crate) async fn load_input(
    run: &Run,
    loader: &dyn InputLoader,
    secrets: &dyn SecretAccessor,
    connectors: &ConnectorRegistry,
) -> Result<LoadedInput, RunError> {
    match &run.input_source {
        InputSource::Inline { input } => Ok(LoadedInput {
            fingerprint: fingerprint_input(input)?,
            input: input.clone(),
        }),
        InputSource::Upload { storage_path } => {
            validate_storage_path(&run.tenant_id, &run.run_id, storage_path)?;

            let bytes = loader
                .raw_bytes(storage_path)
                .await
                .map_err(RunError::InputLoad)?;
            let fingerprint = fingerprint_bytes(&bytes);
            if let Some(declared) = &run.input_fingerprint {
                if !declared.matches(&fingerprint) {
                    return Err(RunError::FingerprintMismatch);
                }
            }
            debug!(run_id = %run.run_id, bytes = bytes.len(), "upload fingerprint verified");

            let input = loader
                .load(&run.input_source)
                .await
                .map_err(RunError::InputLoad)?;
            Ok(LoadedInput { input, fingerprint })
        }
        InputSource::Integration {
            integration_type,
            config,
            secret_ref,
            query,
        } => {
            let connector = connectors
                .get(integration_type)
                .ok_or_else(|| RunError::ConnectorNotConfigured(integration_type.clone()))?;
            let credentials = secrets.get(secret_ref).await.map_err(RunError::Secret)?;
            let input = connector
                .fetch(config, &credentials, query.as_ref())
                .await
                .map_err(RunError::Connector)?;
            if matches!(input, NormalizedInput::Audio { .. }) {
                return Err(RunError::Connector(CollaboratorError::InvalidInput(format!(
                    "connector {} returned audio, expected text, record or table",
                    integration_type
                ))));
            }
            Ok(LoadedInput {
                fingerprint: fingerprint_input(&input)?,
                input,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_paths() {
        let ok = "tenants/acme/runs/r1/chat.txt";
        assert!(validate_storage_path("acme", "r1", ok).is_ok());
        assert!(validate_storage_path("acme", "r1", "tenants/acme/runs/r1/in/batch.json").is_ok());

        for bad in [
            "tenants/acme/runs/r2/chat.txt",
            "tenants/other/runs/r1/chat.txt",
            "/tenants/acme/runs/r1/chat.txt",
            "tenants/acme/runs/r1/../r2/chat.txt",
            "tenants/acme/runs/r1/",
            "tenants\\acme\\runs\\r1\\chat.txt",
            "tenants/acme/runs/r1//chat.txt",
            "tenants/acme/runs/r10/chat.txt",
        ] {
            assert!(
                matches!(
                    validate_storage_path("acme", "r1", bad),
                    Err(RunError::InvalidStoragePath(_))
                ),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_ids_with_separators_rejected() {
        assert!(validate_storage_path("acme/runs/x", "r1", "tenants/acme/runs/x/runs/r1/a").is_err());
        assert!(validate_storage_path("..", "r1", "tenants/../runs/r1/a").is_err());
    }
}
