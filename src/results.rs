//! Extraction of structured results from a completed TaskRun.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::SettleError;
use crate::models::{Identity, TaskRun};

/// Image digest reported by the image output resource.
pub const DIGEST_KEY: &str = "digest";

/// Commit reported by the git input resource.
pub const COMMIT_KEY: &str = "commit";

/// Source URL reported by the git input resource.
pub const URL_KEY: &str = "url";

/// Keys a successful image build must report.
pub const BUILD_RESULT_KEYS: [&str; 3] = [DIGEST_KEY, COMMIT_KEY, URL_KEY];

/// Result values pulled out of a TaskRun, keyed by result name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedResults {
    pub source: Identity,
    pub values: BTreeMap<String, String>,
}

impl ExtractedResults {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Check that a result equals a value known in advance.
    pub fn expect(&self, key: &str, expected: &str) -> Result<(), SettleError> {
        let actual = self.get(key).ok_or_else(|| SettleError::MissingResult {
            identity: self.source.clone(),
            keys: vec![key.to_string()],
        })?;
        if actual != expected {
            return Err(SettleError::VerificationMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.values
    }
}

/// Pull `expected_keys` out of the TaskRun's result entries.
///
/// Fails with `MissingResult` when a requested key has no entry carrying a
/// resource reference, and otherwise with `MissingReference` when any
/// entry, requested or not, lacks one. Entry order is irrelevant; for repeated keys the last
/// referenced entry wins.
pub fn extract<'a, I>(task_run: &TaskRun, expected_keys: I) -> Result<ExtractedResults, SettleError>
where
    I: IntoIterator<Item = &'a str>,
{
    let source = Identity {
        namespace: task_run.metadata.namespace.clone(),
        name: task_run.metadata.name.clone(),
    };
    let expected: BTreeSet<&str> = expected_keys.into_iter().collect();

    let mut values = BTreeMap::new();
    let mut unreferenced = None;

    for entry in &task_run.status.resources_result {
        let requested = expected.contains(entry.key.as_str());
        match entry.reference() {
            Some(_) if requested => {
                values.insert(entry.key.clone(), entry.value.clone());
            }
            Some(_) => {}
            None => {
                unreferenced.get_or_insert_with(|| entry.key.clone());
            }
        }
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|key| !values.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        tracing::warn!(identity = %source, missing = ?missing, "required results missing");
        return Err(SettleError::MissingResult {
            identity: source,
            keys: missing,
        });
    }

    if let Some(key) = unreferenced {
        return Err(SettleError::MissingReference {
            identity: source,
            key,
        });
    }

    tracing::debug!(identity = %source, results = ?values, "extracted results");
    Ok(ExtractedResults { source, values })
}
