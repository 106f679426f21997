//! Known avatar models and their manifest files.
//!
//! Model names map to `.model3.json` manifests under the models
//! directory. The manifest's `FileReferences` section lists the
//! expression and motion files the runtime can request by name.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// (name, manifest path relative to the models directory).
const KNOWN_MODELS: &[(&str, &str)] = &[
    ("mao", "mao_pro/mao_pro.model3.json"),
    ("hiyori", "hiyori_pro/hiyori_pro.model3.json"),
    ("haru", "haru/haru.model3.json"),
];

/// Names of all bundled models.
#[must_use]
pub fn known_model_names() -> Vec<&'static str> {
    KNOWN_MODELS.iter().map(|&(name, _)| name).collect()
}

/// Resolve a model name to its manifest path and verify it exists.
///
/// # Errors
///
/// Returns an error naming the unknown model (and the known ones), or
/// the missing manifest file.
pub fn model_path(models_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = KNOWN_MODELS
        .iter()
        .find(|&&(known, _)| known == name)
        .map(|&(_, path)| path)
        .ok_or_else(|| {
            Error::Avatar(format!(
                "unknown model '{name}', known models: {}",
                known_model_names().join(", ")
            ))
        })?;
    let path = models_dir.join(relative);
    if !path.is_file() {
        return Err(Error::Avatar(format!(
            "model '{name}' manifest not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// `.model3.json` manifest, reduced to the parts the runtime reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    #[serde(rename = "FileReferences")]
    pub file_references: FileReferences,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileReferences {
    #[serde(rename = "Moc")]
    pub moc: String,
    #[serde(rename = "Expressions", default)]
    pub expressions: Vec<ExpressionRef>,
    #[serde(rename = "Motions", default)]
    pub motions: std::collections::BTreeMap<String, Vec<MotionRef>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpressionRef {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "File")]
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionRef {
    #[serde(rename = "File")]
    pub file: String,
}

impl ModelManifest {
    /// Parse a `.model3.json` manifest.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Avatar(format!("cannot read {}: {e}", path.display())))?;
        let manifest: ModelManifest = serde_json::from_str(&raw)
            .map_err(|e| Error::Avatar(format!("invalid manifest {}: {e}", path.display())))?;
        debug!(
            expressions = manifest.file_references.expressions.len(),
            motion_groups = manifest.file_references.motions.len(),
            "loaded model manifest"
        );
        Ok(manifest)
    }

    /// Names of all expressions the model defines.
    #[must_use]
    pub fn expression_names(&self) -> Vec<&str> {
        self.file_references
            .expressions
            .iter()
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Whether the model defines an expression of this name.
    #[must_use]
    pub fn has_expression(&self, name: &str) -> bool {
        self.file_references
            .expressions
            .iter()
            .any(|e| e.name == name)
    }
}
