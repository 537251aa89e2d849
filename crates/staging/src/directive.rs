//! Processing directive model and YAML loading.
//!
//! The directive is the immutable run configuration: loaded once, expanded
//! for `${VAR}` environment references, parsed and validated before any
//! filesystem or store access.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use aoi_common::{
    ColumnarFile, HdfDataset, RasterDataset, StageError, StageResult, TabularFile, Tier,
    VectorFile,
};

use crate::store::RemoteStoreConfig;

// ============================================================================
// Model
// ============================================================================

/// Content declared for one tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierContent {
    #[serde(default)]
    pub raster: Vec<RasterDataset>,
    #[serde(default)]
    pub hdf: Vec<HdfDataset>,
    #[serde(default)]
    pub vector: Vec<VectorFile>,
    #[serde(default)]
    pub table: Vec<TabularFile>,
    #[serde(default)]
    pub columnar: Vec<ColumnarFile>,
}

impl TierContent {
    pub fn is_empty(&self) -> bool {
        self.raster.is_empty()
            && self.hdf.is_empty()
            && self.vector.is_empty()
            && self.table.is_empty()
            && self.columnar.is_empty()
    }
}

/// Optional per-tier root overrides.
///
/// Resolution goes through an exhaustive `match`, never by-name field
/// access, so adding a tier without a mapping fails to compile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierRoots {
    #[serde(default)]
    pub bronze: Option<String>,
    #[serde(default)]
    pub silver: Option<String>,
    #[serde(default)]
    pub gold: Option<String>,
    #[serde(default)]
    pub platinum: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl TierRoots {
    fn override_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Bronze => self.bronze.as_deref(),
            Tier::Silver => self.silver.as_deref(),
            Tier::Gold => self.gold.as_deref(),
            Tier::Platinum => self.platinum.as_deref(),
            Tier::Reference => self.reference.as_deref(),
        }
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingDirective {
    /// Target acquisition date.
    pub date: NaiveDate,

    /// AOI GeoJSON path, relative to the workspace directory.
    pub aoi: String,

    /// Output tree root, relative to the workspace directory.
    pub output_base: String,

    /// Local source tree root; required unless `remote` is present.
    #[serde(default)]
    pub source_root: Option<String>,

    /// Remote store settings; presence selects remote mode for the run.
    #[serde(default)]
    pub remote: Option<RemoteStoreConfig>,

    /// Per-tier root overrides.
    #[serde(default)]
    pub tier_roots: TierRoots,

    /// Optional prefix mirrored wholesale into the reference tier.
    #[serde(default)]
    pub reference: Option<String>,

    /// Raise on missing directories and files instead of skipping them.
    #[serde(default)]
    pub error_for_missing_files: bool,

    /// Declared content per tier.
    pub tiers: BTreeMap<Tier, TierContent>,
}

#[derive(Deserialize)]
struct DirectiveFile {
    staging: ProcessingDirective,
}

// ============================================================================
// Loading
// ============================================================================

impl ProcessingDirective {
    /// Load a directive from a YAML file with environment expansion.
    pub fn from_yaml_file(path: &Path) -> StageResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StageError::Configuration(format!(
                "failed to read directive {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse directive YAML. Unknown dataset identifiers fail here, before
    /// any filesystem access.
    pub fn from_yaml(content: &str) -> StageResult<Self> {
        let expanded = expand_env_vars(content)?;
        let file: DirectiveFile = serde_yaml::from_str(&expanded)
            .map_err(|e| StageError::Configuration(format!("invalid directive: {e}")))?;
        let directive = file.staging;
        directive.validate()?;
        Ok(directive)
    }

    /// Check every declaration against the closed sets.
    pub fn validate(&self) -> StageResult<()> {
        if self.remote.is_none() && self.source_root.is_none() {
            return Err(StageError::Configuration(
                "either source_root or remote must be set".into(),
            ));
        }

        for (tier, content) in &self.tiers {
            for vector in &content.vector {
                vector.validate().map_err(|e| annotate(*tier, e))?;
            }
            for columnar in &content.columnar {
                columnar.validate().map_err(|e| annotate(*tier, e))?;
            }
        }
        Ok(())
    }

    /// Store-key root for a tier: the explicit override when declared,
    /// otherwise `<remote root>/<tier>` in remote mode or `<tier>` under
    /// the local source root.
    pub fn tier_root(&self, tier: Tier) -> String {
        if let Some(explicit) = self.tier_roots.override_for(tier) {
            return explicit.trim_matches('/').to_string();
        }

        let base = self
            .remote
            .as_ref()
            .and_then(|remote| remote.root.as_deref())
            .unwrap_or("");
        if base.is_empty() {
            tier.as_str().to_string()
        } else {
            format!("{}/{}", base.trim_matches('/'), tier)
        }
    }
}

fn annotate(tier: Tier, error: StageError) -> StageError {
    match error {
        StageError::Configuration(message) => {
            StageError::Configuration(format!("tier '{tier}': {message}"))
        }
        other => other,
    }
}

// ============================================================================
// Environment variable expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` references in directive text.
fn expand_env_vars(content: &str) -> StageResult<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => expr.push(c),
                    None => {
                        return Err(StageError::Configuration(format!(
                            "unclosed variable reference: ${{{expr}"
                        )))
                    }
                }
            }

            result.push_str(&resolve_var(&expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

fn resolve_var(expr: &str) -> StageResult<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).map_err(|_| {
            StageError::Configuration(format!("environment variable {expr} not set"))
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
