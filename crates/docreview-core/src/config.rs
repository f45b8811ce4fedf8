//! Review configuration: where the tables and PDFs live, the score threshold
//! and the ordered set of fields to verify.
//!
//! Loaded from TOML. Every key is optional; missing keys fall back to the
//! co-branding agreement deployment defaults.
//!
//! ```toml
//! database = "agreements.duckdb"
//! source_table = "CO_BRANDING_AGREEMENTS"
//! verify_table = "CO_BRANDING_AGREEMENTS_VERIFIED"
//! stage_dir = "doc_ai_stage"
//! threshold = 0.5
//!
//! [[fields]]
//! name = "EFFECTIVE_DATE"
//!
//! [[fields]]
//! name = "PAYMENT_TERMS"
//! value_column = "PAYMENT_TERMS_VALUE"
//! score_column = "PAYMENT_TERMS_SCORE"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::FieldDefinition;

pub const DEFAULT_DATABASE: &str = "docreview.duckdb";
pub const DEFAULT_SOURCE_TABLE: &str = "CO_BRANDING_AGREEMENTS";
pub const DEFAULT_VERIFY_TABLE: &str = "CO_BRANDING_AGREEMENTS_VERIFIED";
pub const DEFAULT_STAGE_DIR: &str = "doc_ai_stage";
pub const DEFAULT_THRESHOLD: f64 = 0.5;
pub const DEFAULT_RENDER_SCALE: f32 = 8.0;

/// Fields verified by the co-branding agreement extraction model.
pub const DEFAULT_FIELDS: &[&str] = &[
    "EFFECTIVE_DATE",
    "AGREEMENT_DURATION",
    "NOTICE_PERIOD",
    "PAYMENT_TERMS",
    "HAVE_FORCE_MAJEURE",
    "HAVE_INDEMNIFICATION_CLAUSE",
    "HAVE_RENEWAL_OPTIONS",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewConfig {
    /// DuckDB file. `None` keeps everything in memory.
    pub database: Option<PathBuf>,
    /// Optional schema qualifying both table names.
    pub schema: Option<String>,
    pub source_table: String,
    pub verify_table: String,
    /// Directory holding the source PDFs, addressed by file name.
    pub stage_dir: PathBuf,
    /// Scores at or below this value need review.
    pub threshold: f64,
    pub render_scale: f32,
    /// Ordered; display and aggregation follow this order.
    pub fields: Vec<FieldDefinition>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            database: Some(PathBuf::from(DEFAULT_DATABASE)),
            schema: None,
            source_table: DEFAULT_SOURCE_TABLE.to_string(),
            verify_table: DEFAULT_VERIFY_TABLE.to_string(),
            stage_dir: PathBuf::from(DEFAULT_STAGE_DIR),
            threshold: DEFAULT_THRESHOLD,
            render_scale: DEFAULT_RENDER_SCALE,
            fields: DEFAULT_FIELDS.iter().map(|n| FieldDefinition::new(*n)).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database: Option<PathBuf>,
    schema: Option<String>,
    source_table: Option<String>,
    verify_table: Option<String>,
    stage_dir: Option<PathBuf>,
    threshold: Option<f64>,
    render_scale: Option<f32>,
    fields: Option<Vec<FieldEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldEntry {
    name: String,
    value_column: Option<String>,
    score_column: Option<String>,
}

impl From<FieldEntry> for FieldDefinition {
    fn from(entry: FieldEntry) -> Self {
        let mut field = FieldDefinition::new(entry.name);
        if let Some(col) = entry.value_column {
            field.value_column = col;
        }
        if let Some(col) = entry.score_column {
            field.score_column = col;
        }
        field
    }
}

impl ReviewConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading review config");
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML, filling unspecified keys with defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let defaults = Self::default();
        let config = Self {
            database: file.database.or(defaults.database),
            schema: file.schema.or(defaults.schema),
            source_table: file.source_table.unwrap_or(defaults.source_table),
            verify_table: file.verify_table.unwrap_or(defaults.verify_table),
            stage_dir: file.stage_dir.unwrap_or(defaults.stage_dir),
            threshold: file.threshold.unwrap_or(defaults.threshold),
            render_scale: file.render_scale.unwrap_or(defaults.render_scale),
            fields: match file.fields {
                Some(entries) => entries.into_iter().map(FieldDefinition::from).collect(),
                None => defaults.fields,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            warn!(
                threshold = self.threshold,
                "threshold outside [0, 1]; scores are usually probabilities"
            );
        }
        if !(self.render_scale.is_finite() && self.render_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "render_scale must be positive, got {}",
                self.render_scale
            )));
        }
        for (key, table) in [
            ("source_table", &self.source_table),
            ("verify_table", &self.verify_table),
        ] {
            if table.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        if self.source_table.eq_ignore_ascii_case(&self.verify_table) {
            return Err(ConfigError::Invalid(
                "source_table and verify_table must differ".into(),
            ));
        }

        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ConfigError::Invalid("field name must not be empty".into()));
            }
            if !names.insert(field.name.to_ascii_uppercase()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
            for col in [&field.value_column, &field.score_column] {
                if col.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "field {} has an empty column name",
                        field.name
                    )));
                }
                if !columns.insert(col.to_ascii_uppercase()) {
                    return Err(ConfigError::Invalid(format!(
                        "column {col} used by more than one field"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}
