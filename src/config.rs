//! Pipeline configuration.
//!
//! Every tunable the pipeline uses lives in [`PipelineConfig`] and is passed
//! explicitly to each unit of work. Missing keys in a JSON configuration take
//! the defaults below.

use crate::error::{MarcError, Result};
use crate::rules::TransformRules;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of records per batch file.
pub const DEFAULT_MAX_RECORDS: usize = 500;

/// Default number of records per harvested archive unit.
pub const DEFAULT_HARVEST_BATCH_SIZE: usize = 50_000;

/// Default page size for record store queries.
pub const DEFAULT_PAGE_LIMIT: usize = 5_000;

/// Default archive file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "srs-marc-export";

/// Tags stripped from vendor files by default.
pub const DEFAULT_FILTER_TAGS: [&str; 3] = ["905", "920", "986"];

/// How a record total that is not a multiple of the batch size is planned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchRounding {
    /// Plan only full batches; a trailing partial batch is not exported.
    Floor,
    /// Plan a final partial batch as well.
    #[default]
    Ceiling,
}

/// Settings for harvesting a paginated record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Records per archive unit; a multiple of `page_limit`
    pub batch_size: usize,
    /// Records per page request
    pub page_limit: usize,
    /// Trailing partial batch policy
    pub rounding: BatchRounding,
    /// Archive file name prefix
    pub file_prefix: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        HarvestConfig {
            batch_size: DEFAULT_HARVEST_BATCH_SIZE,
            page_limit: DEFAULT_PAGE_LIMIT,
            rounding: BatchRounding::default(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl HarvestConfig {
    /// Check sizes.
    ///
    /// # Errors
    ///
    /// Returns [`MarcError::Config`] if a size is zero, `batch_size` is not a
    /// multiple of `page_limit`, or the prefix is empty.
    pub fn validate(&self) -> Result<()> {
        if self.page_limit == 0 || self.batch_size == 0 {
            return Err(MarcError::Config(
                "harvest batch_size and page_limit must be positive".to_string(),
            ));
        }
        if self.batch_size % self.page_limit != 0 {
            return Err(MarcError::Config(format!(
                "harvest batch_size {} is not a multiple of page_limit {}",
                self.batch_size, self.page_limit
            )));
        }
        if self.file_prefix.is_empty() {
            return Err(MarcError::Config(
                "harvest file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Records per batch file
    pub max_records: usize,
    /// Tags removed by the vendor field filter
    pub filter_tags: Vec<String>,
    /// Record store harvest settings
    pub harvest: HarvestConfig,
    /// Field transformation rules
    pub rules: TransformRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_records: DEFAULT_MAX_RECORDS,
            filter_tags: DEFAULT_FILTER_TAGS.iter().map(ToString::to_string).collect(),
            harvest: HarvestConfig::default(),
            rules: TransformRules::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any section is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the configuration is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first configuration or rule error found.
    pub fn validate(&self) -> Result<()> {
        if self.max_records == 0 {
            return Err(MarcError::Config("max_records must be positive".to_string()));
        }
        self.harvest.validate()?;
        self.rules.validate()
    }
}
