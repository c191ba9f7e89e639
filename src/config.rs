//! Analysis configuration. Every file location the toolkit touches comes
//! from here; nothing reads a fixed path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::mass_balance::MassBalanceAggregator;
use crate::transfers::TransferLoadOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSource {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSource {
    pub file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default)]
    pub consolidate_terminals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Relative paths below resolve against this directory.
    #[serde(default)]
    pub base_path: PathBuf,
    pub facilities: TableSource,
    pub transfers: TransferSource,
    pub oil_attribution: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic_us_attribution: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<PathBuf>,
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    #[serde(default = "default_weight_precision")]
    pub weight_precision: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_header_lines")]
    pub header_lines: usize,
}

pub const DEFAULT_FACILITY_SHEET: &str = "Washington";
pub const DEFAULT_TRANSFER_SHEET: &str = "Vessel Oil Transfer";

fn default_quantity_precision() -> u32 {
    5
}

fn default_weight_precision() -> u32 {
    9
}

fn default_header_lines() -> usize {
    4
}

impl AnalysisConfig {
    /// Parse a YAML config. A missing `base_path` becomes the file's directory.
    pub fn from_yaml_file(path: &Path) -> Result<Self, TraceError> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        if config.base_path.as_os_str().is_empty() {
            if let Some(dir) = path.parent() {
                config.base_path = dir.to_path_buf();
            }
        }
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, TraceError> {
        let config: AnalysisConfig = serde_yml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), TraceError> {
        let max = crate::precision::MAX_PRECISION;
        if self.quantity_precision > max || self.weight_precision > max {
            return Err(TraceError::InvalidArgument(format!(
                "precision must be at most {max} decimal digits"
            )));
        }
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    pub fn facility_path(&self) -> PathBuf {
        self.resolve(&self.facilities.file)
    }

    /// Only consulted for spreadsheet inputs.
    pub fn facility_sheet(&self) -> &str {
        self.facilities.sheet.as_deref().unwrap_or(DEFAULT_FACILITY_SHEET)
    }

    pub fn transfer_path(&self) -> PathBuf {
        self.resolve(&self.transfers.file)
    }

    pub fn transfer_sheet(&self) -> &str {
        self.transfers.sheet.as_deref().unwrap_or(DEFAULT_TRANSFER_SHEET)
    }

    pub fn transfer_options(&self) -> TransferLoadOptions {
        TransferLoadOptions {
            quantity_precision: self.quantity_precision,
            consolidate_terminals: self.transfers.consolidate_terminals,
        }
    }

    pub fn attribution_path(&self) -> PathBuf {
        self.resolve(&self.oil_attribution)
    }

    pub fn generic_us_attribution_path(&self) -> Option<PathBuf> {
        self.generic_us_attribution.as_deref().map(|p| self.resolve(p))
    }

    pub fn monte_carlo_path(&self) -> Option<PathBuf> {
        self.monte_carlo.as_deref().map(|p| self.resolve(p))
    }

    pub fn mass_balance(&self) -> MassBalanceAggregator {
        MassBalanceAggregator::new(self.header_lines)
    }
}
