//! Analysis configuration and allocation constraints.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlannerError, Result};

pub const CATEGORIZER_COMMAND_ENV: &str = "FYP_CATEGORIZER_CMD";

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_OVERLAP_SIMILARITY_CUTOFF: f64 = 0.5;

pub const DOMAIN_WORKBOOK_NAME: &str = "fyp_domain_categorization.xlsx";
pub const SIMILARITY_WORKBOOK_NAME: &str = "fyp_similarity_analysis.xlsx";
pub const PANEL_WORKBOOK_NAME: &str = "fyp_panel_allocation.xlsx";
pub const REPORT_JSON_NAME: &str = "analysis_report.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorizerConfig {
    pub max_features: usize,
    /// Absolute document count.
    pub min_df: usize,
    /// Fraction of the corpus.
    pub max_df: f64,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: 1000,
            min_df: 1,
            max_df: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategorizerConfig {
    /// Command line of the external categorizer helper, if any.
    pub command: Option<String>,
    pub request_delay_ms: u64,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            command: None,
            request_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputConfig {
    pub domain_workbook: String,
    pub similarity_workbook: String,
    pub panel_workbook: String,
    pub report_json: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            domain_workbook: DOMAIN_WORKBOOK_NAME.into(),
            similarity_workbook: SIMILARITY_WORKBOOK_NAME.into(),
            panel_workbook: PANEL_WORKBOOK_NAME.into(),
            report_json: REPORT_JSON_NAME.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub similarity_threshold: f64,
    /// Pairs at or above this score force their groups onto one panel.
    pub overlap_similarity_cutoff: f64,
    pub vectorizer: VectorizerConfig,
    pub categorizer: CategorizerConfig,
    pub output: OutputConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            overlap_similarity_cutoff: DEFAULT_OVERLAP_SIMILARITY_CUTOFF,
            vectorizer: VectorizerConfig::default(),
            categorizer: CategorizerConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Loads the configuration file if given, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let data = fs::read(path).map_err(|err| PlannerError::io(path, err))?;
                serde_json::from_slice(&data).map_err(|err| {
                    PlannerError::validation(path.display().to_string(), err.to_string())
                })?
            }
            None => Self::default(),
        };
        config.apply_environment();
        Ok(config)
    }

    fn apply_environment(&mut self) {
        if self.categorizer.command.is_none() {
            if let Ok(command) = std::env::var(CATEGORIZER_COMMAND_ENV) {
                if !command.trim().is_empty() {
                    self.categorizer.command = Some(command.trim().to_string());
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("overlap_similarity_cutoff", self.overlap_similarity_cutoff),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PlannerError::validation(
                    "configuration",
                    format!("{label} must lie between 0 and 1 (got {value})"),
                ));
            }
        }
        if self.vectorizer.max_features == 0 {
            return Err(PlannerError::validation(
                "configuration",
                "max_features must be at least 1",
            ));
        }
        if !(self.vectorizer.max_df > 0.0 && self.vectorizer.max_df <= 1.0) {
            return Err(PlannerError::validation(
                "configuration",
                format!("max_df must lie in (0, 1] (got {})", self.vectorizer.max_df),
            ));
        }
        Ok(())
    }
}

/// Panel packing constraints. Panel count and instructor capacity are hard,
/// the desired project count is soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationConstraints {
    pub number_of_panels: i64,
    pub max_instructors_per_panel: i64,
    pub desired_projects_per_panel: i64,
    /// Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_minutes: Option<i64>,
}

impl Default for AllocationConstraints {
    fn default() -> Self {
        Self {
            number_of_panels: 4,
            max_instructors_per_panel: 5,
            desired_projects_per_panel: 10,
            session_duration_minutes: None,
        }
    }
}

impl AllocationConstraints {
    pub fn new(panels: i64, max_instructors: i64, desired_projects: i64) -> Self {
        Self {
            number_of_panels: panels,
            max_instructors_per_panel: max_instructors,
            desired_projects_per_panel: desired_projects,
            session_duration_minutes: None,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|err| PlannerError::io(path, err))?;
        serde_json::from_slice(&data)
            .map_err(|err| PlannerError::validation(path.display().to_string(), err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("number_of_panels", self.number_of_panels),
            ("max_instructors_per_panel", self.max_instructors_per_panel),
            ("desired_projects_per_panel", self.desired_projects_per_panel),
        ] {
            if value < 1 {
                return Err(PlannerError::validation(
                    "constraints",
                    format!("{label} must be at least 1 (got {value})"),
                ));
            }
        }
        Ok(())
    }

    pub fn panels(&self) -> usize {
        self.number_of_panels.max(0) as usize
    }

    pub fn max_instructors(&self) -> usize {
        self.max_instructors_per_panel.max(0) as usize
    }

    pub fn desired_projects(&self) -> usize {
        self.desired_projects_per_panel.max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn non_positive_constraints_are_rejected() {
        assert!(AllocationConstraints::new(0, 2, 3).validate().is_err());
        assert!(AllocationConstraints::new(2, -1, 3).validate().is_err());
        assert!(AllocationConstraints::new(2, 2, 0).validate().is_err());
        assert!(AllocationConstraints::new(1, 1, 1).validate().is_ok());
    }

    #[test]
    fn constraints_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"number_of_panels":3,"max_instructors_per_panel":4,"desired_projects_per_panel":6,"session_duration_minutes":90}}"#
        )
        .unwrap();
        let constraints = AllocationConstraints::from_json_file(file.path()).unwrap();
        assert_eq!(constraints.panels(), 3);
        assert_eq!(constraints.session_duration_minutes, Some(90));
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"similarityThreshold":0.4,"vectorizer":{{"maxFeatures":50}}}}"#).unwrap();
        let config = AnalysisConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.similarity_threshold, 0.4);
        assert_eq!(config.vectorizer.max_features, 50);
        assert_eq!(config.vectorizer.max_df, 0.95);
        assert_eq!(config.overlap_similarity_cutoff, 0.5);
    }

    #[test]
    fn out_of_range_threshold_is_invalid() {
        let config = AnalysisConfig {
            similarity_threshold: 1.5,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().exit_code(), 2);
    }
}
