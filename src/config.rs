use crate::error::ConfigError;
use crate::matching::Linkage;
use crate::normalize::{TokenNormalizer, TokenTable};
use crate::tiling::validate_zoom;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_ZOOM: u8 = 19;

/// Whether duplicate clusters may span tile groups.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Each tile group is merged on its own; a record may be emitted once per group.
    #[default]
    PerGroup,
    /// One graph keyed by record hash across all groups, merged at end of input.
    Global,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerGroup => "per-group",
            Self::Global => "global",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Debug, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Geojson,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Geojson => "geojson",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct TilingConfig {
    pub zoom: u8,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self { zoom: DEFAULT_ZOOM }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct MatchingConfig {
    pub linkage: Linkage,
    pub scope: Scope,
    /// Synonym table file; the built-in English table when unset.
    pub tokens_path: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct ExportConfig {
    /// Output file; stdout when unset or `-`.
    pub out_path: Option<String>,
    pub format: OutputFormat,
    pub summary_path: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StreamingConfig {
    /// Input is already grouped by key; skip the external sort.
    pub presorted: bool,
    pub sort_program: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            presorted: false,
            sort_program: "sort".into(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct AppConfig {
    /// Input file; stdin when unset or `-`.
    pub input: Option<String>,
    #[serde(default)]
    pub tiling: TilingConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_zoom(self.tiling.zoom)?;
        if let Some(path) = &self.matching.tokens_path {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "matching.tokens_path",
                    reason: "empty path".into(),
                });
            }
        }
        if !self.streaming.presorted && self.streaming.sort_program.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "streaming.sort_program",
            });
        }
        if let (Some(out), Some(summary)) = (&self.export.out_path, &self.export.summary_path) {
            if out == summary && out != "-" {
                return Err(ConfigError::InvalidValue {
                    field: "export.summary_path",
                    reason: format!("{} is also the output path", summary),
                });
            }
        }
        Ok(())
    }

    /// Build the street normalizer from the configured table. An unreadable
    /// or empty table is a configuration error.
    pub fn normalizer(&self) -> Result<TokenNormalizer, ConfigError> {
        let table = match &self.matching.tokens_path {
            Some(path) => {
                TokenTable::load(Path::new(path)).map_err(|e| ConfigError::InvalidValue {
                    field: "matching.tokens_path",
                    reason: format!("{:#}", e),
                })?
            }
            None => TokenTable::english(),
        };
        TokenNormalizer::new(&table)
    }

    pub fn input_path(&self) -> Option<&Path> {
        match self.input.as_deref() {
            None | Some("-") => None,
            Some(p) => Some(Path::new(p)),
        }
    }

    pub fn out_path(&self) -> Option<&Path> {
        match self.export.out_path.as_deref() {
            None | Some("-") => None,
            Some(p) => Some(Path::new(p)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tiling.zoom, DEFAULT_ZOOM);
        assert_eq!(cfg.export.format, OutputFormat::Csv);
        assert_eq!(cfg.matching.scope, Scope::PerGroup);
    }

    #[test]
    fn bad_zoom_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.tiling.zoom = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "tiling.zoom", .. })
        ));
    }

    #[test]
    fn summary_cannot_overwrite_output() {
        let mut cfg = AppConfig::default();
        cfg.export.out_path = Some("out.csv".into());
        cfg.export.summary_path = Some("out.csv".into());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_sort_program_only_matters_when_sorting() {
        let mut cfg = AppConfig::default();
        cfg.streaming.sort_program = " ".into();
        assert!(cfg.validate().is_err());
        cfg.streaming.presorted = true;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_token_file_fails_normalizer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.txt");
        std::fs::write(&path, "# no groups\n").unwrap();
        let mut cfg = AppConfig::default();
        cfg.matching.tokens_path = Some(path.display().to_string());
        assert!(matches!(
            cfg.normalizer(),
            Err(ConfigError::EmptyTokenTable { .. })
        ));
    }

    #[test]
    fn unreadable_token_file_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.matching.tokens_path = Some("/nonexistent/tokens.txt".into());
        assert!(matches!(
            cfg.normalizer(),
            Err(ConfigError::InvalidValue { field: "matching.tokens_path", .. })
        ));
    }

    #[test]
    fn dash_means_standard_streams() {
        let mut cfg = AppConfig::default();
        cfg.input = Some("-".into());
        cfg.export.out_path = Some("-".into());
        assert!(cfg.input_path().is_none());
        assert!(cfg.out_path().is_none());
    }
}
