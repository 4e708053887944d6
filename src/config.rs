/*!
 * Configuration types for preserv
 */

use crate::error::{PreservError, Result};
use preserv_core_manifest::Algorithm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, one section per component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreservConfig {
    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub multibag: MultibagConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    pub serializer: SerializerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PreservConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PreservConfig = toml::from_str(&contents)
            .map_err(|e| PreservError::Config(format!("{}: {}", path.display(), e)))?;
        config.multibag.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PreservError::Config(format!("Failed to encode config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// One default `bag-info.txt` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoField {
    pub name: String,
    pub value: String,
}

impl InfoField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Bag Builder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// Manifest algorithms, first one is used for descriptive records
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,

    /// Hard-link content into the bag instead of copying
    #[serde(default = "default_true")]
    pub link_content: bool,

    /// Fall back to a byte copy when linking fails
    #[serde(default = "default_true")]
    pub copy_on_link_failure: bool,

    /// Let finalize overwrite digests that disagree with existing manifests
    #[serde(default)]
    pub force_recompute: bool,

    /// Base URL for `downloadURL` in data-file records
    #[serde(default)]
    pub download_base_url: Option<String>,

    /// BagIt version written to `bagit.txt`
    #[serde(default = "default_bagit_version")]
    pub bagit_version: String,

    /// Organization profile version written as `Profile-Version`
    #[serde(default = "default_profile_version")]
    pub profile_version: String,

    /// Organization fields added to `bag-info.txt` when absent
    #[serde(default)]
    pub bag_info: Vec<InfoField>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
            link_content: true,
            copy_on_link_failure: true,
            force_recompute: false,
            download_base_url: None,
            bagit_version: default_bagit_version(),
            profile_version: default_profile_version(),
            bag_info: Vec::new(),
        }
    }
}

impl BuilderConfig {
    /// Algorithm used for record checksums
    pub fn primary_algorithm(&self) -> Algorithm {
        self.algorithms.first().copied().unwrap_or(Algorithm::Sha256)
    }

    pub fn validate(&self) -> Result<()> {
        if self.algorithms.is_empty() {
            return Err(PreservError::Config(
                "at least one checksum algorithm is required".to_string(),
            ));
        }
        if !preserv_core_manifest::tagfile::SUPPORTED_BAGIT_VERSIONS
            .contains(&self.bagit_version.as_str())
        {
            return Err(PreservError::Config(format!(
                "unsupported BagIt version: {}",
                self.bagit_version
            )));
        }
        Ok(())
    }
}

/// Multibag Splitter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultibagConfig {
    /// Hard ceiling on content bytes per non-head bag
    #[serde(default = "default_max_bag_size")]
    pub max_bag_size: u64,

    /// Hard ceiling for the head bag (defaults to `max_bag_size`)
    #[serde(default)]
    pub max_headbag_size: Option<u64>,

    /// Soft packing target (defaults to `max_bag_size`)
    #[serde(default)]
    pub target_bag_size: Option<u64>,

    /// Remove the source bag after a successful split
    #[serde(default)]
    pub replace: bool,

    /// Check the split series against the source manifest before returning
    #[serde(default = "default_true")]
    pub verify_complete: bool,

    /// Add a multibag structure even when no split is needed
    #[serde(default)]
    pub convert_small: bool,

    /// Value of `Multibag-Version`
    #[serde(default = "default_multibag_version")]
    pub multibag_version: String,
}

impl Default for MultibagConfig {
    fn default() -> Self {
        Self {
            max_bag_size: default_max_bag_size(),
            max_headbag_size: None,
            target_bag_size: None,
            replace: false,
            verify_complete: true,
            convert_small: false,
            multibag_version: default_multibag_version(),
        }
    }
}

impl MultibagConfig {
    /// Config with only the bag-size ceiling set
    pub fn with_max_bag_size(max_bag_size: u64) -> Self {
        Self {
            max_bag_size,
            ..Default::default()
        }
    }

    pub fn effective_headbag_size(&self) -> u64 {
        self.max_headbag_size.unwrap_or(self.max_bag_size)
    }

    pub fn effective_target_size(&self) -> u64 {
        self.target_bag_size.unwrap_or(self.max_bag_size)
    }

    /// Reject zero or contradictory thresholds
    pub fn validate(&self) -> Result<()> {
        if self.max_bag_size == 0 {
            return Err(PreservError::Config(
                "max_bag_size must be greater than zero".to_string(),
            ));
        }
        if self.max_headbag_size == Some(0) {
            return Err(PreservError::Config(
                "max_headbag_size must be greater than zero".to_string(),
            ));
        }
        match self.target_bag_size {
            Some(0) => Err(PreservError::Config(
                "target_bag_size must be greater than zero".to_string(),
            )),
            Some(target) if target > self.max_bag_size => Err(PreservError::Config(format!(
                "target_bag_size ({}) exceeds max_bag_size ({})",
                target, self.max_bag_size
            ))),
            _ => Ok(()),
        }
    }
}

/// Validation Framework settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Rule names (or glob patterns) to run; empty means all
    #[serde(default)]
    pub include: Vec<String>,

    /// Rule names (or glob patterns) to leave out
    #[serde(default)]
    pub skip: Vec<String>,

    /// JSON schema for descriptive records (built-in schema when unset)
    #[serde(default)]
    pub record_schema: Option<PathBuf>,

    /// Accept `{aipid}.mbag{M}_{m}-{seq}` names without a version
    #[serde(default = "default_true")]
    pub allow_unversioned_names: bool,

    /// Name reported on organization-profile issues
    #[serde(default = "default_profile_name")]
    pub profile_name: String,

    /// Expected `Profile-Version`
    #[serde(default = "default_profile_version")]
    pub profile_version: String,

    /// Bag-info field combinations that must all be present
    #[serde(default = "default_required_info_groups")]
    pub required_info_groups: Vec<Vec<String>>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            skip: Vec::new(),
            record_schema: None,
            allow_unversioned_names: true,
            profile_name: default_profile_name(),
            profile_version: default_profile_version(),
            required_info_groups: default_required_info_groups(),
        }
    }
}

/// Archive formats the Serializer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Zip,
    #[serde(rename = "7z")]
    SevenZip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
        }
    }

    /// Archiver looked up on `PATH` when no override is configured
    pub fn default_executable(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
        }
    }
}

/// Serializer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerConfig {
    #[serde(default)]
    pub format: ArchiveFormat,

    /// Archiver executable override
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Algorithm of the detached digest file
    #[serde(default = "default_digest_algorithm")]
    pub digest_algorithm: Algorithm,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            format: ArchiveFormat::default(),
            executable: None,
            digest_algorithm: default_digest_algorithm(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::Sha256]
}

fn default_digest_algorithm() -> Algorithm {
    Algorithm::Sha256
}

fn default_bagit_version() -> String {
    "1.0".to_string()
}

fn default_profile_version() -> String {
    "0.4".to_string()
}

fn default_multibag_version() -> String {
    "0.4".to_string()
}

fn default_profile_name() -> String {
    "Preservation-Profile".to_string()
}

fn default_max_bag_size() -> u64 {
    500 * 1_000_000 // 500 MB
}

fn default_required_info_groups() -> Vec<Vec<String>> {
    vec![
        vec![
            "Source-Organization".to_string(),
            "Organization-Address".to_string(),
        ],
        vec!["Contact-Name".to_string(), "Contact-Email".to_string()],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = PreservConfig::default();
        assert_eq!(config.builder.algorithms, vec![Algorithm::Sha256]);
        assert!(config.builder.copy_on_link_failure);
        assert!(!config.builder.force_recompute);
        assert_eq!(config.builder.bagit_version, "1.0");
        assert!(config.multibag.verify_complete);
        assert!(!config.multibag.convert_small);
        assert_eq!(config.serializer.format, ArchiveFormat::Zip);
        assert_eq!(config.validator.required_info_groups.len(), 2);
    }

    #[test]
    fn test_multibag_effective_sizes() {
        let config = MultibagConfig::with_max_bag_size(200_000);
        assert_eq!(config.effective_headbag_size(), 200_000);
        assert_eq!(config.effective_target_size(), 200_000);

        let config = MultibagConfig {
            max_headbag_size: Some(50_000),
            target_bag_size: Some(150_000),
            ..MultibagConfig::with_max_bag_size(200_000)
        };
        assert_eq!(config.effective_headbag_size(), 50_000);
        assert_eq!(config.effective_target_size(), 150_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_multibag_rejects_contradictions() {
        let config = MultibagConfig {
            target_bag_size: Some(300_000),
            ..MultibagConfig::with_max_bag_size(200_000)
        };
        assert!(matches!(config.validate(), Err(PreservError::Config(_))));
        assert!(MultibagConfig::with_max_bag_size(0).validate().is_err());

        let config = MultibagConfig {
            max_headbag_size: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_validate() {
        assert!(BuilderConfig::default().validate().is_ok());
        let config = BuilderConfig {
            bagit_version: "2.0".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = BuilderConfig {
            algorithms: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.primary_algorithm(), Algorithm::Sha256);
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preserv.toml");

        let mut config = PreservConfig::default();
        config.builder.algorithms = vec![Algorithm::Sha256, Algorithm::Sha512];
        config
            .builder
            .bag_info
            .push(InfoField::new("Source-Organization", "Example Institute"));
        config.serializer.format = ArchiveFormat::SevenZip;
        config.multibag.target_bag_size = Some(1_000);
        config.logging.log_level = LogLevel::Debug;
        config.to_file(&path).unwrap();

        let loaded = PreservConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[multibag]\nmax_bag_size = 1024\n\n[serializer]\nformat = \"7z\"\n",
        )
        .unwrap();

        let config = PreservConfig::from_file(&path).unwrap();
        assert_eq!(config.multibag.max_bag_size, 1024);
        assert!(config.multibag.verify_complete);
        assert_eq!(config.serializer.format, ArchiveFormat::SevenZip);
        assert_eq!(config.serializer.digest_algorithm, Algorithm::Sha256);
    }

    #[test]
    fn test_invalid_thresholds_rejected_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[multibag]\nmax_bag_size = 0\n").unwrap();
        assert!(matches!(
            PreservConfig::from_file(&path),
            Err(PreservError::Config(_))
        ));
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
