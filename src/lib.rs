/*!
 * Preserv - archival bag engine for research-data preservation
 *
 * Builds, splits, validates and serializes BagIt bags that follow the
 * multibag preservation profile:
 * - Descriptive metadata records per collection and file (`metadata/`)
 * - Verified content placement with hardlink or copy
 * - Payload and tag manifests, bag-info and provenance log on finalize
 * - Size-bounded multibag splitting with a head bag and file lookup
 * - Rule-based BagIt and profile validation with per-rule isolation
 * - Zip/7z serialization with a detached digest file
 *
 * ```no_run
 * use preserv::{BagBuilder, BuilderConfig, Serializer, SerializerConfig, Validator, ValidatorConfig};
 *
 * # fn main() -> preserv::Result<()> {
 * let mut builder = BagBuilder::create("/srv/bags/pdr0-0001.mbag0_4-0", BuilderConfig::default())?;
 * builder.add_content_file("/incoming/trial1.csv".as_ref(), "trial1.csv")?;
 * builder.finalize()?;
 *
 * let report = Validator::profile(ValidatorConfig::default()).validate(builder.bag().root())?;
 * for issue in report.errors() {
 *     eprintln!("{}: {:?}", issue.rule, issue.comments);
 * }
 *
 * Serializer::new(SerializerConfig::default()).serialize(builder.bag(), "/srv/out".as_ref())?;
 * # Ok(())
 * # }
 * ```
 */

pub mod bag;
pub mod builder;
pub mod collab;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod multibag;
pub mod serialize;
pub mod validate;

// Re-export commonly used types
pub use bag::{Bag, DescriptiveRecord, MultibagIndex, RecordKind};
pub use builder::{BagBuilder, FinalizeReport};
pub use config::{
    ArchiveFormat, BuilderConfig, InfoField, LoggingConfig, MultibagConfig, PreservConfig,
    SerializerConfig, ValidatorConfig,
};
pub use error::{ErrorCategory, PreservError, Result};
pub use multibag::{MultibagSeries, SeriesKind, SplitPlan, Splitter};
pub use serialize::{verify_archive, ArchiveArtifact, Serializer};
pub use validate::{Severity, ValidationIssue, ValidationReport, Validator};

pub use preserv_core_manifest::Algorithm;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
