/*!
 * Validation Framework
 *
 * A static registry of named rules, run one at a time against a bag. Every
 * rule is a plain function returning the offending items it found; the
 * driver turns those into [`ValidationIssue`]s:
 *
 * - no offenses: one passing issue
 * - offenses: one failing issue per offending item
 * - `Err` from the rule: one failing issue carrying the error
 * - panic inside the rule: one failing issue carrying the panic message and
 *   a backtrace; the remaining rules still run
 *
 * Two layered rule sets exist: [`bagit::RULES`] for the packaging format and
 * [`profile::RULES`] for the organization profile.
 */

pub mod bagit;
pub mod profile;

use crate::bag::Bag;
use crate::config::ValidatorConfig;
use crate::core::checksum::FileDigests;
use crate::error::{PreservError, Result};
use glob::Pattern;
use preserv_core_manifest::{ManifestKind, RecordSchema};
use serde::Serialize;
use std::backtrace::Backtrace;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info, warn};

/// Profile name reported on packaging-format issues
pub const BAGIT_PROFILE: &str = "BagIt";
pub const BAGIT_PROFILE_VERSION: &str = "1.0";

/// How much a failing rule matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Recommendation,
}

/// Which layer a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSet {
    BagIt,
    Profile,
}

/// Outcome of one rule on one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub profile: String,
    pub profile_version: String,
    pub label: String,
    /// Registered rule name
    pub rule: String,
    pub severity: Severity,
    pub spec: String,
    pub passed: bool,
    pub comments: Vec<String>,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

/// Ordered issues from one validation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub bag: PathBuf,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn failed(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| !i.passed).collect()
    }

    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error()).collect()
    }

    pub fn recommendations(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| !i.passed && i.severity == Severity::Recommendation)
            .collect()
    }

    /// No failing error-severity issue
    pub fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }

    /// Failing issues of one rule
    pub fn failures_of(&self, rule: &str) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| !i.passed && i.rule == rule)
            .collect()
    }
}

/// Offending items found by a rule; empty means the rule passed
pub type CheckFn = fn(&RuleContext<'_>) -> Result<Vec<String>>;

/// Rule definition for the registry
#[derive(Clone, Copy)]
pub struct RuleDefinition {
    /// snake_case name used by `include`/`skip`
    pub name: &'static str,
    pub label: &'static str,
    pub severity: Severity,
    pub spec: &'static str,
    pub set: RuleSet,
    pub check: CheckFn,
}

impl std::fmt::Debug for RuleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDefinition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("severity", &self.severity)
            .field("set", &self.set)
            .finish_non_exhaustive()
    }
}

/// Bag under validation plus lazily computed shared state
pub struct RuleContext<'a> {
    pub bag: &'a Bag,
    pub config: &'a ValidatorConfig,
    digests: OnceCell<BTreeMap<String, FileDigests>>,
    schema: OnceCell<RecordSchema>,
}

impl<'a> RuleContext<'a> {
    pub fn new(bag: &'a Bag, config: &'a ValidatorConfig) -> Self {
        Self {
            bag,
            config,
            digests: OnceCell::new(),
            schema: OnceCell::new(),
        }
    }

    /// Digests of every content file for every payload-manifest algorithm
    pub fn payload_digests(&self) -> Result<&BTreeMap<String, FileDigests>> {
        if let Some(digests) = self.digests.get() {
            return Ok(digests);
        }
        let algorithms = self.bag.manifest_algorithms(ManifestKind::Payload)?;
        let computed = self.bag.compute_payload_digests(&algorithms)?;
        Ok(self.digests.get_or_init(|| computed))
    }

    /// Configured record schema, or the built-in one
    pub fn schema(&self) -> Result<&RecordSchema> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let schema = match &self.config.record_schema {
            Some(path) => RecordSchema::load(path)?,
            None => RecordSchema::builtin()?,
        };
        Ok(self.schema.get_or_init(|| schema))
    }
}

thread_local! {
    static IN_RULE: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Route panics raised inside a rule to [`LAST_PANIC`] instead of stderr
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_RULE.with(Cell::get) {
                let trace = Backtrace::force_capture();
                LAST_PANIC.with(|p| *p.borrow_mut() = Some(format!("{}\n{}", info, trace)));
            } else {
                previous(info);
            }
        }));
    });
}

/// Run one rule; a panic becomes `Err(diagnostic)`
fn run_isolated(rule: &RuleDefinition, ctx: &RuleContext<'_>) -> std::result::Result<Result<Vec<String>>, String> {
    IN_RULE.with(|f| f.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (rule.check)(ctx)));
    IN_RULE.with(|f| f.set(false));
    outcome.map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let trace = LAST_PANIC
            .with(|p| p.borrow_mut().take())
            .unwrap_or_else(|| Backtrace::force_capture().to_string());
        format!("rule panicked: {}\n{}", message, trace)
    })
}

/// Runs a selection of rules against bags
pub struct Validator {
    config: ValidatorConfig,
    rules: Vec<RuleDefinition>,
}

impl Validator {
    /// Packaging-format rules only
    pub fn bagit(config: ValidatorConfig) -> Self {
        Self {
            config,
            rules: bagit::RULES.to_vec(),
        }
    }

    /// Packaging-format rules followed by the organization profile rules
    pub fn profile(config: ValidatorConfig) -> Self {
        let mut rules = bagit::RULES.to_vec();
        rules.extend_from_slice(profile::RULES);
        Self { config, rules }
    }

    /// Append extra rules after the built-in ones
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = RuleDefinition>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Names of every registered rule, in execution order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Rules left after applying `include` then `skip`
    pub fn selected_rules(&self) -> Result<Vec<&RuleDefinition>> {
        let include = compile_patterns(&self.config.include)?;
        let skip = compile_patterns(&self.config.skip)?;
        Ok(self
            .rules
            .iter()
            .filter(|r| include.is_empty() || include.iter().any(|p| p.matches(r.name)))
            .filter(|r| !skip.iter().any(|p| p.matches(r.name)))
            .collect())
    }

    /// Validate the bag at `root`.
    ///
    /// A missing root is the only error returned; everything else is
    /// collected into the report.
    pub fn validate(&self, root: &Path) -> Result<ValidationReport> {
        if !root.is_dir() {
            return Err(PreservError::BagNotFound(root.to_path_buf()));
        }
        let bag = Bag::open(root)?;
        let rules = self.selected_rules()?;
        install_panic_hook();

        let ctx = RuleContext::new(&bag, &self.config);
        let mut issues = Vec::new();
        for rule in rules {
            let outcome = run_isolated(rule, &ctx);
            let comments: Vec<Vec<String>> = match outcome {
                Ok(Ok(offenses)) if offenses.is_empty() => {
                    issues.push(self.issue(rule, true, Vec::new()));
                    continue;
                }
                Ok(Ok(offenses)) => offenses.into_iter().map(|o| vec![o]).collect(),
                Ok(Err(e)) => {
                    warn!(rule = rule.name, error = %e, "rule failed to run");
                    vec![vec![format!("could not evaluate: {}", e)]]
                }
                Err(diagnostic) => {
                    warn!(rule = rule.name, "rule panicked");
                    vec![vec![diagnostic]]
                }
            };
            debug!(rule = rule.name, failures = comments.len(), "rule failed");
            for c in comments {
                issues.push(self.issue(rule, false, c));
            }
        }

        let report = ValidationReport {
            bag: root.to_path_buf(),
            issues,
        };
        info!(
            bag = %bag.name(),
            rules = report.issues.len(),
            errors = report.errors().len(),
            recommendations = report.recommendations().len(),
            "validation complete"
        );
        Ok(report)
    }

    fn issue(&self, rule: &RuleDefinition, passed: bool, comments: Vec<String>) -> ValidationIssue {
        let (profile, version) = match rule.set {
            RuleSet::BagIt => (BAGIT_PROFILE.to_string(), BAGIT_PROFILE_VERSION.to_string()),
            RuleSet::Profile => (
                self.config.profile_name.clone(),
                self.config.profile_version.clone(),
            ),
        };
        ValidationIssue {
            profile,
            profile_version: version,
            label: rule.label.to_string(),
            rule: rule.name.to_string(),
            severity: rule.severity,
            spec: rule.spec.to_string(),
            passed,
            comments,
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| PreservError::Config(format!("invalid rule pattern '{}': {}", p, e)))
        })
        .collect()
}
