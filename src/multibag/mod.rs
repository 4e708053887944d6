/*!
 * Multibag Splitter
 *
 * Turns one bag whose content exceeds `max_bag_size` into an ordered series
 * of bags. Content is packed in enumeration order; the last member is the
 * head bag and carries `metadata/`, `fetch.txt`, any other tag directories
 * and the multibag index (`multibag/member-bags.tsv`,
 * `multibag/file-lookup.tsv`).
 *
 * ```no_run
 * use preserv::{Bag, MultibagConfig, Splitter};
 *
 * # fn main() -> preserv::Result<()> {
 * let bag = Bag::open("/srv/bags/pdr0-0001.mbag0_4-0")?;
 * let splitter = Splitter::new(MultibagConfig::with_max_bag_size(500_000_000))?;
 * let plan = splitter.plan(&bag)?;
 * println!("{} members", plan.member_count());
 * let series = splitter.split(&bag, "/srv/bags/out".as_ref())?;
 * if let Some(head) = series.head() {
 *     println!("head: {}", head.name());
 * }
 * # Ok(())
 * # }
 * ```
 */

pub mod completeness;
mod materialize;
pub mod plan;

pub use completeness::{check_completeness, verify_complete, Completeness};
pub use plan::{member_names, pack, plan_split, PlanKind, PlannedFile, PlannedMember, SplitPlan};

use crate::bag::Bag;
use crate::collab::RemoteAvailability;
use crate::config::MultibagConfig;
use crate::error::{PreservError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// How the series relates to the source bag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    /// The source bag, untouched
    Unchanged,
    /// The source bag with a head-bag-only multibag structure added in place
    Converted,
    /// New member bags under the destination directory
    Split,
}

/// Result of [`Splitter::split`]
#[derive(Debug, Clone)]
pub struct MultibagSeries {
    pub kind: SeriesKind,
    /// Members in creation order; the head bag is last
    pub members: Vec<Bag>,
    pub plan: SplitPlan,
}

impl MultibagSeries {
    /// The bag carrying metadata (the only member for unchanged bags)
    pub fn head(&self) -> Option<&Bag> {
        self.members.last()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Splits bags according to a [`MultibagConfig`]
pub struct Splitter {
    config: MultibagConfig,
    remote: Option<Box<dyn RemoteAvailability>>,
}

impl Splitter {
    pub fn new(config: MultibagConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            remote: None,
        })
    }

    /// Consult `remote` for fetch-listed paths during the completeness check
    pub fn with_remote_availability(mut self, remote: Box<dyn RemoteAvailability>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn config(&self) -> &MultibagConfig {
        &self.config
    }

    /// Compute the split without writing anything
    pub fn plan(&self, bag: &Bag) -> Result<SplitPlan> {
        plan_split(bag, &self.config)
    }

    /// Split `bag` into members under `dest_dir`.
    ///
    /// Bags that fit are returned unchanged (or converted in place when
    /// `convert_small` is set). With `replace`, the source directory is
    /// removed only after every member is written and, if enabled, the
    /// completeness check passed.
    pub fn split(&self, bag: &Bag, dest_dir: &Path) -> Result<MultibagSeries> {
        let plan = self.plan(bag)?;
        match plan.kind {
            PlanKind::Unchanged => {
                info!(bag = %bag.name(), "bag within size limit; left unchanged");
                return Ok(MultibagSeries {
                    kind: SeriesKind::Unchanged,
                    members: vec![bag.clone()],
                    plan,
                });
            }
            PlanKind::Convert => {
                materialize::convert_in_place(bag, &self.config)?;
                return Ok(MultibagSeries {
                    kind: SeriesKind::Converted,
                    members: vec![bag.clone()],
                    plan,
                });
            }
            PlanKind::Split => {}
        }

        check_destination(bag, &plan, dest_dir)?;

        let members = materialize::materialize(bag, &plan, dest_dir, &self.config)?;
        if self.config.verify_complete {
            verify_complete(bag, &members, self.remote.as_deref())?;
        }
        if self.config.replace {
            std::fs::remove_dir_all(bag.root())?;
            info!(bag = %bag.name(), "removed source bag after split");
        }

        Ok(MultibagSeries {
            kind: SeriesKind::Split,
            members,
            plan,
        })
    }
}

/// Reject destinations that overlap the source bag.
///
/// Members written inside the source would be copied back into the head
/// bag along with the source's other tag directories.
fn check_destination(bag: &Bag, plan: &SplitPlan, dest_dir: &Path) -> Result<()> {
    let source = resolve(bag.root())?;
    let dest = resolve(dest_dir)?;
    if dest.starts_with(&source) {
        return Err(PreservError::Config(format!(
            "destination {} lies inside the source bag {}",
            dest_dir.display(),
            bag.root().display()
        )));
    }
    for member in &plan.members {
        if dest.join(&member.name) == source {
            return Err(PreservError::Config(format!(
                "member {} would overwrite the source bag; choose another destination",
                member.name
            )));
        }
    }
    Ok(())
}

/// Absolute form of `path` with its existing prefix canonicalized
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
    let mut resolved = existing.canonicalize()?;
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use preserv_core_manifest::{Algorithm, ManifestKind};
    use tempfile::tempdir;

    fn source_bag(dir: &Path) -> Bag {
        let bag = Bag::create(dir.join("ds.mbag0_4-0")).unwrap();
        for (name, size) in [("a.bin", 400), ("b.bin", 300), ("c.bin", 200)] {
            std::fs::write(bag.content_path(name), vec![b'x'; size]).unwrap();
        }
        std::fs::create_dir_all(bag.metadata_dir()).unwrap();
        std::fs::write(bag.metadata_dir().join("record.json"), b"{}\n").unwrap();
        bag
    }

    #[test]
    fn test_split_writes_members() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let out = dir.path().join("out");
        let splitter = Splitter::new(MultibagConfig::with_max_bag_size(500)).unwrap();

        let series = splitter.split(&bag, &out).unwrap();
        assert_eq!(series.kind, SeriesKind::Split);
        assert_eq!(series.len(), 3);
        let head = series.head().unwrap();
        assert_eq!(head.name(), "ds.mbag0_4-2");
        assert!(head.is_head_bag());
        assert!(head.record_file("").is_file());
        assert!(!series.members[0].metadata_dir().exists());

        let info = head.info().unwrap().tags;
        assert_eq!(info.first("Bag-Count"), Some("3 of 3"));
        assert_eq!(info.first("Multibag-Tag-Directory"), Some("multibag"));
        assert_eq!(info.first("Multibag-Head-Version"), Some("0.4"));
        assert!(bag.root().is_dir());
    }

    #[test]
    fn test_rerun_replaces_members() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let out = dir.path().join("out");
        let splitter = Splitter::new(MultibagConfig::with_max_bag_size(500)).unwrap();
        splitter.split(&bag, &out).unwrap();
        std::fs::write(out.join("ds.mbag0_4-0").join("stray.txt"), b"x").unwrap();

        let series = splitter.split(&bag, &out).unwrap();
        assert!(!series.members[0].root().join("stray.txt").exists());
        let manifest = series.members[0]
            .manifest(ManifestKind::Payload, Algorithm::Sha256)
            .unwrap()
            .unwrap();
        assert_eq!(manifest.entries.len(), 1);
    }

    #[test]
    fn test_split_into_source_parent_is_rejected() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let splitter = Splitter::new(MultibagConfig::with_max_bag_size(500)).unwrap();
        assert!(matches!(
            splitter.split(&bag, dir.path()),
            Err(PreservError::Config(_))
        ));
    }

    #[test]
    fn test_split_inside_source_is_rejected() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let config = MultibagConfig {
            replace: true,
            ..MultibagConfig::with_max_bag_size(500)
        };
        let splitter = Splitter::new(config).unwrap();
        let before = bag.tag_files().unwrap();

        for dest in [bag.root().join("split-out"), bag.root().to_path_buf()] {
            assert!(matches!(
                splitter.split(&bag, &dest),
                Err(PreservError::Config(_))
            ));
        }
        // Through a path that only reaches the source via `..`
        let roundabout = dir.path().join("elsewhere").join("..").join("ds.mbag0_4-0").join("out");
        std::fs::create_dir_all(dir.path().join("elsewhere")).unwrap();
        assert!(matches!(
            splitter.split(&bag, &roundabout),
            Err(PreservError::Config(_))
        ));

        assert!(!bag.root().join("split-out").exists());
        assert!(!bag.root().join("out").exists());
        assert_eq!(bag.tag_files().unwrap(), before);
    }

    #[test]
    fn test_replace_removes_source() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let config = MultibagConfig {
            replace: true,
            ..MultibagConfig::with_max_bag_size(500)
        };
        let series = Splitter::new(config)
            .unwrap()
            .split(&bag, &dir.path().join("out"))
            .unwrap();
        assert!(!bag.root().exists());
        assert!(series.head().unwrap().root().is_dir());
    }

    #[test]
    fn test_convert_small_in_place() {
        let dir = tempdir().unwrap();
        let bag = source_bag(dir.path());
        let config = MultibagConfig {
            convert_small: true,
            ..MultibagConfig::with_max_bag_size(10_000)
        };
        let series = Splitter::new(config)
            .unwrap()
            .split(&bag, &dir.path().join("out"))
            .unwrap();
        assert_eq!(series.kind, SeriesKind::Converted);
        assert_eq!(series.head(), Some(&bag));
        let index = bag.multibag_index().unwrap().unwrap();
        assert_eq!(index.members.members, vec!["ds.mbag0_4-0"]);
        assert_eq!(index.lookup.len(), 3);
        assert_eq!(bag.info().unwrap().tags.first("Bag-Count"), Some("1 of 1"));
        assert!(bag.root().join("manifest-sha256.txt").is_file());
        assert!(!dir.path().join("out").exists());
    }
}
