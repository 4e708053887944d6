//! Package naming grammar
//!
//! `{aipid}.{version}.mbag{major}_{minor}-{sequence}[.{ext}]`, or the
//! unversioned `{aipid}.mbag{major}_{minor}-{sequence}[.{ext}]`. Versions use
//! underscores between numeric fields (`1_0_2`).

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn grammar() -> Option<&'static Regex> {
    static GRAMMAR: OnceLock<Option<Regex>> = OnceLock::new();
    GRAMMAR
        .get_or_init(|| {
            Regex::new(
            r"^(?P<aipid>[A-Za-z0-9][A-Za-z0-9_\-]*)\.(?:(?P<version>\d+(?:_\d+)*)\.)?mbag(?P<major>\d+)_(?P<minor>\d+)-(?P<seq>\d+)(?:\.(?P<ext>[A-Za-z0-9]+(?:\.[A-Za-z0-9]+)?))?$",
            )
            .ok()
        })
        .as_ref()
}

/// A parsed multibag package name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BagName {
    pub aipid: String,
    /// Underscore-delimited version, absent in the unversioned form
    pub version: Option<String>,
    pub profile_major: u32,
    pub profile_minor: u32,
    pub sequence: u64,
    /// Archive extension (`zip`, `7z`, ...) when naming a serialized file
    pub ext: Option<String>,
}

impl BagName {
    pub fn new(
        aipid: impl Into<String>,
        version: Option<&str>,
        profile: (u32, u32),
        sequence: u64,
    ) -> Self {
        Self {
            aipid: aipid.into(),
            version: version.map(|v| v.replace('.', "_")),
            profile_major: profile.0,
            profile_minor: profile.1,
            sequence,
            ext: None,
        }
    }

    /// Parse a name, with or without an archive extension
    pub fn parse(name: &str) -> Result<Self> {
        let caps = grammar()
            .ok_or_else(|| Error::Other("package name grammar failed to compile".to_string()))?
            .captures(name)
            .ok_or_else(|| Error::InvalidBagName(name.to_string()))?;
        let number = |key: &str| -> Result<u64> {
            caps.name(key)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .parse::<u64>()
                .map_err(|_| Error::InvalidBagName(name.to_string()))
        };
        let profile_major = u32::try_from(number("major")?)
            .map_err(|_| Error::InvalidBagName(name.to_string()))?;
        let profile_minor = u32::try_from(number("minor")?)
            .map_err(|_| Error::InvalidBagName(name.to_string()))?;
        Ok(Self {
            aipid: caps["aipid"].to_string(),
            version: caps.name("version").map(|m| m.as_str().to_string()),
            profile_major,
            profile_minor,
            sequence: number("seq")?,
            ext: caps.name("ext").map(|m| m.as_str().to_string()),
        })
    }

    pub fn is_versioned(&self) -> bool {
        self.version.is_some()
    }

    /// Dotted version string (`1.0.2`), if versioned
    pub fn dotted_version(&self) -> Option<String> {
        self.version.as_ref().map(|v| v.replace('_', "."))
    }

    /// Profile version as written in bag-info (`0.4`)
    pub fn profile_version(&self) -> String {
        format!("{}.{}", self.profile_major, self.profile_minor)
    }

    /// Same package, different sequence number, no extension
    pub fn with_sequence(&self, sequence: u64) -> Self {
        Self {
            sequence,
            ext: None,
            ..self.clone()
        }
    }

    pub fn with_ext(&self, ext: impl Into<String>) -> Self {
        Self {
            ext: Some(ext.into()),
            ..self.clone()
        }
    }

    /// Bag directory name (never includes the extension)
    pub fn bag_name(&self) -> String {
        match &self.version {
            Some(v) => format!(
                "{}.{}.mbag{}_{}-{}",
                self.aipid, v, self.profile_major, self.profile_minor, self.sequence
            ),
            None => format!(
                "{}.mbag{}_{}-{}",
                self.aipid, self.profile_major, self.profile_minor, self.sequence
            ),
        }
    }
}

impl fmt::Display for BagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bag_name())?;
        if let Some(ext) = &self.ext {
            write!(f, ".{}", ext)?;
        }
        Ok(())
    }
}

impl FromStr for BagName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BagName::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versioned() {
        let name = BagName::parse("mds2-2106.1_6_0.mbag0_4-3.zip").unwrap();
        assert_eq!(name.aipid, "mds2-2106");
        assert_eq!(name.version.as_deref(), Some("1_6_0"));
        assert_eq!(name.dotted_version().as_deref(), Some("1.6.0"));
        assert_eq!((name.profile_major, name.profile_minor), (0, 4));
        assert_eq!(name.sequence, 3);
        assert_eq!(name.ext.as_deref(), Some("zip"));
        assert_eq!(name.to_string(), "mds2-2106.1_6_0.mbag0_4-3.zip");
    }

    #[test]
    fn test_parse_unversioned() {
        let name = BagName::parse("ABCDEF0123.mbag1_2-0").unwrap();
        assert!(!name.is_versioned());
        assert_eq!(name.profile_version(), "1.2");
        assert_eq!(name.bag_name(), "ABCDEF0123.mbag1_2-0");
    }

    #[test]
    fn test_rejects_bad_names() {
        for bad in [
            "mds2-2106",
            "mds2-2106.1_0.mbag0_4",
            "mds2-2106.1_0.bag0_4-1",
            ".1_0.mbag0_4-1",
            "mds2.2106.1_0.mbag0_4-1",
            "mds2-2106.1.0.mbag0_4-1",
        ] {
            assert!(BagName::parse(bad).is_err(), "{} should not parse", bad);
        }
    }

    #[test]
    fn test_with_sequence_drops_ext() {
        let name = BagName::parse("pdr0-0001.2_0.mbag0_4-7.7z").unwrap();
        let next = name.with_sequence(8);
        assert_eq!(next.to_string(), "pdr0-0001.2_0.mbag0_4-8");
        assert_eq!(next.with_ext("zip").to_string(), "pdr0-0001.2_0.mbag0_4-8.zip");
    }

    #[test]
    fn test_new_normalizes_dotted_version() {
        let name = BagName::new("pdr0-0002", Some("1.0.1"), (0, 4), 0);
        assert_eq!(name.bag_name(), "pdr0-0002.1_0_1.mbag0_4-0");
    }
}
