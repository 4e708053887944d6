/*!
 * Descriptive records
 *
 * One JSON record per content path, stored at `metadata/<path>/record.json`,
 * plus the resource-level record at `metadata/record.json`. Unknown
 * properties are kept in a sorted map so that a read-modify-write cycle
 * reproduces the same bytes.
 */

use crate::error::{PreservError, Result};
use preserv_core_manifest::Algorithm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Node kind of a record in the metadata tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// The whole resource (path `""`)
    Resource,
    /// A directory in the content tree
    Subcollection,
    /// A file in the content tree
    DataFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: Algorithm,
    pub hash: String,
}

/// A descriptive record for the resource or one content path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveRecord {
    #[serde(rename = "@id")]
    pub id: String,

    pub kind: RecordKind,

    /// Content path, absent for the resource record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,

    #[serde(rename = "mediaType", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    #[serde(rename = "downloadURL", default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// Child paths one level below, sorted
    #[serde(rename = "hasMember", default, skip_serializing_if = "Vec::is_empty")]
    pub has_member: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DescriptiveRecord {
    pub fn resource(id: impl Into<String>) -> Self {
        Self::bare(id.into(), RecordKind::Resource, None)
    }

    pub fn subcollection(id: impl Into<String>, path: &str) -> Self {
        Self::bare(id.into(), RecordKind::Subcollection, Some(path.to_string()))
    }

    pub fn data_file(id: impl Into<String>, path: &str, size: u64, checksum: Checksum) -> Self {
        let mut record = Self::bare(id.into(), RecordKind::DataFile, Some(path.to_string()));
        record.size = Some(size);
        record.checksum = Some(checksum);
        record.media_type = Some(
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        );
        record
    }

    fn bare(id: String, kind: RecordKind, filepath: Option<String>) -> Self {
        Self {
            id,
            kind,
            filepath,
            size: None,
            checksum: None,
            media_type: None,
            download_url: None,
            has_member: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Content path this record describes (`""` for the resource)
    pub fn path(&self) -> &str {
        self.filepath.as_deref().unwrap_or("")
    }

    pub fn from_json(path: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PreservError::MalformedRecord {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut text = serde_json::to_string_pretty(self).map_err(|e| {
            PreservError::MalformedRecord {
                path: self.path().to_string(),
                message: e.to_string(),
            }
        })?;
        text.push('\n');
        Ok(text)
    }

    /// Deep-merge `patch` into a copy of this record.
    ///
    /// Identity fields (`@id`, `kind`, `filepath`) and the computed `size`
    /// and `checksum` keep their current values whatever the patch says.
    pub fn merged(&self, patch: &Value) -> Result<Self> {
        if !patch.is_object() {
            return Err(PreservError::MalformedRecord {
                path: self.path().to_string(),
                message: "update must be a JSON object".to_string(),
            });
        }
        let mut value = serde_json::to_value(self)?;
        deep_merge(&mut value, patch);

        let mut merged: DescriptiveRecord =
            serde_json::from_value(value).map_err(|e| PreservError::MalformedRecord {
                path: self.path().to_string(),
                message: e.to_string(),
            })?;
        merged.id = self.id.clone();
        merged.kind = self.kind;
        merged.filepath = self.filepath.clone();
        merged.size = self.size;
        merged.checksum = self.checksum.clone();
        Ok(merged)
    }
}

/// Merge `patch` into `target`: objects recurse, `null` removes the key,
/// anything else replaces.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    target.remove(key);
                    continue;
                }
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
