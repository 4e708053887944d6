//! Lazy depth-first enumeration of a bag's content tree

use crate::core::link::is_staging_name;
use crate::core::paths::to_posix;
use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One regular file under `data/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFile {
    /// Path relative to `data/`
    pub path: String,
    pub size: u64,
}

impl ContentFile {
    /// Path relative to the bag root, as written in manifests
    pub fn bag_path(&self) -> String {
        format!("{}/{}", super::DATA_DIR, self.path)
    }
}

/// Iterator over content files in depth-first, name-sorted order.
///
/// Each call to [`crate::Bag::content_files`] starts a fresh walk, so the
/// sequence can be restarted at will; nothing is buffered up front.
pub struct ContentFiles {
    base: PathBuf,
    walker: Option<walkdir::IntoIter>,
}

impl ContentFiles {
    pub(crate) fn new(data_dir: &Path) -> Self {
        let walker = data_dir.is_dir().then(|| {
            WalkDir::new(data_dir)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
        });
        Self {
            base: data_dir.to_path_buf(),
            walker,
        }
    }
}

impl Iterator for ContentFiles {
    type Item = Result<ContentFile>;

    fn next(&mut self) -> Option<Self::Item> {
        let walker = self.walker.as_mut()?;
        loop {
            let entry = match walker.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_str()
                .is_some_and(is_staging_name)
            {
                continue;
            }

            let rel = match entry.path().strip_prefix(&self.base) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let item = to_posix(rel).and_then(|path| {
                let size = entry.metadata()?.len();
                Ok(ContentFile { path, size })
            });
            return Some(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_depth_first_sorted_order() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("b/inner")).unwrap();
        std::fs::create_dir_all(data.join("a")).unwrap();
        std::fs::write(data.join("z.txt"), b"zz").unwrap();
        std::fs::write(data.join("b/inner/x.bin"), b"x").unwrap();
        std::fs::write(data.join("b/c.txt"), b"ccc").unwrap();
        std::fs::write(data.join("a/1.txt"), b"1").unwrap();
        std::fs::write(data.join("a/.1.txt.preserv-partial"), b"1").unwrap();

        let files: Vec<ContentFile> = ContentFiles::new(&data).map(|f| f.unwrap()).collect();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a/1.txt", "b/c.txt", "b/inner/x.bin", "z.txt"]);
        assert_eq!(files[1].size, 3);
        assert_eq!(files[3].bag_path(), "data/z.txt");
    }

    #[test]
    fn test_missing_data_dir_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(ContentFiles::new(&dir.path().join("data")).count(), 0);
    }
}
