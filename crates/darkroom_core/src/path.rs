//! Relative storage paths.

use darkroom_error::{StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A relative location under the media root.
///
/// Always `/`-separated, never absolute, never empty, and free of empty,
/// `.` and `..` segments. Comparison is byte-wise, so the index treats
/// `a/B.jpg` and `a/b.jpg` as different paths.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display,
)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath(String);

impl StoragePath {
    /// Validate and wrap a relative path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if the path is empty, absolute, or contains an
    /// empty, `.` or `..` segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use darkroom_core::StoragePath;
    ///
    /// assert!(StoragePath::new("2024/Trip/IMG_0001.jpg").is_ok());
    /// assert!(StoragePath::new("/etc/passwd").is_err());
    /// assert!(StoragePath::new("a/../b").is_err());
    /// ```
    pub fn new(path: impl Into<String>) -> Result<Self, StorageError> {
        let path = path.into();
        if path.is_empty() || path.starts_with('/') || path.contains('\\') {
            return Err(StorageError::new(StorageErrorKind::InvalidPath(path)));
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(StorageError::new(StorageErrorKind::InvalidPath(path)));
        }
        Ok(Self(path))
    }

    /// Assemble a path from segments, replacing every empty, `.` or `..`
    /// segment (and an empty list) with `filler`.
    ///
    /// Never fails: a `filler` that is itself unusable degrades to `_`.
    pub fn from_segments<I, S>(segments: I, filler: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let usable = |s: &str| !(s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\']));
        let filler = if usable(filler) { filler } else { "_" };

        let parts: Vec<String> = segments
            .into_iter()
            .map(|s| {
                let s = s.as_ref();
                if usable(s) { s.to_string() } else { filler.to_string() }
            })
            .collect();

        if parts.is_empty() {
            Self(filler.to_string())
        } else {
            Self(parts.join("/"))
        }
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The final segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The directory part, or `None` for a top-level file.
    pub fn parent(&self) -> Option<&str> {
        self.0.rfind('/').map(|idx| &self.0[..idx])
    }

    /// Derive the `n`-th collision variant by inserting `_n` before the
    /// extension of the final segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use darkroom_core::StoragePath;
    ///
    /// let path = StoragePath::new("2024/Trip/IMG_0001.jpg").unwrap();
    /// assert_eq!(path.with_suffix(2).as_str(), "2024/Trip/IMG_0001_2.jpg");
    ///
    /// let bare = StoragePath::new("2024/README").unwrap();
    /// assert_eq!(bare.with_suffix(1).as_str(), "2024/README_1");
    /// ```
    pub fn with_suffix(&self, n: u32) -> Self {
        let name = self.file_name();
        let renamed = match name.rfind('.') {
            Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], n, &name[dot..]),
            _ => format!("{}_{}", name, n),
        };
        match self.parent() {
            Some(parent) => Self(format!("{}/{}", parent, renamed)),
            None => Self(renamed),
        }
    }

    /// Absolute location of this path under `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl TryFrom<String> for StoragePath {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for StoragePath {
    type Error = StorageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoragePath> for String {
    fn from(value: StoragePath) -> Self {
        value.0
    }
}

impl AsRef<str> for StoragePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_degenerate_paths() {
        for bad in ["", "/abs", "a//b", "a/./b", "../up", "trailing/", "win\\path"] {
            assert!(StoragePath::new(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_suffix_uses_last_extension_only() {
        let path = StoragePath::new("backup.tar.gz").unwrap();
        assert_eq!(path.with_suffix(3).as_str(), "backup.tar_3.gz");
    }

    #[test]
    fn test_suffix_on_dotfile_appends() {
        let path = StoragePath::new("x/.hidden").unwrap();
        assert_eq!(path.with_suffix(1).as_str(), "x/.hidden_1");
    }

    #[test]
    fn test_from_segments_fills_holes() {
        let path = StoragePath::from_segments(["2024", "", "..", "a.jpg"], "Unknown");
        assert_eq!(path.as_str(), "2024/Unknown/Unknown/a.jpg");

        let empty = StoragePath::from_segments(Vec::<String>::new(), "..");
        assert_eq!(empty.as_str(), "_");
    }

    #[test]
    fn test_under_joins_segments() {
        let path = StoragePath::new("2024/a.jpg").unwrap();
        let root = Path::new("/library");
        assert_eq!(path.under(root), PathBuf::from("/library/2024/a.jpg"));
    }
}
