//! Path helpers: joining/extension utilities plus a scratch directory that
//! removes itself on drop.

use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Extension helpers for anything that derefs to a [`Path`].
pub trait PathExt {
    fn with_added_extension(&self, ext: &str) -> PathBuf;
    fn is_hidden(&self) -> bool;
}

impl<P: AsRef<Path>> PathExt for P {
    fn with_added_extension(&self, ext: &str) -> PathBuf {
        let path = self.as_ref();
        match path.extension() {
            Some(existing) => path.with_extension(format!(
                "{}.{ext}",
                existing.to_string_lossy()
            )),
            None => path.with_extension(ext),
        }
    }

    fn is_hidden(&self) -> bool {
        self.as_ref()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }
}

/// A directory under [`std::env::temp_dir`] that is created on construction
/// and recursively removed when dropped.
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn create(name: &str) -> Result<Self, CoreError> {
        let root = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&root)
            .map_err(|e| CoreError::system("create_dir_all", e))?;
        Ok(ScratchDir { root })
    }

    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }
}

impl Deref for ScratchDir {
    type Target = Path;
    fn deref(&self) -> &Path {
        &self.root
    }
}

impl fmt::Debug for ScratchDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScratchDir({})", self.root.display())
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_extension_preserves_existing() {
        let p = Path::new("archive.tar");
        assert_eq!(p.with_added_extension("gz"), PathBuf::from("archive.tar.gz"));
    }

    #[test]
    fn hidden_files_detected() {
        assert!(Path::new(".env").is_hidden());
        assert!(!Path::new("env").is_hidden());
    }

    #[test]
    fn scratch_dir_removes_itself() {
        let dir = ScratchDir::create("waitcore-test-scratch").expect("create scratch dir");
        let path = dir.join("file.txt");
        std::fs::write(&path, b"x").unwrap();
        assert!(path.exists());
        let root = dir.to_path_buf();
        drop(dir);
        assert!(!root.exists());
    }
}
