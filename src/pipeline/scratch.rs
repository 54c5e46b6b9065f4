// Scratch file handling for the processing pipeline

use log::warn;
use std::path::{Path, PathBuf};

/// Scoped scratch file for the provider staging upload.
///
/// Named by the caller (one name per meeting, so concurrent pipelines
/// never collide) and removed on drop on every exit path. Removal
/// failure is logged and otherwise ignored; it never changes the
/// pipeline outcome.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Write `bytes` to `dir/file_name`, creating the directory if needed
    pub fn create(dir: &Path, file_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove scratch file {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let dir = tempdir().unwrap();

        let path = {
            let scratch = ScratchFile::create(dir.path(), "meeting_1.mp3", b"audio").unwrap();
            assert!(scratch.path().exists());
            assert_eq!(std::fs::read(scratch.path()).unwrap(), b"audio");
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_create_makes_missing_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("scratch").join("audio");

        let scratch = ScratchFile::create(&nested, "meeting_2.mp3", b"x").unwrap();
        assert!(scratch.path().exists());
    }
}
