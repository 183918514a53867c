//! Temp workspace for per-scan file snapshots.
//!
//! Engines never read the live editor file: each scan writes the document's
//! current buffer text into an isolated temp file and hands the engine that
//! path. The snapshot keeps the original extension so engines that sniff file
//! type by name still work.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::errors::ScanError;
use crate::types::ScanDocument;

/// Owns the temp directory all snapshots live under. Dropping the workspace
/// removes the directory and anything left inside it.
#[derive(Debug)]
pub struct TempWorkspace {
    root: TempDir,
    counter: std::sync::atomic::AtomicU64,
}

impl TempWorkspace {
    pub fn new() -> Result<Self, ScanError> {
        let root = tempfile::Builder::new()
            .prefix("deskscan-")
            .tempdir()
            .map_err(|e| ScanError::io("creating temp workspace", e))?;
        Ok(Self {
            root,
            counter: std::sync::atomic::AtomicU64::new(0),
        })
    }

    /// Write a byte-for-byte snapshot of the document's buffer text.
    ///
    /// Each call gets a unique file name, so concurrent scans of the same
    /// document never collide on disk.
    pub fn snapshot(&self, doc: &ScanDocument) -> Result<TempSnapshot, ScanError> {
        let seq = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let file_name = doc
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());
        let path = self.root.path().join(format!("{}-{}", seq, file_name));

        let mut file = fs::File::create(&path)
            .map_err(|e| ScanError::io(format!("creating snapshot {}", path.display()), e))?;
        file.write_all(doc.text.as_bytes())
            .map_err(|e| ScanError::io(format!("writing snapshot {}", path.display()), e))?;
        file.flush()
            .map_err(|e| ScanError::io(format!("flushing snapshot {}", path.display()), e))?;

        Ok(TempSnapshot { path })
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }
}

/// RAII guard for one snapshot file. Deleted on drop, so the temp artifact
/// goes away on every exit path of a scan, success or failure.
#[derive(Debug)]
pub struct TempSnapshot {
    path: PathBuf,
}

impl TempSnapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSnapshot {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            // A rescan may already have removed the file. Not fatal.
            tracing::debug!("Failed to remove temp snapshot {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_buffer_text() {
        let workspace = TempWorkspace::new().unwrap();
        let doc = ScanDocument::new("/work/app/main.py", "import os\n");
        let snapshot = workspace.snapshot(&doc).unwrap();
        let content = fs::read_to_string(snapshot.path()).unwrap();
        assert_eq!(content, "import os\n");
        // original extension preserved for type-sniffing engines
        assert!(snapshot.path().to_string_lossy().ends_with("main.py"));
    }

    #[test]
    fn test_snapshot_removed_on_drop() {
        let workspace = TempWorkspace::new().unwrap();
        let doc = ScanDocument::new("/work/app/main.tf", "resource {}\n");
        let path = {
            let snapshot = workspace.snapshot(&doc).unwrap();
            snapshot.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_snapshots_do_not_collide() {
        let workspace = TempWorkspace::new().unwrap();
        let doc = ScanDocument::new("/work/app/package.json", "{}");
        let first = workspace.snapshot(&doc).unwrap();
        let second = workspace.snapshot(&doc).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_double_delete_is_swallowed() {
        let workspace = TempWorkspace::new().unwrap();
        let doc = ScanDocument::new("/work/app/main.py", "x = 1\n");
        let snapshot = workspace.snapshot(&doc).unwrap();
        fs::remove_file(snapshot.path()).unwrap();
        drop(snapshot); // must not panic
    }
}
