//! External collaborator interfaces.
//!
//! The orchestrator never inspects how detection happens: each engine is an
//! opaque callable that takes a temp file path and returns raw findings.
//! Likewise the ignore-list reconciler and the configuration read are
//! injected, not owned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::EngineKind;

/// Raw output of one engine invocation: a list of engine-specific JSON
/// detections. Empty list means a successful scan with zero findings, which
/// is distinct from an invocation error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScanOutput {
    pub detections: Vec<serde_json::Value>,
}

impl RawScanOutput {
    pub fn new(detections: Vec<serde_json::Value>) -> Self {
        Self { detections }
    }
}

/// One external detection engine.
///
/// Contract: deterministic for identical file content; locations are 0-based
/// line numbers consistent with editor addressing; failure is an `Err`, never
/// an empty result.
#[async_trait::async_trait]
pub trait DetectionEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Run detection against a temp snapshot. `ignore_file` is a materialized
    /// ignore list for engines that support allow/ignore files.
    async fn invoke(
        &self,
        temp_file: &Path,
        ignore_file: Option<&Path>,
    ) -> Result<RawScanOutput>;
}

/// One user-suppressed finding, keyed by the finding's stable identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoredEntry {
    pub identity: String,
    pub engine: EngineKind,
    /// 抑制原因（用户备注），原样保留
    #[serde(default)]
    pub reason: Option<String>,
}

/// Ignore-list reconciler, injected. Consulted before publishing (to suppress
/// ignored findings) and after each scan (to reconcile entries whose
/// underlying finding disappeared).
pub trait IgnoreReconciler: Send + Sync {
    /// Current suppressed entries, keyed by identity.
    fn ignored_entries(&self) -> HashMap<String, IgnoredEntry>;

    /// Write the ignore list to disk in the engine's native format, if any.
    fn materialize_ignore_file(&self) -> Option<PathBuf>;

    /// Record the original↔temp path pair for a scan, so the reconciler can
    /// map engine-reported temp paths back to real files.
    fn record_scanned_file(&self, original: &Path, temp: &Path);

    /// Reconcile after a scan: entries for `file` whose identity is no longer
    /// in `live_identities` refer to findings that moved or were fixed.
    fn reconcile(&self, file: &Path, live_identities: &[String]);
}

/// Reconciler for hosts without ignore-list support: nothing is ever
/// suppressed and nothing is materialized.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIgnoreReconciler;

impl IgnoreReconciler for NullIgnoreReconciler {
    fn ignored_entries(&self) -> HashMap<String, IgnoredEntry> {
        HashMap::new()
    }

    fn materialize_ignore_file(&self) -> Option<PathBuf> {
        None
    }

    fn record_scanned_file(&self, _original: &Path, _temp: &Path) {}

    fn reconcile(&self, _file: &Path, _live_identities: &[String]) {}
}

/// Configuration read for scanner activation. The registry re-queries this on
/// every configuration-change event.
pub trait ConfigProvider: Send + Sync {
    fn is_scanner_active(&self, kind: EngineKind) -> bool;
}
