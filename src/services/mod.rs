//! Per-engine scanner services.
//!
//! One generic `ScannerService` drives the whole scan path — gate, temp
//! snapshot, engine invocation, finding normalization, publication — while
//! five small adapters supply only what actually differs per engine: file
//! patterns, identity derivation and the raw-JSON mapping.

pub mod adapters;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::GlobSet;
use parking_lot::RwLock;

use crate::engine::{DetectionEngine, IgnoreReconciler, RawScanOutput};
use crate::errors::{EngineError, ScanError};
use crate::registry::SharedEngineRegistry;
use crate::resolver::SeverityResolver;
use crate::types::{EngineKind, Finding, FindingRange, ScanDocument, Severity};
use crate::utils::paths::{is_in_excluded_dir, normalize_for_match};
use crate::workspace::TempWorkspace;

/// The engine-specific part of a scanner service: supported file patterns
/// and the mapping from raw engine JSON to the shared finding model.
/// Everything else is generic.
pub trait EngineAdapter: Send + Sync + 'static {
    fn kind(&self) -> EngineKind;

    /// Glob patterns over normalized (forward-slash, lowercase) paths.
    fn file_patterns(&self) -> &GlobSet;

    /// Whether the external engine accepts a materialized ignore file.
    fn supports_ignore_file(&self) -> bool {
        false
    }

    /// Pure transform from raw engine output to findings. Locations in the
    /// returned findings refer to `original`, never to the temp snapshot.
    fn parse_findings(
        &self,
        raw: &RawScanOutput,
        original: &Path,
    ) -> Result<Vec<Finding>, EngineError>;
}

/// Current state for one `(engine, file)` key. Fully replaced per scan,
/// never patched incrementally.
#[derive(Debug, Clone, Default)]
pub struct FileState {
    /// All current (non-ignored) findings for this engine on this file.
    pub findings: Vec<Finding>,
    /// Decoration ranges bucketed by resolved severity; each bucket is
    /// swapped wholesale on render.
    pub decorations: BTreeMap<Severity, Vec<FindingRange>>,
    /// Hover lookup keyed by line.
    pub hovers: HashMap<u32, Vec<Finding>>,
}

pub struct ScannerService<A: EngineAdapter> {
    adapter: A,
    engine: Arc<dyn DetectionEngine>,
    reconciler: Arc<dyn IgnoreReconciler>,
    shared: Arc<SharedEngineRegistry>,
    resolver: SeverityResolver,
    workspace: TempWorkspace,
    extra_excluded_dirs: Vec<String>,
    files: RwLock<HashMap<PathBuf, FileState>>,
}

impl<A: EngineAdapter> ScannerService<A> {
    pub fn new(
        adapter: A,
        engine: Arc<dyn DetectionEngine>,
        reconciler: Arc<dyn IgnoreReconciler>,
        shared: Arc<SharedEngineRegistry>,
        extra_excluded_dirs: Vec<String>,
    ) -> Result<Self, ScanError> {
        let resolver = SeverityResolver::new(shared.clone());
        let workspace = TempWorkspace::new()?;
        Ok(Self {
            adapter,
            engine,
            reconciler,
            shared,
            resolver,
            workspace,
            extra_excluded_dirs,
            files: RwLock::new(HashMap::new()),
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.adapter.kind()
    }

    /// Engine-specific setup run once per activation: claims this engine's
    /// slot in the shared registry so hover queries resolve immediately.
    pub fn initialize(&self) {
        self.shared.ensure_slot(self.kind());
    }

    /// Cheap synchronous gate. Pure: safe to call speculatively before
    /// scheduling a debounced scan.
    pub fn should_scan_file(&self, doc: &ScanDocument) -> bool {
        // virtual/untitled buffers arrive without a real file path
        if !doc.path.is_absolute() || doc.path.file_name().is_none() {
            return false;
        }
        if is_in_excluded_dir(&doc.path, &self.extra_excluded_dirs) {
            return false;
        }
        self.adapter
            .file_patterns()
            .is_match(normalize_for_match(&doc.path))
    }

    /// Run one scan of `doc`. All failures are absorbed here: an engine or
    /// I/O failure clears this file's state for this engine — stale findings
    /// are worse than none, they can show a fixed vulnerability as present.
    pub async fn scan(&self, doc: &ScanDocument) {
        if !self.should_scan_file(doc) {
            return;
        }
        tracing::debug!("{} scanning {}", self.kind(), doc.path.display());
        if let Err(e) = self.scan_inner(doc).await {
            tracing::warn!(
                "{} scan of {} failed, clearing findings: {}",
                self.kind(),
                doc.path.display(),
                e
            );
            self.remove_file(&doc.path);
        }
    }

    /// The fallible part of a scan. The snapshot guard deletes the temp
    /// artifact on every exit path of this function.
    async fn scan_inner(&self, doc: &ScanDocument) -> Result<(), ScanError> {
        let snapshot = self.workspace.snapshot(doc)?;
        self.reconciler.record_scanned_file(&doc.path, snapshot.path());

        let ignore_file = if self.adapter.supports_ignore_file() {
            self.reconciler.materialize_ignore_file()
        } else {
            None
        };

        let raw = self
            .engine
            .invoke(snapshot.path(), ignore_file.as_deref())
            .await
            .map_err(|e| EngineError::Invocation(e.to_string()))?;

        self.update_problems(&raw, &doc.path)
    }

    /// Transform raw engine output and swap in the new per-file state.
    ///
    /// Idempotent: the same raw input always produces the same published
    /// diagnostics, decorations and hovers. Old diagnostics for the file are
    /// dropped wholesale; suppression and severity resolution are applied
    /// against sibling engines' already-published slots before anything is
    /// published.
    pub fn update_problems(&self, raw: &RawScanOutput, path: &Path) -> Result<(), ScanError> {
        let kind = self.kind();
        let mut findings = self.adapter.parse_findings(raw, path)?;

        // drop findings the user suppressed, by stable identity
        let ignored = self.reconciler.ignored_entries();
        findings.retain(|f| {
            !ignored
                .get(&f.identity)
                .map_or(false, |entry| entry.engine == kind)
        });

        let live_identities: Vec<String> =
            findings.iter().map(|f| f.identity.clone()).collect();
        self.reconciler.reconcile(path, &live_identities);

        // cross-engine suppression: a higher-confidence sibling at the same
        // line removes this engine's diagnostic and decoration entirely
        let published: Vec<Finding> = findings
            .iter()
            .filter(|f| !self.resolver.is_suppressed(kind, path, f.range.start_line))
            .cloned()
            .collect();

        let mut hovers: HashMap<u32, Vec<Finding>> = HashMap::new();
        for finding in &published {
            hovers
                .entry(finding.range.start_line)
                .or_default()
                .push(finding.clone());
        }

        // one decoration per line, bucketed by the cross-engine resolved
        // severity so two engines never render conflicting gutter icons
        let mut decorations: BTreeMap<Severity, Vec<FindingRange>> = BTreeMap::new();
        for (line, line_findings) in &hovers {
            let own = line_findings
                .iter()
                .map(|f| f.severity)
                .max()
                .unwrap_or_default();
            let resolved = self.resolver.resolve(kind, path, *line, own);
            let range = line_findings[0].range;
            decorations.entry(resolved).or_default().push(range);
        }
        for bucket in decorations.values_mut() {
            bucket.sort_by_key(|r| (r.start_line, r.start_col));
        }

        let state = FileState {
            findings,
            decorations: decorations.clone(),
            hovers: hovers.clone(),
        };
        self.files.write().insert(path.to_path_buf(), state);
        self.shared
            .publish_file(kind, path, published, decorations, hovers);
        Ok(())
    }

    /// Drop all per-file state for this engine (engine disabled via
    /// configuration, or disposed).
    pub fn clear_problems(&self) {
        self.files.write().clear();
        self.shared.clear_engine(self.kind());
    }

    /// Drop one file's state (file closed/deleted, or scan failure).
    pub fn remove_file(&self, path: &Path) {
        self.files.write().remove(path);
        self.shared.clear_file(self.kind(), path);
    }

    /// Rename: the old key is removed immediately; the new key is populated
    /// only by the rescan the command schedules for the renamed document.
    pub fn rename_file(&self, old: &Path) {
        self.remove_file(old);
    }

    pub fn findings_for(&self, path: &Path) -> Vec<Finding> {
        self.files
            .read()
            .get(path)
            .map(|s| s.findings.clone())
            .unwrap_or_default()
    }

    pub fn file_state(&self, path: &Path) -> Option<FileState> {
        self.files.read().get(path).cloned()
    }

    pub fn tracked_files(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }
}
