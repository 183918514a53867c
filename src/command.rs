//! Scanner command: activation lifecycle plus edit-triggered debounce.
//!
//! Each command wraps one scanner service with the Unregistered → Active →
//! Disabled state machine driven by configuration, and one of two debounce
//! strategies. Debounce timers are the cancellation mechanism for unstarted
//! work only: a newer edit bumps a generation counter and the stale sleep
//! task exits without scanning. In-flight scans are never cancelled; a late
//! completion is simply overwritten by the next one (last write wins).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::DebounceStrategyKind;
use crate::engine::ConfigProvider;
use crate::services::{EngineAdapter, ScannerService};
use crate::types::{Finding, ScanDocument};

/// Object-safe surface the registry composes. One implementation per engine
/// via `ScannerCommand<A>`; engines reach each other through the registry
/// lookup instead of importing each other directly.
pub trait ScannerHandle: Send + Sync {
    fn name(&self) -> &'static str;

    /// Re-evaluate activation from configuration. Never returns an error:
    /// failures on either path are logged and absorbed.
    fn register(&self);

    /// Deactivate and clear all per-file state. No-op when not registered.
    fn dispose(&self);

    fn is_active(&self) -> bool;

    fn document_changed(&self, doc: ScanDocument);

    fn file_renamed(&self, old: &Path, new_doc: ScanDocument);

    fn file_closed(&self, path: &Path);

    fn findings_for(&self, path: &Path) -> Vec<Finding>;
}

/// Debounce bookkeeping shared with the sleep tasks.
struct DebounceState {
    active: AtomicBool,
    /// Per-document generation counters (`PerDocument` strategy).
    per_doc: Mutex<HashMap<PathBuf, u64>>,
    /// Single shared generation counter (`Global` strategy).
    global_gen: AtomicU64,
    /// Most recently changed document (`Global` strategy scans only this).
    latest_doc: Mutex<Option<ScanDocument>>,
}

pub struct ScannerCommand<A: EngineAdapter> {
    service: Arc<ScannerService<A>>,
    config: Arc<dyn ConfigProvider>,
    strategy: DebounceStrategyKind,
    window: Duration,
    state: Arc<DebounceState>,
}

impl<A: EngineAdapter> ScannerCommand<A> {
    pub fn new(
        service: Arc<ScannerService<A>>,
        config: Arc<dyn ConfigProvider>,
        strategy: DebounceStrategyKind,
        window: Duration,
    ) -> Self {
        Self {
            service,
            config,
            strategy,
            window,
            state: Arc::new(DebounceState {
                active: AtomicBool::new(false),
                per_doc: Mutex::new(HashMap::new()),
                global_gen: AtomicU64::new(0),
                latest_doc: Mutex::new(None),
            }),
        }
    }

    pub fn service(&self) -> &Arc<ScannerService<A>> {
        &self.service
    }

    fn schedule_per_document(&self, doc: ScanDocument) {
        let generation = {
            let mut generations = self.state.per_doc.lock();
            let entry = generations.entry(doc.path.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let service = self.service.clone();
        let state = self.state.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if !state.active.load(Ordering::SeqCst) {
                return;
            }
            let current = state.per_doc.lock().get(&doc.path).copied().unwrap_or(0);
            if current != generation {
                // superseded by a later edit to this document
                return;
            }
            service.scan(&doc).await;
        });
    }

    fn schedule_global(&self, doc: ScanDocument) {
        *self.state.latest_doc.lock() = Some(doc);
        let generation = self.state.global_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let service = self.service.clone();
        let state = self.state.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if !state.active.load(Ordering::SeqCst) {
                return;
            }
            if state.global_gen.load(Ordering::SeqCst) != generation {
                // any edit to any document resets the shared timer
                return;
            }
            let latest = state.latest_doc.lock().clone();
            if let Some(doc) = latest {
                service.scan(&doc).await;
            }
        });
    }
}

impl<A: EngineAdapter> ScannerHandle for ScannerCommand<A> {
    fn name(&self) -> &'static str {
        self.service.kind().as_str()
    }

    fn register(&self) {
        if self.config.is_scanner_active(self.service.kind()) {
            if !self.state.active.swap(true, Ordering::SeqCst) {
                tracing::info!("Scanner '{}' activated", self.name());
                self.service.initialize();
            }
        } else {
            self.dispose();
        }
    }

    fn dispose(&self) {
        if self.state.active.swap(false, Ordering::SeqCst) {
            tracing::info!("Scanner '{}' deactivated", self.name());
            // discard all queued (unstarted) work
            self.state.per_doc.lock().clear();
            self.state.global_gen.fetch_add(1, Ordering::SeqCst);
            *self.state.latest_doc.lock() = None;
            self.service.clear_problems();
        }
    }

    fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    fn document_changed(&self, doc: ScanDocument) {
        if !self.is_active() {
            return;
        }
        // speculative gate: don't queue timers for files this engine will
        // never scan
        if !self.service.should_scan_file(&doc) {
            return;
        }
        match self.strategy {
            DebounceStrategyKind::PerDocument => self.schedule_per_document(doc),
            DebounceStrategyKind::Global => self.schedule_global(doc),
        }
    }

    fn file_renamed(&self, old: &Path, new_doc: ScanDocument) {
        self.service.rename_file(old);
        self.state.per_doc.lock().remove(old);
        // the new key is populated by a fresh debounced scan
        self.document_changed(new_doc);
    }

    fn file_closed(&self, path: &Path) {
        self.state.per_doc.lock().remove(path);
        self.service.remove_file(path);
    }

    fn findings_for(&self, path: &Path) -> Vec<Finding> {
        self.service.findings_for(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{DetectionEngine, NullIgnoreReconciler, RawScanOutput};
    use crate::registry::SharedEngineRegistry;
    use crate::services::adapters::{IacAdapter, SecretsAdapter};
    use crate::types::EngineKind;
    use std::sync::atomic::AtomicUsize;

    struct CountingEngine {
        scans: Arc<AtomicUsize>,
        last_path: Arc<Mutex<Option<PathBuf>>>,
    }

    #[async_trait::async_trait]
    impl DetectionEngine for CountingEngine {
        fn name(&self) -> &str {
            "counting"
        }

        async fn invoke(
            &self,
            temp_file: &Path,
            _ignore_file: Option<&Path>,
        ) -> anyhow::Result<RawScanOutput> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            *self.last_path.lock() = Some(temp_file.to_path_buf());
            Ok(RawScanOutput::default())
        }
    }

    struct AlwaysOn;
    impl ConfigProvider for AlwaysOn {
        fn is_scanner_active(&self, _kind: EngineKind) -> bool {
            true
        }
    }

    struct AlwaysOff;
    impl ConfigProvider for AlwaysOff {
        fn is_scanner_active(&self, _kind: EngineKind) -> bool {
            false
        }
    }

    fn iac_command(
        provider: Arc<dyn ConfigProvider>,
        strategy: DebounceStrategyKind,
        scans: Arc<AtomicUsize>,
    ) -> ScannerCommand<IacAdapter> {
        let service = ScannerService::new(
            IacAdapter::new(),
            Arc::new(CountingEngine {
                scans,
                last_path: Arc::new(Mutex::new(None)),
            }),
            Arc::new(NullIgnoreReconciler),
            Arc::new(SharedEngineRegistry::new()),
            Vec::new(),
        )
        .unwrap();
        ScannerCommand::new(
            Arc::new(service),
            provider,
            strategy,
            Duration::from_millis(1000),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_storm_collapses_to_one_scan() {
        let scans = Arc::new(AtomicUsize::new(0));
        let command = iac_command(
            Arc::new(AlwaysOn),
            DebounceStrategyKind::PerDocument,
            scans.clone(),
        );
        command.register();

        // 5 edits within 500ms against a 1000ms window
        for i in 0..5 {
            command.document_changed(ScanDocument::new(
                "/work/infra/main.tf",
                format!("resource {{}} # edit {}\n", i),
            ));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_document_timers_are_independent() {
        let scans = Arc::new(AtomicUsize::new(0));
        let command = iac_command(
            Arc::new(AlwaysOn),
            DebounceStrategyKind::PerDocument,
            scans.clone(),
        );
        command.register();

        command.document_changed(ScanDocument::new("/work/a/main.tf", "a\n"));
        command.document_changed(ScanDocument::new("/work/b/main.tf", "b\n"));
        tokio::time::sleep(Duration::from_millis(2000)).await;

        // an edit to A must not reset B's timer
        assert_eq!(scans.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_strategy_scans_only_latest_document() {
        let scans = Arc::new(AtomicUsize::new(0));
        let last_path = Arc::new(Mutex::new(None));
        let service = ScannerService::new(
            SecretsAdapter::new(),
            Arc::new(CountingEngine {
                scans: scans.clone(),
                last_path: last_path.clone(),
            }),
            Arc::new(NullIgnoreReconciler),
            Arc::new(SharedEngineRegistry::new()),
            Vec::new(),
        )
        .unwrap();
        let command = ScannerCommand::new(
            Arc::new(service),
            Arc::new(AlwaysOn),
            DebounceStrategyKind::Global,
            Duration::from_millis(1000),
        );
        command.register();

        command.document_changed(ScanDocument::new("/work/app/first.env", "A=1\n"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        command.document_changed(ScanDocument::new("/work/app/second.env", "B=2\n"));
        tokio::time::sleep(Duration::from_millis(2000)).await;

        // one timer shared across documents: a single scan, of the most
        // recently changed document
        assert_eq!(scans.load(Ordering::SeqCst), 1);
        let scanned = last_path.lock().clone().unwrap();
        assert!(scanned.to_string_lossy().contains("second.env"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_command_never_schedules() {
        let scans = Arc::new(AtomicUsize::new(0));
        let command = iac_command(
            Arc::new(AlwaysOff),
            DebounceStrategyKind::PerDocument,
            scans.clone(),
        );
        command.register();
        assert!(!command.is_active());

        command.document_changed(ScanDocument::new("/work/infra/main.tf", "resource {}\n"));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_discards_queued_work() {
        let scans = Arc::new(AtomicUsize::new(0));
        let command = iac_command(
            Arc::new(AlwaysOn),
            DebounceStrategyKind::PerDocument,
            scans.clone(),
        );
        command.register();
        command.document_changed(ScanDocument::new("/work/infra/main.tf", "resource {}\n"));
        command.dispose();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 0);

        // dispose when not registered is a no-op, not an error
        command.dispose();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reregister_after_dispose() {
        let scans = Arc::new(AtomicUsize::new(0));
        let command = iac_command(
            Arc::new(AlwaysOn),
            DebounceStrategyKind::PerDocument,
            scans.clone(),
        );
        command.register();
        command.dispose();
        command.register();
        assert!(command.is_active());

        command.document_changed(ScanDocument::new("/work/infra/main.tf", "resource {}\n"));
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(scans.load(Ordering::SeqCst), 1);
    }
}
