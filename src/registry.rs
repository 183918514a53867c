//! Shared engine registry and the composition root.
//!
//! `SharedEngineRegistry` is the only cross-engine shared state: a slot per
//! engine holding that engine's published diagnostics, decoration buckets and
//! hover lookups. Each engine writes only its own slot; the severity resolver
//! reads any slot. Read-mostly, so `DashMap` gives concurrent scans and hover
//! queries access without whole-map locking.
//!
//! `ScannerRegistry` composes the scanner commands: bulk activate/deactivate
//! with per-item isolation, name lookup, and the document-lifecycle fan-out
//! the editor host drives.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::command::ScannerHandle;
use crate::types::{EngineKind, Finding, FindingRange, ScanDocument, Severity};

/// Published state of one engine. Fully replaced per `(engine, file)` on each
/// scan; never patched incrementally.
#[derive(Debug, Default)]
pub struct EngineSlot {
    /// Published diagnostics per file.
    diagnostics: HashMap<PathBuf, Vec<Finding>>,
    /// Decoration ranges per file, bucketed by severity so one bucket can be
    /// swapped atomically per render call.
    decorations: HashMap<PathBuf, BTreeMap<Severity, Vec<FindingRange>>>,
    /// Hover lookup per file, keyed by line. Multiple findings on one line
    /// keep insertion order.
    hovers: HashMap<PathBuf, HashMap<u32, Vec<Finding>>>,
}

#[derive(Debug, Default)]
pub struct SharedEngineRegistry {
    slots: DashMap<EngineKind, EngineSlot>,
}

impl SharedEngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent slot creation, called from scanner init.
    pub fn ensure_slot(&self, kind: EngineKind) {
        self.slots.entry(kind).or_default();
    }

    /// Replace everything this engine published for `path` in one call.
    pub fn publish_file(
        &self,
        kind: EngineKind,
        path: &Path,
        diagnostics: Vec<Finding>,
        decorations: BTreeMap<Severity, Vec<FindingRange>>,
        hovers: HashMap<u32, Vec<Finding>>,
    ) {
        let mut slot = self.slots.entry(kind).or_default();
        slot.diagnostics.insert(path.to_path_buf(), diagnostics);
        slot.decorations.insert(path.to_path_buf(), decorations);
        slot.hovers.insert(path.to_path_buf(), hovers);
    }

    pub fn clear_file(&self, kind: EngineKind, path: &Path) {
        if let Some(mut slot) = self.slots.get_mut(&kind) {
            slot.diagnostics.remove(path);
            slot.decorations.remove(path);
            slot.hovers.remove(path);
        }
    }

    pub fn clear_engine(&self, kind: EngineKind) {
        if let Some(mut slot) = self.slots.get_mut(&kind) {
            slot.diagnostics.clear();
            slot.decorations.clear();
            slot.hovers.clear();
        }
    }

    /// Does `kind` have any published finding at this exact line?
    pub fn has_finding_at(&self, kind: EngineKind, path: &Path, line: u32) -> bool {
        self.slots
            .get(&kind)
            .and_then(|slot| {
                slot.hovers
                    .get(path)
                    .map(|lines| lines.get(&line).map_or(false, |f| !f.is_empty()))
            })
            .unwrap_or(false)
    }

    /// Highest severity `kind` published at this line, if any.
    pub fn severity_at(&self, kind: EngineKind, path: &Path, line: u32) -> Option<Severity> {
        self.slots.get(&kind).and_then(|slot| {
            slot.hovers
                .get(path)
                .and_then(|lines| lines.get(&line))
                .and_then(|findings| findings.iter().map(|f| f.severity).max())
        })
    }

    pub fn diagnostics_for(&self, kind: EngineKind, path: &Path) -> Vec<Finding> {
        self.slots
            .get(&kind)
            .and_then(|slot| slot.diagnostics.get(path).cloned())
            .unwrap_or_default()
    }

    pub fn decorations_for(
        &self,
        kind: EngineKind,
        path: &Path,
    ) -> BTreeMap<Severity, Vec<FindingRange>> {
        self.slots
            .get(&kind)
            .and_then(|slot| slot.decorations.get(path).cloned())
            .unwrap_or_default()
    }

    /// Hover payload at `path:line` for one engine.
    pub fn hover_at(&self, kind: EngineKind, path: &Path, line: u32) -> Vec<Finding> {
        self.slots
            .get(&kind)
            .and_then(|slot| {
                slot.hovers
                    .get(path)
                    .and_then(|lines| lines.get(&line).cloned())
            })
            .unwrap_or_default()
    }
}

/// Composition root over all scanner commands.
pub struct ScannerRegistry {
    /// Insertion-ordered so bulk activation is deterministic.
    order: Vec<String>,
    scanners: HashMap<String, Arc<dyn ScannerHandle>>,
}

impl ScannerRegistry {
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            scanners: HashMap::new(),
        }
    }

    pub fn add_scanner(&mut self, scanner: Arc<dyn ScannerHandle>) {
        let name = scanner.name().to_string();
        if self.scanners.insert(name.clone(), scanner).is_none() {
            self.order.push(name);
        }
    }

    /// Lookup by engine name. This indirection is how engines reach each
    /// other's public surface without importing each other directly.
    pub fn get_scanner(&self, name: &str) -> Option<Arc<dyn ScannerHandle>> {
        self.scanners.get(name).cloned()
    }

    pub fn scanner_names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Register every scanner. One scanner's failure must not block the
    /// others; `register()` catches its own errors, and a panic guard is not
    /// needed because nothing below it panics by contract.
    pub fn activate_all_scanners(&self) {
        for name in &self.order {
            if let Some(scanner) = self.scanners.get(name) {
                tracing::debug!("Activating scanner '{}'", name);
                scanner.register();
            }
        }
    }

    pub fn deactivate_all_scanners(&self) {
        for name in &self.order {
            if let Some(scanner) = self.scanners.get(name) {
                tracing::debug!("Deactivating scanner '{}'", name);
                scanner.dispose();
            }
        }
    }

    /// Re-evaluate activation for every scanner against current
    /// configuration. Called on each configuration-change event.
    pub fn configuration_changed(&self) {
        self.activate_all_scanners();
    }

    /// Edit-event fan-out: every active scanner gets a chance to debounce a
    /// scan of the changed document.
    pub fn notify_document_changed(&self, doc: &ScanDocument) {
        for name in &self.order {
            if let Some(scanner) = self.scanners.get(name) {
                scanner.document_changed(doc.clone());
            }
        }
    }

    /// Old key removed everywhere; the new key is populated only by the
    /// rescan each command schedules for the renamed document.
    pub fn notify_file_renamed(&self, old: &Path, new_doc: &ScanDocument) {
        for name in &self.order {
            if let Some(scanner) = self.scanners.get(name) {
                scanner.file_renamed(old, new_doc.clone());
            }
        }
    }

    pub fn notify_file_closed(&self, path: &Path) {
        for name in &self.order {
            if let Some(scanner) = self.scanners.get(name) {
                scanner.file_closed(path);
            }
        }
    }
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn finding_at(line: u32, severity: Severity) -> Finding {
        Finding {
            engine: EngineKind::Secrets,
            file_path: PathBuf::from("/work/app.py"),
            range: FindingRange::line(line, 0, 4),
            severity,
            title: "AWS key".to_string(),
            description: String::new(),
            identity: format!("aws-key:{}", line),
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_publish_then_query_line() {
        let registry = SharedEngineRegistry::new();
        let path = PathBuf::from("/work/app.py");
        let finding = finding_at(7, Severity::Critical);

        let mut hovers = HashMap::new();
        hovers.insert(7u32, vec![finding.clone()]);
        registry.publish_file(
            EngineKind::Secrets,
            &path,
            vec![finding],
            BTreeMap::new(),
            hovers,
        );

        assert!(registry.has_finding_at(EngineKind::Secrets, &path, 7));
        assert!(!registry.has_finding_at(EngineKind::Secrets, &path, 8));
        assert_eq!(
            registry.severity_at(EngineKind::Secrets, &path, 7),
            Some(Severity::Critical)
        );
        // other engines' slots are unaffected
        assert!(!registry.has_finding_at(EngineKind::Oss, &path, 7));
    }

    #[test]
    fn test_publish_replaces_wholesale() {
        let registry = SharedEngineRegistry::new();
        let path = PathBuf::from("/work/app.py");

        let mut hovers = HashMap::new();
        hovers.insert(3u32, vec![finding_at(3, Severity::High)]);
        registry.publish_file(
            EngineKind::Secrets,
            &path,
            vec![finding_at(3, Severity::High)],
            BTreeMap::new(),
            hovers,
        );

        registry.publish_file(
            EngineKind::Secrets,
            &path,
            Vec::new(),
            BTreeMap::new(),
            HashMap::new(),
        );
        assert!(!registry.has_finding_at(EngineKind::Secrets, &path, 3));
        assert!(registry.diagnostics_for(EngineKind::Secrets, &path).is_empty());
    }

    #[test]
    fn test_clear_file_and_engine() {
        let registry = SharedEngineRegistry::new();
        let path = PathBuf::from("/work/app.py");
        let mut hovers = HashMap::new();
        hovers.insert(1u32, vec![finding_at(1, Severity::Low)]);
        registry.publish_file(
            EngineKind::Secrets,
            &path,
            vec![finding_at(1, Severity::Low)],
            BTreeMap::new(),
            hovers,
        );

        registry.clear_file(EngineKind::Secrets, &path);
        assert!(registry.diagnostics_for(EngineKind::Secrets, &path).is_empty());
    }
}
