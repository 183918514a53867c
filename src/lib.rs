//! deskscan — editor-integrated security scan orchestration.
//!
//! Five independent detection engines (OSS dependencies, secrets, static
//! rules, infrastructure-as-code, container images) run debounced scans
//! against the files a developer is editing and publish findings into
//! per-engine registries. The orchestrator resolves overlapping findings
//! from different engines at the same source line into one coherent severity
//! signal, and keeps all per-file state consistent across edits, renames and
//! closes without unbounded growth.
//!
//! Detection itself is delegated to external engines behind
//! [`engine::DetectionEngine`]; this crate never inspects how detection
//! happens.

pub mod command;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod services;
pub mod types;
pub mod utils;
pub mod workspace;

pub use command::{ScannerCommand, ScannerHandle};
pub use config::{DebounceStrategyKind, EngineConfig, OrchestratorConfig, StaticConfigProvider};
pub use engine::{
    ConfigProvider, DetectionEngine, IgnoreReconciler, IgnoredEntry, NullIgnoreReconciler,
    RawScanOutput,
};
pub use errors::{ConfigError, EngineError, ScanError};
pub use registry::{ScannerRegistry, SharedEngineRegistry};
pub use resolver::{OverlapPolicy, SeverityResolver};
pub use services::adapters::{
    ContainersAdapter, IacAdapter, OssAdapter, SecretsAdapter, StaticRulesAdapter,
};
pub use services::{EngineAdapter, FileState, ScannerService};
pub use types::{EngineKind, Finding, FindingRange, ScanDocument, Severity};
pub use workspace::{TempSnapshot, TempWorkspace};
