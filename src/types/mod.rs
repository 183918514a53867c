pub mod finding;

pub use finding::{EngineKind, Finding, FindingRange, ScanDocument, Severity};
