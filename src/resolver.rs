//! Cross-engine severity resolution at line granularity.
//!
//! When several engines flag the same source line, exactly one gutter icon
//! must render. The resolver computes the single highest-priority severity
//! across the already-published slots, and applies the engine-pair overlap
//! policy: most pairs merge severities, but Secrets is treated as
//! higher-confidence than StaticRules, so a Secrets finding suppresses a
//! StaticRules finding at the same line entirely.
//!
//! Pure and synchronous; never initiates a scan, only reads published state.

use std::path::Path;
use std::sync::Arc;

use crate::registry::SharedEngineRegistry;
use crate::types::{EngineKind, Severity};

/// What happens when two engines flag the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Severities merge via the total order; both findings stay queryable.
    Merge,
    /// The winner's finding suppresses the other engine's diagnostic and
    /// decoration at that line entirely.
    Suppress { winner: EngineKind },
}

/// Engine-pair policy table. Pairs are unordered; lookups check both
/// orientations. Anything absent defaults to `Merge`, so a new pair is one
/// table entry.
const OVERLAP_POLICIES: [((EngineKind, EngineKind), OverlapPolicy); 2] = [
    (
        (EngineKind::StaticRules, EngineKind::Secrets),
        OverlapPolicy::Suppress {
            winner: EngineKind::Secrets,
        },
    ),
    ((EngineKind::Iac, EngineKind::Containers), OverlapPolicy::Merge),
];

#[derive(Clone)]
pub struct SeverityResolver {
    registry: Arc<SharedEngineRegistry>,
}

impl SeverityResolver {
    pub fn new(registry: Arc<SharedEngineRegistry>) -> Self {
        Self { registry }
    }

    /// Policy for an unordered engine pair.
    pub fn policy_for(a: EngineKind, b: EngineKind) -> OverlapPolicy {
        for ((x, y), policy) in OVERLAP_POLICIES {
            if (x == a && y == b) || (x == b && y == a) {
                return policy;
            }
        }
        OverlapPolicy::Merge
    }

    /// Should `engine`'s finding at `path:line` be dropped from publication
    /// because a higher-confidence engine already published there?
    pub fn is_suppressed(&self, engine: EngineKind, path: &Path, line: u32) -> bool {
        for other in EngineKind::QUERY_ORDER {
            if other == engine {
                continue;
            }
            if let OverlapPolicy::Suppress { winner } = Self::policy_for(engine, other) {
                if winner == other && self.registry.has_finding_at(other, path, line) {
                    return true;
                }
            }
        }
        false
    }

    /// The single severity to render at `path:line`, given `own` as the
    /// querying engine's severity there. Every other engine's published
    /// severity at that exact line is folded in via the total order; ties
    /// resolve deterministically because engines are queried in a fixed
    /// order and the later-queried engine supplies the decoration type.
    pub fn resolve(
        &self,
        querying_engine: EngineKind,
        path: &Path,
        line: u32,
        own: Severity,
    ) -> Severity {
        let mut resolved = own;
        for other in EngineKind::QUERY_ORDER {
            if other == querying_engine {
                continue;
            }
            if let Some(severity) = self.registry.severity_at(other, path, line) {
                if severity > resolved {
                    resolved = severity;
                }
            }
        }
        resolved
    }
}
