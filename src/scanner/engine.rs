//! Refresh controller: the orchestration core.
//!
//! Every trigger runs one logical, non-interruptible pass: clear all
//! existing markers, rebuild the text model, compile the latest snapshot,
//! resolve matches, apply annotations. Two triggers exist: a store
//! change notification naming a relevant key, and an explicit refresh
//! request. A trigger arriving while a pass is in progress is never run
//! concurrently against the half-mutated document; it is deferred and
//! coalesced into a single follow-up pass using the latest snapshot, so the
//! document always converges on the last configuration applied.

use serde::Serialize;

use crate::config::{Config, ConfigKey};
use crate::dom::Document;
use crate::scanner::applier;
use crate::scanner::compiler::{compile, TermClass};
use crate::scanner::fragments::FragmentTable;
use crate::scanner::resolver::resolve;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Refreshing,
}

/// Statistics for one refresh pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RefreshStats {
    /// Markers removed by the clear phase.
    pub cleared: usize,
    pub full_matches: usize,
    pub last_matches: usize,
    pub keyword_matches: usize,
    /// Annotations materialized / skipped by the apply phase.
    pub applied: usize,
    pub skipped: usize,
    /// Length of the scanned logical buffer, in bytes.
    pub buffer_len: usize,
    /// False for a clear-only pass.
    pub enabled: bool,
}

/// Drives clear-then-rebuild passes over a host-owned document.
///
/// Single-threaded and synchronous: the host loads snapshots (storage reads,
/// CSV imports) on its own time and hands them over fully materialized.
/// The document is only ever read or mutated inside a pass.
pub struct RefreshEngine {
    config: Config,
    state: State,
    pending_refresh: bool,
    pending_config: Option<Config>,
    passes_run: u64,
    coalesced: u64,
}

impl Default for RefreshEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

// =============================================================================
// RefreshEngine
// =============================================================================

impl RefreshEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::Idle,
            pending_refresh: false,
            pending_config: None,
            passes_run: 0,
            coalesced: 0,
        }
    }

    /// The configuration snapshot the last pass used (or will use next).
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Total passes executed.
    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }

    /// Triggers deferred because a pass was in progress.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Store change notification. Runs a pass only when `changed_keys`
    /// names at least one key the engine cares about; returns `None` when
    /// the notification was irrelevant or the pass was deferred.
    pub fn config_changed(
        &mut self,
        changed_keys: &[&str],
        snapshot: Config,
        doc: &mut Document,
    ) -> Option<RefreshStats> {
        if !changed_keys.iter().any(|k| ConfigKey::parse(k).is_some()) {
            log::debug!("ignoring change notification for {changed_keys:?}");
            return None;
        }
        self.trigger(Some(snapshot), doc)
    }

    /// Explicit refresh request, using the current snapshot.
    pub fn refresh(&mut self, doc: &mut Document) -> Option<RefreshStats> {
        self.trigger(None, doc)
    }

    fn trigger(&mut self, snapshot: Option<Config>, doc: &mut Document) -> Option<RefreshStats> {
        if self.state == State::Refreshing {
            // Defer: the current pass must not be interrupted mid-mutation.
            // Only the latest snapshot survives coalescing.
            if let Some(snapshot) = snapshot {
                self.pending_config = Some(snapshot);
            }
            self.pending_refresh = true;
            self.coalesced += 1;
            log::debug!("refresh in progress; trigger deferred");
            return None;
        }
        if let Some(snapshot) = snapshot {
            self.config = snapshot;
        }
        self.state = State::Refreshing;
        let stats = self.run_pass(doc);
        Some(self.finish_pending(doc, stats))
    }

    /// Run coalesced follow-up passes (at most one per drain) and return to
    /// idle.
    fn finish_pending(&mut self, doc: &mut Document, mut stats: RefreshStats) -> RefreshStats {
        while self.pending_refresh {
            self.pending_refresh = false;
            if let Some(snapshot) = self.pending_config.take() {
                self.config = snapshot;
            }
            stats = self.run_pass(doc);
        }
        self.state = State::Idle;
        stats
    }

    /// One clear-then-rebuild pass.
    fn run_pass(&mut self, doc: &mut Document) -> RefreshStats {
        self.passes_run += 1;
        let mut stats = RefreshStats {
            cleared: applier::clear(doc),
            enabled: self.config.enabled,
            ..RefreshStats::default()
        };

        if !self.config.enabled {
            log::debug!("engine disabled; clear-only pass removed {} markers", stats.cleared);
            return stats;
        }

        let terms = match compile(&self.config) {
            Ok(terms) => terms,
            Err(e) => {
                // Contained: the document stays cleared until the next
                // snapshot compiles.
                log::error!("term compilation failed: {e}");
                return stats;
            }
        };

        let table = FragmentTable::build(doc);
        stats.buffer_len = table.buffer().len();
        let matches = resolve(&terms, table.buffer());
        for m in &matches {
            match m.class {
                TermClass::Full => stats.full_matches += 1,
                TermClass::Last => stats.last_matches += 1,
                TermClass::Keyword => stats.keyword_matches += 1,
            }
        }

        let outcome = applier::apply(doc, &table, &matches, &terms);
        stats.applied = outcome.applied;
        stats.skipped = outcome.skipped;
        log::debug!(
            "pass complete: cleared {}, applied {}, skipped {} over {} bytes",
            stats.cleared,
            stats.applied,
            stats.skipped,
            stats.buffer_len
        );
        stats
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
impl RefreshEngine {
    /// Pretend an external pass is mid-flight, so triggers defer.
    fn simulate_pass_in_progress(&mut self) {
        self.state = State::Refreshing;
    }

    /// Complete the pretend pass and drain whatever was deferred.
    fn complete_pass(&mut self, doc: &mut Document) -> RefreshStats {
        self.finish_pending(doc, RefreshStats::default())
    }
}
