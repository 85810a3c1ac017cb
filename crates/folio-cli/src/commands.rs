//! Subcommand implementations

use anyhow::Context;
use folio_auth::{AuthState, RoleState, VIEWER_SESSION_KEY};
use folio_content::{DocumentPath, FieldMap, Revision, LAST_UPDATED_FIELD};
use folio_store::{FileCache, LocalCache, MemoryCache, MemoryContentStore, RemoteDocument};
use folio_sync::{ContentSyncEngine, LocalReplica, PushDecision, SyncConfig};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Validate configuration from the environment and print a summary
pub(crate) fn check_config() -> bool {
    match SyncConfig::from_env() {
        Ok(config) => {
            println!("configuration OK");
            for (var, value) in config.redacted_summary() {
                println!("  {var:<32} {value}");
            }
            true
        }
        Err(e) => {
            tracing::error!(variable = e.variable(), "configuration error: {e}");
            eprintln!("configuration error: {e}");
            false
        }
    }
}

/// Per-decision push counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReplaySummary {
    pub(crate) initialized: usize,
    pub(crate) notified: usize,
    pub(crate) suppressed: usize,
}

impl ReplaySummary {
    pub(crate) fn total(&self) -> usize {
        self.initialized + self.notified + self.suppressed
    }

    fn record(&mut self, decision: PushDecision) {
        match decision {
            PushDecision::Initialized => self.initialized += 1,
            PushDecision::Notify => self.notified += 1,
            PushDecision::Suppressed => self.suppressed += 1,
        }
    }
}

#[derive(Serialize)]
struct PushReport {
    line: usize,
    decision: &'static str,
    revision: Option<String>,
    fields: usize,
}

fn label(decision: PushDecision) -> &'static str {
    match decision {
        PushDecision::Initialized => "initialized",
        PushDecision::Notify => "notified",
        PushDecision::Suppressed => "suppressed",
    }
}

/// Replay a JSON-lines push log through a viewer engine
pub(crate) fn replay(file: &Path, json: bool, out: &mut dyn Write) -> anyhow::Result<ReplaySummary> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading push log {}", file.display()))?;
    replay_lines(&text, json, out)
}

fn replay_lines(text: &str, json: bool, out: &mut dyn Write) -> anyhow::Result<ReplaySummary> {
    let (_role, role_rx) = watch::channel(RoleState::settled(AuthState::signed_out()));
    let path: DocumentPath = "replay/content".parse()?;
    let engine = ContentSyncEngine::new(
        path,
        Arc::new(MemoryContentStore::new()),
        Arc::new(MemoryCache::new()),
        role_rx,
    );

    let mut summary = ReplaySummary::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: FieldMap = serde_json::from_str(line)
            .with_context(|| format!("line {}: expected a flat JSON object", idx + 1))?;
        let revision = fields
            .get(LAST_UPDATED_FIELD)
            .and_then(Revision::from_value)
            .map(|r| r.to_string());
        let field_count = fields.keys().filter(|k| *k != LAST_UPDATED_FIELD).count();

        let decision = engine.apply_push(&RemoteDocument::existing(fields));
        summary.record(decision);

        if json {
            let report = PushReport {
                line: idx + 1,
                decision: label(decision),
                revision,
                fields: field_count,
            };
            writeln!(out, "{}", serde_json::to_string(&report)?)?;
        } else {
            writeln!(
                out,
                "line {:>4}: {:<11} revision={} fields={}",
                idx + 1,
                label(decision),
                revision.as_deref().unwrap_or("-"),
                field_count
            )?;
        }
    }

    tracing::info!(
        pushes = summary.total(),
        final_fields = engine.read().len(),
        "replay finished"
    );
    Ok(summary)
}

/// Print (and optionally clear) the replica in a file cache
pub(crate) fn inspect_cache(path: &Path, clear: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let cache = Arc::new(
        FileCache::open(path).with_context(|| format!("opening cache {}", path.display()))?,
    );
    let replica = LocalReplica::new(cache.clone());

    let doc = replica.load();
    writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
    writeln!(
        out,
        "viewer session: {}",
        if cache.get_item(VIEWER_SESSION_KEY).is_some() {
            "active"
        } else {
            "inactive"
        }
    )?;

    if clear {
        let removed = replica.clear()?;
        writeln!(out, "cleared {removed} replicated fields")?;
    }
    Ok(())
}
