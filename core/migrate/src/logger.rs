use anyhow::{Context, Result};
use chrono::Utc;
use nocturne_schemas::{MigrationKind, RecordId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Number of error samples shown in the operator summary
pub const SUMMARY_ERROR_SAMPLES: usize = 10;

/// Aggregate counters for one migration run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub entities: usize,
    pub relationships: usize,
    pub chapters: usize,
    pub total_memories: usize,
    pub total_paths: usize,
}

impl MigrationStats {
    fn increment(&mut self, kind: MigrationKind) {
        match kind {
            MigrationKind::Entity => self.entities += 1,
            MigrationKind::Relationship => self.relationships += 1,
            MigrationKind::Chapter => self.chapters += 1,
        }
        self.total_memories += 1;
        self.total_paths += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationLogEntry {
    #[serde(rename = "type")]
    pub kind: MigrationKind,
    #[serde(rename = "source")]
    pub source_id: String,
    pub target_path: String,
    pub memory_id: RecordId,
    pub timestamp: String, // RFC3339
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationErrorEntry {
    #[serde(rename = "type")]
    pub kind: MigrationKind,
    #[serde(rename = "source")]
    pub source_id: String,
    pub error: String,
    pub timestamp: String, // RFC3339
}

/// An item that was deliberately not attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSkipEntry {
    #[serde(rename = "type")]
    pub kind: MigrationKind,
    #[serde(rename = "source")]
    pub source_id: String,
    pub reason: String,
    pub timestamp: String, // RFC3339
}

/// Audit document written at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationAudit {
    pub stats: MigrationStats,
    pub entries: Vec<MigrationLogEntry>,
    pub errors: Vec<MigrationErrorEntry>,
    pub skipped: Vec<MigrationSkipEntry>,
    pub completed_at: String, // RFC3339
}

/// In-memory accumulator of migration outcomes.
///
/// Nothing is written anywhere until [`MigrationLogger::persist`].
#[derive(Debug, Clone, Default)]
pub struct MigrationLogger {
    stats: MigrationStats,
    entries: Vec<MigrationLogEntry>,
    errors: Vec<MigrationErrorEntry>,
    skipped: Vec<MigrationSkipEntry>,
}

impl MigrationLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(
        &mut self,
        kind: MigrationKind,
        source_id: &str,
        target_path: &str,
        record_id: RecordId,
    ) {
        self.entries.push(MigrationLogEntry {
            kind,
            source_id: source_id.to_string(),
            target_path: target_path.to_string(),
            memory_id: record_id,
            timestamp: Utc::now().to_rfc3339(),
        });
        self.stats.increment(kind);
    }

    pub fn record_failure(&mut self, kind: MigrationKind, source_id: &str, error_message: &str) {
        self.errors.push(MigrationErrorEntry {
            kind,
            source_id: source_id.to_string(),
            error: error_message.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn record_skip(&mut self, kind: MigrationKind, source_id: &str, reason: &str) {
        self.skipped.push(MigrationSkipEntry {
            kind,
            source_id: source_id.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
    }

    pub fn stats(&self) -> &MigrationStats {
        &self.stats
    }

    pub fn entries(&self) -> &[MigrationLogEntry] {
        &self.entries
    }

    pub fn errors(&self) -> &[MigrationErrorEntry] {
        &self.errors
    }

    pub fn skipped(&self) -> &[MigrationSkipEntry] {
        &self.skipped
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Snapshot of everything recorded so far, stamped with the current time
    pub fn audit(&self) -> MigrationAudit {
        MigrationAudit {
            stats: self.stats.clone(),
            entries: self.entries.clone(),
            errors: self.errors.clone(),
            skipped: self.skipped.clone(),
            completed_at: Utc::now().to_rfc3339(),
        }
    }

    /// Write the audit document as JSON, replacing any previous file
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.audit())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write migration log to {}", path.display()))?;

        info!("Migration log saved to: {}", path.display());
        Ok(())
    }

    /// Human-readable aggregate for the operator
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut lines = vec![
            rule.clone(),
            "MIGRATION SUMMARY".to_string(),
            rule.clone(),
            format!("Entities migrated:      {}", self.stats.entities),
            format!("Relationships migrated: {}", self.stats.relationships),
            format!("Chapters migrated:      {}", self.stats.chapters),
            format!("Total memories created: {}", self.stats.total_memories),
            format!("Total paths created:    {}", self.stats.total_paths),
            format!("Skipped:                {}", self.skipped.len()),
            format!("Errors:                 {}", self.errors.len()),
        ];

        if !self.errors.is_empty() {
            lines.push(String::new());
            lines.push("Errors:".to_string());
            for err in self.errors.iter().take(SUMMARY_ERROR_SAMPLES) {
                lines.push(format!("  - [{}] {}: {}", err.kind, err.source_id, err.error));
            }
            if self.errors.len() > SUMMARY_ERROR_SAMPLES {
                lines.push(format!(
                    "  ... and {} more errors",
                    self.errors.len() - SUMMARY_ERROR_SAMPLES
                ));
            }
        }

        lines.push(rule);
        lines.join("\n")
    }
}
