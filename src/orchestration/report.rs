//! Outcome report of a publish run
//!
//! One entry per entity, in declaration order: the container first, then each
//! component as it appears in the publish file.

use serde::Serialize;
use std::fmt;

/// Entity an outcome entry refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntityRef {
    Container { name: String },
    Component { id: String },
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container { name } => write!(f, "container '{}'", name),
            Self::Component { id } => write!(f, "component '{}'", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Created,
    /// Metadata registered but at least one artifact upload failed
    CreatedWithWarnings,
    Failed,
    /// Not attempted because the run was cancelled
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::CreatedWithWarnings => "created with warnings",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            Self::Created => "✅",
            Self::CreatedWithWarnings => "⚠️ ",
            Self::Failed => "❌",
            Self::Skipped => "⏭️ ",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeEntry {
    pub entity: EntityRef,
    pub status: OutcomeStatus,
    /// Server message, error text or assigned id
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl OutcomeEntry {
    pub fn new(entity: EntityRef, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            entity,
            status,
            detail: detail.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        if !warnings.is_empty() && self.status == OutcomeStatus::Created {
            self.status = OutcomeStatus::CreatedWithWarnings;
        }
        self.warnings = warnings;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    entries: Vec<OutcomeEntry>,
    /// Set when the run stopped early because the container was not created
    fatal: bool,
}

impl OutcomeReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report of a run that stopped at the container step
    pub fn aborted(entry: OutcomeEntry) -> Self {
        Self {
            entries: vec![entry],
            fatal: true,
        }
    }

    pub fn push(&mut self, entry: OutcomeEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[OutcomeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn entry(&self, entity: &EntityRef) -> Option<&OutcomeEntry> {
        self.entries.iter().find(|e| &e.entity == entity)
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(OutcomeStatus::Failed) > 0
    }

    /// Process exit status: 0 on success, 1 when anything failed
    pub fn exit_code(&self) -> i32 {
        if self.fatal || self.has_failures() {
            1
        } else {
            0
        }
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();

        out.push_str(&format!("{}\n📊 Publish Summary\n{}\n", rule, rule));
        for entry in &self.entries {
            out.push_str(&format!(
                "{} {:<40} {}",
                entry.status.icon(),
                entry.entity.to_string(),
                entry.status
            ));
            if !entry.detail.is_empty() {
                out.push_str(&format!(": {}", entry.detail));
            }
            out.push('\n');
            for warning in &entry.warnings {
                out.push_str(&format!("     - {}\n", warning));
            }
        }

        out.push_str(&format!(
            "{}\n{} created, {} with warnings, {} failed, {} skipped\n",
            rule,
            self.count(OutcomeStatus::Created),
            self.count(OutcomeStatus::CreatedWithWarnings),
            self.count(OutcomeStatus::Failed),
            self.count(OutcomeStatus::Skipped),
        ));
        out.push_str(&format!(
            "Overall Status: {}\n",
            match (self.fatal, self.exit_code()) {
                (true, _) => "❌ ABORTED",
                (false, 0) => "✅ SUCCESS",
                _ => "❌ FAILED",
            }
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(id: &str) -> EntityRef {
        EntityRef::Component { id: id.to_string() }
    }

    #[test]
    fn test_warnings_downgrade_created() {
        let entry = OutcomeEntry::new(component("a"), OutcomeStatus::Created, "id=1")
            .with_warnings(vec!["logo.png: HTTP 413: too large".to_string()]);
        assert_eq!(entry.status, OutcomeStatus::CreatedWithWarnings);

        let entry =
            OutcomeEntry::new(component("a"), OutcomeStatus::Created, "").with_warnings(vec![]);
        assert_eq!(entry.status, OutcomeStatus::Created);
    }

    #[test]
    fn test_exit_code() {
        let mut report = OutcomeReport::new();
        report.push(OutcomeEntry::new(component("a"), OutcomeStatus::Created, ""));
        report.push(OutcomeEntry::new(component("b"), OutcomeStatus::Skipped, ""));
        assert_eq!(report.exit_code(), 0);

        report.push(OutcomeEntry::new(component("c"), OutcomeStatus::Failed, "HTTP 409"));
        assert_eq!(report.exit_code(), 1);
        assert!(report.has_failures());
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_aborted_is_fatal() {
        let report = OutcomeReport::aborted(OutcomeEntry::new(
            EntityRef::Container {
                name: "ndvi".to_string(),
            },
            OutcomeStatus::Failed,
            "HTTP 500: boom",
        ));

        assert!(report.is_fatal());
        assert_eq!(report.exit_code(), 1);
        assert!(report.render().contains("ABORTED"));
    }

    #[test]
    fn test_render_lists_entities_and_details() {
        let mut report = OutcomeReport::new();
        report.push(
            OutcomeEntry::new(
                EntityRef::Container {
                    name: "ndvi-tools".to_string(),
                },
                OutcomeStatus::Created,
                "id=c-1",
            )
            .with_warnings(vec!["run.sh: timeout".to_string()]),
        );
        report.push(OutcomeEntry::new(
            component("ndvi"),
            OutcomeStatus::Failed,
            "HTTP 409: Component 'ndvi' already exists",
        ));

        let text = report.render();
        assert!(text.contains("container 'ndvi-tools'"));
        assert!(text.contains("created with warnings: id=c-1"));
        assert!(text.contains("- run.sh: timeout"));
        assert!(text.contains("Component 'ndvi' already exists"));
        assert!(text.contains("0 created, 1 with warnings, 1 failed, 0 skipped"));
        assert!(text.contains("FAILED"));
    }

    #[test]
    fn test_entry_lookup() {
        let mut report = OutcomeReport::new();
        report.push(OutcomeEntry::new(component("a"), OutcomeStatus::Created, ""));

        assert!(report.entry(&component("a")).is_some());
        assert!(report.entry(&component("b")).is_none());
    }
}
