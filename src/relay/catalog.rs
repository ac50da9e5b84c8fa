//! Catalog of named workflow definitions.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::relay::workflow::{StepAction, WorkflowDefinition, WorkflowStep};

/// Lookup table of workflows keyed by name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCatalog {
    workflows: HashMap<String, WorkflowDefinition>,
}

impl WorkflowCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the stock workflows.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_workflow(content_review())
            .with_workflow(daily_digest())
            .with_workflow(release_pipeline())
    }

    /// Add or replace a workflow, keyed by its name.
    #[must_use]
    pub fn with_workflow(mut self, workflow: WorkflowDefinition) -> Self {
        self.workflows.insert(workflow.name.clone(), workflow);
        self
    }

    /// Merge workflow definitions from `*.json` files under `dir`.
    ///
    /// Each file holds one definition and is keyed by the `name` field
    /// inside the file, not by the file name, so a file can replace a
    /// stock workflow. Unreadable or malformed files are skipped with a
    /// warning. A missing directory leaves the catalog unchanged.
    #[must_use]
    pub fn load_dir(mut self, dir: &Path) -> Self {
        let Ok(entries) = std::fs::read_dir(dir) else {
            debug!("no workflow directory at {}", dir.display());
            return self;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("cannot read workflow file {}: {e}", path.display());
                    continue;
                }
            };
            match serde_json::from_str::<WorkflowDefinition>(&text) {
                Ok(workflow) => {
                    debug!("loaded workflow '{}' from {}", workflow.name, path.display());
                    self.workflows.insert(workflow.name.clone(), workflow);
                }
                Err(e) => warn!("skipping malformed workflow file {}: {e}", path.display()),
            }
        }
        self
    }

    /// Look up a workflow by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.get(name)
    }

    /// Returns `true` when the named workflow exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// Workflow names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.workflows.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn content_review() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "content_review",
        vec!["moderator".to_owned(), "editor".to_owned()],
        vec![
            WorkflowStep::new(
                "Pull the next submission from the review queue",
                "moderator",
                StepAction::Command {
                    command: "ingest --queue submissions".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Review the submission against the content policy",
                "moderator",
                StepAction::CompletionPattern {
                    pattern: "review_content".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Editor signs off on the verdict",
                "editor",
                StepAction::Manual,
            ),
        ],
    )
}

fn daily_digest() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "daily_digest",
        vec!["analyst".to_owned(), "publisher".to_owned()],
        vec![
            WorkflowStep::new(
                "Collect updates since the last digest",
                "analyst",
                StepAction::Command {
                    command: "collect --since yesterday".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Summarize the collected updates",
                "analyst",
                StepAction::CompletionPattern {
                    pattern: "summarize".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Publish the digest",
                "publisher",
                StepAction::Command {
                    command: "publish --channel digest".to_owned(),
                },
            ),
        ],
    )
}

fn release_pipeline() -> WorkflowDefinition {
    WorkflowDefinition::new(
        "release_pipeline",
        vec!["builder".to_owned(), "announcer".to_owned()],
        vec![
            WorkflowStep::new(
                "Build the release artifacts",
                "builder",
                StepAction::Command {
                    command: "build --profile release".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Release manager approves the build",
                "builder",
                StepAction::Manual,
            ),
            WorkflowStep::new(
                "Draft the release announcement",
                "announcer",
                StepAction::CompletionPattern {
                    pattern: "draft_announcement".to_owned(),
                },
            ),
            WorkflowStep::new(
                "Queue the next digest cycle",
                "announcer",
                StepAction::SubWorkflow {
                    workflow: "daily_digest".to_owned(),
                },
            ),
        ],
    )
    .with_chain_recording()
}
