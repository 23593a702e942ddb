// ABOUTME: Schema-on-read record for CRS document content
// ABOUTME: Every section is optional so partially drafted documents still deserialize

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single functional requirement entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionalRequirement {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub actor: Option<String>,
    pub acceptance_criteria: Vec<String>,
}

/// Technology choices captured during discovery
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnologyStack {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub database: Vec<String>,
    pub other: Vec<String>,
}

impl TechnologyStack {
    pub fn is_empty(&self) -> bool {
        self.frontend.is_empty()
            && self.backend.is_empty()
            && self.database.is_empty()
            && self.other.is_empty()
    }
}

/// Structured CRS content.
///
/// The synchronization core never reads these fields; patching and diffing work
/// on plain JSON so new sections need no core changes. Unknown sections are
/// kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrsContent {
    pub project_title: Option<String>,
    pub project_description: Option<String>,
    pub project_objectives: Vec<String>,
    pub target_users: Vec<String>,
    pub stakeholders: Vec<String>,
    pub functional_requirements: Vec<FunctionalRequirement>,
    pub non_functional_requirements: Vec<String>,
    pub technology_stack: Option<TechnologyStack>,
    pub integrations: Vec<String>,
    pub constraints: Vec<String>,
    pub assumptions: Vec<String>,
    pub risks: Vec<String>,
    pub success_metrics: Vec<String>,
    pub budget_constraints: Option<String>,
    pub timeline_constraints: Option<String>,
    pub out_of_scope: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CrsContent {
    /// Names of the known sections that currently hold something
    pub fn filled_sections(&self) -> Vec<&'static str> {
        let text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let checks: [(&'static str, bool); 16] = [
            ("project_title", text(&self.project_title)),
            ("project_description", text(&self.project_description)),
            ("project_objectives", !self.project_objectives.is_empty()),
            ("target_users", !self.target_users.is_empty()),
            ("stakeholders", !self.stakeholders.is_empty()),
            ("functional_requirements", !self.functional_requirements.is_empty()),
            (
                "non_functional_requirements",
                !self.non_functional_requirements.is_empty(),
            ),
            (
                "technology_stack",
                self.technology_stack.as_ref().is_some_and(|t| !t.is_empty()),
            ),
            ("integrations", !self.integrations.is_empty()),
            ("constraints", !self.constraints.is_empty()),
            ("assumptions", !self.assumptions.is_empty()),
            ("risks", !self.risks.is_empty()),
            ("success_metrics", !self.success_metrics.is_empty()),
            ("budget_constraints", text(&self.budget_constraints)),
            ("timeline_constraints", text(&self.timeline_constraints)),
            ("out_of_scope", !self.out_of_scope.is_empty()),
        ];

        checks
            .into_iter()
            .filter_map(|(name, filled)| filled.then_some(name))
            .collect()
    }

    /// Share of known sections with content, 0-100
    pub fn completeness_percent(&self) -> u8 {
        const SECTION_COUNT: usize = 16;
        ((self.filled_sections().len() * 100) / SECTION_COUNT) as u8
    }
}
