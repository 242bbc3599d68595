//! Plan-based system prompt assembly.
//!
//! The relay never interprets prompt text; it only picks the template for the
//! caller's plan and splices in the selected add-ons.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder in the lite template replaced by the add-on texts.
pub const ADD_ONS_PLACEHOLDER: &str = "{add_ons}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    Lite,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddOn {
    Memory,
    Github,
    AdvancedContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub mode: PlanMode,
    #[serde(default)]
    pub add_ons: Vec<AddOn>,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            mode: PlanMode::Full,
            add_ons: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptLibrary {
    pub full: String,
    /// Lite template; `{add_ons}` marks where add-on texts go.
    pub lite: String,
    pub add_ons: BTreeMap<AddOn, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        let add_ons = BTreeMap::from([
            (
                AddOn::Memory,
                "\n## Memory\nRecord durable facts about the user and project with the memory tools, and consult them before asking again.\n".to_string(),
            ),
            (
                AddOn::Github,
                "\n## GitHub\nUse the GitHub tools for repository, issue and pull request work instead of guessing remote state.\n".to_string(),
            ),
            (
                AddOn::AdvancedContext,
                "\n## Advanced context\nGather workspace context (open files, diagnostics, recent edits) before proposing changes.\n".to_string(),
            ),
        ]);

        Self {
            full: "You are a capable coding assistant working in a terminal with IDE integration. \
                   Use the provided tools to inspect the environment before acting, reason step by step, \
                   and answer concisely."
                .to_string(),
            lite: format!(
                "You are a coding assistant working in a terminal. Use the provided tools when needed and answer concisely.\n{ADD_ONS_PLACEHOLDER}"
            ),
            add_ons,
        }
    }
}

impl PromptLibrary {
    /// System prompt for `plan`. Add-ons are appended in the order the plan
    /// lists them; unknown or unconfigured add-ons contribute nothing.
    pub fn assemble(&self, plan: &Plan) -> String {
        match plan.mode {
            PlanMode::Full => self.full.clone(),
            PlanMode::Lite => {
                let add_ons: String = plan
                    .add_ons
                    .iter()
                    .filter_map(|a| self.add_ons.get(a))
                    .map(String::as_str)
                    .collect();
                self.lite.replace(ADD_ONS_PLACEHOLDER, &add_ons)
            }
        }
    }
}
