//! Task documents - JSON/YAML files declaring tasks and workflows
//!
//! ```yaml
//! tasks:
//!   build:
//!     name: Build
//!     prompt: Fix the build errors
//!     approval: "--allow-tool 'shell(swift)'"
//!     timeout: 300
//! workflows:
//!   ci:
//!     tasks: [build, test]
//!     mode: sequential
//! ```
//!
//! Task order follows the document.
//!
//! The flat agent-list form is accepted too. Each entry becomes task
//! `agent-<n>` with the agent timeout:
//!
//! ```json
//! {"agents": [{"name": "docs", "task": "Update the docs", "approval": "--allow-all-tools"}]}
//! ```

use crate::plan::{ExecutionMode, RunPlan};
use crate::task::{ApprovalPolicy, TaskDefinition, DEFAULT_TIMEOUT_SECS};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use swarm_foundation::{Error, Result, RunConfig, DEFAULT_QUICK_TIMEOUT_SECS};
use tracing::{debug, warn};

// ============================================================================
// Format
// ============================================================================

/// Document format, decided by file extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Unsupported(String),
}

impl DocumentFormat {
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => DocumentFormat::Json,
            "yaml" | "yml" => DocumentFormat::Yaml,
            _ => DocumentFormat::Unsupported(ext),
        }
    }
}

// ============================================================================
// Defaults
// ============================================================================

/// Values applied to tasks that leave a field out
#[derive(Debug, Clone)]
pub struct TaskDefaults {
    pub approval: ApprovalPolicy,
    pub timeout_secs: u64,
    /// Timeout for entries of an `agents` list
    pub agent_timeout_secs: u64,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            approval: ApprovalPolicy::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            agent_timeout_secs: DEFAULT_QUICK_TIMEOUT_SECS,
        }
    }
}

impl TaskDefaults {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            approval: ApprovalPolicy::Flag(config.default_approval.clone()),
            timeout_secs: config.default_timeout_secs,
            agent_timeout_secs: config.quick_timeout_secs,
        }
    }
}

// ============================================================================
// Raw entries
// ============================================================================

#[derive(Debug, Deserialize)]
struct TaskEntry {
    name: Option<String>,
    #[serde(default)]
    prompt: String,
    approval: Option<ApprovalPolicy>,
    timeout: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    name: Option<String>,
    #[serde(default)]
    task: String,
    approval: Option<ApprovalPolicy>,
}

#[derive(Debug, Deserialize)]
struct WorkflowEntry {
    #[serde(default)]
    tasks: Vec<String>,
    #[serde(default)]
    mode: ExecutionMode,
    #[serde(default)]
    description: String,
}

/// Named, ordered selection of tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    pub name: String,
    pub task_ids: Vec<String>,
    pub mode: ExecutionMode,
    pub description: String,
}

// ============================================================================
// TaskDocument
// ============================================================================

/// Loaded and validated task document
#[derive(Debug, Clone, Default)]
pub struct TaskDocument {
    tasks: Vec<TaskDefinition>,
    workflows: Vec<WorkflowDefinition>,
    has_agents: bool,
}

impl TaskDocument {
    /// Load a file, picking the parser by extension
    pub fn load(path: &Path, defaults: &TaskDefaults) -> Result<Self> {
        let format = DocumentFormat::detect(path);
        if let DocumentFormat::Unsupported(ext) = &format {
            return Err(Error::UnsupportedFormat(format!(
                "{} (extension '{}', expected .json, .yaml or .yml)",
                path.display(),
                ext
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Document(format!("Failed to read {}: {}", path.display(), e)))?;
        let document = Self::parse(&content, &format, defaults)?;
        debug!(
            "Loaded {} task(s), {} workflow(s) from {}",
            document.tasks.len(),
            document.workflows.len(),
            path.display()
        );
        Ok(document)
    }

    /// Parse document text
    pub fn parse(content: &str, format: &DocumentFormat, defaults: &TaskDefaults) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(Error::Document("Document is empty".to_string()));
        }

        let root: Value = match format {
            DocumentFormat::Json => serde_json::from_str(content)?,
            DocumentFormat::Yaml => serde_yaml::from_str(content)?,
            DocumentFormat::Unsupported(ext) => {
                return Err(Error::UnsupportedFormat(ext.clone()));
            }
        };

        let root = match root {
            Value::Object(map) => map,
            _ => return Err(Error::Document("Top level must be a mapping".to_string())),
        };

        if let Some(key) = root.keys().find(|k| !SECTIONS.contains(&k.as_str())) {
            return Err(Error::Document(format!(
                "Unknown top-level key '{}' (expected {})",
                key,
                SECTIONS.join(", ")
            )));
        }
        if root.is_empty() {
            return Err(Error::Document(format!(
                "Document declares none of {}",
                SECTIONS.join(", ")
            )));
        }

        let mut tasks = Vec::new();
        for (id, entry) in section(&root, "tasks")? {
            let entry: TaskEntry = serde_json::from_value(entry.clone())
                .map_err(|e| Error::Document(format!("Task '{}': {}", id, e)))?;
            tasks.push(build_task(id, entry, defaults)?);
        }

        let agents = agent_list(&root)?;
        for (index, entry) in agents.iter().enumerate() {
            let id = format!("agent-{}", index);
            let entry: AgentEntry = serde_json::from_value(entry.clone())
                .map_err(|e| Error::Document(format!("Agent {}: {}", index, e)))?;
            if tasks.iter().any(|t: &TaskDefinition| t.id() == id) {
                return Err(Error::Document(format!(
                    "Agent {} clashes with task '{}'",
                    index, id
                )));
            }
            tasks.push(build_agent(id, entry, defaults)?);
        }

        let mut workflows = Vec::new();
        for (name, entry) in section(&root, "workflows")? {
            let entry: WorkflowEntry = serde_json::from_value(entry.clone())
                .map_err(|e| Error::Document(format!("Workflow '{}': {}", name, e)))?;
            workflows.push(WorkflowDefinition {
                name: name.clone(),
                task_ids: entry.tasks,
                mode: entry.mode,
                description: entry.description,
            });
        }

        Ok(Self {
            tasks,
            workflows,
            has_agents: !agents.is_empty(),
        })
    }

    pub fn tasks(&self) -> &[TaskDefinition] {
        &self.tasks
    }

    pub fn workflows(&self) -> &[WorkflowDefinition] {
        &self.workflows
    }

    /// True when tasks came from an `agents` list
    pub fn has_agents(&self) -> bool {
        self.has_agents
    }

    pub fn task(&self, id: &str) -> Option<&TaskDefinition> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn workflow(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Look up ids in order; returns (found tasks, unresolved ids)
    pub fn resolve(&self, ids: &[String]) -> (Vec<TaskDefinition>, Vec<String>) {
        let mut found = Vec::with_capacity(ids.len());
        let mut unresolved = Vec::new();

        for id in ids {
            match self.task(id) {
                Some(task) => found.push(task.clone()),
                None => {
                    warn!("Task reference '{}' not found, skipping", id);
                    unresolved.push(id.clone());
                }
            }
        }

        (found, unresolved)
    }

    /// Plan for a named workflow, using its mode unless `mode` overrides it
    pub fn workflow_plan(
        &self,
        name: &str,
        mode: Option<ExecutionMode>,
        stop_on_failure: bool,
    ) -> Result<RunPlan> {
        let workflow = self
            .workflow(name)
            .ok_or_else(|| Error::WorkflowNotFound(name.to_string()))?;
        let (tasks, unresolved) = self.resolve(&workflow.task_ids);

        Ok(RunPlan::new(tasks, mode.unwrap_or(workflow.mode))?
            .with_stop_on_failure(stop_on_failure)
            .with_workflow(name)
            .with_unresolved(unresolved))
    }

    /// Plan for explicit ids, or every task when `ids` is empty
    pub fn tasks_plan(
        &self,
        ids: &[String],
        mode: ExecutionMode,
        stop_on_failure: bool,
    ) -> Result<RunPlan> {
        let (tasks, unresolved) = if ids.is_empty() {
            (self.tasks.clone(), Vec::new())
        } else {
            self.resolve(ids)
        };

        Ok(RunPlan::new(tasks, mode)?
            .with_stop_on_failure(stop_on_failure)
            .with_unresolved(unresolved))
    }
}

/// Top-level keys a document may use
const SECTIONS: [&str; 3] = ["tasks", "workflows", "agents"];

/// Items of the `agents` list; missing or null is empty
fn agent_list(root: &serde_json::Map<String, Value>) -> Result<&[Value]> {
    match root.get("agents") {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(Error::Document("'agents' must be a list".to_string())),
    }
}

/// Entries of a top-level mapping; a missing or null section is empty
fn section<'a>(
    root: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<Vec<(&'a String, &'a Value)>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.iter().collect()),
        Some(_) => Err(Error::Document(format!("'{}' must be a mapping", key))),
    }
}

fn build_task(id: &str, entry: TaskEntry, defaults: &TaskDefaults) -> Result<TaskDefinition> {
    let timeout_secs = match entry.timeout {
        None => defaults.timeout_secs,
        Some(t) if t > 0 => t as u64,
        Some(t) => {
            return Err(Error::validation(format!(
                "Task '{}' timeout must be greater than 0 (got {})",
                id, t
            )));
        }
    };

    let mut builder = TaskDefinition::builder(id, entry.prompt)
        .approval(entry.approval.unwrap_or_else(|| defaults.approval.clone()))
        .timeout_secs(timeout_secs);
    if let Some(name) = entry.name {
        builder = builder.name(name);
    }
    if let Some(description) = entry.description {
        builder = builder.description(description);
    }
    builder.build()
}

fn build_agent(id: String, entry: AgentEntry, defaults: &TaskDefaults) -> Result<TaskDefinition> {
    let mut builder = TaskDefinition::builder(id, entry.task)
        .approval(entry.approval.unwrap_or_else(|| defaults.approval.clone()))
        .timeout_secs(defaults.agent_timeout_secs);
    if let Some(name) = entry.name {
        builder = builder.name(name);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const YAML: &str = r#"
tasks:
  zeta:
    prompt: Last alphabetically, first in file
  build:
    name: Build
    prompt: Fix the build
    approval: "--allow-tool 'shell(swift)'"
    timeout: 300
  test:
    prompt: Run the tests
    approval: ["--allow-tool", "shell(swift test)"]
workflows:
  ci:
    tasks: [build, ghost, test]
  fanout:
    tasks: [zeta, test]
    mode: parallel
"#;

    fn yaml() -> TaskDocument {
        TaskDocument::parse(YAML, &DocumentFormat::Yaml, &TaskDefaults::default()).unwrap()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(DocumentFormat::detect(&PathBuf::from("t.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::detect(&PathBuf::from("t.YML")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::detect(&PathBuf::from("t.yaml")), DocumentFormat::Yaml);
        assert_eq!(
            DocumentFormat::detect(&PathBuf::from("t.txt")),
            DocumentFormat::Unsupported("txt".into())
        );
    }

    #[test]
    fn test_order_and_defaults() {
        let doc = yaml();
        let ids: Vec<&str> = doc.tasks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["zeta", "build", "test"]);

        let zeta = doc.task("zeta").unwrap();
        assert_eq!(zeta.timeout().as_secs(), 120);
        assert_eq!(zeta.approval_args(), ["--allow-all-tools"]);
        assert_eq!(zeta.name(), "zeta");

        let build = doc.task("build").unwrap();
        assert_eq!(build.name(), "Build");
        assert_eq!(build.timeout().as_secs(), 300);
        assert_eq!(build.approval_args(), ["--allow-tool", "shell(swift)"]);

        let test = doc.task("test").unwrap();
        assert_eq!(test.approval_args(), ["--allow-tool", "shell(swift test)"]);
    }

    #[test]
    fn test_json_matches_yaml() {
        let json = r#"{
            "tasks": {
                "zeta": {"prompt": "Last alphabetically, first in file"},
                "build": {"name": "Build", "prompt": "Fix the build",
                          "approval": "--allow-tool 'shell(swift)'", "timeout": 300},
                "test": {"prompt": "Run the tests",
                         "approval": ["--allow-tool", "shell(swift test)"]}
            }
        }"#;
        let doc = TaskDocument::parse(json, &DocumentFormat::Json, &TaskDefaults::default())
            .unwrap();
        assert_eq!(doc.tasks(), yaml().tasks());
    }

    #[test]
    fn test_workflow_drops_unknown_ids() {
        let plan = yaml().workflow_plan("ci", None, true).unwrap();
        let ids: Vec<&str> = plan.tasks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["build", "test"]);
        assert_eq!(plan.unresolved(), ["ghost"]);
        assert_eq!(plan.mode(), ExecutionMode::Sequential);
        assert_eq!(plan.workflow(), Some("ci"));
        assert!(plan.stop_on_failure());
    }

    #[test]
    fn test_workflow_mode_override() {
        let doc = yaml();
        assert_eq!(
            doc.workflow_plan("fanout", None, false).unwrap().mode(),
            ExecutionMode::Parallel
        );
        assert_eq!(
            doc.workflow_plan("fanout", Some(ExecutionMode::Sequential), false)
                .unwrap()
                .mode(),
            ExecutionMode::Sequential
        );
    }

    #[test]
    fn test_unknown_workflow() {
        let err = yaml().workflow_plan("nightly", None, false).unwrap_err();
        assert!(matches!(err, Error::WorkflowNotFound(_)));
    }

    #[test]
    fn test_tasks_plan_all_or_selected() {
        let doc = yaml();
        assert_eq!(doc.tasks_plan(&[], ExecutionMode::Parallel, false).unwrap().len(), 3);

        let plan = doc
            .tasks_plan(&["test".into(), "nope".into()], ExecutionMode::Parallel, false)
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.unresolved(), ["nope"]);
    }

    #[test]
    fn test_missing_prompt_is_validation_error() {
        let err = TaskDocument::parse(
            "tasks:\n  a:\n    name: A\n",
            &DocumentFormat::Yaml,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let err = TaskDocument::parse(
            r#"{"tasks": {"a": {"prompt": "p", "timeout": -5}}}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_defaults_from_config() {
        let mut config = RunConfig::default();
        config.default_timeout_secs = 45;
        config.default_approval = "--allow-tool write".into();
        let doc = TaskDocument::parse(
            r#"{"tasks": {"a": {"prompt": "p"}}}"#,
            &DocumentFormat::Json,
            &TaskDefaults::from_config(&config),
        )
        .unwrap();
        let task = doc.task("a").unwrap();
        assert_eq!(task.timeout().as_secs(), 45);
        assert_eq!(task.approval_args(), ["--allow-tool", "write"]);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tasks.toml");
        std::fs::write(&path, "").unwrap();
        let err = TaskDocument::load(&path, &TaskDefaults::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_empty_document_rejected() {
        for (content, format) in [
            ("", DocumentFormat::Yaml),
            ("{}", DocumentFormat::Json),
        ] {
            let err = TaskDocument::parse(content, &format, &TaskDefaults::default()).unwrap_err();
            assert!(matches!(err, Error::Document(_)), "{:?} gave {:?}", content, err);
        }
    }

    #[test]
    fn test_explicitly_empty_tasks_allowed() {
        let doc = TaskDocument::parse(
            r#"{"tasks": {}}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap();
        assert!(doc.tasks().is_empty());
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let err = TaskDocument::parse(
            r#"{"task": {"a": {"prompt": "p"}}}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Document(ref m) if m.contains("'task'")));
    }

    #[test]
    fn test_agent_list() {
        let json = r#"{
            "agents": [
                {"name": "docs", "task": "Update the docs"},
                {"name": "tests", "task": "Add tests", "approval": "--allow-tool 'shell(cargo)'"}
            ]
        }"#;
        let doc = TaskDocument::parse(json, &DocumentFormat::Json, &TaskDefaults::default())
            .unwrap();

        let ids: Vec<&str> = doc.tasks().iter().map(|t| t.id()).collect();
        assert_eq!(ids, ["agent-0", "agent-1"]);

        let docs = doc.task("agent-0").unwrap();
        assert_eq!(docs.name(), "docs");
        assert_eq!(docs.prompt(), "Update the docs");
        assert_eq!(docs.timeout().as_secs(), 900);
        assert_eq!(docs.approval_args(), ["--allow-all-tools"]);
        assert_eq!(
            doc.task("agent-1").unwrap().approval_args(),
            ["--allow-tool", "shell(cargo)"]
        );

        assert!(doc.has_agents());
        assert!(!yaml().has_agents());

        let plan = doc.tasks_plan(&[], ExecutionMode::Parallel, false).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_agent_timeout_from_config() {
        let mut config = RunConfig::default();
        config.quick_timeout_secs = 60;
        let doc = TaskDocument::parse(
            "agents:\n  - name: lint\n    task: Run the linter\n",
            &DocumentFormat::Yaml,
            &TaskDefaults::from_config(&config),
        )
        .unwrap();
        assert_eq!(doc.task("agent-0").unwrap().timeout().as_secs(), 60);
    }

    #[test]
    fn test_agent_without_task_rejected() {
        let err = TaskDocument::parse(
            r#"{"agents": [{"name": "idle"}]}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_agents_must_be_a_list() {
        let err = TaskDocument::parse(
            r#"{"agents": {"docs": {"task": "x"}}}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Document(_)));
    }

    #[test]
    fn test_agent_id_clash() {
        let err = TaskDocument::parse(
            r#"{"tasks": {"agent-0": {"prompt": "p"}}, "agents": [{"task": "q"}]}"#,
            &DocumentFormat::Json,
            &TaskDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Document(_)));
    }
}
