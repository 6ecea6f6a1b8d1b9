//! Interactive mode - read agents from a terminal, one at a time
//!
//! For each agent: a name (`done` finishes, `cancel` aborts), a task prompt
//! (empty re-prompts) and optional approval flags.

use std::io::{BufRead, Write};
use swarm_foundation::SwarmConfig;
use swarm_task::TaskDefinition;

/// Result of an interactive session
#[derive(Debug)]
pub enum Entry {
    /// Agents entered before `done` (or end of input)
    Agents(Vec<TaskDefinition>),
    /// User typed `cancel`
    Cancelled,
}

/// Prompt for agents until `done`, `cancel` or end of input
pub fn read_agents<R, W>(
    mut input: R,
    mut output: W,
    config: &SwarmConfig,
    approval: Option<String>,
) -> anyhow::Result<Entry>
where
    R: BufRead,
    W: Write,
{
    let default_approval = approval.unwrap_or_else(|| config.run.default_approval.clone());
    let mut agents = Vec::new();

    writeln!(output, "Interactive mode - spawn agents one by one")?;
    writeln!(output, "Enter 'done' when finished, 'cancel' to abort")?;

    loop {
        writeln!(output)?;
        writeln!(output, "Agent {}:", agents.len() + 1)?;

        let Some(name) = ask(&mut input, &mut output, "  Name (or 'done'/'cancel'): ")? else {
            break;
        };
        match name.to_ascii_lowercase().as_str() {
            "done" => break,
            "cancel" => return Ok(Entry::Cancelled),
            _ => {}
        }

        let Some(prompt) = ask(&mut input, &mut output, "  Task: ")? else {
            break;
        };
        if prompt.is_empty() {
            continue;
        }

        let label = format!("  Approval flags (default: {}): ", default_approval);
        let approval = match ask(&mut input, &mut output, &label)? {
            Some(flags) if !flags.is_empty() => flags,
            _ => default_approval.clone(),
        };

        let built = TaskDefinition::builder(format!("agent-{}", agents.len()), prompt)
            .name(name)
            .approval(approval)
            .timeout_secs(config.run.quick_timeout_secs)
            .build();
        match built {
            Ok(task) => agents.push(task),
            Err(e) => writeln!(output, "  {}", e)?,
        }
    }

    Ok(Entry::Agents(agents))
}

/// Print a prompt and read one trimmed line; `None` at end of input
fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> anyhow::Result<Option<String>> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
