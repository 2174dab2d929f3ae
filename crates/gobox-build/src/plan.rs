use crate::error::BuildError;

/// One tool invocation from the plan document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub tool: String,
    pub args: Vec<String>,
}

/// Parses the driver's plan: a JSON array of non-empty string arrays.
pub fn parse_plan(path: &str, bytes: &[u8]) -> Result<Vec<Command>, BuildError> {
    let raw: Vec<Vec<String>> = serde_json::from_slice(bytes).map_err(|err| BuildError::Plan {
        path: path.to_string(),
        reason: err.to_string(),
    })?;
    raw.into_iter()
        .enumerate()
        .map(|(i, mut step)| {
            if step.is_empty() {
                return Err(BuildError::Plan {
                    path: path.to_string(),
                    reason: format!("step {i} is empty"),
                });
            }
            let tool = step.remove(0);
            Ok(Command { tool, args: step })
        })
        .collect()
}
