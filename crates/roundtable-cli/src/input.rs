//! Console input collaborator.
//!
//! Implements the human-proxy input contract over stdin.  Reading happens
//! on a blocking task so the runtime's worker threads stay free.

use std::io::{BufRead, Write};

use async_trait::async_trait;

use roundtable_agent::{AgentError, InputProvider};

/// Reads one line from stdin per request.
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl ConsoleInput {
    /// Create a console input provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InputProvider for ConsoleInput {
    async fn read_input(&self, prompt: &str) -> Result<String, AgentError> {
        let prompt = prompt.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt}").map_err(|e| AgentError::InputFailed {
                reason: e.to_string(),
            })?;
            stdout.flush().map_err(|e| AgentError::InputFailed {
                reason: e.to_string(),
            })?;

            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| AgentError::InputFailed {
                    reason: e.to_string(),
                })?;
            Ok(line.trim_end().to_owned())
        })
        .await
        .map_err(|e| AgentError::InputFailed {
            reason: format!("input task failed: {e}"),
        })?
    }
}
