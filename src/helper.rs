//! External categorizer backed by a helper process.
//!
//! The helper reads one JSON request per line on stdin and answers with one
//! JSON envelope per line on stdout. Whatever service the helper talks to is
//! its own business; the planner only sees the line protocol.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::categorize::{domain_names, DomainCategorizer, ExternalLabels};
use crate::error::CategorizerError;
use crate::model::Project;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HelperRequest<'a> {
    #[serde(rename_all = "camelCase")]
    Categorize {
        project_id: &'a str,
        title: &'a str,
        scope: &'a str,
        domains: Vec<&'static str>,
    },
    Shutdown,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HelperEnvelope {
    Result { payload: ExternalLabels },
    Error { message: String },
}

pub struct HelperCategorizer {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl HelperCategorizer {
    /// Spawns `command_line` (program followed by whitespace-separated args).
    pub fn spawn(command_line: &str) -> Result<Self, CategorizerError> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| {
            CategorizerError::Spawn(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty categorizer command",
            ))
        })?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(CategorizerError::Spawn)?;

        let stdin = child.stdin.take().ok_or(CategorizerError::Terminated)?;
        let stdout = child.stdout.take().ok_or(CategorizerError::Terminated)?;
        debug!(command = command_line, "spawned categorizer helper");

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    fn send(&mut self, request: &HelperRequest<'_>) -> Result<(), CategorizerError> {
        let mut data = serde_json::to_vec(request)?;
        data.push(b'\n');
        self.stdin.write_all(&data)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<ExternalLabels, CategorizerError> {
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(CategorizerError::Terminated);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return match serde_json::from_str::<HelperEnvelope>(trimmed)? {
                HelperEnvelope::Result { payload } => Ok(payload),
                HelperEnvelope::Error { message } => Err(CategorizerError::Remote(message)),
            };
        }
    }
}

impl DomainCategorizer for HelperCategorizer {
    fn categorize(&mut self, project: &Project) -> Result<ExternalLabels, CategorizerError> {
        self.send(&HelperRequest::Categorize {
            project_id: &project.project_id,
            title: &project.title,
            scope: &project.scope,
            domains: domain_names(),
        })?;
        self.receive()
    }
}

impl Drop for HelperCategorizer {
    fn drop(&mut self) {
        if let Err(err) = self.send(&HelperRequest::Shutdown) {
            debug!("Unable to send shutdown to the categorizer helper: {err}");
        }
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            _ => {
                if let Err(err) = self.child.kill() {
                    warn!("Unable to stop the categorizer helper: {err}");
                }
                let _ = self.child.wait();
            }
        }
    }
}
