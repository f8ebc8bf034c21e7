//! Reproducibility log of a `ucsftool` run.
//!
//! Each command appends an entry with its equivalent command line and the
//! files it wrote. A run that fails keeps its entries and records the error,
//! so the saved log shows how far it got. Saved as text, JSON or a shell
//! script that replays the commands.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::io;
use std::path::{Path, PathBuf};

const STAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the run
    pub sequence: usize,
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub description: String,
    /// Equivalent `ucsftool` invocation; empty for read-only steps
    pub command: String,
    /// Spectra and peak lists written by this step
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

impl LogEntry {
    /// Note a file written by this step.
    pub fn produced(&mut self, path: &Path) -> &mut Self {
        self.outputs.push(path.to_path_buf());
        self
    }

    pub fn to_shell_line(&self) -> String {
        let mut out = format!("# Step {}: {}: {}", self.sequence, self.operation, self.description);
        if !self.command.is_empty() {
            out.push('\n');
            out.push_str(&self.command);
        }
        out
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{:03}] {} {:<10} {}",
            self.sequence,
            self.timestamp.format(STAMP),
            self.operation,
            self.description
        )?;
        if !self.command.is_empty() {
            writeln!(f, "      $ {}", self.command)?;
        }
        for out in &self.outputs {
            writeln!(f, "      -> {}", out.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproLog {
    pub session_id: String,
    pub session_start: DateTime<Local>,
    pub source_file: String,
    pub software_version: String,
    pub entries: Vec<LogEntry>,
    /// Error that ended the run, if any
    #[serde(default)]
    pub failure: Option<String>,
}

impl ReproLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_start: Local::now(),
            source_file: String::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
            failure: None,
        }
    }

    pub fn set_source(&mut self, source: &Path) {
        self.source_file = source.display().to_string();
    }

    /// Append a step; chain [`LogEntry::produced`] for the files it wrote.
    pub fn add_entry(&mut self, operation: &str, description: &str, command: &str) -> &mut LogEntry {
        let sequence = self.entries.len() + 1;
        log::info!("[LOG {:03}] {}: {}", sequence, operation, description);
        self.entries.push(LogEntry {
            sequence,
            timestamp: Local::now(),
            operation: operation.to_string(),
            description: description.to_string(),
            command: command.to_string(),
            outputs: Vec::new(),
        });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn record_failure(&mut self, err: &dyn fmt::Display) {
        self.failure = Some(err.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every file written during the run, in order.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .flat_map(|e| e.outputs.iter().map(PathBuf::as_path))
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Bash script replaying the logged commands. Read-only steps and the
    /// failure, if any, stay as comments.
    pub fn to_shell_script(&self) -> String {
        let mut out = String::from("#!/bin/bash\n");
        // writing to a String cannot fail
        let _ = writeln!(out, "# ucsftool v{} session {}", self.software_version, self.session_id);
        let _ = writeln!(out, "# started {}", self.session_start.format(STAMP));
        let _ = writeln!(out, "# source {}", self.source_file);
        out.push_str("set -euo pipefail\n\n");

        for entry in &self.entries {
            out.push_str(&entry.to_shell_line());
            out.push_str("\n\n");
        }
        if let Some(err) = &self.failure {
            let _ = writeln!(out, "# run stopped here: {}", err);
        }
        out
    }

    /// Save in the format chosen by the extension: `.json`, `.sh`, or text
    /// for anything else.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => std::fs::write(path, self.to_json().map_err(io::Error::from)?),
            Some("sh") => self.save_script(path),
            _ => std::fs::write(path, self.to_text()),
        }
    }

    fn save_script(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.to_shell_script())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}

impl fmt::Display for ReproLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ucsftool v{} run log", self.software_version)?;
        writeln!(f, "session  {}", self.session_id)?;
        writeln!(f, "started  {}", self.session_start.format(STAMP))?;
        writeln!(f, "source   {}", self.source_file)?;
        writeln!(f)?;
        for entry in &self.entries {
            write!(f, "{}", entry)?;
        }
        match &self.failure {
            Some(err) => writeln!(f, "\nFAILED: {}", err),
            None => writeln!(f, "\n{} step(s) completed", self.entries.len()),
        }
    }
}

impl Default for ReproLog {
    fn default() -> Self {
        Self::new()
    }
}
