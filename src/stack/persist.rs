//! Ops-log and metadata persistence
//!
//! The ops log is UTF-8 text, one serialized command per line, blank
//! lines ignored. Its metadata sidecar is a YAML file (same path, `.yaml`
//! extension) holding the session id and the content digest of the bound
//! event-data file, preceded by a comment header line. All file access is
//! whole-file: open, read or write everything, close.

use crate::command::Command;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const METADATA_HEADER: &str = "# corrections metadata using YAML syntax\n---\n";

/// Session record persisted beside the ops log
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Metadata {
    /// Session id string
    pub uuid: String,
    /// Hex SHA-256 of the bound event-data file, when one is bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evfile_hash: Option<String>,
}

/// Metadata sidecar path for an ops-log path
pub fn metadata_path(log_file: &Path) -> PathBuf {
    log_file.with_extension("yaml")
}

/// Backup twin of a primary path, written on session failure
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Write the undo history, one command per line, oldest first
pub fn write_log(path: &Path, commands: &[Command]) -> Result<()> {
    let mut content = String::new();
    for cmd in commands {
        content.push_str(&cmd.text());
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// Read and re-validate every logged command
pub fn read_log(path: &Path) -> Result<Vec<Command>> {
    let content = fs::read_to_string(path)?;
    let mut commands = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        commands.push(Command::parse(line)?);
    }
    Ok(commands)
}

pub fn write_metadata(path: &Path, metadata: &Metadata) -> Result<()> {
    let body = serde_yaml::to_string(metadata)?;
    fs::write(path, format!("{}{}", METADATA_HEADER, body))?;
    Ok(())
}

/// Read the sidecar if it exists; a log may travel without one
pub fn read_metadata(path: &Path) -> Result<Option<Metadata>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_yaml::from_str(&content)?))
}

/// Write an ops log and its sidecar together
pub fn write_pair(log_file: &Path, commands: &[Command], metadata: &Metadata) -> Result<()> {
    write_log(log_file, commands)?;
    write_metadata(&metadata_path(log_file), metadata)?;
    Ok(())
}
