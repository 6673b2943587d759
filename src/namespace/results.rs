//! Namespace result types
//!
//! Defines result structures returned by namespace queries.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use super::node::Node;
use super::path::NsPath;

/// Snapshot of one node's metadata, as reported by INFO.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub owner: String,
    pub size: u64,
    pub is_directory: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub access: Vec<(String, String)>,
}

impl FileInfo {
    pub fn from_node(path: &NsPath, node: &Node) -> Self {
        let meta = node.meta();
        let size = match node {
            Node::File(file) => file.size,
            Node::Directory(_) => 0,
        };
        let mut access = vec![(meta.owner.to_string(), "RW (owner)".to_string())];
        access.extend(
            meta.acl
                .iter()
                .filter(|(_, granted)| !granted.is_empty())
                .map(|(user, granted)| (user.to_string(), granted.to_string())),
        );

        Self {
            path: path.to_string(),
            owner: meta.owner.to_string(),
            size,
            is_directory: node.is_directory(),
            created: meta.created,
            modified: meta.modified,
            access,
        }
    }
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Filename: {}", self.path)?;
        writeln!(f, "Type: {}", if self.is_directory { "directory" } else { "file" })?;
        writeln!(f, "Owner: {}", self.owner)?;
        writeln!(f, "Size: {} bytes", self.size)?;
        writeln!(
            f,
            "Created: {}",
            self.created.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(
            f,
            "Modified: {}",
            self.modified.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        let access: Vec<String> = self
            .access
            .iter()
            .map(|(user, granted)| format!("{user} ({granted})"))
            .collect();
        write!(f, "Access: {}", access.join(", "))
    }
}
