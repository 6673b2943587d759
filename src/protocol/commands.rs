//! Module `commands`
//!
//! The closed set of client commands, decoded once at the connection
//! boundary so the dispatcher can match exhaustively.

use crate::namespace::Permission;

use super::parser::quote;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register { username: String, password: String },
    Login { username: String, password: String },
    Create { path: String, content: String },
    Read { path: String },
    /// `offset` is `-1` to append
    Write { path: String, offset: i64, content: String },
    Delete { path: String },
    Info { path: String },
    Copy { src: String, dst: String },
    Move { src: String, dst: String },
    CreateFolder { path: String },
    ViewFolder { path: String },
    AddAccess { path: String, grantee: String, permission: Permission },
    RemAccess { path: String, grantee: String },
    /// Asks the owner of `path` for access
    RequestAccess { path: String, permission: Permission },
    /// Pending requests on the caller's files
    ViewRequests,
    ApproveRequest { path: String, requester: String },
    DenyRequest { path: String, requester: String },
    /// Restores the content from before the last change
    Undo { path: String },
    Checkpoint { path: String, tag: String },
    ViewCheckpoint { path: String, tag: String },
    Revert { path: String, tag: String },
    ListCheckpoints { path: String },
    /// Registered users
    List,
    /// Files readable by the caller
    View,
    Quit,
}

impl Command {
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::Register { .. } => "REGISTER",
            Command::Login { .. } => "LOGIN",
            Command::Create { .. } => "CREATE",
            Command::Read { .. } => "READ",
            Command::Write { .. } => "WRITE",
            Command::Delete { .. } => "DELETE",
            Command::Info { .. } => "INFO",
            Command::Copy { .. } => "COPY",
            Command::Move { .. } => "MOVE",
            Command::CreateFolder { .. } => "CREATEFOLDER",
            Command::ViewFolder { .. } => "VIEWFOLDER",
            Command::AddAccess { .. } => "ADDACCESS",
            Command::RemAccess { .. } => "REMACCESS",
            Command::RequestAccess { .. } => "REQUESTACCESS",
            Command::ViewRequests => "VIEWREQUESTS",
            Command::ApproveRequest { .. } => "APPROVEREQUEST",
            Command::DenyRequest { .. } => "DENYREQUEST",
            Command::Undo { .. } => "UNDO",
            Command::Checkpoint { .. } => "CHECKPOINT",
            Command::ViewCheckpoint { .. } => "VIEWCHECKPOINT",
            Command::Revert { .. } => "REVERT",
            Command::ListCheckpoints { .. } => "LISTCHECKPOINTS",
            Command::List => "LIST",
            Command::View => "VIEW",
            Command::Quit => "QUIT",
        }
    }

    /// Renders the command as one protocol line (no terminator).
    pub fn to_line(&self) -> String {
        let kw = self.keyword();
        match self {
            Command::Register { username, password } | Command::Login { username, password } => {
                format!("{kw} {} {}", quote(username), quote(password))
            }
            Command::Create { path, content } => {
                format!("{kw} {} \"{}\"", quote(path), escape(content))
            }
            Command::Write {
                path,
                offset,
                content,
            } => format!("{kw} {} {offset} \"{}\"", quote(path), escape(content)),
            Command::Read { path }
            | Command::Delete { path }
            | Command::Info { path }
            | Command::CreateFolder { path }
            | Command::ViewFolder { path }
            | Command::Undo { path }
            | Command::ListCheckpoints { path } => format!("{kw} {}", quote(path)),
            Command::Copy { src, dst } | Command::Move { src, dst } => {
                format!("{kw} {} {}", quote(src), quote(dst))
            }
            Command::AddAccess {
                path,
                grantee,
                permission,
            } => format!("{kw} {} {} {permission}", quote(path), quote(grantee)),
            Command::RemAccess {
                path,
                grantee: other,
            }
            | Command::ApproveRequest {
                path,
                requester: other,
            }
            | Command::DenyRequest {
                path,
                requester: other,
            }
            | Command::Checkpoint { path, tag: other }
            | Command::ViewCheckpoint { path, tag: other }
            | Command::Revert { path, tag: other } => {
                format!("{kw} {} {}", quote(path), quote(other))
            }
            Command::RequestAccess { path, permission } => {
                format!("{kw} {} {permission}", quote(path))
            }
            Command::List | Command::View | Command::ViewRequests | Command::Quit => {
                kw.to_string()
            }
        }
    }

    /// True for commands that change users or the namespace when they succeed.
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. }
                | Command::Read { .. }
                | Command::Info { .. }
                | Command::ViewFolder { .. }
                | Command::ViewRequests
                | Command::ViewCheckpoint { .. }
                | Command::ListCheckpoints { .. }
                | Command::List
                | Command::View
                | Command::Quit
        )
    }

    /// Line suitable for logs: secrets and bulk content elided.
    pub fn summary(&self) -> String {
        match self {
            Command::Register { username, .. } | Command::Login { username, .. } => {
                format!("{} {username} ****", self.keyword())
            }
            Command::Create { path, content } => {
                format!("CREATE {path} <{} bytes>", content.len())
            }
            Command::Write {
                path,
                offset,
                content,
            } => format!("WRITE {path} {offset} <{} bytes>", content.len()),
            other => other.to_line(),
        }
    }
}

/// Escapes content for a double-quoted argument.
pub(crate) fn escape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
