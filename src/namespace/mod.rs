//! Namespace
//!
//! Hierarchical file and directory metadata: paths, owners, ACLs, sizes,
//! timestamps and content handles.

pub mod node;
pub mod path;
pub mod results;
pub mod tree;

pub use node::{Checkpoint, FileNode, Node, Permission, PermissionSet};
pub use path::NsPath;
pub use results::FileInfo;
pub use tree::NamespaceTree;
