//! Built-in tools for the agents
//!
//! Every tool resolves relative paths against the session's working
//! directory and returns expected failures (missing file, bad pattern,
//! timeout) as error results rather than panicking.

mod code_search;
mod git;
mod glob;
mod grep;
mod list;
mod read;
mod shell;
mod web_search;
mod write;

pub use code_search::{CodeSearchTool, IndexStatsTool};
pub use git::GitTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list::ListTool;
pub use read::ReadTool;
pub use shell::ShellTool;
pub use web_search::WebSearchTool;
pub use write::WriteTool;

use std::path::{Path, PathBuf};

/// Resolve a tool-supplied path against the working directory.
/// Absolute paths pass through unchanged.
pub(crate) fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Whether `path` stays inside `root` once `..` components are
/// resolved. Purely lexical, so it works on paths that do not exist
/// yet.
pub(crate) fn is_confined(root: &Path, path: &Path) -> bool {
    normalize(path).starts_with(normalize(root))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}
