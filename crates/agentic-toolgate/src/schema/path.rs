//! Path containment for filesystem-like tools.
//!
//! A candidate path is accepted only if its canonical form lies under one
//! of the allowlisted roots. Canonicalization walks the path component by
//! component:
//!   - `.` is skipped
//!   - `..` pops the last resolved component
//!   - a component that exists and is a symbolic link is replaced by the
//!     link target (absolute targets restart from the root)
//!   - components that do not exist yet are kept as written
//!
//! The containment test is component-wise (`Path::starts_with`), so
//! `/workspace/agent-evil` is not under `/workspace/agent`.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR_STR};

/// Maximum symbolic links followed while resolving one path.
const MAX_SYMLINK_HOPS: usize = 40;

/// One pending step of the resolution walk.
enum Step {
    Root(OsString),
    Parent,
    Name(OsString),
}

fn push_steps(queue: &mut VecDeque<Step>, path: &Path) {
    // Pushed to the front in reverse so that the path is walked in order
    // before whatever was already queued.
    let steps: Vec<Step> = path
        .components()
        .filter_map(|c| match c {
            Component::Prefix(p) => Some(Step::Root(p.as_os_str().to_os_string())),
            Component::RootDir => Some(Step::Root(OsString::from(MAIN_SEPARATOR_STR))),
            Component::CurDir => None,
            Component::ParentDir => Some(Step::Parent),
            Component::Normal(n) => Some(Step::Name(n.to_os_string())),
        })
        .collect();
    for step in steps.into_iter().rev() {
        queue.push_front(step);
    }
}

/// Resolve an absolute path to canonical form without requiring it to exist.
///
/// Returns an error message on relative input, symlink loops, or I/O
/// failures other than "not found".
pub fn resolve_path(path: &Path) -> Result<PathBuf, String> {
    if !path.is_absolute() {
        return Err(format!("path '{}' is not absolute", path.display()));
    }

    let mut queue = VecDeque::new();
    push_steps(&mut queue, path);

    let mut resolved = PathBuf::new();
    let mut hops = 0usize;

    while let Some(step) = queue.pop_front() {
        match step {
            Step::Root(root) => {
                if root.as_os_str() == MAIN_SEPARATOR_STR {
                    // Keeps a drive prefix if one was seen.
                    while resolved.pop() {}
                    if resolved.as_os_str().is_empty() {
                        resolved.push(MAIN_SEPARATOR_STR);
                    }
                } else {
                    resolved = PathBuf::from(root);
                }
            }
            Step::Parent => {
                resolved.pop();
            }
            Step::Name(name) => {
                let next = resolved.join(&name);
                match std::fs::symlink_metadata(&next) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        hops += 1;
                        if hops > MAX_SYMLINK_HOPS {
                            return Err(format!(
                                "too many symbolic links while resolving '{}'",
                                path.display()
                            ));
                        }
                        let target = std::fs::read_link(&next)
                            .map_err(|e| format!("cannot read link '{}': {e}", next.display()))?;
                        // Relative targets resolve against the link's parent,
                        // which is `resolved` as it stands.
                        push_steps(&mut queue, &target);
                    }
                    Ok(_) => resolved = next,
                    Err(e) if e.kind() == ErrorKind::NotFound => resolved = next,
                    Err(e) => {
                        return Err(format!("cannot inspect '{}': {e}", next.display()));
                    }
                }
            }
        }
    }

    Ok(resolved)
}

/// Resolve `candidate` and require it to lie under one of `roots`.
///
/// Relative candidates are joined to the first root. `roots` are expected
/// in canonical form already (see `AllowlistPolicy::canonicalize`); they
/// are resolved again here so a caller-built constraint cannot skip that.
pub fn resolve_under_roots(candidate: &str, roots: &[PathBuf]) -> Result<PathBuf, String> {
    if candidate.is_empty() {
        return Err("path is empty".to_string());
    }
    if candidate.contains('\0') {
        return Err("path contains a NUL byte".to_string());
    }
    let Some(first_root) = roots.first() else {
        return Err("no allowlisted roots configured".to_string());
    };

    let raw = Path::new(candidate);
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        first_root.join(raw)
    };

    let resolved = resolve_path(&joined)?;

    for root in roots {
        let canonical_root = resolve_path(root)?;
        if resolved.starts_with(&canonical_root) {
            return Ok(resolved);
        }
    }

    Err(format!(
        "path '{}' resolves outside the allowlisted roots",
        candidate
    ))
}
