//! Executable lookup.

use std::env;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Resolves `program` against the current `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    find_executable_in(program, env::var_os("PATH").as_deref())
}

/// Resolves `program` against `path_var`.
///
/// A program name containing a `/` is taken as-is and never searched for.
/// This covers relative names such as `sub/prog` as well as absolute paths,
/// matching what POSIX shells do rather than bypassing the search for
/// absolute paths only.
/// Otherwise each entry of `path_var` is tried in order and the first regular
/// file with an execute bit wins.
pub fn find_executable_in(program: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }

    if program.contains('/') {
        let path = PathBuf::from(program);
        return if is_executable(&path) { Some(path) } else { None };
    }

    env::split_paths(path_var?)
        .map(|dir| {
            if dir.as_os_str().is_empty() {
                // an empty entry means the current directory
                PathBuf::from(".").join(program)
            } else {
                dir.join(program)
            }
        })
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}
