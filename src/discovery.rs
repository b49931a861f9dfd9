//! Repository-root discovery and fixture-path resolution, grounded on the
//! original implementation's `_discover_repo_root` / `_resolve_repo_relative_path`
//! resolution order. Unlike the original, this crate has no sibling workshop
//! repository to fall back to, so that branch is dropped (documented in
//! DESIGN.md).

use std::path::{Path, PathBuf};

/// Walks upward from `start` looking for a `.git` entry. Falls back to
/// `start` itself if none is found, since this crate is not always vendored
/// inside a git checkout (e.g. when built from a source tarball).
pub fn discover_repo_root(start: &Path) -> PathBuf {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// Resolves a repo-relative path against `fixture_root`, falling back to
/// `repo_root` if the fixture isn't found there.
pub fn resolve_fixture_path(repo_root: &Path, fixture_root: &Path, relative: &str) -> PathBuf {
    let under_fixture_root = fixture_root.join(relative);
    if under_fixture_root.exists() {
        return under_fixture_root;
    }
    repo_root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discover_repo_root_finds_git_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let repo_root = tmp.path().join("repo");
        let nested = repo_root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo_root.join(".git")).unwrap();

        assert_eq!(discover_repo_root(&nested), repo_root);
    }

    #[test]
    fn discover_repo_root_falls_back_when_absent() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(discover_repo_root(tmp.path()), tmp.path());
    }

    #[test]
    fn resolve_fixture_path_prefers_fixture_root() {
        let tmp = tempfile::tempdir().unwrap();
        let fixture_root = tmp.path().join("fixtures");
        fs::create_dir_all(&fixture_root).unwrap();
        fs::write(fixture_root.join("a.ttl"), "").unwrap();

        let resolved = resolve_fixture_path(tmp.path(), &fixture_root, "a.ttl");
        assert_eq!(resolved, fixture_root.join("a.ttl"));
    }
}
