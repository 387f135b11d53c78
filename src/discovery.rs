// src/discovery.rs

//! Enumerate eligible script files in a directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::config::ScriptsSection;
use crate::fs::FileSystem;

/// Compiled include/exclude patterns, matched against paths relative to the
/// scanned directory (e.g. `"sub/worker.lua"`).
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl ScriptFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include = build_globset(include).context("building include globset")?;
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };
        Ok(Self { include, exclude })
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.include.is_match(rel_path)
            && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel_path))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Walk `root` and return every file accepted by `filter`, sorted.
pub fn find_scripts(fs: &dyn FileSystem, root: &Path, filter: &ScriptFilter) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if filter.matches(&rel_str) {
                        found.push(path);
                    }
                }
            }
        }
    }

    found.sort();
    debug!(root = %root.display(), count = found.len(), "script discovery finished");
    Ok(found)
}

/// Resolve the full script list for a `[scripts]` section: explicit paths
/// first, then whatever `dir` yields, without duplicates.
pub fn resolve_scripts(fs: &dyn FileSystem, section: &ScriptsSection) -> Result<Vec<PathBuf>> {
    let mut scripts = section.paths.clone();

    if let Some(dir) = &section.dir {
        let filter = ScriptFilter::new(&section.include, &section.exclude)?;
        for path in find_scripts(fs, dir, &filter)
            .with_context(|| format!("scanning script directory {}", dir.display()))?
        {
            if !scripts.contains(&path) {
                scripts.push(path);
            }
        }
    }

    Ok(scripts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn lua_filter() -> ScriptFilter {
        ScriptFilter::new(&["**/*.lua".to_string()], &["**/skip_*".to_string()]).unwrap()
    }

    #[test]
    fn finds_matching_files_recursively() {
        let fs = MockFileSystem::new();
        fs.add_file("scripts/b.lua", "");
        fs.add_file("scripts/a.lua", "");
        fs.add_file("scripts/nested/c.lua", "");
        fs.add_file("scripts/readme.md", "");
        fs.add_file("scripts/skip_me.lua", "");

        let found = find_scripts(&fs, Path::new("scripts"), &lua_filter()).unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("scripts/a.lua"),
                PathBuf::from("scripts/b.lua"),
                PathBuf::from("scripts/nested/c.lua"),
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let fs = MockFileSystem::new();
        assert!(find_scripts(&fs, Path::new("nope"), &lua_filter()).is_err());
    }

    #[test]
    fn explicit_paths_come_first_without_duplicates() {
        let fs = MockFileSystem::new();
        fs.add_file("scripts/a.lua", "");
        fs.add_file("scripts/b.lua", "");

        let section = ScriptsSection {
            dir: Some(PathBuf::from("scripts")),
            include: vec!["*.lua".to_string()],
            exclude: Vec::new(),
            paths: vec![PathBuf::from("scripts/b.lua"), PathBuf::from("extra.lua")],
        };

        let scripts = resolve_scripts(&fs, &section).unwrap();
        assert_eq!(
            scripts,
            vec![
                PathBuf::from("scripts/b.lua"),
                PathBuf::from("extra.lua"),
                PathBuf::from("scripts/a.lua"),
            ]
        );
    }
}
