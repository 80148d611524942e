//! Concurrent vault traversal.
//!
//! Discovers markdown files under a vault root. Every directory listing
//! holds one permit of the shared [`IoSemaphore`] and gives it back before
//! descending, so sibling subtrees are walked as independent tasks without
//! ever exceeding the I/O budget. A subtree that cannot be listed is logged
//! and contributes nothing; the rest of the walk carries on.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::task::JoinSet;

use crate::semaphore::IoSemaphore;

/// Extensions indexed when nothing else is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".md", ".mdx"];

type WalkFuture = Pin<Box<dyn Future<Output = Vec<PathBuf>> + Send>>;

/// Recursive file discovery filtered by extension and exclude globs.
#[derive(Clone, Debug)]
pub struct DirectoryWalker {
    filter: Arc<WalkFilter>,
}

#[derive(Debug)]
struct WalkFilter {
    root: PathBuf,
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl DirectoryWalker {
    /// Build a walker. Extensions are matched case-insensitively and may be
    /// given with or without the leading dot.
    pub fn new(root: &Path, extensions: &[String], exclude_globs: &[String]) -> Result<Self> {
        let extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            filter: Arc::new(WalkFilter {
                root: root.to_path_buf(),
                extensions,
                excludes: build_globset(exclude_globs)?,
            }),
        })
    }

    /// Walker with the default `.md` / `.mdx` allow-list and no excludes.
    pub fn markdown(root: &Path) -> Self {
        let extensions = DEFAULT_EXTENSIONS
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        Self {
            filter: Arc::new(WalkFilter {
                root: root.to_path_buf(),
                extensions,
                excludes: GlobSet::empty(),
            }),
        }
    }

    /// Walk `dir` and return every eligible file beneath it, sorted.
    pub async fn walk(&self, dir: &Path, sem: &IoSemaphore) -> Vec<PathBuf> {
        let mut paths = walk_dir(self.filter.clone(), dir.to_path_buf(), sem.clone()).await;
        paths.sort();
        paths
    }
}

fn walk_dir(filter: Arc<WalkFilter>, dir: PathBuf, sem: IoSemaphore) -> WalkFuture {
    Box::pin(async move {
        let listing = {
            let _permit = sem.acquire().await;
            list_dir(&dir).await
        };

        let entries = match listing {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to list directory");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        let mut subdirs = JoinSet::new();

        for (path, kind) in entries {
            if filter.is_excluded(&path) {
                continue;
            }
            match kind {
                EntryKind::Dir => {
                    subdirs.spawn(walk_dir(filter.clone(), path, sem.clone()));
                }
                EntryKind::File if filter.has_allowed_extension(&path) => files.push(path),
                _ => {}
            }
        }

        while let Some(joined) = subdirs.join_next().await {
            match joined {
                Ok(mut sub) => files.append(&mut sub),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "walk task failed"),
            }
        }

        files
    })
}

enum EntryKind {
    Dir,
    File,
    Other,
}

async fn list_dir(dir: &Path) -> std::io::Result<Vec<(PathBuf, EntryKind)>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let file_type = entry.file_type().await?;
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        entries.push((entry.path(), kind));
    }
    Ok(entries)
}

impl WalkFilter {
    fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excludes.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.excludes.is_match(relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("notes/deep")).unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join("index.md"), "# Index").unwrap();
        fs::write(root.join("notes/a.MD"), "a").unwrap();
        fs::write(root.join("notes/deep/b.mdx"), "b").unwrap();
        fs::write(root.join("notes/image.png"), [0u8; 4]).unwrap();
        fs::write(root.join(".obsidian/workspace.md"), "w").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_walk_filters_by_extension() {
        let tmp = setup_tree();
        let walker = DirectoryWalker::markdown(tmp.path());
        let paths = walker.walk(tmp.path(), &IoSemaphore::new(2)).await;

        let names: Vec<String> = paths
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            names,
            vec![".obsidian/workspace.md", "index.md", "notes/a.MD", "notes/deep/b.mdx"]
        );
    }

    #[tokio::test]
    async fn test_walk_applies_exclude_globs() {
        let tmp = setup_tree();
        let walker = DirectoryWalker::new(
            tmp.path(),
            &[".md".to_string()],
            &[".obsidian".to_string(), ".obsidian/**".to_string()],
        )
        .unwrap();
        let paths = walker.walk(tmp.path(), &IoSemaphore::new(4)).await;

        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| !p.to_string_lossy().contains(".obsidian")));
    }

    #[tokio::test]
    async fn test_missing_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let walker = DirectoryWalker::markdown(tmp.path());
        let paths = walker
            .walk(&tmp.path().join("does-not-exist"), &IoSemaphore::new(1))
            .await;
        assert!(paths.is_empty());
    }

    #[tokio::test]
    async fn test_single_permit_still_completes_deep_tree() {
        let tmp = TempDir::new().unwrap();
        let mut dir = tmp.path().to_path_buf();
        for depth in 0..6 {
            dir = dir.join(format!("level{}", depth));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("note{}.md", depth)), "x").unwrap();
        }
        let walker = DirectoryWalker::markdown(tmp.path());
        let paths = walker.walk(tmp.path(), &IoSemaphore::new(1)).await;
        assert_eq!(paths.len(), 6);
    }
}
