//! Vault manager: one index per vault root plus sandboxed file access.
//!
//! Every path handed in by a caller goes through the boundary check before
//! it touches the filesystem. The check is lexical first (`..` and `.` are
//! folded without following symlinks, then the result must be a descendant
//! of the root component by component) and, when the target exists, repeated
//! on canonical paths so a symlink inside the vault cannot point outside it.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde_yaml::Mapping;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::frontmatter;
use crate::indexer::Indexer;
use crate::models::{
    file_name_of, Backlink, DocumentIndex, DocumentStats, EnrichedDocument, VaultStats,
};
use crate::semaphore::IoSemaphore;
use crate::walker::DirectoryWalker;

/// What [`VaultManager::get_document_info`] should attach.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentInfoOptions {
    pub include_stats: bool,
    pub include_backlinks: bool,
    /// Keep only the first N chars of content. Stats and hash still use the
    /// whole file.
    pub max_content_preview: Option<usize>,
    pub include_content_hash: bool,
}

/// Owns the walker, the index and the shared I/O gate for one vault.
#[derive(Debug)]
pub struct VaultManager {
    root: PathBuf,
    walker: DirectoryWalker,
    indexer: Indexer,
    sem: IoSemaphore,
    build_lock: Mutex<()>,
    initialized: AtomicBool,
}

impl VaultManager {
    /// Manager over `root` indexing `.md` / `.mdx` files.
    pub fn new(root: impl AsRef<Path>, max_concurrent_io: usize) -> Self {
        let root = absolute_root(root.as_ref());
        Self {
            walker: DirectoryWalker::markdown(&root),
            indexer: Indexer::new(),
            sem: IoSemaphore::new(max_concurrent_io),
            build_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            root,
        }
    }

    /// Manager configured from the `[vault]` section.
    pub fn from_config(config: &VaultConfig) -> anyhow::Result<Self> {
        let root = absolute_root(&config.root);
        let walker = DirectoryWalker::new(&root, &config.extensions, &config.exclude_globs)?;
        Ok(Self {
            walker,
            indexer: Indexer::new(),
            sem: IoSemaphore::new(config.max_concurrent_io),
            build_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the index once. Concurrent callers wait for the same build.
    pub async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.build_lock.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.rebuild().await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Discard the index and build it again from disk.
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.build_lock.lock().await;
        self.initialized.store(false, Ordering::Release);
        self.rebuild().await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn rebuild(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Err(VaultError::VaultMissing(self.root.clone()));
        }
        let paths = self.walker.walk(&self.root, &self.sem).await;
        self.indexer.build(&paths, &self.sem).await;
        tracing::debug!(
            root = %self.root.display(),
            files = self.indexer.total_files(),
            "vault indexed"
        );
        Ok(())
    }

    pub async fn all_documents(&self) -> Result<Vec<DocumentIndex>> {
        self.initialize().await?;
        Ok(self.indexer.all_documents())
    }

    pub async fn search_documents(&self, keyword: &str) -> Result<Vec<DocumentIndex>> {
        self.initialize().await?;
        Ok(self.indexer.search(keyword))
    }

    pub fn stats(&self) -> VaultStats {
        VaultStats {
            total_files: self.indexer.total_files(),
            is_initialized: self.initialized.load(Ordering::Acquire),
            vault_path: self.root.clone(),
        }
    }

    /// Map a caller-supplied name to an indexed file path.
    ///
    /// Tried in order: the exact path, the name with `.md` / `.mdx`
    /// appended (only when it has no markdown extension), then the first
    /// search hit whose path contains the name's stem.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let candidate = self.bounded(filename)?;
        if is_file(&candidate).await {
            self.check_canonical(filename, &candidate).await?;
            return Ok(candidate);
        }

        if !has_markdown_extension(filename) {
            for ext in ["md", "mdx"] {
                let with_ext = self.bounded(&format!("{filename}.{ext}"))?;
                if is_file(&with_ext).await {
                    self.check_canonical(filename, &with_ext).await?;
                    return Ok(with_ext);
                }
            }
        }

        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        for term in [strip_markdown_extension(filename), stem.as_str()] {
            if term.is_empty() {
                continue;
            }
            let hit = self
                .indexer
                .search(term)
                .into_iter()
                .find(|doc| doc.file_path.to_string_lossy().contains(term));
            if let Some(doc) = hit {
                return Ok(doc.file_path);
            }
        }

        Err(VaultError::NotFound(filename.to_string()))
    }

    /// Load a document with the requested extras. Boundary violations are
    /// errors; anything that simply cannot be found is `Ok(None)`.
    pub async fn get_document_info(
        &self,
        filename: &str,
        options: DocumentInfoOptions,
    ) -> Result<Option<EnrichedDocument>> {
        self.initialize().await?;

        let path = match self.resolve(filename).await {
            Ok(path) => path,
            Err(VaultError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(index) = self.indexer.document(&path) else {
            return Ok(None);
        };

        let read = {
            let _permit = self.sem.acquire().await;
            tokio::fs::read_to_string(&path).await
        };
        let full = match read {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read document");
                return Ok(None);
            }
        };

        let content = match options.max_content_preview {
            Some(limit) => full.chars().take(limit).collect(),
            None => full.clone(),
        };

        Ok(Some(EnrichedDocument {
            content_hash: options.include_content_hash.then(|| sha256_hex(&full)),
            stats: options.include_stats.then(|| DocumentStats::of(&full)),
            backlinks: options.include_backlinks.then(|| self.backlinks_for(&path)),
            content,
            index,
        }))
    }

    fn backlinks_for(&self, path: &Path) -> Vec<Backlink> {
        self.indexer
            .backlinks(path)
            .into_iter()
            .map(|source| {
                let title = self
                    .indexer
                    .document(&source)
                    .and_then(|doc| doc.frontmatter.title)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| fallback_title(&source));
                Backlink {
                    file_path: source,
                    title,
                }
            })
            .collect()
    }

    /// Merge `updates` into the frontmatter of `filename` (created if
    /// missing), then rebuild the index.
    pub async fn write_document(&self, filename: &str, updates: &Mapping) -> Result<()> {
        let path = self.resolve_for_write(filename).await?;
        {
            let _permit = self.sem.acquire().await;
            let existing = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            };
            let merged = frontmatter::merge(&existing, updates)?;
            tokio::fs::write(&path, merged).await?;
        }
        self.refresh().await
    }

    /// Write `content` verbatim to `filename`, creating parent directories,
    /// then rebuild the index.
    pub async fn write_raw_document(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.resolve_for_write(filename).await?;
        {
            let _permit = self.sem.acquire().await;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.check_canonical_parent(filename, &path).await?;
            tokio::fs::write(&path, content).await?;
        }
        self.refresh().await?;
        Ok(path)
    }

    async fn resolve_for_write(&self, filename: &str) -> Result<PathBuf> {
        let path = self.bounded(filename)?;
        if path == self.root {
            return Err(self.outside(filename, path));
        }
        if is_file(&path).await {
            self.check_canonical(filename, &path).await?;
        } else {
            self.check_canonical_parent(filename, &path).await?;
        }
        Ok(path)
    }

    /// Lexical boundary check. Absolute inputs replace the root in the join.
    fn bounded(&self, filename: &str) -> Result<PathBuf> {
        let candidate = normalize_path(&self.root.join(filename));
        if candidate.starts_with(&self.root) {
            Ok(candidate)
        } else {
            Err(self.outside(filename, candidate))
        }
    }

    async fn check_canonical(&self, filename: &str, path: &Path) -> Result<()> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let real = tokio::fs::canonicalize(path).await?;
        if real.starts_with(&root) {
            Ok(())
        } else {
            Err(self.outside(filename, real))
        }
    }

    /// Canonical check on the nearest existing ancestor of a path that does
    /// not exist yet.
    async fn check_canonical_parent(&self, filename: &str, path: &Path) -> Result<()> {
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            if tokio::fs::try_exists(dir).await.unwrap_or(false) {
                return self.check_canonical(filename, dir).await;
            }
            ancestor = dir.parent();
        }
        Ok(())
    }

    fn outside(&self, filename: &str, resolved: PathBuf) -> VaultError {
        VaultError::OutsideVault {
            input: filename.to_string(),
            resolved,
            root: self.root.clone(),
        }
    }
}

fn absolute_root(root: &Path) -> PathBuf {
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    normalize_path(&absolute)
}

/// Fold `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

fn has_markdown_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".mdx")
}

fn strip_markdown_extension(name: &str) -> &str {
    name.strip_suffix(".mdx")
        .or_else(|| name.strip_suffix(".md"))
        .unwrap_or(name)
}

fn fallback_title(path: &Path) -> String {
    let name = file_name_of(path);
    let title = name.strip_suffix(".md").unwrap_or(&name);
    if title.is_empty() {
        "Untitled".to_string()
    } else {
        title.to_string()
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn vault_with(files: &[(&str, &str)]) -> (TempDir, VaultManager) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("vault");
        fs::create_dir_all(&root).unwrap();
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let vault = VaultManager::new(&root, 4);
        (tmp, vault)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/vault/notes/../a/./b.md")),
            PathBuf::from("/vault/a/b.md")
        );
        assert_eq!(
            normalize_path(Path::new("/vault/../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[tokio::test]
    async fn test_initialize_fails_for_missing_root() {
        let tmp = TempDir::new().unwrap();
        let vault = VaultManager::new(tmp.path().join("nope"), 2);
        let err = vault.initialize().await.unwrap_err();
        assert!(matches!(err, VaultError::VaultMissing(_)));
        assert!(!vault.stats().is_initialized);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_builds_once() {
        let (_tmp, vault) = vault_with(&[("a.md", "alpha")]);
        let vault = Arc::new(vault);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let vault = vault.clone();
                tokio::spawn(async move { vault.initialize().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let stats = vault.stats();
        assert!(stats.is_initialized);
        assert_eq!(stats.total_files, 1);
    }

    #[tokio::test]
    async fn test_resolve_fallbacks() {
        let (_tmp, vault) = vault_with(&[
            ("Meeting Notes.md", "# Meeting"),
            ("deep/Roadmap.mdx", "plans"),
        ]);
        vault.initialize().await.unwrap();
        let root = vault.root().to_path_buf();

        assert_eq!(
            vault.resolve("Meeting Notes.md").await.unwrap(),
            root.join("Meeting Notes.md")
        );
        assert_eq!(
            vault.resolve("Meeting Notes").await.unwrap(),
            root.join("Meeting Notes.md")
        );
        assert_eq!(
            vault.resolve("deep/Roadmap").await.unwrap(),
            root.join("deep/Roadmap.mdx")
        );
        // Fuzzy match goes through the index but path containment is
        // case-sensitive.
        assert!(matches!(
            vault.resolve("roadmap.md").await,
            Err(VaultError::NotFound(_))
        ));
        assert_eq!(
            vault.resolve("Roadmap.mdx").await.unwrap(),
            root.join("deep/Roadmap.mdx")
        );
        assert!(matches!(
            vault.resolve("missing").await,
            Err(VaultError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_traversal_rejected() {
        let (tmp, vault) = vault_with(&[("a.md", "alpha")]);
        fs::write(tmp.path().join("secret.md"), "secret").unwrap();

        let err = vault
            .get_document_info("../secret.md", DocumentInfoOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_boundary_violation());

        let outside = tmp.path().join("secret.md");
        let err = vault
            .get_document_info(outside.to_str().unwrap(), DocumentInfoOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_boundary_violation());
    }

    #[tokio::test]
    async fn test_unresolvable_is_none() {
        let (_tmp, vault) = vault_with(&[("a.md", "alpha")]);
        let doc = vault
            .get_document_info("nothing-here", DocumentInfoOptions::default())
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_document_info_extras() {
        let body = "---\ntitle: Target Note\n---\nline one\nline two";
        let (_tmp, vault) = vault_with(&[
            ("target.md", body),
            ("linker.md", "---\ntitle: Linker\n---\nsee [[target]]"),
            ("plain.md", "also [[Target.md|t]]"),
        ]);

        let doc = vault
            .get_document_info(
                "target.md",
                DocumentInfoOptions {
                    include_stats: true,
                    include_backlinks: true,
                    max_content_preview: Some(10),
                    include_content_hash: true,
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(doc.content.chars().count(), 10);
        let stats = doc.stats.unwrap();
        assert_eq!(stats.content_length, body.chars().count());
        assert_eq!(stats.line_count, 5);
        assert_eq!(doc.content_hash.as_deref(), Some(sha256_hex(body).as_str()));

        let titles: Vec<_> = doc.backlinks.unwrap().into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["Linker", "plain"]);
    }

    #[tokio::test]
    async fn test_write_document_merges_frontmatter() {
        let (_tmp, vault) = vault_with(&[("inside.md", "# content")]);
        let mut updates = Mapping::new();
        updates.insert("title".into(), "Inside".into());
        vault.write_document("inside.md", &updates).await.unwrap();

        let written = fs::read_to_string(vault.root().join("inside.md")).unwrap();
        assert!(written.contains("title: Inside"));
        assert!(written.ends_with("# content"));
        assert_eq!(vault.search_documents("inside").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writes_outside_vault_rejected() {
        let (tmp, vault) = vault_with(&[]);
        let outside = tmp.path().join("outside.md");
        let mut updates = Mapping::new();
        updates.insert("title".into(), "Blocked".into());

        let err = vault
            .write_document("../outside.md", &updates)
            .await
            .unwrap_err();
        assert!(err.is_boundary_violation());
        let err = vault
            .write_raw_document(outside.to_str().unwrap(), "blocked")
            .await
            .unwrap_err();
        assert!(err.is_boundary_violation());
        assert!(!outside.exists());
    }

    #[tokio::test]
    async fn test_write_raw_creates_parents_and_reindexes() {
        let (_tmp, vault) = vault_with(&[]);
        vault.initialize().await.unwrap();
        let path = vault
            .write_raw_document("memory/snapshot.md", "# memory")
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "# memory");
        assert_eq!(vault.stats().total_files, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let (tmp, vault) = vault_with(&[("a.md", "alpha")]);
        let outside_dir = tmp.path().join("elsewhere");
        fs::create_dir_all(&outside_dir).unwrap();
        fs::write(outside_dir.join("leak.md"), "leak").unwrap();
        std::os::unix::fs::symlink(&outside_dir, vault.root().join("link")).unwrap();

        let err = vault.resolve("link/leak.md").await.unwrap_err();
        assert!(err.is_boundary_violation());
    }
}
