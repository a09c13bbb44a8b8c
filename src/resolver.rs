//! Path resolution confined to the sandbox root.
//!
//! Every module specifier the engine ever sees (the entry handed to the
//! dispatcher as well as each nested static or dynamic import) passes
//! through [`SandboxRoot::resolve`]. Resolution is stateless: remote
//! schemes are rejected, relative specifiers are joined, the result is
//! canonicalized through symlinks, and the canonical path must stay at or
//! below the root and name a regular `.js`/`.mjs` file.

use std::io;
use std::path::{Component, Path, PathBuf};

use deno_core::ModuleSpecifier;
use url::Url;

use crate::error::ModuleError;

/// The canonical directory that bounds module resolution.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, ModuleError> {
        let requested = dir.as_ref().to_path_buf();
        let root = requested.canonicalize().map_err(|e| ModuleError::BadRoot {
            path: requested.clone(),
            reason: e.to_string(),
        })?;
        if !root.is_dir() {
            return Err(ModuleError::BadRoot {
                path: root,
                reason: "not a directory".to_string(),
            });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `specifier` against `referrer` (or the root when the
    /// referrer is absent or not a local file, as for the entry specifier
    /// imported from the bootstrap module).
    pub fn resolve(
        &self,
        specifier: &str,
        referrer: Option<&Url>,
    ) -> Result<ModuleSpecifier, ModuleError> {
        let candidate = match Url::parse(specifier) {
            Ok(url) => {
                if url.scheme() != "file" {
                    return Err(ModuleError::RemoteImport(specifier.to_string()));
                }
                if url.host_str().is_some_and(|h| !h.is_empty()) {
                    // file URLs with a remote authority are network paths
                    return Err(ModuleError::RemoteImport(specifier.to_string()));
                }
                url.to_file_path()
                    .map_err(|_| ModuleError::RemoteImport(specifier.to_string()))?
            }
            Err(_) => self.join(specifier, referrer),
        };

        // Lexical containment first, so traversal to a nonexistent target
        // still reports traversal rather than not-found.
        let lexical = lexical_normalize(&candidate);
        if !lexical.starts_with(&self.root) {
            return Err(ModuleError::PathTraversal(lexical));
        }

        let canonical = self.admit(&lexical)?;
        ModuleSpecifier::from_file_path(&canonical)
            .map_err(|_| ModuleError::NotFound(canonical))
    }

    /// Canonicalize `path` and re-check every admission rule against the
    /// real file: containment after symlink resolution, regular-file type,
    /// and module extension.
    pub fn admit(&self, path: &Path) -> Result<PathBuf, ModuleError> {
        let canonical = path.canonicalize().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ModuleError::NotFound(path.to_path_buf()),
            _ => ModuleError::LoadIo {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        if !canonical.starts_with(&self.root) {
            return Err(ModuleError::PathTraversal(canonical));
        }
        if !canonical.is_file() {
            return Err(ModuleError::NotFound(canonical));
        }
        match canonical.extension().and_then(|e| e.to_str()) {
            Some("js") | Some("mjs") => Ok(canonical),
            _ => Err(ModuleError::UnsupportedExtension(canonical)),
        }
    }

    fn join(&self, specifier: &str, referrer: Option<&Url>) -> PathBuf {
        if specifier.starts_with('/') {
            return PathBuf::from(specifier);
        }
        if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = referrer
                .and_then(|r| r.to_file_path().ok())
                .and_then(|p| p.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| self.root.clone());
            return base.join(specifier);
        }
        // Bare specifiers name files relative to the root, matching how
        // build pipelines emit sibling chunk references.
        self.root.join(specifier)
    }
}

/// Fold `.` and `..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
