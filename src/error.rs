//! Error types shared across the crate.

use std::io;
use std::path::PathBuf;

/// Rejection reasons produced by the path resolver and module loader.
///
/// Every nested import failure inside the runtime bottoms out in one of
/// these; the engine wraps them into the dynamic-import rejection the
/// dispatcher sees (and negatively caches).
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The specifier names a URL scheme other than a local file.
    #[error("remote import rejected: '{0}' does not name a sandbox-local module")]
    RemoteImport(String),

    /// The specifier resolves outside the sandbox root, before or after
    /// symlink resolution.
    #[error("path traversal rejected: {0:?} resolves outside the sandbox root")]
    PathTraversal(PathBuf),

    /// No regular file exists at the resolved path.
    #[error("module not found: {0:?}")]
    NotFound(PathBuf),

    /// The file exists but is not an ES-module-compatible source file.
    #[error("unsupported module extension: {0:?} (only .js and .mjs are loadable)")]
    UnsupportedExtension(PathBuf),

    /// Reading a previously resolved module failed.
    #[error("failed to read module {path:?}: {source}")]
    LoadIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configured sandbox root could not be canonicalized or is not a
    /// directory.
    #[error("sandbox root {path:?} is unusable: {reason}")]
    BadRoot { path: PathBuf, reason: String },
}

/// Host-level render outcomes that are not a successful body.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Runtime construction failed. Fatal in single-shot mode; in server
    /// mode the next request retries construction from scratch.
    #[error("bootstrap failed: {0}")]
    Bootstrap(String),

    /// The props value was rejected before reaching the runtime.
    #[error("invalid props: {0}")]
    Props(String),

    /// User code (or its module graph) failed. The runtime and its caches
    /// are kept.
    #[error("{0}")]
    Render(String),

    /// The deadline watchdog terminated the render. The runtime has been
    /// discarded; the next render is a cold start.
    #[error("render timed out after {0} ms")]
    Timeout(u64),

    /// V8 approached the configured heap ceiling and execution was
    /// terminated. The runtime has been discarded.
    #[error("render exceeded the heap limit")]
    HeapExhausted,
}

impl SandboxError {
    /// Whether this error invalidated the runtime (caches lost, next render
    /// pays a cold start).
    pub fn is_fatal_to_runtime(&self) -> bool {
        matches!(self, SandboxError::Timeout(_) | SandboxError::HeapExhausted)
    }
}
