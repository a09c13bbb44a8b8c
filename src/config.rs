//! Immutable sandbox configuration.
//!
//! Built once by the driver, shared read-only for the life of the host.
//! The root directory is canonicalized and origins are normalized at
//! construction time so nothing on the render path has to revalidate them.

use std::io;
use std::path::{Path, PathBuf};

use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid sandbox root {path:?}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sandbox root {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid origin '{origin}': {reason}")]
    Origin { origin: String, reason: String },
}

/// Capability configuration for one isolate host.
///
/// `allow_origin` entries are reduced to their ASCII origin serialization
/// (`scheme://host[:port]`, default ports elided, hostname lowercased) so
/// the fetch op can compare by string equality.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    root_dir: PathBuf,
    max_heap_bytes: Option<usize>,
    max_render_ms: Option<u64>,
    allowed_origins: Vec<String>,
}

impl SandboxConfig {
    /// Create a configuration rooted at `root_dir` with no resource limits
    /// and an empty origin allowlist (fetch disabled).
    pub fn new(root_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let requested = root_dir.as_ref().to_path_buf();
        let canonical = requested.canonicalize().map_err(|source| ConfigError::Root {
            path: requested.clone(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(ConfigError::NotADirectory(canonical));
        }
        Ok(Self {
            root_dir: canonical,
            max_heap_bytes: None,
            max_render_ms: None,
            allowed_origins: Vec::new(),
        })
    }

    /// Cap the V8 heap at `bytes`. Zero means unlimited.
    pub fn with_heap_limit(mut self, bytes: usize) -> Self {
        self.max_heap_bytes = (bytes != 0).then_some(bytes);
        self
    }

    /// Cap each render at `ms` of wall-clock time. Zero means unlimited.
    pub fn with_render_timeout(mut self, ms: u64) -> Self {
        self.max_render_ms = (ms != 0).then_some(ms);
        self
    }

    /// Permit `fetch` to address `origin` (e.g. `https://api.example.com`).
    pub fn allow_origin(mut self, origin: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(origin).map_err(|e| ConfigError::Origin {
            origin: origin.to_string(),
            reason: e.to_string(),
        })?;
        let normalized = url.origin().ascii_serialization();
        if normalized == "null" {
            return Err(ConfigError::Origin {
                origin: origin.to_string(),
                reason: "origin is opaque".to_string(),
            });
        }
        if !self.allowed_origins.contains(&normalized) {
            self.allowed_origins.push(normalized);
        }
        Ok(self)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn heap_limit(&self) -> Option<usize> {
        self.max_heap_bytes
    }

    pub fn render_timeout_ms(&self) -> Option<u64> {
        self.max_render_ms
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }
}
