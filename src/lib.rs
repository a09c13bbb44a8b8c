//! # ssr-isolate
//!
//! Runs untrusted server-side-rendering bundles inside a capability-confined
//! V8 isolate.
//!
//! The threat model is a compromised front-end build pipeline: the bundle is
//! assumed hostile, and must still be unable to
//!
//! - read the filesystem (module loading is confined to one directory,
//!   after symlink resolution),
//! - probe the environment or spawn processes (no such ops exist),
//! - reach the network, except origins on an operator allowlist via `fetch`,
//! - escape through module resolution (remote schemes and traversal are
//!   rejected for every static and dynamic import),
//! - run forever or exhaust memory (wall-clock deadline and heap ceiling,
//!   enforced by terminating and rebuilding the runtime).
//!
//! The isolate is deliberately reused across renders for JIT warmth; loaded
//! entries and failed loads are cached inside the runtime and discarded with
//! it when a resource violation forces a teardown.
//!
//! ```rust,no_run
//! use ssr_isolate::{IsolateHost, SandboxConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SandboxConfig::new("./dist/chunks")?
//!     .with_heap_limit(64 * 1024 * 1024)
//!     .with_render_timeout(30_000)
//!     .allow_origin("https://api.example.com")?;
//!
//! let mut host = IsolateHost::new(config);
//! let output = host.render("entry.js", serde_json::json!({ "page": "home" })).await?;
//! println!("{}", output.body);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fetch;
mod host;
mod loader;
mod ops;
mod props;
pub mod proto;
mod resolver;

pub use config::{ConfigError, SandboxConfig};
pub use error::{ModuleError, SandboxError};
pub use fetch::FetchPolicy;
pub use host::{IsolateHost, RenderOutput};
pub use loader::ConfinedModuleLoader;
pub use ops::{ConsoleLine, ConsoleSink, LogLevel};
pub use props::PropsError;
pub use resolver::SandboxRoot;
