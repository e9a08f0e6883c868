//! VSH Configuration System
//!
//! Provides YAML-based configuration for the `vsh` shell.
//!
//! # Configuration Loading Priority
//!
//! 1. Compiled-in defaults
//! 2. `/etc/vsh/vsh.yaml` (system-wide)
//! 3. `~/.config/vsh/vsh.yaml` (user)
//! 4. `./vsh.yaml` (project-local)
//! 5. `VSH_CONFIG=/path/to/config.yaml` (explicit, replaces 2-4)
//! 6. Environment variables (highest priority)
//!
//! # Example Configuration
//!
//! ```yaml
//! root:
//!   path: "~/vsh-root"
//!
//! shell:
//!   prompt: "vsh:{cwd}> "
//!
//! runtime:
//!   wasm_runner: ["wasmtime", "run", "--dir", "{root}::/"]
//!
//! build:
//!   command: ["go", "build", "-o", "{out}", "."]
//!   env:
//!     GOOS: wasip1
//!     GOARCH: wasm
//! ```

#![allow(missing_docs)]

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::{expand_home, ConfigLoader};
pub use types::*;

/// Load configuration from default locations.
///
/// Searches for config files in order and merges them.
/// Environment variables override file values.
pub fn load() -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().load()
}

/// Load configuration from a specific file.
pub fn load_from_file(path: &str) -> Result<VshConfig, ConfigError> {
    ConfigLoader::new().with_file(path).load()
}
