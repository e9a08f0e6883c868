//! Command resolution.
//!
//! Maps a command token to a [`Target`]. Bare names are looked up in
//! [`SEARCH_DIRS`]; in each directory a binary module beats a script, which
//! beats a buildable source directory. Qualified names (anything with a `/`)
//! are taken literally relative to the current directory.

use std::sync::Arc;

use crate::build::{BuildError, Builder};
use crate::vfs::{extension, join, resolve_path, strip_extension, Vfs};

/// Command lookup directories, highest priority first.
pub const SEARCH_DIRS: &[&str] = &["/cmd", "/sys/cmd", "/sys/bin"];

pub const BINARY_EXT: &str = "wasm";
pub const SCRIPT_EXT: &str = "sh";
pub const SOURCE_EXT: &str = "go";

/// Header every binary module starts with.
pub const BINARY_MAGIC: &[u8; 4] = b"\0asm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Text script run by a nested shell
    Script(String),
    /// Binary module run directly
    Binary(String),
    /// Source directory that must be built first
    BuildDir(String),
    /// Nothing matched; carries the requested name
    NotFound(String),
}

impl Target {
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Script(path) | Self::Binary(path) | Self::BuildDir(path) => Some(path),
            Self::NotFound(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Script(_) => "script",
            Self::Binary(_) => "binary",
            Self::BuildDir(_) => "source",
            Self::NotFound(_) => "not found",
        }
    }
}

/// True when `path` is a file whose content starts with [`BINARY_MAGIC`].
pub fn is_binary_module(vfs: &dyn Vfs, path: &str) -> bool {
    vfs.read_head(path, BINARY_MAGIC.len())
        .map(|head| head == BINARY_MAGIC)
        .unwrap_or(false)
}

fn is_file(vfs: &dyn Vfs, path: &str) -> bool {
    vfs.stat(path).map(|info| !info.is_dir).unwrap_or(false)
}

fn has_sources(vfs: &dyn Vfs, path: &str) -> bool {
    vfs.is_dir(path)
        && vfs
            .list_glob(path, SOURCE_EXT)
            .map(|sources| !sources.is_empty())
            .unwrap_or(false)
}

pub struct Resolver {
    vfs: Arc<dyn Vfs>,
    builder: Arc<dyn Builder>,
    search_dirs: Vec<String>,
}

impl Resolver {
    pub fn new(vfs: Arc<dyn Vfs>, builder: Arc<dyn Builder>) -> Self {
        Self {
            vfs,
            builder,
            search_dirs: SEARCH_DIRS.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    pub fn search_dirs(&self) -> &[String] {
        &self.search_dirs
    }

    /// Resolve `name`, building source directories on the way.
    ///
    /// The result is never [`Target::BuildDir`]: a successful build turns it
    /// into [`Target::Binary`] and a failed one is returned as an error.
    pub async fn resolve(&self, name: &str, cwd: &str) -> Result<Target, BuildError> {
        match self.probe(name, cwd) {
            Target::BuildDir(path) => {
                let built = self.builder.build(&path).await?;
                tracing::debug!(name = %name, source = %path, binary = %built, "Built command");
                Ok(Target::Binary(built))
            }
            target => Ok(target),
        }
    }

    /// Work out the target kind without building anything.
    pub fn probe(&self, name: &str, cwd: &str) -> Target {
        let target = if name.contains('/') {
            self.probe_qualified(&resolve_path(cwd, name))
        } else {
            let base = strip_extension(name);
            self.search_dirs
                .iter()
                .find_map(|dir| self.probe_dir(dir, base))
        };

        let target = target.unwrap_or_else(|| Target::NotFound(name.to_string()));
        tracing::debug!(name = %name, kind = target.kind(), path = ?target.path(), "Resolved command");
        target
    }

    fn probe_dir(&self, dir: &str, base: &str) -> Option<Target> {
        let vfs = self.vfs.as_ref();

        let binary = join(dir, &format!("{base}.{BINARY_EXT}"));
        if vfs.exists(&binary) {
            if is_binary_module(vfs, &binary) {
                return Some(Target::Binary(binary));
            }
            // a malformed module hides the rest of this directory
            tracing::debug!(path = %binary, "Not a binary module, skipping directory");
            return None;
        }

        let script = join(dir, &format!("{base}.{SCRIPT_EXT}"));
        if is_file(vfs, &script) {
            return Some(Target::Script(script));
        }

        let source = join(dir, base);
        has_sources(vfs, &source).then_some(Target::BuildDir(source))
    }

    fn probe_qualified(&self, path: &str) -> Option<Target> {
        let vfs = self.vfs.as_ref();
        match extension(path) {
            Some(BINARY_EXT) if is_binary_module(vfs, path) => Some(Target::Binary(path.to_string())),
            Some(BINARY_EXT) => None,
            Some(SCRIPT_EXT) => is_file(vfs, path).then(|| Target::Script(path.to_string())),
            _ => has_sources(vfs, path).then(|| Target::BuildDir(path.to_string())),
        }
    }
}
