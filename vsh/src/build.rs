//! On-demand compilation of command source directories.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use vsh_config::BuildConfig;

use crate::resolve::{is_binary_module, BINARY_EXT, SOURCE_EXT};
use crate::vfs::{file_name, join, Vfs, VfsError};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build failed for {path}: {message}")]
    Failed { path: String, message: String },

    #[error("build of {path} produced no binary module")]
    NoOutput { path: String },

    #[error("{path}: source directory has not been built")]
    NotBuilt { path: String },

    #[error("unable to run build toolchain for {path}: {source}")]
    Toolchain {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Vfs(#[from] VfsError),
}

/// Turns a directory of source files into a runnable binary module.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build `source_dir` and return the virtual path of the module.
    async fn build(&self, source_dir: &str) -> Result<String, BuildError>;
}

/// Builder that shells out to a host toolchain.
///
/// Outputs are cached under `cache_dir`, keyed by the toolchain invocation
/// and the names and contents of the source files.
pub struct ToolchainBuilder {
    vfs: Arc<dyn Vfs>,
    command: Vec<String>,
    env: BTreeMap<String, String>,
    cache_dir: String,
}

impl ToolchainBuilder {
    pub fn new(vfs: Arc<dyn Vfs>, command: Vec<String>, cache_dir: &str) -> Self {
        Self {
            vfs,
            command,
            env: BTreeMap::new(),
            cache_dir: cache_dir.to_string(),
        }
    }

    pub fn from_config(vfs: Arc<dyn Vfs>, config: &BuildConfig) -> Self {
        Self {
            vfs,
            command: config.command.clone(),
            env: config.env.clone(),
            cache_dir: config.cache_dir.clone(),
        }
    }

    fn cache_key(&self, sources: &[String]) -> Result<String, BuildError> {
        let mut hasher = Sha256::new();
        for arg in &self.command {
            hasher.update(arg.as_bytes());
            hasher.update([0]);
        }
        for (name, value) in &self.env {
            hasher.update(format!("{name}={value}").as_bytes());
            hasher.update([0]);
        }
        for source in sources {
            hasher.update(file_name(source).as_bytes());
            hasher.update([0]);
            hasher.update(self.vfs.read(source)?);
            hasher.update([0]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Virtual path the module for `source_dir` would be written to.
    pub fn output_path(&self, source_dir: &str) -> Result<String, BuildError> {
        let sources = self.vfs.list_glob(source_dir, SOURCE_EXT)?;
        let key = self.cache_key(&sources)?;
        Ok(join(
            &self.cache_dir,
            &format!("{}-{}.{}", file_name(source_dir), &key[..16], BINARY_EXT),
        ))
    }
}

#[async_trait]
impl Builder for ToolchainBuilder {
    async fn build(&self, source_dir: &str) -> Result<String, BuildError> {
        let output = self.output_path(source_dir)?;
        if is_binary_module(self.vfs.as_ref(), &output) {
            tracing::debug!(source = %source_dir, output = %output, "Using cached build");
            return Ok(output);
        }

        let Some((program, rest)) = self.command.split_first() else {
            return Err(BuildError::Failed {
                path: source_dir.to_string(),
                message: "no build command configured".to_string(),
            });
        };

        self.vfs.mkdir(&self.cache_dir, true)?;
        let out_host = self.vfs.host_path(&output)?;
        let src_host = self.vfs.host_path(source_dir)?;
        let substitute = |arg: &String| {
            arg.replace("{out}", &out_host.to_string_lossy())
                .replace("{src}", &src_host.to_string_lossy())
        };

        tracing::info!(source = %source_dir, output = %output, "Building command source");
        let result = tokio::process::Command::new(substitute(program))
            .args(rest.iter().map(substitute))
            .envs(&self.env)
            .current_dir(&src_host)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| BuildError::Toolchain {
                path: source_dir.to_string(),
                source,
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("toolchain exited with {}", result.status)
            } else {
                stderr
            };
            return Err(BuildError::Failed {
                path: source_dir.to_string(),
                message,
            });
        }

        if !is_binary_module(self.vfs.as_ref(), &output) {
            return Err(BuildError::NoOutput {
                path: source_dir.to_string(),
            });
        }

        Ok(output)
    }
}
