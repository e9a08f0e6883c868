//! Process runtime: starting resolved targets as child processes.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use vsh_config::RuntimeConfig;

use crate::stdin::Sink;
use crate::vfs::Vfs;

/// What a child process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// Binary module at this virtual path
    Module(String),
    /// Script at this virtual path, run by a nested shell
    Script(String),
}

#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: Program,
    pub args: Vec<String>,
    /// Complete child environment; nothing else is inherited.
    pub env: HashMap<String, String>,
    /// Virtual working directory.
    pub cwd: String,
}

impl ProcessSpec {
    pub fn name(&self) -> &str {
        match &self.program {
            Program::Module(path) | Program::Script(path) => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitStatus {
    pub fn success(self) -> bool {
        self == Self::Code(0)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit status {code}"),
            Self::Signal(signal) => write!(f, "terminated by signal {signal}"),
            Self::Unknown => write!(f, "terminated abnormally"),
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }
        Self::Unknown
    }
}

/// A started child.
#[async_trait]
pub trait Process: Send {
    fn id(&self) -> u32;

    /// Hand over the write end of the child's input pipe. Returns `None` on
    /// the second call.
    fn take_stdin(&mut self) -> Option<Sink>;

    /// Wait for the child to terminate.
    async fn wait(&mut self) -> io::Result<ExitStatus>;
}

pub trait ProcessRuntime: Send + Sync {
    fn start(&self, spec: &ProcessSpec) -> io::Result<Box<dyn Process>>;
}

/// Runs targets as host processes.
///
/// Modules go through an external module runner, scripts re-enter the shell
/// executable. Output and error streams are inherited from the shell.
pub struct HostRuntime {
    vfs: Arc<dyn Vfs>,
    root: PathBuf,
    wasm_runner: Vec<String>,
    shell: PathBuf,
}

impl HostRuntime {
    pub fn new(vfs: Arc<dyn Vfs>, root: PathBuf, wasm_runner: Vec<String>, shell: PathBuf) -> Self {
        Self {
            vfs,
            root,
            wasm_runner,
            shell,
        }
    }

    /// Runtime from configuration; scripts fall back to the running executable.
    pub fn from_config(vfs: Arc<dyn Vfs>, root: PathBuf, config: &RuntimeConfig) -> io::Result<Self> {
        let shell = match &config.shell {
            Some(shell) => PathBuf::from(shell),
            None => std::env::current_exe()?,
        };
        Ok(Self::new(vfs, root, config.wasm_runner.clone(), shell))
    }

    fn command(&self, spec: &ProcessSpec) -> io::Result<Command> {
        let root = self.root.to_string_lossy();
        let mut command = match &spec.program {
            Program::Module(path) => {
                let (runner, runner_args) = self.wasm_runner.split_first().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "no module runner configured")
                })?;
                let mut command = Command::new(runner);
                command
                    .args(runner_args.iter().map(|arg| arg.replace("{root}", &root)))
                    .arg(self.vfs.host_path(path).map_err(io::Error::other)?)
                    .args(&spec.args);
                command
            }
            Program::Script(path) => {
                let mut command = Command::new(&self.shell);
                command
                    .arg("--root")
                    .arg(&self.root)
                    .arg("--")
                    .arg(path)
                    .args(&spec.args);
                command
            }
        };

        command
            .env_clear()
            .envs(&spec.env)
            .env("VSH_ROOT", &self.root)
            .env("VSH_CWD", &spec.cwd)
            .current_dir(self.vfs.host_path(&spec.cwd).map_err(io::Error::other)?)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        Ok(command)
    }
}

impl ProcessRuntime for HostRuntime {
    fn start(&self, spec: &ProcessSpec) -> io::Result<Box<dyn Process>> {
        let child = self.command(spec)?.spawn()?;
        tracing::debug!(pid = child.id(), name = %spec.name(), args = ?spec.args, "Started process");
        Ok(Box::new(HostProcess {
            id: child.id(),
            child: Some(child),
        }))
    }
}

struct HostProcess {
    id: u32,
    child: Option<Child>,
}

#[async_trait]
impl Process for HostProcess {
    fn id(&self) -> u32 {
        self.id
    }

    fn take_stdin(&mut self) -> Option<Sink> {
        let stdin = self.child.as_mut()?.stdin.take()?;
        Some(Box::new(stdin))
    }

    async fn wait(&mut self) -> io::Result<ExitStatus> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| io::Error::other("process already waited on"))?;
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(io::Error::other)??;
        tracing::debug!(pid = self.id, status = ?status, "Process exited");
        Ok(status.into())
    }
}
