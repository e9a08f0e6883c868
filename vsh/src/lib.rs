//! vsh - command shell for a capability-scoped virtual filesystem
//!
//! This crate provides:
//! - Command resolution over `/cmd`, `/sys/cmd` and `/sys/bin` (binary
//!   modules, scripts and buildable source directories)
//! - On-demand builds of source directories with a content-keyed cache
//! - Foreground dispatch that hands the shell's single stdin stream to the
//!   running child and takes it back afterwards
//! - A small set of built-in line commands over the virtual filesystem

pub mod build;
pub mod builtins;
pub mod dispatch;
pub mod error;
pub mod expansion;
pub mod help;
pub mod lexer;
pub mod process;
pub mod reader;
pub mod resolve;
pub mod shell;
pub mod stdin;
pub mod vfs;

pub use build::{BuildError, Builder, ToolchainBuilder};
pub use dispatch::Dispatcher;
pub use error::{ShellError, ShellResult};
pub use process::{ExitStatus, HostRuntime, ProcessRuntime};
pub use reader::{LineReader, ScriptReader, TerminalReader};
pub use resolve::{Resolver, Target};
pub use shell::{Shell, ShellBuilder};
pub use stdin::{BlockingBuffer, StdinRoute, SwitchableWriter};
pub use vfs::{HostFs, Vfs, VfsError};
