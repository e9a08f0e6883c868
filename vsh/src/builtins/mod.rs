//! Line commands handled inside the shell process.
//!
//! Built-ins win over the command search path and write to the shell's own
//! output. Their arguments are already tokenized and expanded.

mod fs;
mod shell;

use std::io::Write;

use crate::error::{ShellError, ShellResult};
use crate::expansion::Env;
use crate::help;
use crate::shell::Shell;
use crate::vfs::resolve_path;

pub const BUILTINS: &[&str] = &[
    "cat", "cd", "cp", "echo", "env", "exit", "export", "help", "ls", "mkdir", "mtime", "mv",
    "printenv", "pwd", "rm", "touch", "tree", "which", "write",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

impl Shell {
    pub(crate) fn try_execute_builtin(
        &mut self,
        name: &str,
        args: &[String],
        env: &Env,
    ) -> Option<ShellResult<()>> {
        let result = match name {
            "pwd" | "cd" | "ls" | "cat" | "touch" | "mkdir" | "rm" | "mv" | "cp" | "write"
            | "mtime" | "tree" => self.dispatch_fs_builtin(name, args),
            "exit" | "echo" | "env" | "printenv" | "export" | "which" | "help" => {
                self.dispatch_shell_builtin(name, args, env)
            }
            _ => return None,
        };
        Some(result)
    }

    pub(crate) fn writeln(&mut self, line: &str) -> ShellResult<()> {
        writeln!(self.stdout, "{line}")?;
        Ok(())
    }

    pub(crate) fn resolve_path(&self, path: &str) -> String {
        resolve_path(&self.cwd, path)
    }
}

/// Usage error carrying the command's synopsis.
pub(crate) fn usage(name: &str) -> ShellError {
    let synopsis = help::get_help(name).map_or(name, |h| h.usage);
    ShellError::Usage(format!("usage: {synopsis}"))
}

/// Split leading `-x` style flags from operands.
pub(crate) fn split_flags(args: &[String]) -> (Vec<&str>, Vec<&str>) {
    let mut flags = Vec::new();
    let mut operands = Vec::new();
    let mut only_operands = false;
    for arg in args {
        if only_operands || !arg.starts_with('-') || arg == "-" {
            operands.push(arg.as_str());
        } else if arg == "--" {
            only_operands = true;
        } else {
            flags.push(arg.as_str());
        }
    }
    (flags, operands)
}
