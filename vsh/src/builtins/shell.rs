use std::io::Write;

use super::{is_builtin, usage};
use crate::error::{ShellError, ShellResult};
use crate::expansion::{split_assignment, Env};
use crate::help;
use crate::resolve::Target;
use crate::shell::Shell;

impl Shell {
    pub(super) fn dispatch_shell_builtin(
        &mut self,
        name: &str,
        args: &[String],
        env: &Env,
    ) -> ShellResult<()> {
        match name {
            "exit" => Self::cmd_exit(args),
            "echo" => self.writeln(&args.join(" ")),
            "env" | "printenv" => self.cmd_env(args, env),
            "export" => self.cmd_export(args),
            "which" => self.cmd_which(args),
            "help" => self.cmd_help(args),
            _ => unreachable!(),
        }
    }

    fn cmd_exit(args: &[String]) -> ShellResult<()> {
        let code = match args.first() {
            Some(arg) => arg
                .parse::<i32>()
                .map_err(|_| ShellError::Usage(format!("exit: {arg}: numeric argument required")))?,
            None => 0,
        };
        Err(ShellError::Exit(code))
    }

    fn cmd_env(&mut self, args: &[String], env: &Env) -> ShellResult<()> {
        if let Some(name) = args.first() {
            let value = env
                .get(name)
                .ok_or_else(|| ShellError::UndefinedVariable(name.clone()))?;
            return self.writeln(value);
        }

        let mut vars: Vec<_> = env.iter().collect();
        vars.sort();
        for (name, value) in vars {
            writeln!(self.stdout, "{name}={value}")?;
        }
        Ok(())
    }

    fn cmd_export(&mut self, args: &[String]) -> ShellResult<()> {
        if args.is_empty() {
            return Err(usage("export"));
        }
        for arg in args {
            let (name, value) = split_assignment(arg)
                .ok_or_else(|| ShellError::Usage(format!("export: `{arg}': not a valid assignment")))?;
            self.set_var(name, value);
        }
        Ok(())
    }

    fn cmd_which(&mut self, args: &[String]) -> ShellResult<()> {
        if args.is_empty() {
            return Err(usage("which"));
        }
        for name in args {
            if is_builtin(name) {
                self.writeln(&format!("{name}: shell built-in"))?;
                continue;
            }
            match self.dispatcher.resolver().probe(name, &self.cwd) {
                Target::Binary(path) | Target::Script(path) => self.writeln(&path)?,
                Target::BuildDir(path) => self.writeln(&format!("{path} (built on first use)"))?,
                Target::NotFound(name) => return Err(ShellError::NotFound(name)),
            }
        }
        Ok(())
    }

    fn cmd_help(&mut self, args: &[String]) -> ShellResult<()> {
        if let Some(name) = args.first() {
            let cmd = help::get_help(name)
                .ok_or_else(|| ShellError::Usage(format!("help: no help for '{name}'")))?;
            self.stdout.write_all(help::format_help(cmd).as_bytes())?;
        } else {
            self.stdout.write_all(help::format_help_list().as_bytes())?;
        }
        Ok(())
    }
}
