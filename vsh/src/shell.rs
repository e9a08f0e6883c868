//! Shell state and the read-eval loop

use std::io::{self, Write};
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::error::{ShellError, ShellResult};
use crate::expansion::{parse_env_args, Env};
use crate::lexer::tokenize;
use crate::reader::LineReader;
use crate::vfs::Vfs;

pub const DEFAULT_PROMPT: &str = "{cwd} ▶ ";

pub struct Shell {
    pub(crate) cwd: String,
    pub(crate) env: Env,
    pub(crate) vfs: Arc<dyn Vfs>,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
    positional: Vec<String>,
    prompt: String,
    script_mode: bool,
    line_num: usize,
}

impl Shell {
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    pub fn line_num(&self) -> usize {
        self.line_num
    }

    /// Set a shell environment variable
    pub fn set_var(&mut self, name: &str, value: &str) {
        self.env.insert(name.to_string(), value.to_string());
    }

    /// Get a shell environment variable
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(String::as_str)
    }

    pub fn render_prompt(&self) -> String {
        self.prompt.replace("{cwd}", &self.cwd)
    }

    /// Run one input line to completion.
    pub async fn execute_line(&mut self, line: &str) -> ShellResult<()> {
        let result = self.execute_words(line).await;
        self.stdout.flush()?;
        result
    }

    async fn execute_words(&mut self, line: &str) -> ShellResult<()> {
        let words = tokenize(line)?;
        if words.is_empty() {
            return Ok(());
        }

        // per-dispatch copy; assignments on this line never reach the shell
        let mut env = self.env.clone();
        for (i, arg) in self.positional.iter().enumerate() {
            env.insert(i.to_string(), arg.clone());
        }
        let words = parse_env_args(words, &mut env)?;
        env.retain(|name, _| !name.bytes().all(|b| b.is_ascii_digit()));

        let Some((name, args)) = words.split_first() else {
            return Ok(());
        };
        tracing::debug!(line = self.line_num, command = %name, args = ?args, "Executing");

        if let Some(result) = self.try_execute_builtin(name, args, &env) {
            return result;
        }

        // child output goes straight to the terminal; keep ours in order
        self.stdout.flush()?;
        self.dispatcher.execute(name, args, &env, &self.cwd).await
    }

    /// Read and execute lines until `exit`. Returns the exit code.
    pub async fn run(&mut self, reader: &mut dyn LineReader) -> i32 {
        loop {
            self.line_num += 1;
            let prompt = self.render_prompt();

            let line = match tokio::task::block_in_place(|| reader.read_line(&prompt)) {
                Ok(line) => line,
                Err(e) => {
                    self.print_err(&ShellError::Input(e));
                    continue;
                }
            };

            match self.execute_line(&line).await {
                Ok(()) => {}
                Err(ShellError::Exit(code)) => return code,
                Err(e) => self.print_err(&e),
            }
        }
    }

    /// Report an error; script mode names the failing line.
    pub fn print_err(&mut self, err: &ShellError) {
        tracing::debug!(line = self.line_num, error = ?err, "Command failed");
        let result = if self.script_mode {
            writeln!(self.stderr, "script error on line {}: {err}", self.line_num)
        } else {
            writeln!(self.stderr, "{err}")
        };
        if let Err(e) = result.and_then(|()| self.stderr.flush()) {
            tracing::warn!(error = %e, "Unable to write to stderr");
        }
    }
}

pub struct ShellBuilder {
    vfs: Arc<dyn Vfs>,
    dispatcher: Dispatcher,
    cwd: String,
    env: Env,
    positional: Vec<String>,
    prompt: String,
    script_mode: bool,
    stdout: Box<dyn Write + Send>,
    stderr: Box<dyn Write + Send>,
}

impl ShellBuilder {
    pub fn new(vfs: Arc<dyn Vfs>, dispatcher: Dispatcher) -> Self {
        Self {
            vfs,
            dispatcher,
            cwd: "/".to_string(),
            env: Env::new(),
            positional: Vec::new(),
            prompt: DEFAULT_PROMPT.to_string(),
            script_mode: false,
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
        }
    }

    pub fn cwd(mut self, cwd: &str) -> Self {
        self.cwd = cwd.to_string();
        self
    }

    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), value.to_string());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `$0` followed by `$1..$N`.
    pub fn positional(mut self, args: Vec<String>) -> Self {
        self.positional = args;
        self
    }

    pub fn prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    pub fn script_mode(mut self, enabled: bool) -> Self {
        self.script_mode = enabled;
        self
    }

    pub fn stdout(mut self, out: Box<dyn Write + Send>) -> Self {
        self.stdout = out;
        self
    }

    pub fn stderr(mut self, err: Box<dyn Write + Send>) -> Self {
        self.stderr = err;
        self
    }

    pub fn build(self) -> Shell {
        Shell {
            cwd: self.cwd,
            env: self.env,
            vfs: self.vfs,
            dispatcher: self.dispatcher,
            stdout: self.stdout,
            stderr: self.stderr,
            positional: self.positional,
            prompt: self.prompt,
            script_mode: self.script_mode,
            line_num: 0,
        }
    }
}
