use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VshConfig {
    pub root: RootConfig,
    pub shell: ShellConfig,
    pub runtime: RuntimeConfig,
    pub build: BuildConfig,
    pub logging: LoggingConfig,
}

/// Host directory that backs the virtual `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootConfig {
    pub path: String,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/vsh/root".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Prompt template. `{cwd}` is replaced by the current virtual directory.
    pub prompt: String,
    pub banner: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "{cwd} ▶ ".to_string(),
            banner: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Argv prefix used to run binary modules. `{root}` expands to the host root.
    pub wasm_runner: Vec<String>,
    /// Shell executable used for nested script runs. Defaults to the running binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            wasm_runner: vec![
                "wasmtime".to_string(),
                "run".to_string(),
                "--dir".to_string(),
                "{root}::/".to_string(),
            ],
            shell: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Toolchain argv, run inside the source directory. `{out}` and `{src}` are
    /// replaced by host paths.
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Virtual directory receiving built modules.
    pub cache_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("GOOS".to_string(), "wasip1".to_string());
        env.insert("GOARCH".to_string(), "wasm".to_string());
        Self {
            command: vec![
                "go".to_string(),
                "build".to_string(),
                "-o".to_string(),
                "{out}".to_string(),
                ".".to_string(),
            ],
            env,
            cache_dir: "/sys/cache/build".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            filter: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}
