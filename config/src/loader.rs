use crate::{ConfigError, VshConfig};
use regex::Regex;
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
    explicit_file: Option<PathBuf>,
    search_paths: Vec<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        let mut search_paths = Vec::new();

        if let Some(home) = dirs::home_dir() {
            search_paths.push(home.join(".config/vsh/vsh.yaml"));
        }
        search_paths.push(PathBuf::from("./vsh.yaml"));

        #[cfg(unix)]
        search_paths.insert(0, PathBuf::from("/etc/vsh/vsh.yaml"));

        Self {
            explicit_file: None,
            search_paths,
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.explicit_file = Some(PathBuf::from(path));
        self
    }

    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn load(&self) -> Result<VshConfig, ConfigError> {
        let mut config = VshConfig::default();

        if let Some(ref explicit) = self.explicit_file {
            config = self.parse_yaml(&read_file(explicit)?)?;
        } else if let Ok(env_path) = std::env::var("VSH_CONFIG") {
            config = self.parse_yaml(&read_file(&PathBuf::from(env_path))?)?;
        } else {
            for path in &self.search_paths {
                if path.exists() {
                    if let Ok(content) = std::fs::read_to_string(path) {
                        tracing::debug!(path = %path.display(), "Merging config file");
                        config = self.merge_yaml(&config, &content)?;
                    }
                }
            }
        }

        self.apply_env_overrides(&mut config);
        Ok(config)
    }

    fn parse_yaml(&self, content: &str) -> Result<VshConfig, ConfigError> {
        let expanded = self.expand_env_vars(content)?;
        Ok(serde_yaml::from_str(&expanded)?)
    }

    fn merge_yaml(&self, base: &VshConfig, content: &str) -> Result<VshConfig, ConfigError> {
        let expanded = self.expand_env_vars(content)?;
        let overlay: VshConfig = serde_yaml::from_str(&expanded)?;
        Ok(self.merge_configs(base, &overlay))
    }

    fn merge_configs(&self, base: &VshConfig, overlay: &VshConfig) -> VshConfig {
        let defaults = VshConfig::default();
        let mut result = base.clone();

        if overlay.root != defaults.root {
            result.root = overlay.root.clone();
        }
        if overlay.shell != defaults.shell {
            result.shell = overlay.shell.clone();
        }
        if overlay.runtime != defaults.runtime {
            result.runtime = overlay.runtime.clone();
        }
        if overlay.build != defaults.build {
            result.build = overlay.build.clone();
        }
        if overlay.logging != defaults.logging {
            result.logging = overlay.logging.clone();
        }

        result
    }

    fn expand_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_default()
            })
            .to_string())
    }

    fn apply_env_overrides(&self, config: &mut VshConfig) {
        if let Ok(root) = std::env::var("VSH_ROOT") {
            if !root.is_empty() {
                config.root.path = root;
            }
        }
        if let Ok(prompt) = std::env::var("VSH_PROMPT") {
            config.shell.prompt = prompt;
        }
        if let Ok(runner) = std::env::var("VSH_WASM_RUNNER") {
            let argv: Vec<String> = runner.split_whitespace().map(str::to_string).collect();
            if !argv.is_empty() {
                config.runtime.wasm_runner = argv;
            }
        }
        if let Ok(level) = std::env::var("VSH_LOG_LEVEL") {
            if let Ok(l) = serde_yaml::from_str(&level) {
                config.logging.level = l;
            }
        }
    }
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Expand `~` and `$VAR` references in a configured host path.
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    shellexpand::full(path)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| ConfigError::ExpandPath {
            path: path.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn expand_env_vars_works() {
        std::env::set_var("VSH_TEST_VAR_123", "hello");
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${VSH_TEST_VAR_123}").unwrap();
        assert_eq!(result, "value: hello");
        std::env::remove_var("VSH_TEST_VAR_123");
    }

    #[test]
    fn missing_env_var_becomes_empty() {
        let loader = ConfigLoader::new();
        let result = loader.expand_env_vars("value: ${NONEXISTENT_VAR_XYZ}").unwrap();
        assert_eq!(result, "value: ");
    }

    #[test]
    fn env_overrides_config() {
        std::env::set_var("VSH_WASM_RUNNER", "wasmer run --mapdir /:{root}");
        let mut config = VshConfig::default();
        let loader = ConfigLoader::new();
        loader.apply_env_overrides(&mut config);
        assert_eq!(
            config.runtime.wasm_runner,
            vec!["wasmer", "run", "--mapdir", "/:{root}"]
        );
        std::env::remove_var("VSH_WASM_RUNNER");
    }

    #[test]
    fn later_search_paths_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.yaml");
        let user = dir.path().join("user.yaml");
        std::fs::File::create(&system)
            .unwrap()
            .write_all(b"shell:\n  prompt: \"sys> \"\nroot:\n  path: /sys-root\n")
            .unwrap();
        std::fs::File::create(&user)
            .unwrap()
            .write_all(b"shell:\n  prompt: \"user> \"\n")
            .unwrap();

        // ambient overrides would replace the merged values
        std::env::remove_var("VSH_PROMPT");
        std::env::remove_var("VSH_ROOT");

        let loader = ConfigLoader::new().with_search_paths(vec![system, user]);
        if std::env::var("VSH_CONFIG").is_err() {
            let merged = loader.load().unwrap();
            assert_eq!(merged.root.path, "/sys-root");
            assert_eq!(merged.shell.prompt, "user> ");
        }
    }

    #[test]
    fn explicit_file_must_exist() {
        let loader = ConfigLoader::new().with_file("/definitely/not/here.yaml");
        if std::env::var("VSH_CONFIG").is_err() {
            assert!(matches!(loader.load(), Err(ConfigError::ReadFile { .. })));
        }
    }

    #[test]
    fn expand_home_replaces_tilde() {
        let home = dirs::home_dir().unwrap();
        let expanded = expand_home("~/vsh-root").unwrap();
        assert_eq!(expanded, home.join("vsh-root"));
    }
}
