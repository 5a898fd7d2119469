//! Load: config loading from file and environment variables.

use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::Read;

use super::model::ToolsConfig;

const DEFAULT_CONFIG_FILE: &str = "schema-tools.toml";

impl ToolsConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("SCHEMA_TOOLS_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_cwd()?
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.resolve_defaults();
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: ToolsConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    fn from_cwd() -> Result<Self, std::io::Error> {
        Ok(Self {
            project_root: std::env::current_dir()?,
            ..Self::default()
        })
    }

    /// Apply environment-style overrides. Unparseable numbers are ignored
    /// with a warning so a typo never silently zeroes a limit.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup("PROJECT_ROOT") {
            self.project_root = PathBuf::from(root);
        }
        if let Some(output) = lookup("SCHEMA_TOOLS_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(output));
        }
        if let Some(size) = parse_override(&lookup, "SCHEMA_TOOLS_BATCH_SIZE") {
            self.batch_size = size;
        }
        if let Some(secs) = parse_override(&lookup, "SCHEMA_TOOLS_COMMAND_TIMEOUT") {
            self.command_timeout_secs = secs;
        }
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}
