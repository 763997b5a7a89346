use std::fs;
use std::path::Path;

use mml_core::MmlError;
use serde::{Deserialize, Serialize};

use crate::{map_cli_config_invalid, map_cli_config_read, Cli};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "mml.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct CliConfig {
    pub(crate) scripts_dir: String,
    pub(crate) files_dir: String,
    pub(crate) media_dir: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            scripts_dir: "files/scripts".to_string(),
            files_dir: "files/temp".to_string(),
            media_dir: "[media]".to_string(),
        }
    }
}

impl CliConfig {
    pub(crate) fn apply_overrides(mut self, cli: &Cli) -> Self {
        if let Some(scripts_dir) = &cli.scripts_dir {
            self.scripts_dir = scripts_dir.clone();
        }
        if let Some(files_dir) = &cli.files_dir {
            self.files_dir = files_dir.clone();
        }
        if let Some(media_dir) = &cli.media_dir {
            self.media_dir = media_dir.clone();
        }
        self
    }
}

// An explicit --config must exist; the implicit mml.json is optional.
pub(crate) fn load_config(explicit: Option<&str>) -> Result<CliConfig, MmlError> {
    let path = match explicit {
        Some(path) => {
            let path = Path::new(path);
            if !path.is_file() {
                return Err(MmlError::new(
                    "CLI_CONFIG_NOT_FOUND",
                    format!("Config file does not exist: {}", path.display()),
                ));
            }
            path
        }
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if !path.is_file() {
                return Ok(CliConfig::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(path).map_err(map_cli_config_read)?;
    serde_json::from_str(&raw).map_err(map_cli_config_invalid)
}
