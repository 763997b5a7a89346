use std::fs;
use std::path::{Path, PathBuf};

use mml_core::MmlError;
use mml_runtime::SourceResolver;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{map_cli_source_path, map_cli_source_read, map_cli_source_scan, map_cli_source_write};

pub(crate) const ENTRY_FILE: &str = "index.mml";
pub(crate) const DESCRIPTION_FILE: &str = "description.txt";
const SCRIPT_EXTENSION: &str = "mml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ScriptEntry {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
}

// Resolves the entry script by its own name and every other name to a sibling `<name>.mml`.
#[derive(Debug, Clone)]
pub(crate) struct DirSourceResolver {
    dir: PathBuf,
    entry_name: String,
    entry_file: PathBuf,
}

impl DirSourceResolver {
    pub(crate) fn for_script(scripts_root: &Path, name: &str) -> Self {
        let dir = scripts_root.join(name);
        Self {
            entry_file: dir.join(ENTRY_FILE),
            entry_name: name.to_string(),
            dir,
        }
    }

    pub(crate) fn for_file(file: &Path) -> Self {
        let dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let entry_name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            dir,
            entry_name,
            entry_file: file.to_path_buf(),
        }
    }

    pub(crate) fn entry_name(&self) -> &str {
        &self.entry_name
    }

    fn path_for(&self, name: &str) -> PathBuf {
        if name == self.entry_name {
            return self.entry_file.clone();
        }
        self.dir.join(format!("{}.{}", name, SCRIPT_EXTENSION))
    }
}

impl SourceResolver for DirSourceResolver {
    fn resolve(&self, name: &str) -> Result<Option<String>, MmlError> {
        let path = self.path_for(name);
        debug!(script = name, file = %path.display(), "resolve script");
        if !path.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|error| {
            warn!(script = name, file = %path.display(), error = %error, "script unreadable");
            map_cli_source_read(error)
        })
    }
}

pub(crate) fn absolute_path(path: &str) -> Result<PathBuf, MmlError> {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(std::env::current_dir()
        .map_err(map_cli_source_path)?
        .join(path))
}

pub(crate) fn resolve_scripts_dir(scripts_dir: &str) -> Result<PathBuf, MmlError> {
    let absolute = absolute_path(scripts_dir)?;

    if !absolute.exists() {
        return Err(MmlError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("scripts-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(MmlError::new(
            "CLI_SOURCE_NOT_DIR",
            format!("scripts-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

pub(crate) fn resolve_script_file(file: &str) -> Result<PathBuf, MmlError> {
    let absolute = absolute_path(file)?;
    if !absolute.is_file() {
        return Err(MmlError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("script file does not exist: {}", absolute.display()),
        ));
    }
    Ok(absolute)
}

pub(crate) fn read_script_file(file: &str) -> Result<String, MmlError> {
    let path = resolve_script_file(file)?;
    fs::read_to_string(path).map_err(map_cli_source_read)
}

pub(crate) fn script_exists(scripts_root: &Path, name: &str) -> bool {
    scripts_root.join(name).join(ENTRY_FILE).is_file()
}

pub(crate) fn list_scripts(scripts_root: &Path) -> Result<Vec<ScriptEntry>, MmlError> {
    let mut scripts = Vec::new();

    for entry in WalkDir::new(scripts_root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() || entry.file_name() != ENTRY_FILE {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };

        let name = dir
            .strip_prefix(scripts_root)
            .map_err(map_cli_source_scan)?
            .to_string_lossy()
            .replace('\\', "/");
        let description_path = dir.join(DESCRIPTION_FILE);
        let description = if description_path.is_file() {
            let raw = fs::read_to_string(description_path).map_err(map_cli_source_read)?;
            Some(raw.trim().to_string()).filter(|text| !text.is_empty())
        } else {
            None
        };
        scripts.push(ScriptEntry { name, description });
    }

    Ok(scripts)
}

pub(crate) fn create_script(
    scripts_root: &Path,
    name: &str,
    description: Option<&str>,
) -> Result<PathBuf, MmlError> {
    let name = name.trim().replace(' ', "_");
    if name.is_empty() || name.contains(&['/', '\\'][..]) || name == "." || name == ".." {
        return Err(MmlError::new(
            "CLI_SCRIPT_NAME_INVALID",
            format!("Invalid script name: '{}'", name),
        ));
    }

    let dir = scripts_root.join(&name);
    if dir.exists() {
        return Err(MmlError::new(
            "CLI_SCRIPT_EXISTS",
            format!("Script already exists: {}", dir.display()),
        ));
    }

    fs::create_dir_all(&dir).map_err(map_cli_source_write)?;
    let entry = dir.join(ENTRY_FILE);
    fs::write(&entry, format!("// {}\n", name)).map_err(map_cli_source_write)?;
    if let Some(description) = description.map(str::trim).filter(|text| !text.is_empty()) {
        fs::write(dir.join(DESCRIPTION_FILE), description).map_err(map_cli_source_write)?;
    }
    Ok(entry)
}
