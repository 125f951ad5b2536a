//! Profile file parsing and discovery

use crate::config::types::Profile;
use crate::error::{ConfigError, ConfigResult, DelegatorError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default profile file names to search for
const PROFILE_FILE_NAMES: &[&str] = &["profile.json", "profile.yml", "profile.yaml"];

/// Serialization format of a profile document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
    Json,
    Yaml,
}

impl ProfileFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ProfileFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                Ok(ProfileFormat::Yaml)
            }
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Find the profile by searching current and parent directories
pub fn find_profile_file() -> ConfigResult<PathBuf> {
    find_profile_file_from(env::current_dir().map_err(|e| {
        ConfigError::Invalid(format!("Failed to get current directory: {}", e))
    })?)
}

/// Find the profile starting from a specific directory
pub fn find_profile_file_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched_paths = Vec::new();

    loop {
        for file_name in PROFILE_FILE_NAMES {
            let profile_path = current_dir.join(file_name);
            searched_paths.push(profile_path.display().to_string());

            if profile_path.is_file() {
                return Ok(profile_path);
            }
        }

        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched_paths.join(", "))),
        }
    }
}

/// Parse a profile file from a path
pub fn parse_profile_file(path: &Path) -> Result<Profile, DelegatorError> {
    let format = ProfileFormat::from_path(path)?;
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read {}: {}", path.display(), e)))?;

    parse_profile(&contents, format)
}

/// Parse a profile from a string
pub fn parse_profile(contents: &str, format: ProfileFormat) -> Result<Profile, DelegatorError> {
    let profile = match format {
        ProfileFormat::Json => serde_json::from_str(contents)?,
        ProfileFormat::Yaml => serde_yaml::from_str(contents)?,
    };
    Ok(profile)
}

/// Parse a profile with automatic file discovery
pub fn parse_profile_auto() -> Result<(Profile, PathBuf), DelegatorError> {
    let profile_path = find_profile_file()?;
    let profile = parse_profile_file(&profile_path)?;
    Ok((profile, profile_path))
}
