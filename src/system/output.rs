//! Run-scoped output directory
//!
//! Tool output lands here and is picked up by the packaging stage.

use directories::ProjectDirs;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Directory name used under the working directory
pub const OUTPUT_DIR_NAME: &str = "Log";

/// Directory receiving per-action output files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OutputDir { path: path.into() }
    }

    /// `<cwd>/Log`, or the platform data directory when the working
    /// directory is unavailable
    pub fn default_location() -> Self {
        if let Ok(cwd) = env::current_dir() {
            return OutputDir::new(cwd.join(OUTPUT_DIR_NAME));
        }

        let fallback = ProjectDirs::from("", "", "delegator")
            .map(|dirs| dirs.data_local_dir().join(OUTPUT_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(OUTPUT_DIR_NAME));
        OutputDir::new(fallback)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full path of an output file
    pub fn file_path(&self, file_name: &str) -> io::Result<PathBuf> {
        let name = Path::new(file_name);
        let is_plain = name
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if file_name.is_empty() || !is_plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("output file name '{}' must stay inside the output directory", file_name),
            ));
        }
        Ok(self.path.join(name))
    }

    /// Append bytes to an output file, creating the directory on demand
    pub fn append(&self, file_name: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.file_path(file_name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(data)?;
        Ok(path)
    }
}

impl Default for OutputDir {
    fn default() -> Self {
        Self::default_location()
    }
}
