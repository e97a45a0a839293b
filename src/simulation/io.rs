use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::info;

use crate::simulation::error::SimulationError;

/// Resolves a file path relative to the directory the config file lives in.
/// Absolute paths and paths explicitly starting with "./" are taken as is.
pub fn resolve_path(config_path: &Option<PathBuf>, file: &Path) -> PathBuf {
    if file.is_absolute() || file.starts_with("./") {
        return file.to_path_buf();
    }

    match config_path {
        Some(config) => {
            let config_dir = config.parent().unwrap_or_else(|| Path::new(""));
            config_dir.join(file)
        }
        None => file.to_path_buf(),
    }
}

/// Reads a yaml file into the requested type. Parse errors carry the path to
/// the offending element within the document.
pub fn from_yaml_file<T: DeserializeOwned>(path: &Path) -> Result<T, SimulationError> {
    info!("Loading yaml file from {path:?}");
    let file = File::open(path).map_err(|e| SimulationError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);
    let deserializer = serde_yaml::Deserializer::from_reader(reader);
    serde_path_to_error::deserialize(deserializer).map_err(|e| SimulationError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
