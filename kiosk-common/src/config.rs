//! Configuration file discovery and loading
//!
//! Resolution order for a component's settings:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 belong to the binary's argument parser; this module handles
//! finding and parsing the TOML file. When no file is discovered the defaults
//! apply; a file named explicitly must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "kiosk";

/// Find the config file for `file_name`
///
/// An explicit path wins if given (even if it does not exist, so the caller
/// can report it). Otherwise the user config dir is tried, then `/etc/kiosk`
/// on Linux.
pub fn locate_config_file(explicit: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(file_name);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load a TOML config, falling back to `T::default()` when no file exists
///
/// An explicitly named file that is missing, or any file that fails to parse,
/// is an error: silently ignoring a typo in a deployed kiosk is worse than
/// refusing to start.
pub fn load_toml_or_default<T>(explicit: Option<&Path>, file_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = locate_config_file(explicit, file_name) else {
        warn!("No {} found, using compiled defaults", file_name);
        return Ok(T::default());
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}
