pub mod generate;
pub mod parse;
pub mod types;

use std::path::{Path, PathBuf};

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{Config, OutputConfig, QueryConfig, SchedulerConfig};

/// Config file name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "logspan.yml";

/// Expands a leading `~` to the user's home directory.
/// Paths without a tilde, or when the home directory is unknown, are returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(home_dir) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home_dir,
        Ok(rest) => home_dir.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Default config locations, in lookup order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(".config/logspan/config.yml"));
    }
    paths.push(PathBuf::from("/etc/logspan/config.yml"));
    paths
}

/// Resolves the config file path based on explicit argument or default locations.
/// An explicit path is returned as given (tilde-expanded); otherwise the
/// first existing default location wins.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    default_config_paths().into_iter().find(|p| p.exists())
}
