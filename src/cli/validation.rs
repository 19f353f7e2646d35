//! CLI argument validation functions
//!
//! Custom value parsers for arguments clap cannot validate on its own.

use std::fs;
use std::path::PathBuf;

/// Upper bound on workers per job type
const MAX_WORKERS: usize = 256;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!(
            "Cannot read configuration file '{}': {}",
            path_str, e
        )),
    }
}

/// Validate the number of workers per job type
pub fn validate_workers(workers_str: &str) -> Result<usize, String> {
    let workers: usize = workers_str.parse().map_err(|_| {
        format!(
            "Workers must be a valid positive number, got: '{}'",
            workers_str
        )
    })?;

    if workers == 0 {
        return Err("Workers must be greater than 0".to_string());
    }

    if workers > MAX_WORKERS {
        return Err(format!("Workers cannot exceed {}", MAX_WORKERS));
    }

    Ok(workers)
}
