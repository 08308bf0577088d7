//! Role File Persistence

use crate::error::RoleError;
use crate::{Role, RoleState};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the role files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Production role file on the boot partition
    pub production_file: PathBuf,
    /// Development role file
    pub dev_file: PathBuf,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            production_file: PathBuf::from("/boot/pi_role"),
            dev_file: PathBuf::from(".pi_role"),
        }
    }
}

/// Read the node role. The development file wins when present.
///
/// Absent files give [`RoleState::Unset`]; a file with an invalid token is
/// an error.
pub fn resolve(config: &RoleConfig) -> Result<RoleState, RoleError> {
    if let Some(content) = read_optional(&config.dev_file)? {
        let state = RoleState::from_dev(&content).ok_or_else(|| RoleError::Invalid {
            path: config.dev_file.clone(),
            content: content.trim().to_string(),
        })?;
        debug!("Role {} from {}", state, config.dev_file.display());
        return Ok(state);
    }

    if let Some(content) = read_optional(&config.production_file)? {
        let state = RoleState::from_production(&content).ok_or_else(|| RoleError::Invalid {
            path: config.production_file.clone(),
            content: content.trim().to_string(),
        })?;
        debug!("Role {} from {}", state, config.production_file.display());
        return Ok(state);
    }

    Ok(RoleState::Unset)
}

/// Persist the production role; requires root
pub fn set_production(config: &RoleConfig, role: Role) -> Result<RoleState, RoleError> {
    if !is_privileged() {
        return Err(RoleError::PermissionDenied);
    }
    write_atomic(&config.production_file, role.as_str())?;
    info!("Production role set to {} in {}", role, config.production_file.display());
    Ok(match role {
        Role::Car => RoleState::Car,
        Role::Ground => RoleState::Ground,
    })
}

/// Persist the development role; no privilege needed
pub fn set_dev(config: &RoleConfig, role: Role) -> Result<RoleState, RoleError> {
    let state = match role {
        Role::Car => RoleState::DevCar,
        Role::Ground => RoleState::DevGround,
    };
    write_atomic(&config.dev_file, state.as_str())?;
    info!("Development role set to {} in {}", state, config.dev_file.display());
    Ok(state)
}

/// Whether the process runs with effective uid 0
pub fn is_privileged() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

fn read_optional(path: &Path) -> Result<Option<String>, RoleError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RoleError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write via a synced temp file and rename, so a power cut leaves either
/// the old or the new content
fn write_atomic(path: &Path, content: &str) -> Result<(), RoleError> {
    let io_err = |source| RoleError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "role".to_string());
    let tmp = dir.join(format!(".{}.tmp", file_name));

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp)
        .map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err)?;
    // Persist the rename itself; not every filesystem allows syncing a directory
    if let Ok(dir) = File::open(&dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> RoleConfig {
        RoleConfig {
            production_file: dir.path().join("pi_role"),
            dev_file: dir.path().join(".pi_role"),
        }
    }

    #[test]
    fn test_absent_files_are_unset() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve(&config(&dir)).unwrap(), RoleState::Unset);
    }

    #[test]
    fn test_production_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::write(&config.production_file, "ground\n").unwrap();
        assert_eq!(resolve(&config).unwrap(), RoleState::Ground);
    }

    #[test]
    fn test_dev_file_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::write(&config.production_file, "ground").unwrap();
        set_dev(&config, Role::Car).unwrap();

        assert_eq!(fs::read_to_string(&config.dev_file).unwrap(), "dev:car");
        assert_eq!(resolve(&config).unwrap(), RoleState::DevCar);
    }

    #[test]
    fn test_invalid_content_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::write(&config.production_file, "boat").unwrap();
        assert!(matches!(resolve(&config), Err(RoleError::Invalid { .. })));

        fs::write(&config.dev_file, "car").unwrap();
        assert!(matches!(resolve(&config), Err(RoleError::Invalid { .. })));
    }

    #[test]
    fn test_set_production_checks_privilege() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let result = set_production(&config, Role::Car);

        if is_privileged() {
            assert_eq!(result.unwrap(), RoleState::Car);
            assert_eq!(fs::read_to_string(&config.production_file).unwrap(), "car");
        } else {
            assert!(matches!(result, Err(RoleError::PermissionDenied)));
            assert!(!config.production_file.exists());
        }
    }

    #[test]
    fn test_overwrite_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        set_dev(&config, Role::Car).unwrap();
        set_dev(&config, Role::Ground).unwrap();

        assert_eq!(resolve(&config).unwrap(), RoleState::DevGround);
        assert_eq!(fs::read_to_string(&config.dev_file).unwrap(), "dev:ground");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
