//! Where the runtime keeps its socket, config file and log
//!
//! The socket lives under `$XDG_RUNTIME_DIR/block-runtime/` when that is set
//! and under a per-uid directory in /tmp otherwise. On Windows it is a named
//! pipe keyed by the user name.

use std::io;
use std::path::PathBuf;

use directories::ProjectDirs;

const APP_NAME: &str = "block-runtime";
const SOCKET_FILE: &str = "runtime.sock";
const CONFIG_FILE: &str = "config.toml";
const LOG_FILE: &str = "runtime.log";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

#[cfg(unix)]
fn socket_dir() -> PathBuf {
    match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(APP_NAME),
        // Per-uid so two users on one machine never share a runtime
        _ => PathBuf::from(format!("/tmp/{}-{}", APP_NAME, unsafe { libc::getuid() })),
    }
}

/// Path of the controller socket
#[cfg(unix)]
pub fn socket_path() -> PathBuf {
    socket_dir().join(SOCKET_FILE)
}

/// Name of the controller pipe
#[cfg(windows)]
pub fn socket_path() -> PathBuf {
    let user = std::env::var("USERNAME").unwrap_or_else(|_| "default".into());
    PathBuf::from(format!("{}-{}", APP_NAME, user))
}

/// Socket path as the string `interprocess` expects
pub fn socket_name() -> String {
    socket_path().to_string_lossy().into_owned()
}

/// Create the socket directory, private to the current user
#[cfg(unix)]
pub fn ensure_socket_dir() -> io::Result<PathBuf> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    let dir = socket_dir();
    if dir.is_dir() {
        let mode = std::fs::metadata(&dir)?.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!("Socket directory {} is accessible to other users", dir.display());
        }
    } else {
        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&dir)?;
    }
    Ok(dir)
}

#[cfg(windows)]
pub fn ensure_socket_dir() -> io::Result<PathBuf> {
    Ok(PathBuf::new())
}

/// Delete the socket file left by this or an earlier runtime
#[cfg(unix)]
pub fn remove_socket() -> io::Result<()> {
    match std::fs::remove_file(socket_path()) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(windows)]
pub fn remove_socket() -> io::Result<()> {
    Ok(())
}

/// `<config dir>/config.toml`
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// `<data dir>/logs`
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

/// `<data dir>/logs/runtime.log`
pub fn log_file() -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(LOG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_names_the_runtime() {
        let path = socket_name();
        assert!(path.contains(APP_NAME));
        #[cfg(unix)]
        assert!(path.ends_with(SOCKET_FILE));
    }

    #[test]
    fn test_log_file_is_inside_log_dir() {
        if let (Some(dir), Some(file)) = (log_dir(), log_file()) {
            assert_eq!(file.parent(), Some(dir.as_path()));
            assert_eq!(file.file_name().unwrap(), LOG_FILE);
        }
    }
}
