//! Binary locations: `$GOPATH/bin` installs and the bundled language server

use crate::install_spec::InstallSpec;
use rgo_foundation::{RgoError, RgoResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the Go workspace root
pub const GOPATH_ENV: &str = "GOPATH";

/// File name of the language server binary, without platform suffix
pub const SERVER_BINARY_NAME: &str = "rgo_lsp_server";

/// Get the `go install` output directory (`$GOPATH/bin`)
///
/// Only the first entry of a list-valued `GOPATH` is used, as `go install` does.
pub fn go_bin_dir() -> RgoResult<PathBuf> {
    let gopath = std::env::var_os(GOPATH_ENV)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RgoError::config("GOPATH is not set in environment variables"))?;

    let first = std::env::split_paths(&gopath)
        .next()
        .ok_or_else(|| RgoError::config("GOPATH is not set in environment variables"))?;

    Ok(first.join("bin"))
}

/// Get the path `go install` writes the binary of `spec` to
pub fn installed_binary_path(spec: &InstallSpec) -> RgoResult<PathBuf> {
    Ok(go_bin_dir()?.join(spec.executable_name()))
}

/// Resolves the language server executable the client should launch
pub trait BinaryLocator: Send + Sync {
    fn server_binary(&self) -> RgoResult<PathBuf>;
}

/// Server binary shipped inside the extension install directory
#[derive(Debug, Clone)]
pub struct ExtensionLayout {
    extension_dir: PathBuf,
}

impl ExtensionLayout {
    pub fn new(extension_dir: impl Into<PathBuf>) -> Self {
        Self {
            extension_dir: extension_dir.into(),
        }
    }

    pub fn extension_dir(&self) -> &Path {
        &self.extension_dir
    }

    /// `<extension_dir>/bin/rgo_lsp_server`, with `.exe` on Windows
    pub fn server_binary_path(&self) -> PathBuf {
        self.extension_dir.join("bin").join(format!(
            "{}{}",
            SERVER_BINARY_NAME,
            std::env::consts::EXE_SUFFIX
        ))
    }
}

impl BinaryLocator for ExtensionLayout {
    fn server_binary(&self) -> RgoResult<PathBuf> {
        let path = self.server_binary_path();
        if !path.is_file() {
            return Err(RgoError::config(format!(
                "Language server binary not found at {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "Resolved language server binary");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_go_bin_dir_requires_gopath() {
        std::env::remove_var(GOPATH_ENV);
        let err = go_bin_dir().unwrap_err();
        assert!(err.is_config());

        std::env::set_var(GOPATH_ENV, "");
        assert!(go_bin_dir().is_err());
    }

    #[test]
    #[serial]
    fn test_go_bin_dir_uses_first_gopath_entry() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let joined =
            std::env::join_paths([first.path(), second.path()]).expect("valid path list");
        std::env::set_var(GOPATH_ENV, &joined);

        assert_eq!(go_bin_dir().unwrap(), first.path().join("bin"));
        std::env::remove_var(GOPATH_ENV);
    }

    #[test]
    fn test_server_binary_path_layout() {
        let layout = ExtensionLayout::new("/opt/rgo");
        let path = layout.server_binary_path();
        assert!(path.starts_with("/opt/rgo/bin"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SERVER_BINARY_NAME));
    }

    #[test]
    fn test_missing_server_binary_is_config_error() {
        let dir = TempDir::new().unwrap();
        let layout = ExtensionLayout::new(dir.path());
        assert!(layout.server_binary().unwrap_err().is_config());

        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        std::fs::write(layout.server_binary_path(), b"").unwrap();
        assert_eq!(layout.server_binary().unwrap(), layout.server_binary_path());
    }
}
