use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Ordered directories used to resolve bare command names. Built once at
/// startup and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Directories from the `PATH` environment variable.
    pub fn from_env() -> Self {
        let dirs = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).filter(|d| !d.as_os_str().is_empty()).collect())
            .unwrap_or_default();
        Self::new(dirs)
    }

    /// Read `[export] PATH=a:b:c` assignments from a configuration file.
    pub fn from_config_file(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::new(parse_config(&contents)))
    }

    /// Load from `config`, falling back to the environment when the file is
    /// missing or names no directories.
    pub fn load(config: &Path) -> Self {
        match Self::from_config_file(config) {
            Ok(search) if !search.dirs.is_empty() => {
                debug!(config = %config.display(), dirs = search.dirs.len(), "loaded search path");
                search
            }
            Ok(_) => {
                warn!(
                    config = %config.display(),
                    "no PATH assignment in config; using environment PATH"
                );
                Self::from_env()
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(config = %config.display(), "no config file; using environment PATH");
                Self::from_env()
            }
            Err(err) => {
                warn!(
                    config = %config.display(),
                    error = %err,
                    "cannot read config; using environment PATH"
                );
                Self::from_env()
            }
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Resolve a program name to an executable path.
    ///
    /// Names containing a `/` are checked as given; anything else is looked
    /// up in each directory in order.
    pub fn resolve(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return is_executable(&path).then_some(path);
        }

        self.dirs
            .iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

fn parse_config(contents: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export").map(str::trim_start).unwrap_or(line);
        let Some(value) = line.strip_prefix("PATH=") else {
            continue;
        };
        let value = strip_quotes(value.trim());
        dirs = value
            .split(':')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect();
    }
    dirs
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|v| v.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

/// Check if a path points to an executable file.
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = path.metadata() else {
        return false;
    };
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}
