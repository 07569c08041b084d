use std::path::{Path, PathBuf};

/// Overrides the state directory, mainly for tests and sandboxes.
pub const HOME_ENV: &str = "PAGELENS_HOME";

/// On-disk layout under `~/.pagelens`.
#[derive(Debug, Clone)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Self::with_base(PathBuf::from(dir));
        }
        let base = dirs::home_dir()
            .map(|home| home.join(".pagelens"))
            .unwrap_or_else(|| PathBuf::from(".pagelens"));
        Self::with_base(base)
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Browser profile used when `browser.userDataDir` is unset.
    pub fn profile_dir(&self) -> PathBuf {
        self.base.join("profile")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.profile_dir())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
