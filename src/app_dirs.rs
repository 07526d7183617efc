use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("auratrace"))
        } else {
            ProjectDirs::from("", "", "auratrace").map(|proj_dirs| proj_dirs.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.db"))
    }

    pub fn log_dir() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("logs"))
    }

    /// Where exported sessions land: the user's downloads folder, else the working directory
    pub fn export_dir() -> PathBuf {
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
