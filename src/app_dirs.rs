use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    /// `$HOME/.local/state/nback`, falling back to the platform data dir
    pub fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("nback"))
        } else {
            ProjectDirs::from("", "", "nback").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("sessions.db"))
    }

    pub fn results_dir() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("results"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("nback.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_state_dir() {
        if let Some(state) = AppDirs::state_dir() {
            assert!(AppDirs::db_path().unwrap().starts_with(&state));
            assert!(AppDirs::results_dir().unwrap().starts_with(&state));
            assert!(AppDirs::log_path().unwrap().ends_with("nback.log"));
        }
    }
}
