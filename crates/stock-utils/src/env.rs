//! Environment loading helpers

use std::path::PathBuf;

/// Load variables from a `.env` file in the current directory or any
/// parent. Variables already set in the process environment win.
///
/// Returns the path that was loaded, if any.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loaded .env");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable .env file");
            None
        }
    }
}
