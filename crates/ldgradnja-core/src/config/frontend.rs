//! Bundled frontend configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Location of the prebuilt single-page frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Directory holding `index.html` and the `assets/` tree.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Document served for every unmatched path.
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            index_file: default_index_file(),
        }
    }
}

impl FrontendConfig {
    /// The static directory, if it exists. Called once at startup; the
    /// result is handed to the router.
    pub fn resolve_static_dir(&self) -> Option<PathBuf> {
        if self.static_dir.is_dir() {
            Some(self.static_dir.clone())
        } else {
            None
        }
    }

    /// Path of the index document inside `static_dir`.
    pub fn index_path(&self, static_dir: &Path) -> PathBuf {
        static_dir.join(&self.index_file)
    }
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_index_file() -> String {
    "index.html".to_string()
}
