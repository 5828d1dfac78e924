use crate::constants::{
    BLANK_PAGE_SIZE, DEFAULT_FILE_NAME, DEFAULT_HISTORY_DEPTH, DEFAULT_SESSION_KEY,
};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Workspace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeOptions {
    /// Capacity of each of the undo and redo stacks
    pub history_depth: usize,

    /// Size of pages created by "insert blank"
    pub blank_page_size: PageSize,

    /// Download name used when the caller does not supply one
    pub default_file_name: String,

    /// Key the session record is persisted under
    pub session_key: String,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            blank_page_size: BLANK_PAGE_SIZE,
            default_file_name: DEFAULT_FILE_NAME.to_string(),
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

impl ComposeOptions {
    /// Load options from JSON file
    pub async fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let options: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ComposeError::Config(format!("Failed to parse config: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to JSON file
    pub async fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ComposeError::Config(format!("Failed to serialize config: {}", e)))?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.history_depth == 0 {
            return Err(ComposeError::Config(
                "History depth must be at least 1".to_string(),
            ));
        }

        let PageSize {
            width_pt,
            height_pt,
        } = self.blank_page_size;
        if !(width_pt.is_finite() && height_pt.is_finite()) || width_pt <= 0.0 || height_pt <= 0.0
        {
            return Err(ComposeError::Config(format!(
                "Blank page size must be positive, got {}x{}",
                width_pt, height_pt
            )));
        }

        if self.session_key.trim().is_empty() {
            return Err(ComposeError::Config(
                "Session key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
