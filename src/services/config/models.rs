use crate::types::{Category, ModRecord, DEFAULT_CATEGORY_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    /// Directory the game loads MODs from.
    #[serde(default)]
    pub active_mods_path: Option<PathBuf>,
    #[serde(default)]
    pub backup_path: Option<PathBuf>,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub mods: Vec<ModRecord>,
    #[serde(default)]
    pub initialized: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            active_mods_path: None,
            backup_path: None,
            categories: default_categories(),
            mods: Vec::new(),
            initialized: false,
        }
    }
}

fn default_categories() -> Vec<Category> {
    vec![Category::default_category(DEFAULT_CATEGORY_NAME)]
}
