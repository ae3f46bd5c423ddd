use serde::{Deserialize, Serialize};

/// Name given to the default category on first run.
pub const DEFAULT_CATEGORY_NAME: &str = "Default";

/// Separator between a parent category and its child.
pub const CATEGORY_SEPARATOR: char = '/';

/// Persisted form of a category. `name` is the full path (`parent` or `parent/child`).
///
/// `created_at` is an ordering key only. The default category is pinned to `i64::MIN`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub created_at: i64,
    #[serde(default)]
    pub is_default: bool,
}

impl Category {
    pub fn default_category(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: i64::MIN,
            is_default: true,
        }
    }
}
