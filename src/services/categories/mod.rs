//! User-defined category labels for MOD records.
//!
//! Categories form a tree at most two levels deep. The persisted form is a flat list of
//! `parent` / `parent/child` paths (see [`Category`]); every operation rebuilds the tree
//! from that list, edits nodes, and writes the derived paths back.

mod tree;

use crate::services::config::ConfigStore;
use crate::types::{Category, ModRecord, VaultError, VaultResult, CATEGORY_SEPARATOR};
use std::sync::Arc;
use tree::CategoryTree;

pub struct CategoryRegistry {
    config: Arc<dyn ConfigStore>,
}

impl CategoryRegistry {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    fn load(&self) -> CategoryTree {
        CategoryTree::from_flat(&self.config.get_categories())
    }

    fn save(&self, tree: &CategoryTree) -> VaultResult<()> {
        self.config.set_categories(tree.to_flat())
    }

    /// All categories, default first, then by creation order.
    pub fn get(&self) -> Vec<Category> {
        self.load().to_flat()
    }

    pub fn default_name(&self) -> String {
        let tree = self.load();
        tree.path(tree.default_index())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.load().find(name.trim()).is_some()
    }

    /// Adds `name` (`label` or `parent/label`). The parent must already exist.
    pub fn add(&self, name: &str) -> VaultResult<Category> {
        let (parent, label) = split_path(name)?;
        let mut tree = self.load();
        let full = join_path(parent.as_deref(), &label);
        if tree.find(&full).is_some() {
            return Err(VaultError::InvalidInput(format!(
                "Category '{full}' already exists"
            )));
        }

        let parent_idx = match &parent {
            Some(p) => {
                let idx = tree
                    .find(p)
                    .ok_or_else(|| VaultError::NotFound(format!("Category '{p}'")))?;
                if tree.parent_of(idx).is_some() {
                    return Err(VaultError::InvalidInput(format!(
                        "Category '{p}' is already a sub-category"
                    )));
                }
                Some(idx)
            }
            None => None,
        };

        let idx = tree.insert(parent_idx, &label, tree.next_timestamp(), false);
        self.save(&tree)?;
        log::info!("Category added: {full}");
        Ok(tree.category(idx))
    }

    /// Creates `name` if it does not exist. An empty name resolves to the default category.
    pub fn ensure(&self, name: &str) -> VaultResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(self.default_name());
        }
        if self.exists(name) {
            return Ok(name.to_string());
        }
        if let Ok((Some(parent), _)) = split_path(name) {
            if !self.exists(&parent) {
                self.add(&parent)?;
            }
        }
        Ok(self.add(name)?.name)
    }

    /// Renames a category in place. `new_name` may be a bare label or a full path with the
    /// same parent. Member records (including those of sub-categories) are re-pointed.
    pub fn rename(&self, old_name: &str, new_name: &str) -> VaultResult<Category> {
        let mut tree = self.load();
        let old_full = old_name.trim();
        let idx = tree
            .find(old_full)
            .ok_or_else(|| VaultError::NotFound(format!("Category '{old_full}'")))?;

        let (new_parent, label) = split_path(new_name)?;
        let current_parent = tree.parent_of(idx).map(|p| tree.path(p));
        if new_parent.is_some() && new_parent != current_parent {
            return Err(VaultError::InvalidInput(
                "Renaming cannot move a category to another parent".to_string(),
            ));
        }

        let new_full = join_path(current_parent.as_deref(), &label);
        if new_full == old_full {
            return Ok(tree.category(idx));
        }
        if tree.find(&new_full).is_some() {
            return Err(VaultError::InvalidInput(format!(
                "Category '{new_full}' already exists"
            )));
        }

        let old_paths: Vec<String> = tree.subtree(idx).iter().map(|i| tree.path(*i)).collect();
        tree.relabel(idx, &label);
        let new_paths: Vec<String> = tree.subtree(idx).iter().map(|i| tree.path(*i)).collect();

        self.save(&tree)?;
        let moved = self.repoint_members(|category| {
            old_paths
                .iter()
                .position(|p| p == category)
                .map(|i| new_paths[i].clone())
        })?;
        log::info!("Category renamed: {old_full} -> {new_full} ({moved} mods re-pointed)");
        Ok(tree.category(idx))
    }

    /// Deletes a category and its sub-categories. Their members move to the default
    /// category. The default category itself cannot be deleted.
    pub fn delete(&self, name: &str) -> VaultResult<()> {
        let mut tree = self.load();
        let full = name.trim();
        let idx = tree
            .find(full)
            .ok_or_else(|| VaultError::NotFound(format!("Category '{full}'")))?;
        if idx == tree.default_index() {
            return Err(VaultError::InvalidInput(
                "The default category cannot be deleted".to_string(),
            ));
        }

        let removed: Vec<String> = tree.subtree(idx).iter().map(|i| tree.path(*i)).collect();
        let default_path = tree.path(tree.default_index());
        tree.remove_subtree(idx);

        self.save(&tree)?;
        let moved = self.repoint_members(|category| {
            removed
                .iter()
                .any(|p| p == category)
                .then(|| default_path.clone())
        })?;
        log::info!("Category deleted: {full} ({moved} mods moved to {default_path})");
        Ok(())
    }

    /// Tags one record with an existing category.
    pub fn set_member_category(&self, mod_id: &str, category: &str) -> VaultResult<ModRecord> {
        let category = category.trim();
        if !self.exists(category) {
            return Err(VaultError::NotFound(format!("Category '{category}'")));
        }
        let mut record = self
            .config
            .get_mod(mod_id)
            .ok_or_else(|| VaultError::NotFound(format!("Mod '{mod_id}'")))?;
        record.category = category.to_string();
        self.config.update_mod(&record)?;
        Ok(record)
    }

    /// Applies `map` to every record's category and persists the changed ones.
    fn repoint_members(&self, map: impl Fn(&str) -> Option<String>) -> VaultResult<usize> {
        let changed: Vec<ModRecord> = self
            .config
            .get_mods()
            .into_iter()
            .filter_map(|mut record| {
                let target = map(&record.category)?;
                record.category = target;
                Some(record)
            })
            .collect();
        if !changed.is_empty() {
            self.config.update_mods(&changed)?;
        }
        Ok(changed.len())
    }
}

/// Splits a user-supplied category path into an optional parent and a label.
fn split_path(name: &str) -> VaultResult<(Option<String>, String)> {
    let parts: Vec<&str> = name.trim().split(CATEGORY_SEPARATOR).map(str::trim).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(VaultError::InvalidInput(format!(
            "Invalid category name '{name}'"
        )));
    }
    match parts.as_slice() {
        [label] => Ok((None, label.to_string())),
        [parent, label] => Ok((Some(parent.to_string()), label.to_string())),
        _ => Err(VaultError::InvalidInput(format!(
            "Category '{name}' is nested too deeply; one level of sub-categories is supported"
        ))),
    }
}

fn join_path(parent: Option<&str>, label: &str) -> String {
    match parent {
        Some(p) => format!("{p}{CATEGORY_SEPARATOR}{label}"),
        None => label.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/categories_tests.rs"]
mod tests;
