use crate::types::{Category, CATEGORY_SEPARATOR, DEFAULT_CATEGORY_NAME};

struct Node {
    label: String,
    parent: Option<usize>,
    children: Vec<usize>,
    created_at: i64,
    is_default: bool,
    removed: bool,
}

/// Arena-backed category tree. Indices stay valid for the lifetime of the tree;
/// removal only marks nodes.
pub(super) struct CategoryTree {
    nodes: Vec<Node>,
    default_idx: usize,
}

impl CategoryTree {
    /// Builds the tree from persisted paths. Guarantees exactly one default node:
    /// the first flagged entry, else an entry named like the stock default, else a new one.
    pub(super) fn from_flat(categories: &[Category]) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            default_idx: 0,
        };

        let mut ordered: Vec<&Category> = categories.iter().collect();
        ordered.sort_by_key(|c| c.name.matches(CATEGORY_SEPARATOR).count());

        for category in ordered {
            let (parent, label) = match category.name.split_once(CATEGORY_SEPARATOR) {
                Some((parent, label)) => (Some(parent), label),
                None => (None, category.name.as_str()),
            };
            let parent_idx = match parent {
                Some(p) => Some(match tree.find(p) {
                    Some(idx) => idx,
                    None => tree.insert(None, p, category.created_at, false),
                }),
                None => None,
            };
            if tree.child(parent_idx, label).is_none() {
                tree.insert(parent_idx, label, category.created_at, category.is_default);
            }
        }

        let existing = tree
            .live()
            .find(|i| tree.nodes[*i].is_default)
            .or_else(|| tree.find(DEFAULT_CATEGORY_NAME));
        let default_idx = match existing {
            Some(idx) => idx,
            None => tree.insert(None, DEFAULT_CATEGORY_NAME, i64::MIN, true),
        };
        for node in tree.nodes.iter_mut() {
            node.is_default = false;
        }
        tree.nodes[default_idx].is_default = true;
        tree.nodes[default_idx].created_at = i64::MIN;
        tree.default_idx = default_idx;
        tree
    }

    /// Persisted form: default first, then ascending creation timestamp.
    pub(super) fn to_flat(&self) -> Vec<Category> {
        let mut out: Vec<Category> = self.live().map(|i| self.category(i)).collect();
        out.sort_by_key(|c| (!c.is_default, c.created_at));
        out
    }

    pub(super) fn category(&self, idx: usize) -> Category {
        Category {
            name: self.path(idx),
            created_at: self.nodes[idx].created_at,
            is_default: self.nodes[idx].is_default,
        }
    }

    pub(super) fn default_index(&self) -> usize {
        self.default_idx
    }

    pub(super) fn path(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        match node.parent {
            Some(p) => format!("{}{CATEGORY_SEPARATOR}{}", self.nodes[p].label, node.label),
            None => node.label.clone(),
        }
    }

    pub(super) fn parent_of(&self, idx: usize) -> Option<usize> {
        self.nodes[idx].parent
    }

    pub(super) fn find(&self, path: &str) -> Option<usize> {
        match path.split_once(CATEGORY_SEPARATOR) {
            Some((parent, label)) => {
                let parent_idx = self.child(None, parent)?;
                self.child(Some(parent_idx), label)
            }
            None => self.child(None, path),
        }
    }

    fn child(&self, parent: Option<usize>, label: &str) -> Option<usize> {
        self.live()
            .find(|i| self.nodes[*i].parent == parent && self.nodes[*i].label == label)
    }

    fn live(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|i| !self.nodes[*i].removed)
    }

    pub(super) fn insert(
        &mut self,
        parent: Option<usize>,
        label: &str,
        created_at: i64,
        is_default: bool,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node {
            label: label.to_string(),
            parent,
            children: Vec::new(),
            created_at,
            is_default,
            removed: false,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(idx);
        }
        idx
    }

    /// Node plus its live descendants.
    pub(super) fn subtree(&self, idx: usize) -> Vec<usize> {
        let mut out = vec![idx];
        let mut i = 0;
        while i < out.len() {
            let node = &self.nodes[out[i]];
            out.extend(node.children.iter().copied().filter(|c| !self.nodes[*c].removed));
            i += 1;
        }
        out
    }

    pub(super) fn relabel(&mut self, idx: usize, label: &str) {
        self.nodes[idx].label = label.to_string();
    }

    pub(super) fn remove_subtree(&mut self, idx: usize) {
        for i in self.subtree(idx) {
            self.nodes[i].removed = true;
        }
        if let Some(p) = self.nodes[idx].parent {
            self.nodes[p].children.retain(|c| *c != idx);
        }
    }

    /// Creation key for a new node: wall-clock millis, bumped past every existing key.
    pub(super) fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let last = self
            .live()
            .map(|i| self.nodes[i].created_at)
            .max()
            .unwrap_or(i64::MIN);
        now.max(last.saturating_add(1))
    }
}
