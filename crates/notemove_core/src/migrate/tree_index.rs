//! Parent/child index over a record's line items.
//!
//! # Responsibility
//! - Turn a flat item list into an ordered tree in one pass.
//! - Resolve, once per node, whether children come from flat `parent_guid`
//!   links or from the item's embedded `children` list.
//!
//! # Invariants
//! - An item is a root iff its parent link is empty or unknown in the list.
//! - Sibling order follows source list order (flat) or embedded list order.
//! - Flat children win over embedded children for the same item.
//! - Every flat item is reachable from a root, otherwise indexing fails.

use crate::model::item::{Item, ItemGuid};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum nesting depth accepted for one record tree.
pub const MAX_TREE_DEPTH: usize = 512;

/// Position of one node inside a `TreeIndex`.
pub type TreeNodeId = usize;

/// Where a node's children were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSource {
    /// Items whose `parent_guid` points at this node.
    Flat,
    /// The node's own embedded `children` list.
    Embedded,
    Leaf,
}

/// Structural errors that make a source tree unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Two items share one guid.
    DuplicateGuid(ItemGuid),
    /// Item sits on a `parent_guid` cycle (or below one).
    CycleDetected(ItemGuid),
    /// Nesting exceeds `limit`.
    DepthExceeded { item_guid: ItemGuid, limit: usize },
}

impl Display for TreeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateGuid(guid) => write!(f, "duplicate line item guid: {guid}"),
            Self::CycleDetected(guid) => {
                write!(f, "line item is not reachable from a root (cycle): {guid}")
            }
            Self::DepthExceeded { item_guid, limit } => {
                write!(f, "line item {item_guid} nests deeper than {limit} levels")
            }
        }
    }
}

impl Error for TreeError {}

/// One indexed item.
#[derive(Debug)]
pub struct TreeNode<'a> {
    pub item: &'a Item,
    /// Zero for roots.
    pub depth: usize,
    pub child_source: ChildSource,
    pub children: Vec<TreeNodeId>,
}

/// Ordered tree view borrowed from a source item list.
#[derive(Debug)]
pub struct TreeIndex<'a> {
    nodes: Vec<TreeNode<'a>>,
    roots: Vec<TreeNodeId>,
    flat_by_guid: HashMap<&'a str, TreeNodeId>,
}

impl<'a> TreeIndex<'a> {
    /// Indexes `items`.
    ///
    /// # Errors
    /// - `DuplicateGuid` when two flat items share a guid.
    /// - `CycleDetected` when a flat item cannot be reached from any root.
    /// - `DepthExceeded` when nesting is deeper than `MAX_TREE_DEPTH`.
    pub fn build(items: &'a [Item]) -> Result<Self, TreeError> {
        let mut known = HashSet::with_capacity(items.len());
        for item in items {
            if !known.insert(item.guid.as_str()) {
                return Err(TreeError::DuplicateGuid(item.guid.clone()));
            }
        }

        let mut by_parent: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut root_positions = Vec::new();
        for (position, item) in items.iter().enumerate() {
            match item.parent_key() {
                Some(parent) if known.contains(parent) => {
                    by_parent.entry(parent).or_default().push(position)
                }
                _ => root_positions.push(position),
            }
        }

        let mut builder = IndexBuilder {
            items,
            by_parent,
            nodes: Vec::with_capacity(items.len()),
            flat_by_guid: HashMap::with_capacity(items.len()),
        };
        let mut roots = Vec::with_capacity(root_positions.len());
        for position in root_positions {
            roots.push(builder.add_flat(position, 0)?);
        }

        if builder.flat_by_guid.len() != items.len() {
            let unreachable = items
                .iter()
                .find(|item| !builder.flat_by_guid.contains_key(item.guid.as_str()));
            if let Some(item) = unreachable {
                return Err(TreeError::CycleDetected(item.guid.clone()));
            }
        }

        Ok(Self {
            nodes: builder.nodes,
            roots,
            flat_by_guid: builder.flat_by_guid,
        })
    }

    /// Top-level nodes in source order.
    pub fn roots(&self) -> &[TreeNodeId] {
        &self.roots
    }

    pub fn node(&self, id: TreeNodeId) -> &TreeNode<'a> {
        &self.nodes[id]
    }

    /// Total indexed nodes, embedded ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of `key`, or the roots when `key` is `None`.
    ///
    /// Keys resolve against flat items only; unknown keys are leaves.
    /// Embedded descendants are indexed too but are reached by node id
    /// through `node(..).children`, which is what replication walks.
    pub fn children_of(&self, key: Option<&str>) -> Vec<&'a Item> {
        let ids: &[TreeNodeId] = match key {
            None => &self.roots,
            Some(guid) => match self.flat_by_guid.get(guid) {
                Some(id) => &self.nodes[*id].children,
                None => &[],
            },
        };
        ids.iter().map(|id| self.nodes[*id].item).collect()
    }

    /// Number of nodes below `id`.
    pub fn descendant_count(&self, id: TreeNodeId) -> usize {
        let mut count = 0;
        let mut stack: Vec<TreeNodeId> = self.nodes[id].children.clone();
        while let Some(next) = stack.pop() {
            count += 1;
            stack.extend_from_slice(&self.nodes[next].children);
        }
        count
    }
}

struct IndexBuilder<'a> {
    items: &'a [Item],
    by_parent: HashMap<&'a str, Vec<usize>>,
    nodes: Vec<TreeNode<'a>>,
    flat_by_guid: HashMap<&'a str, TreeNodeId>,
}

impl<'a> IndexBuilder<'a> {
    fn add_flat(&mut self, position: usize, depth: usize) -> Result<TreeNodeId, TreeError> {
        let items = self.items;
        let item = &items[position];
        let id = self.push(item, depth)?;
        self.flat_by_guid.insert(item.guid.as_str(), id);

        // Guids are unique, so each parent's bucket is consumed exactly once.
        let flat_children = self.by_parent.remove(item.guid.as_str()).unwrap_or_default();
        if !flat_children.is_empty() {
            let mut children = Vec::with_capacity(flat_children.len());
            for child_position in flat_children {
                children.push(self.add_flat(child_position, depth + 1)?);
            }
            self.attach(id, ChildSource::Flat, children);
        } else {
            self.add_embedded_children(id, item, depth)?;
        }
        Ok(id)
    }

    fn add_embedded(&mut self, item: &'a Item, depth: usize) -> Result<TreeNodeId, TreeError> {
        let id = self.push(item, depth)?;
        self.add_embedded_children(id, item, depth)?;
        Ok(id)
    }

    fn add_embedded_children(
        &mut self,
        id: TreeNodeId,
        item: &'a Item,
        depth: usize,
    ) -> Result<(), TreeError> {
        let embedded = item.children.as_deref().unwrap_or_default();
        if embedded.is_empty() {
            return Ok(());
        }
        let mut children = Vec::with_capacity(embedded.len());
        for child in embedded {
            children.push(self.add_embedded(child, depth + 1)?);
        }
        self.attach(id, ChildSource::Embedded, children);
        Ok(())
    }

    fn push(&mut self, item: &'a Item, depth: usize) -> Result<TreeNodeId, TreeError> {
        if depth >= MAX_TREE_DEPTH {
            return Err(TreeError::DepthExceeded {
                item_guid: item.guid.clone(),
                limit: MAX_TREE_DEPTH,
            });
        }
        self.nodes.push(TreeNode {
            item,
            depth,
            child_source: ChildSource::Leaf,
            children: Vec::new(),
        });
        Ok(self.nodes.len() - 1)
    }

    fn attach(&mut self, id: TreeNodeId, source: ChildSource, children: Vec<TreeNodeId>) {
        let node = &mut self.nodes[id];
        node.child_source = source;
        node.children = children;
    }
}
