use super::TocNode;
use crate::error::{Result, SmithError};
use crate::events::{Event, EventSink};
use crate::store::{ContentStore, NewChapter};
use std::collections::HashMap;

/// Stable handle to a node in a [`TocTree`]. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Slot {
    label: String,
    href: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// The editable outline of one book.
///
/// Nodes live in an arena and are addressed by href through a side index.
/// Every structural edit detaches a node before attaching it somewhere else,
/// and a node is never attached below itself, so the forest stays acyclic.
/// Edits addressed at an unknown href do nothing and return `false`.
#[derive(Debug, Clone, Default)]
pub struct TocTree {
    slots: Vec<Option<Slot>>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
}

/// Borrowed view of one node.
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a TocTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &'a str {
        &self.tree.slot(self.id).label
    }

    pub fn href(&self) -> &'a str {
        &self.tree.slot(self.id).href
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        let tree = self.tree;
        tree.slot(self.id).parent.map(|id| NodeRef { tree, id })
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.slot(self.id)
            .children
            .iter()
            .map(move |&id| NodeRef { tree, id })
    }

    /// Owned copy of this node and its subtree.
    pub fn to_node(&self) -> TocNode {
        TocNode::with_children(
            self.label(),
            self.href(),
            self.children().map(|c| c.to_node()).collect(),
        )
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("href", &self.href())
            .field("label", &self.label())
            .finish()
    }
}

impl TocTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from its persisted form. Duplicate hrefs are rejected.
    pub fn from_nodes(nodes: &[TocNode]) -> Result<Self> {
        let mut tree = Self::new();
        tree.append_all(None, nodes)?;
        Ok(tree)
    }

    fn append_all(&mut self, parent: Option<NodeId>, nodes: &[TocNode]) -> Result<()> {
        for node in nodes {
            let id = self.alloc(parent, &node.label, &node.href)?;
            self.append_all(Some(id), node.children())?;
        }
        Ok(())
    }

    pub fn to_nodes(&self) -> Vec<TocNode> {
        self.roots().map(|r| r.to_node()).collect()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.roots.iter().map(move |&id| NodeRef { tree: self, id })
    }

    pub fn contains(&self, href: &str) -> bool {
        self.index.contains_key(href)
    }

    pub fn find(&self, href: &str) -> Option<NodeRef<'_>> {
        self.index
            .get(href)
            .map(|&id| NodeRef { tree: self, id })
    }

    /// The node whose children directly contain `href`; `None` for top-level
    /// and unknown nodes.
    pub fn find_parent(&self, href: &str) -> Option<NodeRef<'_>> {
        self.find(href).and_then(|n| n.parent())
    }

    /// All nodes in pre-order.
    pub fn flatten(&self) -> Vec<NodeRef<'_>> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(NodeRef { tree: self, id });
            stack.extend(self.slot(id).children.iter().rev().copied());
        }
        out
    }

    /// Append a leaf under `parent` (or at top level) without touching the
    /// content store or emitting events.
    pub fn append(&mut self, parent: Option<&str>, label: &str, href: &str) -> Result<NodeId> {
        let parent_id = match parent {
            Some(p) => Some(self.id_of(p).ok_or_else(|| SmithError::NotFound(p.to_string()))?),
            None => None,
        };
        self.alloc(parent_id, label, href)
    }

    /// Persist a new chapter and append it as the last child of `parent`
    /// (or as the last top-level entry). Returns the href the store assigned.
    pub fn insert(
        &mut self,
        parent: Option<&str>,
        chapter: NewChapter,
        store: &mut dyn ContentStore,
        events: &mut dyn EventSink,
    ) -> Result<String> {
        if let Some(p) = parent
            && !self.contains(p)
        {
            return Err(SmithError::NotFound(format!("parent chapter {p}")));
        }
        let label = chapter.label.clone();
        let href = store.add_chapter(chapter)?;
        self.append(parent, &label, &href)?;
        events.emit(Event::ChapterAdded(href.clone()));
        events.emit(Event::TocUpdated(Some(href.clone())));
        Ok(href)
    }

    /// Remove a node and its whole subtree.
    ///
    /// Focus moves to the next sibling, else the previous sibling, else the
    /// parent; `None` once nothing is left to focus.
    pub fn delete(&mut self, href: &str, events: &mut dyn EventSink) -> bool {
        let Some(id) = self.lookup(href, "delete") else {
            return false;
        };
        let parent = self.slot(id).parent;
        let siblings = self.siblings(parent);
        let pos = position(siblings, id);
        let focus = siblings
            .get(pos + 1)
            .or_else(|| pos.checked_sub(1).and_then(|p| siblings.get(p)))
            .copied()
            .or(parent)
            .map(|f| self.slot(f).href.clone());

        self.detach(id);
        self.free_subtree(id);
        events.emit(Event::TocUpdated(focus));
        true
    }

    /// Move `from` (with its subtree) to sit directly after `to`, in `to`'s
    /// sequence. When `to` is unknown, is `from` itself, or lies inside the
    /// moved subtree, the tree is left exactly as it was.
    pub fn move_after(&mut self, from: &str, to: &str, events: &mut dyn EventSink) -> bool {
        let Some(moving) = self.lookup(from, "move") else {
            return false;
        };
        let (old_parent, old_pos) = self.detach(moving);

        let target = self
            .id_of(to)
            .filter(|&t| !self.is_within(t, moving));
        let Some(target) = target else {
            log::debug!("move target {to} not reachable from {from}; restoring");
            self.attach(moving, old_parent, old_pos);
            return false;
        };

        let new_parent = self.slot(target).parent;
        let at = position(self.siblings(new_parent), target) + 1;
        self.attach(moving, new_parent, at);
        events.emit(Event::TocUpdated(Some(from.to_string())));
        true
    }

    /// Lift a node one level: it leaves its parent and lands right after it.
    pub fn promote(&mut self, href: &str, events: &mut dyn EventSink) -> bool {
        let Some(id) = self.lookup(href, "promote") else {
            return false;
        };
        let Some(parent) = self.slot(id).parent else {
            return false;
        };
        self.detach(id);
        let grandparent = self.slot(parent).parent;
        let at = position(self.siblings(grandparent), parent) + 1;
        self.attach(id, grandparent, at);
        events.emit(Event::TocUpdated(Some(href.to_string())));
        true
    }

    /// Sink a node one level: it becomes the last child of its previous sibling.
    pub fn demote(&mut self, href: &str, events: &mut dyn EventSink) -> bool {
        let Some(id) = self.lookup(href, "demote") else {
            return false;
        };
        let parent = self.slot(id).parent;
        let siblings = self.siblings(parent);
        let pos = position(siblings, id);
        if pos == 0 {
            return false;
        }
        let new_parent = siblings[pos - 1];
        self.detach(id);
        let at = self.slot(new_parent).children.len();
        self.attach(id, Some(new_parent), at);
        events.emit(Event::TocUpdated(Some(href.to_string())));
        true
    }

    /// Swap a node with its previous sibling.
    pub fn swap_earlier(&mut self, href: &str, events: &mut dyn EventSink) -> bool {
        self.swap(href, false, events)
    }

    /// Swap a node with its next sibling.
    pub fn swap_later(&mut self, href: &str, events: &mut dyn EventSink) -> bool {
        self.swap(href, true, events)
    }

    fn swap(&mut self, href: &str, later: bool, events: &mut dyn EventSink) -> bool {
        let Some(id) = self.lookup(href, "swap") else {
            return false;
        };
        let parent = self.slot(id).parent;
        let siblings = self.siblings_mut(parent);
        let pos = position(siblings, id);
        let other = if later {
            pos + 1
        } else if pos > 0 {
            pos - 1
        } else {
            return false;
        };
        if other >= siblings.len() {
            return false;
        }
        siblings.swap(pos, other);
        events.emit(Event::TocUpdated(Some(href.to_string())));
        true
    }

    pub fn rename(&mut self, href: &str, label: &str, events: &mut dyn EventSink) -> bool {
        let Some(id) = self.lookup(href, "rename") else {
            return false;
        };
        self.slot_mut(id).label = label.to_string();
        events.emit(Event::TocUpdated(Some(href.to_string())));
        true
    }

    // --- arena plumbing ---

    fn alloc(&mut self, parent: Option<NodeId>, label: &str, href: &str) -> Result<NodeId> {
        if self.index.contains_key(href) {
            return Err(SmithError::InvalidToc(format!("duplicate href {href}")));
        }
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot {
            label: label.to_string(),
            href: href.to_string(),
            parent,
            children: Vec::new(),
        }));
        self.index.insert(href.to_string(), id);
        self.siblings_mut(parent).push(id);
        Ok(id)
    }

    fn id_of(&self, href: &str) -> Option<NodeId> {
        self.index.get(href).copied()
    }

    fn lookup(&self, href: &str, op: &str) -> Option<NodeId> {
        let id = self.id_of(href);
        if id.is_none() {
            log::debug!("{op}: no chapter with href {href}");
        }
        id
    }

    fn slot(&self, id: NodeId) -> &Slot {
        self.slots[id.0].as_ref().expect("live node handle")
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        self.slots[id.0].as_mut().expect("live node handle")
    }

    fn siblings(&self, parent: Option<NodeId>) -> &Vec<NodeId> {
        match parent {
            Some(p) => &self.slot(p).children,
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> &mut Vec<NodeId> {
        match parent {
            Some(p) => &mut self.slot_mut(p).children,
            None => &mut self.roots,
        }
    }

    /// Unlink `id` from its sequence; returns where it was.
    fn detach(&mut self, id: NodeId) -> (Option<NodeId>, usize) {
        let parent = self.slot(id).parent;
        let siblings = self.siblings_mut(parent);
        let pos = position(siblings, id);
        siblings.remove(pos);
        self.slot_mut(id).parent = None;
        (parent, pos)
    }

    fn attach(&mut self, id: NodeId, parent: Option<NodeId>, at: usize) {
        let siblings = self.siblings_mut(parent);
        let at = at.min(siblings.len());
        siblings.insert(at, id);
        self.slot_mut(id).parent = parent;
    }

    /// True when `node` is `ancestor` or sits somewhere below it.
    fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.slot(id).parent;
        }
        false
    }

    fn free_subtree(&mut self, id: NodeId) {
        if let Some(slot) = self.slots[id.0].take() {
            self.index.remove(&slot.href);
            for child in slot.children {
                self.free_subtree(child);
            }
        }
    }
}

fn position(seq: &[NodeId], id: NodeId) -> usize {
    seq.iter()
        .position(|&x| x == id)
        .expect("node listed under its parent")
}
