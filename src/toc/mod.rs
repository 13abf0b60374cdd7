pub mod tree;

pub use tree::{NodeId, NodeRef, TocTree};

use crate::error::{Result, SmithError};
use crate::store::{BookRecord, ContentStore};
use serde::{Deserialize, Serialize};

/// The persisted form of an outline entry.
///
/// `href` is the node's identity and the key of its body in the content
/// store. A missing `subitems` and an empty one both mean "leaf".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocNode {
    pub label: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subitems: Option<Vec<TocNode>>,
}

impl TocNode {
    pub fn leaf(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            subitems: None,
        }
    }

    pub fn with_children(
        label: impl Into<String>,
        href: impl Into<String>,
        children: Vec<TocNode>,
    ) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
            subitems: if children.is_empty() {
                None
            } else {
                Some(children)
            },
        }
    }

    pub fn children(&self) -> &[TocNode] {
        self.subitems.as_deref().unwrap_or(&[])
    }
}

/// Pre-order, depth-first linearisation: parent first, then its children,
/// siblings in order. Spine, manifest and navigation order all come from here.
pub fn flatten(nodes: &[TocNode]) -> Vec<&TocNode> {
    let mut out = Vec::new();
    push_preorder(nodes, &mut out);
    out
}

fn push_preorder<'a>(nodes: &'a [TocNode], out: &mut Vec<&'a TocNode>) {
    for node in nodes {
        out.push(node);
        push_preorder(node.children(), out);
    }
}

/// Depth of the deepest entry; 0 for an empty outline, 1 for a flat one.
pub fn max_depth(nodes: &[TocNode]) -> usize {
    nodes
        .iter()
        .map(|n| 1 + max_depth(n.children()))
        .max()
        .unwrap_or(0)
}

/// Load a live book and its outline as an editable tree.
pub fn load_outline(store: &dyn ContentStore, book_id: &str) -> Result<(BookRecord, TocTree)> {
    let book = store.get_book(book_id)?;
    if book.deleted {
        return Err(SmithError::NotFound(format!("book {book_id}")));
    }
    let tree = TocTree::from_nodes(&book.toc)?;
    Ok((book, tree))
}

/// Load a book's outline, apply `edit`, and write the outline back.
///
/// Nothing is written when `edit` fails.
pub fn modify_outline<T>(
    store: &mut dyn ContentStore,
    book_id: &str,
    edit: impl FnOnce(&mut TocTree, &mut dyn ContentStore) -> Result<T>,
) -> Result<T> {
    let (_, mut tree) = load_outline(store, book_id)?;
    let out = edit(&mut tree, &mut *store)?;
    store.update_toc(book_id, &tree.to_nodes())?;
    Ok(out)
}
