// Comment tree assembly.
//
// Comments arrive as a flat, chronologically ordered list where each row may
// name a parent. We index them by id, decide each comment's parent by
// position, then build the owned tree bottom-up. No recursion, no shared
// ownership: the id map and child lists are plain index arenas.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::CommentRecord;

/// A comment plus its replies, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentRecord,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Number of nodes below this one (not counting itself).
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CommentNode> = self.replies.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }
}

/// Rebuild the reply forest for one post's comments.
///
/// A comment is attached under its parent only when the parent appeared
/// earlier in the input. Anything else (no parent, a parent id that is
/// missing or deleted, a self- or forward reference) becomes a root, so every
/// input comment appears exactly once and the result can never contain a
/// cycle.
pub fn build_tree(comments: Vec<CommentRecord>) -> Vec<CommentNode> {
    let n = comments.len();

    // First occurrence wins if an id is repeated
    let mut position: HashMap<i64, usize> = HashMap::with_capacity(n);
    for (i, comment) in comments.iter().enumerate() {
        position.entry(comment.id).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots: Vec<usize> = Vec::new();
    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id.and_then(|p| position.get(&p)) {
            Some(&parent) if parent < i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    // Children always sit after their parent, so walking backwards finishes
    // every subtree before the node that owns it.
    let mut built: Vec<Option<CommentNode>> = vec![None; n];
    for (i, comment) in comments.into_iter().enumerate().rev() {
        let replies = children[i]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        built[i] = Some(CommentNode { comment, replies });
    }

    roots.into_iter().filter_map(|r| built[r].take()).collect()
}

/// Total nodes in a forest, roots included.
pub fn node_count(forest: &[CommentNode]) -> usize {
    forest.iter().map(|root| 1 + root.descendant_count()).sum()
}
