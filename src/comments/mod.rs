// Comments: reply-tree assembly and the comment write paths that keep a
// post's comment_count in step.

pub mod lifecycle;
pub mod tree;

pub use lifecycle::{thread_from_rows, CommentService};
pub use tree::{build_tree, node_count, CommentNode};
