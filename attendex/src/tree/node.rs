//! AVL Node Types

use crate::Attendance;
use crate::StudentId;

/// An exclusively owned, possibly absent, subtree.
pub(crate) type Link = Option<Box<Node>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) key: Attendance,
    pub(crate) bucket: Vec<StudentId>,
    pub(crate) height: i32,
    pub(crate) left: Link,
    pub(crate) right: Link,
}

pub(crate) fn height(link: &Link) -> i32 {
    link.as_ref().map_or(0, |node| node.height)
}

pub(crate) fn balance_factor(link: &Link) -> i32 {
    link.as_ref().map_or(0, |node| node.balance_factor())
}

impl Node {
    pub(crate) fn leaf(key: Attendance, id: StudentId) -> Self {
        Self::with_bucket(key, vec![id], 1)
    }

    /// A childless node carrying a stored height. Children are attached by the caller.
    pub(crate) fn with_bucket(key: Attendance, bucket: Vec<StudentId>, height: i32) -> Self {
        Self {
            key,
            bucket,
            height,
            left: None,
            right: None,
        }
    }

    pub(crate) fn contains(&self, id: StudentId) -> bool {
        self.bucket.contains(&id)
    }

    /// Append an id unless the bucket already holds it.
    pub(crate) fn add_id(&mut self, id: StudentId) -> bool {
        if self.contains(id) {
            false
        } else {
            self.bucket.push(id);
            true
        }
    }

    /// Remove an id, keeping the remaining ids in insertion order.
    pub(crate) fn remove_id(&mut self, id: StudentId) -> bool {
        match self.bucket.iter().position(|x| *x == id) {
            Some(pos) => {
                self.bucket.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn update_height(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
    }

    pub(crate) fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

pub(crate) fn rotate_right(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = match node.left.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.left = pivot.right.take();
    node.update_height();
    pivot.right = Some(node);
    pivot.update_height();
    pivot
}

pub(crate) fn rotate_left(mut node: Box<Node>) -> Box<Node> {
    let mut pivot = match node.right.take() {
        Some(pivot) => pivot,
        None => return node,
    };
    node.right = pivot.left.take();
    node.update_height();
    pivot.left = Some(node);
    pivot.update_height();
    pivot
}

/// Recompute the height of a node whose children are balanced, then rotate if the node itself
/// is out of balance. Returns the new subtree root.
pub(crate) fn rebalance(mut node: Box<Node>) -> Box<Node> {
    node.update_height();
    let balance = node.balance_factor();
    if balance > 1 {
        if balance_factor(&node.left) < 0 {
            tracing::debug!(key = node.key, balance, "left-right rotation");
            node.left = node.left.take().map(rotate_left);
        } else {
            tracing::debug!(key = node.key, balance, "right rotation");
        }
        return rotate_right(node);
    }
    if balance < -1 {
        if balance_factor(&node.right) > 0 {
            tracing::debug!(key = node.key, balance, "right-left rotation");
            node.right = node.right.take().map(rotate_right);
        } else {
            tracing::debug!(key = node.key, balance, "left rotation");
        }
        return rotate_left(node);
    }
    node
}
