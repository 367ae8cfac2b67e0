//! AVL tree implementation
//!
//! This is the main data structure exposed by the library.
//!
//! The tree is keyed by attendance. It is not keyed by student id, so anything that starts from
//! an id (removal, lookup) has to scan the whole tree.
//!

use std::cmp::Ordering;
use std::ops::ControlFlow;

use anyhow::Result;
use thiserror::Error;

use super::node;
use super::node::Link;
use super::node::Node;
use crate::Attendance;
use crate::StudentId;

/// Tree invariant violations, reported by [`AttendanceTree::verify`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// A key sits on the wrong side of one of its ancestors
    #[error("key: {0} is out of order")]
    OutOfOrder(Attendance),

    /// A node survived with no ids in its bucket
    #[error("node with key: {0} has an empty bucket")]
    EmptyBucket(Attendance),

    /// The same id appears twice in one bucket
    #[error("student id: {id} appears more than once under key: {key}")]
    DuplicateId {
        /// Node key
        key: Attendance,
        /// Repeated id
        id: StudentId,
    },

    /// Stored height disagrees with the subtree
    #[error("node with key: {key} records height {stored}, subtree height is {actual}")]
    HeightMismatch {
        /// Node key
        key: Attendance,
        /// Height recorded in the node
        stored: i32,
        /// Height computed from the children
        actual: i32,
    },

    /// Subtree heights differ by more than one
    #[error("node with key: {key} is unbalanced: {balance}")]
    Unbalanced {
        /// Node key
        key: Attendance,
        /// Balance factor
        balance: i32,
    },
}

/// An AVL tree mapping attendance to buckets of student ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttendanceTree {
    root: Link,
}

impl AttendanceTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self { root: None }
    }

    pub(crate) fn from_root(root: Link) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> Option<&Node> {
        self.root.as_deref()
    }

    /// Does the tree hold no keys at all?
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the tree. An empty tree has height 0.
    pub fn height(&self) -> i32 {
        node::height(&self.root)
    }

    /// Return count of keys (nodes).
    pub fn len(&self) -> usize {
        let mut len = 0;
        self.traverse_nodes(|_| {
            len += 1;
            ControlFlow::Continue(())
        });
        len
    }

    /// Return count of student ids, summed over every bucket.
    pub fn count(&self) -> usize {
        let mut count = 0;
        self.traverse_nodes(|node| {
            count += node.bucket.len();
            ControlFlow::Continue(())
        });
        count
    }

    /// Return all keys in ascending order.
    pub fn keys(&self) -> Vec<Attendance> {
        let mut keys = vec![];
        self.traverse_nodes(|node| {
            keys.push(node.key);
            ControlFlow::Continue(())
        });
        keys
    }

    /// Return the bucket stored under a key, in insertion order.
    pub fn bucket(&self, key: Attendance) -> Option<&[StudentId]> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match key.cmp(&node.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(&node.bucket),
            };
        }
        None
    }

    /// Return the key whose bucket holds this id (lowest key first if there are several).
    pub fn find(&self, id: StudentId) -> Option<Attendance> {
        let mut found = None;
        self.traverse_nodes(|node| {
            if node.contains(id) {
                found = Some(node.key);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found
    }

    /// Insert an id under a key. Inserting an id already present under that key does nothing.
    pub fn insert(&mut self, key: Attendance, id: StudentId) {
        tracing::debug!(key, id, "inserting");
        self.root = Some(insert_node(self.root.take(), key, id));
    }

    /// Remove an id from whichever bucket holds it, deleting the node if the bucket empties.
    ///
    /// Returns true if the id was found.
    pub fn remove_by_id(&mut self, id: StudentId) -> bool {
        let (root, found) = remove_id(self.root.take(), id);
        self.root = root;
        tracing::debug!(id, found, "removed by id");
        found
    }

    /// Move an id to a new key: remove it wherever it is, then insert it under `new_key`.
    ///
    /// The insert happens whether or not the id was known. Returns true if this was an update of
    /// an existing id, false if it was a fresh insertion.
    pub fn update_key(&mut self, id: StudentId, new_key: Attendance) -> bool {
        let found = self.remove_by_id(id);
        self.insert(new_key, id);
        found
    }

    /// Log basic information about our tree.
    pub fn info(&self) {
        tracing::info!(
            keys = self.len(),
            ids = self.count(),
            height = self.height(),
            "AVL index"
        );
    }

    /// Verify ordering, balance, heights and buckets of every node in the tree.
    pub fn verify(&self) -> Result<()> {
        if let Some(root) = self.root.as_deref() {
            if let Err(e) = verify_node(root, None, None) {
                tracing::error!("verification failed: {e}");
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Print to stdout all the nodes in the tree, in key order.
    pub fn print_nodes(&self) {
        self.traverse_nodes(|node| {
            println!(
                "key: {}, height: {}, balance: {}, ids: {:?}",
                node.key,
                node.height,
                node.balance_factor(),
                node.bucket
            );
            ControlFlow::Continue(())
        });
    }

    /// Print to stdout all the keys in the tree.
    pub fn print_keys(&self) {
        let mut sep = "";
        self.traverse_nodes(|node| {
            print!("{sep}{}", node.key);
            sep = ", ";
            ControlFlow::Continue(())
        });
        println!();
    }

    /// Traverse all nodes in ascending key order using the callback.
    pub(crate) fn traverse_nodes(&self, mut f: impl FnMut(&Node) -> ControlFlow<()>) {
        let mut stack = vec![];
        let mut current = self.root.as_deref();
        loop {
            while let Some(node) = current {
                stack.push(node);
                current = node.left.as_deref();
            }
            match stack.pop() {
                Some(node) => {
                    if f(node).is_break() {
                        break;
                    }
                    current = node.right.as_deref();
                }
                None => break,
            }
        }
    }
}

fn insert_node(link: Link, key: Attendance, id: StudentId) -> Box<Node> {
    let mut node = match link {
        Some(node) => node,
        None => return Box::new(Node::leaf(key, id)),
    };
    match key.cmp(&node.key) {
        Ordering::Less => node.left = Some(insert_node(node.left.take(), key, id)),
        Ordering::Greater => node.right = Some(insert_node(node.right.take(), key, id)),
        Ordering::Equal => {
            node.add_id(id);
            return node;
        }
    }
    node::rebalance(node)
}

/// Once a node's bucket holds the id we stop descending below it. Otherwise both children are
/// searched, so an id filed under several keys is removed from each branch.
fn remove_id(link: Link, id: StudentId) -> (Link, bool) {
    let mut node = match link {
        Some(node) => node,
        None => return (None, false),
    };
    if node.remove_id(id) {
        if node.bucket.is_empty() {
            tracing::debug!(key = node.key, "bucket empty, removing node");
            return (remove_node(node), true);
        }
        return (Some(node), true);
    }
    let (left, found_left) = remove_id(node.left.take(), id);
    node.left = left;
    let (right, found_right) = remove_id(node.right.take(), id);
    node.right = right;
    (Some(node::rebalance(node)), found_left || found_right)
}

fn remove_node(mut node: Box<Node>) -> Link {
    match (node.left.take(), node.right.take()) {
        (None, right) => right,
        (left, None) => left,
        (left, Some(right)) => {
            let (right, successor) = take_min(right);
            node.key = successor.key;
            node.bucket = successor.bucket;
            node.left = left;
            node.right = right;
            Some(node::rebalance(node))
        }
    }
}

/// Detach the leftmost node of a subtree. Returns the rebalanced remainder and the detached node.
fn take_min(mut node: Box<Node>) -> (Link, Box<Node>) {
    match node.left.take() {
        Some(left) => {
            let (left, min) = take_min(left);
            node.left = left;
            (Some(node::rebalance(node)), min)
        }
        None => {
            let rest = node.right.take();
            (rest, node)
        }
    }
}

/// Returns the height of a valid subtree. Keys must lie strictly between `lower` and `upper`.
fn verify_node(
    node: &Node,
    lower: Option<Attendance>,
    upper: Option<Attendance>,
) -> Result<i32, TreeError> {
    if lower.is_some_and(|l| node.key <= l) || upper.is_some_and(|u| node.key >= u) {
        return Err(TreeError::OutOfOrder(node.key));
    }
    if node.bucket.is_empty() {
        return Err(TreeError::EmptyBucket(node.key));
    }
    for (pos, id) in node.bucket.iter().enumerate() {
        if node.bucket[..pos].contains(id) {
            return Err(TreeError::DuplicateId {
                key: node.key,
                id: *id,
            });
        }
    }
    let left = match node.left.as_deref() {
        Some(child) => verify_node(child, lower, Some(node.key))?,
        None => 0,
    };
    let right = match node.right.as_deref() {
        Some(child) => verify_node(child, Some(node.key), upper)?,
        None => 0,
    };
    let actual = 1 + left.max(right);
    if node.height != actual {
        return Err(TreeError::HeightMismatch {
            key: node.key,
            stored: node.height,
            actual,
        });
    }
    let balance = left - right;
    if balance.abs() > 1 {
        return Err(TreeError::Unbalanced {
            key: node.key,
            balance,
        });
    }
    Ok(actual)
}
