//! Threshold queries
//!
//! Results are grouped by attendance and always come back highest attendance first, for both
//! directions. Within one attendance, ids keep their insertion order.

use strum::EnumString;

use super::avl::AttendanceTree;
use super::node::Node;
use crate::Attendance;
use crate::StudentId;

/// Which side of the threshold qualifies. The threshold itself always qualifies.
#[derive(Clone, Copy, Debug, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum Direction {
    /// Attendance at or above the threshold.
    #[strum(serialize = "above", serialize = "1")]
    Above,
    /// Attendance at or below the threshold.
    #[strum(serialize = "below", serialize = "-1")]
    Below,
}

impl Direction {
    /// Does a key qualify against this threshold?
    pub fn qualifies(self, key: Attendance, threshold: Attendance) -> bool {
        match self {
            Direction::Above => key >= threshold,
            Direction::Below => key <= threshold,
        }
    }
}

impl AttendanceTree {
    /// Return the ids of every key qualifying against `threshold`, highest key first.
    ///
    /// An empty result means no key qualified.
    pub fn collect(&self, threshold: Attendance, direction: Direction) -> Vec<StudentId> {
        let mut result = vec![];
        // Reverse in-order walk, skipping subtrees which cannot hold a qualifying key.
        let mut stack: Vec<&Node> = vec![];
        let mut current = self.root();
        loop {
            while let Some(node) = current {
                stack.push(node);
                current = if direction == Direction::Below && node.key >= threshold {
                    None
                } else {
                    node.right.as_deref()
                };
            }
            let node = match stack.pop() {
                Some(node) => node,
                None => break,
            };
            if direction == Direction::Above && node.key < threshold {
                // Everything still to come is smaller.
                break;
            }
            if direction.qualifies(node.key, threshold) {
                result.extend_from_slice(&node.bucket);
            }
            current = if direction == Direction::Above && node.key <= threshold {
                None
            } else {
                node.left.as_deref()
            };
        }
        tracing::debug!(threshold, ?direction, found = result.len(), "threshold query");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::str::FromStr;

    use rand::Rng;

    #[test]
    fn it_parses_directions() {
        assert_eq!(Direction::from_str("1"), Ok(Direction::Above));
        assert_eq!(Direction::from_str("above"), Ok(Direction::Above));
        assert_eq!(Direction::from_str("ABOVE"), Ok(Direction::Above));
        assert_eq!(Direction::from_str("-1"), Ok(Direction::Below));
        assert_eq!(Direction::from_str("Below"), Ok(Direction::Below));
        assert!(Direction::from_str("0").is_err());
        assert!(Direction::from_str("2").is_err());
        assert!(Direction::from_str("").is_err());
    }

    #[test]
    fn it_collects_above_highest_first() {
        let mut tree = AttendanceTree::new();
        tree.insert(75, 101);
        tree.insert(80, 102);
        tree.insert(75, 103);
        assert_eq!(tree.collect(70, Direction::Above), vec![102, 101, 103]);
    }

    #[test]
    fn it_collects_below_highest_first() {
        let mut tree = AttendanceTree::new();
        tree.insert(10, 1);
        tree.insert(20, 2);
        tree.insert(30, 3);
        tree.insert(20, 4);
        assert_eq!(tree.collect(20, Direction::Below), vec![2, 4, 1]);
    }

    #[test]
    fn it_includes_threshold_in_both_directions() {
        let mut tree = AttendanceTree::new();
        for key in [40, 50, 60] {
            tree.insert(key, key);
        }
        assert_eq!(tree.collect(50, Direction::Above), vec![60, 50]);
        assert_eq!(tree.collect(50, Direction::Below), vec![50, 40]);
    }

    #[test]
    fn it_returns_nothing_when_nothing_qualifies() {
        let mut tree = AttendanceTree::new();
        tree.insert(50, 1);
        assert!(tree.collect(51, Direction::Above).is_empty());
        assert!(tree.collect(49, Direction::Below).is_empty());
        assert!(AttendanceTree::new()
            .collect(0, Direction::Above)
            .is_empty());
    }

    #[test]
    fn it_matches_full_scan() {
        let mut rng = rand::thread_rng();
        let mut tree = AttendanceTree::new();
        for id in 0..500 {
            tree.insert(rng.gen_range(0..=100), id);
        }
        for threshold in -1..=101 {
            for direction in [Direction::Above, Direction::Below] {
                let expected: Vec<StudentId> = tree
                    .keys()
                    .into_iter()
                    .rev()
                    .filter(|key| direction.qualifies(*key, threshold))
                    .flat_map(|key| tree.bucket(key).unwrap_or_default().to_vec())
                    .collect();
                assert_eq!(tree.collect(threshold, direction), expected);
            }
        }
    }
}
