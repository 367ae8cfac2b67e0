#![warn(missing_docs)]
//! Attendex AVL Index
//!
//! # Implementation Details
//!
//! Provides a persistent secondary index mapping an attendance percentage (0 to 100) to the
//! student ids holding that percentage.
//!
//! The index is an AVL tree keyed by attendance. Each node owns a bucket of student ids, kept in
//! insertion order. Nodes own their children outright, so a rotation simply moves boxed subtrees
//! around.
//!
//! (If you aren't sure what that means, you can read more about AVL trees here: <https://en.wikipedia.org/wiki/AVL_tree>.)
//!
//! Every invocation of a front end loads the whole tree from its file, applies at most one
//! operation and, for mutations, writes the whole tree back. Nothing is cached between
//! operations.
//!
//! The file is a small header (magic and body length) followed by the tree in pre-order. See
//! [`io::codec`] for the exact layout.
//!
//! Threshold queries return ids grouped by attendance, highest attendance first, whichever
//! direction is requested.
//!

pub mod io;
pub mod loader;
pub mod tree;

use bincode::config::AllowTrailing;
use bincode::config::FixintEncoding;
use bincode::config::WithOtherIntEncoding;
use bincode::config::WithOtherTrailing;
use bincode::{DefaultOptions, Options};
use std::sync::LazyLock;

/// Attendance percentage. Valid values are `MIN_ATTENDANCE..=MAX_ATTENDANCE`.
pub type Attendance = i32;

/// Student identifier.
pub type StudentId = i32;

/// Lowest accepted attendance.
pub const MIN_ATTENDANCE: Attendance = 0;

/// Highest accepted attendance.
pub const MAX_ATTENDANCE: Attendance = 100;

/// Is this attendance inside the accepted range?
pub fn is_valid_attendance(attendance: Attendance) -> bool {
    (MIN_ATTENDANCE..=MAX_ATTENDANCE).contains(&attendance)
}

static BINCODER: LazyLock<
    WithOtherIntEncoding<WithOtherTrailing<DefaultOptions, AllowTrailing>, FixintEncoding>,
> = LazyLock::new(|| {
    bincode::DefaultOptions::new()
        .allow_trailing_bytes()
        .with_fixint_encoding()
});
