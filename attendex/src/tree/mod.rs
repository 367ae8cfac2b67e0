//! AVL tree implementation
//!

// Re-export
pub use self::avl::AttendanceTree;
pub use self::avl::TreeError;
pub use self::threshold::Direction;

pub mod avl;
pub(crate) mod node;
pub mod threshold;
