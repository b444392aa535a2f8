mod expression;
mod statement;

pub use self::expression::*;
pub use self::statement::*;

use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of an expression that names a binding. The resolver keys its
/// side table by it, so ids must stay unique for the lifetime of the
/// process (a REPL feeds one interpreter from many parses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn fresh() -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}
