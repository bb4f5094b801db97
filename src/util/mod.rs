mod forwarding;
mod segment_tree;

pub use forwarding::*;
pub use segment_tree::*;
