//! Branch-and-bound search tree management.

mod arena;
mod loader;
mod node;
mod policy;
mod queue;
mod tree;

pub use arena::NodeId;
pub use loader::LoadStatus;
pub use node::{ConsId, Node, NodeType};
pub use policy::{SnapshotContext, SnapshotPolicy};
pub use queue::{Frontier, NodeKey};
pub use tree::{Activation, Tree, TreeStats};
