//! Ordered interval map and AVL rebalancing mixin shared by the rope (chunk
//! line maps), the transaction patch layer, and the fragment cache.

mod avl;
mod range_map;

pub use avl::{is_balanced, rebalance, rebalance_subtree, AvlNode};
pub use range_map::RangeMap;
