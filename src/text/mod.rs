//! Rope-like text store: chunks, regions, lazy handles, and the document
//! that owns the tree root (§3, §4.1).

pub mod block;
pub mod chunk;
pub mod document;
pub mod handle;
pub mod node;
pub mod region;
pub mod view;

pub use block::TextBlock;
pub use chunk::TextChunk;
pub use document::TextDocument;
pub use handle::{BlockFactory, TextBlockHandle};
pub use node::TextNode;
pub use region::TextRegion;
