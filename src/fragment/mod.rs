//! Async tag producer over text: cache, upstream `Tagger` contract, and the
//! updater that keeps the cache in step with a transaction stream (§3,
//! §4.4).

pub mod cache;
pub mod map;
pub mod tagger;
pub mod updater;

pub use cache::FragmentCache;
pub use map::{Fragment, TaggedFragmentMap};
pub use tagger::Tagger;
pub use updater::FragmentUpdater;
