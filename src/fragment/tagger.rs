//! `Tagger` — the lazy upstream fragment producer a `FragmentCache` draws
//! from (§4.4).

use crate::fragment::map::Fragment;
use crate::position::TextPosition;

pub trait Tagger<T> {
    /// Next fragment in ascending-start order, or `None` once the producer
    /// has covered the document.
    fn next(&mut self) -> Option<Fragment<T>>;

    /// Reposition the producer so the next `next()` call covers `pos`
    /// onward.
    fn rewind(&mut self, pos: TextPosition);
}
