//! `SlokedTransactionPatch` — the displacement map a commit produces,
//! rebasing positions recorded before it (§3, §4.2).

use sloked_collections::RangeMap;

use crate::position::{TextPosition, TextPositionDelta};

/// One layer per leaf transaction inside a (possibly nested) `Batch`;
/// `NextTransaction` opens a new layer so `Batch`'s children compose in
/// commit order rather than colliding in a single `RangeMap`.
#[derive(Debug, Clone)]
pub struct SlokedTransactionPatch {
    layers: Vec<RangeMap<TextPosition, TextPositionDelta>>,
}

impl SlokedTransactionPatch {
    pub fn new() -> SlokedTransactionPatch {
        SlokedTransactionPatch { layers: vec![RangeMap::new(TextPosition::MIN)] }
    }

    pub fn next_transaction(&mut self) {
        self.layers.push(RangeMap::new(TextPosition::MIN));
    }

    pub fn current_mut(&mut self) -> &mut RangeMap<TextPosition, TextPositionDelta> {
        self.layers.last_mut().expect("patch always holds at least one layer")
    }

    pub fn has(&self, pos: &TextPosition) -> bool {
        self.layers.iter().any(|layer| layer.has(pos))
    }

    /// Cumulative displacement `pos` accrues threading through every layer
    /// in order, re-querying each layer at the position the prior layers
    /// already translated it to.
    pub fn at(&self, pos: &TextPosition) -> TextPositionDelta {
        self.layers.iter().fold(TextPositionDelta::ZERO, |acc, layer| {
            let probe = pos.apply(acc);
            match layer.at(&probe) {
                Some(delta) => acc + *delta,
                None => acc,
            }
        })
    }

    pub fn apply(&self, pos: TextPosition) -> TextPosition {
        pos.apply(self.at(&pos))
    }

    pub fn extend(&mut self, other: &SlokedTransactionPatch) {
        for layer in &other.layers {
            self.layers.push(layer.clone());
        }
    }

    /// The patch that undoes this one: same layers in reverse order, each
    /// displacement negated. Used to rebase sibling streams after a
    /// rollback, mirroring what `commit` rebased them with.
    ///
    /// This reuses the committed patch's segment boundaries rather than
    /// recomputing them against the post-rollback document; exact for the
    /// single-dimension shifts every transaction variant produces, which is
    /// the only shape `write_patch` emits.
    pub fn negated(&self) -> SlokedTransactionPatch {
        let mut out = SlokedTransactionPatch { layers: Vec::new() };
        for layer in self.layers.iter().rev() {
            let entries: Vec<(TextPosition, Option<TextPositionDelta>)> =
                layer.iter().map(|(k, v)| (*k, v.copied())).collect();
            let mut negated = RangeMap::new(TextPosition::MIN);
            for (i, (begin, delta)) in entries.iter().enumerate() {
                if let Some(delta) = delta {
                    let end = entries.get(i + 1).map(|(k, _)| *k).unwrap_or(TextPosition::new(u64::MAX, u64::MAX));
                    negated.insert(*begin, end, TextPositionDelta::new(-delta.line, -delta.column));
                }
            }
            out.layers.push(negated);
        }
        out
    }
}

impl Default for SlokedTransactionPatch {
    fn default() -> Self {
        SlokedTransactionPatch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layer_insert_shifts_same_line() {
        let mut patch = SlokedTransactionPatch::new();
        patch
            .current_mut()
            .insert(TextPosition::new(0, 5), TextPosition::new(1, 0), TextPositionDelta::new(0, 6));
        let shifted = patch.apply(TextPosition::new(0, 8));
        assert_eq!(shifted, TextPosition::new(0, 14));
        let untouched = patch.apply(TextPosition::new(0, 2));
        assert_eq!(untouched, TextPosition::new(0, 2));
    }

    #[test]
    fn layers_compose_in_order() {
        let mut patch = SlokedTransactionPatch::new();
        patch
            .current_mut()
            .insert(TextPosition::new(0, 0), TextPosition::new(1, 0), TextPositionDelta::new(0, 1));
        patch.next_transaction();
        patch
            .current_mut()
            .insert(TextPosition::new(0, 0), TextPosition::new(1, 0), TextPositionDelta::new(0, 2));
        let shifted = patch.apply(TextPosition::new(0, 0));
        assert_eq!(shifted, TextPosition::new(0, 3));
    }
}
