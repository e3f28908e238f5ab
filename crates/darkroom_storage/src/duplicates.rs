//! Duplicate groups derived from the index.

use crate::LocationIndex;
use darkroom_core::{AssetId, Checksum};
use std::collections::BTreeMap;

/// Sets of assets sharing a checksum. Derived on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateGroups {
    groups: BTreeMap<Checksum, Vec<AssetId>>,
}

impl DuplicateGroups {
    /// Group `(asset, checksum)` pairs, keeping only checksums shared by at
    /// least two assets. Members are sorted.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (AssetId, Checksum)>) -> Self {
        let mut all: BTreeMap<Checksum, Vec<AssetId>> = BTreeMap::new();
        for (id, checksum) in pairs {
            all.entry(checksum).or_default().push(id);
        }
        all.retain(|_, ids| ids.len() > 1);
        for ids in all.values_mut() {
            ids.sort();
            ids.dedup();
        }
        all.retain(|_, ids| ids.len() > 1);
        Self { groups: all }
    }

    /// Group the committed entries of an index.
    pub fn from_index(index: &LocationIndex) -> Self {
        Self::from_pairs(
            index
                .snapshot()
                .into_iter()
                .map(|(id, entry)| (id, entry.checksum)),
        )
    }

    /// Members of the group for `checksum`.
    pub fn group(&self, checksum: &Checksum) -> Option<&[AssetId]> {
        self.groups.get(checksum).map(Vec::as_slice)
    }

    /// Iterate over groups in checksum order.
    pub fn iter(&self) -> impl Iterator<Item = (&Checksum, &[AssetId])> {
        self.groups.iter().map(|(c, ids)| (c, ids.as_slice()))
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no duplicates exist.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_shared_checksums_form_groups() {
        let same = Checksum::of_bytes(b"same");
        let (a, b, c) = (AssetId::new(), AssetId::new(), AssetId::new());
        let groups = DuplicateGroups::from_pairs([
            (a, same),
            (b, Checksum::of_bytes(b"other")),
            (c, same),
        ]);
        assert_eq!(groups.len(), 1);
        let mut expected = vec![a, c];
        expected.sort();
        assert_eq!(groups.group(&same), Some(expected.as_slice()));
    }
}
