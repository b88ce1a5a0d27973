//! In-memory view of a dataset's master index.
//!
//! A [`GlobalIndex`] is bulk loaded once from the partitions read out of the
//! master-index file and then answers any number of range queries. Queries
//! go through an R-tree over the partition rectangles; iteration keeps the
//! order the partitions were loaded in.

use crate::cell::{Cell, CellId, envelope_of};
use crate::error::{GridError, Result};
use crate::partition::Partition;
use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use spatio_grid_types::Rectangle;

#[derive(Debug, Clone)]
struct PartitionEntry {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for PartitionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Partitions of one dataset plus the two layout classifiers.
///
/// # Example
///
/// ```rust
/// use spatio_grid::{GlobalIndex, Partition, Rectangle};
///
/// let mut index = GlobalIndex::new();
/// index.bulk_load(vec![
///     Partition::new(0, Rectangle::new(0.0, 0.0, 5.0, 5.0), "part-0"),
///     Partition::new(1, Rectangle::new(5.0, 0.0, 10.0, 5.0), "part-1"),
/// ]);
///
/// let hits: Vec<_> = index
///     .range_query(&Rectangle::new(6.0, 1.0, 7.0, 2.0))?
///     .map(|p| p.filename.as_str())
///     .collect();
/// assert_eq!(hits, vec!["part-1"]);
/// # Ok::<(), spatio_grid::GridError>(())
/// ```
#[derive(Debug, Default)]
pub struct GlobalIndex {
    partitions: Vec<Partition>,
    tree: Option<RTree<PartitionEntry>>,
    /// Slots whose rectangle has a NaN coordinate; they cannot be placed in
    /// the tree, so every query returns them.
    unplaced: Vec<usize>,
    compact: bool,
    replicated: bool,
}

impl GlobalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the partitions, replacing anything loaded before.
    pub fn bulk_load(&mut self, partitions: impl IntoIterator<Item = Partition>) {
        self.partitions = partitions.into_iter().collect();
        self.unplaced.clear();

        let mut entries = Vec::with_capacity(self.partitions.len());
        for (slot, partition) in self.partitions.iter().enumerate() {
            let rect = partition.rect();
            if [rect.x1, rect.y1, rect.x2, rect.y2].iter().any(|v| v.is_nan()) {
                log::warn!(
                    "partition '{}' of cell {} has a NaN rectangle",
                    partition.filename,
                    partition.cell_id()
                );
                self.unplaced.push(slot);
            } else {
                entries.push(PartitionEntry {
                    slot,
                    envelope: envelope_of(rect),
                });
            }
        }
        self.tree = Some(RTree::bulk_load(entries));
        log::debug!("global index loaded with {} partitions", self.partitions.len());
    }

    pub fn is_loaded(&self) -> bool {
        self.tree.is_some()
    }

    /// Partitions whose rectangle intersects `query`, edges included.
    ///
    /// The returned iterator is lazy; every call starts an independent
    /// traversal. Order is unspecified.
    pub fn range_query(&self, query: &Rectangle) -> Result<RangeQuery<'_>> {
        let tree = self.tree.as_ref().ok_or(GridError::IndexNotLoaded)?;

        let hits = if [query.x1, query.y1, query.x2, query.y2]
            .iter()
            .any(|v| v.is_nan())
        {
            log::warn!("Rejecting range query with NaN coordinates");
            None
        } else {
            Some(tree.locate_in_envelope_intersecting(&envelope_of(query)))
        };

        Ok(RangeQuery {
            partitions: &self.partitions,
            hits,
            unplaced: self.unplaced.iter(),
        })
    }

    /// All partitions in load order; empty before [`bulk_load`](Self::bulk_load).
    pub fn iter(&self) -> std::slice::Iter<'_, Partition> {
        self.partitions.iter()
    }

    pub fn first(&self) -> Option<&Partition> {
        self.partitions.first()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn set_compact(&mut self, compact: bool) {
        self.compact = compact;
    }

    /// Blocks carry a local tree index.
    pub fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn set_replicated(&mut self, replicated: bool) {
        self.replicated = replicated;
    }

    /// A record may be stored in more than one partition.
    pub fn is_replicated(&self) -> bool {
        self.replicated
    }

    /// One logical cell per distinct cell id; see [`merge_cells`].
    pub fn cells(&self) -> Vec<Cell> {
        merge_cells(&self.partitions)
    }
}

impl<'a> IntoIterator for &'a GlobalIndex {
    type Item = &'a Partition;
    type IntoIter = std::slice::Iter<'a, Partition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy result of [`GlobalIndex::range_query`].
pub struct RangeQuery<'a> {
    partitions: &'a [Partition],
    hits: Option<rstar::iterators::LocateInEnvelopeIntersecting<'a, PartitionEntry>>,
    unplaced: std::slice::Iter<'a, usize>,
}

impl<'a> Iterator for RangeQuery<'a> {
    type Item = &'a Partition;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(hits) = self.hits.as_mut()
            && let Some(entry) = hits.next()
        {
            return Some(&self.partitions[entry.slot]);
        }
        self.unplaced.next().map(|&slot| &self.partitions[slot])
    }
}

/// Collapse block fragments into logical cells.
///
/// Partitions sharing a cell id are fragments of one cell written by
/// different tasks; the merged cell covers the union of their rectangles.
/// Union is commutative and associative, so the result does not depend on
/// the order of the input. Cells come out in order of first appearance.
pub fn merge_cells<'a>(partitions: impl IntoIterator<Item = &'a Partition>) -> Vec<Cell> {
    let mut positions: FxHashMap<CellId, usize> = FxHashMap::default();
    let mut cells: Vec<Cell> = Vec::new();
    for partition in partitions {
        match positions.get(&partition.cell_id()) {
            Some(&pos) => cells[pos].expand(partition.rect()),
            None => {
                positions.insert(partition.cell_id(), cells.len());
                cells.push(partition.cell);
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Rectangle {
        Rectangle::new(x1, y1, x2, y2)
    }

    fn random_rect(rng: &mut StdRng) -> Rectangle {
        let x = rng.gen_range(-100.0..100.0);
        let y = rng.gen_range(-100.0..100.0);
        let w = rng.gen_range(0.0..20.0);
        let h = rng.gen_range(0.0..20.0);
        rect(x, y, x + w, y + h)
    }

    #[test]
    fn test_query_before_load_is_usage_error() {
        let index = GlobalIndex::new();
        let err = index.range_query(&rect(0.0, 0.0, 1.0, 1.0)).err().unwrap();
        assert!(err.is_usage_error());
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn test_iteration_keeps_load_order() {
        let mut index = GlobalIndex::new();
        let partitions: Vec<Partition> = (0..10)
            .rev()
            .map(|i| Partition::new(i, rect(i as f64, 0.0, i as f64 + 1.0, 1.0), format!("f{i}")))
            .collect();
        index.bulk_load(partitions.clone());
        let loaded: Vec<Partition> = index.iter().cloned().collect();
        assert_eq!(loaded, partitions);
        assert_eq!(index.first().unwrap().filename, "f9");
    }

    #[test]
    fn test_boundary_touching_counts() {
        let mut index = GlobalIndex::new();
        index.bulk_load(vec![Partition::new(0, rect(0.0, 0.0, 5.0, 5.0), "a")]);
        assert_eq!(index.range_query(&rect(5.0, 5.0, 9.0, 9.0)).unwrap().count(), 1);
        assert_eq!(index.range_query(&rect(5.01, 5.0, 9.0, 9.0)).unwrap().count(), 0);
    }

    #[test]
    fn test_range_query_has_no_false_negatives() {
        let mut rng = StdRng::seed_from_u64(17);
        let partitions: Vec<Partition> = (0..500)
            .map(|i| Partition::new(i, random_rect(&mut rng), format!("block-{i}")))
            .collect();
        let mut index = GlobalIndex::new();
        index.bulk_load(partitions.clone());

        for _ in 0..200 {
            let query = random_rect(&mut rng);
            let mut expected: Vec<&str> = partitions
                .iter()
                .filter(|p| p.rect().intersects(&query))
                .map(|p| p.filename.as_str())
                .collect();
            let mut found: Vec<&str> = index
                .range_query(&query)
                .unwrap()
                .map(|p| p.filename.as_str())
                .collect();
            expected.sort_unstable();
            found.sort_unstable();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_range_query_is_restartable() {
        let mut index = GlobalIndex::new();
        index.bulk_load(vec![
            Partition::new(0, rect(0.0, 0.0, 1.0, 1.0), "a"),
            Partition::new(1, rect(2.0, 2.0, 3.0, 3.0), "b"),
        ]);
        let query = rect(0.0, 0.0, 3.0, 3.0);
        let mut first = index.range_query(&query).unwrap();
        let second = index.range_query(&query).unwrap();
        assert!(first.next().is_some());
        assert_eq!(second.count(), 2);
        assert_eq!(first.count(), 1);
    }

    #[test]
    fn test_nan_partition_is_always_returned() {
        let mut index = GlobalIndex::new();
        index.bulk_load(vec![
            Partition::new(0, rect(0.0, 0.0, 1.0, 1.0), "a"),
            Partition::new(
                1,
                Rectangle { x1: f64::NAN, y1: 0.0, x2: 1.0, y2: 1.0 },
                "broken",
            ),
        ]);
        let names: Vec<_> = index
            .range_query(&rect(50.0, 50.0, 60.0, 60.0))
            .unwrap()
            .map(|p| p.filename.clone())
            .collect();
        assert_eq!(names, vec!["broken".to_string()]);
    }

    #[test]
    fn test_reload_replaces() {
        let mut index = GlobalIndex::new();
        index.bulk_load(vec![Partition::new(0, rect(0.0, 0.0, 1.0, 1.0), "a")]);
        index.bulk_load(vec![Partition::new(1, rect(5.0, 5.0, 6.0, 6.0), "b")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.range_query(&rect(0.0, 0.0, 1.0, 1.0)).unwrap().count(), 0);
    }

    #[test]
    fn test_flags() {
        let mut index = GlobalIndex::new();
        assert!(!index.is_compact() && !index.is_replicated());
        index.set_compact(true);
        index.set_replicated(true);
        assert!(index.is_compact() && index.is_replicated());
    }

    #[test]
    fn test_merge_fragments() {
        let a = Partition::new(5, rect(0.0, 0.0, 5.0, 5.0), "task-0");
        let b = Partition::new(5, rect(3.0, 3.0, 8.0, 8.0), "task-1");
        let cells = merge_cells([&a, &b]);
        assert_eq!(cells, vec![Cell::new(5, rect(0.0, 0.0, 8.0, 8.0))]);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let parts = [
            Partition::new(2, rect(0.0, 0.0, 1.0, 1.0), "a"),
            Partition::new(2, rect(-4.0, 0.5, 0.5, 2.0), "b"),
            Partition::new(2, rect(0.5, -3.0, 9.0, 0.5), "c"),
        ];
        let expected = Cell::new(2, rect(-4.0, -3.0, 9.0, 2.0));
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let merged = merge_cells(order.iter().map(|&i| &parts[i]));
            assert_eq!(merged, vec![expected]);
        }
    }

    #[test]
    fn test_merge_keeps_first_seen_order() {
        let mut index = GlobalIndex::new();
        index.bulk_load(vec![
            Partition::new(9, rect(0.0, 0.0, 1.0, 1.0), "a"),
            Partition::new(3, rect(1.0, 0.0, 2.0, 1.0), "b"),
            Partition::new(9, rect(0.0, 1.0, 1.0, 2.0), "c"),
        ]);
        let ids: Vec<CellId> = index.cells().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![9, 3]);
    }
}
