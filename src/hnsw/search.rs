//! HNSW search algorithms: single-layer search and multi-layer KNN.
//!
//! `search_layer` keeps two bounded collections: a frontier (min side of a
//! [`DualHeap`]) for expansion and a result set bounded to `ef` by evicting
//! through the worst side. A per-layer tolerance factor admits candidates
//! slightly worse than the current worst retained result to counteract
//! premature convergence; layer 0 runs with a higher tolerance.

use crate::heap::DualHeap;
use crate::hnsw::distance::normalize;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::visited::VisitedSet;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    /// Thread-local VisitedSet pool, reused across searches on the same thread.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// Search a single layer of the HNSW graph.
///
/// Returns up to `ef` closest live nodes to the query at the given layer,
/// ascending by distance. Tombstoned nodes and `exclude` members are used
/// for navigation but never returned. `visited` is cleared at the start of
/// each call.
pub fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    exclude: Option<&HashSet<u32>>,
) -> Vec<(f32, u32)> {
    visited.clear();
    let tolerance = if layer == 0 {
        index.config.search_tolerance_base
    } else {
        index.config.search_tolerance
    };
    let excluded = |id: u32| exclude.is_some_and(|set| set.contains(&id));

    let mut frontier: DualHeap<u32> = DualHeap::with_capacity(ef * 2);
    let mut results: DualHeap<u32> = DualHeap::with_capacity(ef + 1);
    // Cached worst retained distance, refreshed on result-set mutation.
    let mut worst_dist = f32::MAX;

    for &ep in entry_points {
        if ep >= index.node_count || !visited.insert(ep) {
            continue;
        }
        let dist = index.query_distance(query, ep);
        frontier.push(dist, ep);
        if !index.is_deleted(ep) && !excluded(ep) {
            results.push(dist, ep);
            if results.len() >= ef {
                worst_dist = results.get_worst().map_or(f32::MAX, |(d, _)| d);
            }
        }
    }

    while let Some((c_dist, node)) = frontier.pop() {
        // Closest unexpanded candidate is beyond tolerance of the worst
        // retained result: the layer has converged.
        if results.len() >= ef && c_dist > worst_dist * tolerance {
            break;
        }

        for &neighbor in index.neighbors_of(node, layer) {
            if !visited.insert(neighbor) {
                continue;
            }
            let dist = index.query_distance(query, neighbor);
            let admit = results.len() < ef || dist < worst_dist * tolerance;
            if !admit {
                continue;
            }
            frontier.push(dist, neighbor);
            if !index.is_deleted(neighbor) && !excluded(neighbor) {
                results.push(dist, neighbor);
                if results.len() > ef {
                    results.pop_worst();
                }
                worst_dist = results.get_worst().map_or(f32::MAX, |(d, _)| d);
            }
        }
    }

    results.into_sorted_vec()
}

/// Multi-layer KNN search through the HNSW graph.
///
/// Descends from the entry point with a narrow (ef=1) search to find a good
/// layer-0 start, then runs one wide `search_layer` with budget
/// `max(ef, k)` and returns the top `k` as `(distance, internal_id)`.
pub fn knn_search(
    index: &HnswIndex,
    query: &[f32],
    k: usize,
    ef_override: Option<usize>,
    exclude: Option<&HashSet<u32>>,
) -> Vec<(f32, u32)> {
    let entry_point = match index.entry_point {
        Some(ep) => ep,
        None => return Vec::new(),
    };
    if k == 0 {
        return Vec::new();
    }

    let query = effective_query(index, query);

    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(index.node_count as usize);

        let mut current_ep = entry_point;
        for layer in (1..=index.max_layer).rev() {
            let nearest = search_layer(
                index,
                &query,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut *visited,
                None,
            );
            if let Some(&(_, id)) = nearest.first() {
                current_ep = id;
            }
        }

        let ef = ef_override.unwrap_or(index.config.ef_search).max(k);
        let mut results = search_layer(
            index,
            &query,
            std::slice::from_ref(&current_ep),
            ef,
            0,
            &mut *visited,
            exclude,
        );
        results.truncate(k);
        results
    })
}

/// Normalize the query when the index stores normalized vectors.
pub(crate) fn effective_query<'a>(index: &HnswIndex, query: &'a [f32]) -> Cow<'a, [f32]> {
    if index.config.normalize_vectors {
        let mut q = query.to_vec();
        normalize(&mut q);
        Cow::Owned(q)
    } else {
        Cow::Borrowed(query)
    }
}
