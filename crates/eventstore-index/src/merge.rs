//! Multi-source merge
//!
//! Each source is queried on its own with the same window and limit, then
//! the per-source results are k-way merged into one ordered sequence.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use eventstore_core::{
    Direction, Event, EventStoreResult, IndexDimension, TimeWindow, chronological,
};
use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::strategy::RangeIndex;

/// Head of one input list inside the merge heap
struct Head {
    event: Event,
    list: usize,
    direction: Direction,
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest element first
        let key = chronological(&self.event, &other.event);
        let key = match self.direction {
            Direction::Ascending => key.reverse(),
            Direction::Descending => key,
        };
        key.then_with(|| other.list.cmp(&self.list))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

/// Merge lists already ordered in `direction` into one, keeping at most `max`
///
/// Events comparing equal keep the order of their input lists. Nothing is
/// deduplicated.
pub fn merge_ordered(lists: Vec<Vec<Event>>, direction: Direction, max: usize) -> Vec<Event> {
    let total: usize = lists.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total.min(max));

    let mut iters: Vec<_> = lists.into_iter().map(Vec::into_iter).collect();
    let mut heap = BinaryHeap::with_capacity(iters.len());
    for (list, iter) in iters.iter_mut().enumerate() {
        if let Some(event) = iter.next() {
            heap.push(Head {
                event,
                list,
                direction,
            });
        }
    }

    while merged.len() < max {
        let Some(Head { event, list, .. }) = heap.pop() else {
            break;
        };
        merged.push(event);
        if let Some(next) = iters[list].next() {
            heap.push(Head {
                event: next,
                list,
                direction,
            });
        }
    }
    merged
}

/// Query several sources concurrently and merge their results
#[instrument(skip_all, fields(sources = sources.len(), max = max))]
pub async fn find_many<I: RangeIndex + ?Sized>(
    index: &I,
    sources: &[String],
    window: &TimeWindow,
    max: usize,
) -> EventStoreResult<Vec<Event>> {
    let dimensions: Vec<_> = sources.iter().map(IndexDimension::source).collect();
    let lists = try_join_all(
        dimensions
            .iter()
            .map(|dimension| index.find(dimension, window, max)),
    )
    .await?;

    let fetched: usize = lists.iter().map(Vec::len).sum();
    let merged = merge_ordered(lists, window.direction(), max);
    debug!(fetched, returned = merged.len(), "merged sources");
    Ok(merged)
}
