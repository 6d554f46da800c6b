use crate::types::{
    Aggregate, AggregateEntry, FanoutOutcome, ItemRecord, Summary, UNKNOWN_NAME,
};
use indexmap::IndexMap;
use indexmap::map::Entry;

/// Concatenates the listings in source order, keeping the first record seen
/// for each experience id. Later duplicates only fill in missing fields.
pub fn merge_sources(listings: Vec<Vec<ItemRecord>>) -> Vec<ItemRecord> {
    let mut merged: IndexMap<u64, ItemRecord> = IndexMap::new();

    for item in listings.into_iter().flatten() {
        match merged.entry(item.id) {
            Entry::Occupied(mut existing) => existing.get_mut().fill_from(item),
            Entry::Vacant(slot) => {
                slot.insert(item);
            }
        }
    }

    merged.into_values().collect()
}

/// Joins each experience with its gamepasses, in discovery order.
///
/// `outcomes` holds one entry per item, in item order. A failed lookup counts
/// as an experience without gamepasses.
pub fn aggregate(items: &[ItemRecord], outcomes: Vec<FanoutOutcome>) -> Aggregate {
    debug_assert_eq!(items.len(), outcomes.len());

    let mut entries = Vec::new();
    let mut summary = Summary::default();

    for (item, outcome) in items.iter().zip(outcomes) {
        summary.items_processed += 1;

        let children = match outcome {
            FanoutOutcome::Resolved(children) => children,
            FanoutOutcome::Failed(_) => {
                summary.failed_lookups += 1;
                Vec::new()
            }
        };

        if children.is_empty() {
            summary.items_without_children += 1;
            continue;
        }

        summary.children_found += children.len();
        entries.extend(children.into_iter().map(|child| AggregateEntry {
            experience_id: item.id,
            experience_name: item.display_name().to_string(),
            place_id: item.place_id,
            gamepass_id: child.id,
            gamepass_name: child.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
        }));
    }

    Aggregate { entries, summary }
}
