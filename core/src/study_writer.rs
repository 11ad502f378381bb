//! Study catalog writer: rank, then replace each study wholesale.

use crate::{
    aggregation::AggregateTables,
    config::GameConfig,
    error::IngestResult,
    store::{HistoryStore, StudyItem},
    studies::{build_items, catalog},
};
use std::cmp::Ordering;

/// Sort descending by value (ties: `item_key` ascending) and assign
/// ranks `1..=n`.
pub fn rank_items(items: &mut [StudyItem]) {
    items.sort_by(|a, b| match b.value.total_cmp(&a.value) {
        Ordering::Equal => a.item_key.cmp(&b.item_key),
        other => other,
    });
    for (idx, item) in items.iter_mut().enumerate() {
        item.rank = idx as u32 + 1;
    }
}

/// Build, rank and persist every study registered for `game`.
/// Returns the number of studies written. The first store error aborts
/// the remaining studies.
pub fn write_studies<S: HistoryStore + ?Sized>(
    store: &S,
    game: &GameConfig,
    tables: &AggregateTables,
    batch_size: usize,
) -> IngestResult<usize> {
    let kinds = catalog(game);
    for kind in &kinds {
        let mut items = build_items(*kind, game, tables);
        rank_items(&mut items);
        store.replace_study(&game.game_id, &kind.study(), &items, batch_size)?;
    }
    log::info!("game={} studies: {} written", game.game_id, kinds.len());
    Ok(kinds.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(key: &str, value: f64) -> StudyItem {
        StudyItem {
            study_key: "pair_freq".into(),
            item_key: key.into(),
            rank: 0,
            value,
            extra: None,
        }
    }

    #[test]
    fn ranks_descending_with_key_tiebreak() {
        let mut items = vec![item("03-04", 2.0), item("01-02", 5.0), item("02-03", 2.0), item("01-03", 2.0)];
        rank_items(&mut items);
        let order: Vec<(&str, u32)> = items.iter().map(|i| (i.item_key.as_str(), i.rank)).collect();
        assert_eq!(
            order,
            vec![("01-02", 1), ("01-03", 2), ("02-03", 3), ("03-04", 4)]
        );
    }

    #[test]
    fn empty_list_stays_empty() {
        let mut items: Vec<StudyItem> = Vec::new();
        rank_items(&mut items);
        assert!(items.is_empty());
    }
}
