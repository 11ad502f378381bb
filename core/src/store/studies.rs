//! Study catalog and ranked study items.

use super::{LotteryStore, Study, StudyItem};
use crate::error::IngestResult;
use rusqlite::{params, params_from_iter, types::Type, types::Value, Transaction};

const ITEM_COLUMNS: usize = 6;

impl LotteryStore {
    /// Replaces the header and all items of one study in a single
    /// transaction.
    pub(super) fn write_study(
        &self,
        game: &str,
        study: &Study,
        items: &[StudyItem],
        batch_size: usize,
    ) -> IngestResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO study (game, study_key, title, item_count)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (game, study_key) DO UPDATE SET
                title      = excluded.title,
                item_count = excluded.item_count",
            params![game, study.study_key, study.title, items.len() as i64],
        )?;
        tx.execute(
            "DELETE FROM study_item WHERE game = ?1 AND study_key = ?2",
            params![game, study.study_key],
        )?;
        for batch in items.chunks(batch_size.max(1)) {
            Self::insert_item_batch(&tx, game, batch)?;
        }
        tx.commit()?;
        log::debug!(
            "game={game} studies: wrote {} ({} items)",
            study.study_key,
            items.len()
        );
        Ok(())
    }

    /// One multi-row INSERT per batch.
    fn insert_item_batch(tx: &Transaction<'_>, game: &str, batch: &[StudyItem]) -> IngestResult<()> {
        let rows = (0..batch.len())
            .map(|i| {
                let base = i * ITEM_COLUMNS;
                let slots = (1..=ITEM_COLUMNS)
                    .map(|c| format!("?{}", base + c))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({slots})")
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO study_item (game, study_key, item_key, rank, value, extra)
             VALUES {rows}"
        );

        let mut values = Vec::with_capacity(batch.len() * ITEM_COLUMNS);
        for item in batch {
            values.push(Value::Text(game.to_string()));
            values.push(Value::Text(item.study_key.clone()));
            values.push(Value::Text(item.item_key.clone()));
            values.push(Value::Integer(i64::from(item.rank)));
            values.push(Value::Real(item.value));
            values.push(match &item.extra {
                Some(extra) => Value::Text(serde_json::to_string(extra)?),
                None => Value::Null,
            });
        }

        tx.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    pub fn list_studies(&self, game: &str) -> IngestResult<Vec<(Study, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT study_key, title, item_count FROM study
             WHERE game = ?1 ORDER BY study_key ASC",
        )?;
        let rows = stmt
            .query_map(params![game], |row| {
                Ok((
                    Study {
                        study_key: row.get(0)?,
                        title: row.get(1)?,
                    },
                    row.get(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Items of one study, rank ascending.
    pub fn study_items(&self, game: &str, study_key: &str) -> IngestResult<Vec<StudyItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT study_key, item_key, rank, value, extra FROM study_item
             WHERE game = ?1 AND study_key = ?2
             ORDER BY rank ASC",
        )?;
        let rows = stmt
            .query_map(params![game, study_key], |row| {
                let extra = match row.get::<_, Option<String>>(4)? {
                    Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
                    })?),
                    None => None,
                };
                Ok(StudyItem {
                    study_key: row.get(0)?,
                    item_key: row.get(1)?,
                    rank: row.get(2)?,
                    value: row.get(3)?,
                    extra,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
