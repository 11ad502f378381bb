//! Draw history queries.

use super::{DrawRecord, LotteryStore};
use crate::{
    error::IngestResult,
    types::{ContestNo, Number},
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, types::Type, types::Value, OptionalExtension};

const DATE_FORMAT: &str = "%Y-%m-%d";

const DRAW_COLUMNS: &str = "contest_no, draw_date, numbers, top_tier_winners, top_tier_prize,
     accumulated_amount, total_collected, next_prize_estimate, note";

impl LotteryStore {
    pub(super) fn max_contest(&self, game: &str) -> IngestResult<Option<ContestNo>> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(contest_no) FROM draws WHERE game = ?1",
            params![game],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    pub(super) fn contests_present(
        &self,
        game: &str,
        contests: &[ContestNo],
    ) -> IngestResult<Vec<ContestNo>> {
        if contests.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (0..contests.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "SELECT contest_no FROM draws
             WHERE game = ?1 AND contest_no IN ({placeholders})
             ORDER BY contest_no ASC"
        );

        let values = std::iter::once(Value::Text(game.to_string()))
            .chain(contests.iter().map(|&c| Value::Integer(c)));

        let mut stmt = self.conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<Result<Vec<ContestNo>, _>>()?;
        Ok(found)
    }

    /// Insert-or-replace one batch inside a single transaction.
    pub(super) fn upsert_draw_batch(&self, game: &str, draws: &[DrawRecord]) -> IngestResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO draws
                 (game, contest_no, draw_date, numbers, top_tier_winners, top_tier_prize,
                  accumulated_amount, total_collected, next_prize_estimate, note)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (game, contest_no) DO UPDATE SET
                    draw_date           = excluded.draw_date,
                    numbers             = excluded.numbers,
                    top_tier_winners    = excluded.top_tier_winners,
                    top_tier_prize      = excluded.top_tier_prize,
                    accumulated_amount  = excluded.accumulated_amount,
                    total_collected     = excluded.total_collected,
                    next_prize_estimate = excluded.next_prize_estimate,
                    note                = excluded.note",
            )?;
            for draw in draws {
                stmt.execute(params![
                    game,
                    draw.contest_no,
                    draw.draw_date.format(DATE_FORMAT).to_string(),
                    serde_json::to_string(&draw.numbers)?,
                    draw.top_tier_winners,
                    draw.top_tier_prize,
                    draw.accumulated_amount,
                    draw.total_collected,
                    draw.next_prize_estimate,
                    draw.note,
                ])?;
            }
        }
        tx.commit()?;
        Ok(draws.len())
    }

    pub(super) fn draws_after(
        &self,
        game: &str,
        after: Option<ContestNo>,
        limit: usize,
    ) -> IngestResult<Vec<DrawRecord>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {DRAW_COLUMNS} FROM draws
             WHERE game = ?1 AND contest_no > ?2
             ORDER BY contest_no ASC
             LIMIT ?3"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![game, after.unwrap_or(0), limit], Self::map_draw_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn draw_count(&self, game: &str) -> IngestResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM draws WHERE game = ?1",
            params![game],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn get_draw(&self, game: &str, contest_no: ContestNo) -> IngestResult<Option<DrawRecord>> {
        let draw = self
            .conn
            .query_row(
                &format!("SELECT {DRAW_COLUMNS} FROM draws WHERE game = ?1 AND contest_no = ?2"),
                params![game, contest_no],
                Self::map_draw_row,
            )
            .optional()?;
        Ok(draw)
    }

    fn map_draw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DrawRecord> {
        let raw_date: String = row.get(1)?;
        let draw_date = NaiveDate::parse_from_str(&raw_date, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        let raw_numbers: String = row.get(2)?;
        let numbers: Vec<Number> = serde_json::from_str(&raw_numbers)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(DrawRecord {
            contest_no: row.get(0)?,
            draw_date,
            numbers,
            top_tier_winners: row.get(3)?,
            top_tier_prize: row.get(4)?,
            accumulated_amount: row.get(5)?,
            total_collected: row.get(6)?,
            next_prize_estimate: row.get(7)?,
            note: row.get(8)?,
        })
    }
}
