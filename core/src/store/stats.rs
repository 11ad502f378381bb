use super::{LotteryStore, NumberStat};
use crate::error::IngestResult;
use rusqlite::params;

impl LotteryStore {
    /// Delete every row for `game`, then insert `stats`, in one transaction.
    pub(super) fn write_number_stats(&self, game: &str, stats: &[NumberStat]) -> IngestResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM number_stats WHERE game = ?1", params![game])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO number_stats
                 (game, number, times_drawn, pct_of_draws, total_draws,
                  times_drawn_recent, last_contest, overdue)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for stat in stats {
                stmt.execute(params![
                    game,
                    stat.number,
                    stat.times_drawn as i64,
                    stat.pct_of_draws,
                    stat.total_draws as i64,
                    stat.times_drawn_recent as i64,
                    stat.last_contest,
                    stat.overdue,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn number_stats(&self, game: &str) -> IngestResult<Vec<NumberStat>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, times_drawn, pct_of_draws, total_draws,
                    times_drawn_recent, last_contest, overdue
             FROM number_stats WHERE game = ?1
             ORDER BY number ASC",
        )?;
        let rows = stmt
            .query_map(params![game], |row| {
                Ok(NumberStat {
                    number: row.get(0)?,
                    times_drawn: row.get::<_, i64>(1)? as u64,
                    pct_of_draws: row.get(2)?,
                    total_draws: row.get::<_, i64>(3)? as u64,
                    times_drawn_recent: row.get::<_, i64>(4)? as u64,
                    last_contest: row.get(5)?,
                    overdue: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
