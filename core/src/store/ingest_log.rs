use super::LotteryStore;
use crate::{error::IngestResult, event::IngestEventEntry};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

impl LotteryStore {
    // ── Ingest lock ────────────────────────────────────────────

    /// Take the per-game lock unless a different owner holds one that has
    /// not yet expired. Runs under an IMMEDIATE transaction so two writers
    /// cannot both read "free".
    pub(super) fn acquire_lock(
        &self,
        game: &str,
        owner: &str,
        now: i64,
        ttl_secs: i64,
    ) -> IngestResult<bool> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let holder: Option<(String, i64)> = tx
            .query_row(
                "SELECT owner, acquired_at FROM ingest_lock WHERE game = ?1",
                params![game],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((current, acquired_at)) = &holder {
            if current != owner && now - acquired_at < ttl_secs {
                log::debug!("game={game} lock: held by {current} since {acquired_at}");
                return Ok(false);
            }
            if current != owner {
                log::warn!("game={game} lock: taking over stale lock from {current}");
            }
        }

        tx.execute(
            "INSERT INTO ingest_lock (game, owner, acquired_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (game) DO UPDATE SET
                owner       = excluded.owner,
                acquired_at = excluded.acquired_at",
            params![game, owner, now],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Only the owner can release; a stale owner's release is a no-op.
    pub(super) fn release_lock(&self, game: &str, owner: &str) -> IngestResult<()> {
        self.conn.execute(
            "DELETE FROM ingest_lock WHERE game = ?1 AND owner = ?2",
            params![game, owner],
        )?;
        Ok(())
    }

    pub fn lock_owner(&self, game: &str) -> IngestResult<Option<String>> {
        let owner = self
            .conn
            .query_row(
                "SELECT owner FROM ingest_lock WHERE game = ?1",
                params![game],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    // ── Audit log ──────────────────────────────────────────────

    pub(super) fn insert_event(&self, entry: &IngestEventEntry) -> IngestResult<()> {
        self.conn.execute(
            "INSERT INTO ingest_event (run_id, game, stage, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.game,
                entry.stage,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_run(&self, run_id: &str) -> IngestResult<Vec<IngestEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, game, stage, event_type, payload
             FROM ingest_event WHERE run_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![run_id], |row| {
                Ok(IngestEventEntry {
                    id: Some(row.get(0)?),
                    run_id: row.get(1)?,
                    game: row.get(2)?,
                    stage: row.get(3)?,
                    event_type: row.get(4)?,
                    payload: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
