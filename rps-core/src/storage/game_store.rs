use crate::error::{Result, RpsError};
use crate::storage::Storage;
use crate::types::{Amount, Game, GameFilter, GameStatus, GameUpdate};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

const GAME_COLUMNS: &str = "id, creator_address, joiner_address, bet_amount, status, \
     creator_choice, joiner_choice, creator_choice_hash, joiner_choice_hash, \
     winner_address, prize_amount, created_at, updated_at, expires_at, version";

pub struct GameStore<'a> {
    storage: &'a Storage,
}

impl<'a> GameStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert_game(&self, game: &Game) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            &format!(
                "INSERT INTO games ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                GAME_COLUMNS
            ),
            params![
                game.id.to_string(),
                game.creator_address,
                game.joiner_address,
                game.bet_amount.to_nano() as i64,
                game.status.as_str(),
                game.creator_choice.map(|m| m.as_str()),
                game.joiner_choice.map(|m| m.as_str()),
                game.creator_choice_hash,
                game.joiner_choice_hash,
                game.winner_address,
                game.prize_amount.map(|a| a.to_nano() as i64),
                game.created_at.timestamp_millis(),
                game.updated_at.timestamp_millis(),
                game.expires_at.map(|t| t.timestamp_millis()),
                game.version as i64,
            ],
        )?;

        tracing::debug!("Inserted game {} for {}", game.id, game.creator_address);
        Ok(())
    }

    pub async fn find_game(&self, id: Uuid) -> Result<Option<Game>> {
        let conn = self.storage.get_connection().await;
        Self::select_game(&conn, id)
    }

    pub async fn load_game(&self, id: Uuid) -> Result<Game> {
        self.find_game(id).await?.ok_or(RpsError::GameNotFound(id))
    }

    /// Row version only, for cheap change polling
    pub async fn game_version(&self, id: Uuid) -> Result<Option<u64>> {
        let conn = self.storage.get_connection().await;

        let version: Option<i64> = conn
            .query_row(
                "SELECT version FROM games WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        Ok(version.map(|v| v as u64))
    }

    /// Apply `update` under the connection lock.
    ///
    /// With `expected` set, the write only happens when the stored status
    /// still equals it; otherwise `RpsError::Conflict` is returned and the row
    /// is left as it was.
    pub async fn update_game(
        &self,
        id: Uuid,
        expected: Option<GameStatus>,
        update: &GameUpdate,
    ) -> Result<Game> {
        let conn = self.storage.get_connection().await;

        let mut game = Self::select_game(&conn, id)?.ok_or(RpsError::GameNotFound(id))?;

        if let Some(expected) = expected {
            if game.status != expected {
                return Err(RpsError::Conflict {
                    id,
                    expected,
                    actual: game.status,
                });
            }
        }

        let previous_version = game.version;
        game.apply(update)?;

        let changed = conn.execute(
            "UPDATE games SET
                joiner_address = ?1, status = ?2, creator_choice = ?3, joiner_choice = ?4,
                creator_choice_hash = ?5, joiner_choice_hash = ?6, winner_address = ?7,
                prize_amount = ?8, updated_at = ?9, version = ?10
             WHERE id = ?11 AND version = ?12",
            params![
                game.joiner_address,
                game.status.as_str(),
                game.creator_choice.map(|m| m.as_str()),
                game.joiner_choice.map(|m| m.as_str()),
                game.creator_choice_hash,
                game.joiner_choice_hash,
                game.winner_address,
                game.prize_amount.map(|a| a.to_nano() as i64),
                game.updated_at.timestamp_millis(),
                game.version as i64,
                id.to_string(),
                previous_version as i64,
            ],
        )?;

        // Another process wrote between our read and write
        if changed == 0 {
            let actual = Self::select_game(&conn, id)?
                .map(|g| g.status)
                .ok_or(RpsError::GameNotFound(id))?;
            return Err(RpsError::Conflict {
                id,
                expected: expected.unwrap_or(actual),
                actual,
            });
        }

        Ok(game)
    }

    pub async fn list_games(&self, filter: &GameFilter) -> Result<Vec<Game>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM games
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR creator_address = ?2 OR joiner_address = ?2)
               AND (?3 = 1 OR status != 'waiting' OR expires_at IS NULL OR expires_at >= ?4)
             ORDER BY created_at DESC
             LIMIT ?5",
            GAME_COLUMNS
        ))?;

        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let game_iter = stmt.query_map(
            params![
                filter.status.map(|s| s.as_str()),
                filter.address,
                filter.include_expired,
                Utc::now().timestamp_millis(),
                limit,
            ],
            game_from_row,
        )?;

        let mut games = Vec::new();
        for game in game_iter {
            games.push(game?);
        }

        Ok(games)
    }

    fn select_game(conn: &Connection, id: Uuid) -> Result<Option<Game>> {
        let game = conn
            .query_row(
                &format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS),
                params![id.to_string()],
                game_from_row,
            )
            .optional()?;

        Ok(game)
    }
}

fn parse_column<T: FromStr>(row: &Row<'_>, idx: usize, name: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
    })
}

fn parse_optional_column<T: FromStr>(
    row: &Row<'_>,
    idx: usize,
    name: &str,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value.parse().map_err(|_| {
            rusqlite::Error::InvalidColumnType(idx, name.to_string(), rusqlite::types::Type::Text)
        })
    })
    .transpose()
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    let id: Uuid = parse_column(row, 0, "id")?;
    let bet: i64 = row.get(3)?;
    let prize: Option<i64> = row.get(10)?;
    let expires_at: Option<i64> = row.get(13)?;
    let version: i64 = row.get(14)?;

    Ok(Game {
        id,
        creator_address: row.get(1)?,
        joiner_address: row.get(2)?,
        bet_amount: Amount::from_nano(bet as u64),
        status: parse_column(row, 4, "status")?,
        creator_choice: parse_optional_column(row, 5, "creator_choice")?,
        joiner_choice: parse_optional_column(row, 6, "joiner_choice")?,
        creator_choice_hash: row.get(7)?,
        joiner_choice_hash: row.get(8)?,
        winner_address: row.get(9)?,
        prize_amount: prize.map(|p| Amount::from_nano(p as u64)),
        created_at: timestamp(row.get(11)?),
        updated_at: timestamp(row.get(12)?),
        expires_at: expires_at.map(timestamp),
        version: version as u64,
    })
}
