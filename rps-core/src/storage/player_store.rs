use crate::error::Result;
use crate::storage::Storage;
use crate::types::PlayerRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

pub struct PlayerStore<'a> {
    storage: &'a Storage,
}

impl<'a> PlayerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Create the player with one game played, or bump the counter
    pub async fn upsert_player(&self, address: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;
        let now = Utc::now().timestamp_millis();

        conn.execute(
            "INSERT INTO players (address, games_played, first_seen, last_seen)
             VALUES (?1, 1, ?2, ?2)
             ON CONFLICT(address) DO UPDATE SET
                games_played = games_played + 1,
                last_seen = excluded.last_seen",
            params![address, now],
        )?;

        Ok(())
    }

    pub async fn load_player(&self, address: &str) -> Result<Option<PlayerRecord>> {
        let conn = self.storage.get_connection().await;

        let player = conn
            .query_row(
                "SELECT address, games_played, first_seen, last_seen FROM players WHERE address = ?1",
                params![address],
                |row| {
                    let games_played: i64 = row.get(1)?;
                    Ok(PlayerRecord {
                        address: row.get(0)?,
                        games_played: games_played as u64,
                        first_seen: DateTime::from_timestamp_millis(row.get(2)?)
                            .unwrap_or_else(Utc::now),
                        last_seen: DateTime::from_timestamp_millis(row.get(3)?)
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;

        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_counts_games() {
        let storage = Storage::in_memory().await.unwrap();
        let store = PlayerStore::new(&storage);

        assert!(store.load_player("EQplayer").await.unwrap().is_none());

        store.upsert_player("EQplayer").await.unwrap();
        store.upsert_player("EQplayer").await.unwrap();
        store.upsert_player("EQother").await.unwrap();

        let player = store.load_player("EQplayer").await.unwrap().unwrap();
        assert_eq!(player.games_played, 2);
        assert!(player.last_seen >= player.first_seen);

        let other = store.load_player("EQother").await.unwrap().unwrap();
        assert_eq!(other.games_played, 1);
    }
}
