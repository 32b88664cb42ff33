use super::ClanSnapshot;
use crate::{
    domain::Error,
    infra::db::{format_datetime, parse_required_json, DBConnection},
};

#[derive(Debug, Clone)]
pub struct ClanStore {
    db_connection: DBConnection,
}

impl ClanStore {
    pub fn new(db_connection: DBConnection) -> Self {
        Self { db_connection }
    }

    /// Replace the stored snapshot, the only write a refresh performs
    pub async fn save_snapshot(&self, snapshot: &ClanSnapshot) -> Result<(), Error> {
        let data = serde_json::to_string(snapshot)?;
        let generated_at = format_datetime(&snapshot.generated_at)?;

        self.db_connection
            .execute_write(move |pool| async move {
                sqlx::query(
                    "INSERT INTO clan_snapshot (id, data, generated_at)
                     VALUES (1, ?, ?)
                     ON CONFLICT (id) DO UPDATE SET
                        data = excluded.data,
                        generated_at = excluded.generated_at",
                )
                .bind(data)
                .bind(generated_at)
                .execute(&pool)
                .await?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    pub async fn latest_snapshot(&self) -> Result<Option<ClanSnapshot>, Error> {
        let row = sqlx::query("SELECT data FROM clan_snapshot WHERE id = 1")
            .fetch_optional(self.db_connection.read())
            .await?;

        let snapshot = row
            .map(|row| parse_required_json::<ClanSnapshot>(&row, "data"))
            .transpose()?;
        Ok(snapshot)
    }
}
