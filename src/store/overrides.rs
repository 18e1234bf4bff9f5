use chrono::{NaiveDate, NaiveTime};

use crate::{
    auth::new_id,
    db::Store,
    error::{AppError, Result},
    models::OverrideSlot,
};

const SELECT_OVERRIDE: &str =
    "SELECT id, professional_id, date, time, active, personalized FROM override_slots";

const UPSERT_OVERRIDE: &str = r#"INSERT INTO override_slots (id, professional_id, date, time, active, personalized)
   VALUES (?, ?, ?, ?, ?, ?)
   ON CONFLICT(professional_id, date, time) DO UPDATE SET active = excluded.active"#;

/// What happens to the old time when [`Store::replace_override`] moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    /// Keep an inactive row so the template time stays hidden on that date.
    Disable,
    /// Delete the old row outright.
    Delete,
}

impl Store {
    pub async fn overrides_on(
        &self,
        professional_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<OverrideSlot>> {
        self.run(
            sqlx::query_as::<_, OverrideSlot>(&format!(
                "{SELECT_OVERRIDE} WHERE professional_id = ? AND date = ? ORDER BY time"
            ))
            .bind(professional_id)
            .bind(date)
            .fetch_all(self.pool()),
        )
        .await
    }

    pub async fn override_by_id(&self, id: &str) -> Result<OverrideSlot> {
        self.run(
            sqlx::query_as::<_, OverrideSlot>(&format!("{SELECT_OVERRIDE} WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await?
        .ok_or(AppError::NotFound("override"))
    }

    pub async fn override_at(
        &self,
        professional_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<OverrideSlot>> {
        self.run(
            sqlx::query_as::<_, OverrideSlot>(&format!(
                "{SELECT_OVERRIDE} WHERE professional_id = ? AND date = ? AND time = ?"
            ))
            .bind(professional_id)
            .bind(date)
            .bind(time)
            .fetch_optional(self.pool()),
        )
        .await
    }

    /// Sets the active flag of the override at `time`, creating the row if the
    /// date has none yet. A created row gets `personalized`; an existing row
    /// keeps its flag.
    pub async fn upsert_override(
        &self,
        professional_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        active: bool,
        personalized: bool,
    ) -> Result<OverrideSlot> {
        self.run(
            sqlx::query(UPSERT_OVERRIDE)
                .bind(new_id())
                .bind(professional_id)
                .bind(date)
                .bind(time)
                .bind(active)
                .bind(personalized)
                .execute(self.pool()),
        )
        .await?;

        self.override_at(professional_id, date, time)
            .await?
            .ok_or(AppError::NotFound("override"))
    }

    /// Takes `old` off `date` and switches `new` on, in one transaction.
    pub async fn replace_override(
        &self,
        professional_id: &str,
        date: NaiveDate,
        old: NaiveTime,
        replaced: Replaced,
        new: NaiveTime,
        personalized: bool,
    ) -> Result<OverrideSlot> {
        let pool = self.pool();
        self.run(async move {
            let mut tx = pool.begin().await?;
            match replaced {
                Replaced::Disable => {
                    sqlx::query(UPSERT_OVERRIDE)
                        .bind(new_id())
                        .bind(professional_id)
                        .bind(date)
                        .bind(old)
                        .bind(false)
                        .bind(false)
                        .execute(&mut *tx)
                        .await?;
                }
                Replaced::Delete => {
                    sqlx::query(
                        "DELETE FROM override_slots WHERE professional_id = ? AND date = ? AND time = ?",
                    )
                    .bind(professional_id)
                    .bind(date)
                    .bind(old)
                    .execute(&mut *tx)
                    .await?;
                }
            }
            sqlx::query(UPSERT_OVERRIDE)
                .bind(new_id())
                .bind(professional_id)
                .bind(date)
                .bind(new)
                .bind(true)
                .bind(personalized)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<_, sqlx::Error>(())
        })
        .await?;

        self.override_at(professional_id, date, new)
            .await?
            .ok_or(AppError::NotFound("override"))
    }

    pub async fn move_override(&self, id: &str, time: NaiveTime) -> Result<OverrideSlot> {
        let result = self
            .run(
                sqlx::query("UPDATE override_slots SET time = ? WHERE id = ?")
                    .bind(time)
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("override"));
        }
        self.override_by_id(id).await
    }

    pub async fn delete_override(&self, id: &str) -> Result<()> {
        let result = self
            .run(
                sqlx::query("DELETE FROM override_slots WHERE id = ?")
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("override"));
        }
        Ok(())
    }

    pub async fn clear_overrides(&self, professional_id: &str, date: NaiveDate) -> Result<u64> {
        let result = self
            .run(
                sqlx::query("DELETE FROM override_slots WHERE professional_id = ? AND date = ?")
                    .bind(professional_id)
                    .bind(date)
                    .execute(self.pool()),
            )
            .await?;
        Ok(result.rows_affected())
    }
}
