use std::collections::BTreeMap;

use chrono::{Duration, NaiveTime};

use crate::{
    auth::new_id,
    config::MAX_SLOT_MINUTES,
    db::Store,
    error::{AppError, Result},
    models::{validate_weekday, TemplateSlot},
};

const SELECT_TEMPLATE: &str =
    "SELECT id, professional_id, weekday, time, active FROM template_slots";

/// Times from `start` (inclusive) to `end` (exclusive) every `interval_minutes`.
pub fn generate_times(start: NaiveTime, end: NaiveTime, interval_minutes: i64) -> Result<Vec<NaiveTime>> {
    if !(1..=MAX_SLOT_MINUTES).contains(&interval_minutes) {
        return Err(AppError::validation(format!(
            "Interval must be between 1 and {MAX_SLOT_MINUTES} minutes."
        )));
    }
    if start >= end {
        return Err(AppError::validation("Start time must be before end time."));
    }

    let step = Duration::try_minutes(interval_minutes)
        .ok_or_else(|| AppError::validation("Interval is out of range."))?;
    let mut times = Vec::new();
    let mut current = start;
    while current < end {
        times.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    Ok(times)
}

impl Store {
    pub async fn template_for_weekday(
        &self,
        professional_id: &str,
        weekday: u8,
    ) -> Result<Vec<TemplateSlot>> {
        let weekday = validate_weekday(weekday)?;
        self.run(
            sqlx::query_as::<_, TemplateSlot>(&format!(
                "{SELECT_TEMPLATE} WHERE professional_id = ? AND weekday = ? ORDER BY time"
            ))
            .bind(professional_id)
            .bind(weekday)
            .fetch_all(self.pool()),
        )
        .await
    }

    pub async fn week_template(
        &self,
        professional_id: &str,
    ) -> Result<BTreeMap<u8, Vec<TemplateSlot>>> {
        let rows = self
            .run(
                sqlx::query_as::<_, TemplateSlot>(&format!(
                    "{SELECT_TEMPLATE} WHERE professional_id = ? ORDER BY weekday, time"
                ))
                .bind(professional_id)
                .fetch_all(self.pool()),
            )
            .await?;

        let mut week: BTreeMap<u8, Vec<TemplateSlot>> = BTreeMap::new();
        for row in rows {
            week.entry(row.weekday).or_default().push(row);
        }
        Ok(week)
    }

    pub async fn add_template_slot(
        &self,
        professional_id: &str,
        weekday: u8,
        time: NaiveTime,
    ) -> Result<TemplateSlot> {
        let weekday = validate_weekday(weekday)?;
        self.professional(professional_id).await?;

        let existing = self
            .run(
                sqlx::query_scalar::<_, String>(
                    "SELECT id FROM template_slots WHERE professional_id = ? AND weekday = ? AND time = ?",
                )
                .bind(professional_id)
                .bind(weekday)
                .bind(time)
                .fetch_optional(self.pool()),
            )
            .await?;
        if existing.is_some() {
            return Err(AppError::Duplicate(format!(
                "{} already exists in the template for this day.",
                time.format("%H:%M")
            )));
        }

        let slot = TemplateSlot {
            id: new_id(),
            professional_id: professional_id.to_string(),
            weekday,
            time,
            active: true,
        };
        self.run(
            sqlx::query(
                "INSERT INTO template_slots (id, professional_id, weekday, time, active) VALUES (?, ?, ?, ?, 1)",
            )
            .bind(&slot.id)
            .bind(&slot.professional_id)
            .bind(slot.weekday)
            .bind(slot.time)
            .execute(self.pool()),
        )
        .await?;
        Ok(slot)
    }

    /// Adds several times at once. Times already in the template are skipped;
    /// returns how many rows were inserted.
    pub async fn add_template_slots(
        &self,
        professional_id: &str,
        weekday: u8,
        times: &[NaiveTime],
    ) -> Result<u64> {
        let weekday = validate_weekday(weekday)?;
        self.professional(professional_id).await?;

        let pool = self.pool();
        self.run(async move {
            let mut tx = pool.begin().await?;
            let mut inserted = 0;
            for time in times {
                let result = sqlx::query(
                    r#"INSERT INTO template_slots (id, professional_id, weekday, time, active)
                       VALUES (?, ?, ?, ?, 1)
                       ON CONFLICT(professional_id, weekday, time) DO NOTHING"#,
                )
                .bind(new_id())
                .bind(professional_id)
                .bind(weekday)
                .bind(time)
                .execute(&mut *tx)
                .await?;
                inserted += result.rows_affected();
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(inserted)
        })
        .await
    }

    pub async fn remove_template_slot(&self, id: &str) -> Result<()> {
        let result = self
            .run(
                sqlx::query("DELETE FROM template_slots WHERE id = ?")
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("template slot"));
        }
        Ok(())
    }

    pub async fn clear_template_day(&self, professional_id: &str, weekday: u8) -> Result<u64> {
        let weekday = validate_weekday(weekday)?;
        let result = self
            .run(
                sqlx::query("DELETE FROM template_slots WHERE professional_id = ? AND weekday = ?")
                    .bind(professional_id)
                    .bind(weekday)
                    .execute(self.pool()),
            )
            .await?;
        Ok(result.rows_affected())
    }

    /// Replaces each destination weekday with the source weekday's times.
    ///
    /// Destinations are cleared first, never merged, and each copied row keeps
    /// its active flag. The whole copy is one transaction. Returns the number
    /// of rows written.
    pub async fn copy_template_day(
        &self,
        professional_id: &str,
        source: u8,
        destinations: &[u8],
    ) -> Result<u64> {
        let source = validate_weekday(source)?;
        for destination in destinations {
            validate_weekday(*destination)?;
        }

        let rows: Vec<(NaiveTime, bool)> = self
            .template_for_weekday(professional_id, source)
            .await?
            .into_iter()
            .map(|slot| (slot.time, slot.active))
            .collect();
        if rows.is_empty() {
            return Err(AppError::validation("The source day has no times to copy."));
        }

        let pool = self.pool();
        let rows = &rows;
        let written = self
            .run(async move {
                let mut tx = pool.begin().await?;
                let mut written = 0;
                for destination in destinations.iter().filter(|day| **day != source) {
                    sqlx::query("DELETE FROM template_slots WHERE professional_id = ? AND weekday = ?")
                        .bind(professional_id)
                        .bind(*destination)
                        .execute(&mut *tx)
                        .await?;
                    for (time, active) in rows {
                        sqlx::query(
                            "INSERT INTO template_slots (id, professional_id, weekday, time, active) VALUES (?, ?, ?, ?, ?)",
                        )
                        .bind(new_id())
                        .bind(professional_id)
                        .bind(*destination)
                        .bind(*time)
                        .bind(*active)
                        .execute(&mut *tx)
                        .await?;
                        written += 1;
                    }
                }
                tx.commit().await?;
                Ok::<_, sqlx::Error>(written)
            })
            .await?;

        log::info!(
            "Copied weekday {source} template of {professional_id} to {destinations:?} ({written} rows)"
        );
        Ok(written)
    }
}
