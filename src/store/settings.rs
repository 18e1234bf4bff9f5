use std::collections::HashMap;

use crate::{
    config::{
        parse_working_days, BusinessSettings, KEY_BOOKING_HORIZON, KEY_BOOKING_LEAD,
        KEY_CLOSE_TIME, KEY_DISPLAY_CUTOFF, KEY_OPEN_TIME, KEY_SLOT_DURATION, KEY_WORKING_DAYS,
        MAX_SLOT_MINUTES,
    },
    db::Store,
    error::{AppError, Result},
    models::parse_slot_time,
};

impl Store {
    pub async fn all_settings(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = self
            .run(sqlx::query_as::<_, (String, String)>("SELECT key, value FROM configuration").fetch_all(self.pool()))
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn business_settings(&self) -> Result<BusinessSettings> {
        Ok(BusinessSettings::from_map(&self.all_settings().await?))
    }

    /// Writes every pair in `values`, inserting keys that do not exist yet.
    pub async fn update_settings(&self, values: &HashMap<String, String>) -> Result<BusinessSettings> {
        for (key, value) in values {
            validate_setting(key, value)?;
        }

        let pool = self.pool();
        self.run(async move {
            let mut tx = pool.begin().await?;
            for (key, value) in values {
                sqlx::query(
                    "INSERT INTO configuration (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                )
                .bind(key.trim())
                .bind(value.trim())
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(())
        })
        .await?;

        log::info!("Configuration updated ({} keys)", values.len());
        self.business_settings().await
    }
}

/// Rejects values that would otherwise be silently replaced by their defaults.
fn validate_setting(key: &str, value: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(AppError::validation("Setting keys cannot be empty."));
    }
    let value = value.trim();
    match key {
        KEY_OPEN_TIME | KEY_CLOSE_TIME => {
            parse_slot_time(value)?;
        }
        KEY_SLOT_DURATION => match value.parse::<i64>() {
            Ok(1..=MAX_SLOT_MINUTES) => {}
            _ => {
                return Err(AppError::validation(format!(
                    "Slot duration must be between 1 and {MAX_SLOT_MINUTES} minutes."
                )))
            }
        },
        KEY_DISPLAY_CUTOFF | KEY_BOOKING_LEAD | KEY_BOOKING_HORIZON => {
            if value.parse::<u32>().is_err() {
                return Err(AppError::validation(format!("{key} must be a non-negative number.")));
            }
        }
        KEY_WORKING_DAYS => {
            if parse_working_days(value).is_empty() {
                return Err(AppError::validation("At least one working day is required."));
            }
        }
        _ => {}
    }
    Ok(())
}
