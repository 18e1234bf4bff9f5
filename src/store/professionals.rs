use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::new_id,
    db::Store,
    error::{AppError, Result},
    models::Professional,
};

const DEFAULT_COLOR: &str = "#a3e635";

#[derive(Debug, Clone, Deserialize)]
pub struct NewProfessional {
    pub name: String,
    #[serde(default)]
    pub specialty: String,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfessionalUpdate {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub color: Option<String>,
    pub sort_order: Option<i64>,
}

fn validate_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(AppError::validation(format!("Invalid color: {color}")))
    }
}

impl Store {
    pub async fn list_professionals(&self, active_only: bool) -> Result<Vec<Professional>> {
        let sql = if active_only {
            "SELECT id, name, specialty, color, active, sort_order FROM professionals WHERE active = 1 ORDER BY sort_order, name"
        } else {
            "SELECT id, name, specialty, color, active, sort_order FROM professionals ORDER BY sort_order, name"
        };
        self.run(sqlx::query_as::<_, Professional>(sql).fetch_all(self.pool()))
            .await
    }

    pub async fn professional(&self, id: &str) -> Result<Professional> {
        self.run(
            sqlx::query_as::<_, Professional>(
                "SELECT id, name, specialty, color, active, sort_order FROM professionals WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(self.pool()),
        )
        .await?
        .ok_or(AppError::NotFound("professional"))
    }

    pub async fn create_professional(&self, input: NewProfessional) -> Result<Professional> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name is required."));
        }
        let color = input.color.unwrap_or_else(|| DEFAULT_COLOR.to_string());
        validate_color(&color)?;

        let sort_order = match input.sort_order {
            Some(order) => order,
            None => {
                self.run(
                    sqlx::query_scalar::<_, i64>(
                        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM professionals",
                    )
                    .fetch_one(self.pool()),
                )
                .await?
            }
        };

        let professional = Professional {
            id: new_id(),
            name: name.to_string(),
            specialty: input.specialty.trim().to_string(),
            color,
            active: true,
            sort_order,
        };

        self.run(
            sqlx::query(
                r#"INSERT INTO professionals (id, name, specialty, color, active, sort_order, created_at)
                   VALUES (?, ?, ?, ?, 1, ?, ?)"#,
            )
            .bind(&professional.id)
            .bind(&professional.name)
            .bind(&professional.specialty)
            .bind(&professional.color)
            .bind(professional.sort_order)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool()),
        )
        .await?;

        log::info!("Professional {} created", professional.name);
        Ok(professional)
    }

    pub async fn update_professional(
        &self,
        id: &str,
        changes: ProfessionalUpdate,
    ) -> Result<Professional> {
        let mut professional = self.professional(id).await?;
        if let Some(name) = changes.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("Name is required."));
            }
            professional.name = name.to_string();
        }
        if let Some(specialty) = changes.specialty {
            professional.specialty = specialty.trim().to_string();
        }
        if let Some(color) = changes.color {
            validate_color(&color)?;
            professional.color = color;
        }
        if let Some(order) = changes.sort_order {
            professional.sort_order = order;
        }

        self.run(
            sqlx::query(
                "UPDATE professionals SET name = ?, specialty = ?, color = ?, sort_order = ? WHERE id = ?",
            )
            .bind(&professional.name)
            .bind(&professional.specialty)
            .bind(&professional.color)
            .bind(professional.sort_order)
            .bind(id)
            .execute(self.pool()),
        )
        .await?;
        Ok(professional)
    }

    /// Professionals are never deleted, only hidden from the public flow.
    pub async fn set_professional_active(&self, id: &str, active: bool) -> Result<Professional> {
        let result = self
            .run(
                sqlx::query("UPDATE professionals SET active = ? WHERE id = ?")
                    .bind(active)
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("professional"));
        }
        self.professional(id).await
    }
}
