use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    auth::new_id,
    db::Store,
    error::{AppError, Result},
    models::{Block, BlockCategory},
};

const SELECT_BLOCK: &str =
    "SELECT id, professional_id, date, start_time, end_time, reason, category FROM blocks";

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlock {
    pub professional_id: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub category: BlockCategory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockFilter {
    pub professional_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<BlockCategory>,
}

impl Store {
    pub async fn blocks_on(&self, professional_id: &str, date: NaiveDate) -> Result<Vec<Block>> {
        self.run(
            sqlx::query_as::<_, Block>(&format!(
                "{SELECT_BLOCK} WHERE professional_id = ? AND date = ?"
            ))
            .bind(professional_id)
            .bind(date)
            .fetch_all(self.pool()),
        )
        .await
    }

    pub async fn list_blocks(&self, filter: &BlockFilter) -> Result<Vec<Block>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_BLOCK);
        query.push(" WHERE 1 = 1");
        if let Some(professional_id) = &filter.professional_id {
            query.push(" AND professional_id = ").push_bind(professional_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND date <= ").push_bind(to);
        }
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category);
        }
        query.push(" ORDER BY date, start_time");

        self.run(query.build_query_as::<Block>().fetch_all(self.pool()))
            .await
    }

    pub async fn create_block(&self, input: NewBlock) -> Result<Block> {
        match (input.start_time, input.end_time) {
            (None, None) => {}
            (Some(start), Some(end)) if start < end => {}
            (Some(_), Some(_)) => {
                return Err(AppError::validation("Block start must be before its end."));
            }
            _ => {
                return Err(AppError::validation(
                    "A block needs both a start and an end time, or neither for a full day.",
                ));
            }
        }
        self.professional(&input.professional_id).await?;

        let block = Block {
            id: new_id(),
            professional_id: input.professional_id,
            date: input.date,
            start_time: input.start_time,
            end_time: input.end_time,
            reason: input.reason.trim().to_string(),
            category: input.category,
        };

        self.run(
            sqlx::query(
                r#"INSERT INTO blocks (id, professional_id, date, start_time, end_time, reason, category, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&block.id)
            .bind(&block.professional_id)
            .bind(block.date)
            .bind(block.start_time)
            .bind(block.end_time)
            .bind(&block.reason)
            .bind(block.category)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool()),
        )
        .await?;

        log::info!(
            "Block {} created for {} on {}",
            block.id,
            block.professional_id,
            block.date
        );
        Ok(block)
    }

    pub async fn delete_block(&self, id: &str) -> Result<()> {
        let result = self
            .run(
                sqlx::query("DELETE FROM blocks WHERE id = ?")
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("block"));
        }
        Ok(())
    }

    /// The block that makes `date` (or `time` on that date) unavailable, if any.
    /// A full-day block wins over partial ones.
    pub async fn find_block(
        &self,
        professional_id: &str,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> Result<Option<Block>> {
        let blocks = self.blocks_on(professional_id, date).await?;
        if let Some(full) = blocks.iter().find(|block| block.is_full_day()) {
            return Ok(Some(full.clone()));
        }
        Ok(time.and_then(|time| blocks.into_iter().find(|block| block.covers(time))))
    }
}
