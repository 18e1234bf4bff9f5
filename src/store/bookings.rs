use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    db::Store,
    error::{AppError, Result},
    models::{Booking, BookingStatus},
};

const SELECT_BOOKING: &str = r#"SELECT id, professional_id, date, start_time, end_time, client_name,
       client_phone, client_email, service, notes, status
FROM bookings"#;

const LIVE: &str = "status <> 'cancelled'";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub professional_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on the client name.
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeCount {
    pub time: NaiveTime,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ProfessionalCount {
    pub professional_id: String,
    pub name: String,
    pub total: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub no_show: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FrequentClient {
    pub name: String,
    pub email: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingStats {
    pub total: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub no_show: i64,
    /// Confirmed bookings as a percentage of all bookings, one decimal.
    pub attendance_rate: f64,
    pub unique_clients: i64,
    pub busiest_times: Vec<TimeCount>,
    pub frequent_clients: Vec<FrequentClient>,
    pub by_professional: Vec<ProfessionalCount>,
}

const TOP_N: i64 = 5;
const FREQUENT_CLIENT_MIN: i64 = 3;

fn attendance_rate(confirmed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (confirmed as f64 * 1000.0 / total as f64).round() / 10.0
}

impl Store {
    /// Bookings that still hold their slot on `date`, ordered by start time.
    pub async fn live_bookings_on(
        &self,
        professional_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Booking>> {
        self.run(
            sqlx::query_as::<_, Booking>(&format!(
                "{SELECT_BOOKING} WHERE professional_id = ? AND date = ? AND {LIVE} ORDER BY start_time"
            ))
            .bind(professional_id)
            .bind(date)
            .fetch_all(self.pool()),
        )
        .await
    }

    pub async fn live_booking_at(
        &self,
        professional_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<Booking>> {
        self.run(
            sqlx::query_as::<_, Booking>(&format!(
                "{SELECT_BOOKING} WHERE professional_id = ? AND date = ? AND start_time = ? AND {LIVE}"
            ))
            .bind(professional_id)
            .bind(date)
            .bind(time)
            .fetch_optional(self.pool()),
        )
        .await
    }

    /// Inserts a booking row. The `bookings_live_slot` index rejects a second
    /// live booking for the same slot, which surfaces as `SlotAlreadyTaken`.
    pub async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        self.run(
            sqlx::query(
                r#"INSERT INTO bookings (id, professional_id, date, start_time, end_time, client_name,
                                         client_phone, client_email, service, notes, status, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&booking.id)
            .bind(&booking.professional_id)
            .bind(booking.date)
            .bind(booking.start_time)
            .bind(booking.end_time)
            .bind(&booking.client_name)
            .bind(&booking.client_phone)
            .bind(&booking.client_email)
            .bind(&booking.service)
            .bind(&booking.notes)
            .bind(booking.status)
            .bind(Utc::now().to_rfc3339())
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    pub async fn booking(&self, id: &str) -> Result<Booking> {
        self.run(
            sqlx::query_as::<_, Booking>(&format!("{SELECT_BOOKING} WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool()),
        )
        .await?
        .ok_or(AppError::NotFound("booking"))
    }

    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_BOOKING);
        query.push(" WHERE 1 = 1");
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(professional_id) = &filter.professional_id {
            query.push(" AND professional_id = ").push_bind(professional_id);
        }
        if let Some(from) = filter.from {
            query.push(" AND date >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND date <= ").push_bind(to);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query
                .push(" AND LOWER(client_name) LIKE ")
                .push_bind(format!("%{}%", search.to_lowercase()));
        }
        query.push(" ORDER BY date, start_time");

        self.run(query.build_query_as::<Booking>().fetch_all(self.pool()))
            .await
    }

    /// Live bookings from `from` onwards that fall on `weekday` (0 = Sunday).
    pub async fn future_bookings_on_weekday(
        &self,
        professional_id: &str,
        weekday: u8,
        from: NaiveDate,
    ) -> Result<Vec<Booking>> {
        self.run(
            sqlx::query_as::<_, Booking>(&format!(
                "{SELECT_BOOKING} WHERE professional_id = ? AND date >= ? AND {LIVE}
                   AND CAST(strftime('%w', date) AS INTEGER) = ?
                 ORDER BY date, start_time"
            ))
            .bind(professional_id)
            .bind(from)
            .bind(weekday)
            .fetch_all(self.pool()),
        )
        .await
    }

    pub async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<Booking> {
        let result = self
            .run(
                sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
                    .bind(status)
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("booking"));
        }
        log::info!("Booking {id} marked {}", status.as_str());
        self.booking(id).await
    }

    /// Overwrites slot and client details of an existing booking. Its status
    /// is left alone. Moving onto a live slot trips `bookings_live_slot`.
    pub async fn update_booking(&self, booking: &Booking) -> Result<()> {
        let result = self
            .run(
                sqlx::query(
                    r#"UPDATE bookings
                       SET professional_id = ?, date = ?, start_time = ?, end_time = ?, client_name = ?,
                           client_phone = ?, client_email = ?, service = ?, notes = ?
                       WHERE id = ?"#,
                )
                .bind(&booking.professional_id)
                .bind(booking.date)
                .bind(booking.start_time)
                .bind(booking.end_time)
                .bind(&booking.client_name)
                .bind(&booking.client_phone)
                .bind(&booking.client_email)
                .bind(&booking.service)
                .bind(&booking.notes)
                .bind(&booking.id)
                .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("booking"));
        }
        Ok(())
    }

    pub async fn delete_booking(&self, id: &str) -> Result<()> {
        let result = self
            .run(
                sqlx::query("DELETE FROM bookings WHERE id = ?")
                    .bind(id)
                    .execute(self.pool()),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("booking"));
        }
        log::info!("Booking {id} deleted");
        Ok(())
    }

    pub async fn booking_stats(&self) -> Result<BookingStats> {
        let pool = self.pool();
        let counts: Vec<(BookingStatus, i64)> = self
            .run(
                sqlx::query_as::<_, (BookingStatus, i64)>("SELECT status, COUNT(*) FROM bookings GROUP BY status")
                    .fetch_all(pool),
            )
            .await?;
        let count_of = |wanted: BookingStatus| {
            counts
                .iter()
                .find(|(status, _)| *status == wanted)
                .map(|(_, count)| *count)
                .unwrap_or(0)
        };
        let confirmed = count_of(BookingStatus::Confirmed);
        let cancelled = count_of(BookingStatus::Cancelled);
        let no_show = count_of(BookingStatus::NoShow);
        let total = confirmed + cancelled + no_show;

        let unique_clients: i64 = self
            .run(
                sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT LOWER(client_email)) FROM bookings")
                    .fetch_one(pool),
            )
            .await?;

        let busiest_times: Vec<(NaiveTime, i64)> = self
            .run(
                sqlx::query_as::<_, (NaiveTime, i64)>(
                    "SELECT start_time, COUNT(*) AS n FROM bookings GROUP BY start_time ORDER BY n DESC, start_time LIMIT ?",
                )
                .bind(TOP_N)
                .fetch_all(pool),
            )
            .await?;

        let frequent_clients = self
            .run(
                sqlx::query_as::<_, FrequentClient>(
                    r#"SELECT MIN(client_name) AS name, LOWER(client_email) AS email, COUNT(*) AS count
                       FROM bookings
                       GROUP BY LOWER(client_email)
                       HAVING COUNT(*) >= ?
                       ORDER BY count DESC, email
                       LIMIT ?"#,
                )
                .bind(FREQUENT_CLIENT_MIN)
                .bind(TOP_N)
                .fetch_all(pool),
            )
            .await?;

        let by_professional = self
            .run(
                sqlx::query_as::<_, ProfessionalCount>(
                    r#"SELECT p.id AS professional_id, p.name AS name, COUNT(b.id) AS total,
                              COALESCE(SUM(b.status = 'confirmed'), 0) AS confirmed,
                              COALESCE(SUM(b.status = 'cancelled'), 0) AS cancelled,
                              COALESCE(SUM(b.status = 'no_show'), 0) AS no_show
                       FROM professionals p
                       LEFT JOIN bookings b ON b.professional_id = p.id
                       GROUP BY p.id, p.name
                       ORDER BY total DESC, p.name"#,
                )
                .fetch_all(pool),
            )
            .await?;

        Ok(BookingStats {
            total,
            confirmed,
            cancelled,
            no_show,
            attendance_rate: attendance_rate(confirmed, total),
            unique_clients,
            busiest_times: busiest_times
                .into_iter()
                .map(|(time, count)| TimeCount { time, count })
                .collect(),
            frequent_clients,
            by_professional,
        })
    }
}
