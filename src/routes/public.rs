use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::{
    availability::{self, parse_month, DayAvailability},
    booking::{self, BookingRequest},
    error::{AppError, Result},
    models::{parse_date, Professional},
    state::AppState,
};

#[derive(Deserialize)]
struct DateQuery {
    date: String,
}

#[derive(Deserialize)]
struct MonthQuery {
    month: String,
}

#[derive(Serialize)]
struct AvailabilityResponse {
    professional_id: String,
    date: chrono::NaiveDate,
    has_availability: bool,
    #[serde(flatten)]
    availability: DayAvailability,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(
            web::scope("/api")
                .service(web::resource("/professionals").route(web::get().to(list_professionals)))
                .service(
                    web::resource("/professionals/{id}/availability")
                        .route(web::get().to(day_availability)),
                )
                .service(
                    web::resource("/professionals/{id}/calendar").route(web::get().to(calendar)),
                )
                .service(web::resource("/bookings").route(web::post().to(create_booking)))
                .service(web::resource("/settings/public").route(web::get().to(public_settings))),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

/// Inactive professionals are invisible to the public flow.
async fn active_professional(state: &AppState, id: &str) -> Result<Professional> {
    let professional = state.store.professional(id).await?;
    if !professional.active {
        return Err(AppError::NotFound("professional"));
    }
    Ok(professional)
}

async fn list_professionals(state: web::Data<AppState>) -> Result<HttpResponse> {
    let professionals = state.store.list_professionals(true).await?;
    Ok(HttpResponse::Ok().json(professionals))
}

async fn day_availability(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse> {
    let professional = active_professional(&state, &path.into_inner()).await?;
    let date = parse_date(&query.date)?;
    let availability =
        availability::resolve(&state.store, state.clock.as_ref(), &professional.id, date).await?;

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        professional_id: professional.id,
        date,
        has_availability: availability.is_bookable(),
        availability,
    }))
}

async fn calendar(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<MonthQuery>,
) -> Result<HttpResponse> {
    let professional = active_professional(&state, &path.into_inner()).await?;
    let month = parse_month(&query.month)?;
    let days =
        availability::month_calendar(&state.store, state.clock.as_ref(), &professional.id, month)
            .await?;
    Ok(HttpResponse::Ok().json(days))
}

async fn create_booking(
    state: web::Data<AppState>,
    payload: web::Json<BookingRequest>,
) -> Result<HttpResponse> {
    let booking = booking::create_booking(&state, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(booking))
}

async fn public_settings(state: web::Data<AppState>) -> Result<HttpResponse> {
    let settings = state.store.business_settings().await?;
    Ok(HttpResponse::Ok().json(settings))
}
