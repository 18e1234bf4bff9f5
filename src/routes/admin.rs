use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use actix_web_httpauth::{extractors::basic, middleware::HttpAuthentication};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{admin_validator, AuthUser, AUTH_REALM},
    availability,
    booking::{self, BookingRequest},
    error::{AppError, Result},
    models::{parse_date, parse_slot_time, BookingStatus},
    schedule,
    state::AppState,
    store::{
        blocks::{BlockFilter, NewBlock},
        bookings::BookingFilter,
        professionals::{NewProfessional, ProfessionalUpdate},
        templates::generate_times,
    },
};

const DEFAULT_UPCOMING_DAYS: u64 = 7;

#[derive(Deserialize)]
struct ActiveForm {
    active: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateAddition {
    One {
        time: String,
    },
    Many {
        times: Vec<String>,
    },
    Series {
        start: String,
        end: String,
        interval_minutes: i64,
    },
}

#[derive(Deserialize)]
struct CopyForm {
    destinations: Vec<u8>,
}

#[derive(Deserialize)]
struct TimesForm {
    times: Vec<String>,
}

#[derive(Deserialize)]
struct SlotForm {
    time: String,
}

#[derive(Deserialize)]
struct EditSlotForm {
    new_time: String,
}

#[derive(Deserialize)]
struct BlockCheckQuery {
    professional_id: String,
    date: String,
    time: Option<String>,
}

#[derive(Deserialize)]
struct UpcomingQuery {
    days: Option<u64>,
}

#[derive(Deserialize)]
struct StatusForm {
    status: BookingStatus,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin/api")
            .app_data(basic::Config::default().realm(AUTH_REALM))
            .wrap(HttpAuthentication::basic(admin_validator))
            .service(web::resource("/me").route(web::get().to(me)))
            .service(
                web::resource("/professionals")
                    .route(web::get().to(list_professionals))
                    .route(web::post().to(create_professional)),
            )
            .service(
                web::resource("/professionals/{id}")
                    .route(web::get().to(professional_detail))
                    .route(web::put().to(update_professional)),
            )
            .service(
                web::resource("/professionals/{id}/active").route(web::post().to(set_active)),
            )
            .service(web::resource("/professionals/{id}/template").route(web::get().to(week_template)))
            .service(
                web::resource("/professionals/{id}/template/{weekday}")
                    .route(web::get().to(day_template))
                    .route(web::post().to(add_template))
                    .route(web::delete().to(clear_template)),
            )
            .service(
                web::resource("/professionals/{id}/template/{weekday}/copy")
                    .route(web::post().to(copy_template)),
            )
            .service(
                web::resource("/professionals/{id}/template/{weekday}/affected")
                    .route(web::post().to(affected_bookings)),
            )
            .service(
                web::resource("/template-slots/{slot_id}").route(web::delete().to(remove_template_slot)),
            )
            .service(
                web::resource("/professionals/{id}/days/{date}").route(web::get().to(day_schedule)),
            )
            .service(
                web::resource("/professionals/{id}/days/{date}/overrides")
                    .route(web::get().to(list_overrides))
                    .route(web::delete().to(restore_day)),
            )
            .service(
                web::resource("/professionals/{id}/days/{date}/slots")
                    .route(web::post().to(add_personalized_slot)),
            )
            .service(
                web::resource("/professionals/{id}/days/{date}/slots/{time}")
                    .route(web::put().to(toggle_slot)),
            )
            .service(
                web::resource("/professionals/{id}/days/{date}/slots/{time}/edit")
                    .route(web::post().to(edit_slot)),
            )
            .service(web::resource("/overrides/{override_id}").route(web::delete().to(remove_override)))
            .service(
                web::resource("/blocks")
                    .route(web::get().to(list_blocks))
                    .route(web::post().to(create_block)),
            )
            .service(web::resource("/blocks/check").route(web::get().to(check_block)))
            .service(web::resource("/blocks/{id}").route(web::delete().to(delete_block)))
            .service(web::resource("/bookings").route(web::get().to(list_bookings)))
            .service(web::resource("/bookings/today").route(web::get().to(todays_bookings)))
            .service(web::resource("/bookings/upcoming").route(web::get().to(upcoming_bookings)))
            .service(web::resource("/bookings/stats").route(web::get().to(booking_stats)))
            .service(
                web::resource("/bookings/{id}")
                    .route(web::get().to(booking_detail))
                    .route(web::put().to(update_booking))
                    .route(web::delete().to(delete_booking)),
            )
            .service(web::resource("/bookings/{id}/status").route(web::put().to(update_booking_status)))
            .service(
                web::resource("/settings")
                    .route(web::get().to(get_settings))
                    .route(web::put().to(update_settings)),
            ),
    );
}

fn parse_times(values: &[String]) -> Result<Vec<NaiveTime>> {
    values.iter().map(|value| parse_slot_time(value)).collect()
}

async fn me(auth: web::ReqData<AuthUser>) -> HttpResponse {
    HttpResponse::Ok().json(auth.into_inner())
}

async fn list_professionals(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.list_professionals(false).await?))
}

async fn create_professional(
    state: web::Data<AppState>,
    payload: web::Json<NewProfessional>,
) -> Result<HttpResponse> {
    let professional = state.store.create_professional(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(professional))
}

async fn professional_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.professional(&path).await?))
}

async fn update_professional(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ProfessionalUpdate>,
) -> Result<HttpResponse> {
    let professional = state
        .store
        .update_professional(&path, payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(professional))
}

async fn set_active(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ActiveForm>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let professional = state
        .store
        .set_professional_active(&path, payload.active)
        .await?;
    log::info!(
        "{} set {} {}",
        auth.display_name,
        professional.name,
        if professional.active { "active" } else { "inactive" }
    );
    Ok(HttpResponse::Ok().json(professional))
}

async fn week_template(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.week_template(&path).await?))
}

async fn day_template(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
) -> Result<HttpResponse> {
    let (professional_id, weekday) = path.into_inner();
    let slots = state
        .store
        .template_for_weekday(&professional_id, weekday)
        .await?;
    Ok(HttpResponse::Ok().json(slots))
}

async fn add_template(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
    payload: web::Json<TemplateAddition>,
) -> Result<HttpResponse> {
    let (professional_id, weekday) = path.into_inner();
    let times = match payload.into_inner() {
        TemplateAddition::One { time } => {
            let slot = state
                .store
                .add_template_slot(&professional_id, weekday, parse_slot_time(&time)?)
                .await?;
            return Ok(HttpResponse::Created().json(slot));
        }
        TemplateAddition::Many { times } => parse_times(&times)?,
        TemplateAddition::Series {
            start,
            end,
            interval_minutes,
        } => generate_times(
            parse_slot_time(&start)?,
            parse_slot_time(&end)?,
            interval_minutes,
        )?,
    };

    let inserted = state
        .store
        .add_template_slots(&professional_id, weekday, &times)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "inserted": inserted })))
}

async fn clear_template(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
) -> Result<HttpResponse> {
    let (professional_id, weekday) = path.into_inner();
    let removed = state
        .store
        .clear_template_day(&professional_id, weekday)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}

async fn copy_template(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
    payload: web::Json<CopyForm>,
) -> Result<HttpResponse> {
    let (professional_id, weekday) = path.into_inner();
    let written = state
        .store
        .copy_template_day(&professional_id, weekday, &payload.destinations)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "written": written })))
}

async fn affected_bookings(
    state: web::Data<AppState>,
    path: web::Path<(String, u8)>,
    payload: web::Json<TimesForm>,
) -> Result<HttpResponse> {
    let (professional_id, weekday) = path.into_inner();
    let proposed = parse_times(&payload.times)?;
    let bookings = schedule::affected_bookings(
        &state.store,
        state.clock.as_ref(),
        &professional_id,
        weekday,
        &proposed,
    )
    .await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn remove_template_slot(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    state.store.remove_template_slot(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

fn day_path(path: web::Path<(String, String)>) -> Result<(String, NaiveDate)> {
    let (professional_id, date) = path.into_inner();
    Ok((professional_id, parse_date(&date)?))
}

async fn day_schedule(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (professional_id, date) = day_path(path)?;
    state.store.professional(&professional_id).await?;
    let schedule =
        availability::day_schedule(&state.store, state.clock.as_ref(), &professional_id, date)
            .await?;
    Ok(HttpResponse::Ok().json(schedule))
}

async fn list_overrides(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (professional_id, date) = day_path(path)?;
    Ok(HttpResponse::Ok().json(state.store.overrides_on(&professional_id, date).await?))
}

async fn restore_day(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (professional_id, date) = day_path(path)?;
    let removed = schedule::restore_day(&state.store, &professional_id, date).await?;
    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}

async fn add_personalized_slot(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<SlotForm>,
) -> Result<HttpResponse> {
    let (professional_id, date) = day_path(path)?;
    let time = parse_slot_time(&payload.time)?;
    let slot = schedule::add_personalized_slot(&state.store, &professional_id, date, time).await?;
    Ok(HttpResponse::Created().json(slot))
}

async fn toggle_slot(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    payload: web::Json<ActiveForm>,
) -> Result<HttpResponse> {
    let (professional_id, date, time) = path.into_inner();
    let slot = schedule::toggle_slot(
        &state.store,
        &professional_id,
        parse_date(&date)?,
        parse_slot_time(&time)?,
        payload.active,
    )
    .await?;
    Ok(HttpResponse::Ok().json(slot))
}

async fn edit_slot(
    state: web::Data<AppState>,
    path: web::Path<(String, String, String)>,
    payload: web::Json<EditSlotForm>,
) -> Result<HttpResponse> {
    let (professional_id, date, time) = path.into_inner();
    let slot = schedule::edit_slot(
        &state.store,
        &professional_id,
        parse_date(&date)?,
        parse_slot_time(&time)?,
        parse_slot_time(&payload.new_time)?,
    )
    .await?;
    Ok(HttpResponse::Ok().json(slot))
}

async fn remove_override(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    schedule::remove_personalized_slot(&state.store, &path).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_blocks(
    state: web::Data<AppState>,
    query: web::Query<BlockFilter>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.list_blocks(&query).await?))
}

async fn create_block(
    state: web::Data<AppState>,
    payload: web::Json<NewBlock>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let block = state.store.create_block(payload.into_inner()).await?;
    log::info!("{} blocked {} for {}", auth.display_name, block.date, block.professional_id);
    Ok(HttpResponse::Created().json(block))
}

async fn check_block(
    state: web::Data<AppState>,
    query: web::Query<BlockCheckQuery>,
) -> Result<HttpResponse> {
    let date = parse_date(&query.date)?;
    let time = query.time.as_deref().map(parse_slot_time).transpose()?;
    let block = state
        .store
        .find_block(&query.professional_id, date, time)
        .await?;
    Ok(HttpResponse::Ok().json(json!({
        "blocked": block.is_some(),
        "block": block,
    })))
}

async fn delete_block(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    state.store.delete_block(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_bookings(
    state: web::Data<AppState>,
    query: web::Query<BookingFilter>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.list_bookings(&query).await?))
}

async fn todays_bookings(state: web::Data<AppState>) -> Result<HttpResponse> {
    let today = state.clock.today();
    let bookings = state
        .store
        .list_bookings(&BookingFilter {
            from: Some(today),
            to: Some(today),
            ..Default::default()
        })
        .await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn upcoming_bookings(
    state: web::Data<AppState>,
    query: web::Query<UpcomingQuery>,
) -> Result<HttpResponse> {
    let today = state.clock.today();
    let days = query.days.unwrap_or(DEFAULT_UPCOMING_DAYS);
    let until = today
        .checked_add_days(Days::new(days))
        .ok_or_else(|| AppError::validation("Too many days requested."))?;
    let bookings = state
        .store
        .list_bookings(&BookingFilter {
            status: Some(BookingStatus::Confirmed),
            from: Some(today),
            to: Some(until),
            ..Default::default()
        })
        .await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn booking_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.booking_stats().await?))
}

async fn booking_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.store.booking(&path).await?))
}

async fn update_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<BookingRequest>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let booking = booking::reschedule_booking(&state, &path, payload.into_inner()).await?;
    log::info!("{} edited booking {}", auth.display_name, booking.id);
    Ok(HttpResponse::Ok().json(booking))
}

async fn update_booking_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<StatusForm>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let booking = state
        .store
        .update_booking_status(&path, payload.status)
        .await?;
    log::info!(
        "{} marked booking {} as {}",
        auth.display_name,
        booking.id,
        booking.status.as_str()
    );
    Ok(HttpResponse::Ok().json(booking))
}

async fn delete_booking(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    state.store.delete_booking(&path).await?;
    log::info!("{} deleted booking {}", auth.display_name, path.as_str());
    Ok(HttpResponse::NoContent().finish())
}

async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse> {
    let values = state.store.all_settings().await?;
    let parsed = state.store.business_settings().await?;
    Ok(HttpResponse::Ok().json(json!({
        "values": values,
        "settings": parsed,
    })))
}

async fn update_settings(
    state: web::Data<AppState>,
    payload: web::Json<HashMap<String, String>>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse> {
    let settings = state.store.update_settings(&payload).await?;
    log::info!("{} updated the business settings", auth.display_name);
    Ok(HttpResponse::Ok().json(settings))
}
