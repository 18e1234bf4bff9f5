use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::{
    auth::new_id,
    availability::DayRecords,
    error::{AppError, Result},
    models::{parse_slot_time, Booking, BookingStatus, ClientInfo},
    notify::dispatch_booking_notifications,
    state::AppState,
};

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub professional_id: String,
    pub date: NaiveDate,
    /// `HH:MM`, seconds are accepted and dropped.
    pub time: String,
    #[serde(flatten)]
    pub client: ClientInfo,
}

/// Start plus the slot duration, wrapping past midnight.
pub fn end_time(start: NaiveTime, duration_minutes: i64) -> Result<NaiveTime> {
    let duration = Duration::try_minutes(duration_minutes)
        .filter(|duration| *duration > Duration::zero())
        .ok_or_else(|| {
            AppError::validation(format!("Invalid slot duration of {duration_minutes} minutes."))
        })?;
    Ok(start.overflowing_add_signed(duration).0)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalized(client: ClientInfo) -> ClientInfo {
    ClientInfo {
        name: client.name.trim().to_string(),
        phone: client.phone.trim().to_string(),
        email: client.email.trim().to_lowercase(),
        service: trimmed(client.service),
        notes: trimmed(client.notes),
    }
}

/// Validates and stores a new booking, then notifies client and admin.
///
/// The live-booking check below and the insert are not atomic: two requests
/// for the same slot can both pass the check. The `bookings_live_slot` unique
/// index decides the race and the loser gets `SlotAlreadyTaken`, same as if the
/// check had caught it.
pub async fn create_booking(state: &AppState, request: BookingRequest) -> Result<Booking> {
    request.client.validate()?;
    let time = parse_slot_time(&request.time)?;
    let date = request.date;
    let store = &state.store;

    let (professional, settings) = tokio::try_join!(
        store.professional(&request.professional_id),
        store.business_settings(),
    )?;
    if !professional.active {
        return Err(AppError::NotFound("professional"));
    }

    if store
        .live_booking_at(&professional.id, date, time)
        .await?
        .is_some()
    {
        return Err(AppError::SlotAlreadyTaken);
    }

    let now = state.clock.now();
    let start = date.and_time(time);
    if start <= now {
        return Err(AppError::PastSlot);
    }
    if (start - now).num_minutes() < settings.booking_lead_minutes {
        return Err(AppError::InsufficientLeadTime {
            minutes: settings.booking_lead_minutes,
        });
    }

    let records = DayRecords::load(store, &professional.id, date).await?;
    if !records.offers(time) {
        return Err(AppError::SlotNotOffered);
    }

    let client = normalized(request.client);
    let booking = Booking {
        id: new_id(),
        professional_id: professional.id.clone(),
        date,
        start_time: time,
        end_time: end_time(time, settings.slot_duration_minutes)?,
        client_name: client.name,
        client_phone: client.phone,
        client_email: client.email,
        service: client.service,
        notes: client.notes,
        status: BookingStatus::Confirmed,
    };

    if let Err(err) = store.insert_booking(&booking).await {
        if matches!(err, AppError::SlotAlreadyTaken) {
            log::info!(
                "Lost booking race for {} on {} {}",
                professional.name,
                date,
                time.format("%H:%M")
            );
        }
        return Err(err);
    }

    log::info!(
        "Booking {} confirmed: {} with {} on {} {}",
        booking.id,
        booking.client_name,
        professional.name,
        booking.date,
        booking.start_time.format("%H:%M")
    );

    dispatch_booking_notifications(state.notifier.clone(), booking.clone(), professional);
    Ok(booking)
}

/// Rewrites an existing booking from the admin panel: another professional,
/// date or time, new client details, or any mix of them.
///
/// A move must land on a free time the schedule offers that has not started
/// yet. The booking lead time is not enforced here. Status is kept and
/// nobody is notified. Moving races like creating does and ends the same way
/// on the unique index.
pub async fn reschedule_booking(
    state: &AppState,
    id: &str,
    request: BookingRequest,
) -> Result<Booking> {
    request.client.validate()?;
    let time = parse_slot_time(&request.time)?;
    let date = request.date;
    let store = &state.store;

    let (current, professional, settings) = tokio::try_join!(
        store.booking(id),
        store.professional(&request.professional_id),
        store.business_settings(),
    )?;

    let moved = current.professional_id != professional.id
        || current.date != date
        || current.start_time != time;
    let mut end = current.end_time;
    if moved {
        if !professional.active {
            return Err(AppError::NotFound("professional"));
        }
        if current.status.occupies_slot()
            && store
                .live_booking_at(&professional.id, date, time)
                .await?
                .is_some()
        {
            return Err(AppError::SlotAlreadyTaken);
        }
        if date.and_time(time) <= state.clock.now() {
            return Err(AppError::PastSlot);
        }
        let records = DayRecords::load(store, &professional.id, date).await?;
        if !records.offers(time) {
            return Err(AppError::SlotNotOffered);
        }
        end = end_time(time, settings.slot_duration_minutes)?;
    }

    let client = normalized(request.client);
    let booking = Booking {
        id: current.id,
        professional_id: professional.id,
        date,
        start_time: time,
        end_time: end,
        client_name: client.name,
        client_phone: client.phone,
        client_email: client.email,
        service: client.service,
        notes: client.notes,
        status: current.status,
    };
    store.update_booking(&booking).await?;

    if moved {
        log::info!(
            "Booking {} moved from {} {} to {} {}",
            booking.id,
            current.date,
            current.start_time.format("%H:%M"),
            booking.date,
            booking.start_time.format("%H:%M")
        );
    } else {
        log::info!("Booking {} details updated", booking.id);
    }
    Ok(booking)
}
