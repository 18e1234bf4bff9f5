//! Administration of recurring templates and per-date overrides.
//!
//! Single-date changes never touch template rows: they are expressed as
//! override rows for that date. A time holding a live booking is protected and
//! cannot be switched off, edited or removed.

use chrono::{NaiveDate, NaiveTime};

use crate::{
    availability::DayRecords,
    clock::Clock,
    db::Store,
    error::{AppError, Result},
    models::{validate_weekday, Booking, OverrideSlot},
    store::overrides::Replaced,
};

fn protected(time: NaiveTime) -> AppError {
    AppError::SlotProtected(time.format("%H:%M").to_string())
}

async fn ensure_unbooked(
    store: &Store,
    professional_id: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<()> {
    match store.live_booking_at(professional_id, date, time).await? {
        Some(_) => Err(protected(time)),
        None => Ok(()),
    }
}

fn in_active_template(records: &DayRecords, time: NaiveTime) -> bool {
    records
        .template
        .iter()
        .any(|slot| slot.active && slot.time == time)
}

/// Adds a one-off time on `date`. An existing row for that time is switched
/// back on instead.
pub async fn add_personalized_slot(
    store: &Store,
    professional_id: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<OverrideSlot> {
    store.professional(professional_id).await?;
    let records = DayRecords::load(store, professional_id, date).await?;
    if records
        .offered_times()
        .is_some_and(|times| times.contains(&time))
    {
        return Err(AppError::Duplicate(format!(
            "{} is already offered on {date}.",
            time.format("%H:%M")
        )));
    }

    let personalized = !in_active_template(&records, time);
    store
        .upsert_override(professional_id, date, time, true, personalized)
        .await
}

/// Switches one time on or off for `date`, creating the override row on first use.
pub async fn toggle_slot(
    store: &Store,
    professional_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    active: bool,
) -> Result<OverrideSlot> {
    store.professional(professional_id).await?;
    if !active {
        ensure_unbooked(store, professional_id, date, time).await?;
    }
    let records = DayRecords::load(store, professional_id, date).await?;
    let personalized = !in_active_template(&records, time);
    let slot = store
        .upsert_override(professional_id, date, time, active, personalized)
        .await?;
    log::info!(
        "Slot {} on {date} for {professional_id} turned {}",
        time.format("%H:%M"),
        if active { "on" } else { "off" }
    );
    Ok(slot)
}

/// Replaces `old` with `new` on `date` only.
///
/// A personalized row is moved. A template time is switched off for the date
/// and `new` is added as a personalized time. Both writes commit together.
pub async fn edit_slot(
    store: &Store,
    professional_id: &str,
    date: NaiveDate,
    old: NaiveTime,
    new: NaiveTime,
) -> Result<OverrideSlot> {
    store.professional(professional_id).await?;
    ensure_unbooked(store, professional_id, date, old).await?;
    let records = DayRecords::load(store, professional_id, date).await?;

    if old == new {
        return store
            .upsert_override(professional_id, date, old, true, !in_active_template(&records, old))
            .await;
    }
    if records.offers(new) {
        return Err(AppError::Duplicate(format!(
            "{} is already offered on {date}.",
            new.format("%H:%M")
        )));
    }

    let personalized = !in_active_template(&records, new);
    let existing = records.overrides.iter().find(|slot| slot.time == old);
    let slot = match existing {
        Some(slot) if slot.personalized => {
            let target_taken = records.overrides.iter().any(|other| other.time == new);
            if target_taken {
                store
                    .replace_override(professional_id, date, old, Replaced::Delete, new, personalized)
                    .await?
            } else {
                store.move_override(&slot.id, new).await?
            }
        }
        _ => {
            store
                .replace_override(professional_id, date, old, Replaced::Disable, new, personalized)
                .await?
        }
    };
    log::info!(
        "Slot {} on {date} for {professional_id} moved to {}",
        old.format("%H:%M"),
        new.format("%H:%M")
    );
    Ok(slot)
}

/// Deletes a personalized time. Template suppressions are undone with
/// [`toggle_slot`] or [`restore_day`] instead.
pub async fn remove_personalized_slot(store: &Store, override_id: &str) -> Result<()> {
    let slot = store.override_by_id(override_id).await?;
    if !slot.personalized {
        return Err(AppError::validation(
            "Only personalized times can be removed; switch template times off instead.",
        ));
    }
    ensure_unbooked(store, &slot.professional_id, slot.date, slot.time).await?;
    store.delete_override(&slot.id).await
}

/// Drops every override on `date` so the day follows the template again.
/// Bookings are kept and show up as booking-only times if their slot goes away.
pub async fn restore_day(store: &Store, professional_id: &str, date: NaiveDate) -> Result<u64> {
    let removed = store.clear_overrides(professional_id, date).await?;
    log::info!("Restored {date} for {professional_id} to its template ({removed} overrides removed)");
    Ok(removed)
}

/// Upcoming live bookings on `weekday` whose start time is missing from
/// `proposed`, i.e. bookings a template change would orphan.
pub async fn affected_bookings(
    store: &Store,
    clock: &dyn Clock,
    professional_id: &str,
    weekday: u8,
    proposed: &[NaiveTime],
) -> Result<Vec<Booking>> {
    let weekday = validate_weekday(weekday)?;
    let bookings = store
        .future_bookings_on_weekday(professional_id, weekday, clock.today())
        .await?;
    Ok(bookings
        .into_iter()
        .filter(|booking| !proposed.contains(&booking.start_time))
        .collect())
}
