//! Availability resolution.
//!
//! For one professional and one date the bookable times are the active
//! template times for that weekday, corrected by the date's overrides, minus
//! times that are too close to now (today only), already booked, or inside a
//! partial block. A full-day block or an empty template yields nothing.
//!
//! Resolution keeps no state between calls; every call reads the store and
//! may run concurrently with any number of others.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use futures::future::try_join_all;
use serde::Serialize;

use crate::{
    clock::Clock,
    config::BusinessSettings,
    db::Store,
    error::{AppError, Result},
    models::{weekday_index, Block, Booking, OverrideSlot, TemplateSlot},
};

/// Result of resolving one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "slots", rename_all = "snake_case")]
pub enum DayAvailability {
    /// A full-day block covers the date.
    Blocked,
    /// No active template times exist for the weekday.
    Unconfigured,
    /// Bookable times in ascending order. Empty means configured but full.
    Open(Vec<NaiveTime>),
}

impl DayAvailability {
    pub fn slots(&self) -> &[NaiveTime] {
        match self {
            DayAvailability::Open(slots) => slots,
            DayAvailability::Blocked | DayAvailability::Unconfigured => &[],
        }
    }

    pub fn is_bookable(&self) -> bool {
        !self.slots().is_empty()
    }
}

/// Everything stored about one (professional, date).
#[derive(Debug, Clone, Default)]
pub struct DayRecords {
    pub blocks: Vec<Block>,
    pub template: Vec<TemplateSlot>,
    pub overrides: Vec<OverrideSlot>,
    pub bookings: Vec<Booking>,
}

impl DayRecords {
    /// Reads the four tables concurrently; none of the reads depends on another.
    pub async fn load(store: &Store, professional_id: &str, date: NaiveDate) -> Result<Self> {
        let (blocks, template, overrides, bookings) = tokio::try_join!(
            store.blocks_on(professional_id, date),
            store.template_for_weekday(professional_id, weekday_index(date)),
            store.overrides_on(professional_id, date),
            store.live_bookings_on(professional_id, date),
        )?;
        Ok(Self {
            blocks,
            template,
            overrides,
            bookings,
        })
    }

    pub fn full_day_block(&self) -> Option<&Block> {
        self.blocks.iter().find(|block| block.is_full_day())
    }

    fn active_template_times(&self) -> BTreeSet<NaiveTime> {
        self.template
            .iter()
            .filter(|slot| slot.active)
            .map(|slot| slot.time)
            .collect()
    }

    /// Template times with the date's overrides applied, or `None` when the
    /// weekday has no active template.
    pub fn offered_times(&self) -> Option<BTreeSet<NaiveTime>> {
        let template = self.active_template_times();
        if template.is_empty() {
            return None;
        }

        let mut times = template.clone();
        for slot in &self.overrides {
            if !slot.active {
                times.remove(&slot.time);
            } else if slot.personalized && !template.contains(&slot.time) {
                times.insert(slot.time);
            }
        }
        Some(times)
    }

    pub fn partial_block_at(&self, time: NaiveTime) -> Option<&Block> {
        self.blocks
            .iter()
            .find(|block| !block.is_full_day() && block.covers(time))
    }

    pub fn booking_at(&self, time: NaiveTime) -> Option<&Booking> {
        self.bookings
            .iter()
            .find(|booking| booking.start_time == time && booking.status.occupies_slot())
    }

    /// Whether the template, overrides and blocks offer `time`, ignoring
    /// bookings and the clock.
    pub fn offers(&self, time: NaiveTime) -> bool {
        self.full_day_block().is_none()
            && self.partial_block_at(time).is_none()
            && self
                .offered_times()
                .map(|times| times.contains(&time))
                .unwrap_or(false)
    }
}

/// Combines one day's records into the public slot list.
///
/// `now` only matters when it falls on `date`: then slots starting within
/// `display_cutoff_minutes` (or already started) are dropped.
pub fn combine(
    records: &DayRecords,
    date: NaiveDate,
    now: NaiveDateTime,
    display_cutoff_minutes: i64,
) -> DayAvailability {
    if records.full_day_block().is_some() {
        return DayAvailability::Blocked;
    }
    let Some(candidates) = records.offered_times() else {
        return DayAvailability::Unconfigured;
    };

    let is_today = date == now.date();
    let slots = candidates
        .into_iter()
        .filter(|time| {
            if !is_today {
                return true;
            }
            let remaining = (date.and_time(*time) - now).num_minutes();
            date.and_time(*time) > now && remaining >= display_cutoff_minutes
        })
        .filter(|time| records.booking_at(*time).is_none())
        .filter(|time| records.partial_block_at(*time).is_none())
        .collect();

    DayAvailability::Open(slots)
}

async fn resolve_with(
    store: &Store,
    settings: &BusinessSettings,
    now: NaiveDateTime,
    professional_id: &str,
    date: NaiveDate,
) -> Result<DayAvailability> {
    let records = DayRecords::load(store, professional_id, date).await?;
    Ok(combine(
        &records,
        date,
        now,
        settings.display_cutoff_minutes,
    ))
}

/// Bookable times for a professional on a date.
pub async fn resolve(
    store: &Store,
    clock: &dyn Clock,
    professional_id: &str,
    date: NaiveDate,
) -> Result<DayAvailability> {
    let settings = store.business_settings().await?;
    resolve_with(store, &settings, clock.now(), professional_id, date).await
}

pub async fn has_availability(
    store: &Store,
    clock: &dyn Clock,
    professional_id: &str,
    date: NaiveDate,
) -> Result<bool> {
    Ok(resolve(store, clock, professional_id, date).await?.is_bookable())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotOrigin {
    Template,
    Personalized,
    /// Booked at a time neither the template nor an override offers any more.
    BookingOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Booked,
    Blocked,
    Disabled,
    Open,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub time: NaiveTime,
    pub origin: SlotOrigin,
    pub state: SlotState,
    pub past: bool,
    pub template_id: Option<String>,
    pub override_id: Option<String>,
    pub booking: Option<Booking>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySchedule {
    pub professional_id: String,
    pub date: NaiveDate,
    pub weekday: u8,
    pub full_day_block: Option<Block>,
    pub slots: Vec<SlotView>,
}

/// The admin view of a day: every template, personalized and booked time with
/// its state. Booked times are always listed, whatever blocks or overrides say.
pub async fn day_schedule(
    store: &Store,
    clock: &dyn Clock,
    professional_id: &str,
    date: NaiveDate,
) -> Result<DaySchedule> {
    let records = DayRecords::load(store, professional_id, date).await?;
    Ok(build_schedule(
        professional_id,
        date,
        clock.now(),
        &records,
    ))
}

fn build_schedule(
    professional_id: &str,
    date: NaiveDate,
    now: NaiveDateTime,
    records: &DayRecords,
) -> DaySchedule {
    let full_day_block = records.full_day_block().cloned();

    let mut rows: BTreeMap<NaiveTime, SlotView> = BTreeMap::new();
    let blank = |time: NaiveTime, origin: SlotOrigin| SlotView {
        time,
        origin,
        state: SlotState::Open,
        past: date.and_time(time) <= now,
        template_id: None,
        override_id: None,
        booking: None,
    };

    for slot in &records.template {
        let row = rows
            .entry(slot.time)
            .or_insert_with(|| blank(slot.time, SlotOrigin::Template));
        row.template_id = Some(slot.id.clone());
        if !slot.active {
            row.state = SlotState::Disabled;
        }
    }
    for slot in &records.overrides {
        let row = rows
            .entry(slot.time)
            .or_insert_with(|| blank(slot.time, SlotOrigin::Personalized));
        row.override_id = Some(slot.id.clone());
        row.state = if slot.active {
            SlotState::Open
        } else {
            SlotState::Disabled
        };
    }
    for booking in &records.bookings {
        let row = rows
            .entry(booking.start_time)
            .or_insert_with(|| blank(booking.start_time, SlotOrigin::BookingOnly));
        row.booking = Some(booking.clone());
    }

    for row in rows.values_mut() {
        if row.booking.is_some() {
            row.state = SlotState::Booked;
        } else if full_day_block.is_some() || records.partial_block_at(row.time).is_some() {
            row.state = SlotState::Blocked;
        }
    }

    DaySchedule {
        professional_id: professional_id.to_string(),
        date,
        weekday: weekday_index(date),
        full_day_block,
        slots: rows.into_values().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarState {
    Past,
    NonWorkingDay,
    BeyondHorizon,
    Blocked,
    Unconfigured,
    FullyBooked,
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub state: CalendarState,
    pub bookable: bool,
}

impl CalendarDay {
    fn new(date: NaiveDate, state: CalendarState) -> Self {
        Self {
            date,
            state,
            bookable: state == CalendarState::Available,
        }
    }
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid month: {value}")))
}

fn days_of_month(first: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    first
        .iter_days()
        .take_while(move |day| day.month() == first.month())
}

/// One entry per day of the month holding `month_start`.
///
/// Days that cannot be booked for calendar reasons are answered without
/// touching the store; the rest are resolved concurrently.
pub async fn month_calendar(
    store: &Store,
    clock: &dyn Clock,
    professional_id: &str,
    month_start: NaiveDate,
) -> Result<Vec<CalendarDay>> {
    let settings = store.business_settings().await?;
    let now = clock.now();
    let today = now.date();
    let horizon = today
        .checked_add_months(Months::new(settings.booking_horizon_months))
        .unwrap_or(NaiveDate::MAX);

    let lookups = days_of_month(month_start).map(|date| {
        let settings = &settings;
        async move {
            let state = if date < today {
                CalendarState::Past
            } else if !settings.is_working_day(weekday_index(date)) {
                CalendarState::NonWorkingDay
            } else if date > horizon {
                CalendarState::BeyondHorizon
            } else {
                match resolve_with(store, settings, now, professional_id, date).await? {
                    DayAvailability::Blocked => CalendarState::Blocked,
                    DayAvailability::Unconfigured => CalendarState::Unconfigured,
                    DayAvailability::Open(slots) if slots.is_empty() => CalendarState::FullyBooked,
                    DayAvailability::Open(_) => CalendarState::Available,
                }
            };
            Ok::<_, AppError>(CalendarDay::new(date, state))
        }
    });

    try_join_all(lookups).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::new_id,
        clock::FixedClock,
        models::{BlockCategory, BookingStatus},
        store::{
            blocks::NewBlock,
            fixtures::{date, hm, store_with_professional},
        },
    };

    fn template(times: &[NaiveTime]) -> Vec<TemplateSlot> {
        times
            .iter()
            .map(|time| TemplateSlot {
                id: new_id(),
                professional_id: "p".into(),
                weekday: 1,
                time: *time,
                active: true,
            })
            .collect()
    }

    fn override_slot(time: NaiveTime, active: bool, personalized: bool) -> OverrideSlot {
        OverrideSlot {
            id: new_id(),
            professional_id: "p".into(),
            date: date(2024, 6, 3),
            time,
            active,
            personalized,
        }
    }

    fn block(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Block {
        Block {
            id: new_id(),
            professional_id: "p".into(),
            date: date(2024, 6, 3),
            start_time: start,
            end_time: end,
            reason: String::new(),
            category: BlockCategory::Manual,
        }
    }

    fn booking(time: NaiveTime) -> Booking {
        Booking {
            id: new_id(),
            professional_id: "p".into(),
            date: date(2024, 6, 3),
            start_time: time,
            end_time: time + chrono::Duration::minutes(30),
            client_name: "Ana".into(),
            client_phone: "3794123456".into(),
            client_email: "ana@example.com".into(),
            service: None,
            notes: None,
            status: BookingStatus::Confirmed,
        }
    }

    // A day before the resolved dates, so the time filter never applies.
    fn earlier() -> NaiveDateTime {
        date(2024, 6, 1).and_hms_opt(12, 0, 0).unwrap()
    }

    fn open(records: &DayRecords) -> Vec<NaiveTime> {
        match combine(records, date(2024, 6, 3), earlier(), 180) {
            DayAvailability::Open(slots) => slots,
            other => panic!("expected open day, got {other:?}"),
        }
    }

    #[test]
    fn empty_template_is_unconfigured() {
        let records = DayRecords {
            overrides: vec![override_slot(hm(14, 0), true, true)],
            ..Default::default()
        };
        assert_eq!(
            combine(&records, date(2024, 6, 3), earlier(), 0),
            DayAvailability::Unconfigured
        );
    }

    #[test]
    fn full_day_block_wins_over_everything() {
        let records = DayRecords {
            blocks: vec![block(None, None)],
            template: template(&[hm(9, 0)]),
            overrides: vec![override_slot(hm(14, 0), true, true)],
            ..Default::default()
        };
        assert_eq!(
            combine(&records, date(2024, 6, 3), earlier(), 0),
            DayAvailability::Blocked
        );
    }

    #[test]
    fn overrides_remove_and_add_single_times() {
        let records = DayRecords {
            template: template(&[hm(9, 0), hm(9, 30), hm(10, 0)]),
            overrides: vec![
                override_slot(hm(9, 0), false, false),
                override_slot(hm(14, 0), true, true),
            ],
            ..Default::default()
        };
        assert_eq!(open(&records), vec![hm(9, 30), hm(10, 0), hm(14, 0)]);
    }

    #[test]
    fn inactive_template_rows_are_ignored() {
        let mut slots = template(&[hm(9, 0), hm(9, 30)]);
        slots[0].active = false;
        let records = DayRecords {
            template: slots,
            ..Default::default()
        };
        assert_eq!(open(&records), vec![hm(9, 30)]);
    }

    #[test]
    fn partial_block_is_half_open() {
        let records = DayRecords {
            template: template(&[hm(9, 30), hm(10, 0), hm(11, 30), hm(12, 0)]),
            blocks: vec![block(Some(hm(10, 0)), Some(hm(12, 0)))],
            ..Default::default()
        };
        assert_eq!(open(&records), vec![hm(9, 30), hm(12, 0)]);
    }

    #[test]
    fn half_specified_block_is_ignored() {
        let records = DayRecords {
            template: template(&[hm(9, 0), hm(10, 0)]),
            blocks: vec![block(Some(hm(9, 0)), None)],
            ..Default::default()
        };
        assert_eq!(open(&records), vec![hm(9, 0), hm(10, 0)]);
    }

    #[test]
    fn bookings_hide_their_slot_only() {
        let records = DayRecords {
            template: template(&[hm(9, 0), hm(9, 30)]),
            bookings: vec![booking(hm(9, 30))],
            ..Default::default()
        };
        assert_eq!(open(&records), vec![hm(9, 0)]);
    }

    #[test]
    fn display_cutoff_applies_to_today_only() {
        let records = DayRecords {
            template: template(&[hm(9, 0), hm(10, 0), hm(11, 0), hm(13, 0)]),
            ..Default::default()
        };
        let now = date(2024, 6, 3).and_hms_opt(9, 30, 0).unwrap();

        // 13:00 is 210 minutes away, 11:00 only 90.
        assert_eq!(
            combine(&records, date(2024, 6, 3), now, 180).slots(),
            &[hm(13, 0)]
        );
        assert_eq!(
            combine(&records, date(2024, 6, 3), now, 0).slots(),
            &[hm(10, 0), hm(11, 0), hm(13, 0)]
        );
        assert_eq!(combine(&records, date(2024, 6, 4), now, 180).slots().len(), 4);
    }

    #[test]
    fn combining_is_idempotent() {
        let records = DayRecords {
            template: template(&[hm(10, 0), hm(9, 0)]),
            overrides: vec![override_slot(hm(8, 0), true, true)],
            ..Default::default()
        };
        let first = combine(&records, date(2024, 6, 3), earlier(), 0);
        assert_eq!(first, combine(&records, date(2024, 6, 3), earlier(), 0));
        assert_eq!(first.slots(), &[hm(8, 0), hm(9, 0), hm(10, 0)]);
    }

    #[test]
    fn offers_ignores_bookings_but_not_blocks() {
        let records = DayRecords {
            template: template(&[hm(9, 0), hm(10, 0)]),
            blocks: vec![block(Some(hm(10, 0)), Some(hm(11, 0)))],
            bookings: vec![booking(hm(9, 0))],
            ..Default::default()
        };
        assert!(records.offers(hm(9, 0)));
        assert!(!records.offers(hm(10, 0)));
        assert!(!records.offers(hm(9, 15)));
    }

    #[test]
    fn months_parse_from_year_and_month() {
        assert_eq!(parse_month("2024-06").unwrap(), date(2024, 6, 1));
        assert!(parse_month("2024-13").is_err());
        assert_eq!(days_of_month(date(2024, 2, 1)).count(), 29);
    }

    #[tokio::test]
    async fn resolves_the_monday_scenario_from_the_store() {
        let (store, pro) = store_with_professional().await;
        let monday = date(2024, 6, 3);
        let clock = FixedClock(earlier());

        store.add_template_slots(&pro, 1, &[hm(9, 0), hm(9, 30)]).await.unwrap();
        store.upsert_override(&pro, monday, hm(9, 0), false, false).await.unwrap();
        store.upsert_override(&pro, monday, hm(14, 0), true, true).await.unwrap();

        let day = resolve(&store, &clock, &pro, monday).await.unwrap();
        assert_eq!(day.slots(), &[hm(9, 30), hm(14, 0)]);

        let mut taken = booking(hm(9, 30));
        taken.professional_id = pro.clone();
        store.insert_booking(&taken).await.unwrap();

        let day = resolve(&store, &clock, &pro, monday).await.unwrap();
        assert_eq!(day.slots(), &[hm(14, 0)]);
        assert!(has_availability(&store, &clock, &pro, monday).await.unwrap());

        // The rows behind the booked slot are untouched.
        assert_eq!(store.template_for_weekday(&pro, 1).await.unwrap().len(), 2);
        assert_eq!(store.overrides_on(&pro, monday).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn schedule_keeps_booked_slots_visible() {
        let (store, pro) = store_with_professional().await;
        let monday = date(2024, 6, 3);
        store.add_template_slots(&pro, 1, &[hm(9, 0), hm(9, 30)]).await.unwrap();
        store.upsert_override(&pro, monday, hm(9, 0), false, false).await.unwrap();
        let mut taken = booking(hm(9, 0));
        taken.professional_id = pro.clone();
        store.insert_booking(&taken).await.unwrap();
        let mut orphan = booking(hm(18, 0));
        orphan.professional_id = pro.clone();
        store.insert_booking(&orphan).await.unwrap();
        store
            .create_block(NewBlock {
                professional_id: pro.clone(),
                date: monday,
                start_time: None,
                end_time: None,
                reason: "Holiday".into(),
                category: BlockCategory::Holiday,
            })
            .await
            .unwrap();

        let schedule = day_schedule(&store, &FixedClock(earlier()), &pro, monday)
            .await
            .unwrap();
        let states: Vec<_> = schedule
            .slots
            .iter()
            .map(|slot| (slot.time, slot.origin, slot.state))
            .collect();
        assert_eq!(
            states,
            vec![
                (hm(9, 0), SlotOrigin::Template, SlotState::Booked),
                (hm(9, 30), SlotOrigin::Template, SlotState::Blocked),
                (hm(18, 0), SlotOrigin::BookingOnly, SlotState::Booked),
            ]
        );
        assert!(schedule.full_day_block.is_some());
    }

    #[tokio::test]
    async fn calendar_marks_each_day() {
        let (store, pro) = store_with_professional().await;
        // Mondays and Tuesdays only.
        store.add_template_slot(&pro, 1, hm(10, 0)).await.unwrap();
        store.add_template_slot(&pro, 2, hm(10, 0)).await.unwrap();
        let mut taken = booking(hm(10, 0));
        taken.professional_id = pro.clone();
        taken.date = date(2024, 6, 11);
        store.insert_booking(&taken).await.unwrap();

        let clock = FixedClock(date(2024, 6, 5).and_hms_opt(8, 0, 0).unwrap());
        let days = month_calendar(&store, &clock, &pro, date(2024, 6, 1)).await.unwrap();
        assert_eq!(days.len(), 30);

        let state = |d: u32| days[(d - 1) as usize].state;
        assert_eq!(state(3), CalendarState::Past);
        assert_eq!(state(9), CalendarState::NonWorkingDay); // Sunday
        assert_eq!(state(10), CalendarState::Available);
        assert_eq!(state(11), CalendarState::FullyBooked);
        assert_eq!(state(12), CalendarState::Unconfigured);
        assert!(days[9].bookable);

        let far = month_calendar(&store, &clock, &pro, date(2024, 9, 1)).await.unwrap();
        assert!(far.iter().all(|day| matches!(
            day.state,
            CalendarState::BeyondHorizon | CalendarState::NonWorkingDay
        )));
    }
}
