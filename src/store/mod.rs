//! Table-level queries, one file per table. Each file adds methods to
//! [`Store`](crate::db::Store); every call goes through `Store::run` so it is
//! bounded by the store timeout.

pub mod blocks;
pub mod bookings;
pub mod overrides;
pub mod professionals;
pub mod settings;
pub mod templates;

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{NaiveDate, NaiveTime};

    use crate::{db::Store, store::professionals::NewProfessional};

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    pub async fn store_with_professional() -> (Store, String) {
        let store = Store::in_memory().await.unwrap();
        let professional = store
            .create_professional(NewProfessional {
                name: "Lucas".into(),
                specialty: "Barber".into(),
                color: None,
                sort_order: None,
            })
            .await
            .unwrap();
        (store, professional.id)
    }
}
