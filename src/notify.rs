use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Booking, Professional};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected the message with status {0}")]
    Rejected(u16),
}

/// Outbound booking notifications. Implementations must not assume they run
/// inside the booking request; failures are logged by the caller and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError>;

    async fn send_admin_notification(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    booking: &'a Booking,
    professional: &'a Professional,
}

/// Posts booking payloads to the mail relay service, which renders and sends the emails.
pub struct MailRelayNotifier {
    client: reqwest::Client,
    base_url: String,
}

impl MailRelayNotifier {
    pub fn new(base_url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post(
        &self,
        path: &str,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&RelayPayload {
                booking,
                professional,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for MailRelayNotifier {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError> {
        self.post("/api/email/booking-confirmation", booking, professional)
            .await
    }

    async fn send_admin_notification(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError> {
        self.post("/api/email/admin-notification", booking, professional)
            .await
    }
}

/// Used when no relay is configured: records the notification in the log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_booking_confirmation(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError> {
        log::info!(
            "Mail relay disabled; confirmation for {} with {} on {} {} not sent",
            booking.client_email,
            professional.name,
            booking.date,
            booking.start_time.format("%H:%M")
        );
        Ok(())
    }

    async fn send_admin_notification(
        &self,
        booking: &Booking,
        professional: &Professional,
    ) -> Result<(), NotifyError> {
        log::info!(
            "Mail relay disabled; admin notice for booking {} ({}) not sent",
            booking.id,
            professional.name
        );
        Ok(())
    }
}

/// Fires both notifications in the background. Must only be called after the
/// booking row has been committed.
pub fn dispatch_booking_notifications(
    notifier: Arc<dyn Notifier>,
    booking: Booking,
    professional: Professional,
) {
    let booking = Arc::new(booking);
    let professional = Arc::new(professional);

    {
        let notifier = notifier.clone();
        let booking = booking.clone();
        let professional = professional.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier
                .send_booking_confirmation(&booking, &professional)
                .await
            {
                log::warn!("Client confirmation for booking {} failed: {err}", booking.id);
            }
        });
    }

    tokio::spawn(async move {
        if let Err(err) = notifier
            .send_admin_notification(&booking, &professional)
            .await
        {
            log::warn!("Admin notification for booking {} failed: {err}", booking.id);
        }
    });
}
