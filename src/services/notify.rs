//! Notification persistence and transactional email. Both are best-effort
//! collaborators: failures are logged and swallowed, never propagated into
//! the booking/payment flow that triggered them. Callers invoke these only
//! after their own transaction has committed.

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use uuid::Uuid;

use crate::config::MailConfig;
use crate::entities::notification::{self, Severity};
use crate::entities::user;

/// Persist a notification for the user addressed by `email`. Unknown
/// recipients and storage failures are logged and ignored.
pub async fn notify_user(
    db: &DatabaseConnection,
    email: &str,
    title: &str,
    message: &str,
    severity: Severity,
) {
    if email.is_empty() {
        return;
    }

    let outcome = async {
        let Some(recipient) = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
        else {
            return Ok::<_, sea_orm::DbErr>(());
        };

        notification::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(recipient.id),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            severity: Set(severity),
            read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => tracing::debug!("notification for {}: {}", email, title),
        Err(e) => tracing::warn!("failed to store notification for {}: {}", email, e),
    }
}

/// Fire-and-forget transactional mail over a configurable HTTP relay.
/// Unconfigured in development; sends are spawned so callers never wait.
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn send(&self, to: &str, subject: &str, body: &str) {
        let Some(url) = self.config.relay_url.clone() else {
            tracing::debug!("mail relay not configured, skipping mail to {}", to);
            return;
        };

        let http = self.http.clone();
        let api_key = self.config.relay_api_key.clone();
        let payload = json!({
            "from": self.config.from_address,
            "to": to,
            "subject": subject,
            "text": body,
        });
        let to = to.to_string();

        tokio::spawn(async move {
            let mut request = http.post(&url).json(&payload);
            if let Some(key) = api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!("mail sent to {}", to);
                }
                Ok(resp) => {
                    tracing::warn!("mail relay returned {} for {}", resp.status(), to);
                }
                Err(e) => {
                    tracing::warn!("failed to send mail to {}: {}", to, e);
                }
            }
        });
    }

    pub fn send_booking_request_alert(
        &self,
        to: &str,
        driver_name: &str,
        passenger_name: &str,
        source: &str,
        destination: &str,
    ) {
        let subject = format!("New ride request: {} to {}", source, destination);
        let body = format!(
            "Hello {},\n\n{} requested seats on your ride from {} to {}.\n\
             Please accept or reject the request from your dashboard.\n",
            driver_name, passenger_name, source, destination
        );
        self.send(to, &subject, &body);
    }

    pub fn send_booking_confirmation(
        &self,
        to: &str,
        name: &str,
        source: &str,
        destination: &str,
        amount: f64,
    ) {
        let subject = format!("Ride confirmed: {} to {}", source, destination);
        let body = format!(
            "Hello {},\n\nYour ride has been confirmed!\n\
             Route: {} -> {}\nAmount paid: {:.2}\n\nHave a safe journey!\n",
            name, source, destination, amount
        );
        self.send(to, &subject, &body);
    }

    pub fn send_ride_cancellation(&self, to: &str, name: &str, source: &str, destination: &str) {
        let subject = "Ride cancelled".to_string();
        let body = format!(
            "Hello {},\n\nWe regret to inform you that your ride from {} to {} \
             has been cancelled.\nIf you have paid, a refund has been initiated.\n",
            name, source, destination
        );
        self.send(to, &subject, &body);
    }
}
