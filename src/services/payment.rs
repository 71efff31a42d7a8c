use hmac::{Hmac, Mac};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::notification::Severity;
use crate::entities::payment::{self, PaymentStatus};
use crate::entities::ride;
use crate::entities::user::{self, UserRole};
use crate::error::{AppError, AppResult};
use crate::services::notify;
use crate::AppState;

/// Closed set of payment providers, selected by the tag persisted
/// alongside each payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Razorpay,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Razorpay => "razorpay",
            ProviderKind::Mock => "mock",
        }
    }

    /// Unknown or missing tags fall back to the mock provider, matching
    /// its role as the always-available secondary.
    pub fn parse(tag: &str) -> Self {
        if tag.eq_ignore_ascii_case("razorpay") {
            ProviderKind::Razorpay
        } else {
            ProviderKind::Mock
        }
    }
}

/// Provider order handle returned from initiation; the client completes
/// the flow against the named provider and posts the result back.
#[derive(Debug, Clone, Serialize)]
pub struct OrderHandle {
    pub order_ref: String,
    /// Amount in minor currency units (paise).
    pub amount_minor: i64,
    pub provider: String,
    /// Public key id the client needs to open the Razorpay widget.
    pub key_id: Option<String>,
}

/// Payment provider gateway: Razorpay when configured, with the mock
/// provider as the always-succeeding fallback.
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl PaymentGateway {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Taxed total for a base fare: GST plus the platform fee surcharge,
    /// rounded to two decimals.
    pub fn taxed_total(&self, base: f64) -> f64 {
        round2(base * (1.0 + self.config.gst_rate + self.config.platform_fee_rate))
    }

    pub async fn create_order(&self, amount: f64, booking_id: Uuid) -> OrderHandle {
        if self.razorpay_keys().is_some() {
            match self.razorpay_create_order(amount, booking_id).await {
                Ok(handle) => return handle,
                Err(e) => {
                    tracing::warn!(
                        "Razorpay order failed for booking {}, falling back to mock: {}",
                        booking_id,
                        e
                    );
                }
            }
        }

        self.mock_create_order(amount)
    }

    pub fn verify(&self, provider: ProviderKind, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        match provider {
            ProviderKind::Mock => true,
            ProviderKind::Razorpay => match self.razorpay_keys() {
                Some((_, secret)) => {
                    verify_razorpay_signature(secret, order_ref, payment_ref, signature)
                }
                None => {
                    tracing::warn!("Razorpay verification requested without configured keys");
                    false
                }
            },
        }
    }

    fn razorpay_keys(&self) -> Option<(&str, &str)> {
        match (&self.config.razorpay_key_id, &self.config.razorpay_key_secret) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }

    async fn razorpay_create_order(
        &self,
        amount: f64,
        booking_id: Uuid,
    ) -> Result<OrderHandle, String> {
        let (key_id, secret) = self.razorpay_keys().ok_or("Razorpay keys not configured")?;
        let amount_minor = to_minor_units(amount);

        let response = self
            .http
            .post("https://api.razorpay.com/v1/orders")
            .basic_auth(key_id, Some(secret))
            .json(&serde_json::json!({
                "amount": amount_minor,
                "currency": "INR",
                "receipt": format!("txn_{}", booking_id),
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("provider returned {}", response.status()));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        let order_id = body["id"]
            .as_str()
            .ok_or("order id missing from provider response")?;

        Ok(OrderHandle {
            order_ref: order_id.to_string(),
            amount_minor,
            provider: ProviderKind::Razorpay.as_str().to_string(),
            key_id: Some(key_id.to_string()),
        })
    }

    fn mock_create_order(&self, amount: f64) -> OrderHandle {
        let suffix = Uuid::new_v4().simple().to_string();
        OrderHandle {
            order_ref: format!("order_mock_{}", &suffix[..8]),
            amount_minor: to_minor_units(amount),
            provider: ProviderKind::Mock.as_str().to_string(),
            key_id: None,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Razorpay signs `order_id|payment_id` with HMAC-SHA256 over the key
/// secret and sends the hex digest back.
pub fn verify_razorpay_signature(
    secret: &str,
    order_ref: &str,
    payment_ref: &str,
    signature: &str,
) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(format!("{}|{}", order_ref, payment_ref).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    expected.eq_ignore_ascii_case(signature)
}

#[cfg(test)]
pub(crate) fn sign_razorpay(secret: &str, order_ref: &str, payment_ref: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(format!("{}|{}", order_ref, payment_ref).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// ---- Orchestration against bookings ----

/// Start payment for an accepted booking. Only the booking's passenger may
/// initiate, and only while the booking awaits payment.
pub async fn initiate_payment(
    state: &AppState,
    passenger_id: Uuid,
    booking_id: Uuid,
) -> AppResult<OrderHandle> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.passenger_id != passenger_id {
        return Err(AppError::Forbidden(
            "You can only pay for your own bookings".to_string(),
        ));
    }

    if booking.status != BookingStatus::PendingPayment {
        return Err(AppError::InvalidState(
            "Booking is not awaiting payment".to_string(),
        ));
    }

    let ride = ride::Entity::find_by_id(booking.ride_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    let base = ride.price_per_seat * booking.seats as f64;
    let total = state.payments.taxed_total(base);

    Ok(state.payments.create_order(total, booking.id).await)
}

/// Verify a provider callback and bind the payment to the booking. The
/// payment insert and the booking confirmation commit together;
/// notifications go out only after the transaction lands. Replaying an
/// already-processed callback returns the stored payment unchanged.
pub async fn complete_payment(
    state: &AppState,
    passenger_id: Uuid,
    booking_id: Uuid,
    order_ref: &str,
    payment_ref: &str,
    signature: &str,
    provider_tag: &str,
) -> AppResult<payment::Model> {
    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

    if booking.passenger_id != passenger_id {
        return Err(AppError::Forbidden(
            "You can only pay for your own bookings".to_string(),
        ));
    }

    if booking.status == BookingStatus::Confirmed {
        let existing = payment::Entity::find()
            .filter(payment::Column::BookingId.eq(booking.id))
            .one(&state.db)
            .await?;
        if let Some(existing) = existing {
            if existing.order_ref == order_ref {
                return Ok(existing);
            }
        }
        return Err(AppError::InvalidState(
            "Booking is already confirmed".to_string(),
        ));
    }

    if booking.status != BookingStatus::PendingPayment {
        return Err(AppError::InvalidState(
            "Booking is not awaiting payment".to_string(),
        ));
    }

    let provider = ProviderKind::parse(provider_tag);
    if !state.payments.verify(provider, order_ref, payment_ref, signature) {
        return Err(AppError::InvalidPaymentSignature(
            "Payment signature verification failed".to_string(),
        ));
    }

    let ride = ride::Entity::find_by_id(booking.ride_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ride not found".to_string()))?;

    let base = ride.price_per_seat * booking.seats as f64;
    let total = state.payments.taxed_total(base);

    let txn = state.db.begin().await?;

    let paid = payment::ActiveModel {
        id: Set(Uuid::new_v4()),
        booking_id: Set(booking.id),
        amount: Set(total),
        provider: Set(provider.as_str().to_string()),
        order_ref: Set(order_ref.to_string()),
        payment_ref: Set(payment_ref.to_string()),
        status: Set(PaymentStatus::Success),
        created_at: Set(chrono::Utc::now().into()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut active: booking::ActiveModel = booking.clone().into();
    active.status = Set(BookingStatus::Confirmed);
    active.update(&txn).await?;

    txn.commit().await?;

    let passenger = user::Entity::find_by_id(booking.passenger_id)
        .one(&state.db)
        .await?;
    let driver = user::Entity::find_by_id(ride.driver_id).one(&state.db).await?;

    if let (Some(passenger), Some(driver)) = (passenger, driver) {
        notify::notify_user(
            &state.db,
            &driver.email,
            "New Booking!",
            &format!("{} booked {} seat(s).", passenger.name, booking.seats),
            Severity::Success,
        )
        .await;
        notify::notify_user(
            &state.db,
            &passenger.email,
            "Booking Confirmed",
            &format!("Your ride to {} is confirmed.", ride.destination),
            Severity::Success,
        )
        .await;
        state.mailer.send_booking_confirmation(
            &passenger.email,
            &passenger.name,
            &ride.source,
            &ride.destination,
            total,
        );
    }

    Ok(paid)
}

/// Refund the payment bound to a booking, if any. Settlement is simulated
/// by flipping the row to refunded; a booking with no successful payment
/// is a no-op, so the call is idempotent and safe to repeat.
pub async fn refund_booking(state: &AppState, booking_id: Uuid) -> AppResult<()> {
    let Some(paid) = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(booking_id))
        .one(&state.db)
        .await?
    else {
        return Ok(());
    };

    if paid.status != PaymentStatus::Success {
        return Ok(());
    }

    let amount = paid.amount;
    let mut active: payment::ActiveModel = paid.into();
    active.status = Set(PaymentStatus::Refunded);
    active.update(&state.db).await?;

    let booking = booking::Entity::find_by_id(booking_id)
        .one(&state.db)
        .await?;
    if let Some(booking) = booking {
        if let Some(passenger) = user::Entity::find_by_id(booking.passenger_id)
            .one(&state.db)
            .await?
        {
            notify::notify_user(
                &state.db,
                &passenger.email,
                "Refund Processed",
                &format!("{:.2} has been refunded.", amount),
                Severity::Info,
            )
            .await;
        }
    }

    tracing::info!("refund processed for booking {}", booking_id);
    Ok(())
}

/// Payment history: passengers see payments they made, drivers see
/// payments received on their rides.
pub async fn payment_history(
    state: &AppState,
    requester: &user::Model,
) -> AppResult<Vec<payment::Model>> {
    let booking_ids: Vec<Uuid> = match requester.role {
        UserRole::Driver => {
            let ride_ids: Vec<Uuid> = ride::Entity::find()
                .filter(ride::Column::DriverId.eq(requester.id))
                .all(&state.db)
                .await?
                .into_iter()
                .map(|r| r.id)
                .collect();

            if ride_ids.is_empty() {
                return Ok(Vec::new());
            }

            booking::Entity::find()
                .filter(booking::Column::RideId.is_in(ride_ids))
                .all(&state.db)
                .await?
                .into_iter()
                .map(|b| b.id)
                .collect()
        }
        _ => booking::Entity::find()
            .filter(booking::Column::PassengerId.eq(requester.id))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|b| b.id)
            .collect(),
    };

    if booking_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(payment::Entity::find()
        .filter(payment::Column::BookingId.is_in(booking_ids))
        .all(&state.db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(PaymentConfig::default())
    }

    #[test]
    fn test_taxed_total_applies_surcharges() {
        // 5% GST + 2% platform fee on the base fare
        assert_eq!(gateway().taxed_total(1000.0), 1070.0);
        assert_eq!(gateway().taxed_total(333.0), 356.31);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(10.004), 10.0);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(1070.0), 107000);
        assert_eq!(to_minor_units(356.31), 35631);
    }

    #[test]
    fn test_signature_verification_round_trip() {
        let sig = sign_razorpay("secret", "order_1", "pay_1");
        assert!(verify_razorpay_signature("secret", "order_1", "pay_1", &sig));
        assert!(!verify_razorpay_signature("secret", "order_1", "pay_2", &sig));
        assert!(!verify_razorpay_signature("other", "order_1", "pay_1", &sig));
    }

    #[test]
    fn test_provider_tag_parsing() {
        assert_eq!(ProviderKind::parse("razorpay"), ProviderKind::Razorpay);
        assert_eq!(ProviderKind::parse("RAZORPAY"), ProviderKind::Razorpay);
        assert_eq!(ProviderKind::parse("mock"), ProviderKind::Mock);
        assert_eq!(ProviderKind::parse(""), ProviderKind::Mock);
    }
}
