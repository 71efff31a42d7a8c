mod common;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use rideshare_backend::entities::booking::{self, BookingStatus};
use rideshare_backend::entities::payment::{self, PaymentStatus};
use rideshare_backend::entities::ride::{self, RideStatus};
use rideshare_backend::entities::user::UserRole;
use rideshare_backend::error::AppError;
use rideshare_backend::services::booking::{self as booking_service, CancelActor};
use rideshare_backend::services::payment::{self as payment_service};
use rideshare_backend::services::ride::{self as ride_service, RideCancelActor};
use rideshare_backend::AppState;

use common::{create_user, RideFixture};

async fn accepted_booking(
    state: &AppState,
    driver_id: uuid::Uuid,
    passenger_id: uuid::Uuid,
    ride_id: uuid::Uuid,
    seats: i32,
) -> booking::Model {
    let b = booking_service::request_booking(state, passenger_id, ride_id, seats)
        .await
        .unwrap();
    booking_service::accept_booking(state, driver_id, b.id).await.unwrap()
}

async fn pay(state: &AppState, passenger_id: uuid::Uuid, booking_id: uuid::Uuid) -> payment::Model {
    let order = payment_service::initiate_payment(state, passenger_id, booking_id)
        .await
        .unwrap();
    payment_service::complete_payment(
        state,
        passenger_id,
        booking_id,
        &order.order_ref,
        "pay_test_1",
        "sig",
        &order.provider,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn payment_confirms_booking_with_taxed_total() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 2).await;

    let order = payment_service::initiate_payment(&state, alice.id, b.id)
        .await
        .unwrap();
    // 200 * 2 seats * 1.07 = 428, in paise
    assert_eq!(order.provider, "mock");
    assert_eq!(order.amount_minor, 42800);

    let paid = payment_service::complete_payment(
        &state,
        alice.id,
        b.id,
        &order.order_ref,
        "pay_test_1",
        "sig",
        &order.provider,
    )
    .await
    .unwrap();

    assert_eq!(paid.amount, 428.0);
    assert_eq!(paid.status, PaymentStatus::Success);

    let confirmed = booking::Entity::find_by_id(b.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn initiate_requires_the_payment_window() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = booking_service::request_booking(&state, alice.id, posted.id, 1)
        .await
        .unwrap();

    // Still pending approval
    let err = payment_service::initiate_payment(&state, alice.id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    booking_service::accept_booking(&state, driver.id, b.id).await.unwrap();

    // Only the booking's passenger may initiate
    let mallory = create_user(&state, "mallory", UserRole::Passenger, true).await;
    let err = payment_service::initiate_payment(&state, mallory.id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn bad_razorpay_signature_leaves_booking_unpaid() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 1).await;

    let err = payment_service::complete_payment(
        &state,
        alice.id,
        b.id,
        "order_x",
        "pay_x",
        "forged",
        "razorpay",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidPaymentSignature(_)));

    let untouched = booking::Entity::find_by_id(b.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.status, BookingStatus::PendingPayment);
    assert!(payment::Entity::find()
        .filter(payment::Column::BookingId.eq(b.id))
        .one(&state.db)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn replaying_a_verified_callback_is_a_noop() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 1).await;

    let order = payment_service::initiate_payment(&state, alice.id, b.id)
        .await
        .unwrap();
    let first = payment_service::complete_payment(
        &state,
        alice.id,
        b.id,
        &order.order_ref,
        "pay_test_1",
        "sig",
        &order.provider,
    )
    .await
    .unwrap();

    let replay = payment_service::complete_payment(
        &state,
        alice.id,
        b.id,
        &order.order_ref,
        "pay_test_1",
        "sig",
        &order.provider,
    )
    .await
    .unwrap();
    assert_eq!(replay.id, first.id);

    // A different order against a confirmed booking is refused
    let err = payment_service::complete_payment(
        &state,
        alice.id,
        b.id,
        "order_other",
        "pay_2",
        "sig",
        "mock",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let rows = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(b.id))
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn cancelling_a_paid_booking_refunds_and_restores_seats() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 2).await;
    pay(&state, alice.id, b.id).await;

    booking_service::cancel_booking(&state, CancelActor::Passenger(alice.id), b.id, None)
        .await
        .unwrap();

    let cancelled = booking::Entity::find_by_id(b.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let refunded = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(b.id))
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    let reopened = ride::Entity::find_by_id(posted.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reopened.available_seats, 4);
}

#[tokio::test]
async fn refund_is_idempotent() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 1).await;
    pay(&state, alice.id, b.id).await;

    payment_service::refund_booking(&state, b.id).await.unwrap();
    payment_service::refund_booking(&state, b.id).await.unwrap();

    let rows = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(b.id))
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, PaymentStatus::Refunded);

    // Refunding a booking that never paid is a silent no-op
    let unpaid = booking_service::request_booking(
        &state,
        create_user(&state, "bob", UserRole::Passenger, true).await.id,
        posted.id,
        1,
    )
    .await
    .unwrap();
    payment_service::refund_booking(&state, unpaid.id).await.unwrap();
}

#[tokio::test]
async fn driver_cancellation_cascades_with_refunds() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;
    let bob = create_user(&state, "bob", UserRole::Passenger, true).await;
    let carol = create_user(&state, "carol", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 8)
        .insert(&state)
        .await;

    let paid_booking = accepted_booking(&state, driver.id, alice.id, posted.id, 2).await;
    pay(&state, alice.id, paid_booking.id).await;
    let pending_1 = booking_service::request_booking(&state, bob.id, posted.id, 1)
        .await
        .unwrap();
    let pending_2 = booking_service::request_booking(&state, carol.id, posted.id, 1)
        .await
        .unwrap();

    ride_service::cancel_ride(
        &state,
        RideCancelActor::Driver(driver.id),
        posted.id,
        "vehicle breakdown".to_string(),
    )
    .await
    .unwrap();

    let cancelled_ride = ride::Entity::find_by_id(posted.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled_ride.status, RideStatus::Cancelled);
    assert_eq!(
        cancelled_ride.cancellation_reason.as_deref(),
        Some("vehicle breakdown")
    );
    // Every reservation was released
    assert_eq!(cancelled_ride.available_seats, cancelled_ride.total_seats);

    for id in [paid_booking.id, pending_1.id, pending_2.id] {
        let b = booking::Entity::find_by_id(id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.status, BookingStatus::CancelledByDriver);
    }

    let refunded = payment::Entity::find()
        .filter(payment::Column::BookingId.eq(paid_booking.id))
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn admin_force_cancel_uses_admin_statuses() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = booking_service::request_booking(&state, alice.id, posted.id, 1)
        .await
        .unwrap();

    ride_service::cancel_ride(
        &state,
        RideCancelActor::Admin,
        posted.id,
        "policy violation".to_string(),
    )
    .await
    .unwrap();

    let cancelled_ride = ride::Entity::find_by_id(posted.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cancelled_ride.status, RideStatus::CancelledByAdmin);

    let cascaded = booking::Entity::find_by_id(b.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cascaded.status, BookingStatus::CancelledByAdmin);
}

#[tokio::test]
async fn onboarding_consumes_the_code_and_completion_closes_out() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 1).await;
    let code = b.onboarding_code.clone().expect("code issued");

    // Onboarding requires a confirmed (paid) booking
    let err = booking_service::verify_onboarding(&state, driver.id, b.id, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    pay(&state, alice.id, b.id).await;

    let err = booking_service::verify_onboarding(&state, driver.id, b.id, "000000x")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let onboarded = booking_service::verify_onboarding(&state, driver.id, b.id, &code)
        .await
        .unwrap();
    assert_eq!(onboarded.status, BookingStatus::Onboarded);
    assert!(onboarded.onboarding_code.is_none());

    ride_service::start_ride(&state, driver.id, posted.id).await.unwrap();
    ride_service::complete_ride(&state, driver.id, posted.id).await.unwrap();

    let closed = booking::Entity::find_by_id(b.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closed.status, BookingStatus::Completed);

    // Completion consumed the seats: nothing was released
    let done = ride::Entity::find_by_id(posted.id)
        .one(&state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, RideStatus::Completed);
    assert_eq!(done.available_seats, 3);
}

#[tokio::test]
async fn history_splits_by_role() {
    let state = common::setup().await;
    let driver = create_user(&state, "driver", UserRole::Driver, true).await;
    let alice = create_user(&state, "alice", UserRole::Passenger, true).await;
    let bob = create_user(&state, "bob", UserRole::Passenger, true).await;

    let posted = RideFixture::new(driver.id, "Chennai", "Bangalore", 4)
        .insert(&state)
        .await;
    let b = accepted_booking(&state, driver.id, alice.id, posted.id, 1).await;
    pay(&state, alice.id, b.id).await;

    let made = payment_service::payment_history(&state, &alice).await.unwrap();
    assert_eq!(made.len(), 1);

    let received = payment_service::payment_history(&state, &driver).await.unwrap();
    assert_eq!(received.len(), 1);

    let none = payment_service::payment_history(&state, &bob).await.unwrap();
    assert!(none.is_empty());
}
