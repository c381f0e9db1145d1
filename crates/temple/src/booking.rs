//! Seva and puja bookings with staged payments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use templeerp_core::{Aggregate, AggregateRoot, DomainError, TenantId};
use templeerp_events::Event;

templeerp_core::aggregate_id!(
    /// Booking identifier.
    BookingId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

impl PaymentStatus {
    pub fn of(amount: i64, paid: i64) -> Self {
        if paid <= 0 {
            PaymentStatus::Unpaid
        } else if paid < amount {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        }
    }
}

/// Aggregate root: Booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    id: BookingId,
    tenant_id: Option<TenantId>,
    booking_no: String,
    service_name: String,
    devotee_name: String,
    devotee_contact: Option<String>,
    booking_date: Option<NaiveDate>,
    slot: Option<String>,
    amount: i64,
    paid: i64,
    status: BookingStatus,
    version: u64,
    created: bool,
}

impl Booking {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BookingId) -> Self {
        Self {
            id,
            tenant_id: None,
            booking_no: String::new(),
            service_name: String::new(),
            devotee_name: String::new(),
            devotee_contact: None,
            booking_date: None,
            slot: None,
            amount: 0,
            paid: 0,
            status: BookingStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BookingId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn booking_no(&self) -> &str {
        &self.booking_no
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn devotee_name(&self) -> &str {
        &self.devotee_name
    }

    pub fn devotee_contact(&self) -> Option<&str> {
        self.devotee_contact.as_deref()
    }

    pub fn booking_date(&self) -> Option<NaiveDate> {
        self.booking_date
    }

    pub fn slot(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn paid(&self) -> i64 {
        self.paid
    }

    pub fn balance_due(&self) -> i64 {
        self.amount - self.paid
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::of(self.amount, self.paid)
    }
}

impl AggregateRoot for Booking {
    type Id = BookingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateBooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBooking {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub booking_no: String,
    pub service_name: String,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub booking_date: NaiveDate,
    pub slot: Option<String>,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command payload shared by ConfirmBooking and CompleteBooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBookingStatus {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelBooking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelBooking {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub amount: i64,
    pub payment_mode: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingCommand {
    CreateBooking(CreateBooking),
    ConfirmBooking(ChangeBookingStatus),
    CompleteBooking(ChangeBookingStatus),
    CancelBooking(CancelBooking),
    RecordPayment(RecordPayment),
}

/// Event: BookingCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCreated {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub booking_no: String,
    pub service_name: String,
    pub devotee_name: String,
    pub devotee_contact: Option<String>,
    pub booking_date: NaiveDate,
    pub slot: Option<String>,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload shared by BookingConfirmed and BookingCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatusChanged {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BookingCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCancelled {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub booking_id: BookingId,
    pub amount: i64,
    pub payment_mode: String,
    /// Cumulative paid amount after this payment.
    pub paid_total: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    BookingCreated(BookingCreated),
    BookingConfirmed(BookingStatusChanged),
    BookingCompleted(BookingStatusChanged),
    BookingCancelled(BookingCancelled),
    PaymentRecorded(PaymentRecorded),
}

impl BookingEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            BookingEvent::BookingCreated(e) => e.tenant_id,
            BookingEvent::BookingConfirmed(e) | BookingEvent::BookingCompleted(e) => e.tenant_id,
            BookingEvent::BookingCancelled(e) => e.tenant_id,
            BookingEvent::PaymentRecorded(e) => e.tenant_id,
        }
    }

    pub fn booking_id(&self) -> BookingId {
        match self {
            BookingEvent::BookingCreated(e) => e.booking_id,
            BookingEvent::BookingConfirmed(e) | BookingEvent::BookingCompleted(e) => e.booking_id,
            BookingEvent::BookingCancelled(e) => e.booking_id,
            BookingEvent::PaymentRecorded(e) => e.booking_id,
        }
    }
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "temple.booking.created",
            BookingEvent::BookingConfirmed(_) => "temple.booking.confirmed",
            BookingEvent::BookingCompleted(_) => "temple.booking.completed",
            BookingEvent::BookingCancelled(_) => "temple.booking.cancelled",
            BookingEvent::PaymentRecorded(_) => "temple.booking.payment_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::BookingCreated(e) => e.occurred_at,
            BookingEvent::BookingConfirmed(e) | BookingEvent::BookingCompleted(e) => e.occurred_at,
            BookingEvent::BookingCancelled(e) => e.occurred_at,
            BookingEvent::PaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Booking {
    type Command = BookingCommand;
    type Event = BookingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookingEvent::BookingCreated(e) => {
                self.id = e.booking_id;
                self.tenant_id = Some(e.tenant_id);
                self.booking_no = e.booking_no.clone();
                self.service_name = e.service_name.clone();
                self.devotee_name = e.devotee_name.clone();
                self.devotee_contact = e.devotee_contact.clone();
                self.booking_date = Some(e.booking_date);
                self.slot = e.slot.clone();
                self.amount = e.amount;
                self.status = BookingStatus::Pending;
                self.created = true;
            }
            BookingEvent::BookingConfirmed(_) => self.status = BookingStatus::Confirmed,
            BookingEvent::BookingCompleted(_) => self.status = BookingStatus::Completed,
            BookingEvent::BookingCancelled(_) => self.status = BookingStatus::Cancelled,
            BookingEvent::PaymentRecorded(e) => self.paid = e.paid_total,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BookingCommand::CreateBooking(cmd) => self.handle_create(cmd),
            BookingCommand::ConfirmBooking(cmd) => {
                self.ensure_existing(cmd.tenant_id, cmd.booking_id)?;
                if self.status != BookingStatus::Pending {
                    return Err(DomainError::invariant("only pending bookings can be confirmed"));
                }
                Ok(vec![BookingEvent::BookingConfirmed(BookingStatusChanged {
                    tenant_id: cmd.tenant_id,
                    booking_id: cmd.booking_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            BookingCommand::CompleteBooking(cmd) => {
                self.ensure_existing(cmd.tenant_id, cmd.booking_id)?;
                if self.status != BookingStatus::Confirmed {
                    return Err(DomainError::invariant("only confirmed bookings can be completed"));
                }
                Ok(vec![BookingEvent::BookingCompleted(BookingStatusChanged {
                    tenant_id: cmd.tenant_id,
                    booking_id: cmd.booking_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            BookingCommand::CancelBooking(cmd) => self.handle_cancel(cmd),
            BookingCommand::RecordPayment(cmd) => self.handle_payment(cmd),
        }
    }
}

impl Booking {
    fn ensure_existing(&self, tenant_id: TenantId, booking_id: BookingId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != booking_id {
            return Err(DomainError::invariant("booking_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateBooking) -> Result<Vec<BookingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("booking already exists"));
        }
        if cmd.booking_no.trim().is_empty() {
            return Err(DomainError::validation("booking number cannot be empty"));
        }
        if cmd.service_name.trim().is_empty() {
            return Err(DomainError::validation("service name cannot be empty"));
        }
        if cmd.devotee_name.trim().is_empty() {
            return Err(DomainError::validation("devotee name cannot be empty"));
        }
        if cmd.amount < 0 {
            return Err(DomainError::validation("amount cannot be negative"));
        }

        Ok(vec![BookingEvent::BookingCreated(BookingCreated {
            tenant_id: cmd.tenant_id,
            booking_id: cmd.booking_id,
            booking_no: cmd.booking_no.trim().to_string(),
            service_name: cmd.service_name.trim().to_string(),
            devotee_name: cmd.devotee_name.trim().to_string(),
            devotee_contact: cmd.devotee_contact.clone(),
            booking_date: cmd.booking_date,
            slot: cmd.slot.clone(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelBooking) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.booking_id)?;

        if !matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(DomainError::invariant(
                "completed or cancelled bookings cannot be cancelled",
            ));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![BookingEvent::BookingCancelled(BookingCancelled {
            tenant_id: cmd.tenant_id,
            booking_id: cmd.booking_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment(&self, cmd: &RecordPayment) -> Result<Vec<BookingEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.booking_id)?;

        if self.status == BookingStatus::Cancelled {
            return Err(DomainError::invariant("cannot take payment for a cancelled booking"));
        }
        if cmd.amount <= 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if cmd.amount > self.balance_due() {
            return Err(DomainError::invariant(format!(
                "payment exceeds the balance due ({})",
                templeerp_core::format_amount(self.balance_due() as i128)
            )));
        }

        Ok(vec![BookingEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            booking_id: cmd.booking_id,
            amount: cmd.amount,
            payment_mode: cmd.payment_mode.trim().to_string(),
            paid_total: self.paid + cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use templeerp_events::execute;

    fn booking(amount: i64) -> (TenantId, BookingId, Booking) {
        let tenant_id = TenantId::new();
        let booking_id = BookingId::generate();
        let mut b = Booking::empty(booking_id);
        execute(
            &mut b,
            &BookingCommand::CreateBooking(CreateBooking {
                tenant_id,
                booking_id,
                booking_no: "BK-0001".to_string(),
                service_name: "Archana".to_string(),
                devotee_name: "Lakshmi".to_string(),
                devotee_contact: None,
                booking_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                slot: Some("06:00".to_string()),
                amount,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (tenant_id, booking_id, b)
    }

    fn pay(b: &mut Booking, tenant_id: TenantId, booking_id: BookingId, amount: i64) -> Result<Vec<BookingEvent>, DomainError> {
        execute(
            b,
            &BookingCommand::RecordPayment(RecordPayment {
                tenant_id,
                booking_id,
                amount,
                payment_mode: "cash".to_string(),
                occurred_at: Utc::now(),
            }),
        )
    }

    fn status(tenant_id: TenantId, booking_id: BookingId) -> ChangeBookingStatus {
        ChangeBookingStatus { tenant_id, booking_id, occurred_at: Utc::now() }
    }

    #[test]
    fn payments_move_through_partial_to_paid() {
        let (tenant_id, booking_id, mut b) = booking(5_000);
        assert_eq!(b.payment_status(), PaymentStatus::Unpaid);

        pay(&mut b, tenant_id, booking_id, 2_000).unwrap();
        assert_eq!(b.payment_status(), PaymentStatus::Partial);

        let err = pay(&mut b, tenant_id, booking_id, 3_001).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        pay(&mut b, tenant_id, booking_id, 3_000).unwrap();
        assert_eq!(b.payment_status(), PaymentStatus::Paid);
        assert_eq!(b.balance_due(), 0);
    }

    #[test]
    fn lifecycle_and_cancellation_rules() {
        let (tenant_id, booking_id, mut b) = booking(1_000);
        assert!(b.handle(&BookingCommand::CompleteBooking(status(tenant_id, booking_id))).is_err());

        execute(&mut b, &BookingCommand::ConfirmBooking(status(tenant_id, booking_id))).unwrap();
        execute(&mut b, &BookingCommand::CompleteBooking(status(tenant_id, booking_id))).unwrap();
        assert_eq!(b.status(), BookingStatus::Completed);

        let cancel = BookingCommand::CancelBooking(CancelBooking {
            tenant_id,
            booking_id,
            reason: "rain".to_string(),
            occurred_at: Utc::now(),
        });
        assert!(b.handle(&cancel).is_err());
    }

    #[test]
    fn cancelled_bookings_take_no_payment() {
        let (tenant_id, booking_id, mut b) = booking(1_000);
        execute(
            &mut b,
            &BookingCommand::CancelBooking(CancelBooking {
                tenant_id,
                booking_id,
                reason: "devotee unwell".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(pay(&mut b, tenant_id, booking_id, 100).is_err());
    }

    proptest! {
        /// Cumulative payments never exceed the booking amount.
        #[test]
        fn paid_never_exceeds_amount(amount in 0i64..100_000, payments in prop::collection::vec(-10i64..50_000, 0..20)) {
            let (tenant_id, booking_id, mut b) = booking(amount);
            for p in payments {
                let _ = pay(&mut b, tenant_id, booking_id, p);
                prop_assert!(b.paid() <= b.amount());
                prop_assert!(b.paid() >= 0);
            }
        }
    }
}
