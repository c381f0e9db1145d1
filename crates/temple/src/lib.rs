//! Temple services: pagoda light registrations and seva/puja bookings.

pub mod booking;
pub mod pagoda;

pub use booking::{
    Booking, BookingCancelled, BookingCommand, BookingCreated, BookingEvent, BookingId,
    BookingStatus, BookingStatusChanged, CancelBooking, ChangeBookingStatus, CreateBooking,
    PaymentRecorded, PaymentStatus, RecordPayment,
};
pub use pagoda::{
    CancelRegistration, CreateTower, DisplayStatus, LightRegistered, LightRegistration,
    PagodaCommand, PagodaEvent, PagodaTower, PagodaTowerId, RegisterLight, RegistrationCancelled,
    RegistrationId, RegistrationRenewed, RegistrationStatus, RenewRegistration, TowerCreated,
};
