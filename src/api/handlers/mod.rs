pub mod bookings;
pub mod escrows;
pub mod root;
pub mod wallet;
pub mod webhooks;
