pub mod booking;
pub mod escrow;
pub mod user;
pub mod wallet;

pub use booking::*;
pub use escrow::*;
pub use user::*;
pub use wallet::*;
