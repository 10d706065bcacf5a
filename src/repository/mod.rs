use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{CreateUserRequest, User};
use crate::error::Result;

pub mod booking_store;
pub mod escrow_store;
pub mod user_repository;
pub mod wallet_store;

pub use booking_store::BookingStore;
pub use escrow_store::EscrowStore;
pub use user_repository::SqliteUserRepository;
pub use wallet_store::WalletStore;

/// The user directory. Registration and authentication live upstream; the
/// engine reads eligibility flags through this interface and the seeder
/// writes demo records through it.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>>;
}
