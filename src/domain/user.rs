use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal view of the user directory. Registration, authentication and
/// profile management live upstream; the engine only needs the flags that
/// gate booking eligibility plus the provider's rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub verified: bool,
    pub accepting_bookings: bool,
    pub hourly_rate: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "TEXT")]
pub enum UserRole {
    Client,
    Provider,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "TEXT")]
pub enum UserStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub role: UserRole,
    pub verified: bool,
    pub accepting_bookings: bool,
    pub hourly_rate: Option<i64>,
}
