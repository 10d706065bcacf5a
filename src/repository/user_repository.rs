use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{CreateUserRequest, User, UserRole, UserStatus},
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    full_name: String,
    role: String,
    status: String,
    verified: i32,
    accepting_bookings: i32,
    hourly_rate: Option<i64>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            full_name: row.full_name,
            role: Self::parse_role(&row.role)?,
            status: Self::parse_status(&row.status)?,
            verified: row.verified != 0,
            accepting_bookings: row.accepting_bookings != 0,
            hourly_rate: row.hourly_rate,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_role(s: &str) -> Result<UserRole> {
        match s {
            "Client" => Ok(UserRole::Client),
            "Provider" => Ok(UserRole::Provider),
            _ => Err(AppError::Database(format!("Invalid user role: {}", s))),
        }
    }

    fn role_to_str(role: &UserRole) -> &'static str {
        match role {
            UserRole::Client => "Client",
            UserRole::Provider => "Provider",
        }
    }

    fn parse_status(s: &str) -> Result<UserStatus> {
        match s {
            "Active" => Ok(UserStatus::Active),
            "Suspended" => Ok(UserStatus::Suspended),
            _ => Err(AppError::Database(format!("Invalid user status: {}", s))),
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let role_str = Self::role_to_str(&user.role);
        let verified_int = if user.verified { 1i32 } else { 0i32 };
        let accepting_int = if user.accepting_bookings { 1i32 } else { 0i32 };
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO users (
                id, full_name, role, status, verified,
                accepting_bookings, hourly_rate, created_at, updated_at
            ) VALUES (?, ?, ?, 'Active', ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id_str)
        .bind(&user.full_name)
        .bind(role_str)
        .bind(verified_int)
        .bind(accepting_int)
        .bind(user.hourly_rate)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let id_str = id.to_string();
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, full_name, role, status, verified,
                   accepting_bookings, hourly_rate, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id_str)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_user(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, full_name, role, status, verified,
                   accepting_bookings, hourly_rate, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_user).collect()
    }
}
