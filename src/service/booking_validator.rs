use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::{
    config::BookingPolicyConfig,
    domain::{Booking, User, UserRole, UserStatus},
    error::{AppError, Result},
};

/// Pure precondition checks run before a booking is created or rescheduled.
/// The caller loads everything (users, the payee's day, the requester's
/// counters); validation itself touches nothing and returns the first
/// failing rule as `AppError::Validation` with a reason fit to show the
/// end user verbatim.
pub struct BookingValidator {
    policy: BookingPolicyConfig,
}

impl BookingValidator {
    pub fn new(policy: BookingPolicyConfig) -> Self {
        Self { policy }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &self,
        requester: &User,
        payee: &User,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        now: DateTime<Utc>,
        payee_day: &[Booking],
        requester_active_today: i64,
        requester_pending: i64,
        exclude_booking: Option<Uuid>,
    ) -> Result<()> {
        if requester.role != UserRole::Client {
            return Err(AppError::Validation(
                "Only clients can request bookings".to_string(),
            ));
        }
        if requester.status != UserStatus::Active || !requester.verified {
            return Err(AppError::Validation(
                "Your account must be active and verified to book".to_string(),
            ));
        }

        if payee.role != UserRole::Provider {
            return Err(AppError::Validation(
                "The selected user is not a provider".to_string(),
            ));
        }
        if payee.status != UserStatus::Active || !payee.verified {
            return Err(AppError::Validation(
                "This provider is not currently available".to_string(),
            ));
        }
        if !payee.accepting_bookings {
            return Err(AppError::Validation(
                "This provider is not accepting bookings".to_string(),
            ));
        }
        if payee.hourly_rate.is_none() {
            return Err(AppError::Validation(
                "This provider has not published a rate".to_string(),
            ));
        }

        if end <= start {
            return Err(AppError::Validation(
                "End time must be after start time".to_string(),
            ));
        }

        let duration_minutes = (end - start).num_minutes();
        if duration_minutes < self.policy.min_duration_minutes {
            return Err(AppError::Validation(format!(
                "Bookings must be at least {} minutes",
                self.policy.min_duration_minutes
            )));
        }
        if duration_minutes > self.policy.max_duration_minutes {
            return Err(AppError::Validation(format!(
                "Bookings may not exceed {} minutes",
                self.policy.max_duration_minutes
            )));
        }

        let open = NaiveTime::from_hms_opt(self.policy.open_hour, 0, 0)
            .ok_or_else(|| AppError::Internal("Invalid operating hours".to_string()))?;
        let close = NaiveTime::from_hms_opt(self.policy.close_hour, 0, 0)
            .ok_or_else(|| AppError::Internal("Invalid operating hours".to_string()))?;
        if start < open || end > close {
            return Err(AppError::Validation(format!(
                "Bookings must fall between {:02}:00 and {:02}:00",
                self.policy.open_hour, self.policy.close_hour
            )));
        }

        if date.and_time(start) <= now.naive_utc() {
            return Err(AppError::Validation(
                "Booking must be scheduled in the future".to_string(),
            ));
        }
        if date > now.date_naive() + Duration::days(self.policy.horizon_days) {
            return Err(AppError::Validation(format!(
                "Bookings may be made at most {} days in advance",
                self.policy.horizon_days
            )));
        }

        if requester_active_today >= self.policy.max_active_per_day {
            return Err(AppError::Validation(format!(
                "You already have {} bookings that day",
                requester_active_today
            )));
        }
        if requester_pending >= self.policy.max_pending {
            return Err(AppError::Validation(
                "Too many pending bookings; confirm or cancel some first".to_string(),
            ));
        }

        let mut committed_minutes = 0i64;
        for existing in payee_day {
            if exclude_booking == Some(existing.id) {
                continue;
            }
            if existing.overlaps(start, end) {
                return Err(AppError::Validation(format!(
                    "The provider already has a booking from {} to {}",
                    existing.start_time.format("%H:%M"),
                    existing.end_time.format("%H:%M")
                )));
            }
            committed_minutes += existing.duration_minutes;
        }
        if committed_minutes + duration_minutes > self.policy.daily_capacity_minutes {
            return Err(AppError::Validation(
                "The provider has no remaining capacity on that date".to_string(),
            ));
        }

        Ok(())
    }
}
