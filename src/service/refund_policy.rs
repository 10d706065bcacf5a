/// Cancellation refunds are banded by how far ahead of the scheduled start
/// the cancellation lands. Whatever fraction is not refunded stays with the
/// platform; it is never released to the payee.
pub fn refund_percent(minutes_until_start: i64) -> i64 {
    if minutes_until_start > 48 * 60 {
        100
    } else if minutes_until_start >= 24 * 60 {
        75
    } else if minutes_until_start >= 12 * 60 {
        50
    } else if minutes_until_start >= 2 * 60 {
        25
    } else {
        0
    }
}

pub fn refund_amount(held_amount: i64, minutes_until_start: i64) -> i64 {
    held_amount * refund_percent(minutes_until_start) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_refund_beyond_two_days() {
        assert_eq!(refund_percent(50 * 60), 100);
        assert_eq!(refund_amount(100_000, 50 * 60), 100_000);
    }

    #[test]
    fn half_refund_within_a_day() {
        assert_eq!(refund_percent(20 * 60), 50);
        assert_eq!(refund_amount(100_000, 20 * 60), 50_000);
    }

    #[test]
    fn no_refund_at_the_last_minute() {
        assert_eq!(refund_percent(60), 0);
        assert_eq!(refund_amount(100_000, 60), 0);
        assert_eq!(refund_amount(100_000, -30), 0);
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(refund_percent(48 * 60 + 1), 100);
        assert_eq!(refund_percent(48 * 60), 75);
        assert_eq!(refund_percent(24 * 60), 75);
        assert_eq!(refund_percent(24 * 60 - 1), 50);
        assert_eq!(refund_percent(12 * 60), 50);
        assert_eq!(refund_percent(12 * 60 - 1), 25);
        assert_eq!(refund_percent(2 * 60), 25);
        assert_eq!(refund_percent(2 * 60 - 1), 0);
    }

    #[test]
    fn partial_amounts_round_down() {
        assert_eq!(refund_amount(99, 20 * 60), 49);
    }
}
