//! Small pure helpers used across the engine.

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderNumber;

/// Generates a candidate order number: `ORD-nnnnnn-XXXXX`, the last six digits of the epoch-millisecond clock plus
/// five random alphanumeric characters.
///
/// This format is friendly to read out over the phone, but it is **not** unique by construction — uniqueness is
/// guaranteed by the UNIQUE constraint on `orders.order_number`, with the insert retrying on a collision.
pub fn generate_order_number() -> OrderNumber {
    let millis = Utc::now().timestamp_millis().unsigned_abs() % 1_000_000;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    OrderNumber(format!("ORD-{millis:06}-{suffix}"))
}

#[cfg(test)]
mod test {
    use super::generate_order_number;

    #[test]
    fn order_numbers_match_the_expected_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1].len(), 6);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 5);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
