use chrono::Utc;
use rand::Rng;

/// Longest ticket number the schema accepts
pub const MAX_TICKET_NUMBER_LEN: usize = 11;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Source of ticket numbers. Swappable so collisions can be exercised in tests.
pub trait TicketNumberSource: Send + Sync {
    fn next_number(&self) -> String;
}

/// Millisecond timestamp in base 36 followed by four random base-36 digits.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampNumbers;

impl TicketNumberSource for TimestampNumbers {
    fn next_number(&self) -> String {
        generate_ticket_number(Utc::now().timestamp_millis().max(0) as u64, &mut rand::thread_rng())
    }
}

/// Upper-case base-36 rendering of `value`
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

pub fn generate_ticket_number(millis: u64, rng: &mut impl Rng) -> String {
    let mut number = to_base36(millis);
    for _ in 0..4 {
        number.push(char::from(BASE36[rng.gen_range(0..36)]));
    }
    number.truncate(MAX_TICKET_NUMBER_LEN);
    number
}
