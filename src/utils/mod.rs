use rand::{distributions::Alphanumeric, Rng};

pub mod serde_hex_bytes;

pub fn generate_random_ascii_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Request ids travel on every message so that log lines on both sides of a
/// connection can be correlated.
pub fn generate_request_id() -> String {
    generate_random_ascii_string(16)
}
