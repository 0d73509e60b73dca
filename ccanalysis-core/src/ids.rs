//! Record identifiers
//!
//! Ids look like `1760875200123-k3j9x0q2ab1`: the creation time in unix
//! milliseconds, a dash, and a random base-36 suffix. Uniqueness is
//! probabilistic.

use chrono::Utc;
use uuid::Uuid;

const SUFFIX_LEN: usize = 11;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a new record id
pub fn generate_id() -> String {
    format!("{}-{}", Utc::now().timestamp_millis(), random_suffix())
}

fn random_suffix() -> String {
    let mut n = Uuid::new_v4().as_u128() as u64;
    let mut out = String::with_capacity(SUFFIX_LEN);
    while out.len() < SUFFIX_LEN {
        out.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}
