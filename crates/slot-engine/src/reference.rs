//! Human-shareable booking references.

use std::collections::HashSet;

use rand::Rng;

/// Letters and digits that survive being read aloud or copied by hand
/// (no `0`/`O`, `1`/`I`/`L`).
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const PREFIX: &str = "BK-";
pub const MIN_REFERENCE_LEN: usize = 6;

/// Generates random references such as `BK-7KQ2MZP9XA`.
///
/// A single generator never repeats a reference it has issued; uniqueness
/// against previously stored slots is enforced by the store.
#[derive(Debug)]
pub struct BookingReferences {
    length: usize,
    issued: HashSet<String>,
}

impl BookingReferences {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(MIN_REFERENCE_LEN),
            issued: HashSet::new(),
        }
    }

    pub fn next_reference(&mut self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let body: String = (0..self.length)
                .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
                .collect();
            let reference = format!("{}{}", PREFIX, body);
            if self.issued.insert(reference.clone()) {
                return reference;
            }
        }
    }
}
