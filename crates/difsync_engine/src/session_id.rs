//! Session id generation.

use difsync_protocol::{SESSION_ID_HEAD, SESSION_ID_LEN, SESSION_ID_TAIL};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of session ids.
///
/// One generator belongs to one session; tests inject a seeded or fixed
/// generator to make the wire output deterministic.
pub trait SessionIdGenerator: Send {
    /// Produces a new id.
    fn next_id(&mut self) -> String;
}

/// Random ids from the session id alphabet.
#[derive(Debug)]
pub struct RandomSessionIds {
    rng: StdRng,
}

impl RandomSessionIds {
    /// Creates a generator seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn pick(&mut self, alphabet: &[u8]) -> char {
        char::from(alphabet[self.rng.gen_range(0..alphabet.len())])
    }
}

impl Default for RandomSessionIds {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionIdGenerator for RandomSessionIds {
    fn next_id(&mut self) -> String {
        let head = SESSION_ID_HEAD.as_bytes();
        let tail = SESSION_ID_TAIL.as_bytes();
        let mut id = String::with_capacity(SESSION_ID_LEN);
        id.push(self.pick(head));
        while id.len() < SESSION_ID_LEN {
            let c = self.pick(tail);
            // `--` would end an HTML comment.
            if c == '-' && id.ends_with('-') {
                continue;
            }
            id.push(c);
        }
        id
    }
}

/// Always returns the same id.
#[derive(Debug, Clone)]
pub struct FixedSessionId(pub String);

impl SessionIdGenerator for FixedSessionId {
    fn next_id(&mut self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use difsync_protocol::is_valid_session_id;

    #[test]
    fn random_ids_use_the_alphabet() {
        let mut ids = RandomSessionIds::seeded(7);
        for _ in 0..500 {
            let id = ids.next_id();
            assert_eq!(id.len(), SESSION_ID_LEN);
            assert!(is_valid_session_id(&id), "{id}");
        }
    }

    #[test]
    fn seeded_ids_are_reproducible() {
        let a: Vec<_> = {
            let mut ids = RandomSessionIds::seeded(42);
            (0..5).map(|_| ids.next_id()).collect()
        };
        let b: Vec<_> = {
            let mut ids = RandomSessionIds::seeded(42);
            (0..5).map(|_| ids.next_id()).collect()
        };
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn fixed_id() {
        let mut ids = FixedSessionId("client01".into());
        assert_eq!(ids.next_id(), "client01");
        assert_eq!(ids.next_id(), "client01");
    }
}
