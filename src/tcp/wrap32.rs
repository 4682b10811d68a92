use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// A 32-bit TCP sequence or acknowledgment number. All arithmetic wraps at 2^32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    /// The number the peer must acknowledge after a segment that starts at `self`,
    /// carries `payload_len` bytes and consumes one control sequence number (SYN or FIN).
    pub fn next_after_control(self, payload_len: u32) -> Wrap32 {
        self + payload_len + 1
    }
}

impl Add for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: Wrap32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other.value))
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: u32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other))
    }
}

impl From<u32> for Wrap32 {
    fn from(value: u32) -> Self {
        Wrap32::new(value)
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rayon::prelude::*;
    use super::*;

    // -- Test `+` operator overload --

    #[test]
    fn test_add() {
        let x = Wrap32::new(1);
        let y = Wrap32::new(2);
        let z = Wrap32::new(3);
        assert_eq!(x + y, z);
        assert_eq!(x + 2u32, z);
    }

    #[test]
    fn test_add_overflow() {
        let x = Wrap32::new(u32::MAX);
        assert_eq!(x + Wrap32::new(1), Wrap32::new(0));
        assert_eq!(x + 1u32, Wrap32::new(0));
        assert_eq!(x + 10u32, Wrap32::new(9));
    }

    // -- Test control sequence numbers --

    #[test]
    fn test_next_after_control_empty() {
        assert_eq!(Wrap32::new(1000).next_after_control(0), Wrap32::new(1001));
    }

    #[test]
    fn test_next_after_control_with_payload() {
        assert_eq!(Wrap32::new(1000).next_after_control(20), Wrap32::new(1021));
    }

    #[test]
    fn test_next_after_control_wraps_to_zero() {
        assert_eq!(Wrap32::new(u32::MAX).next_after_control(0), Wrap32::new(0));
        assert_eq!(Wrap32::new(u32::MAX - 4).next_after_control(10), Wrap32::new(6));
    }

    // -- Test compare --

    #[test]
    fn test_equality() {
        let wrap_a = Wrap32::new(3);
        let wrap_b = Wrap32::new(1);

        assert_ne!(wrap_a, wrap_b);
        assert_eq!(wrap_a != wrap_b, true);
        assert_eq!(wrap_a == wrap_b, false);
    }

    #[test]
    fn test_successor_random() {
        let n_reps = 1_000_000;

        // Run parallel tests because we don't have all the time in the world
        (0..n_reps).into_par_iter().for_each(|_| {
            let mut rng = rand::thread_rng();
            let n: u32 = rng.gen();
            let step: u16 = rng.gen_range(1..=u16::MAX);

            let wrap_n = Wrap32::new(n);
            let next = wrap_n + step as u32;

            assert_eq!(next.value(), n.wrapping_add(step as u32));
            assert_ne!(wrap_n, next);
            assert_eq!(wrap_n.next_after_control(0), Wrap32::new(n.wrapping_add(1)));
        });
    }

    // -- Test serde --

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Wrap32::new(4294967295)).unwrap();
        assert_eq!(json, "4294967295");
        let back: Wrap32 = serde_json::from_str("17").unwrap();
        assert_eq!(back, Wrap32::new(17));
    }
}
