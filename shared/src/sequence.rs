use thiserror::Error;

/// Errors that can occur during wrapping sequence-id operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// Integer overflow occurred during wrapping difference calculation.
    /// This should be mathematically impossible with valid u32 inputs.
    #[error("Integer overflow in seq_diff({a}, {b}) - this should not happen")]
    IntegerOverflow { a: u32, b: u32 },
}

const HALF_WINDOW: u32 = 1 << 31;

/// Returns whether or not a wrapping sequence id is greater than another
/// seq_greater_than(2,1) will return true
/// seq_greater_than(1,2) will return false
/// seq_greater_than(1,1) will return false
pub fn seq_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= HALF_WINDOW)) || ((s1 < s2) && (s2 - s1 > HALF_WINDOW))
}

/// Returns whether or not a wrapping sequence id is less than another
/// seq_less_than(1,2) will return true
/// seq_less_than(2,1) will return false
/// seq_less_than(1,1) will return false
pub fn seq_less_than(s1: u32, s2: u32) -> bool {
    seq_greater_than(s2, s1)
}

/// The next sequence id after `seq`, wrapping at the id-space boundary
pub fn next_seq(seq: u32) -> u32 {
    seq.wrapping_add(1)
}

/// Retrieves the wrapping difference between 2 u32 sequence ids.
/// Returns an error if an impossible integer overflow occurs.
///
/// # Examples
/// ```
/// # use tether_shared::try_seq_diff;
/// assert_eq!(try_seq_diff(1, 2).unwrap(), 1);
/// assert_eq!(try_seq_diff(2, 1).unwrap(), -1);
/// assert_eq!(try_seq_diff(u32::MAX, 0).unwrap(), 1);
/// assert_eq!(try_seq_diff(0, u32::MAX).unwrap(), -1);
/// ```
pub fn try_seq_diff(a: u32, b: u32) -> Result<i32, SequenceError> {
    const MAX: i64 = i32::MAX as i64;
    const MIN: i64 = i32::MIN as i64;
    const ADJUST: i64 = (u32::MAX as i64) + 1;

    let a_i64 = i64::from(a);
    let b_i64 = i64::from(b);

    let mut result = b_i64 - a_i64;
    if (MIN..=MAX).contains(&result) {
        Ok(result as i32)
    } else if b_i64 > a_i64 {
        result = b_i64 - (a_i64 + ADJUST);
        if (MIN..=MAX).contains(&result) {
            Ok(result as i32)
        } else {
            Err(SequenceError::IntegerOverflow { a, b })
        }
    } else {
        result = (b_i64 + ADJUST) - a_i64;
        if (MIN..=MAX).contains(&result) {
            Ok(result as i32)
        } else {
            Err(SequenceError::IntegerOverflow { a, b })
        }
    }
}

/// Retrieves the wrapping difference between 2 u32 sequence ids.
///
/// # Panics
///
/// Panics if an impossible integer overflow occurs (this should never happen
/// with valid u32 inputs).
pub fn seq_diff(a: u32, b: u32) -> i32 {
    try_seq_diff(a, b).expect("integer overflow in seq_diff - this should not happen")
}


#[cfg(test)]
mod seq_diff_tests {
    use super::{next_seq, seq_diff};

    #[test]
    fn simple() {
        assert_eq!(seq_diff(10, 12), 2);
    }

    #[test]
    fn simple_backwards() {
        assert_eq!(seq_diff(12, 10), -2);
    }

    #[test]
    fn max_wrap() {
        let a = u32::MAX;
        let b = a.wrapping_add(2);
        assert_eq!(seq_diff(a, b), 2);
    }

    #[test]
    fn min_wrap() {
        let a: u32 = 0;
        let b = a.wrapping_sub(2);
        assert_eq!(seq_diff(a, b), -2);
    }

    #[test]
    fn max_wrap_backwards() {
        let a = u32::MAX;
        let b = a.wrapping_add(2);
        assert_eq!(seq_diff(b, a), -2);
    }

    #[test]
    fn min_wrap_backwards() {
        let a: u32 = 0;
        let b = a.wrapping_sub(2);
        assert_eq!(seq_diff(b, a), 2);
    }

    #[test]
    fn next_wraps_to_zero() {
        assert_eq!(next_seq(u32::MAX), 0);
        assert_eq!(next_seq(0), 1);
    }
}
