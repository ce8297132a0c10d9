//! The handle validator (§3): the one piece of input validation shared by
//! registration and every later lookup that quotes a handle back.

/// Minimum number of one-time prekeys (of each kind) an identity must
/// register with (I3).
pub const MIN_ONE_TIME_PREKEYS: usize = 10;

/// `true` iff `handle` satisfies every rule in §3:
/// length in [3, 32]; first char a lowercase letter; remaining chars
/// lowercase letters, digits, or underscore; no two consecutive
/// underscores; does not end with an underscore.
pub fn is_valid_handle(handle: &str) -> bool {
    let len = handle.len();
    if !(3..=32).contains(&len) {
        return false;
    }
    let bytes = handle.as_bytes();
    if !bytes[0].is_ascii_lowercase() {
        return false;
    }
    if bytes[len - 1] == b'_' {
        return false;
    }
    let mut prev_underscore = false;
    for &b in &bytes[1..] {
        let ok = b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_';
        if !ok {
            return false;
        }
        if b == b'_' {
            if prev_underscore {
                return false;
            }
            prev_underscore = true;
        } else {
            prev_underscore = false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_handles() {
        for h in ["abc", "alice", "bob_smith", "a1b", "z".repeat(32).as_str()] {
            assert!(is_valid_handle(h), "expected {h} to be valid");
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_handle(""));
    }

    #[test]
    fn rejects_too_short() {
        assert!(!is_valid_handle("ab"));
    }

    #[test]
    fn rejects_too_long() {
        let h = "a".repeat(33);
        assert!(!is_valid_handle(&h));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(!is_valid_handle("1abc"));
    }

    #[test]
    fn rejects_leading_underscore() {
        assert!(!is_valid_handle("_abc"));
    }

    #[test]
    fn rejects_uppercase() {
        assert!(!is_valid_handle("Alice"));
    }

    #[test]
    fn rejects_double_underscore() {
        assert!(!is_valid_handle("al__ice"));
    }

    #[test]
    fn rejects_trailing_underscore() {
        assert!(!is_valid_handle("alice_"));
    }

    #[test]
    fn rejects_other_punctuation() {
        assert!(!is_valid_handle("alice-smith"));
        assert!(!is_valid_handle("alice.smith"));
        assert!(!is_valid_handle("alice smith"));
    }
}
