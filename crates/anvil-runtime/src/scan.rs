//! Text scanning utilities
//!
//! Zero-copy slice primitives consumed by the assembler: trimming,
//! delimiter-based chopping, case folding, and permissive digit parsing.
//! Everything here borrows from the source buffer except [`fold_lower`],
//! which allocates an owned lowercase copy.

/// Strip leading ASCII whitespace.
pub fn trim_left(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_ascii_whitespace())
}

/// Strip trailing ASCII whitespace.
pub fn trim_right(s: &str) -> &str {
    s.trim_end_matches(|c: char| c.is_ascii_whitespace())
}

/// Strip whitespace from both ends.
pub fn trim(s: &str) -> &str {
    trim_right(trim_left(s))
}

/// Split off the prefix up to the first `delim`, consuming the delimiter.
///
/// The returned slice is everything before `delim`; `source` is advanced
/// to the text after it. If `delim` does not occur, the whole slice is
/// returned and `source` is left empty.
pub fn chop<'a>(source: &mut &'a str, delim: char) -> &'a str {
    match source.find(delim) {
        Some(i) => {
            let prefix = &source[..i];
            *source = &source[i + delim.len_utf8()..];
            prefix
        }
        None => {
            let prefix = *source;
            *source = "";
            prefix
        }
    }
}

/// Produce a newly owned ASCII-lowercased copy of `s`.
///
/// Ownership transfers to the caller; the copy is released when it goes
/// out of scope.
pub fn fold_lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Accumulate a run of leading decimal digits into an integer.
///
/// Stops silently at the first non-digit character; malformed text yields
/// a partial value (or 0) rather than an error. Callers that need strict
/// validation must check the slice themselves before calling this.
pub fn parse_digits(s: &str) -> i64 {
    let mut result: i64 = 0;
    for b in s.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        result = result.wrapping_mul(10).wrapping_add((b - b'0') as i64);
    }
    result
}

/// Parse a complete signed decimal token.
///
/// Explicit counterpart to [`parse_digits`]: the whole slice must be an
/// optional leading `-` followed by at least one digit, and the value
/// must fit in an `i64`. Returns `None` on malformed or out-of-range
/// text instead of wrapping.
pub fn parse_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Accumulate on the negative side so i64::MIN is reachable
    let mut value: i64 = 0;
    for b in digits.bytes() {
        let d = (b - b'0') as i64;
        value = value.checked_mul(10)?;
        value = if negative {
            value.checked_sub(d)?
        } else {
            value.checked_add(d)?
        };
    }
    Some(value)
}
