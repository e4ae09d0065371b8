/// Parse a human-readable token lifetime into seconds.
///
/// Accepts `<n>s`, `<n>m`, `<n>h`, `<n>d` and bare digits (seconds).
/// Returns `None` for malformed, zero or overflowing values.
pub fn parse_expiration_time(value: &str) -> Option<i64> {
    let value = value.trim().to_lowercase();
    let (number, multiplier) = match value.chars().last()? {
        's' => (&value[..value.len() - 1], 1),
        'm' => (&value[..value.len() - 1], 60),
        'h' => (&value[..value.len() - 1], 60 * 60),
        'd' => (&value[..value.len() - 1], 24 * 60 * 60),
        c if c.is_ascii_digit() => (value.as_str(), 1),
        _ => return None,
    };

    let number = number.trim();
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    number
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .filter(|seconds| *seconds > 0)
}
