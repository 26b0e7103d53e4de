//! Duration literals for the `agg` command.
//!
//! Accepts the `1h30m` / `1.5s` / `250ms` notation: one or more
//! `<number><unit>` segments, where the number may have a fractional part.

use std::time::Duration;

use crate::{GatorError, Result};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Digits of a fractional part beyond this are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60 * NANOS_PER_SECOND),
        "h" => Some(3600 * NANOS_PER_SECOND),
        _ => None,
    }
}

fn invalid(input: &str, reason: &str) -> GatorError {
    GatorError::Validation(format!("invalid interval '{input}': {reason}"))
}

/// Parse an interval such as `30s`, `1m` or `1h30m`.
///
/// Empty, unit-less, negative and zero intervals are rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid(input, "empty duration"));
    }
    if rest.starts_with('-') {
        return Err(invalid(input, "must not be negative"));
    }
    if let Some(stripped) = rest.strip_prefix('+') {
        rest = stripped;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid(input, "expected a number"));
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_len);
        if unit.is_empty() {
            return Err(invalid(input, "missing unit"));
        }
        let scale =
            unit_nanos(unit).ok_or_else(|| invalid(input, &format!("unknown unit '{unit}'")))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| invalid(input, "number out of range"))?
        };

        let frac_digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
        let fraction: u128 = if frac_digits.is_empty() {
            0
        } else {
            let numerator: u128 = frac_digits
                .parse()
                .map_err(|_| invalid(input, "number out of range"))?;
            numerator * scale / 10u128.pow(frac_digits.len() as u32)
        };

        let segment = whole
            .checked_mul(scale)
            .and_then(|n| n.checked_add(fraction))
            .ok_or_else(|| invalid(input, "duration out of range"))?;
        total = total
            .checked_add(segment)
            .ok_or_else(|| invalid(input, "duration out of range"))?;

        rest = remaining;
    }

    if total == 0 {
        return Err(invalid(input, "must be greater than zero"));
    }

    let nanos = u64::try_from(total).map_err(|_| invalid(input, "duration out of range"))?;
    Ok(Duration::from_nanos(nanos))
}
