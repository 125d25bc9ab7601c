//! Long-poll timeout parsing.
//!
//! Accepts one or more `<decimal><unit>` terms (`250ms`, `5s`, `1m30s`,
//! `1.5h`) with units `ns`, `us`/`µs`, `ms`, `s`, `m`, `h`, or a bare `0`.
//! An optional leading sign is allowed; negative values clamp to zero.
use std::time::Duration;

pub fn parse_timeout(input: &str) -> Option<Duration> {
    let input = input.trim();
    let (negative, input) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    if input == "0" {
        return Some(Duration::ZERO);
    }
    if input.is_empty() {
        return None;
    }

    let mut rest = input;
    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        // A term without a unit is invalid, hence `?` on the search.
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        total_nanos += value * nanos_per_unit;
        rest = &rest[unit_len..];
    }

    if !total_nanos.is_finite() {
        return None;
    }
    if negative {
        return Some(Duration::ZERO);
    }
    Some(Duration::from_nanos(total_nanos as u64))
}
