use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

/// Parse a command-line span such as `100ms`, `0.5s` or `250us`.
///
/// A number must be followed by one of `ns`, `us` (or `µs`), `ms` or `s`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_alphabetic())
        .ok_or_else(|| anyhow!("missing unit in duration '{text}'"))?;
    let (amount, unit) = text.split_at(split);

    let amount: f64 = amount
        .trim()
        .parse()
        .with_context(|| format!("invalid amount in duration '{text}'"))?;
    if !amount.is_finite() || amount < 0.0 {
        bail!("duration '{text}' is negative or not finite");
    }

    let nanos_per_unit = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        other => bail!("unknown unit '{other}' in duration '{text}'"),
    };
    Ok(Duration::from_nanos((amount * nanos_per_unit).round() as u64))
}
