use crate::error::DomainError;
use chrono::Duration;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Unit table in emission order. Ranks are strictly increasing as units get
/// smaller, which is what the parser uses to reject reordering and repeats.
const UNITS: [(char, i64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Parse a compact duration string such as `"1d2h30m"`.
///
/// Grammar: one or more `<digits><unit>` segments, units drawn from
/// `d`/`h`/`m`/`s` in strictly decreasing size with no repeats. No spaces,
/// signs, or fractional values. The result is always non-negative.
///
/// Fails with a `validation` error on any syntactic violation, including the
/// empty string, trailing digits without a unit, and values that overflow.
pub fn parse_compact(input: &str) -> Result<Duration, DomainError> {
    let invalid = |reason: &str| DomainError::Validation {
        field: "duration",
        reason: format!("{reason} in {input:?}"),
    };

    if input.is_empty() {
        return Err(invalid("empty duration"));
    }

    let mut total: i64 = 0;
    let mut digits: Option<i64> = None;
    // Rank of the last consumed unit; segments must strictly increase.
    let mut last_rank: Option<usize> = None;

    for ch in input.chars() {
        if let Some(d) = ch.to_digit(10) {
            let acc = digits.unwrap_or(0);
            digits = Some(
                acc.checked_mul(10)
                    .and_then(|v| v.checked_add(i64::from(d)))
                    .ok_or_else(|| invalid("value overflow"))?,
            );
            continue;
        }

        let Some(rank) = UNITS.iter().position(|(unit, _)| *unit == ch) else {
            return Err(invalid(&format!("unexpected character {ch:?}")));
        };
        let Some(value) = digits.take() else {
            return Err(invalid(&format!("unit '{ch}' without a value")));
        };
        if let Some(prev) = last_rank
            && rank <= prev
        {
            return Err(invalid(&format!("unit '{ch}' out of order or repeated")));
        }
        last_rank = Some(rank);

        let seconds = value
            .checked_mul(UNITS[rank].1)
            .ok_or_else(|| invalid("value overflow"))?;
        total = total
            .checked_add(seconds)
            .ok_or_else(|| invalid("value overflow"))?;
    }

    if digits.is_some() {
        return Err(invalid("trailing digits without a unit"));
    }
    debug_assert!(last_rank.is_some(), "non-empty input with no segments");

    Ok(Duration::seconds(total))
}

/// Format a duration in canonical compact form.
///
/// Zero is `"0s"`; otherwise units with zero value are omitted and the rest
/// are emitted in d/h/m/s order. Carries are normalized (`90m` formats as
/// `"1h30m"`), so `format_compact(parse_compact(s)?)` re-parses to the same
/// value. Sub-second precision is truncated; the grammar has no unit for it.
pub fn format_compact(span: Duration) -> String {
    let mut remaining = span.num_seconds().max(0);
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, seconds) in UNITS {
        let value = remaining / seconds;
        if value > 0 {
            out.push_str(&value.to_string());
            out.push(unit);
            remaining -= value * seconds;
        }
    }
    out
}

/// A non-negative duration that serializes as its compact string form.
///
/// Used for every timeout/warning/cooldown field in season and game
/// configurations so that stored configs read the way operators write them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompactDuration(Duration);

impl CompactDuration {
    /// Wrap a span, clamping negatives to zero.
    pub fn new(span: Duration) -> Self {
        Self(span.max(Duration::zero()))
    }

    pub fn seconds(secs: i64) -> Self {
        Self::new(Duration::seconds(secs))
    }

    pub fn minutes(mins: i64) -> Self {
        Self::new(Duration::minutes(mins))
    }

    pub fn parse(input: &str) -> Result<Self, DomainError> {
        parse_compact(input).map(Self)
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for CompactDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_compact(self.0))
    }
}

impl From<CompactDuration> for Duration {
    fn from(value: CompactDuration) -> Self {
        value.0
    }
}

impl Serialize for CompactDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_compact(self.0))
    }
}

impl<'de> Deserialize<'de> for CompactDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CompactVisitor;

        impl Visitor<'_> for CompactVisitor {
            type Value = CompactDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a compact duration string such as \"1d2h30m\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                CompactDuration::parse(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CompactVisitor)
    }
}
