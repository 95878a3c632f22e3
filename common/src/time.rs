use core::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TimeParseError;

/// Wall-clock time parsed from `HH:MM:SS`.
///
/// Fields are not range checked: `25:61:00` parses and compares by its
/// arithmetic offset from midnight. Ordering and equality are both defined on
/// [`TimeOfDay::total_seconds`], so `00:60:00 == 01:00:00`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeOfDay {
    pub const fn new(hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hour,
            minute,
            second,
        }
    }

    pub fn total_seconds(self) -> u64 {
        self.hour as u64 * 3600 + self.minute as u64 * 60 + self.second as u64
    }

    /// Takes the trailing `HH:MM:SS` of an ISO-8601 `YYYY-MM-DDTHH:MM:SS` timestamp.
    pub fn from_timestamp(timestamp: &str) -> Result<Self, TimeParseError> {
        let start = timestamp
            .len()
            .checked_sub(8)
            .filter(|start| timestamp.is_char_boundary(*start))
            .ok_or_else(|| TimeParseError::Timestamp(timestamp.to_string()))?;
        timestamp[start..].parse()
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = value.as_bytes();
        if bytes.len() != 8 {
            return Err(TimeParseError::Length(bytes.len()));
        }
        if bytes[2] != b':' || bytes[5] != b':' {
            return Err(TimeParseError::Separator);
        }

        Ok(Self {
            hour: parse_field(&bytes[0..2], "hour")?,
            minute: parse_field(&bytes[3..5], "minute")?,
            second: parse_field(&bytes[6..8], "second")?,
        })
    }
}

fn parse_field(digits: &[u8], field: &'static str) -> Result<u32, TimeParseError> {
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(TimeParseError::NonNumeric { field });
    }
    Ok(digits
        .iter()
        .fold(0, |acc, digit| acc * 10 + u32::from(digit - b'0')))
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl PartialEq for TimeOfDay {
    fn eq(&self, other: &Self) -> bool {
        self.total_seconds() == other.total_seconds()
    }
}

impl Eq for TimeOfDay {}

impl PartialOrd for TimeOfDay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeOfDay {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_seconds().cmp(&other.total_seconds())
    }
}

/// Compares two `HH:MM:SS` strings as same-day offsets. No timezone or
/// day-rollover handling.
pub fn compare(t1: &str, t2: &str) -> Result<Ordering, TimeParseError> {
    let lhs: TimeOfDay = t1.parse()?;
    let rhs: TimeOfDay = t2.parse()?;
    Ok(lhs.cmp(&rhs))
}
