//! Time parsing utilities for scheduler output and walltime requests.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Parse a duration in various formats.
///
/// Supports:
/// - D-HH:MM:SS (SLURM time limit with days)
/// - HH:MM:SS
/// - MM:SS
/// - Seconds as integer
///
/// Returns None for "UNLIMITED" or empty strings.
pub fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() || s == "UNLIMITED" || s == "-" {
        return None;
    }

    // Check for day separator (D-HH:MM:SS)
    let parts: Vec<&str> = s.split('-').collect();
    let (days, time_part) = match parts.len() {
        2 => (parts[0].parse::<u64>().ok()?, parts[1]),
        1 => (0, parts[0]),
        _ => return None,
    };

    let time_parts = time_part
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    // seconds from the most significant unit down
    let scales: &[u64] = match time_parts.len() {
        3 => &[3600, 60, 1],
        2 => &[60, 1],
        1 => &[1],
        _ => return None,
    };
    let seconds = time_parts
        .iter()
        .zip(scales)
        .try_fold(days.checked_mul(86400)?, |total, (part, scale)| {
            total.checked_add(part.checked_mul(*scale)?)
        })?;

    Some(Duration::from_secs(seconds))
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid walltime '{0}': expected hours or hh:mm:ss")]
pub struct WalltimeError(pub String);

/// Requested wall-clock limit of a batch job.
///
/// Rendered as `HH:MM:SS` (hours are not folded into days), which both
/// `#PBS -l walltime=` and `#SBATCH --time=` accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Walltime(Duration);

impl Walltime {
    /// Fails when the request does not fit in seconds.
    pub fn from_hours(hours: u64) -> Result<Self, WalltimeError> {
        hours
            .checked_mul(3600)
            .map(|secs| Walltime(Duration::from_secs(secs)))
            .ok_or_else(|| WalltimeError(format!("{} hours", hours)))
    }

    /// Parse a walltime request.
    ///
    /// A plain integer is interpreted as hours, anything containing `:` as a
    /// scheduler duration (`hh:mm:ss`, `mm:ss` or `d-hh:mm:ss`).
    pub fn parse(s: &str) -> Result<Self, WalltimeError> {
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            let hours = s.parse::<u64>().map_err(|_| WalltimeError(s.to_string()))?;
            return Self::from_hours(hours);
        }
        if s.contains(':') {
            if let Some(duration) = parse_duration(s) {
                return Ok(Walltime(duration));
            }
        }
        Err(WalltimeError(s.to_string()))
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl FromStr for Walltime {
    type Err = WalltimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Walltime::parse(s)
    }
}

impl fmt::Display for Walltime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0.as_secs();
        write!(
            f,
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1:00:00"), Some(Duration::from_secs(3600)));
        assert_eq!(
            parse_duration("1-00:00:00"),
            Some(Duration::from_secs(86400))
        );
        assert_eq!(parse_duration("30:00"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("3600"), Some(Duration::from_secs(3600)));
        assert!(parse_duration("UNLIMITED").is_none());
        assert!(parse_duration("-").is_none());
        assert!(parse_duration("1:xx:00").is_none());
    }

    #[test]
    fn test_walltime_hours() {
        assert_eq!(Walltime::parse("10").unwrap().to_string(), "10:00:00");
        assert_eq!(Walltime::parse("1").unwrap().to_string(), "01:00:00");
        assert_eq!(Walltime::from_hours(72).unwrap().to_string(), "72:00:00");
    }

    #[test]
    fn test_walltime_hms() {
        assert_eq!(Walltime::parse("01:30:00").unwrap().to_string(), "01:30:00");
        assert_eq!(Walltime::parse("2-00:00:00").unwrap().to_string(), "48:00:00");
        assert_eq!(Walltime::parse("45:00").unwrap().as_secs(), 2700);
    }

    #[test]
    fn test_walltime_too_large() {
        assert!(Walltime::from_hours(u64::MAX / 3600 + 1).is_err());
        assert!(Walltime::parse("9999999999999999999").is_err());
        assert!(parse_duration("999999999999999-00:00:00").is_none());
        assert!(parse_duration("9999999999999999999:00:00").is_none());
    }

    #[test]
    fn test_walltime_invalid() {
        assert!(Walltime::parse("").is_err());
        assert!(Walltime::parse("ten").is_err());
        assert!(Walltime::parse("1.5").is_err());
        assert!("a:b:c".parse::<Walltime>().is_err());
    }
}
