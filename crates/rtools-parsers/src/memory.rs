//! Memory parsing utilities for scheduler output and requests.

/// Memory format variants for different schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFormat {
    /// SLURM format: "4G", "1000M", "4096K", "4096" (no spaces, MB default)
    Slurm,
    /// PBS format: "1000mb", "2gb", "16432856kb" (lowercase units, bytes default)
    Pbs,
}

/// Parse memory string to megabytes.
///
/// Handles the formats reported by SLURM and PBS:
/// - SLURM: "4G", "1000M", "4096K", "4096"
/// - PBS: "2gb", "1000mb", "16432856kb", "1073741824"
///
/// Returns None for empty strings or placeholder values.
pub fn parse_memory_mb(s: &str, format: MemoryFormat) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "--" {
        return None;
    }

    match format {
        MemoryFormat::Slurm => parse_slurm_memory(s),
        MemoryFormat::Pbs => parse_pbs_memory(s),
    }
}

/// Parse SLURM memory format (e.g., "4G", "1000M", "4096").
fn parse_slurm_memory(s: &str) -> Option<u64> {
    if let Some(stripped) = s.strip_suffix('T') {
        stripped.parse::<u64>().ok().map(|v| v * 1024 * 1024)
    } else if let Some(stripped) = s.strip_suffix('G') {
        stripped.parse::<u64>().ok().map(|v| v * 1024)
    } else if let Some(stripped) = s.strip_suffix('M') {
        stripped.parse::<u64>().ok()
    } else if let Some(stripped) = s.strip_suffix('K') {
        stripped.parse::<u64>().ok().map(|v| v / 1024)
    } else {
        // Assume MB if no suffix
        s.parse::<u64>().ok()
    }
}

/// Parse PBS memory format (e.g., "2gb", "1000mb", "16432856kb").
fn parse_pbs_memory(s: &str) -> Option<u64> {
    let lower = s.to_lowercase();
    let (value, unit) = split_unit(&lower);
    let value: u64 = value.parse().ok()?;

    match unit {
        "tb" => Some(value * 1024 * 1024),
        "gb" => Some(value * 1024),
        "mb" => Some(value),
        "kb" => Some(value / 1024),
        "b" | "" => Some(value / (1024 * 1024)),
        _ => None,
    }
}

/// Normalize a user memory request into PBS syntax.
///
/// A bare number is taken as gigabytes (`2` becomes `2gb`); strings with a
/// `kb`, `mb` or `gb` unit are kept (lowercased). Anything else is rejected.
pub fn pbs_memory_request(s: &str) -> Option<String> {
    let lower = s.trim().to_lowercase();
    let (value, unit) = split_unit(&lower);
    if value.is_empty() || value.parse::<u64>().is_err() {
        return None;
    }

    match unit {
        "" => Some(format!("{}gb", value)),
        "kb" | "mb" | "gb" => Some(lower.clone()),
        _ => None,
    }
}

/// Split "1000mb" into ("1000", "mb").
fn split_unit(s: &str) -> (&str, &str) {
    let idx = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    (&s[..idx], s[idx..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slurm_memory() {
        assert_eq!(parse_memory_mb("4G", MemoryFormat::Slurm), Some(4096));
        assert_eq!(parse_memory_mb("1000M", MemoryFormat::Slurm), Some(1000));
        assert_eq!(parse_memory_mb("4096K", MemoryFormat::Slurm), Some(4));
        assert_eq!(parse_memory_mb("4096", MemoryFormat::Slurm), Some(4096));
        assert_eq!(parse_memory_mb("", MemoryFormat::Slurm), None);
    }

    #[test]
    fn test_parse_pbs_memory() {
        assert_eq!(parse_memory_mb("2gb", MemoryFormat::Pbs), Some(2048));
        assert_eq!(parse_memory_mb("1000mb", MemoryFormat::Pbs), Some(1000));
        assert_eq!(parse_memory_mb("16432856kb", MemoryFormat::Pbs), Some(16047));
        assert_eq!(parse_memory_mb("2GB", MemoryFormat::Pbs), Some(2048));
        assert_eq!(parse_memory_mb("--", MemoryFormat::Pbs), None);
        assert_eq!(parse_memory_mb("lots", MemoryFormat::Pbs), None);
    }

    #[test]
    fn test_pbs_memory_request() {
        assert_eq!(pbs_memory_request("2"), Some("2gb".to_string()));
        assert_eq!(pbs_memory_request("500mb"), Some("500mb".to_string()));
        assert_eq!(pbs_memory_request("4GB"), Some("4gb".to_string()));
        assert_eq!(pbs_memory_request("4 tb"), None);
        assert_eq!(pbs_memory_request("mb"), None);
        assert_eq!(pbs_memory_request(""), None);
    }
}
