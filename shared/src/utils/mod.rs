//! Utility functions and helpers

pub mod time;

use anyhow::Result;

/// Check that a name is safe to use as a table or column identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a duration string (e.g., "30s", "5m", "1h", "7d", "1w") into seconds
pub fn parse_duration_secs(s: &str) -> Result<f64> {
    let s = s.trim();

    let (num_str, scale) = if let Some(n) = s.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3600.0)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86_400.0)
    } else if let Some(n) = s.strip_suffix('w') {
        (n, 7.0 * 86_400.0)
    } else {
        // Default to seconds if no suffix
        (s, 1.0)
    };

    let value: f64 = num_str.trim().parse()?;
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("Invalid duration: {}", s);
    }
    Ok(value * scale)
}
