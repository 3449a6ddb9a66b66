use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::scanner::DEFAULT_PORT;

/// Parse a port list into deduplicated TCP ports (1..=65535), keeping first-seen order.
///
/// Entries are separated by commas or newlines. Each entry is a port (`4028`)
/// or an inclusive range (`4028-4030`). Text after `#` on a line is ignored.
pub fn parse_ports_str(s: &str) -> Result<Vec<u16>> {
    let mut out: Vec<u16> = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().unwrap_or("");
        for entry in line.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (start, end) = match entry.split_once('-') {
                Some((a, b)) => (
                    parse_port(a.trim())
                        .with_context(|| format!("line {line_no}: bad range start in {entry:?}"))?,
                    parse_port(b.trim())
                        .with_context(|| format!("line {line_no}: bad range end in {entry:?}"))?,
                ),
                None => {
                    let p = parse_port(entry)
                        .with_context(|| format!("line {line_no}: bad port {entry:?}"))?;
                    (p, p)
                }
            };
            if start > end {
                bail!("line {line_no}: invalid range {start}-{end} (start > end)");
            }
            for p in start..=end {
                if seen.insert(p) {
                    out.push(p);
                }
            }
        }
    }

    Ok(out)
}

/// Load a port list from a file.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<Vec<u16>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    parse_ports_str(&content)
}

/// Resolve a `--ports` argument: a file path if one exists, otherwise an inline list.
/// An empty result falls back to [`default_ports`].
pub fn resolve_ports(arg: &str) -> Result<Vec<u16>> {
    let path = Path::new(arg);
    let ports = if path.is_file() {
        load_ports_from_path(path)?
    } else {
        parse_ports_str(arg)?
    };
    Ok(if ports.is_empty() { default_ports() } else { ports })
}

/// Miners expose their API on 4028 unless reconfigured.
pub fn default_ports() -> Vec<u16> {
    vec![DEFAULT_PORT]
}

fn parse_port(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list_with_range() {
        let ports = parse_ports_str("4028, 4029-4031,80").unwrap();
        assert_eq!(ports, vec![4028, 4029, 4030, 4031, 80]);
    }

    #[test]
    fn lines_comments_and_dedup() {
        let ports = parse_ports_str("4028 # cgminer\n4028\n\n4027-4028\n").unwrap();
        assert_eq!(ports, vec![4028, 4027]);
    }

    #[test]
    fn reversed_range_rejected() {
        assert!(parse_ports_str("4030-4029").is_err());
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(parse_ports_str("70000").is_err());
        assert!(parse_ports_str("0").is_err());
        assert!(parse_ports_str("abc").is_err());
    }

    #[test]
    fn empty_list_uses_default() {
        assert_eq!(resolve_ports(" , ").unwrap(), vec![4028]);
    }
}
