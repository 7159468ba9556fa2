use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use std::io;
use std::path::{Path, PathBuf};

const WORK_DIR_NAME: &str = "weathercast";

/// Formats accepted for timestamps that carry no offset.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Default local working directory, inside the user's cache directory.
pub fn default_work_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(WORK_DIR_NAME))
}

pub fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {}", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => std::fs::create_dir_all(path),
        Err(e) => Err(e),
    }
}

/// Parses an RFC 3339 timestamp, or a naive `YYYY-MM-DD HH:MM[:SS]` one which is
/// then taken to be in `zone`.
pub fn parse_timestamp(value: &str, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| zone.from_local_datetime(&naive).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_keeps_explicit_offset() {
        let zone = FixedOffset::east_opt(3600).unwrap();
        let parsed = parse_timestamp("2025-04-25T10:00:00-04:00", zone).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn test_parse_timestamp_assumes_zone_for_naive() {
        let zone = FixedOffset::west_opt(4 * 3600).unwrap();
        for value in [
            "2025-04-25 10:00:00",
            "2025-04-25T10:00:00",
            "2025-04-25 10:00",
            "2025-04-25T10:00:00.000",
        ] {
            let parsed = parse_timestamp(value, zone).unwrap();
            assert_eq!(parsed.to_rfc3339(), "2025-04-25T10:00:00-04:00", "{}", value);
        }
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let zone = FixedOffset::east_opt(0).unwrap();
        assert!(parse_timestamp("yesterday", zone).is_none());
        assert!(parse_timestamp("2025-04-25", zone).is_none());
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).unwrap();

        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        assert!(ensure_dir_exists(&file).is_err());
    }
}
