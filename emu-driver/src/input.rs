//! Input trace handling.
//!
//! Parses request traces from CSV files with `timestamp,content_id` lines.
//! Lines starting with `#` and a leading header row are skipped. Requests
//! are sorted by timestamp after loading, since the engine's time-slicing
//! assumes a non-decreasing trace.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use cache_emu_rs::{Content, Timestamp};

/// Error types for trace parsing.
#[derive(Debug, thiserror::Error)]
pub enum TraceParseError {
    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A malformed line.
    #[error("{0}")]
    Parse(String),
}

/// Parses a single `timestamp,content_id` line. Returns `None` for lines
/// that carry no request (blank, comment, header).
fn parse_line(line: &str, line_num: usize) -> Result<Option<(Timestamp, Content)>, TraceParseError> {
    let line = line.trim();

    if line.is_empty() || line.starts_with('#') || (line_num == 0 && line.contains("timestamp")) {
        return Ok(None);
    }

    let mut parts = line.splitn(3, ',');

    let ts_str = parts
        .next()
        .ok_or_else(|| TraceParseError::Parse(format!("line {} missing timestamp", line_num + 1)))?;
    let timestamp = ts_str.trim().parse::<Timestamp>().map_err(|_| {
        TraceParseError::Parse(format!("invalid timestamp in line {}: {ts_str}", line_num + 1))
    })?;

    let id_str = parts
        .next()
        .ok_or_else(|| TraceParseError::Parse(format!("line {} missing content id", line_num + 1)))?;
    let content_id = id_str.trim().parse::<Content>().map_err(|_| {
        TraceParseError::Parse(format!("invalid content id in line {}: {id_str}", line_num + 1))
    })?;

    Ok(Some((timestamp, content_id)))
}

/// Reads a trace file into parallel id/timestamp columns, sorted by
/// timestamp.
pub fn read_trace<P: AsRef<Path>>(
    path: P,
) -> Result<(Vec<Content>, Vec<Timestamp>), TraceParseError> {
    let file = File::open(path)?;
    let reader = BufReader::with_capacity(1024 * 1024, file);

    let mut rows = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(row) = parse_line(&line, line_num)? {
            rows.push(row);
        }
    }

    rows.sort_by_key(|&(t, _)| t);

    let ids = rows.iter().map(|&(_, c)| c).collect();
    let timestamps = rows.iter().map(|&(t, _)| t).collect();
    Ok((ids, timestamps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("3,17", 5).unwrap(), Some((3, 17)));
        assert_eq!(parse_line("  8 , 2 ", 5).unwrap(), Some((8, 2)));
        assert_eq!(parse_line("", 5).unwrap(), None);
        assert_eq!(parse_line("# comment", 5).unwrap(), None);
        assert_eq!(parse_line("timestamp,content_id", 0).unwrap(), None);
        assert!(parse_line("x,1", 5).is_err());
        assert!(parse_line("1", 5).is_err());
    }

    #[test]
    fn test_read_trace_sorts_by_timestamp() {
        let dir = std::env::temp_dir();
        let path = dir.join("emu_driver_input_test.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "timestamp,content_id").unwrap();
        writeln!(f, "2,30").unwrap();
        writeln!(f, "0,10").unwrap();
        writeln!(f, "1,20").unwrap();
        drop(f);

        let (ids, ts) = read_trace(&path).unwrap();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(ts, vec![0, 1, 2]);
        std::fs::remove_file(&path).ok();
    }
}
