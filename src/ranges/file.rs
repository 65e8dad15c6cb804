//! Plain-text range lists: one CIDR per line, `#` starts a comment.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::Result;

/// Read every non-empty, non-comment line of a range list.
///
/// Lines are returned trimmed and unvalidated; validation happens when the
/// table is built (lenient) or in [`CheckerConfig::validate`](crate::CheckerConfig::validate)
/// (strict).
pub fn parse_range_list<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut ranges = Vec::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;

        // Remove comments
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => &line,
        };
        let line = line.trim();

        if !line.is_empty() {
            ranges.push(line.to_string());
        }
    }
    Ok(ranges)
}

/// Open and parse a range list file.
pub fn read_range_file(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    parse_range_list(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_list() {
        let text = "\
# crawler ranges
10.0.0.0/8
  192.0.2.0/24   # documentation

2001:db8::/32
";
        let ranges = parse_range_list(text.as_bytes()).unwrap();
        assert_eq!(ranges, vec!["10.0.0.0/8", "192.0.2.0/24", "2001:db8::/32"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse_range_list("".as_bytes()).unwrap().is_empty());
        assert!(parse_range_list("# only\n\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = read_range_file(Path::new("/nonexistent/rangeguard/ranges.txt"));
        assert!(matches!(err, Err(crate::Error::Io(_))));
    }
}
