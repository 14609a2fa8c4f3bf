//! Whitespace/comma-separated numeric ingestion for the `fit_csv` harness.
//!
//! The wire format is deliberately primitive: one row per line, fields
//! split on comma or whitespace, all-but-the-last-or-two columns are
//! features. There is no quoting, no escaping, no typed header row beyond
//! an optional first line of names — pulling in RFC 4180 machinery for this
//! would be pure overhead.

use std::io::BufRead;

use symreg_core::error::{SymRegError, SymRegResult};

/// A parsed numeric table: `rows` rows of `cols` feature columns, a target
/// column, and an optional header naming the feature columns.
pub struct Table {
    pub header: Option<Vec<String>>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn looks_numeric(fields: &[&str]) -> bool {
    !fields.is_empty() && fields.iter().all(|f| f.parse::<f64>().is_ok())
}

/// Read a table from any line-buffered source. The target column is the
/// last field of each row; every other field is a feature.
pub fn read_table<R: BufRead>(reader: R) -> SymRegResult<Table> {
    let mut lines = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SymRegError::Io(e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((lineno + 1, line));
    }

    if lines.is_empty() {
        return Err(SymRegError::Parse {
            context: "csv input".to_string(),
            detail: "no data rows found".to_string(),
        });
    }

    let first_fields = split_fields(&lines[0].1);
    let header = if looks_numeric(&first_fields) {
        None
    } else {
        Some(first_fields.iter().map(|s| s.to_string()).collect())
    };
    let data_start = if header.is_some() { 1 } else { 0 };

    if data_start >= lines.len() {
        return Err(SymRegError::Parse {
            context: "csv input".to_string(),
            detail: "header row present but no data rows follow".to_string(),
        });
    }

    let first_data_fields = split_fields(&lines[data_start].1);
    if first_data_fields.len() < 2 {
        return Err(SymRegError::Parse {
            context: format!("csv input, line {}", lines[data_start].0),
            detail: "need at least one feature column plus a target column".to_string(),
        });
    }
    let cols = first_data_fields.len() - 1;

    let mut x = Vec::with_capacity((lines.len() - data_start) * cols);
    let mut y = Vec::with_capacity(lines.len() - data_start);

    for (lineno, line) in &lines[data_start..] {
        let fields = split_fields(line);
        if fields.len() != cols + 1 {
            return Err(SymRegError::Parse {
                context: format!("csv input, line {lineno}"),
                detail: format!("expected {} columns, found {}", cols + 1, fields.len()),
            });
        }
        for field in &fields[..cols] {
            let v = field.parse::<f64>().map_err(|_| SymRegError::Parse {
                context: format!("csv input, line {lineno}"),
                detail: format!("{field:?} is not a number"),
            })?;
            x.push(v);
        }
        let target = fields[cols].parse::<f64>().map_err(|_| SymRegError::Parse {
            context: format!("csv input, line {lineno}"),
            detail: format!("{:?} is not a number", fields[cols]),
        })?;
        y.push(target);
    }

    let rows = y.len();
    Ok(Table { header, x, y, rows, cols })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_headerless_csv() {
        let data = "1,2,3\n4,5,9\n";
        let table = read_table(Cursor::new(data)).unwrap();
        assert!(table.header.is_none());
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 2);
        assert_eq!(table.x, vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(table.y, vec![3.0, 9.0]);
    }

    #[test]
    fn parses_header_row_and_whitespace_separators() {
        let data = "a b target\n1 2 3\n4 5 9\n";
        let table = read_table(Cursor::new(data)).unwrap();
        assert_eq!(table.header, Some(vec!["a".to_string(), "b".to_string(), "target".to_string()]));
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 2);
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let data = "# comment\n1,2,3\n\n4,5,9\n";
        let table = read_table(Cursor::new(data)).unwrap();
        assert_eq!(table.rows, 2);
    }

    #[test]
    fn rejects_ragged_rows() {
        let data = "1,2,3\n4,5\n";
        let err = read_table(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, SymRegError::Parse { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        let err = read_table(Cursor::new("")).unwrap_err();
        assert!(matches!(err, SymRegError::Parse { .. }));
    }

    #[test]
    fn reads_through_an_actual_file_handle() {
        use std::io::{BufReader, Write};

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x0,x1,target").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5,9").unwrap();

        let reopened = std::fs::File::open(file.path()).unwrap();
        let table = read_table(BufReader::new(reopened)).unwrap();
        assert_eq!(table.rows, 2);
        assert_eq!(table.cols, 2);
        assert_eq!(table.header, Some(vec!["x0".to_string(), "x1".to_string(), "target".to_string()]));
    }
}
