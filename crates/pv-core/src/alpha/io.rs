//! Alpha file reading and writing.
//!
//! A file is a sequence of records:
//!
//! ```text
//! <action>
//! <v_0> <v_1> ... <v_{N-1}>
//!
//! ```
//!
//! Values are written with a fixed number of decimals and a trailing space.
//! The reader is whitespace-insensitive and only cares about token order.

use std::io::{BufRead, Write};
use std::path::Path;

use thiserror::Error;

use super::AlphaList;

/// Decimal places used when writing alpha files.
pub const DEFAULT_PRECISION: usize = 25;

#[derive(Debug, Error)]
pub enum AlphaIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alpha file line {line}: {message}")]
    Format { line: usize, message: String },
}

impl From<AlphaIoError> for pv_common::Error {
    fn from(err: AlphaIoError) -> Self {
        match err {
            AlphaIoError::Io(e) => pv_common::Error::Io(e),
            AlphaIoError::Format { line, message } => {
                pv_common::Error::AlphaFormat { line, message }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AlphaIoError>;

/// Write `list` in alpha file format.
pub fn write_alpha_list<W: Write>(list: &AlphaList, writer: &mut W, precision: usize) -> Result<()> {
    for node in list.iter() {
        writeln!(writer, "{}", node.action)?;
        for x in &node.alpha {
            write!(writer, "{:.*} ", precision, x)?;
        }
        writeln!(writer)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Write `list` to a file.
pub fn save_alpha_file(list: &AlphaList, path: &Path, precision: usize) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_alpha_list(list, &mut writer, precision)?;
    writer.flush()?;
    Ok(())
}

struct Tokens<R> {
    reader: R,
    line_no: usize,
    pending: std::vec::IntoIter<String>,
}

impl<R: BufRead> Tokens<R> {
    fn new(reader: R) -> Self {
        Tokens {
            reader,
            line_no: 0,
            pending: Vec::new().into_iter(),
        }
    }

    /// Next token with the line it came from.
    fn next_token(&mut self) -> Result<Option<(String, usize)>> {
        loop {
            if let Some(tok) = self.pending.next() {
                return Ok(Some((tok, self.line_no)));
            }
            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            self.pending = line
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into_iter();
        }
    }

    /// Tokens left on the current line.
    fn remaining_on_line(&self) -> usize {
        self.pending.len()
    }
}

/// Read an alpha file.
///
/// `num_states` fixes the vector length; when `None` it is taken from the
/// number of values on the first record's value line. `max_vectors <= 0`
/// reads everything.
pub fn read_alpha_list<R: BufRead>(
    reader: R,
    num_states: Option<usize>,
    max_vectors: i64,
) -> Result<AlphaList> {
    let mut tokens = Tokens::new(reader);
    let mut list = AlphaList::new();
    let mut width = num_states;

    while max_vectors <= 0 || (list.len() as i64) < max_vectors {
        let Some((tok, line)) = tokens.next_token()? else {
            break;
        };
        let action: usize = tok.parse().map_err(|_| AlphaIoError::Format {
            line,
            message: format!("expected an action index, found '{tok}'"),
        })?;

        let mut alpha = Vec::with_capacity(width.unwrap_or(0));
        let mut last_line = line;
        loop {
            if let Some(n) = width {
                if alpha.len() == n {
                    break;
                }
            }
            let Some((tok, line)) = tokens.next_token()? else {
                break;
            };
            last_line = line;
            let value: f64 = tok.parse().map_err(|_| AlphaIoError::Format {
                line,
                message: format!("expected a number, found '{tok}'"),
            })?;
            alpha.push(value);
            if width.is_none() && tokens.remaining_on_line() == 0 {
                width = Some(alpha.len());
            }
        }

        let expected = width.unwrap_or(0);
        if alpha.len() != expected || expected == 0 {
            return Err(AlphaIoError::Format {
                line: last_line,
                message: format!(
                    "truncated vector: expected {expected} values, found {}",
                    alpha.len()
                ),
            });
        }
        list.append(alpha, action);
    }
    Ok(list)
}

/// Read an alpha file from disk.
pub fn load_alpha_file(path: &Path, num_states: Option<usize>, max_vectors: i64) -> Result<AlphaList> {
    let file = std::fs::File::open(path)?;
    read_alpha_list(std::io::BufReader::new(file), num_states, max_vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> AlphaList {
        let mut l = AlphaList::new();
        l.append(vec![1.5, -0.25], 0);
        l.append(vec![0.0, 2.0], 3);
        l
    }

    #[test]
    fn test_write_format() {
        let mut out = Vec::new();
        write_alpha_list(&sample(), &mut out, 2).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "0\n1.50 -0.25 \n\n3\n0.00 2.00 \n\n");
    }

    #[test]
    fn test_round_trip() {
        let mut out = Vec::new();
        write_alpha_list(&sample(), &mut out, DEFAULT_PRECISION).unwrap();
        let back = read_alpha_list(Cursor::new(out), Some(2), 0).unwrap();
        assert!(back.same(&sample(), 1e-12));
        assert_eq!(back.node(1).unwrap().action, 3);
    }

    #[test]
    fn test_infer_width() {
        let back = read_alpha_list(Cursor::new("1\n0.1 0.2 0.3\n\n2\n1 2 3\n"), None, 0).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.node(1).unwrap().alpha, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_max_vectors() {
        let back = read_alpha_list(Cursor::new("0\n1 2\n\n1\n3 4\n\n"), Some(2), 1).unwrap();
        assert_eq!(back.len(), 1);
    }

    #[test]
    fn test_truncated_vector() {
        let err = read_alpha_list(Cursor::new("0\n1 2\n\n1\n3\n"), Some(2), 0).unwrap_err();
        match err {
            AlphaIoError::Format { line, message } => {
                assert_eq!(line, 5);
                assert!(message.contains("expected 2 values, found 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_action() {
        let err = read_alpha_list(Cursor::new("x\n1 2\n"), Some(2), 0).unwrap_err();
        assert!(matches!(err, AlphaIoError::Format { line: 1, .. }));
    }

    #[test]
    fn test_bad_value() {
        let err = read_alpha_list(Cursor::new("0\n1 nan?\n"), Some(2), 0).unwrap_err();
        assert!(matches!(err, AlphaIoError::Format { line: 2, .. }));
    }

    #[test]
    fn test_empty_input() {
        let back = read_alpha_list(Cursor::new(""), Some(3), 0).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.alpha");
        save_alpha_file(&sample(), &path, 10).unwrap();
        let back = load_alpha_file(&path, None, 0).unwrap();
        assert!(back.same(&sample(), 1e-9));
    }
}
