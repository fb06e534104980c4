//! Matrix Market coordinate reader
//!
//! Supports `matrix coordinate` files with `real`, `integer` or `pattern` values and
//! `general`, `symmetric` or `skew-symmetric` structure. Symmetric files store one
//! triangle; the mirrored entries are added on read.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SpmvError};
use crate::matrix::CooMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Integer,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symmetry {
    General,
    Symmetric,
    SkewSymmetric,
}

fn parse_error(line: usize, message: impl Into<String>) -> SpmvError {
    SpmvError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_banner(line_no: usize, banner: &str) -> Result<(Field, Symmetry)> {
    let tokens: Vec<String> = banner
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect();
    if tokens.len() != 5 || tokens[0] != "%%matrixmarket" {
        return Err(parse_error(line_no, "malformed Matrix Market banner"));
    }
    if tokens[1] != "matrix" || tokens[2] != "coordinate" {
        return Err(parse_error(
            line_no,
            format!("only sparse 'matrix coordinate' files are supported, got '{} {}'", tokens[1], tokens[2]),
        ));
    }
    let field = match tokens[3].as_str() {
        "real" | "double" => Field::Real,
        "integer" => Field::Integer,
        "pattern" => Field::Pattern,
        other => return Err(parse_error(line_no, format!("unsupported value field '{}'", other))),
    };
    let symmetry = match tokens[4].as_str() {
        "general" => Symmetry::General,
        "symmetric" => Symmetry::Symmetric,
        "skew-symmetric" => Symmetry::SkewSymmetric,
        other => return Err(parse_error(line_no, format!("unsupported symmetry '{}'", other))),
    };
    Ok((field, symmetry))
}

fn parse_usize(line_no: usize, token: Option<&str>, what: &str) -> Result<usize> {
    token
        .ok_or_else(|| parse_error(line_no, format!("missing {}", what)))?
        .parse()
        .map_err(|_| parse_error(line_no, format!("invalid {}", what)))
}

/// Converts a 1-based index to 0-based, checking it against `bound`.
fn one_based(line_no: usize, index: usize, bound: usize, what: &str) -> Result<usize> {
    if index == 0 || index > bound {
        return Err(parse_error(
            line_no,
            format!("{} index {} outside [1, {}]", what, index, bound),
        ));
    }
    Ok(index - 1)
}

/// Reads a Matrix Market file into coordinate form.
pub fn read_matrix_market<P: AsRef<Path>>(path: P) -> Result<CooMatrix<f64>> {
    let file = File::open(path.as_ref())?;
    let coo = parse_matrix_market(BufReader::new(file))?;
    debug!(
        path = %path.as_ref().display(),
        n_rows = coo.n_rows,
        n_cols = coo.n_cols,
        nnz = coo.nnz(),
        "read Matrix Market file"
    );
    Ok(coo)
}

/// Parses Matrix Market text. A file without a banner is read as `real general`.
pub fn parse_matrix_market<R: BufRead>(reader: R) -> Result<CooMatrix<f64>> {
    let mut field = Field::Real;
    let mut symmetry = Symmetry::General;
    let mut header: Option<(usize, usize, usize)> = None;
    let mut coo = CooMatrix::new(0, 0);
    let mut read = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();

        if idx == 0 && trimmed.starts_with("%%") {
            (field, symmetry) = parse_banner(line_no, trimmed)?;
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let Some((n_rows, n_cols, nnz)) = header else {
            let n_rows = parse_usize(line_no, tokens.next(), "row count")?;
            let n_cols = parse_usize(line_no, tokens.next(), "column count")?;
            let nnz = parse_usize(line_no, tokens.next(), "nonzero count")?;
            if symmetry != Symmetry::General && n_rows != n_cols {
                return Err(parse_error(line_no, "symmetric matrix must be square"));
            }
            let capacity = if symmetry == Symmetry::General { nnz } else { 2 * nnz };
            coo = CooMatrix::new(n_rows, n_cols);
            coo.entries.reserve(capacity);
            header = Some((n_rows, n_cols, nnz));
            continue;
        };

        if read == nnz {
            return Err(parse_error(line_no, format!("more than the declared {} entries", nnz)));
        }

        let row = one_based(line_no, parse_usize(line_no, tokens.next(), "row index")?, n_rows, "row")?;
        let col = one_based(line_no, parse_usize(line_no, tokens.next(), "column index")?, n_cols, "column")?;
        let value = match field {
            Field::Pattern => 1.0,
            Field::Real | Field::Integer => tokens
                .next()
                .ok_or_else(|| parse_error(line_no, "missing value"))?
                .parse::<f64>()
                .map_err(|_| parse_error(line_no, "invalid value"))?,
        };

        coo.push(row, col, value);
        if row != col {
            match symmetry {
                Symmetry::General => {}
                Symmetry::Symmetric => coo.push(col, row, value),
                Symmetry::SkewSymmetric => coo.push(col, row, -value),
            }
        }
        read += 1;
    }

    match header {
        None => Err(parse_error(0, "missing size line")),
        Some((_, _, nnz)) if read != nnz => Err(parse_error(
            0,
            format!("declared {} entries but found {}", nnz, read),
        )),
        Some(_) => Ok(coo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_matrix_market_general() {
        let text = "%%MatrixMarket matrix coordinate real general\n\
                    % a comment\n\
                    3 3 5\n\
                    1 1 1.0\n\
                    1 3 2.0\n\
                    2 2 3.0\n\
                    3 1 4.0\n\
                    3 3 5.0\n";
        let coo = parse_matrix_market(Cursor::new(text)).unwrap();
        assert_eq!((coo.n_rows, coo.n_cols), (3, 3));
        assert_eq!(coo.nnz(), 5);
        assert_eq!(coo.entries[1], (0, 2, 2.0));
        assert_eq!(coo.entries[4], (2, 2, 5.0));
    }

    #[test]
    fn test_matrix_market_symmetric_pattern() {
        let text = "%%MatrixMarket matrix coordinate pattern symmetric\n\
                    3 3 3\n\
                    1 1\n\
                    2 1\n\
                    3 2\n";
        let coo = parse_matrix_market(Cursor::new(text)).unwrap();
        assert_eq!(
            coo.entries,
            vec![(0, 0, 1.0), (1, 0, 1.0), (0, 1, 1.0), (2, 1, 1.0), (1, 2, 1.0)]
        );
    }

    #[test]
    fn test_matrix_market_skew_symmetric() {
        let text = "%%MatrixMarket matrix coordinate integer skew-symmetric\n2 2 1\n2 1 3\n";
        let coo = parse_matrix_market(Cursor::new(text)).unwrap();
        assert_eq!(coo.entries, vec![(1, 0, 3.0), (0, 1, -3.0)]);
    }

    #[test]
    fn test_matrix_market_without_banner() {
        let coo = parse_matrix_market(Cursor::new("2 2 1\n1 2 0.5\n")).unwrap();
        assert_eq!(coo.entries, vec![(0, 1, 0.5)]);
    }

    #[test]
    fn test_matrix_market_errors() {
        let dense = "%%MatrixMarket matrix array real general\n2 2\n";
        assert!(matches!(parse_matrix_market(Cursor::new(dense)), Err(SpmvError::Parse { line: 1, .. })));

        let short = "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 1.0\n";
        assert!(parse_matrix_market(Cursor::new(short)).is_err());

        let zero_index = "%%MatrixMarket matrix coordinate real general\n2 2 1\n0 1 1.0\n";
        assert!(matches!(
            parse_matrix_market(Cursor::new(zero_index)),
            Err(SpmvError::Parse { line: 3, .. })
        ));

        let too_big = "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 3 1.0\n";
        assert!(parse_matrix_market(Cursor::new(too_big)).is_err());
    }

    #[test]
    fn test_read_from_file() {
        let path = std::env::temp_dir().join(format!("distspmv-mm-{}.mtx", std::process::id()));
        std::fs::write(&path, "%%MatrixMarket matrix coordinate real general\n2 2 2\n1 1 2.0\n2 2 3.0\n")
            .unwrap();
        let coo = read_matrix_market(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(coo.entries, vec![(0, 0, 2.0), (1, 1, 3.0)]);

        assert!(matches!(read_matrix_market(&path), Err(SpmvError::Io(_))));
    }
}
