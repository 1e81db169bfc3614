//! Delimited text: a header row followed by rows with X and Y columns.

use super::LineFormat;
use crate::bounding_box::BoundingBox;
use crate::config::Column;

const X_NAMES: [&str; 5] = ["x", "lon", "lng", "long", "longitude"];
const Y_NAMES: [&str; 3] = ["y", "lat", "latitude"];

/// Parses delimited rows into point boxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedFormat {
    separator: char,
    x: usize,
    y: usize,
}

impl DelimitedFormat {
    pub fn new(separator: char, x: usize, y: usize) -> Self {
        Self { separator, x, y }
    }

    /// Resolves separator and coordinate columns from the header row.
    ///
    /// `extension` is the lowercase source file extension, used for the
    /// `.tsv` separator default.
    pub fn from_header(
        header: &[u8],
        separator: Option<char>,
        extension: Option<&str>,
        x_column: Option<&Column>,
        y_column: Option<&Column>,
    ) -> Result<Self, String> {
        let header =
            std::str::from_utf8(header).map_err(|_| "header is not valid UTF-8".to_string())?;
        let separator = separator.unwrap_or_else(|| match extension {
            Some("tsv") => '\t',
            _ => detect_separator(header),
        });
        let names: Vec<String> = split_fields(header, separator)
            .into_iter()
            .map(|f| unquote(f).to_ascii_lowercase())
            .collect();

        let x = resolve_column(&names, x_column, &X_NAMES, "X")?;
        let y = resolve_column(&names, y_column, &Y_NAMES, "Y")?;
        if x == y {
            return Err(format!("X and Y resolve to the same column {}", x));
        }

        log::debug!(
            "Delimited header: separator {:?}, X column {}, Y column {}",
            separator,
            x,
            y
        );
        Ok(Self::new(separator, x, y))
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn x_column(&self) -> usize {
        self.x
    }

    pub fn y_column(&self) -> usize {
        self.y
    }
}

impl LineFormat for DelimitedFormat {
    fn parse_line(&self, line: &[u8]) -> Result<BoundingBox, String> {
        let line = std::str::from_utf8(line).map_err(|_| "row is not valid UTF-8".to_string())?;
        let fields = split_fields(line, self.separator);
        let needed = self.x.max(self.y) + 1;
        if fields.len() < needed {
            return Err(format!(
                "row has {} fields, expected at least {}",
                fields.len(),
                needed
            ));
        }

        let x = number(fields[self.x], "X")?;
        let y = number(fields[self.y], "Y")?;
        Ok(BoundingBox::point(x, y))
    }
}

/// Tab wins, then `;` when the header has no comma, else comma.
fn detect_separator(header: &str) -> char {
    if header.contains('\t') {
        '\t'
    } else if header.contains(';') && !header.contains(',') {
        ';'
    } else {
        ','
    }
}

fn resolve_column(
    names: &[String],
    configured: Option<&Column>,
    candidates: &[&str],
    axis: &str,
) -> Result<usize, String> {
    match configured {
        Some(Column::Index(index)) if *index < names.len() => Ok(*index),
        Some(Column::Index(index)) => Err(format!(
            "{} column {} is out of range, header has {} columns",
            axis,
            index,
            names.len()
        )),
        Some(Column::Name(name)) => {
            let wanted = name.trim().to_ascii_lowercase();
            names
                .iter()
                .position(|n| *n == wanted)
                .ok_or_else(|| format!("{} column {:?} not found in header", axis, name))
        }
        None => names
            .iter()
            .position(|n| candidates.contains(&n.as_str()))
            .ok_or_else(|| {
                format!(
                    "no {} column in header, expected one of {:?}",
                    axis, candidates
                )
            }),
    }
}

/// Splits on `separator`, ignoring separators inside double quotes.
fn split_fields(line: &str, separator: char) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == separator && !quoted {
            fields.push(&line[start..i]);
            start = i + c.len_utf8();
        }
    }
    fields.push(&line[start..]);
    fields
}

fn unquote(field: &str) -> &str {
    let field = field.trim();
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
        .trim()
}

fn number(field: &str, axis: &str) -> Result<f64, String> {
    let text = unquote(field);
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Err(format!("non-finite {} value {:?}", axis, text)),
        Err(_) => Err(format!("{} value {:?} is not a number", axis, text)),
    }
}
