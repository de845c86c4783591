//! Cell coordinates and A1 notation.
//!
//! A [`CellAddress`] is the concrete `(document, sheet, row, column)` location
//! of a value. Rows and columns are zero-based internally and rendered as
//! one-based A1 references (`B7`) only at the formula boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::variant::DocumentId;

/// A concrete cell location inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub document: DocumentId,
    pub sheet: String,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(document: DocumentId, sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            document,
            sheet: sheet.into(),
            row,
            col,
        }
    }

    /// Returns the `(sheet, row, col)` coordinate, ignoring the document.
    pub fn coord(&self) -> (&str, u32, u32) {
        (&self.sheet, self.row, self.col)
    }

    /// Relative A1 reference without a sheet prefix, e.g. `C12`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_name(self.col), self.row + 1)
    }

    /// Reference text as it appears in a formula hosted on `host_sheet`.
    ///
    /// Same-sheet references are bare; cross-sheet references carry the
    /// quoted sheet name.
    pub fn reference_from(&self, host_sheet: &str) -> String {
        if self.sheet == host_sheet {
            self.a1()
        } else {
            format!("{}!{}", quote_sheet(&self.sheet), self.a1())
        }
    }

    /// The address `rows` below and `cols` right of this one.
    pub fn offset(&self, rows: u32, cols: u32) -> Self {
        Self {
            document: self.document,
            sheet: self.sheet.clone(),
            row: self.row + rows,
            col: self.col + cols,
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}!{}", self.document, quote_sheet(&self.sheet), self.a1())
    }
}

/// Spreadsheet column letters for a zero-based column index (0 -> `A`, 26 -> `AA`).
pub fn column_name(col: u32) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Parses a relative A1 reference (`B7`) into zero-based `(row, col)`.
pub fn parse_a1(text: &str) -> Option<(u32, u32)> {
    let text = text.trim().trim_start_matches('$');
    let split = text.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = text.split_at(split);
    let letters = letters.trim_end_matches('$');
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        col = col.checked_mul(26)? + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

/// Quotes a sheet name for use in a formula when it is not a plain identifier.
pub fn quote_sheet(name: &str) -> String {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::ModelKind;

    #[test]
    fn column_letters() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn parse_a1_roundtrips_column_names() {
        for col in [0, 1, 25, 26, 51, 701, 702] {
            let text = format!("{}{}", column_name(col), 9);
            assert_eq!(parse_a1(&text), Some((8, col)));
        }
        assert_eq!(parse_a1("$C$4"), Some((3, 2)));
        assert_eq!(parse_a1("A0"), None);
        assert_eq!(parse_a1("12"), None);
        assert_eq!(parse_a1("B"), None);
    }

    #[test]
    fn reference_text_depends_on_host_sheet() {
        let addr = CellAddress::new(DocumentId::Integrated, "Price Trajectory", 3, 4);
        assert_eq!(addr.reference_from("Price Trajectory"), "E4");
        assert_eq!(addr.reference_from("Dashboard"), "'Price Trajectory'!E4");

        let plain = CellAddress::new(DocumentId::Standalone(ModelKind::Fee), "Glossary", 0, 1);
        assert_eq!(plain.reference_from("Notes"), "Glossary!B1");
    }

    #[test]
    fn quote_sheet_escapes_apostrophes() {
        assert_eq!(quote_sheet("Dashboard"), "Dashboard");
        assert_eq!(quote_sheet("Treasury & POL"), "'Treasury & POL'");
        assert_eq!(quote_sheet("Host's view"), "'Host''s view'");
        assert_eq!(quote_sheet("2025"), "'2025'");
    }

    #[test]
    fn display_includes_document() {
        let addr = CellAddress::new(DocumentId::Standalone(ModelKind::Emission), "Glossary", 4, 2);
        assert_eq!(addr.to_string(), "emission/Glossary!C5");
    }
}
