//! Cell reference and range types

use crate::error::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A canonical cell reference (e.g., "A1", "AB12")
///
/// Column letters are Excel-style base-26 (A-Z, AA, AB, ...) and rows are
/// 1-based in text. Absolute markers (`$`) are accepted when parsing but carry no
/// meaning and are dropped, so `$B$2` and `B2` are the same reference.
///
/// References order row-major (row first, then column), which is the iteration
/// order of a sheet's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, B=1, ..., Z=25, AA=26)
    pub col: u16,
}

impl CellRef {
    /// Create a new cell reference from 0-based indices
    pub fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Parse a cell reference from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use normsheet_core::CellRef;
    ///
    /// let cell = CellRef::parse("A1").unwrap();
    /// assert_eq!((cell.row, cell.col), (0, 0));
    ///
    /// let cell = CellRef::parse("$C$21").unwrap();
    /// assert_eq!((cell.row, cell.col), (20, 2));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
        if cleaned.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let col_end = cleaned
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(cleaned.len());
        if col_end == 0 {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }

        let row_str = &cleaned[col_end..];
        if row_str.is_empty() || !row_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("invalid row number in '{}'", s)));
        }

        let col = Self::letters_to_column(&cleaned[..col_end])?;
        let row: u32 = row_str
            .parse()
            .map_err(|_| Error::InvalidAddress(format!("invalid row number in '{}'", s)))?;

        // Text rows are 1-based, we use 0-based internally
        if row == 0 {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{}'",
                s
            )));
        }

        Ok(Self { row: row - 1, col })
    }

    /// Convert column index to letters (0 = A, 25 = Z, 26 = AA, etc.)
    pub fn column_to_letters(col: u16) -> String {
        let mut result = String::new();
        let mut n = col as u32 + 1;

        while n > 0 {
            n -= 1;
            let c = ((n % 26) as u8 + b'A') as char;
            result.insert(0, c);
            n /= 26;
        }

        result
    }

    /// Convert column letters to index (A = 0, Z = 25, AA = 26, etc.)
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!(
                    "invalid column letter '{}'",
                    c
                )));
            }
            col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
            if col > u16::MAX as u32 {
                return Err(Error::ColumnOutOfBounds(u16::MAX, u16::MAX));
            }
        }

        Ok((col - 1) as u16)
    }

    /// Format as A1-style string
    pub fn to_a1_string(&self) -> String {
        format!("{}{}", Self::column_to_letters(self.col), self.row + 1)
    }

    /// Create a range from this reference to another
    pub fn to(&self, other: CellRef) -> CellRange {
        CellRange::new(*self, other)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CellRefVisitor;

        impl<'de> Visitor<'de> for CellRefVisitor {
            type Value = CellRef;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an A1-style cell reference")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<CellRef, E> {
                CellRef::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(CellRefVisitor)
    }
}

/// A rectangular range of cells (e.g., "A1:B10"), inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRange {
    /// Start reference (top-left)
    pub start: CellRef,
    /// End reference (bottom-right)
    pub end: CellRef,
}

impl CellRange {
    /// Create a new cell range, normalized so start is top-left
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self {
            start: CellRef::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellRef::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    /// Create a range from row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellRef::new(start_row, start_col),
            CellRef::new(end_row, end_col),
        )
    }

    /// Create a single-cell range
    pub fn single(cell: CellRef) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    /// Parse a range from A1:B10 notation
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(colon_pos) = s.find(':') {
            let start = CellRef::parse(&s[..colon_pos])
                .map_err(|_| Error::InvalidRange(s.to_string()))?;
            let end = CellRef::parse(&s[colon_pos + 1..])
                .map_err(|_| Error::InvalidRange(s.to_string()))?;
            Ok(Self::new(start, end))
        } else {
            let cell = CellRef::parse(s).map_err(|_| Error::InvalidRange(s.to_string()))?;
            Ok(Self::single(cell))
        }
    }

    /// Check if a cell is within this range
    pub fn contains(&self, cell: &CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    /// Get the number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Get the number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Get the total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Whether the range spans a single cell
    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// Check if this range overlaps with another
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// Iterate over all cell references in the range (row by row)
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
        }
    }

    /// Format as A1:B10 string
    pub fn to_a1_string(&self) -> String {
        if self.is_single() {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start, self.end)
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CellRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_a1_string())
    }
}

impl<'de> Deserialize<'de> for CellRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CellRange::parse(&text).map_err(de::Error::custom)
    }
}

/// Iterator over cells in a range
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
}

impl Iterator for CellRangeIterator {
    type Item = CellRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row > self.range.end.row {
            return None;
        }

        let cell = CellRef::new(self.current_row, self.current_col);

        if self.current_col >= self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_letters() {
        assert_eq!(CellRef::column_to_letters(0), "A");
        assert_eq!(CellRef::column_to_letters(25), "Z");
        assert_eq!(CellRef::column_to_letters(26), "AA");
        assert_eq!(CellRef::column_to_letters(49), "AX");
        assert_eq!(CellRef::column_to_letters(701), "ZZ");
        assert_eq!(CellRef::column_to_letters(702), "AAA");
    }

    #[test]
    fn test_letters_to_column() {
        assert_eq!(CellRef::letters_to_column("A").unwrap(), 0);
        assert_eq!(CellRef::letters_to_column("Z").unwrap(), 25);
        assert_eq!(CellRef::letters_to_column("AA").unwrap(), 26);
        assert_eq!(CellRef::letters_to_column("ab").unwrap(), 27);
        assert!(CellRef::letters_to_column("A1").is_err());
    }

    #[test]
    fn test_parse_strips_absolute_markers() {
        for text in ["C21", "$C$21", "$C21", "C$21"] {
            assert_eq!(CellRef::parse(text).unwrap(), CellRef::new(20, 2), "{text}");
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(CellRef::parse("").is_err());
        assert!(CellRef::parse("A").is_err());
        assert!(CellRef::parse("1").is_err());
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("A1B").is_err());
        assert!(CellRef::parse("A-1").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(CellRef::new(4, 1).to_string(), "B5");
        assert_eq!(CellRef::new(0, 26).to_string(), "AA1");
    }

    #[test]
    fn test_ordering_is_row_major() {
        let mut refs = vec![
            CellRef::parse("B1").unwrap(),
            CellRef::parse("A2").unwrap(),
            CellRef::parse("A1").unwrap(),
        ];
        refs.sort();
        let text: Vec<String> = refs.iter().map(|r| r.to_string()).collect();
        assert_eq!(text, vec!["A1", "B1", "A2"]);
    }

    #[test]
    fn test_range_normalizes_and_iterates() {
        let range = CellRange::parse("B2:A1").unwrap();
        assert_eq!(range.to_string(), "A1:B2");
        assert_eq!(range.cell_count(), 4);

        let cells: Vec<String> = range.cells().map(|c| c.to_string()).collect();
        assert_eq!(cells, vec!["A1", "B1", "A2", "B2"]);
    }

    #[test]
    fn test_range_contains_and_overlaps() {
        let range = CellRange::parse("A1:C3").unwrap();
        assert!(range.contains(&CellRef::parse("B2").unwrap()));
        assert!(!range.contains(&CellRef::parse("D1").unwrap()));

        assert!(range.overlaps(&CellRange::parse("C3:D4").unwrap()));
        assert!(!range.overlaps(&CellRange::parse("D1:E2").unwrap()));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&CellRef::new(4, 1)).unwrap();
        assert_eq!(json, "\"B5\"");
        let back: CellRef = serde_json::from_str("\"$B$5\"").unwrap();
        assert_eq!(back, CellRef::new(4, 1));

        let range: CellRange = serde_json::from_str("\"A1:B2\"").unwrap();
        assert_eq!(serde_json::to_string(&range).unwrap(), "\"A1:B2\"");
    }
}
