use chrono::NaiveDate;

use crate::table::CellValue;

const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";

/// Which filter widget and predicate a column uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    None,
    Substring,
    Exact,
    DateInterval,
}

/// Active filter value for one column. The variant must match the column's
/// [`FilterKind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterValue {
    Substring(String),
    Exact(String),
    DateInterval(DateInterval),
}

impl FilterValue {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterValue::Substring(_) => FilterKind::Substring,
            FilterValue::Exact(_) => FilterKind::Exact,
            FilterValue::DateInterval(_) => FilterKind::DateInterval,
        }
    }

    /// A void value places no constraint on the column.
    pub fn is_void(&self) -> bool {
        match self {
            FilterValue::Substring(needle) => needle.is_empty(),
            FilterValue::Exact(expected) => expected.is_empty(),
            FilterValue::DateInterval(interval) => interval.is_void(),
        }
    }

    pub fn matches(&self, cell: &CellValue) -> bool {
        match self {
            FilterValue::Substring(needle) => substring_matches(cell, needle),
            FilterValue::Exact(expected) => exact_matches(cell, expected),
            FilterValue::DateInterval(interval) => interval.matches(cell),
        }
    }
}

/// Inclusive calendar-day bounds; either side may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateInterval {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

impl DateInterval {
    pub fn new(min: Option<NaiveDate>, max: Option<NaiveDate>) -> Self {
        Self { min, max }
    }

    /// Builds an interval from `YYYY-MM-DD` inputs. Blank or unparseable
    /// bounds are left open.
    pub fn parse(min: &str, max: &str) -> Self {
        Self::new(parse_date_input(min), parse_date_input(max))
    }

    pub fn is_void(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn matches(&self, cell: &CellValue) -> bool {
        if self.is_void() {
            return true;
        }
        let Some(day) = cell.as_date() else {
            return false;
        };
        self.min.is_none_or(|min| day >= min) && self.max.is_none_or(|max| day <= max)
    }
}

pub fn parse_date_input(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_INPUT_FORMAT).ok()
}

pub fn format_date_input(day: NaiveDate) -> String {
    day.format(DATE_INPUT_FORMAT).to_string()
}

/// Case-insensitive containment. An absent cell never matches a set needle.
pub fn substring_matches(cell: &CellValue, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    match cell.as_text() {
        Some(text) => text.to_lowercase().contains(&needle.to_lowercase()),
        None => false,
    }
}

/// Strict equality against the cell's textual value.
pub fn exact_matches(cell: &CellValue, expected: &str) -> bool {
    if expected.is_empty() {
        return true;
    }
    cell.as_text().is_some_and(|text| text == expected)
}
