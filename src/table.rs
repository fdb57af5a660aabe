use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::{
    domain::parse_timestamp,
    filter::{FilterKind, FilterValue, parse_date_input},
};

/// Value extracted from a row by a column accessor.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(i64),
    Date(DateTime<Utc>),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Textual form used by the substring and exact predicates.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::Text(text) => Some(Cow::Borrowed(text)),
            CellValue::Number(number) => Some(Cow::Owned(number.to_string())),
            CellValue::Date(ts) => Some(Cow::Owned(ts.to_rfc3339())),
            CellValue::Missing => None,
        }
    }

    /// Calendar day of the cell, if it holds or parses as a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Date(ts) => Some(ts.date_naive()),
            CellValue::Text(text) => parse_timestamp(text)
                .map(|ts| ts.date_naive())
                .or_else(|| parse_date_input(text)),
            CellValue::Number(_) | CellValue::Missing => None,
        }
    }

    /// Ordering between two present values.
    fn compare_present(&self, other: &CellValue) -> Ordering {
        match (self, other) {
            (CellValue::Number(a), CellValue::Number(b)) => a.cmp(b),
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::Text(a), CellValue::Text(b)) => a.cmp(b),
            (a, b) => a.as_text().cmp(&b.as_text()),
        }
    }
}

/// Missing values sort after present ones in both directions.
pub fn compare_cells(a: &CellValue, b: &CellValue, descending: bool) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = a.compare_present(b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

pub type Accessor<R> = fn(&R) -> CellValue;
pub type Formatter = fn(&CellValue) -> String;

pub struct ColumnDescriptor<R> {
    pub id: &'static str,
    pub header: &'static str,
    pub accessor: Accessor<R>,
    pub formatter: Formatter,
    pub filter_kind: FilterKind,
    pub sortable: bool,
}

impl<R> ColumnDescriptor<R> {
    pub fn display(&self, row: &R) -> String {
        (self.formatter)(&(self.accessor)(row))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column `{column}` expects a {expected:?} filter, got {actual:?}")]
    FilterKindMismatch {
        column: String,
        expected: FilterKind,
        actual: FilterKind,
    },
    #[error("column `{0}` cannot be filtered")]
    NotFilterable(String),
    #[error("column `{0}` cannot be sorted")]
    NotSortable(String),
}

/// Holds rows and column definitions and derives the visible, sorted subset.
pub struct TableEngine<R> {
    columns: Vec<ColumnDescriptor<R>>,
    rows: Vec<R>,
    filters: BTreeMap<&'static str, FilterValue>,
    sort: Option<SortKey>,
}

impl<R> TableEngine<R> {
    pub fn new(columns: Vec<ColumnDescriptor<R>>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            filters: BTreeMap::new(),
            sort: None,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor<R>] {
        &self.columns
    }

    /// Replaces the whole dataset. Filters and sort are kept.
    pub fn set_rows(&mut self, rows: Vec<R>) {
        self.rows = rows;
    }

    pub fn column(&self, id: &str) -> Result<&ColumnDescriptor<R>, TableError> {
        self.columns
            .iter()
            .find(|column| column.id == id)
            .ok_or_else(|| TableError::UnknownColumn(id.to_owned()))
    }

    /// Sets or clears the filter for one column. Void values clear it.
    pub fn set_filter(&mut self, id: &str, value: Option<FilterValue>) -> Result<(), TableError> {
        let column = self.column(id)?;
        let key = column.id;
        let expected = column.filter_kind;
        if expected == FilterKind::None {
            return Err(TableError::NotFilterable(key.to_owned()));
        }

        match value {
            Some(value) if !value.is_void() => {
                if value.kind() != expected {
                    return Err(TableError::FilterKindMismatch {
                        column: key.to_owned(),
                        expected,
                        actual: value.kind(),
                    });
                }
                self.filters.insert(key, value);
            }
            _ => {
                self.filters.remove(key);
            }
        }
        Ok(())
    }

    pub fn filter(&self, id: &str) -> Option<&FilterValue> {
        self.filters.get(id)
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.len()
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn sort(&self) -> Option<SortKey> {
        self.sort
    }

    /// Makes `id` the single active sort column.
    pub fn set_sort(&mut self, id: &str, descending: bool) -> Result<SortKey, TableError> {
        let column = self.column(id)?;
        if !column.sortable {
            return Err(TableError::NotSortable(column.id.to_owned()));
        }
        let key = SortKey {
            column: column.id,
            descending,
        };
        self.sort = Some(key);
        Ok(key)
    }

    /// Header click: flips direction on the active column, otherwise sorts
    /// the new column ascending.
    pub fn toggle_sort(&mut self, id: &str) -> Result<SortKey, TableError> {
        let descending = match self.sort {
            Some(active) if active.column == id => !active.descending,
            _ => false,
        };
        self.set_sort(id, descending)
    }

    /// Rows passing every active filter, in sort order when a sort is set.
    pub fn visible_rows(&self) -> Vec<&R> {
        let mut visible = self.rows_filtered_except(None);
        if let Some(key) = self.sort
            && let Ok(column) = self.column(key.column)
        {
            let mut decorated: Vec<(CellValue, &R)> = visible
                .into_iter()
                .map(|row| ((column.accessor)(row), row))
                .collect();
            // `sort_by` is stable, ties keep dataset order.
            decorated.sort_by(|(a, _), (b, _)| compare_cells(a, b, key.descending));
            visible = decorated.into_iter().map(|(_, row)| row).collect();
        }
        visible
    }

    pub fn visible_count(&self) -> usize {
        self.rows_filtered_except(None).len()
    }

    /// Rows passing every active filter other than the one on `id`.
    pub fn pre_filtered_rows(&self, id: &str) -> Result<Vec<&R>, TableError> {
        let column = self.column(id)?;
        Ok(self.rows_filtered_except(Some(column.id)))
    }

    /// Distinct non-missing values of `id` across its pre-filtered rows, in
    /// first-seen order.
    pub fn options_for(&self, id: &str) -> Result<Vec<String>, TableError> {
        let column = self.column(id)?;
        let mut options: Vec<String> = Vec::new();
        for row in self.rows_filtered_except(Some(column.id)) {
            if let Some(text) = (column.accessor)(row).as_text()
                && !options.iter().any(|existing| existing == text.as_ref())
            {
                options.push(text.into_owned());
            }
        }
        Ok(options)
    }

    /// Earliest and latest day of `id` across its pre-filtered rows.
    pub fn date_bounds_for(
        &self,
        id: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate)>, TableError> {
        let column = self.column(id)?;
        let bounds = self
            .rows_filtered_except(Some(column.id))
            .into_iter()
            .filter_map(|row| (column.accessor)(row).as_date())
            .fold(None, |acc: Option<(NaiveDate, NaiveDate)>, day| match acc {
                None => Some((day, day)),
                Some((min, max)) => Some((min.min(day), max.max(day))),
            });
        Ok(bounds)
    }

    fn rows_filtered_except(&self, skip: Option<&str>) -> Vec<&R> {
        let active: Vec<(&ColumnDescriptor<R>, &FilterValue)> = self
            .filters
            .iter()
            .filter(|(id, _)| Some(**id) != skip)
            .filter_map(|(id, value)| self.column(id).ok().map(|column| (column, value)))
            .collect();

        self.rows
            .iter()
            .filter(|row| {
                active
                    .iter()
                    .all(|(column, value)| value.matches(&(column.accessor)(row)))
            })
            .collect()
    }
}
