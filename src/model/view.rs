use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::record::{NO_ERROR, PluginRecord};
use crate::model::registry::{RecordHandle, Registry};

/// Sortable table columns, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Category,
    Id,
    Vendor,
    Path,
    Enabled,
    ErrorCode,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Category,
        Column::Id,
        Column::Vendor,
        Column::Path,
        Column::Enabled,
        Column::ErrorCode,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Column::Category => "Category",
            Column::Id => "ID",
            Column::Vendor => "Vendor",
            Column::Path => "Path",
            Column::Enabled => "Enabled",
            Column::ErrorCode => "Error Code",
        }
    }
}

/// The seven display fields of one table row.
#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub category: String,
    pub id: String,
    pub vendor: String,
    pub path: String,
    pub enabled: &'static str,
    pub error_code: String,
    pub delete: &'static str,
}

/// Pure render of one record into its display fields, with placeholder
/// substitution for absent values.
pub fn display_row(record: &PluginRecord) -> DisplayRow {
    let error_code = match record.error_code() {
        NO_ERROR => String::new(),
        code => code.to_string(),
    };

    DisplayRow {
        category: record.category().to_string(),
        id: record.id().to_string(),
        vendor: record.vendor().to_string(),
        path: record.path().to_string(),
        enabled: if record.enabled() { "✔" } else { "✘" },
        error_code,
        delete: "❌",
    }
}

#[derive(Debug, Clone)]
pub struct ProjectedRow {
    pub handle: RecordHandle,
    pub display: DisplayRow,
}

/// The filtered (and possibly sorted) subset of the store currently on
/// screen. Handles inside are valid until the next store mutation; the
/// projection must be rebuilt before any further interaction after one.
#[derive(Debug, Default)]
pub struct Projection {
    rows: Vec<ProjectedRow>,
}

impl Projection {
    /// Filter the store with a case-insensitive substring query. Rows
    /// come out in store order with freshly minted handles.
    pub fn build(store: &Registry, query: &str) -> Self {
        let rows = store
            .iter_handles()
            .filter(|(_, record)| record.matches(query))
            .map(|(handle, record)| ProjectedRow {
                handle,
                display: display_row(record),
            })
            .collect();

        Self { rows }
    }

    pub fn rows(&self) -> &[ProjectedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&ProjectedRow> {
        self.rows.get(index)
    }

    /// Stable sort of the current rows by one column. Rows whose handles
    /// no longer resolve compare equal and keep their position.
    pub fn sort_by(&mut self, store: &Registry, column: Column, ascending: bool) {
        self.rows.sort_by(|a, b| {
            let (Some(ra), Some(rb)) = (store.get(a.handle), store.get(b.handle)) else {
                return Ordering::Equal;
            };
            let ordering = compare_records(ra, rb, column);
            if ascending { ordering } else { ordering.reverse() }
        });
    }
}

/// String columns compare the placeholder-substituted display values;
/// Enabled compares booleans (disabled first); ErrorCode compares the raw
/// value with missing treated as the no-error sentinel.
fn compare_records(a: &PluginRecord, b: &PluginRecord, column: Column) -> Ordering {
    match column {
        Column::Category => a.category().cmp(b.category()),
        Column::Id => a.id().cmp(b.id()),
        Column::Vendor => a.vendor().cmp(b.vendor()),
        Column::Path => a.path().cmp(b.path()),
        Column::Enabled => a.enabled().cmp(&b.enabled()),
        Column::ErrorCode => a.error_code().cmp(&b.error_code()),
    }
}

/// Per-column sort direction memory: the first sort on a column is
/// ascending, repeats flip it, and each column remembers its own state
/// across the session regardless of which column was sorted last.
#[derive(Debug, Default)]
pub struct SortState {
    last_ascending: HashMap<Column, bool>,
}

impl SortState {
    pub fn next_direction(&mut self, column: Column) -> bool {
        let next = !self.last_ascending.get(&column).copied().unwrap_or(false);
        self.last_ascending.insert(column, next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn registry(items: serde_json::Value) -> Registry {
        let serde_json::Value::Array(items) = items else {
            panic!("test registry must be an array");
        };
        Registry::from_records(
            PathBuf::from("/tmp/test.json"),
            items.into_iter().map(PluginRecord::new).collect(),
        )
    }

    fn ids(projection: &Projection) -> Vec<String> {
        projection
            .rows()
            .iter()
            .map(|row| row.display.id.clone())
            .collect()
    }

    fn sample_registry() -> Registry {
        registry(json!([
            { "meta": { "id": "Reverb", "vendor": "Acme" }, "path": "/a/reverb.vst", "enabled": false },
            { "meta": { "id": "Chorus", "vendor": "Bell" }, "path": "/b/chorus.vst", "enabled": true, "errorCode": 2 },
            { "meta": { "id": "Delay", "vendor": "Acme" }, "path": "/c/delay.vst", "errorCode": -1 }
        ]))
    }

    #[test]
    fn empty_query_projects_every_record_in_store_order() {
        let store = sample_registry();
        let projection = Projection::build(&store, "");
        assert_eq!(projection.len(), store.len());
        assert_eq!(ids(&projection), ["Reverb", "Chorus", "Delay"]);
    }

    #[test]
    fn query_matches_substrings_of_any_field() {
        let store = sample_registry();
        assert_eq!(ids(&Projection::build(&store, "acme")), ["Reverb", "Delay"]);
        assert_eq!(ids(&Projection::build(&store, "/b/")), ["Chorus"]);
        assert_eq!(ids(&Projection::build(&store, "CHOR")), ["Chorus"]);
        assert!(Projection::build(&store, "nonexistent").is_empty());
    }

    #[test]
    fn sort_by_vendor_is_stable() {
        let store = sample_registry();
        let mut projection = Projection::build(&store, "");
        projection.sort_by(&store, Column::Vendor, true);
        // Reverb and Delay share the vendor "Acme" and keep store order.
        assert_eq!(ids(&projection), ["Reverb", "Delay", "Chorus"]);
    }

    #[test]
    fn sort_descending_reverses_keys_not_equal_runs() {
        let store = sample_registry();
        let mut projection = Projection::build(&store, "");
        projection.sort_by(&store, Column::Vendor, false);
        assert_eq!(ids(&projection), ["Chorus", "Reverb", "Delay"]);
    }

    #[test]
    fn enabled_sorts_disabled_first() {
        let store = sample_registry();
        let mut projection = Projection::build(&store, "");
        projection.sort_by(&store, Column::Enabled, true);
        assert_eq!(ids(&projection), ["Reverb", "Delay", "Chorus"]);
    }

    #[test]
    fn missing_error_code_sorts_like_explicit_sentinel() {
        let store = registry(json!([
            { "meta": { "id": "A" }, "errorCode": -1 },
            { "meta": { "id": "B" } },
            { "meta": { "id": "C" }, "errorCode": 7 }
        ]));
        let mut projection = Projection::build(&store, "");
        projection.sort_by(&store, Column::ErrorCode, true);
        // A and B compare equal (-1) and keep their relative order.
        assert_eq!(ids(&projection), ["A", "B", "C"]);

        projection.sort_by(&store, Column::ErrorCode, false);
        assert_eq!(ids(&projection), ["C", "A", "B"]);
    }

    #[test]
    fn display_row_substitutes_and_hides_sentinels() {
        let row = display_row(&PluginRecord::new(json!({ "enabled": true, "errorCode": -1 })));
        assert_eq!(row.category, "Unknown Category");
        assert_eq!(row.id, "Unknown ID");
        assert_eq!(row.vendor, "Unknown Vendor");
        assert_eq!(row.path, "Unknown Path");
        assert_eq!(row.enabled, "✔");
        assert_eq!(row.error_code, "");
        assert_eq!(row.delete, "❌");

        let row = display_row(&PluginRecord::new(json!({ "errorCode": 5 })));
        assert_eq!(row.enabled, "✘");
        assert_eq!(row.error_code, "5");
    }

    #[test]
    fn sort_direction_flips_independently_per_column() {
        let mut state = SortState::default();
        assert!(state.next_direction(Column::Vendor)); // ascending first
        assert!(!state.next_direction(Column::Vendor)); // then descending
        // Another column starts fresh regardless of the vendor state.
        assert!(state.next_direction(Column::Path));
        assert!(state.next_direction(Column::Vendor)); // and vendor flips back
    }
}
