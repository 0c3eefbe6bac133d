use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::{Map, Value};

/// The analytical query collaborator's table store.
pub trait AnalyticsTables {
    /// Drop the table backing layer `id`, if one was created.
    fn drop_table(&self, id: &str);
}

/// Attribute rows of one layer, shared read-only with collaborators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableData {
    /// Column names in first-seen order.
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl TableData {
    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        let mut columns: IndexSet<String> = IndexSet::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key.as_str()) {
                    columns.insert(key.clone());
                }
            }
        }
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-layer tabular data. Only layer sync writes or evicts entries.
#[derive(Default)]
pub struct TabularCache {
    entries: HashMap<String, Rc<TableData>>,
    analytics: Option<Rc<dyn AnalyticsTables>>,
}

impl TabularCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analytics(mut self, analytics: Rc<dyn AnalyticsTables>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn insert(&mut self, id: &str, table: TableData) {
        log::debug!("Caching {} row(s) for layer {}", table.len(), id);
        self.entries.insert(id.to_string(), Rc::new(table));
    }

    pub fn get(&self, id: &str) -> Option<Rc<TableData>> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Evict the rows for `id` and drop any backing analytical table.
    pub fn evict(&mut self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        if let Some(analytics) = &self.analytics {
            analytics.drop_table(id);
        }
        removed
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct DroppedTables(RefCell<Vec<String>>);

    impl AnalyticsTables for DroppedTables {
        fn drop_table(&self, id: &str) {
            self.0.borrow_mut().push(id.to_string());
        }
    }

    fn row(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_columns_first_seen_order() {
        let table = TableData::from_rows(vec![
            row(json!({"name": "a", "mag": 3})),
            row(json!({"depth": "10", "name": "b", "mag": "4.5"})),
        ]);
        assert_eq!(table.columns, ["name", "mag", "depth"]);
    }

    #[test]
    fn test_evict_drops_analytics_table() {
        let dropped = Rc::new(DroppedTables::default());
        let mut cache = TabularCache::new().with_analytics(dropped.clone());
        cache.insert("quakes", TableData::from_rows(vec![row(json!({"mag": 1}))]));
        let shared = cache.get("quakes").unwrap();
        assert!(cache.evict("quakes"));
        assert!(!cache.contains("quakes"));
        assert_eq!(shared.len(), 1);
        assert_eq!(*dropped.0.borrow(), ["quakes"]);
    }
}
