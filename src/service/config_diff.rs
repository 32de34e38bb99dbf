use indexmap::{IndexMap, IndexSet};

use crate::db::rows::{text_of, Row};

/// 提交集合与已存集合的差异 (整体替换语义)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigDiff {
    pub to_insert: Vec<Row>,
    pub to_update: Vec<Row>,
    pub to_delete: Vec<String>,
}

fn row_id(row: &Row) -> Option<String> {
    text_of(row, "ID")
}

/// 按 `ID` 划分: 新增 / 更新 / 删除. 重复的 `ID` 只保留最后一行
pub fn diff_configs(submitted: Vec<Row>, current_ids: &[String]) -> ConfigDiff {
    let current: IndexSet<&str> = current_ids.iter().map(String::as_str).collect();
    let mut by_id: IndexMap<String, Row> = IndexMap::new();
    let mut diff = ConfigDiff::default();

    for row in submitted {
        match row_id(&row) {
            Some(id) => {
                by_id.insert(id, row);
            }
            None => diff.to_insert.push(row),
        }
    }

    diff.to_delete = current
        .iter()
        .filter(|id| !by_id.contains_key(**id))
        .map(|id| id.to_string())
        .collect();

    for (id, row) in by_id {
        if current.contains(id.as_str()) {
            diff.to_update.push(row);
        } else {
            diff.to_insert.push(row);
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::collections::HashSet;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn ids(rows: &[Row]) -> HashSet<String> {
        rows.iter().filter_map(row_id).collect()
    }

    #[test]
    fn partitions_by_id() {
        let submitted = vec![
            row(json!({ "ID": "a", "VALUE": 1 })),
            row(json!({ "ID": "c", "VALUE": 3 })),
            row(json!({ "ID": "d", "VALUE": 4 })),
        ];
        let current = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let diff = diff_configs(submitted, &current);
        assert_eq!(ids(&diff.to_insert), HashSet::from(["d".to_string()]));
        assert_eq!(ids(&diff.to_update), HashSet::from(["a".to_string(), "c".to_string()]));
        assert_eq!(diff.to_delete, vec!["b".to_string()]);
    }

    #[test]
    fn union_covers_submission_and_sets_are_disjoint() {
        let submitted: Vec<Row> = ["1", "2", "3", "4"]
            .iter()
            .map(|id| row(json!({ "ID": id })))
            .collect();
        let current: Vec<String> = ["3", "4", "5", "6"].iter().map(|s| s.to_string()).collect();

        let diff = diff_configs(submitted.clone(), &current);
        let inserted = ids(&diff.to_insert);
        let updated = ids(&diff.to_update);
        let deleted: HashSet<String> = diff.to_delete.iter().cloned().collect();

        assert_eq!(&inserted | &updated, ids(&submitted));
        assert_eq!(deleted, HashSet::from(["5".to_string(), "6".to_string()]));
        assert!(inserted.is_disjoint(&updated));
        assert!(inserted.is_disjoint(&deleted));
        assert!(updated.is_disjoint(&deleted));
    }

    #[test]
    fn empty_submission_deletes_everything() {
        let diff = diff_configs(Vec::new(), &["x".to_string()]);
        assert!(diff.to_insert.is_empty() && diff.to_update.is_empty());
        assert_eq!(diff.to_delete, vec!["x".to_string()]);
    }

    #[test]
    fn repeated_ids_keep_the_last_row() {
        let submitted = vec![
            row(json!({ "ID": "n", "VALUE": 1 })),
            row(json!({ "ID": "n", "VALUE": 2 })),
            row(json!({ "ID": "a", "VALUE": 3 })),
            row(json!({ "ID": "a", "VALUE": 4 })),
        ];
        let diff = diff_configs(submitted, &["a".to_string()]);

        assert_eq!(diff.to_insert, vec![row(json!({ "ID": "n", "VALUE": 2 }))]);
        assert_eq!(diff.to_update, vec![row(json!({ "ID": "a", "VALUE": 4 }))]);
        assert!(diff.to_delete.is_empty());
    }

    #[test]
    fn rows_without_id_are_inserts() {
        let diff = diff_configs(vec![row(json!({ "TYPE": "text" }))], &[]);
        assert_eq!(diff.to_insert.len(), 1);
    }
}
