use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::case::{convert_keys, KeyCase};
use crate::db::rows::{text_of, Row};

/// 目录树的扁平行 (UPPER_SNAKE)
#[derive(Debug, Default, Clone)]
pub struct CatalogRows {
    pub groups: Vec<Row>,
    pub fields: Vec<Row>,
    pub configs: Vec<Row>,
    pub subconfigs: Vec<Row>,
}

fn order_of(row: &Row) -> i64 {
    row.get("ORDER").and_then(Value::as_i64).unwrap_or(i64::MAX)
}

fn sort_by_order(rows: &mut [Row]) {
    rows.sort_by_key(order_of);
}

/// 按外键分组, 保持原有顺序
fn children_by<'a>(rows: &'a [Row], parent_column: &str) -> HashMap<String, Vec<&'a Row>> {
    let mut by_parent: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in rows {
        if let Some(parent) = text_of(row, parent_column) {
            by_parent.entry(parent).or_default().push(row);
        }
    }
    by_parent
}

/// 组 -> 字段 -> 字段配置 -> 子配置 嵌套树 (camelCase)
///
/// `active_configs` 给定时只保留这些字段配置, 没有剩余配置的字段被移除.
pub fn assemble_groups(rows: CatalogRows, active_configs: Option<&HashSet<String>>) -> Vec<Value> {
    let CatalogRows {
        mut groups,
        mut fields,
        configs,
        subconfigs,
    } = rows;
    sort_by_order(&mut groups);
    sort_by_order(&mut fields);

    let subconfigs_by_config = children_by(&subconfigs, "FIELD_CONFIG_ID");
    let configs_by_field = children_by(&configs, "FIELD_ID");
    let fields_by_group = children_by(&fields, "GROUP_ID");

    let build_config = |config: &Row| -> Row {
        let mut node = config.clone();
        let subs = text_of(config, "ID")
            .and_then(|id| subconfigs_by_config.get(&id))
            .map(|subs| subs.iter().map(|s| Value::Object((*s).clone())).collect())
            .unwrap_or_default();
        node.insert("FIELDS_SUBCONFIGS".to_string(), Value::Array(subs));
        node
    };

    let build_field = |field: &Row| -> Option<Row> {
        let field_configs: Vec<Value> = text_of(field, "ID")
            .and_then(|id| configs_by_field.get(&id))
            .map(|configs| {
                configs
                    .iter()
                    .filter(|c| match active_configs {
                        Some(active) => text_of(c, "ID").is_some_and(|id| active.contains(&id)),
                        None => true,
                    })
                    .map(|c| Value::Object(build_config(c)))
                    .collect()
            })
            .unwrap_or_default();
        if active_configs.is_some() && field_configs.is_empty() {
            return None;
        }
        let mut node = field.clone();
        node.insert("FIELDS_CONFIGS".to_string(), Value::Array(field_configs));
        Some(node)
    };

    groups
        .into_iter()
        .map(|group| {
            let group_fields: Vec<Value> = text_of(&group, "ID")
                .and_then(|id| fields_by_group.get(&id))
                .map(|fields| {
                    fields
                        .iter()
                        .filter_map(|f| build_field(f))
                        .map(Value::Object)
                        .collect()
                })
                .unwrap_or_default();
            let mut node = group;
            node.insert("FIELDS".to_string(), Value::Array(group_fields));
            convert_keys(Value::Object(node), KeyCase::Camel)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    fn sample() -> CatalogRows {
        CatalogRows {
            groups: vec![
                row(json!({ "ID": 2, "NAME": "Lona", "ORDER": 1 })),
                row(json!({ "ID": 1, "NAME": "Medidas", "ORDER": 0 })),
            ],
            fields: vec![
                row(json!({ "ID": 11, "NAME": "Salida", "ORDER": 2, "GROUP_ID": 1 })),
                row(json!({ "ID": 10, "NAME": "Linea", "ORDER": 1, "GROUP_ID": 1 })),
                row(json!({ "ID": 20, "NAME": "Color", "ORDER": 0, "GROUP_ID": 2 })),
            ],
            configs: vec![
                row(json!({ "ID": "c10", "FIELD_ID": 10 })),
                row(json!({ "ID": "c11", "FIELD_ID": 11 })),
                row(json!({ "ID": "c20", "FIELD_ID": 20 })),
            ],
            subconfigs: vec![
                row(json!({ "ID": "s1", "FIELD_CONFIG_ID": "c10", "SHOW_NAME": true, "DATA_UNIT": "cm" })),
            ],
        }
    }

    #[test]
    fn builds_ordered_tree() {
        let groups = assemble_groups(sample(), None);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["name"], json!("Medidas"));
        let fields = groups[0]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], json!("Linea"));
        assert_eq!(fields[1]["name"], json!("Salida"));
        let sub = &fields[0]["fieldsConfigs"][0]["fieldsSubconfigs"][0];
        assert_eq!(sub["dataUnit"], json!("cm"));
        assert_eq!(sub["fieldConfigId"], json!("c10"));
        assert_eq!(fields[1]["fieldsConfigs"][0]["fieldsSubconfigs"], json!([]));
    }

    #[test]
    fn awning_view_keeps_only_linked_configs() {
        let active = HashSet::from(["c11".to_string()]);
        let groups = assemble_groups(sample(), Some(&active));
        assert_eq!(groups.len(), 2, "groups are kept even when empty");
        let fields = groups[0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0]["name"], json!("Salida"));
        assert_eq!(groups[1]["fields"], json!([]));
    }
}
