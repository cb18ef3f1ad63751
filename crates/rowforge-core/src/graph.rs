use std::collections::{BTreeMap, BTreeSet};

use crate::schema::TableMetadata;

/// Outcome of foreign-key dependency ordering.
///
/// `Ordered` holds a topological order: parents before children. `Deferred`
/// means the graph contains a cycle; tables are returned in declaration order
/// and the integrity resolver must treat every foreign key as deferred
/// (nulled on insert, repaired after all tables are populated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopulationOrder {
    Ordered(Vec<String>),
    Deferred(Vec<String>),
}

impl PopulationOrder {
    pub fn tables(&self) -> &[String] {
        match self {
            PopulationOrder::Ordered(tables) | PopulationOrder::Deferred(tables) => tables,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, PopulationOrder::Deferred(_))
    }
}

/// Order tables for population using Kahn's algorithm over parent->child
/// foreign-key edges.
///
/// Self-references and duplicate edges between the same table pair are
/// collapsed. Ties among ready tables are broken by declaration order, so the
/// result is deterministic for a given catalog.
pub fn population_order(tables: &[TableMetadata]) -> PopulationOrder {
    let index_by_name: BTreeMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(index, table)| (table.name.as_str(), index))
        .collect();

    // children[p] = declaration indices of tables holding a FK into p.
    let mut children: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); tables.len()];
    let mut indegree: Vec<usize> = vec![0; tables.len()];

    for (child, table) in tables.iter().enumerate() {
        for fk in &table.foreign_keys {
            let Some(&parent) = index_by_name.get(fk.referenced_table.as_str()) else {
                continue;
            };
            if parent == child {
                continue;
            }
            if children[parent].insert(child) {
                indegree[child] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .enumerate()
        .filter_map(|(index, count)| (*count == 0).then_some(index))
        .collect();

    let mut order = Vec::with_capacity(tables.len());
    while let Some(&index) = ready.iter().next() {
        ready.remove(&index);
        order.push(tables[index].name.clone());
        for &child in &children[index] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() == tables.len() {
        PopulationOrder::Ordered(order)
    } else {
        let declaration = tables.iter().map(|table| table.name.clone()).collect();
        PopulationOrder::Deferred(declaration)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::schema::{ColumnKind, ColumnMetadata, ForeignKeyRef};

    fn table(name: &str, fks: &[(&str, &str)]) -> TableMetadata {
        let mut columns = vec![ColumnMetadata {
            name: "id".to_string(),
            kind: ColumnKind::Integer,
            max_length: None,
            is_nullable: false,
            is_identity: false,
            is_free_text: false,
        }];
        let mut foreign_keys = Vec::new();
        for (column, referenced) in fks {
            columns.push(ColumnMetadata {
                name: column.to_string(),
                kind: ColumnKind::Integer,
                max_length: None,
                is_nullable: true,
                is_identity: false,
                is_free_text: false,
            });
            foreign_keys.push(ForeignKeyRef {
                column: column.to_string(),
                referenced_table: referenced.to_string(),
                referenced_column: "id".to_string(),
            });
        }
        TableMetadata {
            name: name.to_string(),
            columns,
            primary_key: vec!["id".to_string()],
            unique_columns: BTreeSet::new(),
            foreign_keys,
        }
    }

    #[test]
    fn parents_come_before_children() {
        let tables = vec![
            table("orders", &[("user_id", "users")]),
            table("users", &[]),
            table("items", &[("order_id", "orders")]),
        ];
        let order = population_order(&tables);
        let PopulationOrder::Ordered(order) = order else {
            panic!("expected ordered result");
        };
        let pos = |name: &str| order.iter().position(|t| t == name).unwrap();
        assert!(pos("users") < pos("orders"));
        assert!(pos("orders") < pos("items"));
    }

    #[test]
    fn ties_broken_by_declaration_order() {
        let tables = vec![table("zeta", &[]), table("alpha", &[]), table("mid", &[])];
        assert_eq!(
            population_order(&tables),
            PopulationOrder::Ordered(vec![
                "zeta".to_string(),
                "alpha".to_string(),
                "mid".to_string()
            ])
        );
    }

    #[test]
    fn cycle_falls_back_to_declaration_order() {
        let tables = vec![
            table("a", &[("b_id", "b")]),
            table("b", &[("a_id", "a")]),
            table("standalone", &[]),
        ];
        let order = population_order(&tables);
        assert!(order.is_deferred());
        assert_eq!(order.tables(), ["a", "b", "standalone"]);
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let tables = vec![table("org", &[("parent_id", "org")])];
        assert_eq!(
            population_order(&tables),
            PopulationOrder::Ordered(vec!["org".to_string()])
        );
    }
}
