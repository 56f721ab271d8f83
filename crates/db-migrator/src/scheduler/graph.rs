//! Table dependency graph and its wave decomposition.

use std::collections::HashMap;

use serde::Serialize;

use crate::core::TableDescriptor;
use crate::error::{MigrateError, Result};

/// Tables grouped into waves by Kahn's algorithm.
///
/// Wave `n` holds every table whose in-set dependencies all sit in waves
/// `0..n`. Self references are ignored and dependencies on tables outside the
/// set count as satisfied. Within a wave tables keep their configured order.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    tables: Vec<TableDescriptor>,
    waves: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph, failing if any tables can never become ready.
    pub fn build(tables: Vec<TableDescriptor>) -> Result<Self> {
        let index: HashMap<&str, usize> = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

        for (i, table) in tables.iter().enumerate() {
            for dep in table.effective_dependencies() {
                if let Some(&d) = index.get(dep) {
                    in_degree[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        let mut waves: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut placed = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &i in &current {
                for &dependent in &dependents[i] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            placed += current.len();
            waves.push(std::mem::replace(&mut current, next));
        }

        if placed != tables.len() {
            let stuck = in_degree
                .iter()
                .enumerate()
                .filter(|(_, &deg)| deg > 0)
                .map(|(i, _)| tables[i].name.clone())
                .collect();
            return Err(MigrateError::DependencyCycle(stuck));
        }

        Ok(Self { tables, waves })
    }

    /// Number of waves.
    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    /// All tables in configured order.
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    /// Waves in dispatch order.
    pub fn waves(&self) -> impl Iterator<Item = Vec<&TableDescriptor>> + '_ {
        self.waves
            .iter()
            .map(move |wave| wave.iter().map(|&i| &self.tables[i]).collect())
    }

    /// Serializable view of the waves.
    pub fn plan(&self) -> Vec<Wave> {
        self.waves()
            .enumerate()
            .map(|(n, wave)| Wave {
                number: n + 1,
                tables: wave.iter().map(|t| t.name.clone()).collect(),
            })
            .collect()
    }
}

/// One wave as reported to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wave {
    pub number: usize,
    pub tables: Vec<String>,
}
