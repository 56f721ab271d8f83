//! Table descriptors consumed by the scheduler and the table migration task.

use serde::{Deserialize, Deserializer, Serialize};

/// A table to migrate: its name, the columns copied, and the tables it
/// references.
///
/// Dependencies naming a table outside the configured set are treated as
/// already satisfied; a dependency on the table itself is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, unique within a configuration.
    pub name: String,

    /// Columns copied, in select/insert order.
    pub columns: Vec<String>,

    /// Tables that must be migrated first.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dependencies: Vec<String>,
}

impl TableDescriptor {
    pub fn new<C, D>(name: impl Into<String>, columns: C, dependencies: D) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        }
    }

    /// Dependencies other than the table itself, deduplicated, in declaration order.
    pub fn effective_dependencies(&self) -> impl Iterator<Item = &str> {
        let mut seen = Vec::with_capacity(self.dependencies.len());
        self.dependencies.iter().filter_map(move |dep| {
            if dep == &self.name || seen.contains(&dep.as_str()) {
                None
            } else {
                seen.push(dep.as_str());
                Some(dep.as_str())
            }
        })
    }
}

// `"dependencies": null` appears in configs written by older tooling.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
