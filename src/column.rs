use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// How a column filter value is matched against a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    /// Case-insensitive prefix match, optionally across `search_fields`.
    Search,
    /// Case-insensitive exact match.
    #[serde(alias = "list")]
    EnumeratedList,
    /// Calendar day equality.
    Date,
    #[default]
    None,
    /// Any kind this version does not know. Matches like `None`.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Setters)]
#[serde(rename_all = "camelCase")]
#[setters(into)]
pub struct ColumnFilterConfig {
    #[setters(skip)]
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: FilterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[setters(strip_option)]
    pub search_fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[setters(strip_option)]
    pub label: Option<String>,
}

impl ColumnFilterConfig {
    pub fn new(key: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            key: key.into(),
            kind,
            search_fields: None,
            label: None,
        }
    }

    pub fn title(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    /// Path the sort resolves values through: the first search field, or the
    /// column key itself.
    pub fn sort_path(&self) -> &str {
        self.search_fields
            .as_ref()
            .and_then(|fields| fields.first())
            .map(String::as_str)
            .unwrap_or(&self.key)
    }
}

pub fn find_column<'a>(columns: &'a [ColumnFilterConfig], key: &str) -> Option<&'a ColumnFilterConfig> {
    columns.iter().find(|c| c.key == key)
}
