use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which items `retrieve` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Unread,
    Archive,
    All,
}

impl FromStr for ItemState {
    type Err = InvalidItemState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unread" => Ok(ItemState::Unread),
            "archive" | "archived" => Ok(ItemState::Archive),
            "all" => Ok(ItemState::All),
            other => Err(InvalidItemState(other.to_owned())),
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ItemState::Unread => "unread",
            ItemState::Archive => "archive",
            ItemState::All => "all",
        };
        write!(f, "{value}")
    }
}

/// Error reported when parsing an unsupported item state.
#[derive(Debug, thiserror::Error)]
#[error("invalid item state '{0}' (expected unread, archive or all)")]
pub struct InvalidItemState(pub String);

/// Filters for `retrieve`. Unset fields are left to the service defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrieveOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ItemState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// A saved item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: String,
    #[serde(default)]
    pub given_url: String,
    #[serde(default)]
    pub resolved_url: String,
    #[serde(default)]
    pub given_title: String,
    #[serde(default)]
    pub resolved_title: String,
    #[serde(default)]
    pub sort_id: Option<i64>,
}

impl Item {
    /// Resolved URL, falling back to the URL as saved.
    pub fn url(&self) -> &str {
        if self.resolved_url.is_empty() {
            &self.given_url
        } else {
            &self.resolved_url
        }
    }

    /// Resolved title, then the title as saved, then the URL.
    pub fn title(&self) -> &str {
        if !self.resolved_title.is_empty() {
            &self.resolved_title
        } else if !self.given_title.is_empty() {
            &self.given_title
        } else {
            self.url()
        }
    }
}

/// A modification sent through `modify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Archive { item_id: String },
}

impl Action {
    pub fn archive(item_id: impl Into<String>) -> Self {
        Action::Archive {
            item_id: item_id.into(),
        }
    }
}

/// Outcome of a `modify` call.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModifyResult {
    pub status: i32,
    #[serde(default)]
    pub action_results: Vec<serde_json::Value>,
}

/// `list` is an object keyed by item id, or an empty array when nothing matched.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemList {
    Keyed(HashMap<String, Item>),
    Empty(Vec<serde_json::Value>),
}

impl ItemList {
    pub(crate) fn into_ordered(self) -> Vec<Item> {
        let mut items: Vec<Item> = match self {
            ItemList::Keyed(map) => map.into_values().collect(),
            ItemList::Empty(_) => Vec::new(),
        };
        items.sort_by_key(|item| {
            (
                item.sort_id.unwrap_or(i64::MAX),
                item.item_id.parse::<u64>().unwrap_or(u64::MAX),
                item.item_id.clone(),
            )
        });
        items
    }
}

impl Default for ItemList {
    fn default() -> Self {
        ItemList::Empty(Vec::new())
    }
}
