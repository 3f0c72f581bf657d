//! Document snapshot shared by all sessions of a task.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::{Label, Shape};

/// The "present" state of a task document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    pub task: TaskState,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub config: TaskConfig,
    #[serde(default)]
    pub items: Vec<ItemState>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub task_id: String,
}

/// One image of the task with its labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemState {
    pub index: usize,
    /// Image url per sensor id.
    #[serde(default)]
    pub urls: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, Label>,
    #[serde(default)]
    pub shapes: BTreeMap<String, Shape>,
}

impl State {
    /// Build a state with one item per url, in order.
    pub fn with_items<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| ItemState {
                index,
                urls: BTreeMap::from([("0".to_string(), url.into())]),
                ..Default::default()
            })
            .collect();
        Self {
            task: TaskState {
                items,
                ..Default::default()
            },
        }
    }

    pub fn item(&self, index: usize) -> Option<&ItemState> {
        self.task.items.get(index)
    }

    /// First image url of an item, if the item exists and has one.
    pub fn item_url(&self, index: usize) -> Option<&str> {
        self.item(index)?.urls.values().next().map(String::as_str)
    }

    /// Total number of labels across all items.
    pub fn label_count(&self) -> usize {
        self.task.items.iter().map(|i| i.labels.len()).sum()
    }
}
