//! Model query and model type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::export::LabelExport;

/// The supported model queries. One model can serve several query types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Predict a polygon from a box.
    PredictPoly,
    /// Refine an existing polygon.
    RefinePoly,
}

impl QueryType {
    pub const ALL: [QueryType; 2] = [QueryType::PredictPoly, QueryType::RefinePoly];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::PredictPoly => "predict_poly",
            QueryType::RefinePoly => "refine_poly",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The supported model types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    InstanceSegmentation,
    #[serde(rename = "OBJECT_DETECTION_2D")]
    ObjectDetection2d,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::InstanceSegmentation => "INSTANCE_SEGMENTATION",
            ModelType::ObjectDetection2d => "OBJECT_DETECTION_2D",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A precomputed query for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelQuery {
    /// The queried label in export format.
    pub label: LabelExport,
    /// Image url of the item.
    pub url: String,
    #[serde(rename = "type")]
    pub query_type: QueryType,
    /// Index of the item the label belongs to.
    pub item_index: usize,
}
