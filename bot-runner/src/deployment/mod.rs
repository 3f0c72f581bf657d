//! Model deployment service abstraction.
//!
//! The `DeploymentService` trait describes the three unary calls exposed by
//! the remote model server. [`DeploymentClient`] drives the deploy-once,
//! infer-many lifecycle on top of it.

mod client;
mod http;

pub use client::DeploymentClient;
pub use http::HttpDeploymentService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use labelbot_common::{Box2d, ModelType};

use crate::error::Result;

/// Task types understood by the model server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[serde(rename = "OBJECT_DETECTION_2D")]
    ObjectDetection2d,
    InstanceSegmentation,
}

impl From<ModelType> for TaskType {
    fn from(model_type: ModelType) -> Self {
        match model_type {
            ModelType::InstanceSegmentation => TaskType::InstanceSegmentation,
            ModelType::ObjectDetection2d => TaskType::ObjectDetection2d,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentTaskRequest {
    pub project_id: String,
    pub task_type: TaskType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentTaskResponse {
    pub deployment_task_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub project_id: String,
    pub deployment_task_id: String,
    pub num_gpus: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub deployment_task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Box as sent to the model server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireBox {
    pub bottom_left: Point,
    pub top_right: Point,
}

impl From<Box2d> for WireBox {
    fn from(b: Box2d) -> Self {
        Self {
            bottom_left: Point { x: b.x1, y: b.y1 },
            top_right: Point { x: b.x2, y: b.y2 },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxList {
    pub boxes: Vec<WireBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub project_id: String,
    pub deployment_task_id: String,
    pub url_list: Vec<String>,
    /// One box list per url.
    pub box_lists: Vec<BoxList>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn vertices(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.x, p.y]).collect()
    }
}

/// Polygons predicted for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceSegmentationResult {
    pub polygons: Vec<Polygon>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub message: String,
    /// One result per url of the request, in the same order.
    #[serde(default)]
    pub instance_segmentation_results: Vec<InstanceSegmentationResult>,
}

/// Remote model deployment service.
#[async_trait]
pub trait DeploymentService: Send + Sync {
    /// Short name of the backend, for logging.
    fn endpoint(&self) -> &str;

    /// First deployment step: register a task for a model type.
    async fn create_deployment_task(
        &self,
        request: CreateDeploymentTaskRequest,
    ) -> Result<CreateDeploymentTaskResponse>;

    /// Second deployment step: bring up the model for a task.
    async fn deploy_model(&self, request: DeployRequest) -> Result<DeployResponse>;

    /// Run a batched inference on a deployed model.
    async fn perform_inference(&self, request: InferenceRequest) -> Result<InferenceResponse>;
}
