//! Test doubles and fixtures shared by unit and integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use labelbot_common::{
    add_box2d_label, add_polygon2d_label, ActionPacket, EditAction, PathPoint2d, PathPointKind,
    Rect, State, SyncMessage,
};

use crate::deployment::{
    CreateDeploymentTaskRequest, CreateDeploymentTaskResponse, DeployRequest, DeployResponse,
    DeploymentService, InferenceRequest, InferenceResponse, InstanceSegmentationResult, Point,
    Polygon,
};
use crate::error::{Error, Result};

/// Number of points in every placeholder polygon returned by the mock.
pub const PLACEHOLDER_POLYGON_POINTS: usize = 5;

/// In-memory model server.
///
/// Counts calls, records the last inference request and answers every box
/// with a placeholder polygon. Failures and delays can be switched on.
pub struct MockDeploymentService {
    create_calls: AtomicUsize,
    deploy_calls: AtomicUsize,
    inference_calls: AtomicUsize,
    fail_create: AtomicBool,
    fail_deploy: AtomicBool,
    fail_inference: AtomicBool,
    inference_delay: Mutex<Duration>,
    result_limit: Mutex<Option<usize>>,
    last_inference_request: Mutex<Option<InferenceRequest>>,
}

impl MockDeploymentService {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            deploy_calls: AtomicUsize::new(0),
            inference_calls: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            fail_deploy: AtomicBool::new(false),
            fail_inference: AtomicBool::new(false),
            inference_delay: Mutex::new(Duration::ZERO),
            result_limit: Mutex::new(None),
            last_inference_request: Mutex::new(None),
        }
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn deploy_calls(&self) -> usize {
        self.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn inference_calls(&self) -> usize {
        self.inference_calls.load(Ordering::SeqCst)
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deploy(&self, fail: bool) {
        self.fail_deploy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inference(&self, fail: bool) {
        self.fail_inference.store(fail, Ordering::SeqCst);
    }

    pub fn set_inference_delay(&self, delay: Duration) {
        *self.inference_delay.lock().unwrap() = delay;
    }

    /// Answer inference with at most `limit` results, fewer than requested.
    pub fn set_result_limit(&self, limit: Option<usize>) {
        *self.result_limit.lock().unwrap() = limit;
    }

    pub fn last_inference_request(&self) -> Option<InferenceRequest> {
        self.last_inference_request.lock().unwrap().clone()
    }
}

impl Default for MockDeploymentService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeploymentService for MockDeploymentService {
    fn endpoint(&self) -> &str {
        "mock"
    }

    async fn create_deployment_task(
        &self,
        _request: CreateDeploymentTaskRequest,
    ) -> Result<CreateDeploymentTaskResponse> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::DeployFailed("mock create failure".to_string()));
        }
        Ok(CreateDeploymentTaskResponse {
            deployment_task_id: "testTaskId".to_string(),
        })
    }

    async fn deploy_model(&self, _request: DeployRequest) -> Result<DeployResponse> {
        self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deploy.load(Ordering::SeqCst) {
            return Err(Error::DeployFailed("mock deploy failure".to_string()));
        }
        Ok(DeployResponse {
            deployment_task_id: "testDeployId".to_string(),
        })
    }

    async fn perform_inference(&self, request: InferenceRequest) -> Result<InferenceResponse> {
        self.inference_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inference_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_inference.load(Ordering::SeqCst) {
            return Err(Error::Communication("mock inference failure".to_string()));
        }
        let mut response = placeholder_response(&request);
        if let Some(limit) = *self.result_limit.lock().unwrap() {
            response.instance_segmentation_results.truncate(limit);
            response.message = "model busy".to_string();
        }
        *self.last_inference_request.lock().unwrap() = Some(request);
        Ok(response)
    }
}

/// One placeholder polygon per requested box.
pub fn placeholder_response(request: &InferenceRequest) -> InferenceResponse {
    let instance_segmentation_results = request
        .box_lists
        .iter()
        .map(|box_list| InstanceSegmentationResult {
            polygons: box_list
                .boxes
                .iter()
                .map(|b| Polygon {
                    points: (0..PLACEHOLDER_POLYGON_POINTS)
                        .map(|i| Point {
                            x: b.bottom_left.x + i as f64,
                            y: b.bottom_left.y + (i % 2) as f64,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();
    InferenceResponse {
        message: "success".to_string(),
        instance_segmentation_results,
    }
}

/// A document with `n` items.
pub fn initial_state(n: usize) -> State {
    State::with_items((0..n).map(|i| format!("https://images.test/{:06}.jpg", i)))
}

/// Box label action on `item_index`, with coordinates derived from `seed`.
pub fn box_action(item_index: usize, seed: usize, session_id: &str) -> EditAction {
    let x = (seed * 7 % 50) as f64;
    let y = (seed * 13 % 50) as f64;
    let mut action = add_box2d_label(item_index, vec![0], Rect::new(x, y, x + 10.0, y + 20.0));
    action.session_id = session_id.to_string();
    action
}

/// Polygon label action on `item_index`.
pub fn polygon_action(item_index: usize, session_id: &str) -> EditAction {
    let points = vec![
        PathPoint2d::new(0.0, 0.0, PathPointKind::Line),
        PathPoint2d::new(10.0, 0.0, PathPointKind::Line),
        PathPoint2d::new(10.0, 10.0, PathPointKind::Line),
    ];
    let mut action = add_polygon2d_label(item_index, vec![0], points, true, true);
    action.session_id = session_id.to_string();
    action
}

/// Wrap actions into a message from a human session.
pub fn sync_message(actions: Vec<EditAction>, session_id: &str) -> SyncMessage {
    SyncMessage {
        task_id: labelbot_common::task_id(0),
        project_name: "testProject".to_string(),
        session_id: session_id.to_string(),
        actions: ActionPacket::new(actions, None),
        bot: false,
    }
}
