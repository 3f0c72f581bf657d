//! Deploy-once, infer-many client for the model server.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use labelbot_common::{LabelExport, ModelType, QueryType};

use super::{
    BoxList, CreateDeploymentTaskRequest, DeployRequest, DeploymentService, InferenceRequest,
    InferenceResponse, TaskType,
};
use crate::error::{Error, Result};

/// Manages model deployments on the model server.
///
/// Each model type is deployed at most once; the deployment handle is cached
/// for the lifetime of the client. Clients are shared between sessions.
pub struct DeploymentClient {
    service: Arc<dyn DeploymentService>,
    project_id: String,
    num_gpus: u32,
    rpc_timeout: Duration,
    query_models: HashMap<QueryType, ModelType>,
    deployments: RwLock<HashMap<ModelType, String>>,
}

impl DeploymentClient {
    pub fn new(service: Arc<dyn DeploymentService>, project_id: impl Into<String>) -> Self {
        Self {
            service,
            project_id: project_id.into(),
            num_gpus: 1,
            rpc_timeout: Duration::from_secs(30),
            query_models: HashMap::from([
                (QueryType::PredictPoly, ModelType::InstanceSegmentation),
                (QueryType::RefinePoly, ModelType::InstanceSegmentation),
            ]),
            deployments: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_num_gpus(mut self, num_gpus: u32) -> Self {
        self.num_gpus = num_gpus;
        self
    }

    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    /// Replace the query type to model type mapping.
    pub fn with_query_models<I>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = (QueryType, ModelType)>,
    {
        self.query_models = mappings.into_iter().collect();
        self
    }

    /// Model type serving a query type, if any.
    pub fn model_for_query(&self, query_type: QueryType) -> Option<ModelType> {
        self.query_models.get(&query_type).copied()
    }

    pub async fn is_deployed(&self, model_type: ModelType) -> bool {
        self.deployments.read().await.contains_key(&model_type)
    }

    pub async fn deployment_handle(&self, model_type: ModelType) -> Option<String> {
        self.deployments.read().await.get(&model_type).cloned()
    }

    /// Deployed model types, ordered by name.
    pub async fn deployed_models(&self) -> Vec<ModelType> {
        let mut models: Vec<ModelType> = self.deployments.read().await.keys().copied().collect();
        models.sort_by_key(|m| m.as_str());
        models
    }

    pub fn endpoint(&self) -> &str {
        self.service.endpoint()
    }

    /// Completely set up and deploy a model.
    ///
    /// Does nothing if the model type is already deployed. If either remote
    /// call fails, nothing is cached and the deploy can be retried.
    pub async fn deploy(&self, model_type: ModelType) -> Result<()> {
        if self.is_deployed(model_type).await {
            tracing::info!("{} model already deployed", model_type);
            return Ok(());
        }

        let result = self.create_and_deploy(model_type).await;
        match &result {
            Ok(handle) => {
                tracing::info!("Successfully deployed {} model ({})", model_type, handle);
                self.deployments
                    .write()
                    .await
                    .insert(model_type, handle.clone());
            }
            Err(e) => {
                tracing::error!(
                    "Failed to deploy {} model at {}: {}",
                    model_type,
                    self.service.endpoint(),
                    e
                );
            }
        }
        result.map(|_| ())
    }

    async fn create_and_deploy(&self, model_type: ModelType) -> Result<String> {
        let task = self
            .bounded(
                "create_deployment_task",
                self.service.create_deployment_task(CreateDeploymentTaskRequest {
                    project_id: self.project_id.clone(),
                    task_type: TaskType::from(model_type),
                }),
            )
            .await?;

        let deployed = self
            .bounded(
                "deploy_model",
                self.service.deploy_model(DeployRequest {
                    project_id: self.project_id.clone(),
                    deployment_task_id: task.deployment_task_id,
                    num_gpus: self.num_gpus,
                }),
            )
            .await?;

        Ok(deployed.deployment_task_id)
    }

    /// Run inference on a deployed model.
    ///
    /// `label_lists[i]` holds the labels for `urls[i]`. Labels are sent as
    /// boxes; polygons are reduced to their bounding box. The response has
    /// one result per url, in order.
    pub async fn infer(
        &self,
        query_type: QueryType,
        urls: Vec<String>,
        label_lists: &[Vec<LabelExport>],
    ) -> Result<InferenceResponse> {
        let model_type = self
            .model_for_query(query_type)
            .ok_or(Error::QueryNotSupported(query_type))?;
        let deployment_task_id = self
            .deployment_handle(model_type)
            .await
            .ok_or(Error::ModelNotDeployed(model_type))?;

        let box_lists = label_lists
            .iter()
            .map(|labels| BoxList {
                boxes: labels
                    .iter()
                    .filter_map(LabelExport::bounding_box)
                    .map(Into::into)
                    .collect(),
            })
            .collect();

        let request = InferenceRequest {
            project_id: self.project_id.clone(),
            deployment_task_id,
            url_list: urls,
            box_lists,
        };

        tracing::debug!(
            "Sending {} inference for {} images to {}",
            query_type,
            request.url_list.len(),
            self.service.endpoint()
        );

        self.bounded("perform_inference", self.service.perform_inference(request))
            .await
    }

    async fn bounded<T>(
        &self,
        call: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.rpc_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(call, self.rpc_timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockDeploymentService;
    use labelbot_common::{Box2d, PolygonExport};

    fn client(service: &Arc<MockDeploymentService>) -> DeploymentClient {
        DeploymentClient::new(service.clone(), "test-project")
    }

    fn box_label(id: &str, x: f64) -> LabelExport {
        LabelExport {
            id: id.to_string(),
            box2d: Some(Box2d { x1: x, y1: x, x2: x + 1.0, y2: x + 2.0 }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_deploy_once() {
        let service = Arc::new(MockDeploymentService::new());
        let client = client(&service);

        client.deploy(ModelType::InstanceSegmentation).await.unwrap();
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();

        assert_eq!(service.create_calls(), 1);
        assert_eq!(service.deploy_calls(), 1);
        assert_eq!(
            client.deployment_handle(ModelType::InstanceSegmentation).await.as_deref(),
            Some("testDeployId")
        );
        assert!(!client.is_deployed(ModelType::ObjectDetection2d).await);
    }

    #[tokio::test]
    async fn test_deploy_failure_leaves_model_undeployed() {
        let service = Arc::new(MockDeploymentService::new());
        service.fail_deploy(true);
        let client = client(&service);

        assert!(client.deploy(ModelType::InstanceSegmentation).await.is_err());
        assert_eq!(service.create_calls(), 1);
        assert!(!client.is_deployed(ModelType::InstanceSegmentation).await);

        let err = client
            .infer(QueryType::PredictPoly, vec!["a.jpg".to_string()], &[vec![box_label("l", 0.0)]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ModelNotDeployed(ModelType::InstanceSegmentation)));

        // Retry succeeds once the server recovers.
        service.fail_deploy(false);
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();
        assert!(client.is_deployed(ModelType::InstanceSegmentation).await);
        assert_eq!(service.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_model_undeployed() {
        let service = Arc::new(MockDeploymentService::new());
        service.fail_create(true);
        let client = client(&service);

        assert!(client.deploy(ModelType::InstanceSegmentation).await.is_err());
        assert_eq!(service.create_calls(), 1);
        assert_eq!(service.deploy_calls(), 0);
        assert!(!client.is_deployed(ModelType::InstanceSegmentation).await);
        assert!(client
            .deployment_handle(ModelType::InstanceSegmentation)
            .await
            .is_none());

        service.fail_create(false);
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();
        assert!(client.is_deployed(ModelType::InstanceSegmentation).await);
        assert_eq!(service.create_calls(), 2);
        assert_eq!(service.deploy_calls(), 1);
    }

    #[tokio::test]
    async fn test_infer_without_deploy_fails() {
        let service = Arc::new(MockDeploymentService::new());
        let client = client(&service);
        let err = client.infer(QueryType::RefinePoly, vec![], &[]).await.unwrap_err();
        assert!(matches!(err, Error::ModelNotDeployed(_)));
        assert_eq!(service.inference_calls(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_query_type() {
        let service = Arc::new(MockDeploymentService::new());
        let client = client(&service)
            .with_query_models([(QueryType::PredictPoly, ModelType::InstanceSegmentation)]);
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();

        let err = client.infer(QueryType::RefinePoly, vec![], &[]).await.unwrap_err();
        assert!(matches!(err, Error::QueryNotSupported(QueryType::RefinePoly)));
    }

    #[tokio::test]
    async fn test_infer_sends_one_box_list_per_url() {
        let service = Arc::new(MockDeploymentService::new());
        let client = client(&service);
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();

        let polygon_label = LabelExport::from_polygons(
            "p",
            vec![PolygonExport {
                vertices: vec![[1.0, 5.0], [4.0, 2.0], [3.0, 8.0]],
                types: "LLL".to_string(),
                closed: true,
            }],
        );
        let urls = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        let labels = vec![vec![box_label("x", 0.0), box_label("y", 3.0)], vec![polygon_label]];
        let response = client.infer(QueryType::PredictPoly, urls, &labels).await.unwrap();

        let request = service.last_inference_request().unwrap();
        assert_eq!(request.project_id, "test-project");
        assert_eq!(request.deployment_task_id, "testDeployId");
        assert_eq!(request.url_list, vec!["a.jpg", "b.jpg"]);
        assert_eq!(request.box_lists[0].boxes.len(), 2);
        let reduced = request.box_lists[1].boxes[0];
        assert_eq!((reduced.bottom_left.x, reduced.bottom_left.y), (1.0, 2.0));
        assert_eq!((reduced.top_right.x, reduced.top_right.y), (4.0, 8.0));

        assert_eq!(response.instance_segmentation_results.len(), 2);
        assert_eq!(response.instance_segmentation_results[0].polygons.len(), 2);
    }

    #[tokio::test]
    async fn test_inference_timeout() {
        let service = Arc::new(MockDeploymentService::new());
        let client = client(&service).with_rpc_timeout(Duration::from_millis(20));
        client.deploy(ModelType::InstanceSegmentation).await.unwrap();

        service.set_inference_delay(Duration::from_millis(200));
        let err = client
            .infer(QueryType::PredictPoly, vec!["a.jpg".to_string()], &[vec![box_label("l", 0.0)]])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout("perform_inference", _)));
    }
}
