//! JSON-over-HTTP model deployment service.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    CreateDeploymentTaskRequest, CreateDeploymentTaskResponse, DeployRequest, DeployResponse,
    DeploymentService, InferenceRequest, InferenceResponse,
};
use crate::error::{Error, Result};

/// Model server reached over HTTP.
pub struct HttpDeploymentService {
    http_client: Client,
    base_url: String,
}

impl HttpDeploymentService {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req, failed: fn(String) -> Error) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Communication(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl DeploymentService for HttpDeploymentService {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn create_deployment_task(
        &self,
        request: CreateDeploymentTaskRequest,
    ) -> Result<CreateDeploymentTaskResponse> {
        self.post("/v1/deployment-tasks", &request, Error::DeployFailed)
            .await
    }

    async fn deploy_model(&self, request: DeployRequest) -> Result<DeployResponse> {
        self.post("/v1/deployments", &request, Error::DeployFailed)
            .await
    }

    async fn perform_inference(&self, request: InferenceRequest) -> Result<InferenceResponse> {
        self.post("/v1/inference", &request, Error::InferenceFailed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::{BoxList, TaskType};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_normalization() {
        let service = HttpDeploymentService::new("http://localhost:52051/");
        assert_eq!(service.endpoint(), "http://localhost:52051");
    }

    #[tokio::test]
    async fn test_create_and_deploy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/deployment-tasks"))
            .and(body_partial_json(json!({
                "project_id": "p",
                "task_type": "INSTANCE_SEGMENTATION"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"deployment_task_id": "task-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/deployments"))
            .and(body_partial_json(json!({"deployment_task_id": "task-1", "num_gpus": 1})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"deployment_task_id": "deploy-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = HttpDeploymentService::new(&server.uri());
        let task = service
            .create_deployment_task(CreateDeploymentTaskRequest {
                project_id: "p".to_string(),
                task_type: TaskType::InstanceSegmentation,
            })
            .await
            .unwrap();
        assert_eq!(task.deployment_task_id, "task-1");

        let deployed = service
            .deploy_model(DeployRequest {
                project_id: "p".to_string(),
                deployment_task_id: task.deployment_task_id,
                num_gpus: 1,
            })
            .await
            .unwrap();
        assert_eq!(deployed.deployment_task_id, "deploy-1");
    }

    #[tokio::test]
    async fn test_inference_parses_polygons() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/inference"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "success",
                "instance_segmentation_results": [
                    {"polygons": [{"points": [{"x": 1.0, "y": 2.0}, {"x": 3.0, "y": 4.0}]}]}
                ]
            })))
            .mount(&server)
            .await;

        let service = HttpDeploymentService::new(&server.uri());
        let response = service
            .perform_inference(InferenceRequest {
                project_id: "p".to_string(),
                deployment_task_id: "deploy-1".to_string(),
                url_list: vec!["a.jpg".to_string()],
                box_lists: vec![BoxList::default()],
            })
            .await
            .unwrap();

        assert_eq!(response.message, "success");
        let polygon = &response.instance_segmentation_results[0].polygons[0];
        assert_eq!(polygon.vertices(), vec![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_inference_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/inference"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
            .mount(&server)
            .await;

        let service = HttpDeploymentService::new(&server.uri());
        let err = service
            .perform_inference(InferenceRequest {
                project_id: "p".to_string(),
                deployment_task_id: "d".to_string(),
                url_list: vec![],
                box_lists: vec![],
            })
            .await
            .unwrap_err();
        match err {
            Error::InferenceFailed(msg) => assert!(msg.contains("model crashed")),
            other => panic!("Expected InferenceFailed, got {:?}", other),
        }
    }
}
