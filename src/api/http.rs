//! REST Backend
//!
//! `NodeBackend` over the departments REST API.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Method;

use super::endpoints::Endpoint;
use super::service::{ApiService, RequestOptions};
use super::NodeBackend;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewNode, Node, NodeQuery};

/// Same set `encodeURIComponent` leaves untouched
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Query string for a listing, newest first
pub(crate) fn list_path_params(query: &NodeQuery) -> String {
    let parent = match &query.parent_id {
        Some(pid) => encode(pid),
        None => "null".to_string(),
    };
    let mut params = format!("?parentId={}", parent);
    if let Some(page) = query.page {
        params.push_str(&format!("&page={}", page));
    }
    if let Some(limit) = query.limit {
        params.push_str(&format!("&limit={}", limit));
    }
    if let Some(label) = &query.label {
        params.push_str(&format!("&label={}", encode(label)));
    }
    params.push_str("&sortBy=createdAt&order=desc");
    params
}

pub struct HttpBackend {
    service: ApiService,
}

impl HttpBackend {
    pub fn new(service: ApiService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &ApiService {
        &self.service
    }
}

#[async_trait]
impl NodeBackend for HttpBackend {
    async fn list(&self, endpoint: Endpoint, query: &NodeQuery) -> ApiResult<Vec<Node>> {
        let data = self
            .service
            .request(RequestOptions::new(endpoint.path()).path_params(list_path_params(query)))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn create(&self, endpoint: Endpoint, node: &NewNode) -> ApiResult<Node> {
        let data = self
            .service
            .request(
                RequestOptions::new(endpoint.path())
                    .method(Method::POST)
                    .body(serde_json::to_value(node)?),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn update(&self, endpoint: Endpoint, node: &Node) -> ApiResult<Node> {
        let id = node
            .id
            .as_deref()
            .ok_or_else(|| ApiError::InvalidRequest(format!("cannot update unsaved node {}", node.label)))?;
        let data = self
            .service
            .request(
                RequestOptions::new(endpoint.path())
                    .method(Method::PUT)
                    .path_params(format!("/{}", encode(id)))
                    .body(serde_json::to_value(node)?),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(ApiService::new(&server.uri(), Duration::from_secs(5)).unwrap())
    }

    #[test]
    fn test_root_query_string() {
        let params = list_path_params(&NodeQuery::roots(2, 10, "R&D team"));
        assert_eq!(
            params,
            "?parentId=null&page=2&limit=10&label=R%26D%20team&sortBy=createdAt&order=desc"
        );
    }

    #[test]
    fn test_children_query_string() {
        let params = list_path_params(&NodeQuery::children_of("dept-1"));
        assert_eq!(params, "?parentId=dept-1&sortBy=createdAt&order=desc");
    }

    #[tokio::test]
    async fn test_list_roots_hits_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/departments-2"))
            .and(query_param("parentId", "null"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "10"))
            .and(query_param("label", "ops"))
            .and(query_param("sortBy", "createdAt"))
            .and(query_param("order", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "1", "parentId": null, "label": "Ops", "createdAt": "2025-03-01T00:00:00Z"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let nodes = backend(&server)
            .list(Endpoint::Departments2, &NodeQuery::roots(1, 10, "ops"))
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].label, "Ops");
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/departments"))
            .and(body_partial_json(serde_json::json!({"label": "Payroll", "parentId": "3"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "77", "parentId": "3", "label": "Payroll"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/departments/77"))
            .and(body_partial_json(serde_json::json!({"parentId": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "77", "parentId": null, "label": "Payroll"
            })))
            .mount(&server)
            .await;

        let backend = backend(&server);
        let mut created = backend
            .create(Endpoint::Departments, &NewNode::child("3", "Payroll"))
            .await
            .unwrap();
        assert_eq!(created.id.as_deref(), Some("77"));

        created.parent_id = None;
        let updated = backend.update(Endpoint::Departments, &created).await.unwrap();
        assert!(updated.is_root());
    }

    #[tokio::test]
    async fn test_update_without_id_is_rejected_locally() {
        let server = MockServer::start().await;
        let err = backend(&server)
            .update(Endpoint::Departments, &Node::new("Draft"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_list_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!("Not found")))
            .mount(&server)
            .await;

        let err = backend(&server)
            .list(Endpoint::Departments, &NodeQuery::children_of("5"))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::status(404, "Not found"));
    }
}
