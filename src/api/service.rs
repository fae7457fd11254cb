//! HTTP Client Wrapper
//!
//! Thin layer over `reqwest` that normalizes loading and error signaling.
//! It never talks to the user; callers decide whether a failure is worth a
//! notification.

use std::time::Duration;

use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Callback told when a request starts (`true`) and finishes (`false`)
pub type LoadingCallback<'a> = &'a (dyn Fn(bool) + Send + Sync);

/// Callback handed the parsed payload of a successful request
pub type ResultHandler<'a> = &'a (dyn Fn(&Value) + Send + Sync);

/// Options for a single request
pub struct RequestOptions<'a> {
    /// API endpoint, e.g. "/departments"
    pub endpoint: &'a str,
    /// Defaults to GET
    pub method: Method,
    /// JSON body, only sent when present
    pub body: Option<Value>,
    /// Appended verbatim after the endpoint, e.g. "/12" or "?page=2"
    pub path_params: String,
    pub set_loading: Option<LoadingCallback<'a>>,
    pub on_result: Option<ResultHandler<'a>>,
}

impl<'a> RequestOptions<'a> {
    pub fn new(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            method: Method::GET,
            body: None,
            path_params: String::new(),
            set_loading: None,
            on_result: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn path_params(mut self, path_params: impl Into<String>) -> Self {
        self.path_params = path_params.into();
        self
    }

    pub fn set_loading(mut self, callback: LoadingCallback<'a>) -> Self {
        self.set_loading = Some(callback);
        self
    }

    pub fn on_result(mut self, handler: ResultHandler<'a>) -> Self {
        self.on_result = Some(handler);
        self
    }
}

/// Flips the loading callback back off on every exit path
struct LoadingGuard<'a> {
    callback: Option<LoadingCallback<'a>>,
}

impl<'a> LoadingGuard<'a> {
    fn start(callback: Option<LoadingCallback<'a>>) -> Self {
        if let Some(cb) = callback {
            cb(true);
        }
        Self { callback }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if let Some(cb) = self.callback {
            cb(false);
        }
    }
}

/// Shared HTTP client bound to one API base URL
#[derive(Clone)]
pub struct ApiService {
    client: Client,
    base_url: String,
}

impl ApiService {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: &str, path_params: &str) -> String {
        format!("{}{}{}", self.base_url, endpoint, path_params)
    }

    /// Make a request and return the parsed JSON payload.
    ///
    /// Non-2xx statuses and non-JSON bodies are errors carrying the server's
    /// message text.
    pub async fn request(&self, options: RequestOptions<'_>) -> ApiResult<Value> {
        let _loading = LoadingGuard::start(options.set_loading);

        let url = self.url_for(options.endpoint, &options.path_params);
        debug!("[API] {} {}", options.method, url);

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!("[API] {} {} failed: {}", options.method, url, e);
            ApiError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = server_message(&text, status);
            warn!("[API] {} {} -> {}: {}", options.method, url, status, message);
            return Err(ApiError::status(status.as_u16(), message));
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::Decode(format!("{} {} returned non-JSON body: {}", options.method, url, e)))?;

        if let Some(handler) = options.on_result {
            handler(&data);
        }
        Ok(data)
    }
}

/// Best human-readable message in an error response
fn server_message(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(message)) => return message,
        Ok(Value::Object(map)) => {
            if let Some(Value::String(message)) = map.get("message").or_else(|| map.get("error")) {
                return message.clone();
            }
        }
        _ => {}
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status.canonical_reason().unwrap_or("Unknown error").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> ApiService {
        ApiService::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_server_message_fallbacks() {
        assert_eq!(server_message("\"Not found\"", StatusCode::NOT_FOUND), "Not found");
        assert_eq!(server_message(r#"{"message":"bad label"}"#, StatusCode::BAD_REQUEST), "bad label");
        assert_eq!(server_message("upstream down", StatusCode::BAD_GATEWAY), "upstream down");
        assert_eq!(server_message("", StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }

    #[test]
    fn test_url_for_trims_trailing_slash() {
        let service = ApiService::new("http://api.test/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.url_for("/departments", "?page=1"), "http://api.test/v1/departments?page=1");
    }

    #[tokio::test]
    async fn test_get_invokes_handler_and_loading() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/departments"))
            .and(query_param("page", "2"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "1", "label": "A"}])))
            .mount(&server)
            .await;

        let loading_events = Mutex::new(Vec::new());
        let seen = Mutex::new(None);
        let set_loading = |on: bool| loading_events.lock().unwrap().push(on);
        let on_result = |data: &Value| *seen.lock().unwrap() = Some(data.clone());

        let data = service(&server)
            .request(
                RequestOptions::new("/departments")
                    .path_params("?page=2")
                    .set_loading(&set_loading)
                    .on_result(&on_result),
            )
            .await
            .unwrap();

        assert_eq!(data[0]["label"], "A");
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&data));
        assert_eq!(*loading_events.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_post_sends_body() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"label": "New", "parentId": null});
        Mock::given(method("POST"))
            .and(path("/departments"))
            .and(body_json(&body))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "9", "label": "New"})))
            .mount(&server)
            .await;

        let data = service(&server)
            .request(RequestOptions::new("/departments").method(Method::POST).body(body.clone()))
            .await
            .unwrap();
        assert_eq!(data["id"], "9");
    }

    #[tokio::test]
    async fn test_error_status_resets_loading_and_keeps_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"message": "db exploded"})))
            .mount(&server)
            .await;

        let loading_events = Mutex::new(Vec::new());
        let handler_called = Mutex::new(false);
        let set_loading = |on: bool| loading_events.lock().unwrap().push(on);
        let on_result = |_: &Value| *handler_called.lock().unwrap() = true;

        let err = service(&server)
            .request(
                RequestOptions::new("/departments")
                    .set_loading(&set_loading)
                    .on_result(&on_result),
            )
            .await
            .unwrap_err();

        assert_eq!(err, ApiError::status(500, "db exploded"));
        assert_eq!(err.to_string(), "API error: db exploded");
        assert_eq!(*loading_events.lock().unwrap(), vec![true, false]);
        assert!(!*handler_called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = service(&server)
            .request(RequestOptions::new("/departments"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let service = ApiService::new("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = service.request(RequestOptions::new("/departments")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
