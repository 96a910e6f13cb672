use crate::traits::ClusterApi;
use async_trait::async_trait;
use netdiag_core::{DaemonSet, Namespace, NetdiagError, Pod, Result, Service};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Address `kubectl proxy` listens on by default
pub const KUBECTL_PROXY_URL: &str = "http://127.0.0.1:8001";
/// Where pods find their service account credentials
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
/// Upper bound for a single API request, connect included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How to reach the API server
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// PEM bundle trusted in addition to the system roots
    pub ca_pem: Option<Vec<u8>>,
    pub request_timeout: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            base_url: KUBECTL_PROXY_URL.to_string(),
            token: None,
            ca_pem: None,
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ClusterConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Read the token and CA bundle mounted into a pod
    pub fn from_service_account_dir(base_url: &str, dir: &Path) -> Result<Self> {
        let token = std::fs::read_to_string(dir.join("token")).map_err(|e| {
            NetdiagError::configuration(
                format!("Failed to read service account token in {}: {}", dir.display(), e),
                "Run inside a pod with a mounted service account, or pass --api-server",
            )
        })?;
        let ca_pem = std::fs::read(dir.join("ca.crt")).ok();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Some(token.trim().to_string()),
            ca_pem,
            ..Default::default()
        })
    }

    /// Pick an API endpoint: explicit server, then in-cluster, then `kubectl proxy`
    pub fn resolve(api_server: Option<&str>, token: Option<String>) -> Result<Self> {
        if let Some(server) = api_server {
            return Ok(Self::new(server).with_token(token));
        }

        if let (Ok(host), Ok(port)) = (
            std::env::var("KUBERNETES_SERVICE_HOST"),
            std::env::var("KUBERNETES_SERVICE_PORT"),
        ) {
            let base_url = if host.contains(':') {
                format!("https://[{}]:{}", host, port)
            } else {
                format!("https://{}:{}", host, port)
            };
            debug!("Using in-cluster API server {}", base_url);
            let mut config = Self::from_service_account_dir(&base_url, Path::new(SERVICE_ACCOUNT_DIR))?;
            if token.is_some() {
                config = config.with_token(token);
            }
            return Ok(config);
        }

        debug!("No API server configured, assuming kubectl proxy at {}", KUBECTL_PROXY_URL);
        Ok(Self::new(KUBECTL_PROXY_URL).with_token(token))
    }
}

/// Minimal Kubernetes REST client for the resources a diagnostic run touches
pub struct ApiClient {
    config: ClusterConfig,
    client: Client,
}

impl ApiClient {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout);
        if let Some(pem) = &config.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                NetdiagError::configuration(
                    format!("Invalid cluster CA certificate: {}", e),
                    "Check the ca.crt mounted with the service account",
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| NetdiagError::cluster_api(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| NetdiagError::cluster_api(format!("{}: HTTP request failed: {}", what, e)))
    }

    async fn failure(resp: Response, what: &str) -> NetdiagError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        NetdiagError::cluster_api(format!("{} failed with status {}: {}", what, status, body))
    }

    /// GET a single object, mapping 404 to `None`
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        debug!("GET {}", path);
        let what = format!("GET {}", path);
        let resp = self.send(self.client.get(self.url(path)), &what).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp, &what).await);
        }

        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| NetdiagError::cluster_api(format!("{}: failed to parse body: {}", what, e)))
    }

    /// POST a new object, mapping 409 to `AlreadyExists`
    async fn create<T: Serialize>(&self, path: &str, body: &T, resource_key: &str) -> Result<()> {
        debug!("POST {}", path);
        let what = format!("POST {}", path);
        let resp = self
            .send(self.client.post(self.url(path)).json(body), &what)
            .await?;

        if resp.status() == StatusCode::CONFLICT {
            return Err(NetdiagError::already_exists(resource_key));
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp, &what).await);
        }
        Ok(())
    }
}

fn required_name<'a>(name: &'a Option<String>, kind: &str) -> Result<&'a str> {
    name.as_deref()
        .ok_or_else(|| NetdiagError::cluster_api(format!("{} has no metadata.name", kind)))
}

#[async_trait]
impl ClusterApi for ApiClient {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        self.get_optional(&format!("/api/v1/namespaces/{}", name)).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        let name = required_name(&namespace.metadata.name, "Namespace")?;
        self.create("/api/v1/namespaces", namespace, &format!("namespaces/{}", name))
            .await
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let path = format!("/api/v1/namespaces/{}", name);
        debug!("DELETE {}", path);
        let what = format!("DELETE {}", path);
        let resp = self.send(self.client.delete(self.url(&path)), &what).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!("Namespace {} already gone", name);
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(Self::failure(resp, &what).await);
        }
        Ok(())
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>> {
        self.get_optional(&format!(
            "/apis/apps/v1/namespaces/{}/daemonsets/{}",
            namespace, name
        ))
        .await
    }

    async fn create_daemon_set(&self, namespace: &str, daemon_set: &DaemonSet) -> Result<()> {
        let name = required_name(&daemon_set.metadata.name, "DaemonSet")?;
        self.create(
            &format!("/apis/apps/v1/namespaces/{}/daemonsets", namespace),
            daemon_set,
            &format!("{}/daemonsets/{}", namespace, name),
        )
        .await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let name = required_name(&service.metadata.name, "Service")?;
        self.create(
            &format!("/api/v1/namespaces/{}/services", namespace),
            service,
            &format!("{}/services/{}", namespace, name),
        )
        .await
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let path = format!("/api/v1/namespaces/{}/pods", namespace);
        debug!("GET {}?labelSelector={}", path, label_selector);
        let what = format!("List pods in {}", namespace);
        let resp = self
            .send(
                self.client
                    .get(self.url(&path))
                    .query(&[("labelSelector", label_selector)]),
                &what,
            )
            .await?;

        if !resp.status().is_success() {
            return Err(Self::failure(resp, &what).await);
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| NetdiagError::cluster_api(format!("Failed to parse pod list: {}", e)))?;

        let items = body["items"].as_array().cloned().unwrap_or_default();
        let mut pods = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<Pod>(item) {
                Ok(pod) => pods.push(pod),
                Err(e) => warn!("Failed to parse pod from list: {}", e),
            }
        }
        Ok(pods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = ClusterConfig::new("https://10.0.0.1:6443/");
        assert_eq!(config.base_url, "https://10.0.0.1:6443");
    }

    #[test]
    fn test_empty_token_ignored() {
        let config = ClusterConfig::new(KUBECTL_PROXY_URL).with_token(Some(String::new()));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_explicit_server_wins() {
        let config =
            ClusterConfig::resolve(Some("https://api.example:6443"), Some("t0k".to_string()))
                .unwrap();
        assert_eq!(config.base_url, "https://api.example:6443");
        assert_eq!(config.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn test_service_account_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("token"), "secret-token\n").unwrap();

        let config =
            ClusterConfig::from_service_account_dir("https://10.96.0.1:443", dir.path()).unwrap();
        assert_eq!(config.token.as_deref(), Some("secret-token"));
        assert!(config.ca_pem.is_none());
    }

    #[test]
    fn test_service_account_dir_missing_token() {
        let dir = tempdir().unwrap();
        let err =
            ClusterConfig::from_service_account_dir("https://10.96.0.1:443", dir.path()).unwrap_err();
        assert!(matches!(err, NetdiagError::Configuration { .. }));
    }

    /// Nothing listens on port 1, so every call must surface as a cluster API error
    #[tokio::test]
    async fn test_unreachable_server_is_cluster_api_error() {
        let client = ApiClient::new(ClusterConfig::new("http://127.0.0.1:1")).unwrap();
        let err = client.get_namespace("netdiag").await.unwrap_err();
        assert!(matches!(err, NetdiagError::ClusterApi { .. }));
    }

    #[tokio::test]
    async fn test_silent_server_hits_request_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        // Accept and hold the connection without ever answering
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
            drop(stream);
        });

        let config = ClusterConfig::new(&url).with_request_timeout(Duration::from_millis(200));
        let client = ApiClient::new(config).unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(10),
            client.get_daemon_set("netdiag", "basic-checker"),
        )
        .await
        .expect("request timeout should fire before the guard")
        .unwrap_err();

        assert!(matches!(err, NetdiagError::ClusterApi { .. }));
        server.abort();
    }

    /// Answer exactly one HTTP request with a canned response, returning the request head
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            // Read the head, then however much body Content-Length announces
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let request = String::from_utf8_lossy(&received).to_string();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            request
        });

        (format!("http://127.0.0.1:{}", port), handle)
    }

    #[tokio::test]
    async fn test_get_missing_namespace_is_none() {
        let (url, server) = serve_once("404 Not Found", "{}").await;
        let client = ApiClient::new(ClusterConfig::new(&url)).unwrap();

        assert!(client.get_namespace("netdiag").await.unwrap().is_none());
        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v1/namespaces/netdiag "));
    }

    #[tokio::test]
    async fn test_create_conflict_is_already_exists() {
        let (url, server) = serve_once("409 Conflict", "{}").await;
        let client = ApiClient::new(ClusterConfig::new(&url)).unwrap();

        let err = client
            .create_namespace(&netdiag_core::resources::new_namespace("netdiag"))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_pods_sends_selector_and_token() {
        let body = r#"{"kind":"PodList","apiVersion":"v1","metadata":{},"items":[
            {"metadata":{"name":"basic-checker-a"},"status":{"podIP":"10.244.0.5"}},
            {"metadata":{"name":"basic-checker-b"}}
        ]}"#;
        let (url, server) = serve_once("200 OK", body).await;
        let client =
            ApiClient::new(ClusterConfig::new(&url).with_token(Some("t0k".to_string()))).unwrap();

        let pods = client.list_pods("netdiag", "app=netdiag-basic").await.unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(pods[0].metadata.name.as_deref(), Some("basic-checker-a"));

        let request = server.await.unwrap();
        assert!(request.contains("labelSelector=app%3Dnetdiag-basic"));
        assert!(request.to_lowercase().contains("authorization: bearer t0k"));
    }

    #[tokio::test]
    async fn test_delete_missing_namespace_succeeds() {
        let (url, server) = serve_once("404 Not Found", "{}").await;
        let client = ApiClient::new(ClusterConfig::new(&url)).unwrap();

        client.delete_namespace("netdiag").await.unwrap();
        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/v1/namespaces/netdiag "));
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let client = ApiClient::new(ClusterConfig::new("http://127.0.0.1:1")).unwrap();
        let err = client
            .create_namespace(&Namespace::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }
}
