//! HTTP Overpass client with ordered endpoint fallback.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use url::Url;

use super::{OverpassBuildError, OverpassError, OverpassResponse, OverpassSource, TransportError};

/// Public Overpass instances tried in order when none are configured.
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.openstreetmap.ru/api/interpreter",
];

/// Default user agent for Overpass requests.
pub const DEFAULT_USER_AGENT: &str = "mapedit-osm-import/0.1";

/// Default per-attempt timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`HttpOverpassSource`].
#[derive(Debug, Clone)]
pub struct OverpassConfig {
    /// Endpoints tried in order until one answers with HTTP 200.
    pub endpoints: Vec<Url>,
    /// Timeout applied to each attempt.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for OverpassConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS
                .iter()
                .filter_map(|endpoint| Url::parse(endpoint).ok())
                .collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl OverpassConfig {
    /// Configuration using `endpoints` and default timeout and user agent.
    #[must_use]
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`OverpassSource`] talking to real Overpass servers.
///
/// Queries are POSTed as the form field `data`. Endpoints are tried in
/// order; non-200 answers and network failures move on to the next one. The
/// first 200 answer is decoded and returned, and a decode failure there is
/// reported rather than retried elsewhere.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use mapedit_data::overpass::{HttpOverpassSource, OverpassConfig, OverpassSource};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OverpassConfig::default().with_timeout(Duration::from_secs(10));
/// let source = HttpOverpassSource::with_config(config)?;
/// let response = source
///     .query("[out:json][timeout:25];node(52.51,13.40,52.52,13.41);out body;")
///     .await?;
/// println!("{} elements", response.elements.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpOverpassSource {
    client: Client,
    config: OverpassConfig,
}

impl HttpOverpassSource {
    /// Source using [`OverpassConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, OverpassBuildError> {
        Self::with_config(OverpassConfig::default())
    }

    /// Source using explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: OverpassConfig) -> Result<Self, OverpassBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(OverpassBuildError::HttpClient)?;
        Ok(Self { client, config })
    }

    async fn attempt(&self, endpoint: &Url, query: &str) -> Result<reqwest::Response, TransportError> {
        let response = self
            .client
            .post(endpoint.clone())
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, endpoint.as_str()))?;

        let status = response.status();
        if status == StatusCode::OK {
            Ok(response)
        } else {
            Err(TransportError::Http {
                url: endpoint.to_string(),
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_owned(),
            })
        }
    }
}

#[async_trait]
impl OverpassSource for HttpOverpassSource {
    async fn query(&self, query: &str) -> Result<OverpassResponse, OverpassError> {
        let mut last = None;
        for endpoint in &self.config.endpoints {
            match self.attempt(endpoint, query).await {
                Ok(response) => {
                    debug!("Overpass endpoint {endpoint} answered");
                    return response.json::<OverpassResponse>().await.map_err(|err| {
                        OverpassError::Decode {
                            url: endpoint.to_string(),
                            message: err.to_string(),
                        }
                    });
                }
                Err(err) => {
                    warn!("Overpass endpoint {endpoint} failed, trying next: {err}");
                    last = Some(err);
                }
            }
        }

        match last {
            Some(last) => Err(OverpassError::UpstreamUnavailable {
                attempts: self.config.endpoints.len(),
                last,
            }),
            None => Err(OverpassError::NoEndpoints),
        }
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve a single canned HTTP response and report the request body.
    async fn serve_once(status: u16, body: &'static str) -> (Url, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("local address");
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            socket.shutdown().await.expect("shutdown socket");
            let _ = sender.send(request);
        });
        let url = Url::parse(&format!("http://{address}/api/interpreter")).expect("endpoint url");
        (url, receiver)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buffer);
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buffer.len() >= split + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    async fn refused_endpoint() -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let address = listener.local_addr().expect("local address");
        drop(listener);
        Url::parse(&format!("http://{address}/api/interpreter")).expect("endpoint url")
    }

    fn source(endpoints: Vec<Url>) -> HttpOverpassSource {
        HttpOverpassSource::with_config(
            OverpassConfig::new(endpoints).with_timeout(Duration::from_secs(5)),
        )
        .expect("build client")
    }

    #[tokio::test]
    async fn falls_back_past_failing_endpoints() {
        let (unavailable, _) = serve_once(503, "{}").await;
        let (healthy, request) =
            serve_once(200, r#"{"elements": [{"type": "node", "id": 7, "lat": 1.0, "lon": 2.0}]}"#)
                .await;

        let response = source(vec![refused_endpoint().await, unavailable, healthy])
            .query("[out:json];node(1,2,3,4);out body;")
            .await
            .expect("third endpoint answers");

        assert_eq!(response.elements.len(), 1);
        assert_eq!(response.elements[0].id, 7);
        let request = request.await.expect("request captured");
        assert!(request.starts_with("POST /api/interpreter"));
        assert!(request.contains("data=%5Bout%3Ajson%5D"), "body: {request}");
    }

    #[tokio::test]
    async fn reports_last_error_when_all_endpoints_fail() {
        let (first, _) = serve_once(500, "{}").await;
        let (second, _) = serve_once(429, "{}").await;

        let err = source(vec![first, second])
            .query("[out:json];out;")
            .await
            .expect_err("all endpoints fail");

        match err {
            OverpassError::UpstreamUnavailable { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, TransportError::Http { status: 429, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn decode_failure_is_not_retried() {
        let (garbled, _) = serve_once(200, "not json").await;

        let err = source(vec![garbled, refused_endpoint().await])
            .query("[out:json];out;")
            .await
            .expect_err("decode failure");

        assert!(matches!(err, OverpassError::Decode { .. }));
    }

    #[tokio::test]
    async fn empty_endpoint_list_is_an_error() {
        let err = source(Vec::new())
            .query("[out:json];out;")
            .await
            .expect_err("no endpoints");
        assert!(matches!(err, OverpassError::NoEndpoints));
    }

    #[rstest]
    fn default_config_lists_public_instances() {
        let config = OverpassConfig::default();
        assert_eq!(config.endpoints.len(), DEFAULT_ENDPOINTS.len());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
