//! Minimal HTTP/1.1 JSON client for the operations plane.
//!
//! One TCP connection per request: connect, handshake, drive the
//! connection in the background, send, collect the body. Non-2xx
//! responses and timeouts surface as errors.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

const USER_AGENT: &str = "slipway-infra/0.1";

type OutBody = BoxBody<Bytes, std::convert::Infallible>;

/// JSON-over-HTTP client bound to one authority (`host:port`).
#[derive(Debug, Clone)]
pub struct HttpClient {
    address: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// GET `path` and parse the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let req = http::Request::builder()
            .method("GET")
            .uri(format!("http://{}{path}", self.address))
            .header("host", &self.address)
            .header("user-agent", USER_AGENT)
            .body(Empty::<Bytes>::new().boxed())
            .context("building request")?;
        let body = self.send(req).await?;
        serde_json::from_slice(&body).with_context(|| format!("decoding {path} response"))
    }

    /// POST a JSON payload to `path` and parse the JSON response body.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &B,
    ) -> anyhow::Result<T> {
        let body = self.send(self.post_request(path, payload)?).await?;
        serde_json::from_slice(&body).with_context(|| format!("decoding {path} response"))
    }

    /// POST where only the status matters; the response body is discarded.
    pub async fn post_ok<B: Serialize>(&self, path: &str, payload: &B) -> anyhow::Result<()> {
        self.send(self.post_request(path, payload)?).await?;
        Ok(())
    }

    fn post_request<B: Serialize>(
        &self,
        path: &str,
        payload: &B,
    ) -> anyhow::Result<http::Request<OutBody>> {
        let bytes = serde_json::to_vec(payload).context("encoding request body")?;
        http::Request::builder()
            .method("POST")
            .uri(format!("http://{}{path}", self.address))
            .header("host", &self.address)
            .header("user-agent", USER_AGENT)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(bytes)).boxed())
            .context("building request")
    }

    async fn send(&self, req: http::Request<OutBody>) -> anyhow::Result<Bytes> {
        let path = req.uri().path().to_string();
        let body = tokio::time::timeout(self.timeout, async {
            let stream = tokio::net::TcpStream::connect(&self.address)
                .await
                .with_context(|| format!("connecting to {}", self.address))?;
            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .context("http handshake")?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let resp = sender.send_request(req).await.context("sending request")?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .context("reading response body")?
                .to_bytes();
            if !status.is_success() {
                debug!(%status, %path, "operations endpoint returned non-2xx");
                anyhow::bail!("{path} returned {status}");
            }
            Ok(body)
        })
        .await
        .map_err(|_| anyhow::anyhow!("{path} timed out after {}s", self.timeout.as_secs()))??;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        score: f64,
    }

    fn canned(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn request_complete(raw: &[u8]) -> bool {
        let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&raw[..split]).to_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        raw.len() >= split + 4 + length
    }

    /// Accept one connection, capture the raw request, write `response`.
    async fn one_shot(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&raw) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (address, handle)
    }

    #[tokio::test]
    async fn get_json_parses_a_success_body() {
        let (address, handle) = one_shot(canned("200 OK", r#"{"score":0.93}"#)).await;
        let client = HttpClient::new(address, Duration::from_secs(2));

        let parsed: Score = client.get_json("/signals/production/health").await.unwrap();
        assert_eq!(parsed, Score { score: 0.93 });

        let request = handle.await.unwrap();
        assert!(request.starts_with("GET /signals/production/health HTTP/1.1"));
    }

    #[tokio::test]
    async fn post_json_sends_the_payload() {
        #[derive(Serialize)]
        struct Payload<'a> {
            slot: &'a str,
            percent: u32,
        }
        #[derive(Debug, Deserialize)]
        struct Ack {
            ok: bool,
        }

        let (address, handle) = one_shot(canned("200 OK", r#"{"ok":true}"#)).await;
        let client = HttpClient::new(address, Duration::from_secs(2));

        let ack: Ack = client
            .post_json(
                "/effects/traffic",
                &Payload {
                    slot: "green",
                    percent: 25,
                },
            )
            .await
            .unwrap();
        assert!(ack.ok);

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /effects/traffic"));
        assert!(request.contains(r#"{"slot":"green","percent":25}"#));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (address, _handle) =
            one_shot(canned("503 Service Unavailable", r#"{"error":"down"}"#)).await;
        let client = HttpClient::new(address, Duration::from_secs(2));

        let err = client
            .get_json::<Score>("/signals/production/health")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
