// HTTP retrieval of remote resources.
// Performs a plain GET and treats the response body as opaque text.

use async_trait::async_trait;
use reqwest::{
    Client, Response,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{RemoteSvgError, Result};

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("remote-svg/", env!("CARGO_PKG_VERSION"));

/// Something that can retrieve the payload living at a resource identifier.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, identifier: &str) -> Result<String>;
}

/// `Fetcher` over HTTP(S) using a shared reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher that identifies itself with `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| RemoteSvgError::Other(e.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("image/svg+xml, text/plain;q=0.9, */*;q=0.8"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(RemoteSvgError::Http)?;

        Ok(Self { client })
    }

    /// Check response status and convert errors.
    fn check_response(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(RemoteSvgError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, identifier: &str) -> Result<String> {
        let response = self.client.get(identifier).send().await?;
        let response = Self::check_response(response)?;
        let body = response.text().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP response on a local port and return its base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: image/svg+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let base = serve_once("200 OK", "<svg>ok</svg>").await;
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();

        let body = fetcher.fetch(&format!("{}/test.svg", base)).await.unwrap();
        assert_eq!(body, "<svg>ok</svg>");
    }

    #[tokio::test]
    async fn test_fetch_maps_error_status() {
        let base = serve_once("404 Not Found", "missing").await;
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();

        let err = fetcher
            .fetch(&format!("{}/missing.svg", base))
            .await
            .unwrap_err();
        match err {
            RemoteSvgError::Status { status, url } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing.svg"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_is_http_error() {
        let fetcher = HttpFetcher::new(DEFAULT_USER_AGENT).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, RemoteSvgError::Http(_)));
    }

    #[test]
    fn test_rejects_invalid_user_agent() {
        assert!(HttpFetcher::new("bad\nagent").is_err());
    }
}
