//! Loopback redirect listener
//!
//! A temporary local HTTP server that receives the browser redirect at the end
//! of the login and hands the full redirect URL back to the caller.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;
use crate::Result;

/// Path component of the registered redirect URI
pub const CALLBACK_PATH: &str = "/callback";

/// Loopback address the listener binds and the redirect URI names
pub const CALLBACK_HOST: &str = "127.0.0.1";

const PAGE_STYLE: &str = r#"<style>
        body {
            background-color: #f5f5f5;
            color: #242424;
            font-family: 'Segoe UI', -apple-system, system-ui, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            text-align: center;
        }
        .container { max-width: 420px; padding: 40px; }
        h1 { font-size: 22px; font-weight: 600; margin: 0 0 12px; }
        h1.ok { color: #5b5fc7; }
        h1.err { color: #c4314b; }
        p { font-size: 15px; color: #616161; line-height: 1.6; }
    </style>"#;

fn page(title: &str, class: &str, text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    <title>teamslink | {title}</title>\n    {PAGE_STYLE}\n</head>\n<body>\n    <div class=\"container\">\n        <h1 class=\"{class}\">{title}</h1>\n        <p>{text}</p>\n    </div>\n</body>\n</html>"
    )
}

fn success_page() -> String {
    page(
        "Signed in",
        "ok",
        "teamslink has been granted access.<br>You can close this window and return to your terminal.",
    )
}

fn error_page() -> String {
    page(
        "Sign-in failed",
        "err",
        "The sign-in did not complete.<br>Please try again from your terminal.",
    )
}

/// Listener bound before the browser is opened, so the redirect cannot race it
pub struct CallbackServer {
    listener: TcpListener,
    port: u16,
}

impl CallbackServer {
    /// Bind on [`CALLBACK_HOST`]; port 0 picks a free port
    pub async fn bind(port: u16) -> Result<Self> {
        let addr = format!("{}:{}", CALLBACK_HOST, port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to start callback server on {}: {}", addr, e),
            )
        })?;
        let port = listener.local_addr()?.port();
        tracing::info!("Callback server listening on http://{}:{}", CALLBACK_HOST, port);
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for a request on [`CALLBACK_PATH`] and return its full URL.
    ///
    /// Other paths (e.g. `/favicon.ico`) get a 404 and are otherwise ignored.
    pub async fn next_redirect(&self) -> Result<Url> {
        loop {
            let (mut socket, peer) = self.listener.accept().await?;
            tracing::debug!("Callback connection from {}", peer);

            let request = match read_request(&mut socket).await {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Failed to read callback request: {}", e);
                    continue;
                }
            };

            let url = match parse_request_target(&request, self.port) {
                Some(url) => url,
                None => {
                    respond(&mut socket, "400 Bad Request", &error_page()).await;
                    continue;
                }
            };

            if url.path() != CALLBACK_PATH {
                respond(&mut socket, "404 Not Found", "").await;
                continue;
            }

            let has_code = url.query_pairs().any(|(k, _)| k == "code");
            if has_code {
                respond(&mut socket, "200 OK", &success_page()).await;
            } else {
                respond(&mut socket, "400 Bad Request", &error_page()).await;
            }
            return Ok(url);
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = vec![0u8; 8192];
    let n = socket.read(&mut buffer).await?;
    Ok(String::from_utf8_lossy(&buffer[..n]).into_owned())
}

async fn respond(socket: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    // Best effort: the browser may already have gone away
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        tracing::debug!("Failed to write callback response: {}", e);
    }
    let _ = socket.shutdown().await;
}

/// Turn `GET /callback?code=xxx HTTP/1.1` into an absolute URL
fn parse_request_target(request: &str, port: u16) -> Option<Url> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    let target = parts.next()?;
    if !target.starts_with('/') {
        return None;
    }
    Url::parse(&format!("http://{}:{}{}", CALLBACK_HOST, port, target)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_target() {
        let request = "GET /callback?code=abc123&state=xyz789 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        let url = parse_request_target(request, 8085).unwrap();
        assert_eq!(url.path(), "/callback");
        assert_eq!(
            url.query_pairs().find(|(k, _)| k == "code").map(|(_, v)| v.into_owned()),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_request_target("", 8085).is_none());
        assert!(parse_request_target("GET", 8085).is_none());
        assert!(parse_request_target("GET http://evil/ HTTP/1.1", 8085).is_none());
    }

    #[tokio::test]
    async fn test_next_redirect_skips_other_paths() {
        let server = CallbackServer::bind(0).await.unwrap();
        let port = server.port();

        let client = tokio::spawn(async move {
            for target in ["/favicon.ico", "/callback?code=the-code&state=s1"] {
                let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
                let request = format!("GET {} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", target);
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).await.unwrap();
                if target.starts_with("/callback") {
                    assert!(response.starts_with("HTTP/1.1 200 OK"));
                } else {
                    assert!(response.starts_with("HTTP/1.1 404"));
                }
            }
        });

        let url = server.next_redirect().await.unwrap();
        client.await.unwrap();

        assert_eq!(url.path(), CALLBACK_PATH);
        assert!(url.query_pairs().any(|(k, v)| k == "code" && v == "the-code"));
    }

    #[test]
    fn test_pages_render() {
        assert!(success_page().contains("Signed in"));
        assert!(error_page().contains("Sign-in failed"));
    }

    #[tokio::test]
    async fn test_configured_redirect_reaches_listener() {
        let server = CallbackServer::bind(0).await.unwrap();
        let config = crate::config::Config {
            redirect_port: server.port(),
            ..Default::default()
        };

        let redirect = Url::parse(&config.redirect_uri()).unwrap();
        assert_eq!(redirect.host_str(), Some(CALLBACK_HOST));
        assert_eq!(redirect.path(), CALLBACK_PATH);

        let host = redirect.host_str().unwrap().to_string();
        let port = redirect.port().unwrap();
        assert!(TcpStream::connect((host.as_str(), port)).await.is_ok());
    }
}
