//! Network reachability check run before anything that could prompt the user

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;
use crate::Result;
use crate::error::Error;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online iff a TCP connection to the API host succeeds in time
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host serving `url`
    pub fn for_url(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::Config(format!("Invalid URL {}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Config(format!("URL has no host: {}", url)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::Config(format!("URL has no port: {}", url)))?;
        Ok(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Connectivity probe to {}:{} failed: {}", self.host, self.port, e);
                false
            }
            Err(_) => {
                tracing::debug!("Connectivity probe to {}:{} timed out", self.host, self.port);
                false
            }
        }
    }
}

/// Fixed answer, for `--skip-connectivity-check` and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity(pub bool);

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_for_url_defaults_https_port() {
        let probe = TcpProbe::for_url("https://graph.microsoft.com/v1.0", Duration::from_secs(1)).unwrap();
        assert_eq!(probe.host, "graph.microsoft.com");
        assert_eq!(probe.port, 443);
    }

    #[test]
    fn test_for_url_rejects_garbage() {
        assert!(TcpProbe::for_url("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_fixed_connectivity() {
        assert!(tokio_test::block_on(FixedConnectivity(true).is_online()));
        assert!(!tokio_test::block_on(FixedConnectivity(false).is_online()));
    }

    #[tokio::test]
    async fn test_probe_reachable_and_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(probe.is_online().await);

        drop(listener);
        assert!(!probe.is_online().await);
    }
}
