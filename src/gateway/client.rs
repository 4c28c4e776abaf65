//! Ecowitt gateway HTTP client

use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::error::FetchError;
use crate::gateway::livedata::parse_live_data;
use crate::models::{ChannelReading, GatewayConfig};

const LIVEDATA_PATH: &str = "get_livedata_info";

/// Result of a fetch attempt that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// No host configured; nothing was requested
    Unconfigured,
    Readings(Vec<ChannelReading>),
}

#[derive(Clone)]
pub struct GatewayClient {
    http_client: Client,
}

impl GatewayClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        // The gateway lives on the local network; never route it through a proxy
        let http_client = Client::builder()
            .no_proxy()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self { http_client })
    }

    /// Fetch the current soil channel readings from the gateway.
    ///
    /// The client never retries; a failed fetch is reported to the caller
    /// and the next poll tries again.
    pub async fn fetch_readings(&self, config: &GatewayConfig) -> Result<FetchOutcome, FetchError> {
        if !config.is_configured() {
            tracing::info!(
                "[GatewayClient] Please specify your Ecowitt hostname or IP address to continue."
            );
            return Ok(FetchOutcome::Unconfigured);
        }

        let url = livedata_url(&config.host)?;
        tracing::debug!("[GatewayClient] GET {}", url);

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: describe_transport_error(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: describe_transport_error(&e),
        })?;

        let readings = parse_live_data(&body).map_err(|reason| FetchError::Malformed {
            url: url.to_string(),
            reason,
        })?;

        tracing::debug!(
            "[GatewayClient] {} soil channels reported by {}",
            readings.len(),
            url
        );

        Ok(FetchOutcome::Readings(readings))
    }
}

/// Build the livedata URL for a configured host.
///
/// Accepts bare hostnames/IPs (http is assumed) and tolerates a trailing `/`.
pub fn livedata_url(host: &str) -> Result<Url, FetchError> {
    let trimmed = host.trim().trim_end_matches('/');
    let base = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let url = Url::parse(&format!("{}/{}", base, LIVEDATA_PATH)).map_err(|e| {
        FetchError::InvalidHost {
            host: host.to_string(),
            reason: e.to_string(),
        }
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidHost {
            host: host.to_string(),
            reason: format!("unsupported scheme {}", other),
        }),
    }
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "timeout".to_string()
    } else if e.is_connect() {
        format!("connection_failed: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use axum::http::StatusCode;
    use tokio_test::{assert_err, assert_ok};

    fn client() -> GatewayClient {
        GatewayClient::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_livedata_url() {
        assert_eq!(
            livedata_url("http://192.168.0.137").unwrap().as_str(),
            "http://192.168.0.137/get_livedata_info"
        );
        assert_eq!(
            livedata_url("http://192.168.0.137/").unwrap().as_str(),
            "http://192.168.0.137/get_livedata_info"
        );
        assert_eq!(
            livedata_url(" 192.168.0.137 ").unwrap().as_str(),
            "http://192.168.0.137/get_livedata_info"
        );
        assert_eq!(
            livedata_url("https://gw.local:8443").unwrap().as_str(),
            "https://gw.local:8443/get_livedata_info"
        );
    }

    #[test]
    fn test_livedata_url_rejects_garbage() {
        assert_err!(livedata_url("http://exa mple"));
        assert_err!(livedata_url("ftp://192.168.0.137"));
    }

    #[tokio::test]
    async fn test_unconfigured_short_circuit() {
        let outcome = client().fetch_readings(&GatewayConfig::new("")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Unconfigured);

        let outcome = client().fetch_readings(&GatewayConfig::new("  ")).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Unconfigured);
    }

    #[tokio::test]
    async fn test_fetch_readings() {
        let gateway = FakeGateway::start().await;
        gateway
            .set_channels(&[(1, "Garden", "35%"), (2, "Greenhouse", "42.6%")])
            .await;

        let outcome = assert_ok!(client().fetch_readings(&GatewayConfig::new(gateway.url())).await);
        assert_eq!(
            outcome,
            FetchOutcome::Readings(vec![
                ChannelReading::new("soil_1", "Garden", 35),
                ChannelReading::new("soil_2", "Greenhouse", 43),
            ])
        );
        assert_eq!(gateway.hits(), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        let gateway = FakeGateway::start().await;
        gateway
            .respond(StatusCode::SERVICE_UNAVAILABLE, "busy".to_string())
            .await;

        let err = client()
            .fetch_readings(&GatewayConfig::new(gateway.url()))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "{}", err);
        assert!(err.to_string().contains("503"), "{}", err);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client()
            .fetch_readings(&GatewayConfig::new(format!("http://{}", addr)))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "{}", err);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let gateway = FakeGateway::start().await;
        gateway
            .respond(StatusCode::OK, r#"{"wh25": []}"#.to_string())
            .await;

        let err = client()
            .fetch_readings(&GatewayConfig::new(gateway.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }), "{}", err);
    }
}
