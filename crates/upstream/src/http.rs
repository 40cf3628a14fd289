//! HTTP implementations of the upstream clients.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::catalog::{CatalogClient, TicketTier};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, Rejected};
use crate::error::{Result, UpstreamError};
use crate::profile::{ProfileClient, UserProfile};

const USER_SERVICE: &str = "user-service";
const TICKET_SERVICE: &str = "ticket-service";

/// Host and port of an upstream service.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Settings shared by all HTTP upstream clients.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound for a single request, connect included.
    pub timeout: Duration,
    pub breaker: CircuitBreakerConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// A JSON GET endpoint on one upstream, behind its own circuit breaker.
#[derive(Debug, Clone)]
struct JsonService {
    service: &'static str,
    client: Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl JsonService {
    fn new(
        service: &'static str,
        endpoint: &ServiceEndpoint,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::Transport {
                service,
                message: e.to_string(),
            })?;

        Ok(Self {
            service,
            client,
            base_url: endpoint.base_url(),
            breaker: CircuitBreaker::new(service, config.breaker.clone()),
        })
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized + Sync,
    {
        let service = self.service;
        let url = format!("{}{}", self.base_url, path);
        let started = std::time::Instant::now();
        let client = &self.client;
        let target = url.as_str();

        let result = self
            .breaker
            .call(UpstreamError::is_upstream_fault, move || async move {
                let response = client
                    .get(target)
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| UpstreamError::Transport {
                        service,
                        message: e.to_string(),
                    })?;

                let status = response.status();
                if status != StatusCode::OK {
                    return Err(UpstreamError::Status {
                        service,
                        status: status.as_u16(),
                    });
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| UpstreamError::Decode {
                        service,
                        message: e.to_string(),
                    })
            })
            .await;

        metrics::histogram!("upstream_request_duration_seconds", "upstream" => service)
            .record(started.elapsed().as_secs_f64());

        result.map_err(|rejected| match rejected {
            Rejected::Open => UpstreamError::CircuitOpen { service },
            Rejected::Failed(e) => {
                tracing::error!(upstream = service, %url, error = %e, "upstream call failed");
                e
            }
        })
    }
}

/// Profile client talking to the user service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProfileClient {
    inner: JsonService,
}

impl HttpProfileClient {
    /// Creates a client for the user service at `endpoint`.
    pub fn new(endpoint: &ServiceEndpoint, config: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            inner: JsonService::new(USER_SERVICE, endpoint, config)?,
        })
    }

    /// Returns the breaker guarding this client.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }
}

#[async_trait]
impl ProfileClient for HttpProfileClient {
    #[tracing::instrument(skip(self))]
    async fn find_user_profile(&self, user_id: i64) -> Result<UserProfile> {
        self.inner
            .get_json("/api/private/user/profile", &[("user_id", user_id)])
            .await
            .map_err(|e| match e {
                UpstreamError::Status { status: 404, .. } => UpstreamError::UserNotFound(user_id),
                other => other,
            })
    }
}

/// Catalog client talking to the ticket service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    inner: JsonService,
}

impl HttpCatalogClient {
    /// Creates a client for the ticket service at `endpoint`.
    pub fn new(endpoint: &ServiceEndpoint, config: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            inner: JsonService::new(TICKET_SERVICE, endpoint, config)?,
        })
    }

    /// Returns the breaker guarding this client.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    #[tracing::instrument(skip(self))]
    async fn find_tickets_by_region(&self, region_name: &str) -> Result<Vec<TicketTier>> {
        self.inner
            .get_json("/api/private/ticket", &[("region_name", region_name)])
            .await
    }
}
