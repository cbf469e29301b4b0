//! HTTP transport for the scanning service.

use crate::target::TargetUrl;
use crate::transport::response::{self, Payload};
use crate::transport::{ScanTransport, ServiceProtocol, Verb};
use crate::types::{HttpConfig, ReconError, Result};
use futures::future::{BoxFuture, FutureExt};
use governor::{Quota, RateLimiter};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const ACCEPT_ANY: &str = "application/json, text/plain, */*";

/// Request body for POST submissions.
#[derive(Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
}

/// reqwest-backed transport with request pacing.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    protocol: ServiceProtocol,
    timeout: Duration,
    rate_limiter: Arc<RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>>,
}

impl HttpTransport {
    /// Create a new transport against `config.endpoint`.
    pub fn new(config: &HttpConfig, protocol: ServiceProtocol) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        url::Url::parse(&endpoint)
            .map_err(|e| ReconError::Config(format!("invalid endpoint {:?}: {}", endpoint, e)))?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self {
            client,
            endpoint,
            protocol,
            timeout,
            rate_limiter,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn recon_url(&self, target: &TargetUrl) -> String {
        format!(
            "{}/recon?url={}",
            self.endpoint,
            urlencoding::encode(target.as_str())
        )
    }

    fn submit_url(&self) -> String {
        match self.protocol {
            ServiceProtocol::Recon => format!("{}/recon", self.endpoint),
            ServiceProtocol::Job => format!("{}/scan", self.endpoint),
        }
    }

    fn results_url(&self, job_id: &str) -> String {
        format!("{}/results/{}", self.endpoint, urlencoding::encode(job_id))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Payload> {
        self.rate_limiter.until_ready().await;

        let reply = request
            .header(ACCEPT, ACCEPT_ANY)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = reply.status().as_u16();
        let content_type = reply
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = reply.text().await.map_err(|e| self.map_send_error(e))?;

        debug!("Service replied HTTP {} ({} bytes)", status, body.len());
        response::classify(status, content_type.as_deref(), body)
    }

    fn map_send_error(&self, error: reqwest::Error) -> ReconError {
        if error.is_timeout() {
            ReconError::Timeout(self.timeout)
        } else {
            ReconError::Network(error.to_string())
        }
    }
}

impl ScanTransport for HttpTransport {
    fn protocol(&self) -> ServiceProtocol {
        self.protocol
    }

    fn request<'a>(&'a self, target: &'a TargetUrl, verb: Verb) -> BoxFuture<'a, Result<Payload>> {
        async move {
            let request = match verb {
                Verb::Get => {
                    let url = self.recon_url(target);
                    trace!("GET {}", url);
                    self.client.get(url)
                }
                Verb::Post => {
                    let url = self.submit_url();
                    trace!("POST {}", url);
                    self.client.post(url).json(&SubmitRequest {
                        url: target.as_str(),
                    })
                }
            };
            self.send(request).await
        }
        .boxed()
    }

    fn poll<'a>(&'a self, job_id: &'a str) -> BoxFuture<'a, Result<Payload>> {
        async move {
            let url = self.results_url(job_id);
            trace!("GET {}", url);
            self.send(self.client.get(url)).await
        }
        .boxed()
    }
}
