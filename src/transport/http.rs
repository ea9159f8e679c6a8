//! One-shot HTTP fallback publisher

use super::traits::{DeliveryResult, FallbackPublisher, LinkMonitor};
use crate::config::FallbackConfig;
use aeroscan_shared::{codec, Reading};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{redirect, StatusCode};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Delivers a reading with a single authenticated POST
pub struct HttpFallback {
    client: reqwest::Client,
    url: String,
    authorization: String,
    link: Arc<dyn LinkMonitor>,
}

impl HttpFallback {
    /// Build the HTTP client for the configured collector
    pub fn new(config: &FallbackConfig, link: Arc<dyn LinkMonitor>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(strict_redirects(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            authorization: format!("Bearer {}", config.auth_token),
            link,
        })
    }
}

/// Strict redirect following for a POST
///
/// 302/303 are followed, and reqwest re-issues them as a body-less GET.
/// 301/307/308 would repeat the POST at a new location and are not followed.
fn strict_redirects(max: usize) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.error("too many redirects")
        } else if matches!(attempt.status(), StatusCode::FOUND | StatusCode::SEE_OTHER) {
            attempt.follow()
        } else {
            attempt.stop()
        }
    })
}

#[async_trait]
impl FallbackPublisher for HttpFallback {
    async fn publish(&self, reading: &Reading) -> DeliveryResult {
        if !self.link.is_link_up().await {
            warn!("[HTTP] Network link down, cannot send fallback");
            return DeliveryResult::NetworkUnavailable;
        }

        let payload = match codec::encode_payload(reading) {
            Ok(payload) => payload,
            Err(e) => return DeliveryResult::TransportError(e.to_string()),
        };

        info!("[HTTP] POST {}", self.url);
        debug!("[HTTP] Payload: {}", payload);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .body(payload)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) if e.is_timeout() => return DeliveryResult::TimedOut,
                    Err(e) => {
                        debug!("[HTTP] Failed to read response body: {}", e);
                        String::new()
                    }
                };

                if status.is_success() {
                    DeliveryResult::Success {
                        status: status.as_u16(),
                        body,
                    }
                } else {
                    DeliveryResult::HttpError {
                        status: status.as_u16(),
                        body,
                    }
                }
            }
            Err(e) if e.is_timeout() => DeliveryResult::TimedOut,
            Err(e) => DeliveryResult::TransportError(e.to_string()),
        }
    }
}
