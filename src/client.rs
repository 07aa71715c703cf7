//! REST client for the PagerDuty API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, TriggerError};
use crate::subscription::SubscriptionApi;
use crate::types::{
    SelectOption, ServicesPage, SubscriptionEnvelope, SubscriptionRequest, TeamsPage,
    WebhookSubscription,
};

const PAGERDUTY_API_URL: &str = "https://api.pagerduty.com";

/// Page size for collection listings; PagerDuty caps `limit` at 100.
const PAGE_LIMIT: usize = 100;

/// Thin client over the handful of PagerDuty endpoints the trigger uses.
///
/// The credential token is opaque: the host resolves (and refreshes) it
/// for whichever authentication mode the user picked, and it is sent as a
/// bearer token either way.
#[derive(Debug, Clone)]
pub struct PagerDutyClient {
    client: reqwest::Client,
    base_url: String,
}

impl PagerDutyClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, PAGERDUTY_API_URL)
    }

    fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.pagerduty+json;version=2"),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| TriggerError::config("credential token contains invalid characters"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[cfg(test)]
    pub fn with_url(token: &str, base_url: &str) -> Result<Self> {
        Self::with_base_url(token, base_url)
    }

    /// All teams in the account, every page, in arrival order.
    pub async fn list_teams(&self) -> Result<Vec<SelectOption>> {
        let mut options = Vec::new();
        let mut offset = 0;
        loop {
            let url = format!(
                "{}/teams?limit={PAGE_LIMIT}&offset={offset}",
                self.base_url
            );
            let page: TeamsPage = self.get_json(&url).await?;
            options.extend(page.teams.into_iter().map(|team| SelectOption {
                name: team.name,
                value: team.id,
            }));
            if !page.more {
                break;
            }
            offset += PAGE_LIMIT;
        }
        debug!(count = options.len(), "listed PagerDuty teams");
        Ok(options)
    }

    /// All services in the account, every page, in arrival order.
    pub async fn list_services(&self) -> Result<Vec<SelectOption>> {
        let mut options = Vec::new();
        let mut offset = 0;
        loop {
            let url = format!(
                "{}/services?limit={PAGE_LIMIT}&offset={offset}",
                self.base_url
            );
            let page: ServicesPage = self.get_json(&url).await?;
            options.extend(page.services.into_iter().map(|service| SelectOption {
                name: service.name,
                value: service.id,
            }));
            if !page.more {
                break;
            }
            offset += PAGE_LIMIT;
        }
        debug!(count = options.len(), "listed PagerDuty services");
        Ok(options)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let response = Self::checked(response).await?;
        Ok(response.json().await?)
    }

    /// Map any non-2xx status into an `Api` error carrying the body.
    async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TriggerError::Api { status, body })
    }
}

#[async_trait]
impl SubscriptionApi for PagerDutyClient {
    async fn get_subscription(&self, id: &str) -> Result<WebhookSubscription> {
        let url = format!("{}/webhook_subscriptions/{id}", self.base_url);
        let envelope: SubscriptionEnvelope = self.get_json(&url).await?;
        Ok(envelope.webhook_subscription)
    }

    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<WebhookSubscription> {
        let url = format!("{}/webhook_subscriptions", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let envelope: SubscriptionEnvelope = Self::checked(response).await?.json().await?;
        Ok(envelope.webhook_subscription)
    }

    async fn delete_subscription(&self, id: &str) -> Result<()> {
        let url = format!("{}/webhook_subscriptions/{id}", self.base_url);
        let response = self.client.delete(&url).send().await?;
        Self::checked(response).await?;
        Ok(())
    }
}
