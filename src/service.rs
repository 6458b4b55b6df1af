//! Access to the remote contact collection.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{CONTACTS_RESOURCE, ListConfig, ListError, Result, TOTAL_COUNT_RESPONSE_HEADER};
use crate::query::BackendQuery;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub id: i64,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub age: Option<i32>,
    pub address: Option<String>,
    pub codepostal: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponsePage<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> ResponsePage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}

#[async_trait]
pub trait ContactService: Send + Sync {
    async fn query(&self, query: &BackendQuery) -> Result<ResponsePage<Contact>>;

    async fn find(&self, id: i64) -> Result<Option<Contact>>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// Resolve a single contact, turning an absent record into `NotFound`.
pub async fn resolve(service: &dyn ContactService, id: i64) -> Result<Contact> {
    service.find(id).await?.ok_or(ListError::NotFound(id))
}

#[derive(Debug, Clone)]
pub struct HttpContactService {
    client: reqwest::Client,
    resource_url: Url,
}

impl HttpContactService {
    pub fn new(config: &ListConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| ListError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;
        Self::with_client(client, &config.api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: &Url) -> Result<Self> {
        let mut base = api_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let resource_url = base
            .join(CONTACTS_RESOURCE)
            .map_err(|e| ListError::InvalidConfig(format!("bad api url {api_url}: {e}")))?;
        Ok(Self { client, resource_url })
    }

    fn record_url(&self, id: i64) -> Url {
        let mut url = self.resource_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&id.to_string());
        }
        url
    }

    fn total_count(response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get(TOTAL_COUNT_RESPONSE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                ListError::BackendUnavailable(format!("{status}: {body}"))
            }
            _ => ListError::BackendRejected {
                status: status.as_u16(),
                message: body,
            },
        })
    }
}

#[async_trait]
impl ContactService for HttpContactService {
    async fn query(&self, query: &BackendQuery) -> Result<ResponsePage<Contact>> {
        let start_time = Instant::now();
        debug!("GET {} {:?}", self.resource_url, query);

        let response = self
            .client
            .get(self.resource_url.clone())
            .query(&query.to_pairs())
            .send()
            .await
            .inspect_err(|e| warn!("Contact query failed: {e}"))?;
        let response = Self::check_status(response).await?;
        let total_count = Self::total_count(&response);

        let body = response.bytes().await?;
        let items = if body.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice::<Option<Vec<Contact>>>(&body)
                .map_err(|e| ListError::MalformedResponse(e.to_string()))?
                .unwrap_or_default()
        };

        info!(
            "Loaded {} of {} contacts in {}ms",
            items.len(),
            total_count,
            start_time.elapsed().as_millis()
        );
        Ok(ResponsePage { items, total_count })
    }

    async fn find(&self, id: i64) -> Result<Option<Contact>> {
        let response = self.client.get(self.record_url(id)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Contact {id} not found");
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice::<Option<Contact>>(&body).map_err(|e| ListError::MalformedResponse(e.to_string()))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let response = self.client.delete(self.record_url(id)).send().await?;
        Self::check_status(response).await?;
        info!("Deleted contact {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(api: &str) -> HttpContactService {
        HttpContactService::with_client(reqwest::Client::new(), &Url::parse(api).unwrap()).unwrap()
    }

    #[test]
    fn resource_url_joins_under_api_base() {
        assert_eq!(service("http://host:8080").resource_url.as_str(), "http://host:8080/api/contacts");
        assert_eq!(service("http://host/app").resource_url.as_str(), "http://host/app/api/contacts");
        assert_eq!(service("http://host/app/").record_url(12).as_str(), "http://host/app/api/contacts/12");
    }

    #[test]
    fn contact_fields_default_when_missing() {
        let contact: Contact = serde_json::from_str(r#"{"id": 291, "prenom": "visualize"}"#).unwrap();
        assert_eq!(contact.id, 291);
        assert_eq!(contact.prenom.as_deref(), Some("visualize"));
        assert_eq!(contact.nom, None);
        assert_eq!(contact.age, None);
    }
}
