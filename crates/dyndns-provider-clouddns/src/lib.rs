//! Google Cloud DNS zone client
//!
//! * Talks to the Cloud DNS REST API (`dns/v1`) through `reqwest` + rustls.
//! * Bound to one `project` / `managedZone` pair at construction.
//! * Auth via **OAuth2 bearer token**: either a fixed token or one fetched from
//!   the GCE metadata server and cached until shortly before it expires.
//! * Non-success answers are mapped through [`ProviderError::from_status`], so
//!   429 / 5xx stay retryable and other 4xx are final.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dyndns_provider::{ChangeSet, ProviderError, RecordSet, ZoneClient};
use parking_lot::Mutex;
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const API_ROOT: &str = "https://dns.googleapis.com/dns/v1";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh a cached token this long before Google says it expires.
const TOKEN_SLACK_SECS: i64 = 60;

/*──────── credentials ────────*/

#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Pre-issued access token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// Metadata server of the runtime (Cloud Functions / Cloud Run / GCE).
    Metadata { url: String },
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::Metadata {
            url: METADATA_TOKEN_URL.to_owned(),
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/*──────── wire shapes ────────*/

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RrsetPage {
    #[serde(default)]
    rrsets: Vec<RecordSet>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/*──────── client struct ────────*/

pub struct CloudDnsClient {
    project: String,
    zone: String,
    api_root: String,
    tokens: TokenSource,
    client: Client,

    cached: Mutex<Option<CachedToken>>,
}

impl CloudDnsClient {
    pub fn new(project: &str, zone: &str, tokens: TokenSource, timeout: Duration) -> anyhow::Result<Self> {
        let mut hdr = HeaderMap::new();
        hdr.insert(USER_AGENT, HeaderValue::from_static("dyndns-rs (+github)"));

        Ok(Self {
            project: project.to_owned(),
            zone: zone.to_owned(),
            api_root: API_ROOT.to_owned(),
            tokens,
            client: Client::builder()
                .default_headers(hdr)
                .timeout(timeout)
                .build()?,
            cached: Mutex::new(None),
        })
    }

    /// Point the client at another API root (emulators, tests).
    pub fn with_api_root(mut self, root: &str) -> Self {
        self.api_root = root.trim_end_matches('/').to_owned();
        self
    }

    fn zone_url(&self) -> String {
        format!(
            "{}/projects/{}/managedZones/{}",
            self.api_root, self.project, self.zone
        )
    }

    /*──────── token handling ────────*/

    async fn bearer(&self) -> Result<String, ProviderError> {
        let url = match &self.tokens {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url,
        };

        let fresh = self
            .cached
            .lock()
            .as_ref()
            .filter(|tok| tok.expires_at > Utc::now())
            .map(|tok| tok.value.clone());
        if let Some(token) = fresh {
            return Ok(token);
        }

        let resp = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Credentials(format!(
                "metadata server answered {}",
                resp.status()
            )));
        }
        let tok: MetadataToken = resp.json().await?;
        let expires_at = TimeDelta::try_seconds(tok.expires_in.saturating_sub(TOKEN_SLACK_SECS).max(0))
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                ProviderError::Credentials(format!("token lifetime {}s out of range", tok.expires_in))
            })?;
        debug!("fetched access token from metadata server, valid until {expires_at}");

        *self.cached.lock() = Some(CachedToken {
            value: tok.access_token.clone(),
            expires_at,
        });
        Ok(tok.access_token)
    }

    /*──────── tiny HTTP wrapper ────────*/

    async fn send(&self, req: RequestBuilder) -> Result<Response, ProviderError> {
        let token = self.bearer().await?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ProviderError::Credentials(e.to_string()))?;
        Ok(req.header(AUTHORIZATION, value).send().await?)
    }

    async fn check(&self, resp: Response) -> Result<Value, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        let msg = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_owned());
        Err(ProviderError::from_status(status.as_u16(), msg))
    }
}

/*──────── ZoneClient impl ────────*/

#[async_trait]
impl ZoneClient for CloudDnsClient {
    fn name(&self) -> &'static str {
        "Cloud DNS"
    }
    fn zone(&self) -> &str {
        &self.zone
    }

    async fn zone_exists(&self) -> Result<bool, ProviderError> {
        let resp = self.send(self.client.get(self.zone_url())).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        self.check(resp).await?;
        Ok(true)
    }

    async fn list_record_sets(&self) -> Result<Vec<RecordSet>, ProviderError> {
        let url = format!("{}/rrsets", self.zone_url());
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.client.get(&url);
            if let Some(tok) = &page_token {
                req = req.query(&[("pageToken", tok.as_str())]);
            }
            let v = self.check(self.send(req).await?).await?;
            let page: RrsetPage = serde_json::from_value(v)
                .map_err(|e| ProviderError::Api { status: 200, message: e.to_string() })?;
            out.extend(page.rrsets);

            match page.next_page_token {
                Some(tok) if !tok.is_empty() => page_token = Some(tok),
                _ => break,
            }
        }
        debug!("Cloud DNS zone {} holds {} record sets", self.zone, out.len());
        Ok(out)
    }

    async fn apply_changes(&self, changes: &ChangeSet) -> Result<(), ProviderError> {
        let req = self
            .client
            .post(format!("{}/changes", self.zone_url()))
            .json(changes);
        let v = self.check(self.send(req).await?).await?;
        info!(
            "Cloud DNS change id={} status={}",
            v["id"].as_str().unwrap_or("?"),
            v["status"].as_str().unwrap_or("?")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyndns_provider::RecordType;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE_PATH: &str = "/projects/proj/managedZones/home-zone";

    fn client(server: &MockServer) -> CloudDnsClient {
        CloudDnsClient::new(
            "proj",
            "home-zone",
            TokenSource::Static("tok".into()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_api_root(&server.uri())
    }

    #[tokio::test]
    async fn zone_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ZONE_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "The 'parameters.managedZone' resource named 'home-zone' does not exist."}
            })))
            .mount(&server)
            .await;

        assert!(!client(&server).zone_exists().await.unwrap());
    }

    #[tokio::test]
    async fn zone_exists_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ZONE_PATH))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "home-zone"})))
            .mount(&server)
            .await;

        assert!(client(&server).zone_exists().await.unwrap());
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rrsets": [{"name": "home.example.com.", "type": "A", "ttl": 300, "rrdatas": ["1.2.3.4"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rrsets": [{"name": "example.com.", "type": "NS", "ttl": 21600, "rrdatas": ["ns1.example.net."]}],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let sets = client(&server).list_record_sets().await.unwrap();
        assert_eq!(sets.len(), 2);
        assert!(sets[1].matches("home.example.com.", RecordType::A));
    }

    #[tokio::test]
    async fn apply_posts_change_set() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{ZONE_PATH}/changes")))
            .and(body_partial_json(json!({
                "additions": [{"name": "home.example.com.", "type": "A", "ttl": 300, "rrdatas": ["5.6.7.8"]}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "7", "status": "pending"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let rr = RecordSet::new("home.example.com.", RecordType::A, 300, vec!["5.6.7.8".into()]);
        client(&server)
            .apply_changes(&ChangeSet::new().add(rr))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{ZONE_PATH}/rrsets")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{ZONE_PATH}/changes")))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "Forbidden"}
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let err = c.list_record_sets().await.unwrap_err();
        assert!(err.is_transient(), "{err}");

        let err = c.apply_changes(&ChangeSet::new()).await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Forbidden"));
    }

    #[tokio::test]
    async fn metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("metadata-flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "meta-tok", "expires_in": 3599, "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ZONE_PATH))
            .and(header("authorization", "Bearer meta-tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "home-zone"})))
            .expect(2)
            .mount(&server)
            .await;

        let c = CloudDnsClient::new(
            "proj",
            "home-zone",
            TokenSource::Metadata { url: format!("{}/token", server.uri()) },
            Duration::from_secs(5),
        )
        .unwrap()
        .with_api_root(&server.uri());

        assert!(c.zone_exists().await.unwrap());
        assert!(c.zone_exists().await.unwrap());
    }

    fn metadata_client(server: &MockServer) -> CloudDnsClient {
        CloudDnsClient::new(
            "proj",
            "home-zone",
            TokenSource::Metadata { url: format!("{}/token", server.uri()) },
            Duration::from_secs(5),
        )
        .unwrap()
        .with_api_root(&server.uri())
    }

    #[tokio::test]
    async fn short_lived_metadata_token_is_refetched() {
        let server = MockServer::start().await;
        // inside the refresh slack, so already stale once cached
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "meta-tok", "expires_in": 30, "token_type": "Bearer"
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ZONE_PATH))
            .and(header("authorization", "Bearer meta-tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "home-zone"})))
            .expect(2)
            .mount(&server)
            .await;

        let c = metadata_client(&server);
        assert!(c.zone_exists().await.unwrap());
        assert!(c.zone_exists().await.unwrap());
    }

    #[tokio::test]
    async fn absurd_token_lifetime_is_a_credentials_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "meta-tok", "expires_in": i64::MAX, "token_type": "Bearer"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ZONE_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = metadata_client(&server).zone_exists().await.unwrap_err();
        assert!(matches!(err, ProviderError::Credentials(_)), "{err}");
        assert!(!err.is_transient());
    }
}
