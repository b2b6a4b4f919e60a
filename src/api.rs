// API client module: a small blocking HTTP client bound to the configured
// prediction service, plus the deployment handle the view submits rows to.
// Every call blocks until the full response is in; nothing is retried.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::table::{FeatureRow, PredictionTable};

/// Routing header expected by dedicated prediction servers.
const DATAROBOT_KEY_HEADER: &str = "DataRobot-Key";

/// Submit tabular rows, receive tabular predictions. The view only talks to
/// the service through this.
pub trait Predictor {
    fn predict(&self, rows: &[FeatureRow]) -> Result<PredictionTable, ApiError>;
}

/// Holds the reqwest client (with the bearer token baked into its default
/// headers) and the API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Deployment metadata as returned by `GET /deployments/{id}/`. Only the
/// fields needed for routing predictions are kept.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default_prediction_server: Option<PredictionServer>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionServer {
    pub url: String,
    #[serde(rename = "datarobot-key", default)]
    pub datarobot_key: Option<String>,
}

/// One input feature the deployed model declares.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFeature {
    pub name: String,
    #[serde(default)]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub importance: Option<f64>,
}

/// Paginated list envelope used by the service's listing endpoints.
#[derive(Deserialize, Debug)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PredictionResponse {
    data: Vec<serde_json::Map<String, Value>>,
}

impl ApiClient {
    /// Build a client for the configured endpoint. No request is made here.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        // The view shows a spinner for as long as the service takes.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<Duration>)
            .build()?;
        Ok(ApiClient {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a deployment handle by id.
    pub fn get_deployment(&self, deployment_id: &str) -> Result<Deployment, ApiError> {
        let url = format!("{}/deployments/{}/", self.base_url, deployment_id);
        let info: DeploymentInfo = self.get_json(&url)?;
        info!(
            deployment_id = %info.id,
            label = info.label.as_deref().unwrap_or(""),
            "resolved deployment"
        );
        Ok(Deployment::new(self.clone(), info))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!(%url, "GET");
        let res = self.client.get(url).send()?;
        decode(url, res)
    }
}

/// Check the status and decode a JSON body, keeping the body text on failure
/// so the user sees what the service complained about.
fn decode<T: DeserializeOwned>(url: &str, res: Response) -> Result<T, ApiError> {
    let status = res.status();
    let body = res.text()?;
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            url: url.to_string(),
            body,
        });
    }
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// A resolved deployment. Built once at startup and handed to the view.
#[derive(Clone)]
pub struct Deployment {
    client: ApiClient,
    info: DeploymentInfo,
}

impl Deployment {
    pub fn new(client: ApiClient, info: DeploymentInfo) -> Self {
        Deployment { client, info }
    }

    pub fn info(&self) -> &DeploymentInfo {
        &self.info
    }

    /// Dedicated prediction server when the deployment has one, else the
    /// API's own predictions route.
    pub fn prediction_url(&self) -> String {
        match &self.info.default_prediction_server {
            Some(server) => format!(
                "{}/predApi/v1.0/deployments/{}/predictions",
                server.url.trim_end_matches('/'),
                self.info.id
            ),
            None => format!(
                "{}/deployments/{}/predictions",
                self.client.base_url, self.info.id
            ),
        }
    }

    /// The model's declared input features, following pagination.
    pub fn features(&self) -> Result<Vec<DeploymentFeature>, ApiError> {
        let mut url = format!("{}/deployments/{}/features/", self.client.base_url, self.info.id);
        let mut features = Vec::new();
        loop {
            let page: Page<DeploymentFeature> = self.client.get_json(&url)?;
            features.extend(page.data);
            match page.next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }
        debug!(count = features.len(), "fetched deployment features");
        Ok(features)
    }
}

impl Predictor for Deployment {
    fn predict(&self, rows: &[FeatureRow]) -> Result<PredictionTable, ApiError> {
        let url = self.prediction_url();
        debug!(%url, rows = rows.len(), "POST predictions");

        let mut req = self.client.client.post(&url).json(rows);
        if let Some(key) = self
            .info
            .default_prediction_server
            .as_ref()
            .and_then(|s| s.datarobot_key.as_deref())
        {
            req = req.header(DATAROBOT_KEY_HEADER, key);
        }

        let res = req.send()?;
        let body: PredictionResponse = decode(&url, res)?;
        let table = PredictionTable::from_records(body.data);
        if table.len() != rows.len() {
            warn!(sent = rows.len(), received = table.len(), "prediction count differs from input rows");
        }
        info!(rows = table.len(), "received predictions");
        Ok(table)
    }
}
