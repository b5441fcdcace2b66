use std::collections::BTreeMap;
use std::time::Duration;

use deploy_core::{ActivityEntry, DeployStatusUpdate, JobStatus, LogLine};
use deploy_logging::deploy_trace;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{ApiError, FailureKind, FullLog, RcloneStatus, StartResponse, TailBatch};

/// Header carrying the request nonce expected by the job runner.
pub const NONCE_HEADER: &str = "X-WP-Nonce";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// REST root of the job runner, e.g. `https://example.com/wp-json/simplystatic/v1/`.
    pub base_url: String,
    pub nonce: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Lines requested when saving the whole log.
    pub full_log_lines: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/wp-json/simplystatic/v1/".to_string(),
            nonce: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            full_log_lines: 10_000,
        }
    }
}

/// Remote job runner.
#[async_trait::async_trait]
pub trait DeployApi: Send + Sync {
    async fn check_status(&self) -> Result<JobStatus, ApiError>;

    /// Lines after `since`, oldest first.
    async fn tail_log(&self, since: u64, max_lines: u32) -> Result<TailBatch, ApiError>;

    /// Only transport failures are errors; a refused start is a [`StartResponse`].
    async fn start_job(&self) -> Result<StartResponse, ApiError>;

    async fn cancel_job(&self) -> Result<(), ApiError>;

    async fn force_stop(&self) -> Result<(), ApiError>;

    /// `None` when the server has no log to give.
    async fn download_full_log(&self) -> Result<Option<FullLog>, ApiError>;

    async fn check_rclone(&self) -> Result<RcloneStatus, ApiError>;

    /// Latest message per task, ordered by task key.
    async fn activity_log(&self) -> Result<Vec<ActivityEntry>, ApiError>;

    /// Records stage progress on the server for the "last deployment" view.
    async fn save_deploy_status(&self, update: &DeployStatusUpdate) -> Result<(), ApiError>;
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    running: bool,
    #[serde(default)]
    paused: bool,
}

#[derive(Debug, Deserialize)]
struct DebugLogPayload {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    lines: Option<Vec<DebugLine>>,
    #[serde(default)]
    running: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DebugLine {
    line_num: u64,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct StartPayload {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RclonePayload {
    #[serde(default)]
    available: bool,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActivityValue {
    Text(String),
    Entry {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ReqwestDeployApi {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
}

impl ReqwestDeployApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let mut base = Url::parse(&settings.base_url)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        // Url::join replaces the last segment unless the path ends in a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint(&self, name: &str, query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = self
            .base
            .join(name)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn get(&self, name: &str, query: &[(&str, String)]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(name, query)?;
        Ok(self.client.get(url).header(NONCE_HEADER, &self.settings.nonce))
    }

    fn post(&self, name: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(name, &[])?;
        Ok(self.client.post(url).header(NONCE_HEADER, &self.settings.nonce))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let body = response.text().await.map_err(map_reqwest_error)?;
        decode(&body)
    }

    async fn fetch_debug_log(&self, query: &[(&str, String)]) -> Result<DebugLogPayload, ApiError> {
        self.fetch_json(self.get("debug-log", query)?).await
    }

    async fn acknowledge(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ))
        }
    }
}

#[async_trait::async_trait]
impl DeployApi for ReqwestDeployApi {
    async fn check_status(&self) -> Result<JobStatus, ApiError> {
        let payload: StatusPayload = self.fetch_json(self.get("is-running", &[])?).await?;
        Ok(JobStatus {
            running: payload.running,
            paused: payload.paused,
        })
    }

    async fn tail_log(&self, since: u64, max_lines: u32) -> Result<TailBatch, ApiError> {
        let payload = self
            .fetch_debug_log(&[
                ("lines", max_lines.to_string()),
                ("since_line", since.to_string()),
            ])
            .await?;
        let lines = match payload.lines {
            Some(lines) if payload.success => lines
                .into_iter()
                .map(|line| LogLine::new(line.line_num, line.text))
                .collect(),
            _ => Vec::new(),
        };
        deploy_trace!("debug-log since {} returned {} lines", since, lines.len());
        Ok(TailBatch {
            lines,
            running: payload.running,
        })
    }

    async fn start_job(&self) -> Result<StartResponse, ApiError> {
        let response = self
            .post("start-export")?
            .json(&serde_json::json!({ "type": "export" }))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let http_status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        // Only the status in the body counts as an answer; a bare 2xx is not a start.
        if http_status.is_success() {
            let payload: StartPayload = decode(&body)?;
            return Ok(StartResponse {
                status_code: payload.status,
                message: payload.message,
            });
        }
        // Refusals may still carry a JSON message worth showing.
        let message = serde_json::from_str::<StartPayload>(&body)
            .ok()
            .and_then(|payload| payload.message);
        Ok(StartResponse {
            status_code: Some(http_status.as_u16()),
            message,
        })
    }

    async fn cancel_job(&self) -> Result<(), ApiError> {
        self.acknowledge(self.post("cancel-export")?).await
    }

    async fn force_stop(&self) -> Result<(), ApiError> {
        self.acknowledge(self.post("force-stop")?).await
    }

    async fn download_full_log(&self) -> Result<Option<FullLog>, ApiError> {
        let payload = self
            .fetch_debug_log(&[("lines", self.settings.full_log_lines.to_string())])
            .await?;
        let lines = match payload.lines {
            Some(lines) if payload.success => lines,
            _ => return Ok(None),
        };
        let line_count = lines.len();
        let text = lines
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Some(FullLog { text, line_count }))
    }

    async fn check_rclone(&self) -> Result<RcloneStatus, ApiError> {
        let payload: RclonePayload = self.fetch_json(self.get("check-rclone", &[])?).await?;
        Ok(RcloneStatus {
            available: payload.available,
            path: payload.path,
        })
    }

    async fn activity_log(&self) -> Result<Vec<ActivityEntry>, ApiError> {
        let payload: BTreeMap<String, ActivityValue> =
            self.fetch_json(self.get("activity-log", &[])?).await?;
        Ok(payload
            .into_iter()
            .filter_map(|(key, value)| {
                let message = match value {
                    ActivityValue::Text(text) => text,
                    ActivityValue::Entry { message } => message?,
                };
                (!message.is_empty()).then_some(ActivityEntry { key, message })
            })
            .collect())
    }

    async fn save_deploy_status(&self, update: &DeployStatusUpdate) -> Result<(), ApiError> {
        let body = deploy_status_body(update);
        deploy_trace!("deploy-status {}", body);
        self.acknowledge(self.post("deploy-status")?.json(&body)).await
    }
}

/// Flat JSON object keyed by stage name; the server merges it into its record.
fn deploy_status_body(update: &DeployStatusUpdate) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    match update {
        DeployStatusUpdate::Reset => {
            body.insert("reset".to_string(), true.into());
        }
        DeployStatusUpdate::Stage { stage, state } => {
            body.insert(stage.as_str().to_string(), state.as_str().into());
        }
        DeployStatusUpdate::Final(pipeline) => {
            for (stage, state) in pipeline.iter() {
                body.insert(stage.as_str().to_string(), state.as_str().into());
            }
            body.insert("complete".to_string(), true.into());
        }
    }
    serde_json::Value::Object(body)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
