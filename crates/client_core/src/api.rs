//! HTTP access to the hub's REST surface.

use async_trait::async_trait;
use reqwest::{
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    multipart, Client, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{
        ConnectRequest, LoadConfigRequest, LoadConfigResponse, RemoteConfig, SaveAllRequest,
        SaveResponse, StatusResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ApiClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// A file the hub already has, referenced by base name.
    Named(String),
    /// A local file uploaded as multipart.
    Upload { filename: String, bytes: Vec<u8> },
}

impl LoadSource {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Upload { filename, .. } => filename,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveAllReply {
    Json(SaveResponse),
    File(Download),
}

#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn fetch_config(&self) -> Result<RemoteConfig, ApiClientError>;
    async fn discover(&self) -> Result<StatusResponse, ApiClientError>;
    async fn connect_classquiz(
        &self,
        request: &ConnectRequest,
    ) -> Result<StatusResponse, ApiClientError>;
    async fn save_all(&self, request: &SaveAllRequest) -> Result<SaveAllReply, ApiClientError>;
    async fn load_config(&self, source: &LoadSource) -> Result<LoadConfigResponse, ApiClientError>;
}

pub struct HttpBackendApi {
    http: Client,
    base: Url,
}

impl HttpBackendApi {
    pub fn new(server_url: &str) -> Result<Self, ApiClientError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, ApiClientError> {
        let base = Url::parse(server_url).map_err(|source| ApiClientError::InvalidUrl {
            url: server_url.to_string(),
            source,
        })?;
        Ok(Self { http, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiClientError> {
        self.base.join(path).map_err(|source| ApiClientError::InvalidUrl {
            url: format!("{}{path}", self.base),
            source,
        })
    }
}

async fn error_for_status(res: Response) -> Result<Response, ApiClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::from_body(status.as_u16(), &body).into())
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ApiClientError> {
    let res = error_for_status(res).await?;
    Ok(res.json::<T>().await?)
}

fn ensure_ok(status: &str, error: Option<&str>) -> Result<(), ApiClientError> {
    if status == "ok" {
        Ok(())
    } else {
        Err(ApiClientError::Rejected(
            error.unwrap_or("Unknown error").to_string(),
        ))
    }
}

/// `attachment; filename="x.csv"` -> `x.csv`
fn attachment_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|part| {
        part.strip_prefix("filename=")
            .map(|name| name.trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    })
}

#[async_trait]
impl BackendApi for HttpBackendApi {
    async fn fetch_config(&self) -> Result<RemoteConfig, ApiClientError> {
        let res = self.http.get(self.endpoint("/api/config")?).send().await?;
        read_json(res).await
    }

    async fn discover(&self) -> Result<StatusResponse, ApiClientError> {
        let res = self
            .http
            .post(self.endpoint("/api/discover")?)
            .send()
            .await?;
        let body: StatusResponse = read_json(res).await?;
        ensure_ok(&body.status, body.error.as_deref())?;
        Ok(body)
    }

    async fn connect_classquiz(
        &self,
        request: &ConnectRequest,
    ) -> Result<StatusResponse, ApiClientError> {
        let res = self
            .http
            .post(self.endpoint("/api/connect_classquiz")?)
            .json(request)
            .send()
            .await?;
        let body: StatusResponse = read_json(res).await?;
        ensure_ok(&body.status, body.error.as_deref())?;
        Ok(body)
    }

    async fn save_all(&self, request: &SaveAllRequest) -> Result<SaveAllReply, ApiClientError> {
        let res = self
            .http
            .post(self.endpoint("/api/save_all")?)
            .json(request)
            .send()
            .await?;
        let res = error_for_status(res).await?;

        let is_json = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if is_json {
            let body: SaveResponse = res.json().await?;
            ensure_ok(&body.status, body.error.as_deref())?;
            return Ok(SaveAllReply::Json(body));
        }

        let filename = res
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| format!("{}.csv", request.filename));
        let bytes = res.bytes().await?.to_vec();
        debug!(filename = %filename, size = bytes.len(), "save_all returned a file download");
        Ok(SaveAllReply::File(Download { filename, bytes }))
    }

    async fn load_config(&self, source: &LoadSource) -> Result<LoadConfigResponse, ApiClientError> {
        let endpoint = self.endpoint("/api/load_config")?;
        let builder = match source {
            LoadSource::Named(filename) => self.http.post(endpoint).json(&LoadConfigRequest {
                filename: filename.clone(),
            }),
            LoadSource::Upload { filename, bytes } => {
                let mime = mime_guess::from_path(filename).first_or_octet_stream();
                let part = multipart::Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(mime.as_ref())?;
                self.http
                    .post(endpoint)
                    .multipart(multipart::Form::new().part("file", part))
            }
        };
        let body: LoadConfigResponse = read_json(builder.send().await?).await?;
        ensure_ok(&body.status, body.error.as_deref())?;
        Ok(body)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
