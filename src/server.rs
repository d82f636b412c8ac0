//! HTTP front end for archive jobs.
//!
//! `POST /upload` takes a multipart `file` field holding a `.zip`, runs an
//! [`ArchiveJob`] on it and answers with the counters and a download link.
//! `GET /download/:job_id` streams the produced archive back.

use crate::{
    config,
    error::{Error, Result},
    job::{self, ArchiveJob, JobSettings},
    oracle::OracleSettings,
    pipeline::JobResult,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, Path as UrlPath, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

/// Largest accepted request body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Name offered to the client for every downloaded artifact.
pub const DOWNLOAD_FILE_NAME: &str = "processed_code.zip";

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Code Cleaner</title></head>
<body>
<h1>Code Cleaner</h1>
<p>Upload a ZIP archive. Comments and log statements are removed from every recognised source file.</p>
<form id="upload" enctype="multipart/form-data">
  <input type="file" name="file" accept=".zip">
  <button type="submit">Clean</button>
</form>
<pre id="result"></pre>
<script>
document.getElementById("upload").addEventListener("submit", async (event) => {
  event.preventDefault();
  const out = document.getElementById("result");
  const response = await fetch("/upload", { method: "POST", body: new FormData(event.target) });
  const body = await response.json();
  if (!response.ok) { out.textContent = body.error; return; }
  out.innerHTML = `Processed ${body.processed_files}, copied ${body.copied_files}, ` +
    `errored ${body.errored_files} of ${body.total_files} files. ` +
    `<a href="${body.download_url}">Download</a>`;
});
</script>
</body>
</html>
"#;

/// Settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub addr: SocketAddr,

    /// Where uploads are stored while their job runs
    pub upload_dir: PathBuf,

    /// Where artifacts are kept for download
    pub processed_dir: PathBuf,

    /// Parent of per-job scratch workspaces
    pub work_root: PathBuf,

    /// Request body cap in bytes
    pub max_upload_bytes: usize,

    /// Exclusion substrings
    pub exclude_patterns: Vec<String>,

    /// Ollama oracle, if one is configured
    pub oracle: Option<OracleSettings>,

    /// Artifacts older than this are purged at startup
    pub artifact_ttl: Option<Duration>,

    /// Remove an artifact once it has been served
    pub delete_after_download: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            work_root: std::env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            exclude_patterns: config::default_exclude_patterns(),
            oracle: None,
            artifact_ttl: None,
            delete_after_download: false,
        }
    }
}

impl ServerConfig {
    fn job_settings(&self) -> JobSettings {
        JobSettings {
            work_root: self.work_root.clone(),
            processed_dir: self.processed_dir.clone(),
            exclude_patterns: self.exclude_patterns.clone(),
            oracle: self.oracle.clone(),
        }
    }
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<ServerConfig>,
}

impl AppState {
    /// Wraps `config` for use by the router.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/download/:job_id", get(download))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

/// Runs the service until the listener fails.
///
/// # Errors
///
/// Returns an error if the storage directories cannot be prepared or the
/// address cannot be bound.
pub async fn serve(config: ServerConfig) -> Result<()> {
    for dir in [&config.upload_dir, &config.processed_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;
    }

    if let Some(ttl) = config.artifact_ttl {
        job::purge_stale_artifacts(&config.processed_dir, ttl)?;
    }

    let addr = config.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::server(format!("cannot bind {addr}: {e}")))?;

    info!("Listening on http://{}", addr);
    info!("Uploads: {}", config.upload_dir.display());
    info!("Artifacts: {}", config.processed_dir.display());
    if let Some(oracle) = &config.oracle {
        info!("Dead-code oracle: {} ({})", oracle.base_url, oracle.model);
    }

    axum::serve(listener, router(AppState::new(config)))
        .await
        .map_err(Error::server)
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    job_id: Uuid,
    total_files: usize,
    processed_files: usize,
    copied_files: usize,
    skipped_files: usize,
    errored_files: usize,
    download_url: String,
}

impl UploadResponse {
    fn new(job_id: Uuid, result: &JobResult) -> Self {
        Self {
            success: true,
            job_id,
            total_files: result.total,
            processed_files: result.processed,
            copied_files: result.copied,
            skipped_files: result.skipped,
            errored_files: result.errored,
            download_url: format!("/download/{job_id}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error answered as `{"error": "..."}`.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Processed file not found")
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        if e.is_invalid_upload() {
            Self::new(StatusCode::BAD_REQUEST, e.to_string())
        } else {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::new(e.status(), e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (file_name, data) = upload.ok_or_else(|| Error::invalid_upload("No file part"))?;
    validate_file_name(&file_name)?;

    info!("Received upload '{}' ({} bytes)", file_name, data.len());

    let config = Arc::clone(&state.config);
    let (job_id, result) =
        tokio::task::spawn_blocking(move || run_upload(&config, &data))
            .await
            .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    info!(
        "Job {} finished: {} processed, {} copied, {} errored",
        job_id, result.processed, result.copied, result.errored
    );

    Ok(Json(UploadResponse::new(job_id, &result)))
}

fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() {
        return Err(Error::invalid_upload("No selected file"));
    }

    let is_zip = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(Error::invalid_upload("Only ZIP files are supported"));
    }

    Ok(())
}

/// Stores the upload, runs the job and removes the upload again.
fn run_upload(config: &ServerConfig, data: &[u8]) -> Result<(Uuid, JobResult)> {
    let mut job = ArchiveJob::new(&config.job_settings())?;
    let job_id = job.id();

    fs::create_dir_all(&config.upload_dir).map_err(|e| Error::io(&config.upload_dir, e))?;
    let stored = config.upload_dir.join(format!("{job_id}.zip"));
    fs::write(&stored, data).map_err(|e| Error::io(&stored, e))?;

    let outcome = job.run(&stored);

    if let Err(e) = fs::remove_file(&stored) {
        warn!("Could not remove upload {}: {}", stored.display(), e);
    }

    outcome.map(|result| (job_id, result))
}

async fn download(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> std::result::Result<Response, ApiError> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| ApiError::not_found())?;
    let path = job::artifact_path(&state.config.processed_dir, job_id);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::not_found()),
        Err(e) => return Err(Error::io(&path, e).into()),
    };

    info!("Serving artifact for job {}", job_id);

    if state.config.delete_after_download {
        if let Err(e) = job::remove_artifact(&state.config.processed_dir, job_id) {
            warn!("Could not remove served artifact of job {}: {}", job_id, e);
        }
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
