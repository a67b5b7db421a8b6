use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{get, options, post, routes, Build, Request, Response, Rocket, State};
use serde::Serialize;

use common::Config;

use crate::pipeline::{ContentPipeline, ContentRequest, ContentResponse, Integrations};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub config: Arc<Config>,
    pub pipeline: Arc<ContentPipeline>,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    listen: String,
    integrations: Integrations,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Status endpoint returning uptime, listen address and which integrations are live.
#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let server = state.config.server.as_ref();
    let bind = server.and_then(|s| s.bind.as_deref()).unwrap_or(DEFAULT_BIND);
    let port = server.and_then(|s| s.port).unwrap_or(DEFAULT_PORT);
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        listen: format!("{}:{}", bind, port),
        integrations: state.pipeline.integrations(),
    })
}

/// Generate the full content bundle for a prompt.
#[post("/generate", format = "json", data = "<request>")]
async fn generate(state: &State<AppState>, request: Json<ContentRequest>) -> Result<Json<ContentResponse>, Status> {
    let request = request.into_inner();
    if request.prompt.trim().is_empty() {
        tracing::warn!("rejecting generate request with empty prompt");
        return Err(Status::BadRequest);
    }

    tracing::info!(platform = %request.platform, tone = %request.tone, "generate request");
    let response = state.pipeline.generate(&request).await;
    Ok(Json(response))
}

/// Answer CORS preflight requests for any path.
#[options("/<_..>")]
async fn preflight() -> Status {
    Status::NoContent
}

/// Adds CORS headers for allowed browser origins.
pub struct Cors {
    allowed_origins: Vec<String>,
}

impl Cors {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = req.headers().get_one("Origin") else {
            return;
        };
        if !self.allows(origin) {
            return;
        }
        res.set_header(Header::new("Access-Control-Allow-Origin", origin.to_string()));
        res.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
        res.set_header(Header::new("Vary", "Origin"));
    }
}

/// Build the Rocket instance without launching it (used by tests too).
pub fn build_rocket(config: Arc<Config>, pipeline: Arc<ContentPipeline>) -> Rocket<Build> {
    let server = config.server.clone().unwrap_or_default();

    let fig = rocket::Config::figment()
        .merge(("address", server.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string())))
        .merge(("port", server.port.unwrap_or(DEFAULT_PORT)));

    let origins = server
        .allowed_origins
        .clone()
        .unwrap_or_else(|| vec![DEFAULT_ALLOWED_ORIGIN.to_string()]);

    let state = AppState {
        started_at: Utc::now(),
        config,
        pipeline,
    };

    rocket::custom(fig)
        .manage(state)
        .attach(Cors::new(origins))
        .mount("/", routes![health, status, generate, preflight])
}

pub async fn launch_rocket(config: Arc<Config>, pipeline: Arc<ContentPipeline>) -> Result<()> {
    let rocket = build_rocket(config, pipeline);

    // Launch Rocket - this will run until shutdown (SIGINT/SIGTERM etc.)
    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
