use anyhow::{anyhow, Result};
use common::ServerConfig;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::Serialize;
use std::sync::Arc;

use crate::linkedin::PublishReceipt;
use crate::pipeline::{Pipeline, PipelineRequest};
use crate::scheduler::{JobInfo, Scheduler};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub scheduler: Arc<Scheduler>,
}

/// Response of `POST /generate-post/`.
#[derive(Debug, Serialize)]
pub struct GeneratePostResponse {
    /// The published post text
    pub message: String,
    pub linkedin_response: PublishReceipt,
    pub summary: String,
    /// Local path of the generated image
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub stage: &'static str,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub active_jobs: Vec<JobInfo>,
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Run the whole pipeline for one category/prompt and publish the result.
#[post("/generate-post", data = "<body>")]
async fn generate_post(
    state: &State<AppState>,
    body: Json<PipelineRequest>,
) -> Result<Json<GeneratePostResponse>, Custom<Json<ErrorBody>>> {
    let request = body.into_inner();
    tracing::info!(category = %request.category, "server: generate-post requested");

    match state.pipeline.run(&request).await {
        Ok(outcome) => Ok(Json(GeneratePostResponse {
            message: outcome.post,
            linkedin_response: outcome.receipt,
            summary: outcome.summary,
            image_url: outcome.image_path.display().to_string(),
        })),
        Err(e) => {
            tracing::error!(stage = e.stage(), error = %e, "server: generate-post failed");
            Err(Custom(
                Status::InternalServerError,
                Json(ErrorBody {
                    detail: e.to_string(),
                    stage: e.stage(),
                }),
            ))
        }
    }
}

#[get("/jobs")]
async fn list_jobs(state: &State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        active_jobs: state.scheduler.jobs(),
    })
}

/// Assemble the Rocket instance; `server.bind` and `server.port` override Rocket's defaults.
pub fn build_rocket(state: AppState, server: Option<&ServerConfig>) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }

    rocket::custom(fig)
        .manage(state)
        .mount("/", routes![health, generate_post, list_jobs])
}

/// Launch the HTTP server and block until Rocket shuts down (SIGINT/SIGTERM etc.)
pub async fn launch_rocket(state: AppState, server: Option<&ServerConfig>) -> Result<()> {
    let rocket = build_rocket(state, server);

    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
