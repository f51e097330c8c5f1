use mockito::ServerGuard;
use newsposter::fetcher::ContentFetcher;
use newsposter::images::VyroGenerator;
use newsposter::linkedin::LinkedInPublisher;
use newsposter::llm::remote::RemoteLlmProvider;
use newsposter::pipeline::{Pipeline, PipelineRequest, PipelineSettings};
use newsposter::scheduler::{ScheduledJob, Scheduler};
use newsposter::server::{build_rocket, AppState};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use std::path::Path;
use std::sync::Arc;

fn pipeline(server: &ServerGuard, output_dir: &Path) -> Arc<Pipeline> {
    let llm = Arc::new(RemoteLlmProvider::new(format!("{}/llm", server.url()), "k", "gpt-4o-mini"));
    let fetcher = ContentFetcher::new(5, 1, "newsposter-test").unwrap();
    let images = Arc::new(VyroGenerator::new(format!("{}/img", server.url()), "k"));
    let publisher = LinkedInPublisher::new(server.url(), "li-token", "abc123", 10).unwrap();
    let settings = PipelineSettings {
        section_url_template: format!("{}/section/{{category}}/", server.url()),
        condense_listing: true,
        sanitize_post: true,
        output_dir: output_dir.to_path_buf(),
    };
    Arc::new(Pipeline::new(llm, fetcher, images, publisher, settings))
}

fn daily_job() -> ScheduledJob {
    ScheduledJob {
        id: "daily_linkedin_post".to_string(),
        name: "Daily LinkedIn post".to_string(),
        at: common::parse_daily_time("15:00").unwrap(),
        request: PipelineRequest {
            category: "technology".to_string(),
            prompt: "AI".to_string(),
        },
    }
}

async fn client(server: &ServerGuard, output_dir: &Path) -> (Client, Arc<Scheduler>) {
    let pipeline = pipeline(server, output_dir);
    let scheduler = Arc::new(Scheduler::new(pipeline.clone(), vec![daily_job()]));
    let state = AppState {
        pipeline,
        scheduler: scheduler.clone(),
    };
    let client = Client::tracked(build_rocket(state, None)).await.unwrap();
    (client, scheduler)
}

#[rocket::async_test]
async fn health_is_ok() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (client, _) = client(&server, dir.path()).await;

    let response = client.get("/health").dispatch().await;
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().await.as_deref(), Some("OK"));
}

#[rocket::async_test]
async fn generate_post_failure_returns_detail_and_stage() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
        .mock("GET", "/section/sports/")
        .with_status(500)
        .create_async()
        .await;
    let llm = server
        .mock("POST", "/llm")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (client, _) = client(&server, dir.path()).await;

    let response = client
        .post("/generate-post/")
        .header(ContentType::JSON)
        .body(r#"{"category": "sports", "prompt": "cricket"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::InternalServerError);
    let body: serde_json::Value = response.into_json().await.unwrap();
    assert_eq!(body["stage"], "fetch_listing");
    assert!(body["detail"].as_str().unwrap().contains("500"));
    llm.assert_async().await;
}

#[rocket::async_test]
async fn generate_post_rejects_malformed_body() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (client, _) = client(&server, dir.path()).await;

    let response = client
        .post("/generate-post/")
        .header(ContentType::JSON)
        .body(r#"{"category": "sports"}"#)
        .dispatch()
        .await;

    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[rocket::async_test]
async fn jobs_lists_configured_job_with_next_run_time_while_running() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let (client, scheduler) = client(&server, dir.path()).await;

    let body: serde_json::Value = client.get("/jobs/").dispatch().await.into_json().await.unwrap();
    let job = &body["active_jobs"][0];
    assert_eq!(job["id"], "daily_linkedin_post");
    assert_eq!(job["name"], "Daily LinkedIn post");
    assert_eq!(job["trigger"], "cron[hour='15', minute='0']");
    assert!(job["next_run_time"].is_null());

    scheduler.start().await;
    let body: serde_json::Value = client.get("/jobs/").dispatch().await.into_json().await.unwrap();
    assert_eq!(body["active_jobs"].as_array().unwrap().len(), 1);
    assert!(body["active_jobs"][0]["next_run_time"].is_string());

    scheduler.shutdown().await;
    assert!(!scheduler.is_running());
}
