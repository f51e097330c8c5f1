use mockito::ServerGuard;
use newsposter::fetcher::ContentFetcher;
use newsposter::images::VyroGenerator;
use newsposter::linkedin::LinkedInPublisher;
use newsposter::llm::remote::RemoteLlmProvider;
use newsposter::pipeline::{Pipeline, PipelineRequest, PipelineSettings};
use newsposter::scheduler::{ScheduledJob, Scheduler};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

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

fn job() -> ScheduledJob {
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

#[tokio::test]
async fn failed_scheduled_runs_are_dropped_and_job_keeps_firing() {
    let mut server = mockito::Server::new_async().await;
    let listing = server
        .mock("GET", "/section/technology/")
        .with_status(500)
        .expect_at_least(2)
        .create_async()
        .await;
    let llm = server
        .mock("POST", "/llm")
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(pipeline(&server, dir.path()), vec![job()])
        .with_next_fire(Arc::new(|_| Duration::from_millis(20)));
    scheduler.start().await;
    assert!(scheduler.is_running());

    // Wait for at least two firings
    let fired = tokio::time::timeout(Duration::from_secs(5), async {
        while !listing.matched_async().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(fired.is_ok(), "job did not fire twice");

    // Well under the 5s per-task grace period
    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .expect("shutdown stopped the job task");
    assert!(!scheduler.is_running());

    listing.assert_async().await;
    llm.assert_async().await;
}

#[tokio::test]
async fn shutdown_wakes_a_sleeping_job() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(pipeline(&server, dir.path()), vec![job()])
        .with_next_fire(Arc::new(|_| Duration::from_secs(3600)));

    scheduler.start().await;
    // Let the job task reach its sleep
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .expect("shutdown stopped the job task");
    assert!(!scheduler.is_running());
    assert!(scheduler.jobs()[0].next_run_time.is_none());
}

#[tokio::test]
async fn shutdown_right_after_start_does_not_hang() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let scheduler = Scheduler::new(pipeline(&server, dir.path()), vec![job()]);

    scheduler.start().await;
    tokio::time::timeout(Duration::from_secs(2), scheduler.shutdown())
        .await
        .expect("shutdown stopped the job task");
}
