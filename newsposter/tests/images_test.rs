use mockito::Matcher;
use newsposter::images::{
    create_image_generator, HuggingFaceGenerator, ImageGenerationError, ImageGenerator,
    StabilityGenerator, VyroGenerator,
};
use serde_json::json;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

fn files_in(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn huggingface_writes_image_on_success() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/models/sdxl")
        .match_header("authorization", "Bearer hf-token")
        .match_body(Matcher::PartialJson(json!({
            "inputs": "An illustration related to rust.",
            "options": {"wait_for_model": true}
        })))
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(PNG_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested").join("out.png");
    let generator = HuggingFaceGenerator::new(format!("{}/models/sdxl", server.url()), "hf-token");

    let path = generator
        .generate("An illustration related to rust.", &output)
        .await
        .unwrap();

    assert_eq!(path, output);
    assert_eq!(std::fs::read(&path).unwrap(), PNG_BYTES);
    assert_eq!(files_in(&dir.path().join("nested")), 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn huggingface_error_keeps_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/models/sdxl")
        .with_status(503)
        .with_body(r#"{"error":"Model is currently loading"}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.png");
    let generator = HuggingFaceGenerator::new(format!("{}/models/sdxl", server.url()), "hf-token");

    match generator.generate("prompt", &output).await {
        Err(ImageGenerationError::Status { provider, status, body }) => {
            assert_eq!(provider, "huggingface");
            assert_eq!(status, 503);
            assert_eq!(body, r#"{"error":"Model is currently loading"}"#);
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(!output.exists());
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn vyro_sends_multipart_form() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/image/generations")
        .match_header("authorization", "Bearer vyro-key")
        .match_header("content-type", Matcher::Regex("^multipart/form-data".to_string()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="prompt"\r\n\r\na lighthouse at dusk"#.to_string()),
            Matcher::Regex(r#"name="style"\r\n\r\nrealistic"#.to_string()),
            Matcher::Regex(r#"name="aspect_ratio"\r\n\r\n16:9"#.to_string()),
        ]))
        .with_status(200)
        .with_body(PNG_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("vyro.png");
    let generator = VyroGenerator::new(format!("{}/v2/image/generations", server.url()), "vyro-key")
        .with_style("realistic", "16:9");

    generator.generate("a lighthouse at dusk", &output).await.unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), PNG_BYTES);
    mock.assert_async().await;
}

#[tokio::test]
async fn vyro_error_writes_nothing() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v2/image/generations")
        .with_status(402)
        .with_body("insufficient credits")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("vyro.png");
    let generator = VyroGenerator::new(format!("{}/v2/image/generations", server.url()), "vyro-key");

    let err = generator.generate("prompt", &output).await.unwrap_err();
    assert!(matches!(
        err,
        ImageGenerationError::Status { status: 402, ref body, .. } if body == "insufficient credits"
    ));
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn stability_asks_for_raw_image() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v2beta/stable-image/generate/ultra")
        .match_header("authorization", "Bearer sk-test")
        .match_header("accept", "image/*")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="prompt"\r\n\r\nneural networks"#.to_string()),
            Matcher::Regex(r#"name="output_format"\r\n\r\npng"#.to_string()),
        ]))
        .with_status(200)
        .with_body(PNG_BYTES)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let generator = StabilityGenerator::new(
        format!("{}/v2beta/stable-image/generate/ultra", server.url()),
        "sk-test",
    )
    .with_output_format("png");
    assert_eq!(generator.extension(), "png");

    let output = dir.path().join(format!("run.{}", generator.extension()));
    generator.generate("neural networks", &output).await.unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), PNG_BYTES);
    mock.assert_async().await;
}

#[tokio::test]
async fn stability_empty_body_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/ultra")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.webp");
    let generator = StabilityGenerator::new(format!("{}/ultra", server.url()), "sk-test");

    let err = generator.generate("prompt", &output).await.unwrap_err();
    assert!(matches!(err, ImageGenerationError::EmptyImage { provider: "stability" }));
    assert!(!output.exists());
}

#[test]
fn factory_picks_provider_from_config_or_override() {
    std::env::set_var("NEWSPOSTER_TEST_VYRO_KEY", "k");
    std::env::set_var("NEWSPOSTER_TEST_STABILITY_KEY", "k");
    let config: common::ImageConfig = toml::from_str(
        r#"
        provider = "stability"
        [stability]
        api_key_env = "NEWSPOSTER_TEST_STABILITY_KEY"
        [vyro]
        api_key_env = "NEWSPOSTER_TEST_VYRO_KEY"
        "#,
    )
    .unwrap();

    let default = create_image_generator(&config, None).unwrap();
    assert_eq!(default.name(), "stability");
    assert_eq!(default.extension(), "webp");

    let vyro = create_image_generator(&config, Some("vyro")).unwrap();
    assert_eq!(vyro.name(), "vyro");

    // no [huggingface] section
    assert!(create_image_generator(&config, Some("huggingface")).is_err());
    assert!(create_image_generator(&config, Some("dalle")).is_err());
}

#[tokio::test]
async fn error_body_is_kept_byte_for_byte() {
    let raw: &[u8] = b"{\"errors\":[\"prompt rejected: caf\xc3\xa9 \xff\"]}";
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/ultra")
        .with_status(400)
        .with_body(raw)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("run.webp");
    let generator = StabilityGenerator::new(format!("{}/ultra", server.url()), "sk-test");

    match generator.generate("prompt", &output).await {
        Err(ImageGenerationError::Status { status, body, .. }) => {
            assert_eq!(status, 400);
            assert_eq!(body, String::from_utf8_lossy(raw));
            assert!(body.contains("café"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert!(!output.exists());
}
