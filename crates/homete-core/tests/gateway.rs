use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use homete_core::{
    ChatEntry, Config, GatewaySettings, GeminiClient, Gateway, TranscriptController,
    ERROR_MESSAGE, MAX_IMAGE_BYTES,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::{Cursor, Write};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEXT_PATH: &str = "/v1beta/models/text-model:generateContent";
const VISION_PATH: &str = "/v1beta/models/vision-model:generateContent";

fn client_for(server: &MockServer) -> GeminiClient {
    let settings = GatewaySettings::resolve(
        Config {
            api_key: Some("test-key".to_string()),
            text_model: Some("text-model".to_string()),
            vision_model: Some("vision-model".to_string()),
            base_url: Some(server.uri()),
        },
        Config::default(),
    )
    .unwrap();
    GeminiClient::new(settings)
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

fn png_file(width: u32, height: u32) -> (tempfile::NamedTempFile, Vec<u8>) {
    let mut state: u32 = 0x1234_5678;
    let img = RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [a, b, c, _] = state.to_le_bytes();
        Rgb([a, b, c])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&bytes).unwrap();
    (file, bytes)
}

async fn last_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    requests.last().unwrap().body_json::<Value>().unwrap()
}

#[tokio::test]
async fn test_text_reply_sends_wrapped_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(reply("とても素敵な挨拶ですね!"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let text = client.reply_to_text("hello").await.unwrap();

    assert_eq!(text, "とても素敵な挨拶ですね!");
    let body = last_body(&server).await;
    assert_eq!(
        body["contents"][0]["parts"][0]["text"],
        "次の内容を褒めてください。「hello」"
    );
}

#[tokio::test]
async fn test_image_reply_sends_inline_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VISION_PATH))
        .respond_with(reply("色使いが見事です"))
        .expect(1)
        .mount(&server)
        .await;

    let (file, original) = png_file(32, 32);
    let client = client_for(&server);
    let text = client.reply_to_image(file.path()).await.unwrap();

    assert_eq!(text, "色使いが見事です");
    let body = last_body(&server).await;
    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "次の画像を褒めてください。");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    let data = BASE64
        .decode(parts[1]["inlineData"]["data"].as_str().unwrap())
        .unwrap();
    assert_eq!(data, original);
}

#[tokio::test]
async fn test_large_image_is_compressed_before_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(VISION_PATH))
        .respond_with(reply("ok"))
        .mount(&server)
        .await;

    let (file, original) = png_file(800, 800);
    assert!(original.len() > MAX_IMAGE_BYTES);

    client_for(&server).reply_to_image(file.path()).await.unwrap();

    let body = last_body(&server).await;
    let data = BASE64
        .decode(body["contents"][0]["parts"][1]["inlineData"]["data"].as_str().unwrap())
        .unwrap();
    assert!(data.len() <= MAX_IMAGE_BYTES);
    assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Png);
}

#[tokio::test]
async fn test_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = client_for(&server).reply_to_text("hello").await.unwrap_err();
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    assert!(client_for(&server).reply_to_text("hello").await.is_err());
}

#[tokio::test]
async fn test_unreadable_image_fails_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(reply("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .reply_to_image(std::path::Path::new("/nonexistent/homete.png"))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_exchange_round_trip_through_controller() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TEXT_PATH))
        .respond_with(reply("天才的です"))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mut controller = TranscriptController::new();
    let mut input = "hello".to_string();
    let exchange = controller.submit_text(&mut input).unwrap();
    let outcome = exchange.request.send(&client).await;
    controller.resolve(exchange.ticket, outcome);

    assert!(!controller.is_pending());
    assert_eq!(
        controller.entries(),
        &[
            ChatEntry::UserText("hello".to_string()),
            ChatEntry::System("天才的です".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_failed_exchange_shows_fixed_error_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;
    let client = client_for(&server);

    let mut controller = TranscriptController::new();
    let exchange = controller.submit_image("/nonexistent/cat.jpg").unwrap();
    let outcome = exchange.request.send(&client).await;
    controller.resolve(exchange.ticket, outcome);

    let mut input = "hello".to_string();
    let exchange = controller.submit_text(&mut input).unwrap();
    let outcome = exchange.request.send(&client).await;
    controller.resolve(exchange.ticket, outcome);

    assert_eq!(controller.len(), 4);
    assert_eq!(controller.entries()[1].content(), Some(ERROR_MESSAGE));
    assert_eq!(controller.entries()[3].content(), Some(ERROR_MESSAGE));
    assert!(controller.entries().iter().all(|e| !e.is_loading()));
}
