use services::{GeminiClient, GenerationConfig, GenerationError, TextGenerator};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serves one canned HTTP response and hands back the raw request it saw.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8(raw).unwrap()
    });

    (base_url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

fn client(base_url: String) -> GeminiClient {
    let mut config = GenerationConfig::new("test-key");
    config.base_url = base_url;
    config.model = "test-model".into();
    GeminiClient::new(Some(config))
}

#[tokio::test]
async fn posts_prompt_and_reads_first_candidate() {
    let (base_url, server) = serve_once(
        "200 OK",
        r#"{"candidates":[{"content":{"parts":[{"text":"[{\"question\":\"Q\",\"answer\":\"A\"}]"}]}}]}"#,
    )
    .await;

    let reply = client(base_url).complete("make flashcards").await.unwrap();
    assert_eq!(reply, r#"[{"question":"Q","answer":"A"}]"#);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /models/test-model:generateContent?key=test-key "));
    assert!(request.contains(r#""contents":[{"parts":[{"text":"make flashcards"}]}]"#));
    assert!(request.contains(r#""responseMimeType":"application/json""#));
}

#[tokio::test]
async fn non_success_status_is_upstream_failure() {
    let (base_url, server) = serve_once("429 Too Many Requests", r#"{"error":"quota"}"#).await;

    let err = client(base_url).complete("anything").await.unwrap_err();
    assert!(matches!(
        err,
        GenerationError::UpstreamCallFailed(status) if status.as_u16() == 429
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn reply_without_candidates_is_empty() {
    let (base_url, server) = serve_once("200 OK", r#"{"candidates":[]}"#).await;

    let err = client(base_url).complete("anything").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
    server.await.unwrap();
}
