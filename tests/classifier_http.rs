//! Classifier client against a minimal in-process HTTP server.
//!
//! The client must fail soft: whatever the service does — errors,
//! garbage, nothing at all — the verdict defaults to probability 0 so
//! messages are left in place.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use scamwatch::classifier::Classifier;

/// Serve exactly one HTTP request with a canned status and body.
fn serve_one(status: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream);

        // Read headers, then drain the body per Content-Length.
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).is_err() || line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
        let mut request_body = vec![0u8; content_length];
        let _ = reader.read_exact(&mut request_body);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let mut stream = reader.into_inner();
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
    });

    format!("http://127.0.0.1:{}/classify", port)
}

#[tokio::test]
async fn returns_probability_and_reason_from_service() {
    let url = serve_one(
        "200 OK",
        r#"{"scam_probability": 92, "reason": "urgent wire transfer request"}"#,
    );
    let classifier = Classifier::new(url);

    let verdict = classifier
        .classify("scammer@example.com", "URGENT", "send money now")
        .await;

    assert_eq!(verdict.scam_probability, 92);
    assert_eq!(
        verdict.reason.as_deref(),
        Some("urgent wire transfer request")
    );
}

#[tokio::test]
async fn reason_is_optional() {
    let url = serve_one("200 OK", r#"{"scam_probability": 15}"#);
    let classifier = Classifier::new(url);

    let verdict = classifier.classify("a@b.c", "hello", "see you tomorrow").await;

    assert_eq!(verdict.scam_probability, 15);
    assert!(verdict.reason.is_none());
}

#[tokio::test]
async fn server_error_fails_soft_to_zero() {
    let url = serve_one("500 Internal Server Error", "boom");
    let classifier = Classifier::new(url);

    let verdict = classifier.classify("a@b.c", "subject", "body").await;

    assert_eq!(verdict.scam_probability, 0);
    assert!(verdict
        .reason
        .as_deref()
        .unwrap_or_default()
        .contains("classifier unavailable"));
}

#[tokio::test]
async fn malformed_body_fails_soft_to_zero() {
    let url = serve_one("200 OK", "not json at all");
    let classifier = Classifier::new(url);

    let verdict = classifier.classify("a@b.c", "subject", "body").await;

    assert_eq!(verdict.scam_probability, 0);
    assert!(verdict.reason.is_some());
}

#[tokio::test]
async fn unreachable_service_fails_soft_to_zero() {
    // Bind then drop to get a port nothing is listening on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let classifier = Classifier::new(format!("http://127.0.0.1:{}/classify", port));

    let verdict = classifier.classify("a@b.c", "subject", "body").await;

    assert_eq!(verdict.scam_probability, 0);
    assert!(verdict.reason.is_some());
}
