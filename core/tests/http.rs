use std::sync::Arc;

use ortho_core::{
    CheckCycle, CheckError, Checker, CycleSignal, CycleState, HttpChecker, LineBuffer, Settings,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one canned response and hand back the request line received.
async fn serve_once(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });
    (format!("http://{addr}/check"), handle)
}

#[tokio::test]
async fn sends_text_as_query_and_decodes_alerts() {
    let (endpoint, server) = serve_once(
        "200 OK",
        "application/json",
        r#"{"alerts":[{"begin":2,"text":"has","replacements":["have"],"explanation":"verb"}]}"#,
    )
    .await;
    let checker = HttpChecker::new(endpoint);

    let issues = checker.check("I has & co".to_string()).await.unwrap();

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].begin, 2);
    assert_eq!(issues[0].replacements, vec!["have".to_string()]);
    assert_eq!(
        server.await.unwrap(),
        "GET /check?text=I+has+%26+co HTTP/1.1"
    );
}

#[tokio::test]
async fn error_status_is_reported_with_its_code() {
    let (endpoint, _server) = serve_once("500 Internal Server Error", "text/plain", "boom").await;
    let checker = HttpChecker::new(endpoint);

    let err = checker.check("text".to_string()).await.unwrap_err();
    assert!(matches!(err, CheckError::Status(500)));
}

#[tokio::test]
async fn error_status_fails_the_cycle() {
    let (endpoint, _server) = serve_once("500 Internal Server Error", "text/plain", "boom").await;
    let mut cycle = CheckCycle::new(Arc::new(HttpChecker::new(endpoint)), &Settings::default());
    let mut buffer = LineBuffer::new("I has a cat");

    assert_eq!(
        cycle.check_now(&mut buffer).await,
        CycleSignal::ServiceUnreachable
    );
    assert_eq!(cycle.state(), CycleState::Failed);
}

#[tokio::test]
async fn html_body_fails_the_cycle() {
    let (endpoint, _server) = serve_once("200 OK", "text/html", "<html>down</html>").await;
    let mut cycle = CheckCycle::new(Arc::new(HttpChecker::new(endpoint)), &Settings::default());
    let mut buffer = LineBuffer::new("I has a cat");

    assert_eq!(
        cycle.check_now(&mut buffer).await,
        CycleSignal::ServiceUnreachable
    );
    assert!(cycle.issues().is_empty());
}

#[tokio::test]
async fn missing_alerts_means_no_issues() {
    let (endpoint, _server) = serve_once("200 OK", "application/json", "{}").await;
    let mut cycle = CheckCycle::new(Arc::new(HttpChecker::new(endpoint)), &Settings::default());
    let mut buffer = LineBuffer::new("Fine text.");

    assert_eq!(cycle.check_now(&mut buffer).await, CycleSignal::NoIssues);
}
