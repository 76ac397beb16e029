//! Harvest loop behavior against a mocked transport
//!
//! Pages are distinguished by their exact query string (limit/before/after),
//! so each mock serves exactly one step of the backward walk.

use mockito::Matcher;
use serde_json::{json, Value};
use social_capture::discord::{
    DateWindow, DiscordClient, HarvestError, HarvestRequest, Harvester, RateGovernor,
    TerminationReason,
};
use social_capture::snowflake::{self, Snowflake};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CHANNEL: &str = "123456789";

fn test_client(base_url: &str) -> DiscordClient {
    DiscordClient::with_base_url("test-token", Duration::from_secs(2), base_url)
        .expect("client")
        .with_governor(RateGovernor::new(Duration::ZERO))
}

fn test_harvester(base_url: &str) -> Harvester {
    Harvester::new(test_client(base_url)).with_page_delay(Duration::ZERO)
}

fn message_json(id: Snowflake) -> Value {
    json!({
        "id": id.to_string(),
        "timestamp": id.timestamp().to_rfc3339(),
        "content": format!("message {id}"),
        "author": {"id": "42", "username": "alice", "discriminator": "0", "bot": false},
        "attachments": [],
        "embeds": []
    })
}

fn page_body(ids: &[Snowflake]) -> String {
    let records: Vec<Value> = ids.iter().copied().map(message_json).collect();
    serde_json::to_string(&records).expect("page body")
}

/// `count` identifiers descending one minute apart, newest at `newest_ms`.
fn descending_ids(newest_ms: i64, count: usize) -> Vec<Snowflake> {
    (0..count)
        .map(|i| Snowflake::from_unix_ms(newest_ms - i as i64 * 60_000))
        .collect()
}

fn assert_strictly_ascending(ids: &[Snowflake]) {
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "result not strictly ascending: {pair:?}");
    }
}

const NOW_MS: i64 = 1_686_830_400_000; // 2023-06-15T12:00:00Z

#[tokio::test]
async fn test_empty_channel_ends_history() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest");

    mock.assert_async().await;
    assert!(outcome.is_empty());
    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
}

#[tokio::test]
async fn test_budget_stops_after_one_full_page() {
    let mut server = mockito::Server::new_async().await;
    let ids = descending_ids(NOW_MS, 50);
    let mock = server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(page_body(&ids))
        .expect(1)
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let request = HarvestRequest::new(CHANNEL).with_budget(50);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    mock.assert_async().await;
    assert_eq!(outcome.len(), 50);
    assert_eq!(outcome.reason, TerminationReason::BudgetReached);
}

#[tokio::test]
async fn test_short_page_signals_end_of_history() {
    let mut server = mockito::Server::new_async().await;
    let ids = descending_ids(NOW_MS, 30);
    server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(page_body(&ids))
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest");

    assert_eq!(outcome.len(), 30);
    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
    let ids: Vec<Snowflake> = outcome.messages.iter().map(|m| m.id).collect();
    assert_strictly_ascending(&ids);
}

#[tokio::test]
async fn test_budget_sizes_the_final_page() {
    let mut server = mockito::Server::new_async().await;
    let page1 = descending_ids(NOW_MS, 50);
    let page2 = descending_ids(NOW_MS - 50 * 60_000, 50);
    let page3 = descending_ids(NOW_MS - 100 * 60_000, 20);
    let oldest1 = *page1.last().unwrap();
    let oldest2 = *page2.last().unwrap();

    let path = format!("/channels/{CHANNEL}/messages");
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(page_body(&page1))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=50&before={oldest1}")))
        .with_status(200)
        .with_body(page_body(&page2))
        .create_async()
        .await;
    // remaining budget shrinks the last request to 20
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=20&before={oldest2}")))
        .with_status(200)
        .with_body(page_body(&page3))
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let request = HarvestRequest::new(CHANNEL).with_budget(120);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    assert_eq!(outcome.len(), 120);
    assert_eq!(outcome.reason, TerminationReason::BudgetReached);
    let ids: Vec<Snowflake> = outcome.messages.iter().map(|m| m.id).collect();
    assert_strictly_ascending(&ids);
}

#[tokio::test]
async fn test_lower_bound_truncates_the_crossing_page() {
    let mut server = mockito::Server::new_async().await;
    let window = DateWindow::parse(Some("2023-06-12"), None).expect("window");
    let lower = snowflake::date_lower_bound(window.after.unwrap());
    let lower_ms = lower.timestamp_ms();

    // first page is anchored by the lower bound and sits entirely above it
    let page1: Vec<Snowflake> = descending_ids(lower_ms + 20 * 60_000, 10);
    // second page crosses the bound: four eligible, then six below it
    let mut page2: Vec<Snowflake> = descending_ids(lower_ms + 10 * 60_000, 4);
    page2.extend((1..=6).map(|i| Snowflake::from_raw(lower.raw() - i * 1000)));
    let oldest1 = *page1.last().unwrap();

    let path = format!("/channels/{CHANNEL}/messages");
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=10&after={lower}")))
        .with_status(200)
        .with_body(page_body(&page1))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=10&before={oldest1}")))
        .with_status(200)
        .with_body(page_body(&page2))
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let request = HarvestRequest::new(CHANNEL)
        .with_batch_size(10)
        .with_window(window);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    assert_eq!(outcome.reason, TerminationReason::LowerBoundReached);
    assert_eq!(outcome.len(), 14);
    assert!(outcome.messages.iter().all(|m| m.id >= lower));
    let ids: Vec<Snowflake> = outcome.messages.iter().map(|m| m.id).collect();
    assert_strictly_ascending(&ids);
}

#[tokio::test]
async fn test_upper_bound_skips_without_terminating() {
    let mut server = mockito::Server::new_async().await;
    let window = DateWindow::parse(None, Some("2023-06-10")).expect("window");
    let upper = snowflake::date_upper_bound(window.before.unwrap());
    let upper_ms = upper.timestamp_ms();

    // everything on the first page is newer than the window
    let page1 = descending_ids(upper_ms + 50 * 60_000, 50);
    // the second page is inside it, and short
    let page2 = descending_ids(upper_ms - 60_000, 20);
    let oldest1 = *page1.last().unwrap();

    let path = format!("/channels/{CHANNEL}/messages");
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(page_body(&page1))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=50&before={oldest1}")))
        .with_status(200)
        .with_body(page_body(&page2))
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let request = HarvestRequest::new(CHANNEL).with_window(window);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
    assert_eq!(outcome.len(), 20);
    assert!(outcome.messages.iter().all(|m| m.id <= upper));
}

#[tokio::test]
async fn test_access_denied_on_first_page_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"message": "Missing Access", "code": 50001}"#)
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let result = harvester.harvest(&HarvestRequest::new(CHANNEL)).await;

    assert!(matches!(
        result,
        Err(HarvestError::AccessDenied { channel_id }) if channel_id == CHANNEL
    ));
}

#[tokio::test]
async fn test_failure_after_two_pages_returns_partial_result() {
    let mut server = mockito::Server::new_async().await;
    let page1 = descending_ids(NOW_MS, 50);
    let page2 = descending_ids(NOW_MS - 50 * 60_000, 50);
    let oldest1 = *page1.last().unwrap();
    let oldest2 = *page2.last().unwrap();

    let path = format!("/channels/{CHANNEL}/messages");
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(page_body(&page1))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=50&before={oldest1}")))
        .with_status(200)
        .with_body(page_body(&page2))
        .create_async()
        .await;
    // page 3 turns fatal; the harvest keeps pages 1-2
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=50&before={oldest2}")))
        .with_status(403)
        .with_body(r#"{"message": "Missing Access", "code": 50001}"#)
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest degrades to a partial result");

    assert_eq!(outcome.reason, TerminationReason::Aborted);
    assert_eq!(outcome.len(), 100);
}

#[tokio::test]
async fn test_duplicate_ids_across_pages_are_deduplicated() {
    let mut server = mockito::Server::new_async().await;
    let page1 = descending_ids(NOW_MS, 3);
    let oldest1 = *page1.last().unwrap();
    // overlapping page: repeats the cursor message, then two older ones
    let page2 = vec![
        oldest1,
        Snowflake::from_unix_ms(NOW_MS - 10 * 60_000),
        Snowflake::from_unix_ms(NOW_MS - 11 * 60_000),
    ];
    let oldest2 = *page2.last().unwrap();

    let path = format!("/channels/{CHANNEL}/messages");
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact("limit=3".to_string()))
        .with_status(200)
        .with_body(page_body(&page1))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=3&before={oldest1}")))
        .with_status(200)
        .with_body(page_body(&page2))
        .create_async()
        .await;
    server
        .mock("GET", path.as_str())
        .match_query(Matcher::Exact(format!("limit=3&before={oldest2}")))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let request = HarvestRequest::new(CHANNEL).with_batch_size(3);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
    assert_eq!(outcome.len(), 5);
    let ids: Vec<Snowflake> = outcome.messages.iter().map(|m| m.id).collect();
    assert_strictly_ascending(&ids);
}

#[tokio::test]
async fn test_malformed_records_are_dropped_not_fatal() {
    let mut server = mockito::Server::new_async().await;
    let good = Snowflake::from_unix_ms(NOW_MS);
    let body = format!(
        r#"[{}, {{"timestamp": "2023-06-15T11:00:00Z"}}, {{"id": "not-digits", "timestamp": "2023-06-15T10:00:00Z"}}]"#,
        message_json(good)
    );
    server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Exact("limit=50".to_string()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let harvester = test_harvester(&server.url());
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest");

    assert_eq!(outcome.len(), 1);
    assert_eq!(outcome.messages[0].id, good);
    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
}

#[tokio::test]
async fn test_sustained_throttling_escalates() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/channels/{CHANNEL}/messages").as_str())
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"retry_after": 0.01, "global": false}"#)
        .create_async()
        .await;

    let client = test_client(&server.url()).with_max_retries(1);
    let harvester = Harvester::new(client).with_page_delay(Duration::ZERO);
    let result = harvester.harvest(&HarvestRequest::new(CHANNEL)).await;

    assert!(matches!(
        result,
        Err(HarvestError::Throttled { attempts: 2 })
    ));
}

#[tokio::test]
async fn test_cancellation_before_first_page() {
    let shutdown = social_capture::shutdown::ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    // no mocks: a cancelled harvest must not issue any request
    let harvester = test_harvester("http://127.0.0.1:9").with_shutdown(shutdown);
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest");

    assert!(outcome.is_empty());
    assert_eq!(outcome.reason, TerminationReason::Cancelled);
}

/// Serves a fixed response per accepted connection, in order. Used where the
/// same request must see different responses on consecutive attempts.
async fn scripted_server(responses: Vec<(u16, &'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    tokio::spawn(async move {
        for (status, reason, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 4096];
            let mut read = 0usize;
            loop {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) => break,
                    Ok(n) => {
                        read += n;
                        if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(_) => return,
                }
            }
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    format!("http://{addr}")
}

#[tokio::test]
async fn test_429_retries_with_server_delay_then_succeeds() {
    let ids = descending_ids(NOW_MS, 3);
    let base_url = scripted_server(vec![
        (
            429,
            "Too Many Requests",
            r#"{"retry_after": 0.25, "global": false}"#.to_string(),
        ),
        (200, "OK", page_body(&ids)),
    ])
    .await;

    let harvester = test_harvester(&base_url);
    let start = Instant::now();
    let outcome = harvester
        .harvest(&HarvestRequest::new(CHANNEL))
        .await
        .expect("harvest");

    // the server-specified wait was honored
    assert!(start.elapsed() >= Duration::from_millis(250));
    // and the retried page is indistinguishable from a first-attempt success
    assert_eq!(outcome.len(), 3);
    assert_eq!(outcome.reason, TerminationReason::EndOfHistory);
}
