//! Request spacing behavior

use mockito::Matcher;
use social_capture::discord::rate_limit::{RateGovernor, DISCORD_MIN_DELAY};
use social_capture::discord::{DiscordClient, HarvestRequest, Harvester};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_governor_spaces_consecutive_turns() {
    let governor = RateGovernor::new(Duration::from_millis(120));

    let start = Instant::now();
    governor.await_turn().await;
    let first = start.elapsed();
    governor.await_turn().await;
    governor.await_turn().await;
    let total = start.elapsed();

    // the first turn is free; each later turn pays the full spacing
    assert!(first < Duration::from_millis(60));
    assert!(total >= Duration::from_millis(240));
}

#[tokio::test]
async fn test_configured_delay_below_floor_is_clamped() {
    let client = DiscordClient::new("token", Duration::from_millis(500)).expect("client");
    assert_eq!(client.rate_limit_delay(), DISCORD_MIN_DELAY);
}

#[tokio::test]
async fn test_inter_page_safety_delay_is_applied() {
    let mut server = mockito::Server::new_async().await;
    let path = "/channels/1/messages";

    // two full pages then an empty one
    let page: Vec<serde_json::Value> = (0..2)
        .map(|i| {
            serde_json::json!({
                "id": (9_000_000 - i * 1000).to_string(),
                "timestamp": "2023-06-15T12:00:00Z",
                "author": {"id": "1", "username": "a", "discriminator": "0", "bot": false}
            })
        })
        .collect();
    server
        .mock("GET", path)
        .match_query(Matcher::Exact("limit=2".to_string()))
        .with_status(200)
        .with_body(serde_json::to_string(&page).unwrap())
        .create_async()
        .await;
    server
        .mock("GET", path)
        .match_query(Matcher::Regex("before=".to_string()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let client = DiscordClient::with_base_url("token", Duration::from_secs(2), server.url())
        .expect("client")
        .with_governor(RateGovernor::new(Duration::ZERO));
    let harvester = Harvester::new(client).with_page_delay(Duration::from_millis(150));

    let start = Instant::now();
    let request = HarvestRequest::new("1").with_batch_size(2);
    let outcome = harvester.harvest(&request).await.expect("harvest");

    assert_eq!(outcome.len(), 2);
    // one inter-page delay between page 1 and page 2
    assert!(start.elapsed() >= Duration::from_millis(150));
}
