//! Unit tests for Markdown rendering

use chrono::{TimeZone, Utc};
use social_capture::output::{markdown, RenderOptions};
use social_capture::youtube::{Transcript, TranscriptSegment};
use social_capture::{Attachment, Author, ChannelInfo, Message, Snowflake};

fn message(id: u64, content: &str) -> Message {
    Message {
        id: Snowflake::from_raw(id),
        timestamp: Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap(),
        author: Author {
            id: "42".to_string(),
            username: "alice".to_string(),
            discriminator: "0".to_string(),
            bot: false,
        },
        content: content.to_string(),
        attachments: Vec::new(),
        embed_count: 0,
        edited_timestamp: None,
    }
}

fn channel() -> ChannelInfo {
    ChannelInfo {
        id: "123".to_string(),
        name: "announcements".to_string(),
        kind: 0,
        guild_id: Some("9".to_string()),
        topic: Some("release notes".to_string()),
    }
}

fn captured_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 2, 8, 0, 0).unwrap()
}

fn transcript(segments: Vec<TranscriptSegment>) -> Transcript {
    Transcript {
        video_id: "dQw4w9WgXcQ".to_string(),
        video_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        language: "en".to_string(),
        segments,
        fetched_at: captured_at(),
    }
}

fn segment(text: &str, start: f64, duration: f64) -> TranscriptSegment {
    TranscriptSegment {
        text: text.to_string(),
        start,
        duration,
    }
}

#[test]
fn test_messages_header_and_body() {
    let doc = markdown::render_messages(
        &[message(1, "hello world")],
        Some(&channel()),
        captured_at(),
        RenderOptions::default(),
    );

    assert!(doc.starts_with("# Discord Messages\n"));
    assert!(doc.contains("**Channel:** #announcements"));
    assert!(doc.contains("**Channel ID:** 123"));
    assert!(doc.contains("**Topic:** release notes"));
    assert!(doc.contains("**Messages:** 1"));
    assert!(doc.contains("**[2023-06-01 12:00:00 UTC]** **alice:**"));
    assert!(doc.contains("hello world"));
}

#[test]
fn test_messages_metadata_can_be_disabled() {
    let options = RenderOptions {
        include_metadata: false,
        include_attachments: false,
    };
    let doc = markdown::render_messages(
        &[message(1, "hello")],
        Some(&channel()),
        captured_at(),
        options,
    );

    assert!(!doc.contains("**Channel:**"));
    assert!(doc.contains("hello"));
}

#[test]
fn test_empty_harvest_renders_placeholder() {
    let doc = markdown::render_messages(&[], Some(&channel()), captured_at(), RenderOptions::default());
    assert!(doc.contains("No messages found."));
}

#[test]
fn test_empty_messages_are_skipped() {
    let doc = markdown::render_messages(
        &[message(1, "   "), message(2, "visible")],
        None,
        captured_at(),
        RenderOptions::default(),
    );

    assert_eq!(doc.matches("**alice:**").count(), 1);
    assert!(doc.contains("visible"));
}

#[test]
fn test_content_is_escaped() {
    let doc = markdown::render_messages(
        &[message(1, "snake_case and *stars*")],
        None,
        captured_at(),
        RenderOptions::default(),
    );
    assert!(doc.contains(r"snake\_case and \*stars\*"));
}

#[test]
fn test_attachments_render_only_when_enabled() {
    let mut msg = message(1, "see attached");
    msg.attachments.push(Attachment {
        filename: "notes.pdf".to_string(),
        url: "https://cdn.example/notes.pdf".to_string(),
        size: 2048,
    });
    let messages = [msg];

    let hidden = markdown::render_messages(
        &messages,
        None,
        captured_at(),
        RenderOptions::default(),
    );
    assert!(!hidden.contains("notes.pdf"));

    let shown = markdown::render_messages(
        &messages,
        None,
        captured_at(),
        RenderOptions {
            include_metadata: true,
            include_attachments: true,
        },
    );
    assert!(shown.contains("*Attachments:*"));
    assert!(shown.contains("[notes.pdf](https://cdn.example/notes.pdf) (2048 bytes)"));
}

#[test]
fn test_embeds_are_counted() {
    let mut msg = message(1, "with embeds");
    msg.embed_count = 2;
    let doc = markdown::render_messages(&[msg], None, captured_at(), RenderOptions::default());
    assert!(doc.contains("*Embeds: 2 embed(s)*"));
}

#[test]
fn test_bot_author_is_tagged() {
    let mut msg = message(1, "beep");
    msg.author.bot = true;
    let doc = markdown::render_messages(&[msg], None, captured_at(), RenderOptions::default());
    assert!(doc.contains("**alice [BOT]:**"));
}

#[test]
fn test_transcript_groups_on_long_gap() {
    let doc = markdown::render_transcript(
        &transcript(vec![
            segment("one", 0.0, 1.0),
            segment("two", 10.0, 1.0),
            // 40s past the paragraph start: closes the first paragraph
            segment("three", 40.0, 1.0),
            segment("four", 45.0, 1.0),
        ]),
        RenderOptions::default(),
    );

    assert!(doc.contains("**[00:00]** one two three"));
    assert!(doc.contains("**[00:45]** four"));
}

#[test]
fn test_transcript_groups_on_long_segment() {
    let doc = markdown::render_transcript(
        &transcript(vec![
            segment("a slow sentence", 0.0, 5.0),
            segment("next paragraph", 6.0, 1.0),
        ]),
        RenderOptions::default(),
    );

    assert!(doc.contains("**[00:00]** a slow sentence"));
    assert!(doc.contains("**[00:06]** next paragraph"));
}

#[test]
fn test_transcript_metadata_header() {
    let doc = markdown::render_transcript(
        &transcript(vec![segment("hi", 0.0, 1.0)]),
        RenderOptions::default(),
    );

    assert!(doc.starts_with("# YouTube Transcript\n"));
    assert!(doc.contains("**Video ID:** dQw4w9WgXcQ"));
    assert!(doc.contains("**Language:** en"));
    assert!(doc.contains("**Total Segments:** 1"));
    assert!(doc.contains("## Transcript"));
}
