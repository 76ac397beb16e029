//! Markdown rendering
//!
//! Turns harvested messages and fetched transcripts into human-readable
//! Markdown documents. Input contract: messages arrive oldest-first.

use crate::output::RenderOptions;
use crate::youtube::Transcript;
use crate::{ChannelInfo, Message};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Paragraph break threshold: gap from the paragraph's first segment, seconds.
const PARAGRAPH_GAP_SECS: f64 = 30.0;

/// Paragraph break threshold: a single long segment ends its paragraph.
const LONG_SEGMENT_SECS: f64 = 3.0;

/// Render harvested messages as a Markdown document.
pub fn render_messages(
    messages: &[Message],
    channel: Option<&ChannelInfo>,
    captured_at: DateTime<Utc>,
    options: RenderOptions,
) -> String {
    let mut doc = String::from("# Discord Messages\n\n");

    if messages.is_empty() {
        doc.push_str("No messages found.\n");
        return doc;
    }

    if options.include_metadata {
        if let Some(channel) = channel {
            let _ = writeln!(doc, "**Channel:** #{}", channel.name);
            let _ = writeln!(doc, "**Channel ID:** {}", channel.id);
            if let Some(topic) = &channel.topic {
                let _ = writeln!(doc, "**Topic:** {topic}");
            }
        }
        let _ = writeln!(doc, "**Messages:** {}", messages.len());
        let _ = writeln!(doc, "**Captured:** {}", captured_at.to_rfc3339());
        doc.push_str("\n---\n\n");
    }

    for message in messages {
        if message.is_empty() {
            continue;
        }

        let time = message.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
        let _ = writeln!(
            doc,
            "**[{time}]** **{}:**",
            message.author.display_name()
        );

        let content = message.content.trim();
        if !content.is_empty() {
            let _ = writeln!(doc, "{}", escape_markdown(content));
        }

        if options.include_attachments && !message.attachments.is_empty() {
            doc.push_str("\n*Attachments:*\n");
            for attachment in &message.attachments {
                let _ = writeln!(
                    doc,
                    "- [{}]({}) ({} bytes)",
                    attachment.filename, attachment.url, attachment.size
                );
            }
        }

        if message.embed_count > 0 {
            let _ = writeln!(doc, "\n*Embeds: {} embed(s)*", message.embed_count);
        }

        doc.push('\n');
    }

    doc
}

/// Render a transcript as a Markdown document, grouping segments into
/// paragraphs at long gaps.
pub fn render_transcript(transcript: &Transcript, options: RenderOptions) -> String {
    let mut doc = String::from("# YouTube Transcript\n\n");

    if options.include_metadata {
        let _ = writeln!(doc, "**Video ID:** {}", transcript.video_id);
        let _ = writeln!(doc, "**URL:** {}", transcript.video_url);
        let _ = writeln!(doc, "**Language:** {}", transcript.language);
        let _ = writeln!(doc, "**Fetched:** {}", transcript.fetched_at.to_rfc3339());
        let _ = writeln!(doc, "**Total Segments:** {}", transcript.segments.len());
        doc.push_str("\n---\n\n");
    }

    doc.push_str("## Transcript\n\n");

    let mut paragraph: Vec<&str> = Vec::new();
    let mut paragraph_start: Option<f64> = None;

    for segment in &transcript.segments {
        let start = *paragraph_start.get_or_insert(segment.start);
        paragraph.push(segment.text.trim());

        if segment.start - start > PARAGRAPH_GAP_SECS || segment.duration > LONG_SEGMENT_SECS {
            flush_paragraph(&mut doc, &mut paragraph, start);
            paragraph_start = None;
        }
    }
    flush_paragraph(&mut doc, &mut paragraph, paragraph_start.unwrap_or(0.0));

    doc
}

fn flush_paragraph(doc: &mut String, paragraph: &mut Vec<&str>, start: f64) {
    if paragraph.is_empty() {
        return;
    }
    let _ = writeln!(
        doc,
        "**[{}]** {}\n",
        format_timestamp(start),
        paragraph.join(" ")
    );
    paragraph.clear();
}

/// Format seconds as an `MM:SS` stamp.
fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Escape the Markdown control characters that commonly appear in chat text.
fn escape_markdown(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('*', "\\*")
        .replace('_', "\\_")
}
