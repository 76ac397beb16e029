//! Harvest orchestration
//!
//! Repeated page fetches over a backward cursor, with window filtering, a
//! total-count budget, termination detection, and assembly of the final
//! oldest-first result. A single harvest is strictly sequential: each page's
//! cursor depends on the previous page's oldest message.

use crate::discord::http::{DiscordClient, DISCORD_MAX_PAGE_SIZE};
use crate::discord::{HarvestOutcome, HarvestRequest, HarvestResult, TerminationReason};
use crate::shutdown::SharedShutdown;
use crate::Message;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Fixed safety delay between pages, applied on top of the rate governor's
/// spacing as a margin against burst-pattern throttling.
const PAGE_SAFETY_DELAY: Duration = Duration::from_millis(1000);

/// Walks a channel's history backward and assembles a bounded, deduplicated,
/// time-ordered result.
pub struct Harvester {
    client: DiscordClient,
    page_delay: Duration,
    shutdown: Option<SharedShutdown>,
}

impl Harvester {
    /// Create a harvester over a client session.
    pub fn new(client: DiscordClient) -> Self {
        Self {
            client,
            page_delay: PAGE_SAFETY_DELAY,
            shutdown: None,
        }
    }

    /// Override the inter-page safety delay (tests use zero).
    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Observe a shutdown handle at page boundaries.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Access the underlying client (for metadata requests).
    pub fn client(&self) -> &DiscordClient {
        &self.client
    }

    /// Run one complete harvest.
    ///
    /// Never fails for ordinary termination conditions. A fatal fetch
    /// failure on the first page propagates; the same failure after at
    /// least one successful page degrades to a partial result with reason
    /// [`TerminationReason::Aborted`].
    pub async fn harvest(&self, request: &HarvestRequest) -> HarvestResult<HarvestOutcome> {
        let (lower, upper) = request.window.id_bounds();
        let channel_id = request.channel_id.as_str();

        info!(
            "harvesting channel {} (budget: {}, window: {:?}..{:?})",
            channel_id,
            request
                .max_messages
                .map_or_else(|| "unbounded".to_string(), |n| n.to_string()),
            request.window.after,
            request.window.before,
        );

        // keep the short-page check honest against the fetcher's clamp
        let batch_size = request.batch_size.min(DISCORD_MAX_PAGE_SIZE);

        let mut collected: Vec<Message> = Vec::new();
        let mut before_cursor = None;
        let mut first_page = true;

        let reason = loop {
            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    warn!("shutdown requested; stopping harvest of {channel_id} at page boundary");
                    break TerminationReason::Cancelled;
                }
            }

            let remaining = request.max_messages.map(|max| max.saturating_sub(collected.len()));
            if remaining == Some(0) {
                break TerminationReason::BudgetReached;
            }
            let page_size = remaining.map_or(batch_size, |r| batch_size.min(r));

            // the lower bound rides along as the resume point on the very
            // first request only; later pages are anchored by the cursor
            let after = if first_page { lower } else { None };

            let page = match self
                .client
                .fetch_page(channel_id, page_size, before_cursor, after)
                .await
            {
                Ok(page) => page,
                Err(e) if first_page => return Err(e),
                Err(e) => {
                    warn!("harvest of {channel_id} aborted after {} messages: {e}", collected.len());
                    break TerminationReason::Aborted;
                }
            };
            first_page = false;

            if page.is_empty() {
                break TerminationReason::EndOfHistory;
            }

            let page_len = page.len();
            // pages arrive newest-first; the last entry is the oldest and
            // anchors the next backward step
            before_cursor = page.last().map(|m| m.id);

            let mut crossed_lower_bound = false;
            let mut kept = 0usize;
            for message in page {
                if let Some(upper) = upper {
                    if message.id > upper {
                        // still above the window; skip but keep walking back
                        continue;
                    }
                }
                if let Some(lower) = lower {
                    if message.id < lower {
                        // pages are time-ordered, so everything after this
                        // point is also below the bound
                        crossed_lower_bound = true;
                        break;
                    }
                }
                collected.push(message);
                kept += 1;
            }

            debug!(
                "page of {page_len} from {channel_id}: kept {kept}, total {}",
                collected.len()
            );

            if request.max_messages.is_some_and(|max| collected.len() >= max) {
                break TerminationReason::BudgetReached;
            }
            if crossed_lower_bound {
                break TerminationReason::LowerBoundReached;
            }
            if page_len < page_size {
                // the platform signals exhausted history with a short page
                break TerminationReason::EndOfHistory;
            }

            sleep(self.page_delay).await;
        };

        // wire order is newest-first; callers need oldest-first. The
        // after-anchored first page can overlap the backward walk, so drop
        // duplicate identifiers after sorting.
        collected.sort_by_key(|m| m.id);
        collected.dedup_by_key(|m| m.id);

        info!(
            "harvest of {} finished: {} messages ({})",
            channel_id,
            collected.len(),
            reason
        );

        Ok(HarvestOutcome {
            messages: collected,
            reason,
        })
    }
}
