//! A single speculative fetch's lifecycle.
//!
//! State machine:
//!
//! ```text
//! Pending -> { CanBeServed | Complete | Failed | Cancelled }
//! CanBeServed -> { Complete | Served | Prerendered | Failed | Cancelled }
//! Complete -> { Served | Prerendered | Cancelled }
//! Prerendered -> { Served }
//! ```
//!
//! `Served`, `Failed`, and `Cancelled` are terminal; the service removes
//! the entry (freeing its key) as soon as one of them is reached. Expiry
//! can delete an entry in any non-terminal state.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use url::Url;

use crate::engine::SearchTerms;
use crate::fetcher::FetchedResponse;
use crate::serving::NotServed;

/// Lifecycle status of a prefetch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchStatus {
    /// Fetch issued, nothing received yet.
    Pending,
    /// Response headers received and acceptable; body still streaming.
    CanBeServed,
    /// Full response body held; the entry is servable.
    Complete,
    /// Handed to the prerender subsystem; consumed via activation.
    Prerendered,
    /// Consumed by a navigation.
    Served,
    /// Cancelled before completion.
    Cancelled,
    /// The network fetch errored.
    Failed,
}

impl PrefetchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Served | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::CanBeServed => "can_be_served",
            Self::Complete => "complete",
            Self::Prerendered => "prerendered",
            Self::Served => "served",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One live speculative fetch, keyed by its search terms.
#[derive(Debug)]
pub struct PrefetchEntry {
    search_terms: SearchTerms,
    prefetch_url: Url,
    prerender_url: Option<Url>,
    status: PrefetchStatus,
    navigation_prefetch: bool,
    click_time: Option<DateTime<Utc>>,
    failure_reason: Option<NotServed>,
    generation: u64,
    expires_at: Instant,
    response: Option<FetchedResponse>,
    fetch_task: Option<JoinHandle<()>>,
    prerender_upgrade_pending: bool,
}

impl PrefetchEntry {
    pub(crate) fn new(
        search_terms: SearchTerms, prefetch_url: Url, navigation_prefetch: bool, generation: u64, expires_at: Instant,
    ) -> Self {
        Self {
            search_terms,
            prefetch_url,
            prerender_url: None,
            status: PrefetchStatus::Pending,
            navigation_prefetch,
            click_time: None,
            failure_reason: None,
            generation,
            expires_at,
            response: None,
            fetch_task: None,
            prerender_upgrade_pending: false,
        }
    }

    pub fn search_terms(&self) -> &SearchTerms {
        &self.search_terms
    }

    pub fn prefetch_url(&self) -> &Url {
        &self.prefetch_url
    }

    pub fn prerender_url(&self) -> Option<&Url> {
        self.prerender_url.as_ref()
    }

    pub fn status(&self) -> PrefetchStatus {
        self.status
    }

    pub fn navigation_prefetch(&self) -> bool {
        self.navigation_prefetch
    }

    pub fn click_time(&self) -> Option<DateTime<Utc>> {
        self.click_time
    }

    pub fn failure_reason(&self) -> Option<NotServed> {
        self.failure_reason
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn prerender_upgrade_pending(&self) -> bool {
        self.prerender_upgrade_pending
    }

    pub(crate) fn attach_fetch_task(&mut self, handle: JoinHandle<()>) {
        self.fetch_task = Some(handle);
    }

    /// Tell the in-flight fetch to abort. The store's state is updated
    /// before the abort takes effect; a completion that already raced in
    /// is discarded by the generation check.
    pub(crate) fn abort_fetch(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }

    pub(crate) fn record_click(&mut self, at: DateTime<Utc>) {
        // First observed click wins.
        self.click_time.get_or_insert(at);
    }

    pub(crate) fn set_failure_reason(&mut self, reason: NotServed) {
        self.failure_reason = Some(reason);
    }

    pub(crate) fn set_prerender_url(&mut self, url: Url) {
        self.prerender_url = Some(url);
    }

    pub(crate) fn set_prerender_upgrade(&mut self) {
        self.prerender_upgrade_pending = true;
    }

    /// Upgrade decisions are re-derived from each fresh candidate set, so
    /// any pending hook is dropped whenever the set changes.
    pub(crate) fn reset_prerender_upgrade(&mut self) {
        self.prerender_upgrade_pending = false;
    }

    pub(crate) fn mark_can_be_served(&mut self) -> bool {
        self.transition(PrefetchStatus::CanBeServed)
    }

    pub(crate) fn mark_complete(&mut self, response: FetchedResponse) -> bool {
        if self.transition(PrefetchStatus::Complete) {
            self.response = Some(response);
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_failed(&mut self) -> bool {
        self.abort_fetch();
        self.transition(PrefetchStatus::Failed)
    }

    pub(crate) fn mark_cancelled(&mut self) -> bool {
        self.abort_fetch();
        self.transition(PrefetchStatus::Cancelled)
    }

    pub(crate) fn mark_served(&mut self) -> bool {
        self.transition(PrefetchStatus::Served)
    }

    pub(crate) fn mark_prerendered(&mut self) -> bool {
        self.transition(PrefetchStatus::Prerendered)
    }

    /// Hand off the response body. At most one caller gets it.
    pub(crate) fn take_response(&mut self) -> Option<FetchedResponse> {
        self.response.take()
    }

    /// A copy of the held response, for prerendering, which must not
    /// consume the entry.
    pub(crate) fn clone_response(&self) -> Option<FetchedResponse> {
        self.response.clone()
    }

    fn transition(&mut self, next: PrefetchStatus) -> bool {
        use PrefetchStatus::*;
        let legal = matches!(
            (self.status, next),
            (Pending, CanBeServed | Complete | Failed | Cancelled)
                | (CanBeServed, Complete | Served | Prerendered | Failed | Cancelled)
                | (Complete, Served | Prerendered | Cancelled)
                | (Prerendered, Served)
        );

        if legal {
            self.status = next;
        } else {
            tracing::warn!(
                search_terms = %self.search_terms,
                from = %self.status,
                to = %next,
                "ignoring illegal prefetch status transition"
            );
        }
        legal
    }
}
