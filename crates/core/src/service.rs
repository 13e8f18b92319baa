//! The search prefetch service.
//!
//! Owns every piece of mutable state: the live entry store, the durable
//! alias cache, profile settings, and the active search engine. All
//! mutation happens through `&mut self` on one logical sequence; network
//! fetches run as spawned tasks that report back over a channel, and each
//! completion is tagged with the generation of the entry it was started
//! for, so a completion racing a cancellation or an expiry is a no-op.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::mpsc;
use url::Url;

use crate::Error;
use crate::alias::AliasCache;
use crate::config::PrefetchConfig;
use crate::coordinator::{self, Candidate};
use crate::eligibility::PrefetchIneligibility;
use crate::engine::{SearchEngine, SearchTerms};
use crate::entry::{PrefetchEntry, PrefetchStatus};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::prefs::PrefsFile;
use crate::serving::{NavigationTransition, NotServed, ResponseHandle, ServeRequest};
use crate::settings::ProfileSettings;
use crate::store::PrefetchStore;
use crate::urls::{same_origin, strip_fragment};

/// Coordinates speculative search fetches and serves them to navigations.
pub struct SearchPrefetchService {
    config: PrefetchConfig,
    engine: Option<SearchEngine>,
    settings: ProfileSettings,
    store: PrefetchStore,
    aliases: AliasCache,
    prefs: Option<PrefsFile>,
    fetcher: Arc<dyn Fetcher>,
    outcome_tx: mpsc::UnboundedSender<FetchOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<FetchOutcome>,
    generation: u64,
}

impl SearchPrefetchService {
    /// Build the service and load the persisted alias cache.
    ///
    /// Entries that fail re-validation against `engine` are dropped and
    /// the prefs file is rewritten without them. With no engine the alias
    /// cache starts empty.
    pub async fn init(config: PrefetchConfig, engine: Option<SearchEngine>, fetcher: Arc<dyn Fetcher>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let store = PrefetchStore::new(config.max_concurrent_prefetches, config.error_backoff());
        let prefs = config.prefs_path.clone().map(PrefsFile::new);

        let mut aliases = AliasCache::new(config.max_cache_entries);
        if let (Some(prefs), Some(engine)) = (&prefs, &engine) {
            let (persisted, malformed) = prefs.load().await;
            let (loaded, dropped) =
                AliasCache::from_persisted(&persisted, engine, config.max_cache_entries, Utc::now());
            aliases = loaded;

            if malformed + dropped > 0 {
                tracing::info!(malformed, dropped, "rewriting prefs after dropping invalid alias entries");
                prefs.save_in_background(aliases.to_persisted());
            }
        }

        Self {
            config,
            engine,
            settings: ProfileSettings::default(),
            store,
            aliases,
            prefs,
            fetcher,
            outcome_tx,
            outcome_rx,
            generation: 0,
        }
    }

    /// Abort all in-flight work and write the alias cache out durably.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.store.clear();
        if let Some(prefs) = &self.prefs {
            prefs.save(&self.aliases.to_persisted()).await?;
        }
        Ok(())
    }

    pub fn search_engine(&self) -> Option<&SearchEngine> {
        self.engine.as_ref()
    }

    /// Swap the default search engine. Any change tears down all live
    /// prefetches and the alias cache, since responses fetched under the
    /// old engine must never serve navigations keyed by the new one.
    pub fn set_search_engine(&mut self, engine: Option<SearchEngine>) {
        if self.engine == engine {
            return;
        }
        tracing::info!("default search engine changed, clearing prefetches");
        self.clear_prefetches();
        self.engine = engine;
    }

    pub fn settings(&self) -> &ProfileSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ProfileSettings {
        &mut self.settings
    }

    pub fn aliases(&self) -> &AliasCache {
        &self.aliases
    }

    pub fn prefetch_status(&self, terms: &SearchTerms) -> Option<PrefetchStatus> {
        self.store.get(terms).map(PrefetchEntry::status)
    }

    /// Start a speculative fetch for `url` if every eligibility check
    /// passes. `navigation_prefetch` marks candidates backed by a strong
    /// user signal (a typed query about to be navigated to); they survive
    /// candidate-set changes.
    ///
    /// The checks are ordered and short-circuiting; the returned reason is
    /// the first one that failed.
    pub fn maybe_prefetch_url(&mut self, url: &Url, navigation_prefetch: bool) -> Result<(), PrefetchIneligibility> {
        if !self.config.prefetching_enabled
            || (navigation_prefetch && !self.config.navigation_prefetch_enabled)
        {
            return Err(PrefetchIneligibility::FeatureDisabled);
        }

        let engine = self.engine.as_ref().ok_or(PrefetchIneligibility::SearchEngineNotValid)?;
        let terms = engine.extract_search_terms(url).ok_or(PrefetchIneligibility::NotDefaultSearchWithTerms)?;
        let prefetch_url = engine.preload_url(&terms, true);

        if !self.settings.preloading_enabled {
            return Err(PrefetchIneligibility::PrefetchDisabled);
        }
        if !self.settings.scripting_allowed_for(url) {
            return Err(PrefetchIneligibility::JavascriptDisabled);
        }

        let now = Instant::now();
        if self.store.in_error_backoff(now) {
            return Err(PrefetchIneligibility::ErrorBackoff);
        }

        self.store.expire_stale(now);
        if self.store.contains(&terms) {
            return Err(PrefetchIneligibility::AttemptedQueryRecently);
        }
        if self.store.at_capacity() {
            return Err(PrefetchIneligibility::MaxAttemptsReached);
        }
        if self.fetcher.is_throttled() {
            return Err(PrefetchIneligibility::Throttled);
        }

        self.generation += 1;
        let generation = self.generation;
        let mut entry =
            PrefetchEntry::new(terms.clone(), prefetch_url.clone(), navigation_prefetch, generation, now + self.config.caching_limit());

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.outcome_tx.clone();
        let task_terms = terms.clone();
        let handle = tokio::spawn(async move {
            let result = fetcher.fetch(prefetch_url).await;
            let _ = tx.send(FetchOutcome { search_terms: task_terms, generation, result });
        });
        entry.attach_fetch_task(handle);

        tracing::debug!(search_terms = %terms, navigation_prefetch, "prefetch started");
        if self.store.insert(terms.clone(), entry).is_err() {
            // Unreachable given the duplicate check above.
            tracing::warn!(search_terms = %terms, "race on prefetch insertion");
            return Err(PrefetchIneligibility::AttemptedQueryRecently);
        }
        Ok(())
    }

    /// Try to satisfy a navigation from a completed in-memory prefetch.
    ///
    /// Success hands the response off (at most once), deletes the entry,
    /// and records an alias when the navigation URL differs from the URL
    /// that was actually fetched. Failure returns why, and the navigation
    /// proceeds over the network.
    pub fn try_serve_from_memory(&mut self, request: &ServeRequest) -> Result<ResponseHandle, NotServed> {
        let engine = self.engine.as_ref().ok_or(NotServed::SearchEngineNotValid)?;
        let terms = engine.extract_search_terms(&request.url).ok_or(NotServed::NotDefaultSearchWithTerms)?;

        self.store.expire_stale(Instant::now());
        let settings = &self.settings;
        let entry = self.store.get_mut(&terms).ok_or(NotServed::NoPrefetch)?;

        if let Err(reason) = servable(entry, request, settings) {
            entry.set_failure_reason(reason);
            return Err(reason);
        }

        let response = entry.take_response().ok_or(NotServed::NotServedOtherReason)?;
        entry.mark_served();
        let prefetch_url = entry.prefetch_url().clone();
        self.delete_entry(&terms, "served");

        if strip_fragment(&request.url) != prefetch_url && self.aliases.put(&request.url, &prefetch_url) {
            self.persist_aliases();
        }

        Ok(ResponseHandle::Prefetched {
            search_terms: terms,
            prefetch_url,
            status_code: response.status_code,
            body: response.body,
        })
    }

    /// Look `url` up in the durable alias cache.
    ///
    /// A hit bumps the alias's recency and tells the caller which URL to
    /// load instead; the response is expected from the HTTP cache, so
    /// this works across restarts with no in-memory entry.
    pub fn try_serve_from_alias(&mut self, url: &Url) -> Option<ResponseHandle> {
        let prefetch_url = self.aliases.get(url)?.clone();
        self.aliases.touch(url);
        self.persist_aliases();
        tracing::debug!(navigation = %url, prefetch = %prefetch_url, "serving from alias cache");
        Some(ResponseHandle::AliasForward { prefetch_url })
    }

    /// Hand a copy of a completed response to the prerender subsystem.
    ///
    /// Unlike serving, this does not consume the entry: it moves to
    /// `Prerendered` and is consumed later through
    /// [`Self::on_prerender_activated`], or dropped by expiry.
    pub fn take_prerender_from_memory_cache(&mut self, url: &Url) -> Result<ResponseHandle, NotServed> {
        let engine = self.engine.as_ref().ok_or(NotServed::SearchEngineNotValid)?;
        let terms = engine.extract_search_terms(url).ok_or(NotServed::NotDefaultSearchWithTerms)?;

        self.store.expire_stale(Instant::now());
        let settings = &self.settings;
        let entry = self.store.get_mut(&terms).ok_or(NotServed::NoPrefetch)?;

        let request = ServeRequest::get(url.clone());
        if let Err(reason) = servable(entry, &request, settings) {
            entry.set_failure_reason(reason);
            return Err(reason);
        }

        let response = entry.clone_response().ok_or(NotServed::NotServedOtherReason)?;
        entry.mark_prerendered();
        entry.set_prerender_url(url.clone());
        tracing::debug!(search_terms = %terms, "prefetch handed to prerender");

        Ok(ResponseHandle::Prefetched {
            search_terms: terms,
            prefetch_url: entry.prefetch_url().clone(),
            status_code: response.status_code,
            body: response.body,
        })
    }

    /// Flag an entry for upgrade to a prerender once its body completes.
    /// The flag is cleared on every candidate-set change.
    pub fn mark_prerender_upgrade(&mut self, terms: &SearchTerms) -> bool {
        match self.store.get_mut(terms) {
            Some(entry) => {
                entry.set_prerender_upgrade();
                true
            }
            None => false,
        }
    }

    /// The prerendered page was activated by a real navigation: record the
    /// alias and retire the entry.
    pub fn on_prerender_activated(&mut self, terms: &SearchTerms, navigation_url: &Url) {
        let Some(entry) = self.store.get_mut(terms) else {
            return;
        };
        entry.mark_served();
        let prefetch_url = entry.prefetch_url().clone();
        self.delete_entry(terms, "prerender activated");

        if strip_fragment(navigation_url) != prefetch_url && self.aliases.put(navigation_url, &prefetch_url) {
            self.persist_aliases();
        }
    }

    /// The suggestion backend produced a fresh candidate set: tear down
    /// suggestion-driven entries that fell off it, then start prefetches
    /// for candidates the backend scored as likely navigations.
    pub fn on_candidate_queries_changed(&mut self, candidates: &[Candidate]) {
        self.store.expire_stale(Instant::now());

        for terms in coordinator::reconcile(&mut self.store, candidates) {
            self.cancel_entry(&terms);
        }

        let Some(engine) = self.engine.clone() else {
            return;
        };
        for candidate in candidates.iter().filter(|c| c.is_likely_navigation) {
            let url = engine.preload_url(&candidate.search_terms, false);
            if let Err(reason) = self.maybe_prefetch_url(&url, false) {
                if !reason.is_duplicate() {
                    tracing::debug!(search_terms = %candidate.search_terms, %reason, "candidate not prefetched");
                }
            }
        }
    }

    /// A navigation to a search results URL committed; if a live entry
    /// matches its terms, record the click time. First click wins.
    pub fn on_navigation_committed(&mut self, url: &Url) {
        let Some(engine) = &self.engine else {
            return;
        };
        let Some(terms) = engine.extract_search_terms(url) else {
            return;
        };
        if let Some(entry) = self.store.get_mut(&terms) {
            entry.record_click(Utc::now());
            tracing::info!(search_terms = %terms, status = %entry.status(), "navigation committed over live prefetch");
        }
    }

    /// Drop every live prefetch and the whole alias cache, e.g. when the
    /// user clears browsing data.
    pub fn clear_prefetches(&mut self) {
        self.store.clear();
        self.aliases.clear();
        self.persist_aliases();
    }

    /// Drain and apply any fetch completions waiting on the channel.
    /// Returns how many were applied.
    pub fn poll_fetch_outcomes(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_fetch_outcome(outcome);
            applied += 1;
        }
        applied
    }

    /// Wait for the next fetch completion and apply it. Returns false only
    /// if the channel closed, which cannot happen while `self` is alive.
    pub async fn next_fetch_outcome(&mut self) -> bool {
        match self.outcome_rx.recv().await {
            Some(outcome) => {
                self.apply_fetch_outcome(outcome);
                true
            }
            None => false,
        }
    }

    fn apply_fetch_outcome(&mut self, outcome: FetchOutcome) {
        let FetchOutcome { search_terms, generation, result } = outcome;

        let failed = {
            let Some(entry) = self.store.get_mut(&search_terms) else {
                tracing::debug!(%search_terms, "discarding completion for deleted entry");
                return;
            };
            if entry.generation() != generation {
                tracing::debug!(%search_terms, generation, "discarding stale completion");
                return;
            }
            if entry.status() != PrefetchStatus::Pending {
                tracing::debug!(%search_terms, status = %entry.status(), "discarding completion for settled entry");
                return;
            }

            match result {
                Ok(response) => {
                    entry.mark_can_be_served();
                    entry.mark_complete(response);
                    tracing::debug!(%search_terms, "prefetch complete");
                    false
                }
                Err(error) => {
                    tracing::warn!(%search_terms, %error, "prefetch failed, entering error backoff");
                    entry.mark_failed();
                    true
                }
            }
        };

        if failed {
            self.store.record_fetch_error(Instant::now());
            self.delete_entry(&search_terms, "fetch failed");
        }
    }

    fn cancel_entry(&mut self, terms: &SearchTerms) {
        if let Some(mut entry) = self.store.remove(terms) {
            entry.mark_cancelled();
            tracing::debug!(
                search_terms = %terms,
                final_status = %entry.status(),
                navigation_prefetch = entry.navigation_prefetch(),
                "prefetch cancelled"
            );
        }
    }

    fn delete_entry(&mut self, terms: &SearchTerms, context: &str) {
        if let Some(entry) = self.store.remove(terms) {
            tracing::debug!(
                search_terms = %terms,
                final_status = %entry.status(),
                navigation_prefetch = entry.navigation_prefetch(),
                context,
                "prefetch entry deleted"
            );
        }
    }

    fn persist_aliases(&self) {
        if let Some(prefs) = &self.prefs {
            prefs.save_in_background(self.aliases.to_persisted());
        }
    }
}

/// Shared serve-time validation, run after the entry lookup. The entry is
/// only read; the caller records the failure reason and consumes the
/// response on success.
fn servable(entry: &PrefetchEntry, request: &ServeRequest, settings: &ProfileSettings) -> Result<(), NotServed> {
    if !settings.javascript_enabled {
        return Err(NotServed::JavascriptDisabled);
    }
    if settings.script_blocked_for(&request.url) {
        return Err(NotServed::JavascriptDisabled);
    }

    if !same_origin(&request.url, entry.prefetch_url()) {
        return Err(NotServed::PrefetchWasForDifferentOrigin);
    }

    match entry.status() {
        PrefetchStatus::Complete => {}
        PrefetchStatus::Cancelled => return Err(NotServed::RequestWasCancelled),
        PrefetchStatus::Failed => return Err(NotServed::RequestFailed),
        PrefetchStatus::Prerendered => return Err(NotServed::Prerendered),
        PrefetchStatus::Pending | PrefetchStatus::CanBeServed | PrefetchStatus::Served => {
            return Err(NotServed::NotServedOtherReason);
        }
    }

    if request.method != "GET"
        || request.cache_flags.any()
        || matches!(request.transition, NavigationTransition::Link | NavigationTransition::FormSubmit)
    {
        return Err(NotServed::PostReloadFormOrLink);
    }

    Ok(())
}
