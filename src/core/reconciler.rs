use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::models::Match;
use crate::services::{DataSource, DataSourceError};

#[derive(Debug, Default)]
struct ReconcilerState {
    /// Bumped by every scheduled check; results from older checks are dropped
    generation: u64,
    loaded: bool,
    matches: Vec<Match>,
    /// Formed since the viewer last asked
    fresh: Vec<Match>,
}

/// Keeps one viewer's match list in step with the store
///
/// After a like, the store needs a moment to materialise the match row, so
/// the re-fetch runs after a fixed delay. The fetched set replaces the known
/// one wholesale; rows not seen before are queued as newly formed.
pub struct MatchReconciler {
    source: Arc<dyn DataSource>,
    delay: Duration,
    state: Arc<Mutex<ReconcilerState>>,
    pending: Option<JoinHandle<()>>,
}

fn lock(state: &Mutex<ReconcilerState>) -> MutexGuard<'_, ReconcilerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MatchReconciler {
    pub fn new(source: Arc<dyn DataSource>, delay: Duration) -> Self {
        Self {
            source,
            delay,
            state: Arc::new(Mutex::new(ReconcilerState::default())),
            pending: None,
        }
    }

    /// Fetch the viewer's matches now
    pub async fn refresh(&self, user_id: &str, access_token: &str) -> Result<Vec<Match>, DataSourceError> {
        let generation = lock(&self.state).generation;
        let fetched = self.source.fetch_matches(user_id, access_token).await?;
        apply(&self.state, generation, fetched, false, user_id);
        Ok(self.matches())
    }

    /// Re-fetch after the configured delay, superseding any check still pending
    pub fn schedule(&mut self, user_id: &str, access_token: &str) -> u64 {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.generation
        };

        if let Some(previous) = self.pending.take() {
            previous.abort();
        }

        let source = self.source.clone();
        let state = self.state.clone();
        let delay = self.delay;
        let user_id = user_id.to_string();
        let access_token = access_token.to_string();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match source.fetch_matches(&user_id, &access_token).await {
                Ok(fetched) => {
                    apply(&state, generation, fetched, true, &user_id);
                }
                Err(e) => tracing::error!("Error checking for matches for {}: {}", user_id, e),
            }
        }));

        generation
    }

    /// Wait for the pending check, if any
    pub async fn settled(&mut self) {
        if let Some(handle) = self.pending.take() {
            let _ = handle.await;
        }
    }

    /// At least one fetch has been applied
    pub fn is_loaded(&self) -> bool {
        lock(&self.state).loaded
    }

    pub fn matches(&self) -> Vec<Match> {
        lock(&self.state).matches.clone()
    }

    pub fn match_count(&self) -> usize {
        lock(&self.state).matches.len()
    }

    /// Matches formed since the last call
    pub fn take_new_matches(&self) -> Vec<Match> {
        std::mem::take(&mut lock(&self.state).fresh)
    }
}

impl Drop for MatchReconciler {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// Replace the known set with `fetched` unless a newer check has been scheduled
fn apply(
    state: &Mutex<ReconcilerState>,
    generation: u64,
    fetched: Vec<Match>,
    from_check: bool,
    user_id: &str,
) -> bool {
    let mut state = lock(state);
    if state.generation != generation {
        tracing::debug!(
            "Discarding stale match fetch for {} (generation {} < {})",
            user_id,
            generation,
            state.generation
        );
        return false;
    }

    if state.loaded || from_check {
        let known: HashSet<&str> = state.matches.iter().map(|m| m.id.as_str()).collect();
        let formed: Vec<Match> = fetched
            .iter()
            .filter(|m| !known.contains(m.id.as_str()))
            .cloned()
            .collect();

        if !formed.is_empty() {
            tracing::info!("{} new match(es) for {}", formed.len(), user_id);
        }
        state.fresh.extend(formed);
    }

    tracing::debug!("Found {} matches for {}", fetched.len(), user_id);
    state.matches = fetched;
    state.loaded = true;
    true
}
