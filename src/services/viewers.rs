use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::core::feed::CandidateFeed;
use crate::core::reconciler::MatchReconciler;
use crate::models::ViewerSession;
use crate::services::auth::SessionEvent;
use crate::services::source::DataSource;

/// Everything the service remembers about one viewer between requests
pub struct ViewerState {
    pub feed: CandidateFeed,
    pub reconciler: MatchReconciler,
    matches_requested: bool,
}

impl ViewerState {
    fn new(source: Arc<dyn DataSource>, match_check_delay: Duration) -> Self {
        Self {
            feed: CandidateFeed::new(),
            reconciler: MatchReconciler::new(source, match_check_delay),
            matches_requested: false,
        }
    }

    /// Load the viewer's matches once; anonymous viewers have none
    ///
    /// A failed first load is not retried here; the next scheduled check
    /// brings the list up to date.
    pub async fn ensure_matches(&mut self, session: &ViewerSession) {
        let ViewerSession::Authenticated { user, access_token } = session else {
            return;
        };
        if self.matches_requested || self.reconciler.is_loaded() {
            return;
        }
        self.matches_requested = true;
        if let Err(e) = self.reconciler.refresh(&user.id, access_token).await {
            tracing::error!("Error loading matches for {}: {}", user.id, e);
        }
    }
}

pub type ViewerHandle = Arc<Mutex<ViewerState>>;

/// Per-viewer state keyed by [`ViewerSession::state_key`]
///
/// Entries expire after sitting idle; a viewer who comes back starts from a
/// fresh feed, like a page reload.
pub struct ViewerRegistry {
    source: Arc<dyn DataSource>,
    match_check_delay: Duration,
    viewers: moka::future::Cache<String, ViewerHandle>,
}

impl ViewerRegistry {
    pub fn new(
        source: Arc<dyn DataSource>,
        match_check_delay: Duration,
        idle_ttl: Duration,
        max_viewers: u64,
    ) -> Self {
        let viewers = moka::future::CacheBuilder::new(max_viewers)
            .time_to_idle(idle_ttl)
            .build();

        Self {
            source,
            match_check_delay,
            viewers,
        }
    }

    pub fn from_settings(settings: &Settings, source: Arc<dyn DataSource>) -> Self {
        Self::new(
            source,
            settings.feed.match_check_delay(),
            Duration::from_secs(settings.sessions.idle_ttl_secs),
            settings.sessions.max_viewers,
        )
    }

    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// State for `session`, created on first sight; a member's matches are
    /// loaded when their state is created
    pub async fn get_or_create(&self, session: &ViewerSession) -> ViewerHandle {
        let source = self.source.clone();
        let delay = self.match_check_delay;

        let handle = self
            .viewers
            .get_with(session.state_key(), async move {
                Arc::new(Mutex::new(ViewerState::new(source, delay)))
            })
            .await;

        if session.user().is_some() {
            handle.lock().await.ensure_matches(session).await;
        }
        handle
    }

    pub fn contains(&self, state_key: &str) -> bool {
        self.viewers.contains_key(state_key)
    }

    pub async fn forget(&self, state_key: &str) {
        self.viewers.invalidate(state_key).await;
        tracing::debug!("Dropped viewer state {}", state_key);
    }

    /// Drop a member's state when they sign out
    pub fn watch_sessions(self: &Arc<Self>, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedOut(user_id)) => {
                        registry.forget(&format!("user:{}", user_id)).await;
                    }
                    Ok(SessionEvent::SignedIn(user)) => {
                        tracing::debug!("Session started for {}", user.id);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Session watcher skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthUser;
    use crate::services::auth::SessionManager;
    use crate::services::local::LocalStore;

    fn registry(store: Arc<LocalStore>) -> Arc<ViewerRegistry> {
        Arc::new(ViewerRegistry::new(
            store,
            Duration::from_millis(10),
            Duration::from_secs(60),
            100,
        ))
    }

    #[tokio::test]
    async fn test_same_viewer_same_state() {
        let registry = registry(Arc::new(LocalStore::in_memory()));
        let viewer = ViewerSession::Anonymous("anon_1_aaaaaaaaa".into());

        let first = registry.get_or_create(&viewer).await;
        first.lock().await.feed.mark_decided("1");

        let again = registry.get_or_create(&viewer).await;
        assert!(again.lock().await.feed.is_decided("1"));

        let other = registry
            .get_or_create(&ViewerSession::Anonymous("anon_2_bbbbbbbbb".into()))
            .await;
        assert!(!other.lock().await.feed.is_decided("1"));
    }

    #[tokio::test]
    async fn test_sign_out_drops_member_state() {
        let store = Arc::new(LocalStore::in_memory());
        let sessions = SessionManager::new(store.clone(), Some("secret"), Duration::from_secs(60));
        let registry = registry(store);
        let watcher = registry.watch_sessions(sessions.subscribe());

        let session = sessions.sign_in("c@stanford.edu", "pw").await.unwrap();
        let token = session.access_token.clone().unwrap();
        let viewer = ViewerSession::Authenticated {
            user: session.user.clone(),
            access_token: token.clone(),
        };
        registry.get_or_create(&viewer).await;
        assert!(registry.contains(&viewer.state_key()));

        sessions.sign_out(&token).await.unwrap();
        for _ in 0..50 {
            if !registry.contains(&viewer.state_key()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!registry.contains(&viewer.state_key()));
        watcher.abort();
    }

    #[tokio::test]
    async fn test_member_matches_load_on_creation() {
        let store = Arc::new(LocalStore::in_memory());
        let registry = registry(store);
        let viewer = ViewerSession::Authenticated {
            user: AuthUser {
                id: "u1".into(),
                email: "u1@hbs.edu".into(),
            },
            access_token: "t".into(),
        };

        let handle = registry.get_or_create(&viewer).await;
        let mut state = handle.lock().await;
        assert!(state.reconciler.is_loaded());
        assert_eq!(state.reconciler.match_count(), 0);

        // Anonymous viewers never load matches
        let anon = ViewerSession::Anonymous("anon_3_ccccccccc".into());
        let handle = registry.get_or_create(&anon).await;
        let mut anon_state = handle.lock().await;
        anon_state.ensure_matches(&anon).await;
        assert!(!anon_state.reconciler.is_loaded());
        state.ensure_matches(&viewer).await;
    }
}
