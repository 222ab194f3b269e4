//! In-memory collaborators for tests and the demo binary.

use crate::collaborators::{
    AnalyticsClient, CollaboratorError, CollaboratorFuture, EmailMessage, EmailSender, Shortlink,
    ShortlinkAnalytics, ShortlinkClient, ShortlinkRequest,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Email sender that keeps every message instead of delivering it
#[derive(Clone, Debug, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingEmailSender {
    /// New sender with nothing recorded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Make every following send fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }
}

impl EmailSender for RecordingEmailSender {
    fn send(&self, message: EmailMessage) -> CollaboratorFuture<()> {
        let failing = self.failing.lock().map(|flag| *flag).unwrap_or(false);
        let sent = Arc::clone(&self.sent);

        Box::pin(async move {
            if failing {
                return Err(CollaboratorError::RequestFailed("email endpoint unavailable".to_string()));
            }
            if let Ok(mut sent) = sent.lock() {
                sent.push(message);
            }
            Ok(())
        })
    }
}

/// Shortlink service that keeps links in memory and serves fixed analytics
#[derive(Clone, Debug)]
pub struct InMemoryShortlinks {
    base_url: String,
    links: Arc<Mutex<HashMap<String, ShortlinkRequest>>>,
    clicks: Arc<Mutex<HashMap<String, ShortlinkAnalytics>>>,
}

impl InMemoryShortlinks {
    /// Links are issued under `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            links: Arc::new(Mutex::new(HashMap::new())),
            clicks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Destination of `short_id`, if created
    #[must_use]
    pub fn destination(&self, short_id: &str) -> Option<String> {
        self.links
            .lock()
            .ok()
            .and_then(|links| links.get(short_id).map(|r| r.destination_path.clone()))
    }

    /// Set the analytics served for `short_id`
    pub fn set_analytics(&self, short_id: impl Into<String>, analytics: ShortlinkAnalytics) {
        if let Ok(mut clicks) = self.clicks.lock() {
            clicks.insert(short_id.into(), analytics);
        }
    }
}

impl ShortlinkClient for InMemoryShortlinks {
    fn create(&self, request: ShortlinkRequest) -> CollaboratorFuture<Shortlink> {
        let links = Arc::clone(&self.links);
        let base_url = self.base_url.clone();

        Box::pin(async move {
            let mut links = links
                .lock()
                .map_err(|e| CollaboratorError::RequestFailed(e.to_string()))?;

            let short_id = match &request.custom_short_id {
                Some(id) if links.contains_key(id) => {
                    return Err(CollaboratorError::ShortIdTaken(id.clone()));
                },
                Some(id) => id.clone(),
                None => uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect(),
            };

            links.insert(short_id.clone(), request);
            Ok(Shortlink {
                short_url: format!("{}/{short_id}", base_url.trim_end_matches('/')),
                short_id,
            })
        })
    }
}

impl AnalyticsClient for InMemoryShortlinks {
    fn analytics(&self, short_id: String) -> CollaboratorFuture<ShortlinkAnalytics> {
        let analytics = self
            .clicks
            .lock()
            .ok()
            .and_then(|clicks| clicks.get(&short_id).cloned())
            .unwrap_or_default();

        Box::pin(async move { Ok(analytics) })
    }
}
