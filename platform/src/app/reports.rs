//! Read-side operations: sales summaries, the audit trail and shortlinks.

use super::documents::Documents;
use crate::audit::{AuditEntry, AuditFilter};
use crate::collaborators::{AnalyticsClient, Shortlink, ShortlinkAnalytics, ShortlinkClient, ShortlinkRequest};
use crate::error::{NaksError, Result, ValidationErrors};
use crate::permissions;
use crate::sales::SalesSummary;
use crate::types::{Actor, EventId, UserId, UserProfile};
use std::sync::Arc;

/// Sales and audit reporting
pub struct ReportService {
    documents: Documents,
}

impl ReportService {
    /// Create a new report service
    #[must_use]
    pub const fn new(documents: Documents) -> Self {
        Self { documents }
    }

    /// Totals over every order placed for `organizer_id`'s events.
    ///
    /// Orders are read leniently: a malformed order contributes what can be
    /// read from it and never fails the summary.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless the caller is that organizer or an admin.
    pub async fn sales_summary(&self, actor: &Actor, organizer_id: &UserId) -> Result<SalesSummary> {
        let viewer = self.documents.actor(actor).await?;
        permissions::ensure_active(&viewer)?;
        if !permissions::can_view_sales(&viewer, organizer_id) {
            return Err(NaksError::PermissionDenied(format!(
                "{} cannot view sales of {organizer_id}",
                viewer.id
            )));
        }

        let orders: Vec<serde_json::Value> = self
            .documents
            .list_raw(&self.documents.collections().orders)
            .await?
            .into_iter()
            .map(|(_, body)| body)
            .filter(|body| body.get("organizerId").and_then(serde_json::Value::as_str) == Some(organizer_id.as_str()))
            .collect();

        let summary = SalesSummary::from_documents(&orders);
        tracing::debug!(
            %organizer_id,
            orders = summary.total_orders,
            revenue = %summary.total_revenue,
            "Sales summary computed"
        );
        Ok(summary)
    }

    /// Audit entries matching `filter`, newest first. Admins only.
    ///
    /// Entries that no longer decode are skipped with a warning.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` for non-admins.
    pub async fn audit_trail(&self, actor: &Actor, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let viewer = self.documents.actor(actor).await?;
        require_admin(&viewer)?;

        let mut entries: Vec<AuditEntry> = self
            .documents
            .list_raw(&self.documents.collections().audit_logs)
            .await?
            .into_iter()
            .filter_map(|(id, body)| match serde_json::from_value::<AuditEntry>(body) {
                Ok(entry) => Some(entry),
                Err(error) => {
                    tracing::warn!(entry = %id, %error, "Skipping malformed audit entry");
                    None
                },
            })
            .filter(|entry| filter.matches(entry))
            .collect();

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}

fn require_admin(viewer: &UserProfile) -> Result<()> {
    permissions::ensure_active(viewer)?;
    if viewer.is_admin() {
        Ok(())
    } else {
        Err(NaksError::PermissionDenied("the audit trail is admin-only".to_string()))
    }
}

/// Longest custom short id accepted
pub const MAX_SHORT_ID_LEN: usize = 32;

/// Shortlinks to event pages and their click analytics
pub struct LinkService {
    documents: Documents,
    shortlinks: Arc<dyn ShortlinkClient>,
    analytics: Arc<dyn AnalyticsClient>,
}

impl LinkService {
    /// Create a new link service
    #[must_use]
    pub fn new(
        documents: Documents,
        shortlinks: Arc<dyn ShortlinkClient>,
        analytics: Arc<dyn AnalyticsClient>,
    ) -> Self {
        Self {
            documents,
            shortlinks,
            analytics,
        }
    }

    /// Create a shortlink to `event_id`'s page.
    ///
    /// # Errors
    ///
    /// - `PermissionDenied`: caller is not an organizer, influencer or admin
    /// - `Validation`: malformed custom short id
    /// - `NotFound`: no such event
    /// - `Collaborator`: the shortlink service failed or the id is taken
    pub async fn create_shortlink(
        &self,
        actor: &Actor,
        event_id: EventId,
        custom_short_id: Option<String>,
        message: Option<String>,
    ) -> Result<Shortlink> {
        self.authorize(actor).await?;
        if let Some(short_id) = &custom_short_id {
            validate_short_id(short_id)?;
        }
        let event = self.documents.event(&event_id).await?.record;

        let mut request = ShortlinkRequest::new(format!("/events/{}", event.id));
        if let Some(short_id) = custom_short_id {
            request = request.with_short_id(short_id);
        }
        if let Some(message) = message {
            request = request.with_message(message);
        }

        let link = self.shortlinks.create(request).await.map_err(|error| {
            tracing::warn!(%event_id, %error, "Shortlink creation failed");
            NaksError::from(error)
        })?;
        tracing::info!(%event_id, short_id = %link.short_id, "Shortlink created");
        Ok(link)
    }

    /// Click analytics of `short_id`.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` as for creation, `Collaborator` when the analytics
    /// service fails.
    pub async fn shortlink_analytics(&self, actor: &Actor, short_id: &str) -> Result<ShortlinkAnalytics> {
        self.authorize(actor).await?;
        Ok(self.analytics.analytics(short_id.to_string()).await?)
    }

    async fn authorize(&self, actor: &Actor) -> Result<()> {
        let caller = self.documents.actor(actor).await?;
        permissions::ensure_active(&caller)?;
        if permissions::can_manage_links(&caller) {
            Ok(())
        } else {
            Err(NaksError::PermissionDenied(format!(
                "role {} cannot manage shortlinks",
                caller.role
            )))
        }
    }
}

fn validate_short_id(short_id: &str) -> Result<()> {
    let mut errors = ValidationErrors::new();
    if short_id.is_empty() || short_id.len() > MAX_SHORT_ID_LEN {
        errors.push("customShortId", format!("must be 1 to {MAX_SHORT_ID_LEN} characters"));
    }
    if !short_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        errors.push("customShortId", "may only contain letters, digits, '-' and '_'");
    }
    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_are_url_safe() {
        assert!(validate_short_id("summer-gig_24").is_ok());
        assert!(validate_short_id("").is_err());
        assert!(validate_short_id("with space").is_err());
        assert!(validate_short_id(&"x".repeat(MAX_SHORT_ID_LEN + 1)).is_err());
    }
}
