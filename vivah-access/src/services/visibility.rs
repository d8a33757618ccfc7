use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use vivah_shared::errors::AppResult;
use vivah_shared::types::auth::{AuthUser, SubscriptionTier};

use crate::clock::Clock;
use crate::models::{AudienceTier, PrivacySettings, ProfileVisibility, RelationshipState};
use crate::services::audit::{AuditEventType, AuditLog};
use crate::store::{AccessStore, StoreExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Allow,
    Deny,
    Blurred,
}

impl AccessDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessDecision::Allow => "allow",
            AccessDecision::Deny => "deny",
            AccessDecision::Blurred => "blurred",
        }
    }

    /// Whether any form of the data (including a blurred rendition) may be served.
    pub fn permits_view(&self) -> bool {
        !matches!(self, AccessDecision::Deny)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Profile,
    Photo,
    Contact,
}

impl DataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::Profile => "profile",
            DataCategory::Photo => "photo",
            DataCategory::Contact => "contact",
        }
    }
}

/// The party asking to see data, as vouched for by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub tier: SubscriptionTier,
}

impl Viewer {
    pub fn new(id: Uuid, tier: SubscriptionTier) -> Self {
        Self { id, tier }
    }
}

impl From<&AuthUser> for Viewer {
    fn from(user: &AuthUser) -> Self {
        Self { id: user.id, tier: user.subscription_tier }
    }
}

/// Everything a decision depends on besides the subject's settings.
#[derive(Debug, Clone, Copy)]
pub struct ViewerContext {
    pub premium: bool,
    /// Viewer has a profile of their own on the platform.
    pub registered: bool,
    pub relationship: RelationshipState,
}

// --- Decision tables ---
//
// An accepted interest is checked first in every table: it grants the widest access the
// subject defines for the category.

pub fn decide_profile(tier: ProfileVisibility, ctx: &ViewerContext) -> AccessDecision {
    if ctx.relationship.is_accepted() {
        return AccessDecision::Allow;
    }
    let allowed = match tier {
        ProfileVisibility::Public => true,
        ProfileVisibility::Community => ctx.premium || ctx.registered,
        ProfileVisibility::Premium => ctx.premium,
        ProfileVisibility::Private => false,
    };
    if allowed { AccessDecision::Allow } else { AccessDecision::Deny }
}

fn decide_audience(tier: AudienceTier, ctx: &ViewerContext) -> AccessDecision {
    if ctx.relationship.is_accepted() {
        return AccessDecision::Allow;
    }
    match tier {
        AudienceTier::All => AccessDecision::Allow,
        AudienceTier::Premium if ctx.premium => AccessDecision::Allow,
        AudienceTier::Premium | AudienceTier::Private => AccessDecision::Deny,
    }
}

pub fn decide_photo(tier: AudienceTier, blur_for_free: bool, ctx: &ViewerContext) -> AccessDecision {
    if tier == AudienceTier::All && blur_for_free && !ctx.premium && !ctx.relationship.is_accepted() {
        return AccessDecision::Blurred;
    }
    decide_audience(tier, ctx)
}

/// `private` contact details open only to an accepted interest; no subscription unlocks them.
pub fn decide_contact(tier: AudienceTier, ctx: &ViewerContext) -> AccessDecision {
    decide_audience(tier, ctx)
}

pub fn decide(category: DataCategory, settings: &PrivacySettings, ctx: &ViewerContext) -> AccessDecision {
    match category {
        DataCategory::Profile => decide_profile(settings.visibility, ctx),
        DataCategory::Photo => decide_photo(settings.photo_visibility, settings.blur_photos_for_free, ctx),
        DataCategory::Contact => decide_contact(settings.contact_visibility, ctx),
    }
}

/// Decisions for all three categories of one subject.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileAccess {
    pub subject_id: Uuid,
    pub relationship: RelationshipState,
    pub profile: AccessDecision,
    pub photo: AccessDecision,
    pub contact: AccessDecision,
}

pub struct VisibilityResolver {
    store: Arc<dyn AccessStore>,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
}

impl VisibilityResolver {
    pub fn new(store: Arc<dyn AccessStore>, clock: Arc<dyn Clock>, audit: AuditLog) -> Self {
        Self { store, clock, audit }
    }

    /// Load the subject's settings and the viewer's standing in one read. A subject without a
    /// profile row is evaluated against the default settings.
    fn load(&self, viewer: &Viewer, subject_id: Uuid) -> AppResult<(PrivacySettings, ViewerContext)> {
        self.store.transaction(|tx| {
            let settings = tx.privacy_settings(subject_id)?.unwrap_or_default();
            let registered = tx.privacy_settings(viewer.id)?.is_some();
            let history = tx.interests_between(viewer.id, subject_id)?;
            Ok((
                settings,
                ViewerContext {
                    premium: viewer.tier.is_premium(),
                    registered,
                    relationship: RelationshipState::from_interests(&history),
                },
            ))
        })
    }

    pub async fn resolve(
        &self,
        viewer: &Viewer,
        subject_id: Uuid,
        category: DataCategory,
    ) -> AppResult<AccessDecision> {
        if viewer.id == subject_id {
            return Ok(AccessDecision::Allow);
        }

        let (settings, ctx) = self.load(viewer, subject_id)?;
        let decision = decide(category, &settings, &ctx);

        self.record(viewer, subject_id, &[(category, decision)], ctx.relationship).await;
        Ok(decision)
    }

    pub async fn resolve_all(&self, viewer: &Viewer, subject_id: Uuid) -> AppResult<ProfileAccess> {
        if viewer.id == subject_id {
            return Ok(ProfileAccess {
                subject_id,
                relationship: RelationshipState::None,
                profile: AccessDecision::Allow,
                photo: AccessDecision::Allow,
                contact: AccessDecision::Allow,
            });
        }

        let (settings, ctx) = self.load(viewer, subject_id)?;
        let access = ProfileAccess {
            subject_id,
            relationship: ctx.relationship,
            profile: decide(DataCategory::Profile, &settings, &ctx),
            photo: decide(DataCategory::Photo, &settings, &ctx),
            contact: decide(DataCategory::Contact, &settings, &ctx),
        };

        self.record(
            viewer,
            subject_id,
            &[
                (DataCategory::Profile, access.profile),
                (DataCategory::Photo, access.photo),
                (DataCategory::Contact, access.contact),
            ],
            ctx.relationship,
        )
        .await;
        Ok(access)
    }

    async fn record(
        &self,
        viewer: &Viewer,
        subject_id: Uuid,
        decisions: &[(DataCategory, AccessDecision)],
        relationship: RelationshipState,
    ) {
        for (category, decision) in decisions {
            counter!(
                "visibility_decisions_total",
                "category" => category.as_str(),
                "outcome" => decision.as_str()
            )
            .increment(1);
            tracing::debug!(
                viewer_id = %viewer.id,
                subject_id = %subject_id,
                category = category.as_str(),
                decision = decision.as_str(),
                "visibility decided"
            );
        }

        let decided: serde_json::Map<String, serde_json::Value> = decisions
            .iter()
            .map(|(c, d)| (c.as_str().to_string(), serde_json::Value::from(d.as_str())))
            .collect();
        self.audit
            .emit(
                viewer.id,
                AuditEventType::VisibilityDecided,
                serde_json::json!({
                    "subject_id": subject_id,
                    "viewer_tier": viewer.tier,
                    "relationship": relationship,
                    "decisions": decided,
                }),
            )
            .await;
    }

    pub fn get_privacy(&self, user_id: Uuid) -> AppResult<PrivacySettings> {
        let settings = self.store.transaction(|tx| tx.privacy_settings(user_id))?;
        Ok(settings.unwrap_or_default())
    }

    pub async fn update_privacy(&self, user_id: Uuid, settings: PrivacySettings) -> AppResult<PrivacySettings> {
        let now = self.clock.now();
        self.store
            .transaction(|tx| tx.upsert_privacy_settings(user_id, &settings, now))?;

        tracing::info!(
            user_id = %user_id,
            visibility = settings.visibility.as_str(),
            photo_visibility = settings.photo_visibility.as_str(),
            contact_visibility = settings.contact_visibility.as_str(),
            "privacy settings updated"
        );
        self.audit
            .emit(user_id, AuditEventType::PrivacyUpdated, serde_json::json!(&settings))
            .await;

        Ok(settings)
    }
}
