use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Interest ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestStatus {
    Pending,
    Accepted,
    Rejected,
    Revoked,
}

/// Who may drive a transition, and what they ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterestAction {
    /// Receiver accepts.
    Accept,
    /// Receiver declines.
    Reject,
    /// Sender withdraws before the receiver responds.
    Revoke,
}

impl InterestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestStatus::Pending => "pending",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
            InterestStatus::Revoked => "revoked",
        }
    }

    /// Pending and accepted interests block a new interest between the same pair.
    pub fn is_active(&self) -> bool {
        matches!(self, InterestStatus::Pending | InterestStatus::Accepted)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InterestStatus::Pending)
    }

    /// The full transition table. Anything not listed here is refused.
    pub fn apply(self, action: InterestAction) -> Option<InterestStatus> {
        match (self, action) {
            (InterestStatus::Pending, InterestAction::Accept) => Some(InterestStatus::Accepted),
            (InterestStatus::Pending, InterestAction::Reject) => Some(InterestStatus::Rejected),
            (InterestStatus::Pending, InterestAction::Revoke) => Some(InterestStatus::Revoked),
            _ => None,
        }
    }
}

impl std::fmt::Display for InterestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InterestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InterestStatus::Pending),
            "accepted" => Ok(InterestStatus::Accepted),
            "rejected" => Ok(InterestStatus::Rejected),
            "revoked" => Ok(InterestStatus::Revoked),
            _ => Err(format!("unknown interest status: {s}")),
        }
    }
}

impl std::fmt::Display for InterestAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterestAction::Accept => f.write_str("accept"),
            InterestAction::Reject => f.write_str("reject"),
            InterestAction::Revoke => f.write_str("revoke"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: InterestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Interest {
    pub fn new_pending(sender_id: Uuid, receiver_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender_id,
            receiver_id,
            status: InterestStatus::Pending,
            created_at: now,
            responded_at: None,
        }
    }

    pub fn involves(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Listing filter for interests; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct InterestFilter {
    pub sender_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub status: Option<InterestStatus>,
}

impl InterestFilter {
    pub fn matches(&self, interest: &Interest) -> bool {
        self.sender_id.map_or(true, |id| interest.sender_id == id)
            && self.receiver_id.map_or(true, |id| interest.receiver_id == id)
            && self.status.map_or(true, |s| interest.status == s)
    }
}

/// Relationship between two users as seen by the visibility resolver, derived from every
/// interest between them in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipState {
    None,
    Pending,
    Accepted,
    Rejected,
    Revoked,
}

impl RelationshipState {
    /// Accepted wins over anything else; otherwise an open proposal; otherwise the most recent
    /// terminal outcome. `interests` must be ordered newest first.
    pub fn from_interests(interests: &[Interest]) -> Self {
        if interests.iter().any(|i| i.status == InterestStatus::Accepted) {
            return RelationshipState::Accepted;
        }
        if interests.iter().any(|i| i.status == InterestStatus::Pending) {
            return RelationshipState::Pending;
        }
        match interests.first().map(|i| i.status) {
            Some(InterestStatus::Rejected) => RelationshipState::Rejected,
            Some(InterestStatus::Revoked) => RelationshipState::Revoked,
            _ => RelationshipState::None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RelationshipState::Accepted)
    }
}

// --- Privacy ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    Public,
    #[default]
    Community,
    Premium,
    Private,
}

/// Shared shape of the photo and contact tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceTier {
    All,
    Premium,
    Private,
}

macro_rules! str_enum {
    ($ty:ty { $($variant:path => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self { $($variant => $s),+ }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($variant),)+
                    _ => Err(format!("unknown {}: {s}", stringify!($ty))),
                }
            }
        }
    };
}

str_enum!(ProfileVisibility {
    ProfileVisibility::Public => "public",
    ProfileVisibility::Community => "community",
    ProfileVisibility::Premium => "premium",
    ProfileVisibility::Private => "private",
});

str_enum!(AudienceTier {
    AudienceTier::All => "all",
    AudienceTier::Premium => "premium",
    AudienceTier::Private => "private",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    #[serde(default)]
    pub visibility: ProfileVisibility,
    #[serde(default = "default_photo_visibility")]
    pub photo_visibility: AudienceTier,
    #[serde(default = "default_contact_visibility")]
    pub contact_visibility: AudienceTier,
    /// Serve photos blurred to free viewers even when the photo tier is `all`.
    #[serde(default)]
    pub blur_photos_for_free: bool,
}

fn default_photo_visibility() -> AudienceTier { AudienceTier::All }
fn default_contact_visibility() -> AudienceTier { AudienceTier::Premium }

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            visibility: ProfileVisibility::default(),
            photo_visibility: default_photo_visibility(),
            contact_visibility: default_contact_visibility(),
            blur_photos_for_free: false,
        }
    }
}

// --- Photo ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub url: String,
    pub is_primary: bool,
    pub is_approved: bool,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub original_byte_size: u64,
    pub compression_ratio: f64,
    pub created_at: DateTime<Utc>,
}

// --- Message ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
