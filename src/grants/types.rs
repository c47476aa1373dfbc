//! Types for access requests.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access request lifecycle.
///
/// ```text
/// sent ──▶ approved ──▶ expired (time-driven, lazy)
///   │          └──────▶ revoked (patient-initiated)
///   └────▶ denied
/// ```
///
/// `denied`, `expired`, and `revoked` are terminal; no transition reopens
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Sent,
    Approved,
    Denied,
    Expired,
    Revoked,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Sent | RequestStatus::Approved)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RequestStatus::Sent => "sent",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Expired => "expired",
            RequestStatus::Revoked => "revoked",
        };
        f.write_str(label)
    }
}

/// Patient's answer to a sent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Denied,
}

/// Allowed grant durations, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum GrantDuration {
    Days1,
    Days3,
    Days7,
    Days14,
    Days30,
}

impl GrantDuration {
    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            1 => Some(GrantDuration::Days1),
            3 => Some(GrantDuration::Days3),
            7 => Some(GrantDuration::Days7),
            14 => Some(GrantDuration::Days14),
            30 => Some(GrantDuration::Days30),
            _ => None,
        }
    }

    pub fn as_days(self) -> u32 {
        match self {
            GrantDuration::Days1 => 1,
            GrantDuration::Days3 => 3,
            GrantDuration::Days7 => 7,
            GrantDuration::Days14 => 14,
            GrantDuration::Days30 => 30,
        }
    }

    pub fn as_secs(self) -> i64 {
        i64::from(self.as_days()) * 24 * 60 * 60
    }
}

impl TryFrom<u32> for GrantDuration {
    type Error = String;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        GrantDuration::from_days(days)
            .ok_or_else(|| format!("duration must be one of 1, 3, 7, 14, 30 days, got {}", days))
    }
}

impl From<GrantDuration> for u32 {
    fn from(duration: GrantDuration) -> u32 {
        duration.as_days()
    }
}

/// A time-boxed grant proposal from a clinician to a patient for a defined
/// set of records. Jointly referenced by both wallets, owned by neither; it
/// is an independent ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: Uuid,
    pub doctor_wallet: String,
    pub patient_wallet: String,
    /// Deduplicated, in creation order.
    pub record_ids: Vec<Uuid>,
    /// Titles captured at creation, parallel to `record_ids`. Never
    /// re-derived: later renames or deletions must not alter history.
    pub document_names: Vec<String>,
    pub purpose: String,
    pub status: RequestStatus,
    pub sent_at: i64,
    pub expires_at: i64,
    pub responded_at: Option<i64>,
    pub idempotency_key: Option<String>,
}

impl AccessRequest {
    /// The deadline instant itself already counts as expired.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Status as authorization must see it: an approved request past its
    /// deadline reads as expired even before any write lands.
    pub fn effective_status(&self, now: i64) -> RequestStatus {
        match self.status {
            RequestStatus::Approved if self.is_expired(now) => RequestStatus::Expired,
            status => status,
        }
    }

    /// Read-only authorization check for one record.
    pub fn permits(&self, record_id: Uuid, now: i64) -> bool {
        self.effective_status(now) == RequestStatus::Approved && self.record_ids.contains(&record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status: RequestStatus, expires_at: i64) -> AccessRequest {
        AccessRequest {
            id: Uuid::new_v4(),
            doctor_wallet: "0xdoc".to_string(),
            patient_wallet: "0xpat".to_string(),
            record_ids: vec![Uuid::nil()],
            document_names: vec!["chart".to_string()],
            purpose: "need for diagnosis".to_string(),
            status,
            sent_at: 0,
            expires_at,
            responded_at: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_duration_whitelist() {
        for days in [1u32, 3, 7, 14, 30] {
            assert_eq!(GrantDuration::from_days(days).unwrap().as_days(), days);
        }
        for days in [0u32, 2, 5, 15, 31, 365] {
            assert!(GrantDuration::from_days(days).is_none());
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RequestStatus::Sent.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Denied.is_terminal());
        assert!(RequestStatus::Expired.is_terminal());
        assert!(RequestStatus::Revoked.is_terminal());
    }

    #[test]
    fn test_lazy_expiry_boundary() {
        let approved = request(RequestStatus::Approved, 1000);
        assert_eq!(approved.effective_status(999), RequestStatus::Approved);
        // Closed interval excludes the boundary instant.
        assert_eq!(approved.effective_status(1000), RequestStatus::Expired);
        assert_eq!(approved.effective_status(1001), RequestStatus::Expired);
    }

    #[test]
    fn test_permits_requires_membership_and_time() {
        let req = request(RequestStatus::Approved, 1000);
        let member = req.record_ids[0];
        assert!(req.permits(member, 999));
        assert!(!req.permits(member, 1000));
        assert!(!req.permits(member, 1001));
        assert!(!req.permits(Uuid::new_v4(), 999));

        let sent = request(RequestStatus::Sent, 1000);
        assert!(!sent.permits(member, 999));
    }
}
