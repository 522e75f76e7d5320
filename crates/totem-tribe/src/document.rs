//! The tribe document held by the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use totem_core::{DayKey, Member, MemberId, EMPTY_DAY, HABITS_PER_DAY};

/// URLs containing this marker run fully offline with demo members.
pub const OFFLINE_SENTINEL: &str = "mock";

/// Current layout of the persisted document.
pub const SCHEMA_VERSION: u32 = 2;

/// Message shown when the initial fetch fails.
pub const CONNECT_ERROR_MESSAGE: &str = "Could not connect to Tribe. Check URL.";

/// Whether `url` selects offline mode.
pub fn is_offline_url(url: &str) -> bool {
    url.contains(OFFLINE_SENTINEL)
}

/// Everything the client knows about its tribe.
///
/// Only `tribe_url`, `members`, `local_user_id` and `last_synced` are
/// persisted; the rest describes the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TribeDocument {
    pub tribe_url: Option<String>,
    pub members: BTreeMap<MemberId, Member>,
    pub local_user_id: Option<MemberId>,
    /// Milliseconds since the epoch of the last fetch or dispatched push
    pub last_synced: i64,
    pub is_loading: bool,
    /// Requests started but not yet settled
    pub pending_requests: u32,
    pub error: Option<String>,
}

impl TribeDocument {
    pub fn is_connected(&self) -> bool {
        self.tribe_url.is_some()
    }

    pub fn is_offline(&self) -> bool {
        self.tribe_url.as_deref().is_some_and(is_offline_url)
    }

    /// The member this client acts as.
    pub fn local_member(&self) -> Option<&Member> {
        self.local_user_id
            .as_ref()
            .and_then(|id| self.members.get(id))
    }

    pub(crate) fn local_member_mut(&mut self) -> Option<&mut Member> {
        let id = self.local_user_id.as_ref()?;
        self.members.get_mut(id)
    }

    /// Mark one more request in flight.
    pub(crate) fn begin_request(&mut self) {
        self.pending_requests += 1;
        self.is_loading = true;
    }

    /// Mark one request settled. Loading clears only once nothing is in flight.
    pub(crate) fn settle_request(&mut self) {
        self.pending_requests = self.pending_requests.saturating_sub(1);
        self.is_loading = self.pending_requests > 0;
    }

    pub(crate) fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            schema_version: SCHEMA_VERSION,
            tribe_url: self.tribe_url.clone(),
            local_user_id: self.local_user_id.clone(),
            last_synced: self.last_synced,
        }
    }
}

/// Persisted document fields other than the members themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    /// Documents written before versioning carry no field and load as 1
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub tribe_url: Option<String>,
    #[serde(default)]
    pub local_user_id: Option<MemberId>,
    #[serde(default)]
    pub last_synced: i64,
}

fn legacy_schema_version() -> u32 {
    1
}

/// Give members without a timezone the configured default.
pub(crate) fn apply_member_defaults(member: &mut Member, default_timezone: Option<&str>) {
    if member.settings.timezone.is_none() {
        member.settings.timezone = default_timezone.map(str::to_string);
    }
}

fn demo_habits() -> [String; HABITS_PER_DAY] {
    std::array::from_fn(|i| format!("Habit {}", i + 1))
}

/// Two example members for offline mode.
pub fn demo_members(today: DayKey) -> BTreeMap<MemberId, Member> {
    let mut alice = Member::with_id("member-1", "Alice", demo_habits());
    alice.history.insert(today, [true, true, false, false, false]);
    alice.visit_fund = 150;

    let mut bob = Member::with_id("member-2", "Bob", demo_habits());
    bob.history.insert(today, EMPTY_DAY);
    bob.visit_fund = 300;

    [alice, bob]
        .into_iter()
        .map(|m| (m.id.clone(), m))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_clears_only_when_all_requests_settle() {
        let mut doc = TribeDocument::default();
        doc.begin_request();
        doc.begin_request();
        doc.settle_request();
        assert!(doc.is_loading);
        assert_eq!(doc.pending_requests, 1);
        doc.settle_request();
        assert!(!doc.is_loading);

        // Stray settles never underflow.
        doc.settle_request();
        assert_eq!(doc.pending_requests, 0);
    }

    #[test]
    fn offline_detection() {
        let mut doc = TribeDocument::default();
        assert!(!doc.is_connected());
        assert!(!doc.is_offline());

        doc.tribe_url = Some("https://script.example.com/exec".into());
        assert!(doc.is_connected());
        assert!(!doc.is_offline());

        doc.tribe_url = Some("mock://tribe".into());
        assert!(doc.is_offline());
    }

    #[test]
    fn demo_members_are_stable() {
        let today: DayKey = "2024-05-01".parse().unwrap();
        let members = demo_members(today);
        assert_eq!(members.len(), 2);
        assert_eq!(members["member-1"].name, "Alice");
        assert_eq!(members["member-1"].completed_on(today), 2);
        assert_eq!(members["member-2"].visit_fund, 300);
        assert_eq!(members["member-2"].habits[4].text, "Habit 5");
    }

    #[test]
    fn legacy_meta_loads_as_version_one() {
        let meta: DocumentMeta =
            serde_json::from_str(r#"{"tribeUrl": "mock", "localUserId": null, "lastSynced": 5}"#)
                .unwrap();
        assert_eq!(meta.schema_version, 1);
        assert_eq!(meta.last_synced, 5);
    }

    #[test]
    fn defaults_fill_missing_timezone_only() {
        let mut member = Member::with_id("a", "A", std::array::from_fn(|i| i.to_string()));
        apply_member_defaults(&mut member, Some("Asia/Kolkata"));
        assert_eq!(member.settings.timezone.as_deref(), Some("Asia/Kolkata"));

        apply_member_defaults(&mut member, Some("Europe/Paris"));
        assert_eq!(member.settings.timezone.as_deref(), Some("Asia/Kolkata"));
    }
}
