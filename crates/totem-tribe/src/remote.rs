//! Tribe endpoint client.
//!
//! The endpoint is a spreadsheet script with two verbs:
//!
//! - `GET <url>` returns `{ "status": "success", "data": { <id>: Member } }`
//! - `POST <url>` appends or updates a row (or deletes a member) and its
//!   response cannot be read, so a dispatched request is all we ever know.
//!
//! The sheet stores completion inverted: `0` for a done habit and `1` for a
//! missed one.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use totem_core::{DayKey, DayLog, Member, MemberId, Settings, HABITS_PER_DAY};

/// Response envelope of the tribe endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub status: String,
    #[serde(default)]
    pub data: Option<BTreeMap<MemberId, Member>>,
}

impl Envelope {
    /// Unwrap the member map, rejecting any status other than `success`.
    pub fn into_members(self) -> Result<BTreeMap<MemberId, Member>> {
        if self.status != "success" {
            return Err(Error::Connect(format!(
                "unexpected response status {:?}",
                self.status
            )));
        }
        Ok(self.data.unwrap_or_default())
    }
}

/// Encode a day log the way the sheet expects (done = 0, missed = 1).
pub fn encode_log(log: &DayLog) -> [u8; HABITS_PER_DAY] {
    log.map(|done| if done { 0 } else { 1 })
}

/// One day's row for one member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitPush {
    pub user_name: String,
    pub user_id: MemberId,
    pub date: DayKey,
    pub habits: [u8; HABITS_PER_DAY],
    pub habit_names: [String; HABITS_PER_DAY],
    pub visit_fund: u32,
    pub settings: Settings,
}

impl HabitPush {
    /// Build the row for `date`, with that day's effective habit names.
    pub fn for_member(member: &Member, date: DayKey) -> Self {
        Self {
            user_name: member.name.clone(),
            user_id: member.id.clone(),
            date,
            habits: encode_log(&member.log(date)),
            habit_names: member.habit_texts_on(date),
            visit_fund: member.visit_fund,
            settings: member.settings.clone(),
        }
    }
}

/// Removal of a member from the sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub action: &'static str,
    pub user_id: MemberId,
    pub user_name: String,
}

impl DeleteRequest {
    pub fn new(member: &Member) -> Self {
        Self {
            action: "DELETE",
            user_id: member.id.clone(),
            user_name: member.name.clone(),
        }
    }
}

/// A write bound for the tribe endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundUpdate {
    Push(HabitPush),
    Delete(DeleteRequest),
}

impl OutboundUpdate {
    pub fn user_id(&self) -> &str {
        match self {
            OutboundUpdate::Push(push) => &push.user_id,
            OutboundUpdate::Delete(delete) => &delete.user_id,
        }
    }
}

/// The tribe endpoint as seen by the store.
pub trait Remote: Send + Sync + 'static {
    /// Fetch every member of the tribe at `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<BTreeMap<MemberId, Member>>>;

    /// Dispatch one update. `Ok` means the request left; acceptance is unknowable.
    fn send<'a>(&'a self, url: &'a str, update: &'a OutboundUpdate) -> BoxFuture<'a, Result<()>>;
}

/// HTTP client for a tribe endpoint.
pub struct HttpRemote {
    client: Client,
}

impl HttpRemote {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Remote for HttpRemote {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<BTreeMap<MemberId, Member>>> {
        Box::pin(async move {
            let body = self.client.get(url).send().await?.bytes().await?;
            let envelope: Envelope = serde_json::from_slice(&body)?;
            envelope.into_members()
        })
    }

    fn send<'a>(&'a self, url: &'a str, update: &'a OutboundUpdate) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Plain text keeps the script endpoint free of CORS preflights.
            let body = serde_json::to_string(update)?;
            self.client
                .post(url)
                .header(header::CONTENT_TYPE, "text/plain;charset=utf-8")
                .body(body)
                .send()
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ada() -> Member {
        Member::with_id(
            "ada-1",
            "Ada",
            ["Read", "Run", "Meditate", "Journal", "Sleep"].map(String::from),
        )
    }

    #[test]
    fn log_encoding_is_inverted() {
        assert_eq!(encode_log(&[true, false, true, false, false]), [0, 1, 0, 1, 1]);
    }

    #[test]
    fn push_payload_shape() {
        let mut member = ada();
        let date: DayKey = "2024-05-01".parse().unwrap();
        member.toggle(date, 0).unwrap();
        member.set_override(date, 2, "Yoga").unwrap();
        member.visit_fund = 30;

        member.settings.timezone = Some("Asia/Kolkata".into());

        let update = OutboundUpdate::Push(HabitPush::for_member(&member, date));
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({
                "userName": "Ada",
                "userId": "ada-1",
                "date": "2024-05-01",
                "habits": [0, 1, 1, 1, 1],
                "habitNames": ["Read", "Run", "Yoga", "Journal", "Sleep"],
                "visitFund": 30,
                "settings": { "dayEndOffset": 0, "timezone": "Asia/Kolkata" }
            })
        );
    }

    #[test]
    fn delete_payload_shape() {
        let update = OutboundUpdate::Delete(DeleteRequest::new(&ada()));
        assert_eq!(update.user_id(), "ada-1");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "action": "DELETE", "userId": "ada-1", "userName": "Ada" })
        );
    }

    #[test]
    fn envelope_status_gate() {
        let ok: Envelope = serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        assert!(ok.into_members().unwrap().is_empty());

        let bad: Envelope = serde_json::from_str(r#"{"status": "error", "data": {}}"#).unwrap();
        assert!(matches!(bad.into_members(), Err(Error::Connect(_))));

        assert!(serde_json::from_str::<Envelope>(r#"{"data": {}}"#).is_err());
    }
}
