//! The tribe store.
//!
//! [`TribeStore`] owns the tribe document. Every mutation is applied to the
//! local document first, persisted, and then handed to the [`Outbox`] for an
//! optimistic push; the caller never waits for the network except when
//! connecting.
//!
//! Remote state is read once, on connect. After that the local document is
//! the source of truth and nothing fetched is merged back in.

use crate::clock::{Clock, SystemClock};
use crate::config::TribeConfig;
use crate::document::{
    apply_member_defaults, demo_members, is_offline_url, TribeDocument, CONNECT_ERROR_MESSAGE,
};
use crate::error::{Error, Result};
use crate::outbox::{Delivery, Outbox, SkipReason};
use crate::remote::{DeleteRequest, HabitPush, HttpRemote, OutboundUpdate, Remote};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};
use totem_core::{
    local_hour, monthly_report, tribe_fund, tribe_mood, DayKey, Member, MemberId, MonthKey,
    MonthlyReport, Mood, Settings, HABITS_PER_DAY, STREAK_LOOKBACK_DAYS,
};

/// Chance that a simulated habit is marked done.
const SIMULATED_COMPLETION_RATE: f64 = 0.8;

struct Inner {
    state: Arc<watch::Sender<TribeDocument>>,
    storage: Storage,
    remote: Arc<dyn Remote>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
    config: TribeConfig,
}

/// Handle to a tribe document. Clones share the same document.
#[derive(Clone)]
pub struct TribeStore {
    inner: Arc<Inner>,
}

impl TribeStore {
    /// Open the store under `config.data_dir`, talking HTTP to the tribe.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(config: TribeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let storage = Storage::open(&config.data_dir)?;
        let remote = Arc::new(HttpRemote::new(config.http_timeout)?);
        Self::with_parts(config, storage, remote, Arc::new(SystemClock))
    }

    /// Assemble a store from explicit parts.
    pub fn with_parts(
        config: TribeConfig,
        storage: Storage,
        remote: Arc<dyn Remote>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let doc = storage.load_document(config.default_timezone.as_deref())?;
        info!(
            "Loaded tribe document: {} members, connected: {}",
            doc.members.len(),
            doc.is_connected()
        );

        let (state, _) = watch::channel(doc);
        let state = Arc::new(state);
        let outbox = Outbox::spawn(Arc::clone(&remote), Arc::clone(&state), Arc::clone(&clock));

        Ok(Self {
            inner: Arc::new(Inner {
                state,
                storage,
                remote,
                clock,
                outbox,
                config,
            }),
        })
    }

    // --- Observation ---

    /// A copy of the current document.
    pub fn snapshot(&self) -> TribeDocument {
        self.inner.state.borrow().clone()
    }

    /// Watch the document for changes.
    pub fn subscribe(&self) -> watch::Receiver<TribeDocument> {
        self.inner.state.subscribe()
    }

    /// Receive a report for every outbound update from now on.
    pub fn deliveries(&self) -> broadcast::Receiver<Delivery> {
        self.inner.outbox.subscribe()
    }

    pub fn config(&self) -> &TribeConfig {
        &self.inner.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn local_member(&self) -> Option<Member> {
        self.inner.state.borrow().local_member().cloned()
    }

    /// Today's key under the local member's settings, or the configured
    /// defaults when nobody is signed in.
    pub fn today(&self) -> DayKey {
        self.effective_settings().today(self.now())
    }

    /// Wait until no request is in flight.
    pub async fn settled(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|doc| doc.pending_requests == 0).await;
    }

    // --- Connection ---

    /// Connect to the tribe at `url` and load its members.
    ///
    /// An offline URL loads demo members instead of fetching. On failure the
    /// document carries a user-facing error and stays as it was.
    pub async fn connect_tribe(&self, url: &str) -> Result<usize> {
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(totem_core::Error::InvalidInput("tribe URL is empty".into()).into());
        }

        info!("Connecting to tribe at {}", url);
        self.inner.state.send_modify(|doc| {
            doc.error = None;
            doc.begin_request();
        });

        let fetched = if is_offline_url(&url) {
            info!("Offline tribe selected, loading demo members");
            Ok(demo_members(self.today()))
        } else {
            self.inner.remote.fetch(&url).await
        };

        let mut members = match fetched {
            Ok(members) => members,
            Err(e) => {
                error!("Could not connect to tribe at {}: {}", url, e);
                self.inner.state.send_modify(|doc| {
                    doc.error = Some(CONNECT_ERROR_MESSAGE.to_string());
                    doc.settle_request();
                });
                return Err(match e {
                    Error::Connect(reason) => Error::Connect(reason),
                    other => Error::Connect(other.to_string()),
                });
            }
        };

        for member in members.values_mut() {
            apply_member_defaults(member, self.inner.config.default_timezone.as_deref());
        }

        let synced_at = self.now().timestamp_millis();
        let applied = self.modify(|doc| {
            // Our own record is authoritative; the sheet may lag behind it.
            if let Some(local) = doc.local_member().cloned() {
                members.insert(local.id.clone(), local);
            }
            doc.tribe_url = Some(url.clone());
            doc.members = members;
            doc.last_synced = synced_at;
            self.inner.storage.save_document(doc)?;
            Ok(doc.members.len())
        });
        self.inner.state.send_modify(TribeDocument::settle_request);

        let count = applied?;
        info!("Connected to tribe: {} members", count);
        Ok(count)
    }

    /// Forget the tribe URL. Members and identity are kept.
    pub fn disconnect(&self) -> Result<()> {
        self.modify(|doc| {
            doc.tribe_url = None;
            doc.error = None;
            self.inner.storage.put_meta(&doc.meta())
        })?;
        info!("Disconnected from tribe");
        Ok(())
    }

    // --- Identity ---

    /// Join the tribe as a new member and act as them from now on.
    pub fn create_member(&self, name: &str, habits: [String; HABITS_PER_DAY]) -> Result<MemberId> {
        let mut member = Member::new(name, habits)?;
        apply_member_defaults(&mut member, self.inner.config.default_timezone.as_deref());
        let id = member.id.clone();
        let today = member.today(self.now());

        self.modify(|doc| {
            doc.members.insert(id.clone(), member.clone());
            doc.local_user_id = Some(id.clone());
            self.inner.storage.write_member(&member, &doc.meta())
        })?;

        info!("Created member {} ({})", member.name, id);
        self.push(&member, today);
        Ok(id)
    }

    /// Act as an existing member.
    pub fn select_member(&self, id: &str) -> Result<()> {
        self.modify(|doc| {
            if !doc.members.contains_key(id) {
                return Err(Error::NotFound(format!("member {}", id)));
            }
            doc.local_user_id = Some(id.to_string());
            self.inner.storage.put_meta(&doc.meta())
        })?;
        info!("Signed in as {}", id);
        Ok(())
    }

    /// Stop acting as any member. The member stays in the tribe.
    pub fn sign_out(&self) -> Result<()> {
        self.modify(|doc| {
            doc.local_user_id = None;
            self.inner.storage.put_meta(&doc.meta())
        })
    }

    /// Remove a member locally and ask the sheet to drop them.
    ///
    /// The local removal stands whether or not the request gets through.
    pub fn delete_member(&self, id: &str) -> Result<()> {
        let member = self.modify(|doc| {
            let member = doc
                .members
                .remove(id)
                .ok_or_else(|| Error::NotFound(format!("member {}", id)))?;
            if doc.local_user_id.as_deref() == Some(id) {
                doc.local_user_id = None;
            }
            self.inner.storage.remove_member(id, &doc.meta())?;
            Ok(member)
        })?;

        self.enqueue(OutboundUpdate::Delete(DeleteRequest::new(&member)));
        info!("Deleted member {}", id);
        Ok(())
    }

    // --- Habits ---

    /// Flip one habit of the local member on `date`. Returns the new value.
    pub fn toggle_habit(&self, date: DayKey, index: usize) -> Result<bool> {
        let (done, member) = self.modify_local(|member, _| Ok(member.toggle(date, index)?))?;
        debug!("Habit {} on {} is now {}", index, date, done);
        self.push(&member, date);
        Ok(done)
    }

    /// Rename a base habit of the local member.
    pub fn update_habit_text(&self, index: usize, text: &str) -> Result<()> {
        let (today, member) = self.modify_local(|member, today| {
            member.rename_habit(index, text)?;
            Ok(today)
        })?;
        self.push(&member, today);
        Ok(())
    }

    /// Replace a habit's text on one date only.
    pub fn set_override(&self, date: DayKey, index: usize, text: &str) -> Result<()> {
        let ((), member) =
            self.modify_local(|member, _| Ok(member.set_override(date, index, text)?))?;
        self.push(&member, date);
        Ok(())
    }

    /// Drop a per-date override. Returns whether one existed.
    pub fn clear_override(&self, date: DayKey, index: usize) -> Result<bool> {
        let (removed, member) =
            self.modify_local(|member, _| Ok(member.clear_override(date, index)?))?;
        if removed {
            self.push(&member, date);
        }
        Ok(removed)
    }

    /// Replace the local member's day settings.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let (today, member) = self.modify_local(|member, _| {
            member.settings = settings;
            Ok(member.today(self.now()))
        })?;
        info!(
            "Settings updated: offset {}h, timezone {}",
            member.settings.day_end_offset,
            member.settings.timezone.as_deref().unwrap_or("UTC")
        );
        self.push(&member, today);
        Ok(())
    }

    /// Recompute the local member's visit fund from history.
    ///
    /// Pushes only when the fund changed. Returns whether it did.
    pub fn calculate_penalties(&self) -> Result<bool> {
        let ((changed, today), member) = self.modify_local(|member, today| {
            Ok((member.recompute_visit_fund(today), today))
        })?;
        if changed {
            info!("Visit fund for {} is now {}", member.name, member.visit_fund);
            self.push(&member, today);
        }
        Ok(changed)
    }

    /// Push the local member's row for `date` (today by default).
    pub fn sync(&self, date: Option<DayKey>) -> Result<()> {
        let member = self.local_member().ok_or(Error::NoLocalMember)?;
        let date = date.unwrap_or_else(|| member.today(self.now()));
        self.push(&member, date);
        Ok(())
    }

    /// Fill the `days` days before today with random logs, recompute the
    /// fund and push one row per day, oldest first. Returns the filled days.
    pub fn simulate_history(&self, days: u32) -> Result<Vec<DayKey>> {
        self.simulate_history_with(days, &mut rand::thread_rng())
    }

    fn simulate_history_with(&self, days: u32, rng: &mut impl Rng) -> Result<Vec<DayKey>> {
        if days == 0 || days > STREAK_LOOKBACK_DAYS {
            return Err(totem_core::Error::InvalidInput(format!(
                "can simulate 1 to {} days, not {}",
                STREAK_LOOKBACK_DAYS, days
            ))
            .into());
        }

        let (dates, member) = self.modify_local(|member, today| {
            let mut dates: Vec<DayKey> = (1..=days).filter_map(|i| today.days_before(i)).collect();
            dates.reverse();
            for &date in &dates {
                let log = std::array::from_fn(|_| rng.gen_bool(SIMULATED_COMPLETION_RATE));
                member.history.insert(date, log);
            }
            member.recompute_visit_fund(today);
            Ok(dates)
        })?;

        info!(
            "Simulated {} days for {}, visit fund now {}",
            dates.len(),
            member.name,
            member.visit_fund
        );
        for &date in &dates {
            self.push(&member, date);
        }
        Ok(dates)
    }

    /// Wipe the local member's history and visit fund, keeping habits and settings.
    pub fn reset_progress(&self) -> Result<()> {
        let (today, member) = self.modify_local(|member, today| {
            member.history.clear();
            member.history_funds = None;
            member.visit_fund = 0;
            Ok(today)
        })?;
        info!("Progress reset for {}", member.name);
        self.push(&member, today);
        Ok(())
    }

    // --- Derived views ---

    /// Consecutive complete days of the local member.
    pub fn streak(&self) -> Option<u32> {
        let member = self.local_member()?;
        Some(member.streak(member.today(self.now())))
    }

    /// Mood of the local member's totem today.
    pub fn mood(&self) -> Option<Mood> {
        let member = self.local_member()?;
        Some(Mood::from_completed(member.completed_on(member.today(self.now()))))
    }

    /// Mood of the shared tribe totem.
    pub fn tribe_mood(&self) -> Mood {
        let now = self.now();
        let settings = self.effective_settings();
        let today = settings.today(now);
        let past_noon = local_hour(now, settings.timezone.as_deref()) >= 12;

        let doc = self.inner.state.borrow();
        tribe_mood(doc.members.values(), today, past_noon)
    }

    /// Sum of every member's visit fund.
    pub fn tribe_fund(&self) -> u32 {
        tribe_fund(self.inner.state.borrow().members.values())
    }

    /// Percentage of the configured fund goal reached.
    pub fn fund_progress(&self) -> f64 {
        self.inner.config.fund_goal.progress(self.tribe_fund())
    }

    pub fn monthly_report(&self, month: MonthKey) -> MonthlyReport {
        monthly_report(self.inner.state.borrow().members.values(), month)
    }

    // --- Internals ---

    fn effective_settings(&self) -> Settings {
        match self.local_member() {
            Some(member) => member.settings,
            None => Settings {
                timezone: self.inner.config.default_timezone.clone(),
                ..Settings::default()
            },
        }
    }

    /// Apply `f` to the document atomically. Observers are notified only when
    /// `f` succeeds; on failure the document is restored.
    ///
    /// Storage writes belong inside `f` so they land in the same order as
    /// the state changes they record.
    fn modify<T>(&self, f: impl FnOnce(&mut TribeDocument) -> Result<T>) -> Result<T> {
        let mut outcome = None;
        self.inner.state.send_if_modified(|doc| {
            let before = doc.clone();
            let result = f(doc);
            let modified = result.is_ok();
            if !modified {
                *doc = before;
            }
            outcome = Some(result);
            modified
        });
        match outcome {
            Some(result) => result,
            None => unreachable!("send_if_modified always runs its closure"),
        }
    }

    /// Apply `f` to the local member and persist them. `f` receives the
    /// member's current day.
    fn modify_local<T>(
        &self,
        f: impl FnOnce(&mut Member, DayKey) -> Result<T>,
    ) -> Result<(T, Member)> {
        let now = self.now();
        self.modify(|doc| {
            let member = doc.local_member_mut().ok_or(Error::NoLocalMember)?;
            let today = member.today(now);
            let value = f(member, today)?;
            self.inner.storage.put_member(member)?;
            Ok((value, member.clone()))
        })
    }

    fn push(&self, member: &Member, date: DayKey) {
        self.enqueue(OutboundUpdate::Push(HabitPush::for_member(member, date)));
    }

    fn enqueue(&self, update: OutboundUpdate) {
        let target = {
            let doc = self.inner.state.borrow();
            match doc.tribe_url.as_deref() {
                None => Err(SkipReason::Disconnected),
                Some(url) if is_offline_url(url) => Err(SkipReason::Offline),
                Some(url) => Ok(url.to_string()),
            }
        };
        self.inner.outbox.enqueue(target, update);
    }
}
