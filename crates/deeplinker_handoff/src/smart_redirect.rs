//! Smart redirect coordinator.
//!
//! Tries the app scheme, counts down, and on timeout stores the recovery
//! payload and sends the user to the store. Time is explicit: the caller
//! advances the machine to a unit count and performs the returned effects.
//!
//! ```text
//! t=0  Idle -> Attempting -> Counting(3)
//! t=1  Counting(2), app-scheme attempt
//! t=2  Counting(1)
//! t=3  Counting(0)
//! t=4  Expired -> StoreRedirected (relay write, then store navigation)
//! ```

use std::fmt;

use deeplinker_protocol::{HandoffConfig, Platform, RecoveryPayload, SmartRedirectQuery};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::effect::Effect;
use crate::flow::TimedFlow;
use crate::navigator::{Navigation, NavigationKind};
use crate::timers::TimerQueue;

// ============================================================================
// Config
// ============================================================================

/// Timer constants in time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartRedirectConfig {
    pub countdown_start: u32,
    /// Units from entry until the app-scheme attempt.
    pub app_attempt_delay: u64,
    /// Units from the app-scheme attempt until the store fallback.
    pub store_fallback_delay: u64,
}

impl Default for SmartRedirectConfig {
    fn default() -> Self {
        Self::from(&HandoffConfig::default())
    }
}

impl From<&HandoffConfig> for SmartRedirectConfig {
    fn from(config: &HandoffConfig) -> Self {
        Self {
            countdown_start: config.countdown_start,
            app_attempt_delay: config.app_attempt_delay,
            store_fallback_delay: config.store_fallback_delay,
        }
    }
}

// ============================================================================
// Entry
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid smart redirect entry: missing {}", .missing.join(", "))]
pub struct InvalidSmartRedirectEntry {
    pub missing: Vec<&'static str>,
}

/// Validated entry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartRedirectEntry {
    pub platform: Platform,
    pub app_url: String,
    pub store_url: String,
    pub access_code: Option<String>,
    pub slug: Option<String>,
}

impl SmartRedirectEntry {
    /// `platform`, `appUrl` and `storeUrl` must be present and non-empty;
    /// a platform other than `ios` or `android` counts as missing.
    pub fn from_query(query: &SmartRedirectQuery) -> Result<Self, InvalidSmartRedirectEntry> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        // Only the mobile platforms have a store to fall back to.
        let platform = query
            .platform
            .as_deref()
            .and_then(|raw| raw.parse::<Platform>().ok())
            .filter(|platform| matches!(platform, Platform::Ios | Platform::Android));
        let app_url = non_empty(&query.app_url);
        let store_url = non_empty(&query.store_url);

        match (platform, app_url, store_url) {
            (Some(platform), Some(app_url), Some(store_url)) => Ok(Self {
                platform,
                app_url,
                store_url,
                access_code: non_empty(&query.access_code),
                slug: non_empty(&query.slug),
            }),
            (platform, app_url, store_url) => {
                let mut missing = Vec::new();
                if platform.is_none() {
                    missing.push(SmartRedirectQuery::PLATFORM);
                }
                if app_url.is_none() {
                    missing.push(SmartRedirectQuery::APP_URL);
                }
                if store_url.is_none() {
                    missing.push(SmartRedirectQuery::STORE_URL);
                }
                Err(InvalidSmartRedirectEntry { missing })
            }
        }
    }

    /// Parse the query of a smart-redirect URL, absolute or server-relative.
    pub fn from_url(raw: &str) -> Result<Self, InvalidSmartRedirectEntry> {
        Self::from_query(&query_from_url(raw))
    }
}

/// Decode the smart-redirect parameters from a URL. Unparseable input
/// yields an empty query.
pub fn query_from_url(raw: &str) -> SmartRedirectQuery {
    let parsed = Url::parse("http://localhost/").and_then(|base| base.join(raw));
    match parsed {
        Ok(url) => {
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            SmartRedirectQuery::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }
        Err(err) => {
            debug!("Unparseable smart redirect URL '{}': {}", raw, err);
            SmartRedirectQuery::default()
        }
    }
}

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartRedirectPhase {
    Idle,
    Attempting,
    /// Countdown with this many units remaining.
    Counting(u32),
    Expired,
    AppOpened,
    StoreRedirected,
    Invalid,
}

impl SmartRedirectPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmartRedirectPhase::Idle => "idle",
            SmartRedirectPhase::Attempting => "attempting",
            SmartRedirectPhase::Counting(_) => "counting",
            SmartRedirectPhase::Expired => "expired",
            SmartRedirectPhase::AppOpened => "app_opened",
            SmartRedirectPhase::StoreRedirected => "store_redirected",
            SmartRedirectPhase::Invalid => "invalid",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SmartRedirectPhase::AppOpened
                | SmartRedirectPhase::StoreRedirected
                | SmartRedirectPhase::Invalid
        )
    }

    /// Manual actions are accepted only in these phases.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SmartRedirectPhase::Attempting | SmartRedirectPhase::Counting(_)
        )
    }

    pub fn can_transition_to(&self, target: SmartRedirectPhase) -> bool {
        use SmartRedirectPhase::*;
        match (self, target) {
            (Idle, Attempting | Invalid) => true,
            (Attempting, Counting(_) | AppOpened | StoreRedirected) => true,
            (Counting(n), Counting(m)) => m < *n,
            (Counting(_), Expired | AppOpened | StoreRedirected) => true,
            (Expired, StoreRedirected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SmartRedirectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmartRedirectPhase::Counting(n) => write!(f, "counting({})", n),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub at: u64,
    pub from: SmartRedirectPhase,
    pub to: SmartRedirectPhase,
}

/// Manual actions available while the flow is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartRedirectCommand {
    RetryAppOpen,
    GoToStoreNow,
    /// External signal that the app took over.
    AppOpened,
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmartTimer {
    CountdownTick,
    AppAttempt,
    StoreFallback,
}

#[derive(Debug)]
pub struct SmartRedirectCoordinator {
    config: SmartRedirectConfig,
    now: u64,
    phase: SmartRedirectPhase,
    entry: Option<SmartRedirectEntry>,
    error: Option<InvalidSmartRedirectEntry>,
    timers: TimerQueue<SmartTimer>,
    history: Vec<PhaseChange>,
    torn_down: bool,
}

impl SmartRedirectCoordinator {
    pub fn new(config: SmartRedirectConfig) -> Self {
        Self {
            config,
            now: 0,
            phase: SmartRedirectPhase::Idle,
            entry: None,
            error: None,
            timers: TimerQueue::new(),
            history: Vec::new(),
            torn_down: false,
        }
    }

    pub fn phase(&self) -> SmartRedirectPhase {
        self.phase
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn entry(&self) -> Option<&SmartRedirectEntry> {
        self.entry.as_ref()
    }

    pub fn error(&self) -> Option<&InvalidSmartRedirectEntry> {
        self.error.as_ref()
    }

    pub fn history(&self) -> &[PhaseChange] {
        &self.history
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        match self.phase {
            SmartRedirectPhase::Counting(n) => Some(n),
            _ => None,
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Start the flow at the current time.
    ///
    /// An invalid entry moves to [`SmartRedirectPhase::Invalid`] with no
    /// timers armed. Entering twice is ignored.
    pub fn enter(
        &mut self,
        query: &SmartRedirectQuery,
    ) -> Result<Vec<Effect>, InvalidSmartRedirectEntry> {
        if self.torn_down || self.phase != SmartRedirectPhase::Idle {
            warn!(phase = %self.phase, "Smart redirect already entered");
            return Ok(Vec::new());
        }

        let entry = match SmartRedirectEntry::from_query(query) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("{}", err);
                self.transition(SmartRedirectPhase::Invalid);
                self.error = Some(err.clone());
                return Err(err);
            }
        };

        info!(
            platform = %entry.platform,
            slug = entry.slug.as_deref().unwrap_or(""),
            "Smart redirect started"
        );
        self.entry = Some(entry);
        self.transition(SmartRedirectPhase::Attempting);
        self.transition(SmartRedirectPhase::Counting(self.config.countdown_start));

        if self.config.countdown_start > 0 {
            self.timers.schedule(self.now + 1, SmartTimer::CountdownTick);
        }
        self.timers
            .schedule(self.now + self.config.app_attempt_delay, SmartTimer::AppAttempt);

        Ok(self.advance_to(self.now))
    }

    /// Fire every timer due at or before `now`, in order.
    pub fn advance_to(&mut self, now: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.torn_down || now < self.now {
            return effects;
        }
        while let Some((deadline, timer)) = self.timers.pop_due(now) {
            self.now = deadline;
            effects.extend(self.fire(timer));
        }
        self.now = now;
        effects
    }

    pub fn advance(&mut self, units: u64) -> Vec<Effect> {
        self.advance_to(self.now + units)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        if self.torn_down {
            return None;
        }
        self.timers.next_deadline()
    }

    /// Re-issue the app-scheme navigation. Timers are not reset.
    pub fn retry_app_open(&mut self) -> Vec<Effect> {
        match self.active_entry() {
            Some(entry) => {
                debug!("Retrying app open");
                vec![app_navigation(entry)]
            }
            None => Vec::new(),
        }
    }

    pub fn go_to_store_now(&mut self) -> Vec<Effect> {
        if self.active_entry().is_none() {
            return Vec::new();
        }
        self.redirect_to_store()
    }

    pub fn app_opened(&mut self) -> Vec<Effect> {
        if self.active_entry().is_none() {
            return Vec::new();
        }
        self.timers.clear();
        self.transition(SmartRedirectPhase::AppOpened);
        info!("App opened, smart redirect finished");
        Vec::new()
    }

    pub fn handle(&mut self, command: SmartRedirectCommand) -> Vec<Effect> {
        match command {
            SmartRedirectCommand::RetryAppOpen => self.retry_app_open(),
            SmartRedirectCommand::GoToStoreNow => self.go_to_store_now(),
            SmartRedirectCommand::AppOpened => self.app_opened(),
        }
    }

    /// Cancel every pending timer. Nothing fires afterwards.
    pub fn teardown(&mut self) {
        let cancelled = self.timers.len();
        self.timers.clear();
        self.torn_down = true;
        debug!(cancelled, phase = %self.phase, "Smart redirect torn down");
    }

    fn active_entry(&self) -> Option<&SmartRedirectEntry> {
        if self.torn_down || !self.phase.is_active() {
            return None;
        }
        self.entry.as_ref()
    }

    fn fire(&mut self, timer: SmartTimer) -> Vec<Effect> {
        match timer {
            SmartTimer::CountdownTick => {
                if let SmartRedirectPhase::Counting(n) = self.phase {
                    let remaining = n.saturating_sub(1);
                    self.transition(SmartRedirectPhase::Counting(remaining));
                    if remaining > 0 {
                        self.timers.schedule(self.now + 1, SmartTimer::CountdownTick);
                    }
                }
                Vec::new()
            }
            SmartTimer::AppAttempt => {
                let Some(entry) = self.active_entry() else {
                    return Vec::new();
                };
                let effect = app_navigation(entry);
                self.timers.schedule(
                    self.now + self.config.store_fallback_delay,
                    SmartTimer::StoreFallback,
                );
                vec![effect]
            }
            SmartTimer::StoreFallback => {
                if !self.phase.is_active() {
                    return Vec::new();
                }
                self.transition(SmartRedirectPhase::Expired);
                self.redirect_to_store()
            }
        }
    }

    /// Store the recovery payload (when there is an access code), then
    /// navigate to the store. Terminal.
    fn redirect_to_store(&mut self) -> Vec<Effect> {
        self.timers.clear();
        let Some(entry) = self.entry.as_ref() else {
            return Vec::new();
        };

        let mut effects = Vec::with_capacity(2);
        if let Some(code) = entry.access_code.as_deref().filter(|c| !c.is_empty()) {
            let slug = entry.slug.clone().unwrap_or_default();
            effects.push(Effect::WriteRelay(RecoveryPayload::new(slug, code)));
        }
        effects.push(Effect::Navigate(Navigation::new(
            NavigationKind::Store,
            entry.store_url.clone(),
        )));
        info!(
            store_url = %entry.store_url,
            relay = effects.len() > 1,
            "Redirecting to store"
        );

        self.transition(SmartRedirectPhase::StoreRedirected);
        effects
    }

    fn transition(&mut self, to: SmartRedirectPhase) {
        let from = self.phase;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "Unexpected smart redirect transition");
        }
        debug!(at = self.now, %from, %to, "Smart redirect transition");
        self.history.push(PhaseChange {
            at: self.now,
            from,
            to,
        });
        self.phase = to;
    }
}

fn app_navigation(entry: &SmartRedirectEntry) -> Effect {
    Effect::Navigate(Navigation::new(
        NavigationKind::AppScheme,
        entry.app_url.clone(),
    ))
}

impl TimedFlow for SmartRedirectCoordinator {
    type Command = SmartRedirectCommand;

    fn next_deadline(&self) -> Option<u64> {
        SmartRedirectCoordinator::next_deadline(self)
    }

    fn advance_to(&mut self, now: u64) -> Vec<Effect> {
        SmartRedirectCoordinator::advance_to(self, now)
    }

    fn handle(&mut self, command: SmartRedirectCommand) -> Vec<Effect> {
        SmartRedirectCoordinator::handle(self, command)
    }

    fn is_finished(&self) -> bool {
        self.torn_down || self.phase.is_terminal()
    }

    fn teardown(&mut self) {
        SmartRedirectCoordinator::teardown(self)
    }
}
