//! Post-install recovery.
//!
//! On first run after install, take the pending payload from the relay and
//! retry the app-scheme launch with it, falling back to the canonical web
//! link if the app does not take over.

use deeplinker_protocol::{DeeplinkerConfig, RecoveryPayload};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::effect::Effect;
use crate::flow::TimedFlow;
use crate::navigator::{Navigation, NavigationKind};
use crate::relay::{AccessCodeRelay, RelayError};
use crate::timers::TimerQueue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInstallConfig {
    /// Units from entry until the app-scheme attempt.
    pub attempt_delay: u64,
    /// Units from an attempt until the web fallback.
    pub fallback_delay: u64,
    pub scheme: String,
    /// Public origin of the resolution server, without trailing slash.
    pub web_base_url: String,
    pub canonical_prefix: String,
}

impl PostInstallConfig {
    pub fn from_config(config: &DeeplinkerConfig) -> Self {
        Self {
            attempt_delay: config.handoff.recovery_attempt_delay,
            fallback_delay: config.handoff.recovery_fallback_delay,
            scheme: config.app.scheme.clone(),
            web_base_url: config
                .server
                .public_base_url
                .trim_end_matches('/')
                .to_string(),
            canonical_prefix: config.routes.canonical_prefix.clone(),
        }
    }

    /// `<scheme>://<slug>?access_code=<code>`
    pub fn app_url(&self, payload: &RecoveryPayload) -> String {
        format!(
            "{}://{}?{}",
            self.scheme,
            encode(&payload.slug),
            access_code_query(&payload.access_code)
        )
    }

    /// `<origin>/<canonical_prefix>/<slug>?access_code=<code>`
    pub fn fallback_url(&self, payload: &RecoveryPayload) -> String {
        format!(
            "{}/{}/{}?{}",
            self.web_base_url,
            self.canonical_prefix,
            encode(&payload.slug),
            access_code_query(&payload.access_code)
        )
    }
}

impl Default for PostInstallConfig {
    fn default() -> Self {
        Self::from_config(&DeeplinkerConfig::default())
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn access_code_query(code: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("access_code", code)
        .finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostInstallPhase {
    Idle,
    /// Nothing was pending; the flow does nothing further.
    NoPending,
    /// Payload recovered, app attempt scheduled.
    Waiting,
    /// App attempt issued, web fallback armed.
    Attempted,
    FellBack,
}

impl PostInstallPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostInstallPhase::Idle => "idle",
            PostInstallPhase::NoPending => "no_pending",
            PostInstallPhase::Waiting => "waiting",
            PostInstallPhase::Attempted => "attempted",
            PostInstallPhase::FellBack => "fell_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PostInstallPhase::NoPending | PostInstallPhase::FellBack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostInstallCommand {
    OpenAppAgain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryTimer {
    Attempt,
    WebFallback,
}

#[derive(Debug)]
pub struct PostInstallRecovery {
    config: PostInstallConfig,
    now: u64,
    phase: PostInstallPhase,
    payload: Option<RecoveryPayload>,
    timers: TimerQueue<RecoveryTimer>,
    attempts: u32,
    torn_down: bool,
}

impl PostInstallRecovery {
    pub fn new(config: PostInstallConfig) -> Self {
        Self {
            config,
            now: 0,
            phase: PostInstallPhase::Idle,
            payload: None,
            timers: TimerQueue::new(),
            attempts: 0,
            torn_down: false,
        }
    }

    pub fn phase(&self) -> PostInstallPhase {
        self.phase
    }

    pub fn payload(&self) -> Option<&RecoveryPayload> {
        self.payload.as_ref()
    }

    /// App-scheme navigations issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Take the pending payload from `relay` and start.
    pub fn enter_from_relay(
        &mut self,
        relay: &dyn AccessCodeRelay,
    ) -> Result<Vec<Effect>, RelayError> {
        let pending = relay.read_and_clear()?;
        Ok(self.enter(pending))
    }

    pub fn enter(&mut self, pending: Option<RecoveryPayload>) -> Vec<Effect> {
        if self.torn_down || self.phase != PostInstallPhase::Idle {
            return Vec::new();
        }
        // Only a complete pair can be reopened.
        let pending = match pending {
            Some(payload) if payload.slug.is_empty() || payload.access_code.is_empty() => {
                info!(slug = %payload.slug, "Pending deep link incomplete, ignoring");
                None
            }
            other => other,
        };
        match pending {
            None => {
                info!("No pending deep link");
                self.set_phase(PostInstallPhase::NoPending);
                Vec::new()
            }
            Some(payload) => {
                info!(slug = %payload.slug, "Recovered pending deep link");
                self.payload = Some(payload);
                self.set_phase(PostInstallPhase::Waiting);
                self.timers
                    .schedule(self.now + self.config.attempt_delay, RecoveryTimer::Attempt);
                self.advance_to(self.now)
            }
        }
    }

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

    /// Re-issue the app attempt with the recovered values. Replaces the
    /// armed fallback, so at most one fallback is ever pending.
    pub fn open_app_again(&mut self) -> Vec<Effect> {
        if self.torn_down
            || !matches!(
                self.phase,
                PostInstallPhase::Waiting | PostInstallPhase::Attempted
            )
        {
            return Vec::new();
        }
        self.timers.clear();
        self.attempt()
    }

    pub fn teardown(&mut self) {
        self.timers.clear();
        self.torn_down = true;
        debug!(phase = self.phase.as_str(), "Post-install recovery torn down");
    }

    fn fire(&mut self, timer: RecoveryTimer) -> Vec<Effect> {
        match timer {
            RecoveryTimer::Attempt => self.attempt(),
            RecoveryTimer::WebFallback => {
                let Some(payload) = self.payload.as_ref() else {
                    return Vec::new();
                };
                let url = self.config.fallback_url(payload);
                self.timers.clear();
                self.set_phase(PostInstallPhase::FellBack);
                vec![Effect::Navigate(Navigation::new(
                    NavigationKind::WebFallback,
                    url,
                ))]
            }
        }
    }

    fn attempt(&mut self) -> Vec<Effect> {
        let Some(payload) = self.payload.as_ref() else {
            return Vec::new();
        };
        let url = self.config.app_url(payload);
        self.attempts += 1;
        self.timers.cancel_where(|t| *t == RecoveryTimer::WebFallback);
        self.timers.schedule(
            self.now + self.config.fallback_delay,
            RecoveryTimer::WebFallback,
        );
        self.set_phase(PostInstallPhase::Attempted);
        vec![Effect::Navigate(Navigation::new(
            NavigationKind::AppScheme,
            url,
        ))]
    }

    fn set_phase(&mut self, phase: PostInstallPhase) {
        if self.phase != phase {
            debug!(
                at = self.now,
                from = self.phase.as_str(),
                to = phase.as_str(),
                "Post-install transition"
            );
            self.phase = phase;
        }
    }
}

impl TimedFlow for PostInstallRecovery {
    type Command = PostInstallCommand;

    fn next_deadline(&self) -> Option<u64> {
        PostInstallRecovery::next_deadline(self)
    }

    fn advance_to(&mut self, now: u64) -> Vec<Effect> {
        PostInstallRecovery::advance_to(self, now)
    }

    fn handle(&mut self, command: PostInstallCommand) -> Vec<Effect> {
        match command {
            PostInstallCommand::OpenAppAgain => self.open_app_again(),
        }
    }

    fn is_finished(&self) -> bool {
        self.torn_down || self.phase.is_terminal()
    }

    fn teardown(&mut self) {
        PostInstallRecovery::teardown(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::InMemoryRelay;

    fn nav(effects: &[Effect]) -> Vec<(NavigationKind, String)> {
        effects
            .iter()
            .filter_map(Effect::navigation)
            .map(|n| (n.kind, n.url.clone()))
            .collect()
    }

    fn recovered() -> PostInstallRecovery {
        let mut recovery = PostInstallRecovery::new(PostInstallConfig::default());
        assert!(recovery
            .enter(Some(RecoveryPayload::new("hello", "42")))
            .is_empty());
        recovery
    }

    #[test]
    fn test_urls() {
        let config = PostInstallConfig {
            web_base_url: "https://links.example.com".to_string(),
            ..PostInstallConfig::default()
        };
        let payload = RecoveryPayload::new("hello", "a b&c");
        assert_eq!(config.app_url(&payload), "myapp://hello?access_code=a+b%26c");
        assert_eq!(
            config.fallback_url(&payload),
            "https://links.example.com/l/hello?access_code=a+b%26c"
        );
    }

    #[test]
    fn test_no_pending() {
        let relay = InMemoryRelay::new();
        let mut recovery = PostInstallRecovery::new(PostInstallConfig::default());
        assert!(recovery.enter_from_relay(&relay).unwrap().is_empty());
        assert_eq!(recovery.phase(), PostInstallPhase::NoPending);
        assert_eq!(recovery.pending_timers(), 0);
        assert!(recovery.open_app_again().is_empty());
        assert!(recovery.advance(10).is_empty());
    }

    #[test]
    fn test_attempt_then_fallback() {
        let mut recovery = recovered();
        assert_eq!(recovery.phase(), PostInstallPhase::Waiting);

        let effects = recovery.advance_to(1);
        assert_eq!(
            nav(&effects),
            vec![(
                NavigationKind::AppScheme,
                "myapp://hello?access_code=42".to_string()
            )]
        );
        assert_eq!(recovery.phase(), PostInstallPhase::Attempted);

        assert!(recovery.advance_to(2).is_empty());
        let effects = recovery.advance_to(3);
        assert_eq!(
            nav(&effects),
            vec![(
                NavigationKind::WebFallback,
                "http://127.0.0.1:3000/l/hello?access_code=42".to_string()
            )]
        );
        assert_eq!(recovery.phase(), PostInstallPhase::FellBack);
        assert!(recovery.open_app_again().is_empty());
    }

    #[test]
    fn test_open_again_rearms_single_fallback() {
        let mut recovery = recovered();
        recovery.advance_to(2);

        let effects = recovery.open_app_again();
        assert_eq!(nav(&effects)[0].0, NavigationKind::AppScheme);
        assert_eq!(recovery.pending_timers(), 1);
        assert_eq!(recovery.next_deadline(), Some(4));
        assert_eq!(recovery.attempts(), 2);

        assert!(recovery.advance_to(3).is_empty());
        let effects = recovery.advance_to(4);
        assert_eq!(nav(&effects)[0].0, NavigationKind::WebFallback);
    }

    #[test]
    fn test_open_again_while_waiting_replaces_scheduled_attempt() {
        let mut recovery = recovered();
        let effects = recovery.open_app_again();
        assert_eq!(nav(&effects).len(), 1);

        // The scheduled attempt at t=1 is gone; only the fallback remains.
        let effects = recovery.advance_to(1);
        assert!(effects.is_empty());
        assert_eq!(recovery.attempts(), 1);
    }

    #[test]
    fn test_relay_consumed_on_entry() {
        let relay = InMemoryRelay::new();
        relay.write(&RecoveryPayload::new("hello", "42")).unwrap();

        let mut recovery = PostInstallRecovery::new(PostInstallConfig::default());
        recovery.enter_from_relay(&relay).unwrap();
        assert_eq!(recovery.payload(), Some(&RecoveryPayload::new("hello", "42")));
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[test]
    fn test_incomplete_payload_is_not_reopened() {
        let relay = InMemoryRelay::new();
        relay.write(&RecoveryPayload::new("", "42")).unwrap();

        let mut recovery = PostInstallRecovery::new(PostInstallConfig::default());
        assert!(recovery.enter_from_relay(&relay).unwrap().is_empty());
        assert_eq!(recovery.phase(), PostInstallPhase::NoPending);
        assert_eq!(recovery.payload(), None);
        assert_eq!(recovery.pending_timers(), 0);
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[test]
    fn test_teardown() {
        let mut recovery = recovered();
        recovery.teardown();
        assert!(recovery.advance(10).is_empty());
        assert!(recovery.open_app_again().is_empty());
        assert_eq!(recovery.next_deadline(), None);
    }
}
