//! Tokio driver for the timed state machines.
//!
//! Maps time units onto `tokio::time`, feeds manual commands from an mpsc
//! channel and stops on cancellation. The machines themselves never sleep.

use std::sync::Arc;
use std::time::Duration;

use deeplinker_protocol::SmartRedirectQuery;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::effect::{apply_effects, Effect};
use crate::navigator::Navigator;
use crate::post_install::{PostInstallCommand, PostInstallRecovery};
use crate::relay::{AccessCodeRelay, RelayError};
use crate::smart_redirect::{SmartRedirectCommand, SmartRedirectCoordinator};

/// A state machine advanced by explicit time.
pub trait TimedFlow {
    type Command;

    fn next_deadline(&self) -> Option<u64>;
    fn advance_to(&mut self, now: u64) -> Vec<Effect>;
    fn handle(&mut self, command: Self::Command) -> Vec<Effect>;
    fn is_finished(&self) -> bool;
    fn teardown(&mut self);
}

pub struct FlowDriver {
    navigator: Box<dyn Navigator>,
    relay: Arc<dyn AccessCodeRelay>,
    unit: Duration,
    cancel: CancellationToken,
}

impl FlowDriver {
    pub fn new(
        navigator: Box<dyn Navigator>,
        relay: Arc<dyn AccessCodeRelay>,
        unit: Duration,
    ) -> Self {
        Self {
            navigator,
            relay,
            unit,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token observed by every run of this driver.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the smart redirect to completion, teardown or cancellation.
    /// An invalid entry returns immediately with no navigation.
    pub async fn run_smart_redirect(
        &mut self,
        mut coordinator: SmartRedirectCoordinator,
        query: &SmartRedirectQuery,
        commands: Option<mpsc::Receiver<SmartRedirectCommand>>,
    ) -> SmartRedirectCoordinator {
        let start = Instant::now();
        match coordinator.enter(query) {
            Ok(effects) => self.apply(effects),
            Err(_) => return coordinator,
        }
        self.drive(&mut coordinator, start, commands).await;
        coordinator
    }

    /// Read the relay and run the recovery to completion.
    pub async fn run_post_install(
        &mut self,
        mut recovery: PostInstallRecovery,
        commands: Option<mpsc::Receiver<PostInstallCommand>>,
    ) -> Result<PostInstallRecovery, RelayError> {
        let start = Instant::now();
        let effects = recovery.enter_from_relay(self.relay.as_ref())?;
        self.apply(effects);
        self.drive(&mut recovery, start, commands).await;
        Ok(recovery)
    }

    async fn drive<F: TimedFlow>(
        &mut self,
        flow: &mut F,
        start: Instant,
        mut commands: Option<mpsc::Receiver<F::Command>>,
    ) {
        let cancel = self.cancel.clone();
        let mut commands_open = commands.is_some();

        loop {
            if flow.is_finished() {
                break;
            }
            let deadline = flow.next_deadline();
            if deadline.is_none() && !commands_open {
                debug!("No timers pending and no command source, stopping");
                break;
            }
            let wake_at = deadline.map(|units| start + self.span(units));

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    flow.teardown();
                    break;
                }
                _ = sleep_until(wake_at) => {
                    if let Some(units) = deadline {
                        let effects = flow.advance_to(units);
                        self.apply(effects);
                    }
                }
                command = next_command(&mut commands), if commands_open => match command {
                    Some(command) => {
                        let mut effects = flow.advance_to(self.elapsed_units(start));
                        effects.extend(flow.handle(command));
                        self.apply(effects);
                    }
                    None => commands_open = false,
                },
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        apply_effects(effects, self.navigator.as_mut(), self.relay.as_ref());
    }

    fn span(&self, units: u64) -> Duration {
        let units = u32::try_from(units).unwrap_or(u32::MAX);
        self.unit.saturating_mul(units)
    }

    fn elapsed_units(&self, start: Instant) -> u64 {
        let unit = self.unit.as_nanos().max(1);
        let elapsed = start.elapsed().as_nanos() / unit;
        u64::try_from(elapsed).unwrap_or_else(|_| {
            warn!("Elapsed time overflow");
            u64::MAX
        })
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_command<C>(commands: &mut Option<mpsc::Receiver<C>>) -> Option<C> {
    match commands {
        Some(rx) => rx.recv().await,
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::{NavigationKind, RecordingNavigator};
    use crate::post_install::{PostInstallConfig, PostInstallPhase};
    use crate::relay::InMemoryRelay;
    use crate::smart_redirect::{SmartRedirectConfig, SmartRedirectPhase};
    use deeplinker_protocol::RecoveryPayload;

    const UNIT: Duration = Duration::from_millis(1000);

    fn hello_query() -> SmartRedirectQuery {
        SmartRedirectQuery {
            platform: Some("ios".to_string()),
            app_url: Some("app://hello".to_string()),
            store_url: Some("https://apps.apple.com/app/id1".to_string()),
            access_code: Some("42".to_string()),
            slug: Some("hello".to_string()),
        }
    }

    fn driver() -> (FlowDriver, RecordingNavigator, Arc<InMemoryRelay>) {
        let navigator = RecordingNavigator::new();
        let relay = Arc::new(InMemoryRelay::new());
        let driver = FlowDriver::new(Box::new(navigator.clone()), relay.clone(), UNIT);
        (driver, navigator, relay)
    }

    fn kinds(navigator: &RecordingNavigator) -> Vec<NavigationKind> {
        navigator.navigations().iter().map(|n| n.kind).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_smart_redirect_runs_to_store() {
        let (mut driver, navigator, relay) = driver();
        let start = Instant::now();

        let coordinator = driver
            .run_smart_redirect(
                SmartRedirectCoordinator::new(SmartRedirectConfig::default()),
                &hello_query(),
                None,
            )
            .await;

        assert_eq!(coordinator.phase(), SmartRedirectPhase::StoreRedirected);
        assert_eq!(start.elapsed(), UNIT * 4);
        assert_eq!(kinds(&navigator), vec![NavigationKind::AppScheme, NavigationKind::Store]);
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("hello", "42"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_entry_navigates_nowhere() {
        let (mut driver, navigator, relay) = driver();
        let coordinator = driver
            .run_smart_redirect(
                SmartRedirectCoordinator::new(SmartRedirectConfig::default()),
                &SmartRedirectQuery::default(),
                None,
            )
            .await;

        assert_eq!(coordinator.phase(), SmartRedirectPhase::Invalid);
        assert!(navigator.navigations().is_empty());
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_to_store_command() {
        let (mut driver, navigator, _relay) = driver();
        let (tx, rx) = mpsc::channel(4);
        let start = Instant::now();

        let query = hello_query();
        let run = driver.run_smart_redirect(
            SmartRedirectCoordinator::new(SmartRedirectConfig::default()),
            &query,
            Some(rx),
        );
        let user = async {
            tokio::time::sleep(UNIT * 2).await;
            tx.send(SmartRedirectCommand::GoToStoreNow).await.unwrap();
        };
        let (coordinator, ()) = tokio::join!(run, user);

        assert_eq!(coordinator.phase(), SmartRedirectPhase::StoreRedirected);
        assert_eq!(start.elapsed(), UNIT * 2);
        assert_eq!(kinds(&navigator), vec![NavigationKind::AppScheme, NavigationKind::Store]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_timers() {
        let (mut driver, navigator, relay) = driver();
        let token = driver.cancellation_token();

        let query = hello_query();
        let run = driver.run_smart_redirect(
            SmartRedirectCoordinator::new(SmartRedirectConfig::default()),
            &query,
            None,
        );
        let canceller = async {
            tokio::time::sleep(UNIT * 2).await;
            token.cancel();
        };
        let (coordinator, ()) = tokio::join!(run, canceller);

        assert!(coordinator.is_torn_down());
        assert_eq!(coordinator.pending_timers(), 0);
        assert_eq!(kinds(&navigator), vec![NavigationKind::AppScheme]);
        assert_eq!(relay.read_and_clear().unwrap(), None);

        // Well past the store deadline, still nothing.
        tokio::time::sleep(UNIT * 10).await;
        assert_eq!(navigator.navigations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_install_recovers_relay_payload() {
        let (mut driver, navigator, relay) = driver();
        relay.write(&RecoveryPayload::new("hello", "42")).unwrap();
        let (tx, rx) = mpsc::channel(4);

        let run = driver.run_post_install(PostInstallRecovery::new(PostInstallConfig::default()), Some(rx));
        let user = async {
            tokio::time::sleep(UNIT * 2).await;
            tx.send(PostInstallCommand::OpenAppAgain).await.unwrap();
        };
        let (recovery, ()) = tokio::join!(run, user);
        let recovery = recovery.unwrap();

        assert_eq!(recovery.phase(), PostInstallPhase::FellBack);
        assert_eq!(recovery.attempts(), 2);
        let urls: Vec<String> = navigator.navigations().into_iter().map(|n| n.url).collect();
        assert_eq!(
            urls,
            vec![
                "myapp://hello?access_code=42".to_string(),
                "myapp://hello?access_code=42".to_string(),
                "http://127.0.0.1:3000/l/hello?access_code=42".to_string(),
            ]
        );
        assert_eq!(relay.read_and_clear().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_install_without_payload_finishes_immediately() {
        let (mut driver, navigator, _relay) = driver();
        let (_tx, rx) = mpsc::channel(1);
        let recovery = driver
            .run_post_install(PostInstallRecovery::new(PostInstallConfig::default()), Some(rx))
            .await
            .unwrap();
        assert_eq!(recovery.phase(), PostInstallPhase::NoPending);
        assert!(navigator.navigations().is_empty());
    }
}
