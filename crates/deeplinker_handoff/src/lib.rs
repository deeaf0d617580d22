//! Client-side hand-off across the install gap.
//!
//! ```text
//! /smart-redirect ──app attempt──> (app missing) ──timeout──> relay.write ──> store
//!                                                                  │
//! first launch after install <── relay.read_and_clear <────────────┘
//!        └──> app attempt with slug + access code ──timeout──> canonical web link
//! ```
//!
//! [`SmartRedirectCoordinator`] and [`PostInstallRecovery`] are synchronous
//! state machines advanced by explicit time units and returning [`Effect`]s.
//! [`FlowDriver`] runs them on tokio timers.

pub mod cancel;
pub mod effect;
pub mod flow;
pub mod navigator;
pub mod post_install;
pub mod relay;
pub mod smart_redirect;
pub mod timers;

pub use cancel::CancellationToken;
pub use effect::{apply_effects, Effect};
pub use flow::{FlowDriver, TimedFlow};
pub use navigator::{LogNavigator, Navigation, NavigationKind, Navigator, RecordingNavigator};
pub use post_install::{PostInstallCommand, PostInstallConfig, PostInstallPhase, PostInstallRecovery};
pub use relay::{AccessCodeRelay, FileRelay, InMemoryRelay, RelayError};
pub use smart_redirect::{
    query_from_url, InvalidSmartRedirectEntry, PhaseChange, SmartRedirectCommand,
    SmartRedirectConfig, SmartRedirectCoordinator, SmartRedirectEntry, SmartRedirectPhase,
};
pub use timers::TimerQueue;
