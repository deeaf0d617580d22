//! Navigation sink for the client flows.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::info;

/// What a navigation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// App-scheme launch attempt; fire-and-forget.
    AppScheme,
    /// App store page; terminal for the smart redirect.
    Store,
    /// Canonical web link; terminal for post-install recovery.
    WebFallback,
}

impl NavigationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationKind::AppScheme => "app_scheme",
            NavigationKind::Store => "store",
            NavigationKind::WebFallback => "web_fallback",
        }
    }
}

impl fmt::Display for NavigationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    pub url: String,
}

impl Navigation {
    pub fn new(kind: NavigationKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
        }
    }
}

pub trait Navigator: Send {
    fn navigate(&mut self, navigation: &Navigation);
}

/// Logs navigations instead of performing them. Used by the CLI drivers.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&mut self, navigation: &Navigation) {
        info!(kind = %navigation.kind, url = %navigation.url, "Navigate");
    }
}

/// Records navigations; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    log: Arc<Mutex<Vec<Navigation>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&mut self, navigation: &Navigation) {
        match self.log.lock() {
            Ok(mut log) => log.push(navigation.clone()),
            Err(poisoned) => poisoned.into_inner().push(navigation.clone()),
        }
    }
}
