use deeplinker_protocol::RecoveryPayload;
use tracing::warn;

use crate::navigator::{Navigation, Navigator};
use crate::relay::AccessCodeRelay;

/// Side effect requested by a state machine, to be performed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    WriteRelay(RecoveryPayload),
    Navigate(Navigation),
}

impl Effect {
    pub fn navigation(&self) -> Option<&Navigation> {
        match self {
            Effect::Navigate(navigation) => Some(navigation),
            Effect::WriteRelay(_) => None,
        }
    }
}

/// Perform `effects` in order.
///
/// A failed relay write is logged and does not stop the navigation that
/// follows it: the user still reaches the store, only the recovery is lost.
pub fn apply_effects(
    effects: impl IntoIterator<Item = Effect>,
    navigator: &mut dyn Navigator,
    relay: &dyn AccessCodeRelay,
) {
    for effect in effects {
        match effect {
            Effect::WriteRelay(payload) => {
                if let Err(err) = relay.write(&payload) {
                    warn!(slug = %payload.slug, "Failed to store recovery payload: {}", err);
                }
            }
            Effect::Navigate(navigation) => navigator.navigate(&navigation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::{NavigationKind, RecordingNavigator};
    use crate::relay::InMemoryRelay;

    #[test]
    fn test_apply_in_order() {
        let relay = InMemoryRelay::new();
        let mut navigator = RecordingNavigator::new();
        apply_effects(
            vec![
                Effect::WriteRelay(RecoveryPayload::new("hello", "42")),
                Effect::Navigate(Navigation::new(NavigationKind::Store, "https://store.test")),
            ],
            &mut navigator,
            &relay,
        );

        assert_eq!(navigator.navigations().len(), 1);
        assert_eq!(
            relay.read_and_clear().unwrap(),
            Some(RecoveryPayload::new("hello", "42"))
        );
    }
}
