use crate::config::SessionConfig;
use crate::controller::{Intent, SessionController};
use crate::effects::{EffectManager, ExpiryReceiver};
use crate::gateway::{Gateway, GatewayEvent, PreferenceStore};
use crate::state::SessionState;
use log::info;
use tokio::sync::{mpsc, watch};

/// What the presentation layer holds: a way in and a view out.
pub struct ClientHandle {
    pub intents: mpsc::UnboundedSender<Intent>,
    pub snapshots: watch::Receiver<SessionState>,
}

/// Drives a [`SessionController`] from a single task.
///
/// Intents, gateway events and effect expiries are handled strictly one at a
/// time, in the order each stream delivers them.
pub struct Client<G, P> {
    controller: SessionController<G, P>,
    intents: mpsc::UnboundedReceiver<Intent>,
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    expiries: ExpiryReceiver,
}

impl<G: Gateway, P: PreferenceStore> Client<G, P> {
    /// `events` must be the receiving end of the channel `gateway` posts to.
    /// Must be called from within a tokio runtime.
    pub fn new(
        gateway: G,
        preferences: P,
        config: SessionConfig,
        events: mpsc::UnboundedReceiver<GatewayEvent>,
    ) -> (Self, ClientHandle) {
        let (effects, expiries) = EffectManager::new(config.effect_lifetime);
        let controller = SessionController::new(gateway, preferences, config, effects);
        let (intent_tx, intents) = mpsc::unbounded_channel();

        let handle = ClientHandle {
            intents: intent_tx,
            snapshots: controller.snapshots(),
        };

        let client = Client {
            controller,
            intents,
            events,
            expiries,
        };

        (client, handle)
    }

    pub fn controller(&self) -> &SessionController<G, P> {
        &self.controller
    }

    /// Runs until every intent sender has been dropped.
    pub async fn run(&mut self) {
        info!("Session client started");

        loop {
            tokio::select! {
                intent = self.intents.recv() => {
                    match intent {
                        Some(intent) => self.controller.handle_intent(intent),
                        None => {
                            info!("Input closed, shutting down");
                            break;
                        }
                    }
                },

                Some(event) = self.events.recv() => {
                    self.controller.handle_event(event);
                },

                Some(id) = self.expiries.recv() => {
                    self.controller.expire_effect(id);
                },
            }
        }
    }
}
