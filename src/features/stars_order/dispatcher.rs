#![forbid(unsafe_code)]

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    features::stars_order::{
        Services,
        handlers::{message::handle_new_message, order::handle_new_order},
        state::ConversationTable,
    },
    infra::backoff::{Backoff, BackoffConfig},
    marketplace::{MarketError, MarketEvent},
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("marketplace: {0}")]
    Market(#[from] MarketError),
}

/// Global reply throttle: after one processed event, anything arriving
/// within `window` is dropped rather than queued.
#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    last_reply: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_reply: None,
        }
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.last_reply
            .is_none_or(|last| now.saturating_duration_since(last) >= self.window)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_reply = Some(now);
    }
}

/// Single consumer of marketplace events. Owns every open conversation.
pub struct Dispatcher {
    services: Services,
    seller_id: u64,
    conversations: ConversationTable,
    cooldown: Cooldown,
    poll_interval: Duration,
    backoff: Backoff,
}

impl Dispatcher {
    pub fn new(
        services: Services,
        seller_id: u64,
        cooldown: Duration,
        poll_interval: Duration,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            services,
            seller_id,
            conversations: ConversationTable::default(),
            cooldown: Cooldown::new(cooldown),
            poll_interval,
            backoff: Backoff::new(backoff),
        }
    }

    pub fn conversations(&self) -> &ConversationTable {
        &self.conversations
    }

    /// Polls and dispatches events until `stop_rx` flips.
    pub async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        info!(seller_id = self.seller_id, "Waiting for marketplace events");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let polled = tokio::select! {
                _ = stop_rx.changed() => break,
                polled = self.services.market.next_event(self.poll_interval) => polled,
            };

            match polled {
                Ok(Some(event)) => {
                    self.backoff.reset();
                    self.dispatch(event, Instant::now()).await;
                }
                Ok(None) => self.backoff.reset(),
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    warn!(error = %err, ?delay, "Event poll failed, backing off");
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!(
            open_conversations = self.conversations.len(),
            "Event dispatcher stopped"
        );
    }

    /// Handles one event observed at `now`. Never fails: per-event errors
    /// are logged and the conversation table is left as the handler left it.
    pub async fn dispatch(&mut self, event: MarketEvent, now: Instant) {
        if !self.cooldown.ready(now) {
            debug!(?event, "Within reply cooldown, event dropped");
            return;
        }

        let result: Result<(), DispatchError> = match &event {
            MarketEvent::OrderCreated { order_id } => {
                handle_new_order(&self.services, &mut self.conversations, order_id)
                    .await
                    .map_err(DispatchError::from)
            }
            MarketEvent::MessageReceived(message) if message.author_id == self.seller_id => {
                return;
            }
            MarketEvent::MessageReceived(message) => {
                handle_new_message(&self.services, &mut self.conversations, message)
                    .await
                    .map_err(DispatchError::from)
            }
            MarketEvent::Other => return,
        };

        match result {
            Ok(()) => self.cooldown.record(now),
            Err(err) => error!(error = %err, ?event, "Failed to handle marketplace event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Cooldown;
    use std::time::{Duration, Instant};

    #[test]
    fn cooldown_drops_events_inside_the_window() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(1));
        assert!(cooldown.ready(start));
        cooldown.record(start);

        assert!(!cooldown.ready(start + Duration::from_millis(100)));
        assert!(cooldown.ready(start + Duration::from_millis(1100)));
    }

    #[test]
    fn zero_window_never_blocks() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::ZERO);
        cooldown.record(start);
        assert!(cooldown.ready(start));
    }
}
