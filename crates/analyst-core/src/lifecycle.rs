//! Reconnect bookkeeping for the duplex channel.
//!
//! Pure state: the platform channel reports opens and closes and executes
//! whatever [`CloseAction`] comes back. At most one reconnect is pending at
//! any time.

use analyst_types::config::ReconnectConfig;
use analyst_types::event::TransportEvent;

pub const NORMAL_CLOSURE: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Schedule one reconnect after `delay_ms`
    Reconnect { attempt: u32, delay_ms: u32 },
    /// Attempts exhausted; surface the failure
    GiveUp { attempts: u32 },
    /// Expected close, nothing to do
    Stay,
}

impl CloseAction {
    /// Events the channel reports for a close with `code`, in order.
    /// Exhausted retries surface one `Error`, which ends any running turn
    /// before the `Disconnected` that follows it.
    pub fn events(&self, code: u16) -> Vec<TransportEvent> {
        match self {
            CloseAction::Reconnect { .. } => vec![TransportEvent::Disconnected {
                code,
                will_reconnect: true,
            }],
            CloseAction::GiveUp { attempts } => vec![
                TransportEvent::Error {
                    text: format!(
                        "Lost connection to the analysis server after {} reconnect attempts.",
                        attempts
                    ),
                },
                TransportEvent::Disconnected {
                    code,
                    will_reconnect: false,
                },
            ],
            CloseAction::Stay => vec![TransportEvent::Disconnected {
                code,
                will_reconnect: false,
            }],
        }
    }
}

#[derive(Debug)]
pub struct ChannelLifecycle {
    policy: ReconnectConfig,
    attempts: u32,
    intentional: bool,
    reconnect_pending: bool,
}

impl ChannelLifecycle {
    pub fn new(policy: ReconnectConfig) -> Self {
        Self {
            policy,
            attempts: 0,
            intentional: false,
            reconnect_pending: false,
        }
    }

    /// A caller-initiated connect clears any earlier intentional close,
    /// supersedes a scheduled reconnect and restores the retry budget.
    pub fn on_connect_requested(&mut self) {
        self.intentional = false;
        self.reconnect_pending = false;
        self.attempts = 0;
    }

    /// Server acknowledged the session; the failure streak is over.
    pub fn on_connected(&mut self) {
        if self.attempts > 0 {
            log::info!("Reconnected after {} attempt(s)", self.attempts);
        }
        self.attempts = 0;
        self.reconnect_pending = false;
    }

    pub fn mark_intentional(&mut self) {
        self.intentional = true;
        self.reconnect_pending = false;
    }

    pub fn on_close(&mut self, code: u16) -> CloseAction {
        if self.intentional || code == NORMAL_CLOSURE || code == GOING_AWAY {
            return CloseAction::Stay;
        }
        if self.reconnect_pending {
            log::debug!("Close {} while a reconnect is already scheduled", code);
            return CloseAction::Stay;
        }
        if self.attempts >= self.policy.max_attempts {
            log::error!(
                "Giving up on channel after {} reconnect attempts",
                self.attempts
            );
            return CloseAction::GiveUp {
                attempts: self.attempts,
            };
        }

        self.attempts += 1;
        self.reconnect_pending = true;
        let delay_ms = self.delay_for(self.attempts);
        log::warn!(
            "Channel closed with code {}; reconnect #{} in {}ms",
            code,
            self.attempts,
            delay_ms
        );
        CloseAction::Reconnect {
            attempt: self.attempts,
            delay_ms,
        }
    }

    /// The scheduled reconnect timer fired. Returns false if it was
    /// superseded by an intentional disconnect.
    pub fn on_reconnect_fired(&mut self) -> bool {
        let pending = self.reconnect_pending && !self.intentional;
        self.reconnect_pending = false;
        pending
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn delay_for(&self, attempt: u32) -> u32 {
        let exp = attempt.saturating_sub(1).min(16);
        self.policy
            .base_delay_ms
            .saturating_mul(1u32 << exp)
            .min(self.policy.max_delay_ms)
    }
}
