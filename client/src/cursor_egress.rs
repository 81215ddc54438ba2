//! Outbound pointer publishing.
//!
//! Pointer devices sample far faster than the room needs to hear about it.
//! [`CursorThrottle`] coalesces samples so that at most one message leaves per
//! throttle window, always carrying the newest sample of that window, and
//! nothing leaves for a window that saw no samples.
//!
//! ```text
//!            offer                    poll (window over)
//!   Idle ─────────────▶ Pending ─────────────────────────▶ InFlight
//!    ▲                  │  ▲ offer replaces sample          │   │
//!    │                  │  └───────────────────────────────┘   │ offer
//!    │                  │            (flushes when InFlight ends)
//!    └──────────────────┴──── poll (window over, nothing new) ◀─┘
//! ```

use presence_system::{ClientMessage, Position};
use std::time::{Duration, Instant};

pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(80);

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ThrottleState {
    Idle,
    /// Holds the newest sample until `flush_at`.
    Pending { sample: Position, flush_at: Instant },
    /// A sample left recently; nothing else may leave before `until`.
    InFlight { until: Instant },
}

#[derive(Debug)]
pub struct CursorThrottle {
    window: Duration,
    state: ThrottleState,
}

impl CursorThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: ThrottleState::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn offer(&mut self, sample: Position, now: Instant) {
        self.state = match self.state {
            ThrottleState::Idle => ThrottleState::Pending {
                sample,
                flush_at: now + self.window,
            },
            ThrottleState::Pending { flush_at, .. } => ThrottleState::Pending { sample, flush_at },
            ThrottleState::InFlight { until } if now < until => ThrottleState::Pending {
                sample,
                flush_at: until,
            },
            ThrottleState::InFlight { .. } => ThrottleState::Pending {
                sample,
                flush_at: now + self.window,
            },
        };
    }

    /// One flush attempt. Returns the sample to send if its window is over.
    pub fn poll(&mut self, now: Instant) -> Option<Position> {
        match self.state {
            ThrottleState::Pending { sample, flush_at } if now >= flush_at => {
                self.state = ThrottleState::InFlight {
                    until: now + self.window,
                };
                Some(sample)
            }
            ThrottleState::InFlight { until } if now >= until => {
                self.state = ThrottleState::Idle;
                None
            }
            _ => None,
        }
    }

    /// Drops any pending sample without sending it.
    pub fn cancel(&mut self) {
        self.state = ThrottleState::Idle;
    }
}

/// Cursor egress for one session: the throttle plus the wire message it feeds.
#[derive(Debug)]
pub struct CursorEgress {
    throttle: CursorThrottle,
}

impl CursorEgress {
    pub fn new(window: Duration) -> Self {
        Self {
            throttle: CursorThrottle::new(window),
        }
    }

    pub fn throttle(&self) -> &CursorThrottle {
        &self.throttle
    }

    pub fn publish(&mut self, sample: Position, now: Instant) {
        if !sample.is_finite() {
            log::debug!("dropping non-finite pointer sample {:?}", sample);
            return;
        }
        self.throttle.offer(sample, now);
    }

    pub fn poll(&mut self, now: Instant) -> Option<ClientMessage> {
        self.throttle
            .poll(now)
            .map(|Position { x, y }| ClientMessage::Cursor { x, y })
    }

    pub fn cancel(&mut self) {
        self.throttle.cancel();
    }
}
