//! Local typing debounce as a pure state machine.
//!
//! The first keystroke after idle announces `typing = true`; every keystroke
//! re-arms a quiet timer; the timer firing, a send, or an explicit stop
//! announces `typing = false` exactly once.

use std::time::Duration;

/// Quiet period after the last keystroke before typing is cleared.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(2000);

/// Input to [`TypingDriver::on_input`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingInput {
    /// The user changed the draft.
    Keystroke,
    /// The quiet timer fired.
    QuietElapsed,
    /// The draft was sent.
    Sent,
    /// The composer was closed or cleared.
    Stop,
}

/// Instruction for the runtime driving the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingAction {
    /// Publish a typing indicator with this value.
    Emit(bool),
    /// (Re)start the quiet timer.
    ArmQuietTimer(Duration),
    /// Cancel any pending quiet timer.
    CancelQuietTimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Typing,
}

/// Debounce state for one composer.
#[derive(Debug, Clone)]
pub struct TypingDriver {
    phase: Phase,
    quiet_period: Duration,
}

impl TypingDriver {
    /// Idle driver with the given quiet period.
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            quiet_period,
        }
    }

    /// Configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Whether `typing = true` is currently announced.
    pub fn is_typing(&self) -> bool {
        self.phase == Phase::Typing
    }

    /// Advance the debouncer.
    pub fn on_input(&mut self, input: TypingInput) -> Vec<TypingAction> {
        match (self.phase, input) {
            (Phase::Idle, TypingInput::Keystroke) => {
                self.phase = Phase::Typing;
                vec![
                    TypingAction::Emit(true),
                    TypingAction::ArmQuietTimer(self.quiet_period),
                ]
            }
            (Phase::Typing, TypingInput::Keystroke) => {
                vec![TypingAction::ArmQuietTimer(self.quiet_period)]
            }
            (Phase::Typing, TypingInput::QuietElapsed) => {
                self.phase = Phase::Idle;
                vec![TypingAction::Emit(false)]
            }
            (Phase::Typing, TypingInput::Sent | TypingInput::Stop) => {
                self.phase = Phase::Idle;
                vec![TypingAction::CancelQuietTimer, TypingAction::Emit(false)]
            }
            // a stale timer or a send without prior typing
            (Phase::Idle, _) => Vec::new(),
        }
    }
}

impl Default for TypingDriver {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}
