use std::fmt;

/// Lifecycle of one streaming session.
///
/// ```text
/// Idle ──begin──▶ Connecting ──open──▶ Streaming ──end / remote close──▶ Closing ──▶ Closed
///   │                 │
///   └──── end ────────┴──── end / connect failure ──────────────────────────────────▶ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Idle, Closed)
                | (Connecting, Streaming)
                | (Connecting, Closed)
                | (Streaming, Closing)
                | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;
    use super::*;

    const ALL: [SessionState; 5] = [Idle, Connecting, Streaming, Closing, Closed];

    #[test]
    fn test_happy_path_transitions() {
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Streaming));
        assert!(Streaming.can_transition_to(Closing));
        assert!(Closing.can_transition_to(Closed));
    }

    #[test]
    fn test_nothing_leaves_closed() {
        for next in ALL {
            assert!(!Closed.can_transition_to(next), "Closed -> {next}");
        }
        assert!(Closed.is_terminal());
    }

    #[test]
    fn test_no_skipping_ahead() {
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Streaming.can_transition_to(Connecting));
        assert!(!Closing.can_transition_to(Streaming));
        assert!(!Streaming.can_transition_to(Idle));
    }

    #[test]
    fn test_display() {
        assert_eq!(Streaming.to_string(), "streaming");
    }
}
