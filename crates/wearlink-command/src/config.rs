use std::time::Duration;

/// Controls command channel behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Timeout used by [`crate::CommandChannel::send_command_default`].
    pub default_timeout: Duration,
    /// Maximum number of commands awaiting a response at once.
    pub max_pending: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(250),
            max_pending: 64,
        }
    }
}
