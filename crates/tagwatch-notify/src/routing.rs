use tagwatch_common::types::Severity;

/// Sends notifications of at least `min_severity` to one channel.
pub struct ChannelRoute {
    pub min_severity: Severity,
    pub channel_index: usize,
}

impl ChannelRoute {
    pub fn should_send(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }
}
