use std::fmt;

/// Counters from one pass of the prefilter, identification or resolver stage.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageStats {
    /// Records (or representatives) the stage looked at.
    pub examined: u32,
    /// Records moved one hop forward.
    pub advanced: u32,
    /// Extra records updated by bulk organization marks.
    pub fanned_out: u64,
    /// Records moved to ERROR.
    pub errored: u32,
    /// Left untouched on purpose (concurrent change, missing data, no decision).
    pub skipped: u32,
    /// Left untouched because an external call failed.
    pub failed: u32,
}

impl fmt::Display for StageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} advanced={} fanned_out={} errored={} skipped={} failed={}",
            self.examined, self.advanced, self.fanned_out, self.errored, self.skipped, self.failed,
        )
    }
}

/// Counters from one pass of the notification dispatcher.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifyStats {
    pub examined: u32,
    /// Records announced to at least one channel.
    pub notified: u32,
    /// Individual channel posts.
    pub messages_sent: u32,
    /// Marked notified without sending (self-visit, cutoff, no channels).
    pub suppressed: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl fmt::Display for NotifyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} notified={} messages_sent={} suppressed={} skipped={} failed={}",
            self.examined,
            self.notified,
            self.messages_sent,
            self.suppressed,
            self.skipped,
            self.failed,
        )
    }
}
