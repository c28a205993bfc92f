/// Folds the platform probe's raw signals into the single idle flag the ledger
/// consumes: a covered session always counts as idle, and so does a quiet input
/// queue once it is quiet for longer than the threshold.
pub struct IdleEvaluator {
    threshold_ms: u32,
}

impl IdleEvaluator {
    pub fn from_seconds(threshold_s: u32) -> Self {
        Self {
            threshold_ms: threshold_s * 1000,
        }
    }

    pub fn is_idle(&self, screensaver_active: bool, idle_time_ms: u32) -> bool {
        screensaver_active || self.threshold_ms < idle_time_ms
    }
}
