use log::{debug, info, warn};

/// Per-stage log handle; prefixes every message with the stage name.
#[derive(Debug, Clone)]
pub struct LogManager {
    stage: &'static str,
}

impl LogManager {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.stage, message);
    }

    pub fn trace(&self, message: &str) {
        debug!("[{}] {}", self.stage, message);
    }

    /// Reports a sticky anomaly flag the first time it rises.
    pub fn anomaly(&self, flag: &mut bool, message: &str) {
        if !*flag {
            *flag = true;
            warn!("[{}] {}", self.stage, message);
        }
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("core")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_sets_flag_once() {
        let logger = LogManager::new("test");
        let mut flag = false;
        logger.anomaly(&mut flag, "first");
        assert!(flag);
        logger.anomaly(&mut flag, "second");
        assert!(flag);
    }
}
