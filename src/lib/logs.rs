// The orchestrator logs through an injected sink rather than a global
// logger, so log-triggered behavior (sampled warnings in particular) is
// observable in tests without a process-wide singleton.
pub trait BuildLog {
    fn message(&self, level: log::Level, text: &str);
}

// Default sink: forward to the `log` facade
pub struct FacadeLog;

impl BuildLog for FacadeLog {
    fn message(&self, level: log::Level, text: &str) {
        log::log!(target: "lbvh", level, "{}", text);
    }
}

// Rate limit for per-node warnings: log the first `limit` occurrences of
// a build, count the rest
pub struct WarnBudget {
    limit: u32,
    seen: u32,
}

impl WarnBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, seen: 0 }
    }

    pub fn warn<F>(&mut self, log: &dyn BuildLog, text: F)
        where F: FnOnce() -> String {

        self.seen += 1;

        if self.seen <= self.limit {
            log.message(log::Level::Warn, &text());
        }
    }

    pub fn seen(&self) -> u32 {
        self.seen
    }

    pub fn suppressed(&self) -> u32 {
        self.seen.saturating_sub(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use std::sync;

    use super::*;

    struct CollectLog(sync::Mutex<Vec<String>>);

    impl BuildLog for CollectLog {
        fn message(&self, _level: log::Level, text: &str) {
            self.0.lock().unwrap().push(text.to_owned());
        }
    }

    #[test]
    fn budget_stops_after_limit() {
        let sink = CollectLog(sync::Mutex::new(Vec::new()));

        let mut budget = WarnBudget::new(3);
        for i in 0..10 {
            budget.warn(&sink, || format!("node {} degenerate", i));
        }

        assert_eq!(sink.0.lock().unwrap().len(), 3);
        assert_eq!(budget.seen(), 10);
        assert_eq!(budget.suppressed(), 7);
    }
}
