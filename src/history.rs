//! history.rs: latest analysis report per cache key, kept in memory for export.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::pipeline::AnalysisReport;

/// Bounded, insertion-ordered store. Re-analyzing a key replaces its report
/// and moves it to the back; the oldest key is dropped past `cap`.
#[derive(Debug)]
pub struct History {
    inner: Mutex<VecDeque<Arc<AnalysisReport>>>,
    cap: usize,
}

impl History {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, report: AnalysisReport) -> Arc<AnalysisReport> {
        let report = Arc::new(report);
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.retain(|r| r.key != report.key);
        v.push_back(Arc::clone(&report));
        while v.len() > self.cap {
            v.pop_front();
        }
        report
    }

    pub fn get(&self, key: &str) -> Option<Arc<AnalysisReport>> {
        let v = self.inner.lock().expect("history mutex poisoned");
        v.iter().rev().find(|r| r.key == key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Source;
    use crate::pipeline::AggregateCounts;

    fn report(keyword: &str, total: usize) -> AnalysisReport {
        AnalysisReport {
            key: Source::News.cache_key(keyword),
            source: Source::News,
            keyword: keyword.to_string(),
            classifier: "lexicon",
            results: Vec::new(),
            counts: AggregateCounts {
                total,
                ..Default::default()
            },
            failures: 0,
            analyzed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn replaces_same_key() {
        let h = History::with_capacity(4);
        h.push(report("a", 1));
        h.push(report("a", 2));
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("news:a").unwrap().counts.total, 2);
    }

    #[test]
    fn evicts_oldest_past_cap() {
        let h = History::with_capacity(2);
        h.push(report("a", 1));
        h.push(report("b", 1));
        h.push(report("c", 1));
        assert!(h.get("news:a").is_none());
        assert_eq!(h.get("news:c").unwrap().keyword, "c");
        assert_eq!(h.len(), 2);
    }
}
