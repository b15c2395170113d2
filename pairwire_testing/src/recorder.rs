//! Capture metrics emitted by synchronous code.

use metrics_util::{
    CompositeKey,
    debugging::{DebugValue, DebuggingRecorder},
};

/// Snapshot of every metric recorded during [`capture_metrics`].
#[derive(Debug)]
pub struct MetricsCapture {
    entries: Vec<(CompositeKey, DebugValue)>,
}

impl MetricsCapture {
    /// Sum of counter `name` across entries carrying every label in `labels`.
    #[must_use]
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.matching(name, labels)
            .filter_map(|value| match value {
                DebugValue::Counter(count) => Some(*count),
                _ => None,
            })
            .sum()
    }

    /// Last value of gauge `name`, if recorded.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.matching(name, &[]).find_map(|value| match value {
            DebugValue::Gauge(level) => Some(level.0),
            _ => None,
        })
    }

    fn matching<'a>(
        &'a self,
        name: &'a str,
        labels: &'a [(&'a str, &'a str)],
    ) -> impl Iterator<Item = &'a DebugValue> + 'a {
        self.entries.iter().filter_map(move |(key, value)| {
            let key = key.key();
            let labelled = labels.iter().all(|(label, expected)| {
                key.labels()
                    .any(|l| l.key() == *label && l.value() == *expected)
            });
            (key.name() == name && labelled).then_some(value)
        })
    }
}

/// Run `f` with a local debugging recorder and snapshot what it recorded.
pub fn capture_metrics<R>(f: impl FnOnce() -> R) -> (R, MetricsCapture) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let result = metrics::with_local_recorder(&recorder, f);
    let entries = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, value)| (key, value))
        .collect();
    (result, MetricsCapture { entries })
}
