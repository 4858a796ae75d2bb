//! Invocation-scoped logging
//!
//! An [`ObservationScope`] logs its begin event on creation and exactly one
//! outcome: completion, rejection, or (when dropped unresolved) a warning.

use std::time::Instant;

use super::events::Event;
use super::logger::{Logger, Severity};

/// Logs the lifecycle of one engine invocation
pub struct ObservationScope {
    begin: Event,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    resolved: bool,
}

impl ObservationScope {
    /// Logs `begin` with `fields`; the fields are repeated on the outcome
    pub fn new(begin: Event, fields: &[(&'static str, String)]) -> Self {
        let scope = Self {
            begin,
            fields: fields.to_vec(),
            started: Instant::now(),
            resolved: false,
        };
        scope.emit(begin.severity(), begin.as_str(), &[]);
        scope
    }

    fn emit(&self, severity: Severity, event: &str, extra: &[(&str, &str)]) {
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend_from_slice(extra);
        Logger::log(severity, event, &all);
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    pub fn complete(self, extra: &[(&str, &str)]) {
        self.resolve(true, extra);
    }

    pub fn fail(self, reason: &str) {
        self.resolve(false, &[("reason", reason)]);
    }

    fn resolve(mut self, ok: bool, extra: &[(&str, &str)]) {
        self.resolved = true;
        let elapsed = self.elapsed_ms();
        let mut fields = extra.to_vec();
        fields.push(("elapsed_ms", &elapsed));

        match (self.begin.outcomes(), ok) {
            (Some((complete, _)), true) => self.emit(complete.severity(), complete.as_str(), &fields),
            (Some((_, rejected)), false) => self.emit(rejected.severity(), rejected.as_str(), &fields),
            (None, true) => self.emit(Severity::Info, &format!("{}_COMPLETE", self.begin), &fields),
            (None, false) => self.emit(Severity::Error, &format!("{}_FAILED", self.begin), &fields),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.resolved {
            let event = format!("{}_INCOMPLETE", self.begin);
            self.emit(Severity::Warn, &event, &[("reason", "scope dropped without outcome")]);
        }
    }
}
