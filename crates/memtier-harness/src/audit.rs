//! Classification of captured program output.

use std::collections::BTreeMap;

use memtier_core::message::{LineClass, classify_line};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MalformedLine {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub total: usize,
    pub application: usize,
    pub errors: usize,
    pub init: usize,
    /// Call lines per intercepted symbol.
    pub calls: BTreeMap<&'static str, usize>,
    pub malformed: Vec<MalformedLine>,
}

impl AuditReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
    }
}

#[must_use]
pub fn audit(output: &str) -> AuditReport {
    let mut report = AuditReport::default();
    for (idx, line) in output.lines().enumerate() {
        report.total += 1;
        match classify_line(line) {
            LineClass::Application => report.application += 1,
            LineClass::Error => report.errors += 1,
            LineClass::Init(_) => report.init += 1,
            LineClass::Call(event) => *report.calls.entry(event.symbol()).or_default() += 1,
            LineClass::Malformed => report.malformed.push(MalformedLine {
                line: idx + 1,
                text: line.to_string(),
            }),
        }
    }
    report
}
