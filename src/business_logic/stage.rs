use serde::Serialize;
use utoipa::ToSchema;

use crate::business_logic::config::{SignalConfig, MS_PER_HOUR};
use crate::business_logic::entry::EntrySignal;
use crate::business_logic::pullback::Right1Signal;

/// Lifecycle stage of a signal, recomputed on every analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Right-1 seen, waiting for the Right-2 close
    Upcoming,
    /// Entry confirmed within the fresh window
    Fresh,
    /// Entry older than the fresh window, target not reached
    Active,
    /// Price already dropped by the realized threshold
    Realized,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Upcoming => "upcoming",
            Stage::Fresh => "fresh",
            Stage::Active => "active",
            Stage::Realized => "realized",
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalDetail {
    Right1(Right1Signal),
    Entry(EntrySignal),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedSignal {
    pub stage: Stage,
    pub description: String,
    pub detail: SignalDetail,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorizedSignals {
    pub upcoming: Vec<ClassifiedSignal>,
    pub fresh: Vec<ClassifiedSignal>,
    pub active: Vec<ClassifiedSignal>,
    pub realized: Vec<ClassifiedSignal>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StageSummary {
    pub upcoming: usize,
    pub fresh: usize,
    pub active: usize,
    pub realized: usize,
    pub total: usize,
}

impl CategorizedSignals {
    /// Signals in report order: upcoming, fresh, active, realized
    pub fn ordered(&self) -> Vec<ClassifiedSignal> {
        self.upcoming
            .iter()
            .chain(&self.fresh)
            .chain(&self.active)
            .chain(&self.realized)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> StageSummary {
        let (upcoming, fresh, active, realized) = (
            self.upcoming.len(),
            self.fresh.len(),
            self.active.len(),
            self.realized.len(),
        );
        StageSummary {
            upcoming,
            fresh,
            active,
            realized,
            total: upcoming + fresh + active + realized,
        }
    }

    fn push(&mut self, signal: ClassifiedSignal) {
        match signal.stage {
            Stage::Upcoming => self.upcoming.push(signal),
            Stage::Fresh => self.fresh.push(signal),
            Stage::Active => self.active.push(signal),
            Stage::Realized => self.realized.push(signal),
        }
    }
}

/// Whole hours elapsed since `since_ms`, truncated toward zero
pub fn hours_since(since_ms: u64, now_ms: u64) -> i64 {
    (now_ms as i64 - since_ms as i64) / MS_PER_HOUR as i64
}

/// Stage for a confirmed entry. Realized takes priority over fresh.
pub fn classify_entry(signal: &EntrySignal, config: &SignalConfig, now_ms: u64) -> Stage {
    if signal.performance_percent <= -config.realized_drop_pct {
        Stage::Realized
    } else if hours_since(signal.entry_timestamp, now_ms) <= config.fresh_hours {
        Stage::Fresh
    } else {
        Stage::Active
    }
}

fn describe(stage: Stage, performance_percent: f64) -> String {
    match stage {
        Stage::Upcoming => "Right-1 stage - waiting for the next candle to confirm".to_string(),
        Stage::Realized => format!("Realized drop {:.2}%", performance_percent.abs()),
        Stage::Fresh => format!("Freshly confirmed - {:+.2}%", performance_percent),
        Stage::Active => format!("Active signal - {:+.2}%", performance_percent),
    }
}

/// Partition signals into stages. Right-1 candidates are always upcoming.
pub fn categorize_signals(
    entries: Vec<EntrySignal>,
    right1: Option<Right1Signal>,
    config: &SignalConfig,
    now_ms: u64,
) -> CategorizedSignals {
    let mut categorized = CategorizedSignals::default();

    if let Some(signal) = right1 {
        categorized.push(ClassifiedSignal {
            stage: Stage::Upcoming,
            description: describe(Stage::Upcoming, 0.0),
            detail: SignalDetail::Right1(signal),
        });
    }

    for entry in entries {
        let stage = classify_entry(&entry, config, now_ms);
        categorized.push(ClassifiedSignal {
            stage,
            description: describe(stage, entry.performance_percent),
            detail: SignalDetail::Entry(entry),
        });
    }

    categorized
}
