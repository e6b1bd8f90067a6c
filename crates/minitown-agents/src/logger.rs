//! The disaster logger: append-only event records and final scoring.
//!
//! Events are recorded per agent as `(timestamp, kind, details)` and
//! folded into four scores at report time:
//!
//! - loss: `max(0, 10 - total_damage/10)`
//! - response: `max(0, 10 - max(0, reaction_seconds - 5)/55 * 10)`
//! - cooperation: `min(10, 2.5 * effective_helps)` where a help counts
//!   when the helped peer's final HP exceeds their HP at help time
//! - penalty: `2 * quarrels`, subtracted from the clamped total

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use minitown_types::wire::{EvaluationReport, ScoreDetail};
use minitown_types::DisasterEventKind;

/// One recorded event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub at: NaiveDateTime,
    pub kind: DisasterEventKind,
    pub details: BTreeMap<String, Value>,
}

/// Append-only per-agent event log for one run.
#[derive(Debug, Default)]
pub struct DisasterLogger {
    events: BTreeMap<String, Vec<EventRecord>>,
    disaster_start: Option<NaiveDateTime>,
}

impl DisasterLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the simulated instant the disaster began.
    pub fn set_disaster_start(&mut self, at: NaiveDateTime) {
        debug!(%at, "disaster clock started");
        self.disaster_start = Some(at);
    }

    /// Record one event. Before the disaster clock starts only `初始化`
    /// events are kept.
    pub fn record(
        &mut self,
        agent_id: &str,
        kind: DisasterEventKind,
        at: NaiveDateTime,
        details: BTreeMap<String, Value>,
    ) {
        if self.disaster_start.is_none() && kind != DisasterEventKind::Init {
            return;
        }
        self.events
            .entry(agent_id.to_owned())
            .or_default()
            .push(EventRecord { at, kind, details });
    }

    /// Events recorded for one agent so far.
    pub fn events_for(&self, agent_id: &str) -> &[EventRecord] {
        self.events.get(agent_id).map_or(&[], Vec::as_slice)
    }

    /// Compute the per-agent scores given each agent's final HP.
    pub fn compute_scores(&self, final_hp: &BTreeMap<String, i32>) -> BTreeMap<String, ScoreDetail> {
        let mut scores = BTreeMap::new();

        for (agent_id, events) in &self.events {
            let mut total_loss = 0.0_f64;
            let mut reaction_seconds: Option<f64> = None;
            let mut coop_events: Vec<&BTreeMap<String, Value>> = Vec::new();
            let mut quarrels = 0u32;

            for event in events {
                match event.kind {
                    DisasterEventKind::Loss => {
                        total_loss += event
                            .details
                            .get("value")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);
                    }
                    DisasterEventKind::Reaction => {
                        if let Some(start) = self.disaster_start {
                            let seconds = (event.at - start).num_seconds() as f64;
                            reaction_seconds = Some(match reaction_seconds {
                                Some(best) => best.min(seconds),
                                None => seconds,
                            });
                        }
                    }
                    DisasterEventKind::Cooperation => coop_events.push(&event.details),
                    DisasterEventKind::Quarrel => quarrels += 1,
                    DisasterEventKind::Init => {}
                }
            }

            let loss_score = (10.0 - total_loss / 10.0).max(0.0);
            let response_score = reaction_seconds
                .map(|seconds| (10.0 - ((seconds - 5.0).max(0.0) / 55.0) * 10.0).max(0.0))
                .unwrap_or(0.0);

            let effective = coop_events
                .iter()
                .filter(|details| {
                    let helped = details.get("受助者").and_then(Value::as_str);
                    let original = details.get("原始HP").and_then(Value::as_i64);
                    match (helped, original) {
                        (Some(helped), Some(original)) => final_hp
                            .get(helped)
                            .is_some_and(|hp| i64::from(*hp) > original),
                        _ => false,
                    }
                })
                .count();

            let coop_score = (2.5 * effective as f64).min(10.0);
            let penalty = 2.0 * f64::from(quarrels);
            let total = (loss_score + response_score + coop_score - penalty).max(0.0);

            scores.insert(
                agent_id.clone(),
                ScoreDetail {
                    loss_score: round2(loss_score),
                    response_score: round2(response_score),
                    coop_score: round2(coop_score),
                    total_score: round2(total),
                    cooperation_count: coop_events.len() as u32,
                    notes: format!(
                        "記錄合作 {} 次, 有效合作 {effective} 次, 爭吵 {quarrels} 次",
                        coop_events.len()
                    ),
                },
            );
        }

        scores
    }

    /// Build the final report: scores plus a fixed-width text table with
    /// per-agent notes.
    pub fn generate_report(&self, final_hp: &BTreeMap<String, i32>) -> EvaluationReport {
        let scores = self.compute_scores(final_hp);

        let headers = ["代理人", "總分", "損失", "反應", "合作", "合作次數"];
        let mut rows: Vec<Vec<String>> = Vec::new();
        for (agent_id, detail) in &scores {
            rows.push(vec![
                agent_id.clone(),
                format!("{:.2}", detail.total_score),
                format!("{:.2}", detail.loss_score),
                format!("{:.2}", detail.response_score),
                format!("{:.2}", detail.coop_score),
                detail.cooperation_count.to_string(),
            ]);
        }

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let mut lines = vec!["--- 災難模擬評分報表 ---".to_owned(), String::new()];
        if !rows.is_empty() {
            lines.push(
                headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| pad(h, widths[i]))
                    .collect::<Vec<_>>()
                    .join("  "),
            );
            lines.push("-".repeat(widths.iter().sum::<usize>() + 2 * (headers.len() - 1)));
            for (row, (_, detail)) in rows.iter().zip(scores.iter()) {
                lines.push(
                    row.iter()
                        .enumerate()
                        .map(|(i, cell)| pad(cell, widths[i]))
                        .collect::<Vec<_>>()
                        .join("  "),
                );
                lines.push(format!("  • {}", detail.notes));
            }
        }

        EvaluationReport {
            text: lines.join("\n"),
            scores,
        }
    }
}

/// Round to two decimals.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Left-pad to a character count (CJK-aware enough for this table).
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let mut out = text.to_owned();
    for _ in len..width {
        out.push(' ');
    }
    out
}
