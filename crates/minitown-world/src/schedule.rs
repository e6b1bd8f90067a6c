//! Schedule loading, rolling, and lookup.
//!
//! Two sources feed an agent's `daily_schedule`:
//!
//! - **preset**: a JSON document keyed by agent name, holding a weekly
//!   goal map and a `dailySchedule` of `{time, action, target?}` entries.
//!   Times are normalized to `HH-MM`, targets default to the action, and
//!   entries are sorted by start time.
//! - **llm**: a `[label, minutes]` duration list rolled into start times
//!   beginning at the wake time, with `醒來` always the first entry.
//!
//! Lookup is last-start-wins: the latest entry whose start time is `<=`
//! the query time is the current activity.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::WorldError;

/// One entry of a daily schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    /// Activity label.
    pub label: String,
    /// Start time, always `HH-MM`.
    pub start: String,
    /// Destination for the activity.
    pub target: String,
}

impl ScheduleItem {
    /// Render as the `[label, start, target]` triple the wire uses.
    pub fn as_triple(&self) -> Vec<String> {
        vec![self.label.clone(), self.start.clone(), self.target.clone()]
    }
}

/// A loaded preset schedule for one agent.
#[derive(Debug, Clone)]
pub struct PresetSchedule {
    /// Monday..Sunday -> daily goal.
    pub weekly: BTreeMap<String, String>,
    /// Start-time-sorted daily items.
    pub daily: Vec<ScheduleItem>,
    /// `HH-MM`, the first item's start.
    pub wake_time: String,
    /// `HH-MM`, the last item's start plus one hour (modulo 24).
    pub sleep_time: String,
}

/// Raw shape of one agent's entry in the schedule file.
#[derive(Debug, Deserialize)]
struct RawAgentSchedule {
    #[serde(rename = "weeklySchedule", default)]
    weekly_schedule: BTreeMap<String, String>,
    #[serde(rename = "dailySchedule", default)]
    daily_schedule: Vec<RawScheduleEntry>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleEntry {
    time: Option<String>,
    action: Option<String>,
    target: Option<String>,
}

/// Parse `HH-MM` or `HH:MM` into minutes since midnight.
pub fn parse_hm(text: &str) -> Option<u32> {
    let normalized = text.trim().replace(':', "-");
    let (hours, minutes) = normalized.split_once('-')?;
    let hours: u32 = hours.trim().parse().ok()?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    if hours < 24 && minutes < 60 {
        Some(hours * 60 + minutes)
    } else {
        None
    }
}

/// Normalize a time string to zero-padded `HH-MM`.
pub fn format_hm(minutes_since_midnight: u32) -> String {
    let total = minutes_since_midnight % (24 * 60);
    format!("{:02}-{:02}", total / 60, total % 60)
}

/// Add minutes to an `HH-MM` time, wrapping past midnight.
pub fn add_minutes(hm: &str, minutes: i64) -> Option<String> {
    let base = i64::from(parse_hm(hm)?);
    let total = (base + minutes).rem_euclid(24 * 60);
    Some(format_hm(u32::try_from(total).ok()?))
}

/// Load the preset schedule for one agent from the schedule file.
pub fn load_preset(path: &Path, agent_name: &str) -> Result<PresetSchedule, WorldError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorldError::ScheduleIo {
        path: path.display().to_string(),
        source,
    })?;
    let all: BTreeMap<String, RawAgentSchedule> =
        serde_json::from_str(&text).map_err(|source| WorldError::ScheduleParse {
            path: path.display().to_string(),
            source,
        })?;
    let raw = all
        .get(agent_name)
        .ok_or_else(|| WorldError::UnknownAgent(agent_name.to_owned()))?;

    let mut daily: Vec<ScheduleItem> = raw
        .daily_schedule
        .iter()
        .filter_map(|entry| {
            let time = entry.time.as_deref()?;
            let action = entry.action.as_deref()?.trim();
            if action.is_empty() {
                return None;
            }
            let start = format_hm(parse_hm(time)?);
            let target = entry
                .target
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| action.to_owned());
            Some(ScheduleItem {
                label: action.to_owned(),
                start,
                target,
            })
        })
        .collect();

    if daily.is_empty() {
        return Err(WorldError::EmptySchedule(agent_name.to_owned()));
    }

    daily.sort_by(|a, b| a.start.cmp(&b.start));

    let wake_time = daily[0].start.clone();
    let last_start = daily[daily.len() - 1].start.clone();
    let sleep_time = add_minutes(&last_start, 60).unwrap_or_else(|| "23-00".to_owned());

    Ok(PresetSchedule {
        weekly: raw.weekly_schedule.clone(),
        daily,
        wake_time,
        sleep_time,
    })
}

/// Roll a `[label, minutes]` duration list into a start-time schedule
/// beginning at the wake time, with `醒來` first.
pub fn roll_schedule(wake_time: &str, tasks: &[(String, i64)]) -> Vec<ScheduleItem> {
    let wake = parse_hm(wake_time).unwrap_or_else(|| {
        warn!(wake_time, "malformed wake time, defaulting to 07-00");
        7 * 60
    });
    let wake_hm = format_hm(wake);

    let mut items = vec![ScheduleItem {
        label: "醒來".to_owned(),
        start: wake_hm.clone(),
        target: "醒來".to_owned(),
    }];

    let mut cursor = i64::from(wake);
    for (label, minutes) in tasks {
        if *minutes <= 0 {
            continue;
        }
        // Entries past midnight would break the non-decreasing start
        // order the lookup relies on; the day simply ends there.
        if cursor >= 24 * 60 {
            break;
        }
        items.push(ScheduleItem {
            label: label.clone(),
            start: format_hm(u32::try_from(cursor).unwrap_or(0)),
            target: label.clone(),
        });
        cursor += minutes;
    }
    items
}

/// Find the current schedule item at `hm`: the latest entry whose start
/// time is `<=` the query. `None` when the list is empty or `hm` is
/// malformed.
pub fn get_current_item<'a>(items: &'a [ScheduleItem], hm: &str) -> Option<&'a ScheduleItem> {
    let now = parse_hm(hm)?;
    let mut best: Option<(&ScheduleItem, u32)> = None;
    for item in items {
        let Some(start) = parse_hm(&item.start) else {
            continue;
        };
        if start <= now {
            match best {
                Some((_, best_start)) if start < best_start => {}
                _ => best = Some((item, start)),
            }
        }
    }
    best.map(|(item, _)| item)
}
