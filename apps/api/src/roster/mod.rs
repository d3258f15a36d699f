//! Duty roster: which prosecutor answers for a position on a given day of the month.

pub mod handlers;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignee {
    pub name: String,
    pub gender: Gender,
}

impl Assignee {
    /// Line injected into the CASE_FIELDS group of a draft.
    pub fn case_field_line(&self) -> String {
        let title = match self.gender {
            Gender::Male => "Promotor de Justiça designado",
            Gender::Female => "Promotora de Justiça designada",
        };
        format!("- {}: {}", title, self.name)
    }
}

/// Looks up the assignee for a position. Seam for tests and other roster sources.
pub trait AssigneeResolver: Send + Sync {
    fn resolve_assignee(&self, position: &str, day: u32) -> Option<Assignee>;
}

#[derive(Debug, Clone, Deserialize)]
struct ScheduleEntry {
    name: String,
    gender: Gender,
    start: u32,
    end: u32,
}

impl ScheduleEntry {
    fn covers(&self, day: u32) -> bool {
        (self.start..=self.end).contains(&day)
    }

    fn assignee(&self) -> Assignee {
        Assignee {
            name: self.name.clone(),
            gender: self.gender,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PositionDef {
    id: u32,
    label: String,
    schedule: Vec<ScheduleEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct DutyRoster {
    positions: Vec<PositionDef>,
}

impl DutyRoster {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            positions: serde_json::from_str(raw)?,
        })
    }

    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read roster file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Roster file {} is not valid", path.display()))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    fn position(&self, key: &str) -> Option<&PositionDef> {
        let key = key.trim();
        self.positions
            .iter()
            .find(|p| p.id.to_string() == key || p.label.eq_ignore_ascii_case(key))
    }
}

impl AssigneeResolver for DutyRoster {
    /// First entry whose inclusive `[start, end]` range covers the day. When no
    /// range does, the position's first entry answers.
    fn resolve_assignee(&self, position: &str, day: u32) -> Option<Assignee> {
        let schedule = &self.position(position)?.schedule;
        schedule
            .iter()
            .find(|entry| entry.covers(day))
            .or_else(|| schedule.first())
            .map(ScheduleEntry::assignee)
    }
}
