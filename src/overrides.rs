use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::fixtures::{Bracket, Source};
use crate::group::PriorResults;

/// A real group-stage score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub home: String,
    pub away: String,
    pub home_goals: u32,
    pub away_goals: u32,
}

/// Outcomes that already happened. Each one replaces the random draw for its
/// match in every trial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActualResults {
    #[serde(default)]
    pub group_matches: Vec<MatchScore>,
    /// Match number -> winning team.
    #[serde(default)]
    pub knockout_winners: BTreeMap<u32, String>,
    /// Match number -> group whose third-placed team took that match's
    /// best-third side.
    #[serde(default)]
    pub third_place_slots: BTreeMap<u32, char>,
}

impl ActualResults {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read results file {}", path.display()))?;
        serde_json::from_str(&raw).context("invalid results json")
    }

    pub fn is_empty(&self) -> bool {
        self.group_matches.is_empty()
            && self.knockout_winners.is_empty()
            && self.third_place_slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.group_matches.len() + self.knockout_winners.len() + self.third_place_slots.len()
    }

    pub fn compile(&self, bracket: &Bracket) -> Result<CompiledResults, SimError> {
        let mut out = CompiledResults::none(bracket);
        let mut seen = HashSet::new();

        for score in &self.group_matches {
            let home = team_id(bracket, &score.home)?;
            let away = team_id(bracket, &score.away)?;
            if home == away {
                return Err(SimError::OverrideMismatch(format!(
                    "{} cannot play itself",
                    score.home
                )));
            }
            let (Some(gh), Some(ga)) = (bracket.group_of(home), bracket.group_of(away)) else {
                return Err(SimError::OverrideMismatch(format!(
                    "{} vs {} has no group",
                    score.home, score.away
                )));
            };
            if gh != ga {
                return Err(SimError::OverrideMismatch(format!(
                    "{} and {} are not in the same group",
                    score.home, score.away
                )));
            }
            if !seen.insert((home.min(away), home.max(away))) {
                return Err(SimError::OverrideMismatch(format!(
                    "{} vs {} recorded twice",
                    score.home, score.away
                )));
            }
            let roster = &bracket.groups()[gh].teams;
            let i = roster.iter().position(|t| *t == home).unwrap_or_default();
            let j = roster.iter().position(|t| *t == away).unwrap_or_default();
            out.group_priors[gh].set(i, j, score.home_goals, score.away_goals);
        }

        for (number, id) in &self.third_place_slots {
            let slot = bracket
                .third_slots()
                .iter()
                .position(|s| s.fixture == *number)
                .ok_or_else(|| {
                    SimError::OverrideMismatch(format!("match {number} has no best-third side"))
                })?;
            let group = bracket
                .group_index(*id)
                .ok_or_else(|| SimError::OverrideMismatch(format!("unknown group {id}")))?;
            if bracket.third_slots()[slot].pool & (1u16 << group) == 0 {
                return Err(SimError::OverrideMismatch(format!(
                    "group {id} is not eligible for the best-third side of match {number}"
                )));
            }
            pin_third(&mut out.third_pins, slot, group, bracket)?;
        }

        for (number, winner) in &self.knockout_winners {
            let idx = bracket.fixture_index(*number).ok_or_else(|| {
                SimError::OverrideMismatch(format!("no knockout match {number}"))
            })?;
            let team = team_id(bracket, winner)?;
            let group = bracket.group_of(team).ok_or_else(|| {
                SimError::OverrideMismatch(format!("{winner} has no group"))
            })?;

            let mut thirds = Vec::new();
            let via_group = entry_points(bracket, idx, group, &mut thirds);
            match (via_group, thirds.as_slice()) {
                (false, []) => {
                    return Err(SimError::OverrideMismatch(format!(
                        "{winner} cannot reach match {number}"
                    )));
                }
                // Only way in is one best-third side, so the seating is known.
                (false, [slot]) => pin_third(&mut out.third_pins, *slot, group, bracket)?,
                _ => {}
            }
            out.knockout_winners[idx] = Some(team);
        }

        Ok(out)
    }
}

/// Walks the feeders of fixture `idx`. Returns whether a team of `group` can
/// arrive as a group winner or runner-up, and pushes every best-third slot
/// whose pool admits `group`.
fn entry_points(bracket: &Bracket, idx: usize, group: usize, thirds: &mut Vec<usize>) -> bool {
    let fixture = &bracket.fixtures()[idx];
    let mut via_group = false;
    for source in [fixture.home, fixture.away] {
        match source {
            Source::Group { group: g, .. } => via_group |= g == group,
            Source::Third { slot } => {
                if bracket.third_slots()[slot].pool & (1u16 << group) != 0 {
                    thirds.push(slot);
                }
            }
            Source::Winner(src) | Source::Loser(src) => {
                via_group |= entry_points(bracket, src, group, thirds);
            }
        }
    }
    via_group
}

fn pin_third(pins: &mut [Option<usize>], slot: usize, group: usize, bracket: &Bracket) -> Result<(), SimError> {
    let fixture = bracket.third_slots()[slot].fixture;
    let id = bracket.groups()[group].id;
    if let Some(other) = pins[slot]
        && other != group
    {
        return Err(SimError::OverrideMismatch(format!(
            "best-third side of match {fixture} recorded as both group {} and group {id}",
            bracket.groups()[other].id
        )));
    }
    if let Some(elsewhere) = pins.iter().position(|p| *p == Some(group))
        && elsewhere != slot
    {
        return Err(SimError::OverrideMismatch(format!(
            "third of group {id} recorded in both match {} and match {fixture}",
            bracket.third_slots()[elsewhere].fixture
        )));
    }
    pins[slot] = Some(group);
    Ok(())
}

fn team_id(bracket: &Bracket, name: &str) -> Result<usize, SimError> {
    bracket
        .team_id(name.trim())
        .ok_or_else(|| SimError::OverrideMismatch(format!("unknown team {name}")))
}

/// Results keyed the way a trial looks them up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledResults {
    /// By group index.
    pub group_priors: Vec<PriorResults>,
    /// By fixture index.
    pub knockout_winners: Vec<Option<usize>>,
    /// By third-place slot: the group that must be seated there.
    pub third_pins: Vec<Option<usize>>,
}

impl CompiledResults {
    pub fn none(bracket: &Bracket) -> Self {
        Self {
            group_priors: vec![PriorResults::default(); bracket.groups().len()],
            knockout_winners: vec![None; bracket.fixtures().len()],
            third_pins: vec![None; bracket.third_slots().len()],
        }
    }

    pub fn recorded_group_matches(&self) -> usize {
        self.group_priors.iter().map(PriorResults::len).sum()
    }
}
