use log::warn;
use rand::Rng;

use crate::error::SimError;
use crate::fixtures::{Bracket, Source, mask_to_ids};
use crate::group::{GroupTable, TieBreak, resolve_group};
use crate::knockout::{self, Decider, Side};
use crate::overrides::CompiledResults;
use crate::scoring::MatchContext;
use crate::third_place::{ThirdPlaceRecord, assign_third_place_pinned, qualifying_mask, rank_thirds};

/// Read-only inputs shared by every trial of a run.
#[derive(Debug, Clone, Copy)]
pub struct TrialContext<'a> {
    pub bracket: &'a Bracket,
    pub matches: &'a MatchContext,
    pub results: &'a CompiledResults,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureResult {
    pub home: usize,
    pub away: usize,
    pub winner: usize,
    pub loser: usize,
    pub decided_by: Decider,
    pub home_goals: u32,
    pub away_goals: u32,
}

#[derive(Debug, Clone)]
pub struct TrialOutcome {
    /// By group index.
    pub groups: Vec<GroupTable>,
    /// All third-placed teams, best first.
    pub thirds: Vec<ThirdPlaceRecord>,
    pub qualifying_thirds: u16,
    /// Group index seated in each third-place slot.
    pub third_assignment: Vec<usize>,
    /// By fixture index.
    pub fixtures: Vec<FixtureResult>,
}

impl TrialOutcome {
    pub fn champion(&self, bracket: &Bracket) -> Option<usize> {
        bracket
            .final_index()
            .and_then(|idx| self.fixtures.get(idx))
            .map(|f| f.winner)
    }
}

/// One full tournament: every group, the third-place draw, then each knockout
/// fixture once, feeders before dependents.
pub fn run_trial<R: Rng>(rng: &mut R, ctx: &TrialContext<'_>) -> Result<TrialOutcome, SimError> {
    let bracket = ctx.bracket;

    let mut groups = Vec::with_capacity(bracket.groups().len());
    for (group, prior) in bracket.groups().iter().zip(&ctx.results.group_priors) {
        groups.push(resolve_group(rng, ctx.matches, &group.teams, prior, ctx.tie_break));
    }

    let mut thirds: Vec<ThirdPlaceRecord> = groups
        .iter()
        .enumerate()
        .map(|(gi, table)| ThirdPlaceRecord {
            group: gi,
            standing: table.standings[2],
        })
        .collect();
    rank_thirds(&mut thirds);

    let slots = bracket.third_slots();
    let qualifying_thirds = qualifying_mask(&thirds, slots.len());
    let third_assignment = if slots.is_empty() {
        Vec::new()
    } else {
        let pins = &ctx.results.third_pins;
        assign_third_place_pinned(rng, qualifying_thirds, slots, pins).ok_or_else(|| {
            let ids = mask_to_ids(qualifying_thirds, bracket.groups());
            if pins.iter().any(Option::is_some) {
                SimError::OverrideMismatch(format!(
                    "recorded third-place seating does not fit qualifying groups {ids}"
                ))
            } else {
                warn!("third-place backtracking exhausted for groups {ids}");
                SimError::AssignmentExhausted(ids)
            }
        })?
    };

    let mut resolved: Vec<Option<FixtureResult>> = vec![None; bracket.fixtures().len()];
    for &idx in bracket.order() {
        let fixture = &bracket.fixtures()[idx];
        let home = participant(fixture.home, &groups, &third_assignment, &resolved, fixture.number)?;
        let away = participant(fixture.away, &groups, &third_assignment, &resolved, fixture.number)?;

        let result = match ctx.results.knockout_winners.get(idx).copied().flatten() {
            Some(winner) => {
                if winner != home && winner != away {
                    return Err(SimError::OverrideMismatch(format!(
                        "match {}: recorded winner {} is neither {} nor {}",
                        fixture.number,
                        bracket.team_name(winner),
                        bracket.team_name(home),
                        bracket.team_name(away)
                    )));
                }
                FixtureResult {
                    home,
                    away,
                    winner,
                    loser: if winner == home { away } else { home },
                    decided_by: Decider::Recorded,
                    home_goals: 0,
                    away_goals: 0,
                }
            }
            None => {
                let out = knockout::resolve(rng, ctx.matches, home, away);
                let (winner, loser) = match out.winner {
                    Side::Home => (home, away),
                    Side::Away => (away, home),
                };
                FixtureResult {
                    home,
                    away,
                    winner,
                    loser,
                    decided_by: out.decided_by,
                    home_goals: out.home_goals,
                    away_goals: out.away_goals,
                }
            }
        };
        resolved[idx] = Some(result);
    }

    let fixtures = resolved
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| SimError::MalformedConfig("fixture left unresolved".to_string()))?;

    Ok(TrialOutcome {
        groups,
        thirds,
        qualifying_thirds,
        third_assignment,
        fixtures,
    })
}

fn participant(
    source: Source,
    groups: &[GroupTable],
    third_assignment: &[usize],
    resolved: &[Option<FixtureResult>],
    number: u32,
) -> Result<usize, SimError> {
    let team = match source {
        Source::Group { group, position } => groups.get(group).map(|t| t.team_at(position)),
        Source::Third { slot } => third_assignment
            .get(slot)
            .and_then(|g| groups.get(*g))
            .map(|t| t.team_at(2)),
        Source::Winner(src) => resolved.get(src).copied().flatten().map(|r| r.winner),
        Source::Loser(src) => resolved.get(src).copied().flatten().map(|r| r.loser),
    };
    team.ok_or_else(|| SimError::MalformedConfig(format!("match {number} has an unresolved side")))
}
