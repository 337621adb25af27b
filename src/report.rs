use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::bracket::TrialOutcome;
use crate::fixtures::{Bracket, GROUP_SIZE, Round};
use crate::group::TieBreak;
use crate::knockout::Decider;
use crate::market::{GroupTableSource, MarketOdds};
use crate::ratings::RatingSource;
use crate::scoring::{MatchContext, ScoreSampling};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RoundOf32,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    Final,
    Champion,
    ThirdPlace,
}

pub const STAGE_COUNT: usize = 7;

impl Stage {
    /// Stage reached by playing in a fixture of `round`.
    pub fn reached_by(round: Round) -> Option<Stage> {
        match round {
            Round::RoundOf32 => Some(Stage::RoundOf32),
            Round::RoundOf16 => Some(Stage::RoundOf16),
            Round::QuarterFinal => Some(Stage::QuarterFinal),
            Round::SemiFinal => Some(Stage::SemiFinal),
            Round::Final => Some(Stage::Final),
            Round::Group | Round::ThirdPlace => None,
        }
    }
}

/// Raw per-team counters for a batch of trials. Everything is indexed by team
/// id, or by fixture index then team id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub trials: u32,
    teams: usize,
    pub group_position: Vec<[u32; GROUP_SIZE]>,
    pub third_qualified: Vec<u32>,
    pub reached: Vec<[u32; STAGE_COUNT]>,
    pub fixture_appear: Vec<u32>,
    pub fixture_wins: Vec<u32>,
    /// Per fixture: won in extra time, won on penalties.
    pub fixture_deciders: Vec<[u32; 2]>,
}

impl Tally {
    pub fn new(teams: usize, fixtures: usize) -> Self {
        Self {
            trials: 0,
            teams,
            group_position: vec![[0; GROUP_SIZE]; teams],
            third_qualified: vec![0; teams],
            reached: vec![[0; STAGE_COUNT]; teams],
            fixture_appear: vec![0; teams * fixtures],
            fixture_wins: vec![0; teams * fixtures],
            fixture_deciders: vec![[0; 2]; fixtures],
        }
    }

    pub fn for_bracket(bracket: &Bracket) -> Self {
        Self::new(bracket.teams().len(), bracket.fixtures().len())
    }

    pub fn add(&mut self, outcome: &TrialOutcome, bracket: &Bracket) {
        self.trials += 1;

        for (gi, table) in outcome.groups.iter().enumerate() {
            for (pos, standing) in table.standings.iter().enumerate() {
                self.group_position[standing.team][pos] += 1;
            }
            if outcome.qualifying_thirds & (1 << gi) != 0 {
                self.third_qualified[table.team_at(2)] += 1;
            }
        }

        for (idx, result) in outcome.fixtures.iter().enumerate() {
            let fixture = &bracket.fixtures()[idx];
            let base = idx * self.teams;
            self.fixture_appear[base + result.home] += 1;
            self.fixture_appear[base + result.away] += 1;
            self.fixture_wins[base + result.winner] += 1;
            match result.decided_by {
                Decider::ExtraTime => self.fixture_deciders[idx][0] += 1,
                Decider::Penalties => self.fixture_deciders[idx][1] += 1,
                Decider::Regulation | Decider::Recorded => {}
            }

            if let Some(stage) = Stage::reached_by(fixture.round) {
                self.reached[result.home][stage as usize] += 1;
                self.reached[result.away][stage as usize] += 1;
            }
            match fixture.round {
                Round::Final => self.reached[result.winner][Stage::Champion as usize] += 1,
                Round::ThirdPlace => self.reached[result.winner][Stage::ThirdPlace as usize] += 1,
                _ => {}
            }
        }
    }

    /// Element-wise sum.
    pub fn merge(mut self, other: Tally) -> Tally {
        self.trials += other.trials;
        for (a, b) in self.group_position.iter_mut().zip(&other.group_position) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        for (a, b) in self.reached.iter_mut().zip(&other.reached) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        for (a, b) in self.fixture_deciders.iter_mut().zip(&other.fixture_deciders) {
            for (x, y) in a.iter_mut().zip(b) {
                *x += y;
            }
        }
        add_into(&mut self.third_qualified, &other.third_qualified);
        add_into(&mut self.fixture_appear, &other.fixture_appear);
        add_into(&mut self.fixture_wins, &other.fixture_wins);
        self
    }
}

fn add_into(dst: &mut [u32], src: &[u32]) {
    for (x, y) in dst.iter_mut().zip(src) {
        *x += y;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupRow {
    pub team: String,
    pub rating: f64,
    /// P(1st), P(2nd), P(3rd), P(4th).
    pub p_position: [f64; GROUP_SIZE],
    pub p_qualify_third: f64,
    /// Top two or one of the best thirds.
    pub p_advance: f64,
    pub p_win_group: f64,
    /// Top two.
    pub p_qualify: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: char,
    pub source: GroupTableSource,
    pub rows: Vec<GroupRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureParticipant {
    pub team: String,
    pub p_appear: f64,
    pub p_win: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureReport {
    pub number: u32,
    pub round: Round,
    pub venue: String,
    pub home_label: String,
    pub away_label: String,
    pub p_extra_time: f64,
    pub p_penalties: f64,
    /// Most likely winner first.
    pub participants: Vec<FixtureParticipant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamAdvancement {
    pub team: String,
    pub group: char,
    pub rating: f64,
    pub p_round_of_32: f64,
    pub p_round_of_16: f64,
    pub p_quarter_final: f64,
    pub p_semi_final: f64,
    pub p_final: f64,
    pub p_champion: f64,
    pub p_third_place: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueShare {
    pub venue: String,
    pub round: Round,
    pub p_appear: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VenueBreakdown {
    pub team: String,
    pub venues: Vec<VenueShare>,
}

/// Analytical odds for one group-stage pairing.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOddsRow {
    pub group: char,
    pub home: String,
    pub away: String,
    pub home_rating: f64,
    pub away_rating: f64,
    pub lambda_home: f64,
    pub lambda_away: f64,
    pub p_home: f64,
    pub p_draw: f64,
    pub p_away: f64,
}

/// Run metadata carried into the report.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub seed: u64,
    pub rating_source: RatingSource,
    pub ratings_updated: String,
    pub score_sampling: ScoreSampling,
    pub tie_break: TieBreak,
    pub recorded_results: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub tournament: String,
    pub generated_at: String,
    pub trials: u32,
    pub seed: u64,
    pub rating_source: RatingSource,
    pub ratings_updated: String,
    pub score_sampling: ScoreSampling,
    pub tie_break: TieBreak,
    pub recorded_results: usize,
    pub groups: Vec<GroupReport>,
    pub fixtures: Vec<FixtureReport>,
    /// Most likely champion first.
    pub teams: Vec<TeamAdvancement>,
    pub venues: Vec<VenueBreakdown>,
    pub match_odds: Vec<MatchOddsRow>,
}

impl SimulationReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize report")
    }

    pub fn group(&self, id: char) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group == id)
    }

    pub fn team(&self, name: &str) -> Option<&TeamAdvancement> {
        self.teams.iter().find(|t| t.team == name)
    }

    pub fn fixture(&self, number: u32) -> Option<&FixtureReport> {
        self.fixtures.iter().find(|f| f.number == number)
    }

    /// Swap in market-implied group probabilities where quotes exist. The
    /// position distribution stays simulated.
    pub fn apply_market(&mut self, market: &BTreeMap<char, BTreeMap<String, MarketOdds>>) {
        for group in &mut self.groups {
            let Some(quotes) = market.get(&group.group) else {
                continue;
            };
            let mut used = false;
            for row in &mut group.rows {
                let Some(odds) = quotes.get(&row.team) else {
                    continue;
                };
                if let Some(p) = odds.p_win_group {
                    row.p_win_group = p;
                    used = true;
                }
                if let Some(p) = odds.p_qualify {
                    row.p_qualify = p;
                    used = true;
                }
            }
            if used {
                group.source = GroupTableSource::Market;
            }
        }
    }
}

pub fn build_report(bracket: &Bracket, tally: &Tally, ctx: &MatchContext, meta: ReportMeta) -> SimulationReport {
    let n = f64::from(tally.trials.max(1));
    let p = |count: u32| f64::from(count) / n;

    let groups = bracket
        .groups()
        .iter()
        .map(|group| {
            let mut rows: Vec<GroupRow> = group
                .teams
                .iter()
                .map(|&team| {
                    let p_position = tally.group_position[team].map(p);
                    let p_qualify_third = p(tally.third_qualified[team]);
                    let p_qualify = p_position[0] + p_position[1];
                    GroupRow {
                        team: bracket.team_name(team).to_string(),
                        rating: ctx.rating(team),
                        p_position,
                        p_qualify_third,
                        p_advance: p_qualify + p_qualify_third,
                        p_win_group: p_position[0],
                        p_qualify,
                    }
                })
                .collect();
            rows.sort_by(|a, b| {
                b.p_position[0]
                    .total_cmp(&a.p_position[0])
                    .then(b.p_advance.total_cmp(&a.p_advance))
            });
            GroupReport {
                group: group.id,
                source: GroupTableSource::Simulated,
                rows,
            }
        })
        .collect();

    let teams_n = bracket.teams().len();
    let fixtures = bracket
        .fixtures()
        .iter()
        .enumerate()
        .map(|(idx, f)| {
            let base = idx * teams_n;
            let mut participants: Vec<FixtureParticipant> = (0..teams_n)
                .filter(|t| tally.fixture_appear[base + t] > 0)
                .map(|t| FixtureParticipant {
                    team: bracket.team_name(t).to_string(),
                    p_appear: p(tally.fixture_appear[base + t]),
                    p_win: p(tally.fixture_wins[base + t]),
                })
                .collect();
            participants.sort_by(|a, b| b.p_win.total_cmp(&a.p_win).then(b.p_appear.total_cmp(&a.p_appear)));
            let [extra_time, penalties] = tally.fixture_deciders[idx];
            FixtureReport {
                number: f.number,
                round: f.round,
                venue: bracket.venues().get(f.venue).cloned().unwrap_or_default(),
                home_label: f.home_label.clone(),
                away_label: f.away_label.clone(),
                p_extra_time: p(extra_time),
                p_penalties: p(penalties),
                participants,
            }
        })
        .collect();

    let mut teams: Vec<TeamAdvancement> = (0..teams_n)
        .map(|t| {
            let r = tally.reached[t].map(p);
            TeamAdvancement {
                team: bracket.team_name(t).to_string(),
                group: bracket
                    .group_of(t)
                    .map(|g| bracket.groups()[g].id)
                    .unwrap_or('?'),
                rating: ctx.rating(t),
                p_round_of_32: r[Stage::RoundOf32 as usize],
                p_round_of_16: r[Stage::RoundOf16 as usize],
                p_quarter_final: r[Stage::QuarterFinal as usize],
                p_semi_final: r[Stage::SemiFinal as usize],
                p_final: r[Stage::Final as usize],
                p_champion: r[Stage::Champion as usize],
                p_third_place: r[Stage::ThirdPlace as usize],
            }
        })
        .collect();
    teams.sort_by(|a, b| {
        b.p_champion
            .total_cmp(&a.p_champion)
            .then(b.p_final.total_cmp(&a.p_final))
            .then(a.team.cmp(&b.team))
    });

    SimulationReport {
        tournament: bracket.name().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        trials: tally.trials,
        seed: meta.seed,
        rating_source: meta.rating_source,
        ratings_updated: meta.ratings_updated,
        score_sampling: meta.score_sampling,
        tie_break: meta.tie_break,
        recorded_results: meta.recorded_results,
        groups,
        fixtures,
        teams,
        venues: venue_breakdown(bracket, tally),
        match_odds: group_match_odds(bracket, ctx),
    }
}

fn venue_breakdown(bracket: &Bracket, tally: &Tally) -> Vec<VenueBreakdown> {
    let teams_n = bracket.teams().len();
    let n = f64::from(tally.trials.max(1));
    (0..teams_n)
        .filter_map(|t| {
            let mut shares: BTreeMap<(Round, usize), u32> = BTreeMap::new();
            for (idx, f) in bracket.fixtures().iter().enumerate() {
                let count = tally.fixture_appear[idx * teams_n + t];
                if count > 0 {
                    *shares.entry((f.round, f.venue)).or_default() += count;
                }
            }
            if shares.is_empty() {
                return None;
            }
            let venues = shares
                .into_iter()
                .map(|((round, venue), count)| VenueShare {
                    venue: bracket.venues().get(venue).cloned().unwrap_or_default(),
                    round,
                    p_appear: f64::from(count) / n,
                })
                .collect();
            Some(VenueBreakdown {
                team: bracket.team_name(t).to_string(),
                venues,
            })
        })
        .collect()
}

/// W/D/L for all six pairings in every group, straight from the goal model.
pub fn group_match_odds(bracket: &Bracket, ctx: &MatchContext) -> Vec<MatchOddsRow> {
    let mut rows = Vec::with_capacity(bracket.groups().len() * 6);
    for group in bracket.groups() {
        for i in 0..GROUP_SIZE {
            for j in i + 1..GROUP_SIZE {
                let (home, away) = (group.teams[i], group.teams[j]);
                let (lambda_home, lambda_away) = ctx.rates(home, away);
                let odds = ctx.odds(home, away);
                rows.push(MatchOddsRow {
                    group: group.id,
                    home: bracket.team_name(home).to_string(),
                    away: bracket.team_name(away).to_string(),
                    home_rating: ctx.rating(home),
                    away_rating: ctx.rating(away),
                    lambda_home,
                    lambda_away,
                    p_home: odds.win,
                    p_draw: odds.draw,
                    p_away: odds.loss,
                });
            }
        }
    }
    rows
}
