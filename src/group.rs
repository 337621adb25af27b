use std::cmp::Ordering;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::fixtures::GROUP_SIZE;
use crate::scoring::MatchContext;

pub const GROUP_MATCHES: usize = GROUP_SIZE * (GROUP_SIZE - 1) / 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub team: usize,
    pub played: u8,
    pub points: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl Standing {
    pub fn new(team: usize) -> Self {
        Self {
            team,
            ..Self::default()
        }
    }

    pub fn goal_difference(&self) -> i32 {
        self.goals_for as i32 - self.goals_against as i32
    }

    pub fn record(&mut self, scored: u32, conceded: u32) {
        self.played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        self.points += match scored.cmp(&conceded) {
            Ordering::Greater => 3,
            Ordering::Equal => 1,
            Ordering::Less => 0,
        };
    }

    fn sort_key(&self) -> (u32, i32, u32) {
        (self.points, self.goal_difference(), self.goals_for)
    }
}

/// Points, then goal difference, then goals scored; best first.
pub fn compare_records(a: &Standing, b: &Standing) -> Ordering {
    b.sort_key().cmp(&a.sort_key())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayedMatch {
    pub home: usize,
    pub away: usize,
    pub home_goals: u32,
    pub away_goals: u32,
    pub recorded: bool,
}

/// What to do with teams still level on points, goal difference and goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Leave residual ties in roster order.
    Basic,
    /// Re-rank tied teams on their matches against each other, then roster order.
    #[default]
    HeadToHead,
}

impl TieBreak {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "head_to_head" | "head-to-head" | "h2h" => Some(Self::HeadToHead),
            _ => None,
        }
    }
}

/// Scores already known for a group, indexed by roster position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorResults {
    scores: [[Option<(u32, u32)>; GROUP_SIZE]; GROUP_SIZE],
}

impl PriorResults {
    pub fn set(&mut self, i: usize, j: usize, goals_i: u32, goals_j: u32) {
        self.scores[i][j] = Some((goals_i, goals_j));
        self.scores[j][i] = Some((goals_j, goals_i));
    }

    pub fn get(&self, i: usize, j: usize) -> Option<(u32, u32)> {
        self.scores.get(i).and_then(|row| row.get(j)).copied().flatten()
    }

    pub fn len(&self) -> usize {
        (0..GROUP_SIZE)
            .flat_map(|i| (i + 1..GROUP_SIZE).map(move |j| (i, j)))
            .filter(|(i, j)| self.scores[*i][*j].is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() == GROUP_MATCHES
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupTable {
    /// Rank order, 1st to 4th.
    pub standings: [Standing; GROUP_SIZE],
    pub matches: [PlayedMatch; GROUP_MATCHES],
}

impl GroupTable {
    pub fn position_of(&self, team: usize) -> Option<usize> {
        self.standings.iter().position(|s| s.team == team)
    }

    pub fn team_at(&self, position: usize) -> usize {
        self.standings[position].team
    }
}

/// Play (or replay from known results) the six round-robin matches and rank
/// the table.
pub fn resolve_group<R: Rng>(
    rng: &mut R,
    ctx: &MatchContext,
    teams: &[usize; GROUP_SIZE],
    prior: &PriorResults,
    tie_break: TieBreak,
) -> GroupTable {
    let mut standings = teams.map(Standing::new);
    let mut matches = [PlayedMatch::default(); GROUP_MATCHES];

    let mut k = 0;
    for i in 0..GROUP_SIZE {
        for j in i + 1..GROUP_SIZE {
            let (goals_i, goals_j, recorded) = match prior.get(i, j) {
                Some((a, b)) => (a, b, true),
                None => {
                    let (a, b) = ctx.regulation_score(rng, teams[i], teams[j]);
                    (a, b, false)
                }
            };
            standings[i].record(goals_i, goals_j);
            standings[j].record(goals_j, goals_i);
            matches[k] = PlayedMatch {
                home: teams[i],
                away: teams[j],
                home_goals: goals_i,
                away_goals: goals_j,
                recorded,
            };
            k += 1;
        }
    }

    rank_standings(&mut standings, &matches, tie_break);
    GroupTable { standings, matches }
}

/// Stable sort, so anything still level keeps its input order.
pub fn rank_standings(standings: &mut [Standing], matches: &[PlayedMatch], tie_break: TieBreak) {
    standings.sort_by(compare_records);
    if tie_break == TieBreak::Basic {
        return;
    }

    let mut start = 0;
    while start < standings.len() {
        let mut end = start + 1;
        while end < standings.len() && standings[end].sort_key() == standings[start].sort_key() {
            end += 1;
        }
        if end - start > 1 {
            break_by_head_to_head(&mut standings[start..end], matches);
        }
        start = end;
    }
}

fn break_by_head_to_head(tied: &mut [Standing], matches: &[PlayedMatch]) {
    let mut mini: Vec<Standing> = tied.iter().map(|s| Standing::new(s.team)).collect();
    for m in matches {
        let home = mini.iter().position(|s| s.team == m.home);
        let away = mini.iter().position(|s| s.team == m.away);
        if let (Some(h), Some(a)) = (home, away) {
            mini[h].record(m.home_goals, m.away_goals);
            mini[a].record(m.away_goals, m.home_goals);
        }
    }
    let key = |team: usize| {
        mini.iter()
            .find(|s| s.team == team)
            .map(Standing::sort_key)
            .unwrap_or_default()
    };
    tied.sort_by(|a, b| key(b.team).cmp(&key(a.team)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(team: usize, points: u32, gf: u32, ga: u32) -> Standing {
        Standing {
            team,
            played: 3,
            points,
            goals_for: gf,
            goals_against: ga,
        }
    }

    #[test]
    fn record_awards_points() {
        let mut s = Standing::new(0);
        s.record(2, 1);
        s.record(0, 0);
        s.record(0, 3);
        assert_eq!(s.points, 4);
        assert_eq!(s.goal_difference(), -2);
        assert_eq!(s.played, 3);
    }

    #[test]
    fn three_level_order() {
        let mut table = [
            standing(0, 4, 3, 3),
            standing(1, 6, 2, 2),
            standing(2, 4, 5, 3),
            standing(3, 4, 4, 2),
        ];
        rank_standings(&mut table, &[], TieBreak::Basic);
        let order: Vec<usize> = table.iter().map(|s| s.team).collect();
        // 3 and 2 both +2, 2 scored more
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn residual_tie_keeps_input_order() {
        let mut table = [
            standing(0, 3, 2, 2),
            standing(1, 3, 2, 2),
            standing(2, 9, 6, 0),
            standing(3, 0, 0, 6),
        ];
        rank_standings(&mut table, &[], TieBreak::Basic);
        assert_eq!(table[1].team, 0);
        assert_eq!(table[2].team, 1);
    }

    #[test]
    fn head_to_head_breaks_level_pair() {
        let mut table = [
            standing(0, 4, 3, 2),
            standing(1, 4, 3, 2),
            standing(2, 6, 3, 1),
            standing(3, 2, 1, 5),
        ];
        let matches = [PlayedMatch {
            home: 0,
            away: 1,
            home_goals: 0,
            away_goals: 1,
            recorded: true,
        }];
        rank_standings(&mut table, &matches, TieBreak::HeadToHead);
        assert_eq!(table[1].team, 1);
        assert_eq!(table[2].team, 0);
    }

    #[test]
    fn prior_results_are_symmetric() {
        let mut prior = PriorResults::default();
        prior.set(0, 2, 3, 1);
        assert_eq!(prior.get(2, 0), Some((1, 3)));
        assert_eq!(prior.len(), 1);
        assert!(!prior.is_complete());
    }
}
