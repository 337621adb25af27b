use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::third_place::{self, ThirdSlot};

pub const GROUP_SIZE: usize = 4;
// Group membership is tracked in u16 masks.
pub const MAX_GROUPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    Group,
    RoundOf32,
    RoundOf16,
    QuarterFinal,
    SemiFinal,
    ThirdPlace,
    Final,
}

impl Round {
    pub fn label(self) -> &'static str {
        match self {
            Round::Group => "Group",
            Round::RoundOf32 => "Round of 32",
            Round::RoundOf16 => "Round of 16",
            Round::QuarterFinal => "Quarter-final",
            Round::SemiFinal => "Semi-final",
            Round::ThirdPlace => "Third place",
            Round::Final => "Final",
        }
    }
}

/// Where one side of a knockout fixture comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    GroupWinner { group: char },
    GroupRunnerUp { group: char },
    BestThird { pool: Vec<char> },
    WinnerOf { fixture: u32 },
    LoserOf { fixture: u32 },
}

impl Slot {
    pub fn describe(&self) -> String {
        match self {
            Slot::GroupWinner { group } => format!("1{group}"),
            Slot::GroupRunnerUp { group } => format!("2{group}"),
            Slot::BestThird { pool } => {
                format!("3{}", pool.iter().map(|g| g.to_string()).collect::<Vec<_>>().join("/"))
            }
            Slot::WinnerOf { fixture } => format!("W{fixture}"),
            Slot::LoserOf { fixture } => format!("L{fixture}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDef {
    pub id: char,
    pub teams: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureNode {
    pub number: u32,
    pub round: Round,
    #[serde(default)]
    pub venue: String,
    pub home: Slot,
    pub away: Slot,
}

/// Static tournament description: group rosters and the knockout graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub groups: Vec<GroupDef>,
    pub fixtures: Vec<FixtureNode>,
}

impl TournamentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read tournament config {}", path.display()))?;
        serde_json::from_str(&raw).context("invalid tournament config json")
    }

    /// Check the config and compile it into id-indexed form with a
    /// leaves-to-root resolution order.
    pub fn validate(&self) -> Result<Bracket, SimError> {
        compile(self)
    }
}

/// A fixture side resolved to indices into the compiled bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// position 0 = winner, 1 = runner-up
    Group { group: usize, position: usize },
    Third { slot: usize },
    Winner(usize),
    Loser(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledGroup {
    pub id: char,
    pub teams: [usize; GROUP_SIZE],
}

#[derive(Debug, Clone)]
pub struct CompiledFixture {
    pub number: u32,
    pub round: Round,
    pub venue: usize,
    pub home: Source,
    pub away: Source,
    pub home_label: String,
    pub away_label: String,
}

/// Validated, immutable tournament. Team ids index `teams`; fixture indices
/// follow config order and `order` is a topological resolution order.
#[derive(Debug, Clone)]
pub struct Bracket {
    name: String,
    teams: Vec<String>,
    team_index: HashMap<String, usize>,
    team_group: Vec<usize>,
    groups: Vec<CompiledGroup>,
    fixtures: Vec<CompiledFixture>,
    fixture_index: HashMap<u32, usize>,
    order: Vec<usize>,
    third_slots: Vec<ThirdSlot>,
    venues: Vec<String>,
}

impl Bracket {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    pub fn team_name(&self, team: usize) -> &str {
        self.teams.get(team).map(String::as_str).unwrap_or("?")
    }

    pub fn team_id(&self, name: &str) -> Option<usize> {
        self.team_index.get(name).copied()
    }

    pub fn group_of(&self, team: usize) -> Option<usize> {
        self.team_group.get(team).copied()
    }

    pub fn groups(&self) -> &[CompiledGroup] {
        &self.groups
    }

    pub fn group_index(&self, id: char) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    pub fn fixtures(&self) -> &[CompiledFixture] {
        &self.fixtures
    }

    pub fn fixture_index(&self, number: u32) -> Option<usize> {
        self.fixture_index.get(&number).copied()
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn third_slots(&self) -> &[ThirdSlot] {
        &self.third_slots
    }

    pub fn venues(&self) -> &[String] {
        &self.venues
    }

    pub fn final_index(&self) -> Option<usize> {
        self.fixtures.iter().position(|f| f.round == Round::Final)
    }
}

fn compile(cfg: &TournamentConfig) -> Result<Bracket, SimError> {
    if cfg.groups.is_empty() {
        return Err(SimError::MalformedConfig("no groups defined".to_string()));
    }
    if cfg.groups.len() > MAX_GROUPS {
        return Err(SimError::MalformedConfig(format!(
            "{} groups defined, at most {MAX_GROUPS} supported",
            cfg.groups.len()
        )));
    }

    let mut teams = Vec::new();
    let mut team_index = HashMap::new();
    let mut team_group = Vec::new();
    let mut groups = Vec::with_capacity(cfg.groups.len());
    let mut group_ids = HashMap::new();

    for (gi, def) in cfg.groups.iter().enumerate() {
        if !def.id.is_ascii_uppercase() {
            return Err(SimError::MalformedConfig(format!(
                "group id {:?} must be a capital letter",
                def.id
            )));
        }
        if group_ids.insert(def.id, gi).is_some() {
            return Err(SimError::MalformedConfig(format!("group {} defined twice", def.id)));
        }
        if def.teams.len() != GROUP_SIZE {
            return Err(SimError::MalformedConfig(format!(
                "group {} has {} teams, expected {GROUP_SIZE}",
                def.id,
                def.teams.len()
            )));
        }
        let mut ids = [0usize; GROUP_SIZE];
        for (slot, name) in def.teams.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(SimError::MalformedConfig(format!("group {} has a blank team", def.id)));
            }
            if team_index.contains_key(name) {
                return Err(SimError::MalformedConfig(format!(
                    "team {name} appears in more than one group slot"
                )));
            }
            let id = teams.len();
            teams.push(name.to_string());
            team_index.insert(name.to_string(), id);
            team_group.push(gi);
            ids[slot] = id;
        }
        groups.push(CompiledGroup { id: def.id, teams: ids });
    }

    let mut fixture_index = HashMap::new();
    for (idx, node) in cfg.fixtures.iter().enumerate() {
        if node.round == Round::Group {
            return Err(SimError::MalformedConfig(format!(
                "match {} is a group match; knockout fixtures only",
                node.number
            )));
        }
        if fixture_index.insert(node.number, idx).is_some() {
            return Err(SimError::MalformedConfig(format!("match {} defined twice", node.number)));
        }
    }

    let finals = cfg.fixtures.iter().filter(|f| f.round == Round::Final).count();
    if finals != 1 {
        return Err(SimError::MalformedConfig(format!(
            "expected exactly one final, found {finals}"
        )));
    }

    let mut venues: Vec<String> = Vec::new();
    let mut third_slots = Vec::new();
    let mut fixtures = Vec::with_capacity(cfg.fixtures.len());
    let mut used_positions = HashSet::new();
    let mut used_results = HashSet::new();
    let mut round_violations = Vec::new();

    for node in &cfg.fixtures {
        let venue_name = if node.venue.trim().is_empty() {
            "TBD".to_string()
        } else {
            node.venue.trim().to_string()
        };
        let venue = match venues.iter().position(|v| *v == venue_name) {
            Some(v) => v,
            None => {
                venues.push(venue_name);
                venues.len() - 1
            }
        };

        let mut sides = [Source::Winner(0); 2];
        for (side, slot) in [&node.home, &node.away].into_iter().enumerate() {
            sides[side] = match slot {
                Slot::GroupWinner { group } | Slot::GroupRunnerUp { group } => {
                    let position = usize::from(matches!(slot, Slot::GroupRunnerUp { .. }));
                    let gi = *group_ids.get(group).ok_or_else(|| {
                        SimError::MalformedConfig(format!(
                            "match {} references unknown group {group}",
                            node.number
                        ))
                    })?;
                    if !used_positions.insert((gi, position)) {
                        return Err(SimError::MalformedConfig(format!(
                            "{} is used by more than one fixture",
                            slot.describe()
                        )));
                    }
                    Source::Group { group: gi, position }
                }
                Slot::BestThird { pool } => {
                    let mut mask = 0u16;
                    for g in pool {
                        let gi = *group_ids.get(g).ok_or_else(|| {
                            SimError::MalformedConfig(format!(
                                "match {} third-place pool names unknown group {g}",
                                node.number
                            ))
                        })?;
                        mask |= 1 << gi;
                    }
                    if mask == 0 {
                        return Err(SimError::EmptyPool(node.number));
                    }
                    third_slots.push(ThirdSlot {
                        fixture: node.number,
                        pool: mask,
                    });
                    Source::Third {
                        slot: third_slots.len() - 1,
                    }
                }
                Slot::WinnerOf { fixture } | Slot::LoserOf { fixture } => {
                    let loser = matches!(slot, Slot::LoserOf { .. });
                    let src = *fixture_index.get(fixture).ok_or(SimError::DanglingReference {
                        fixture: node.number,
                        reference: *fixture,
                    })?;
                    if loser && node.round != Round::ThirdPlace {
                        return Err(SimError::MalformedConfig(format!(
                            "match {} takes a loser but is not the third-place match",
                            node.number
                        )));
                    }
                    let src_round = cfg.fixtures[src].round;
                    if src_round >= node.round {
                        round_violations.push((node.number, *fixture));
                    }
                    if !used_results.insert((src, loser)) {
                        return Err(SimError::MalformedConfig(format!(
                            "{} is used by more than one fixture",
                            slot.describe()
                        )));
                    }
                    if loser {
                        Source::Loser(src)
                    } else {
                        Source::Winner(src)
                    }
                }
            };
        }

        fixtures.push(CompiledFixture {
            number: node.number,
            round: node.round,
            venue,
            home: sides[0],
            away: sides[1],
            home_label: node.home.describe(),
            away_label: node.away.describe(),
        });
    }

    // Cycles first: a loop also shows up as a round violation.
    let order = topological_order(&fixtures)?;
    if let Some((number, reference)) = round_violations.first() {
        return Err(SimError::MalformedConfig(format!(
            "match {number} takes a side from match {reference}, which is not an earlier round"
        )));
    }

    if third_slots.len() > groups.len() {
        return Err(SimError::MalformedConfig(format!(
            "{} third-place slots but only {} groups",
            third_slots.len(),
            groups.len()
        )));
    }
    if let Err(mask) = third_place::check_pools_feasible(&third_slots, groups.len()) {
        let names = mask_to_ids(mask, &groups);
        return Err(SimError::MalformedConfig(format!(
            "third-place pools cannot seat qualifying groups {names}"
        )));
    }

    debug!(
        "compiled {}: {} teams, {} fixtures, {} third-place slots",
        cfg.name,
        teams.len(),
        fixtures.len(),
        third_slots.len()
    );

    Ok(Bracket {
        name: cfg.name.clone(),
        teams,
        team_index,
        team_group,
        groups,
        fixtures,
        fixture_index,
        order,
        third_slots,
        venues,
    })
}

/// Kahn's algorithm over the winner/loser edges.
pub fn topological_order(fixtures: &[CompiledFixture]) -> Result<Vec<usize>, SimError> {
    let n = fixtures.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (idx, f) in fixtures.iter().enumerate() {
        for source in [f.home, f.away] {
            if let Source::Winner(src) | Source::Loser(src) = source {
                indegree[idx] += 1;
                dependents[src].push(idx);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for &next in &dependents[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() != n {
        let stuck = (0..n).find(|i| indegree[*i] > 0).unwrap_or(0);
        return Err(SimError::Cycle(fixtures[stuck].number));
    }
    Ok(order)
}

pub fn mask_to_ids(mask: u16, groups: &[CompiledGroup]) -> String {
    groups
        .iter()
        .enumerate()
        .filter(|(gi, _)| mask & (1 << gi) != 0)
        .map(|(_, g)| g.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wc2026;

    #[test]
    fn world_cup_config_compiles() {
        let bracket = wc2026::world_cup_2026().validate().unwrap();
        assert_eq!(bracket.teams().len(), 48);
        assert_eq!(bracket.groups().len(), 12);
        assert_eq!(bracket.fixtures().len(), 32);
        assert_eq!(bracket.third_slots().len(), 8);
        assert_eq!(bracket.order().len(), 32);
    }

    #[test]
    fn order_puts_feeders_first() {
        let bracket = wc2026::world_cup_2026().validate().unwrap();
        let mut pos = vec![0usize; bracket.fixtures().len()];
        for (p, idx) in bracket.order().iter().enumerate() {
            pos[*idx] = p;
        }
        for (idx, f) in bracket.fixtures().iter().enumerate() {
            for s in [f.home, f.away] {
                if let Source::Winner(src) | Source::Loser(src) = s {
                    assert!(pos[src] < pos[idx]);
                }
            }
        }
    }

    #[test]
    fn duplicate_team_is_rejected() {
        let mut cfg = wc2026::world_cup_2026();
        cfg.groups[1].teams[0] = cfg.groups[0].teams[0].clone();
        assert!(matches!(cfg.validate(), Err(SimError::MalformedConfig(_))));
    }

    #[test]
    fn group_ids_must_be_letters() {
        let mut cfg = wc2026::world_cup_2026();
        cfg.groups[3].id = '4';
        assert!(matches!(cfg.validate(), Err(SimError::MalformedConfig(_))));

        let mut cfg = wc2026::world_cup_2026();
        cfg.groups[3].id = 'A';
        assert!(matches!(cfg.validate(), Err(SimError::MalformedConfig(_))));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let mut cfg = wc2026::world_cup_2026();
        let last = cfg.fixtures.len() - 1;
        cfg.fixtures[last].home = Slot::WinnerOf { fixture: 999 };
        assert!(matches!(
            cfg.validate(),
            Err(SimError::DanglingReference { reference: 999, .. })
        ));
    }

    #[test]
    fn slot_labels() {
        assert_eq!(Slot::GroupWinner { group: 'E' }.describe(), "1E");
        assert_eq!(
            Slot::BestThird {
                pool: vec!['A', 'B', 'C']
            }
            .describe(),
            "3A/B/C"
        );
        assert_eq!(Slot::LoserOf { fixture: 101 }.describe(), "L101");
    }
}
