use std::collections::{BTreeMap, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use wc26_bracket_sim::bracket::{TrialContext, run_trial};
use wc26_bracket_sim::error::SimError;
use wc26_bracket_sim::fixtures::{Round, Slot, TournamentConfig};
use wc26_bracket_sim::goal_model::GoalModel;
use wc26_bracket_sim::group::TieBreak;
use wc26_bracket_sim::knockout::Decider;
use wc26_bracket_sim::overrides::{ActualResults, MatchScore};
use wc26_bracket_sim::ratings::{TeamIndex, fallback_snapshot};
use wc26_bracket_sim::scoring::{MatchContext, ScoreSampling};
use wc26_bracket_sim::wc2026;

fn score(home: &str, away: &str, home_goals: u32, away_goals: u32) -> MatchScore {
    MatchScore {
        home: home.to_string(),
        away: away.to_string(),
        home_goals,
        away_goals,
    }
}

fn group_a_settled() -> Vec<MatchScore> {
    vec![
        score("Mexico", "South Africa", 3, 0),
        score("Mexico", "South Korea", 3, 0),
        score("Mexico", "UEFA Playoff D", 3, 0),
        score("South Africa", "South Korea", 0, 0),
        score("South Africa", "UEFA Playoff D", 0, 0),
        score("South Korea", "UEFA Playoff D", 0, 0),
    ]
}

fn matches_for(cfg: &TournamentConfig) -> MatchContext {
    let bracket = cfg.validate().unwrap();
    let index = TeamIndex::build(&bracket, &fallback_snapshot());
    MatchContext::new(GoalModel::default(), index.ratings().to_vec(), ScoreSampling::DixonColes)
}

#[test]
fn full_bracket_has_a_resolution_order() {
    let bracket = wc2026::world_cup_2026().validate().unwrap();
    let order = bracket.order();
    assert_eq!(order.len(), bracket.fixtures().len());
    let unique: HashSet<_> = order.iter().collect();
    assert_eq!(unique.len(), order.len());
    let last_round = bracket.fixtures()[*order.last().unwrap()].round;
    assert!(matches!(last_round, Round::Final | Round::ThirdPlace));
}

#[test]
fn cycle_is_rejected_before_any_trial() {
    let mut cfg = wc2026::world_cup_2026();
    let r16 = cfg.fixtures.iter().position(|f| f.number == 89).unwrap();
    let qf = cfg.fixtures.iter().position(|f| f.number == 97).unwrap();
    let sf = cfg.fixtures.iter().position(|f| f.number == 101).unwrap();
    // 89 <-> 97, with 101 taking 74's winner so no result is used twice
    cfg.fixtures[r16].home = Slot::WinnerOf { fixture: 97 };
    cfg.fixtures[sf].home = Slot::WinnerOf { fixture: 74 };
    assert_eq!(cfg.fixtures[qf].home, Slot::WinnerOf { fixture: 89 });
    assert!(matches!(cfg.validate(), Err(SimError::Cycle(_))));
}

#[test]
fn empty_third_place_pool_is_rejected() {
    let mut cfg = wc2026::world_cup_2026();
    let m74 = cfg.fixtures.iter().position(|f| f.number == 74).unwrap();
    cfg.fixtures[m74].away = Slot::BestThird { pool: Vec::new() };
    assert!(matches!(cfg.validate(), Err(SimError::EmptyPool(74))));
}

#[test]
fn one_trial_is_a_consistent_tournament() {
    let cfg = wc2026::world_cup_2026();
    let bracket = cfg.validate().unwrap();
    let matches = matches_for(&cfg);
    let results = ActualResults::default().compile(&bracket).unwrap();
    let ctx = TrialContext {
        bracket: &bracket,
        matches: &matches,
        results: &results,
        tie_break: TieBreak::HeadToHead,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(31);
    for _ in 0..200 {
        let trial = run_trial(&mut rng, &ctx).unwrap();
        assert_eq!(trial.fixtures.len(), 32);
        assert_eq!(trial.qualifying_thirds.count_ones(), 8);

        let mut r32 = HashSet::new();
        for (idx, f) in bracket.fixtures().iter().enumerate() {
            let result = trial.fixtures[idx];
            assert!(result.winner == result.home || result.winner == result.away);
            assert_ne!(result.home, result.away);
            if f.round == Round::RoundOf32 {
                assert!(r32.insert(result.home));
                assert!(r32.insert(result.away));
            }
        }
        assert_eq!(r32.len(), 32);

        let sf_losers: HashSet<usize> = [101, 102]
            .iter()
            .map(|n| trial.fixtures[bracket.fixture_index(*n).unwrap()].loser)
            .collect();
        let third = trial.fixtures[bracket.fixture_index(103).unwrap()];
        assert!(sf_losers.contains(&third.home) && sf_losers.contains(&third.away));

        let champion = trial.champion(&bracket).unwrap();
        let final_match = trial.fixtures[bracket.final_index().unwrap()];
        assert!(champion == final_match.home || champion == final_match.away);
    }
}

#[test]
fn recorded_results_fix_the_path() {
    let cfg = wc2026::world_cup_2026();
    let bracket = cfg.validate().unwrap();
    let matches = matches_for(&cfg);
    let mut winners = BTreeMap::new();
    winners.insert(79, "Mexico".to_string());
    let actual = ActualResults {
        group_matches: group_a_settled(),
        knockout_winners: winners,
        ..ActualResults::default()
    };
    let results = actual.compile(&bracket).unwrap();
    let ctx = TrialContext {
        bracket: &bracket,
        matches: &matches,
        results: &results,
        tie_break: TieBreak::HeadToHead,
    };

    let mexico = bracket.team_id("Mexico").unwrap();
    let south_africa = bracket.team_id("South Africa").unwrap();
    let m73 = bracket.fixture_index(73).unwrap();
    let m79 = bracket.fixture_index(79).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(12);
    for _ in 0..200 {
        let trial = run_trial(&mut rng, &ctx).unwrap();
        let a = bracket.group_index('A').unwrap();
        assert_eq!(trial.groups[a].team_at(0), mexico);
        assert_eq!(trial.groups[a].team_at(1), south_africa);
        assert_eq!(trial.fixtures[m73].home, south_africa);
        assert_eq!(trial.fixtures[m79].winner, mexico);
        assert_eq!(trial.fixtures[m79].decided_by, Decider::Recorded);
    }
}

#[test]
fn recorded_winner_missing_from_the_trial_is_fatal() {
    let cfg = wc2026::world_cup_2026();
    let bracket = cfg.validate().unwrap();
    let matches = matches_for(&cfg);
    let mut winners = BTreeMap::new();
    // Mexico could reach 2A v 2B, but the recorded table has it winning group A
    winners.insert(73, "Mexico".to_string());
    let actual = ActualResults {
        group_matches: group_a_settled(),
        knockout_winners: winners,
        ..ActualResults::default()
    };
    let results = actual.compile(&bracket).unwrap();
    let ctx = TrialContext {
        bracket: &bracket,
        matches: &matches,
        results: &results,
        tie_break: TieBreak::HeadToHead,
    };
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    assert!(matches!(
        run_trial(&mut rng, &ctx),
        Err(SimError::OverrideMismatch(_))
    ));
}
