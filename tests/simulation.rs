use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use wc26_bracket_sim::error::SimError;
use wc26_bracket_sim::overrides::{ActualResults, MatchScore};
use wc26_bracket_sim::ratings::fallback_snapshot;
use wc26_bracket_sim::report::SimulationReport;
use wc26_bracket_sim::simulation::{SimulationConfig, run_simulation, run_simulation_with_progress};
use wc26_bracket_sim::wc2026;

fn config(trials: u32, seed: u64) -> SimulationConfig {
    SimulationConfig {
        trials,
        seed,
        ..SimulationConfig::default()
    }
}

fn simulate(trials: u32, seed: u64, results: &ActualResults) -> SimulationReport {
    run_simulation(
        &config(trials, seed),
        &wc2026::world_cup_2026(),
        &fallback_snapshot(),
        results,
        &AtomicBool::new(false),
    )
    .unwrap()
}

#[test]
fn group_positions_are_distributions() {
    let report = simulate(2_000, 11, &ActualResults::default());
    assert_eq!(report.groups.len(), 12);
    for group in &report.groups {
        for row in &group.rows {
            let total: f64 = row.p_position.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "{}: {total}", row.team);
            assert!(row.p_qualify_third <= row.p_position[2] + 1e-12);
        }
        for pos in 0..4 {
            let total: f64 = group.rows.iter().map(|r| r.p_position[pos]).sum();
            assert!((total - 1.0).abs() < 1e-9, "group {} position {pos}", group.group);
        }
    }
    let thirds: f64 = report
        .groups
        .iter()
        .flat_map(|g| g.rows.iter())
        .map(|r| r.p_qualify_third)
        .sum();
    assert!((thirds - 8.0).abs() < 1e-9);
}

#[test]
fn champion_probabilities_sum_to_one() {
    let report = simulate(2_000, 12, &ActualResults::default());
    let total: f64 = report.teams.iter().map(|t| t.p_champion).sum();
    assert!((total - 1.0).abs() < 1e-9);
    let r32: f64 = report.teams.iter().map(|t| t.p_round_of_32).sum();
    assert!((r32 - 32.0).abs() < 1e-9);
    for t in &report.teams {
        assert!(t.p_champion <= t.p_final + 1e-12);
        assert!(t.p_final <= t.p_semi_final + 1e-12);
        assert!(t.p_semi_final <= t.p_quarter_final + 1e-12);
    }

    let final_match = report.fixture(104).unwrap();
    let winners: f64 = final_match.participants.iter().map(|p| p.p_win).sum();
    assert!((winners - 1.0).abs() < 1e-9);
    let appearances: f64 = final_match.participants.iter().map(|p| p.p_appear).sum();
    assert!((appearances - 2.0).abs() < 1e-9);
}

#[test]
fn seed_reproduces_the_run() {
    let champions = |r: &SimulationReport| {
        r.teams
            .iter()
            .map(|t| (t.team.clone(), t.p_champion))
            .collect::<Vec<_>>()
    };
    let a = simulate(1_000, 99, &ActualResults::default());
    let b = simulate(1_000, 99, &ActualResults::default());
    let c = simulate(1_000, 100, &ActualResults::default());
    assert_eq!(champions(&a), champions(&b));
    assert_ne!(champions(&a), champions(&c));
    assert_eq!(a.seed, 99);
}

#[test]
fn cancelling_mid_run_discards_the_counts() {
    let cancel = AtomicBool::new(false);
    let progress = AtomicU32::new(0);
    let requested = 5_000_000;

    let result = thread::scope(|s| {
        let run = s.spawn(|| {
            run_simulation_with_progress(
                &config(requested, 5),
                &wc2026::world_cup_2026(),
                &fallback_snapshot(),
                &ActualResults::default(),
                &cancel,
                &progress,
            )
        });
        while progress.load(Ordering::Relaxed) == 0 && !run.is_finished() {
            thread::sleep(Duration::from_millis(5));
        }
        cancel.store(true, Ordering::Relaxed);
        run.join().unwrap()
    });

    match result {
        Err(SimError::Cancelled { completed, requested: r }) => {
            assert_eq!(r, requested);
            assert!(completed < requested);
        }
        other => panic!("expected cancellation, got {:?}", other.map(|r| r.trials)),
    }
}

#[test]
fn recorded_group_results_pin_the_table() {
    let losses = ["Mexico", "South Africa", "South Korea"]
        .iter()
        .map(|team| MatchScore {
            home: team.to_string(),
            away: "UEFA Playoff D".to_string(),
            home_goals: 2,
            away_goals: 0,
        })
        .collect();
    let results = ActualResults {
        group_matches: losses,
        ..ActualResults::default()
    };
    let report = simulate(1_000, 21, &results);
    assert_eq!(report.recorded_results, 3);

    let group = report.group('A').unwrap();
    let row = group.rows.iter().find(|r| r.team == "UEFA Playoff D").unwrap();
    assert_eq!(row.p_position[3], 1.0);
    assert_eq!(row.p_position[0] + row.p_position[1], 0.0);
    assert_eq!(row.p_qualify_third, 0.0);
    assert_eq!(report.team("UEFA Playoff D").unwrap().p_round_of_32, 0.0);
}

#[test]
fn unknown_team_in_results_fails_before_simulating() {
    let results = ActualResults {
        group_matches: vec![MatchScore {
            home: "Atlantis".to_string(),
            away: "Mexico".to_string(),
            home_goals: 1,
            away_goals: 0,
        }],
        ..ActualResults::default()
    };
    let err = run_simulation(
        &config(100, 1),
        &wc2026::world_cup_2026(),
        &fallback_snapshot(),
        &results,
        &AtomicBool::new(false),
    )
    .unwrap_err();
    assert!(matches!(err, SimError::OverrideMismatch(_)));
}

#[test]
fn report_serializes() {
    let report = simulate(250, 3, &ActualResults::default());
    let json = report.to_json_pretty().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["trials"], 250);
    assert_eq!(value["groups"].as_array().unwrap().len(), 12);
    assert_eq!(value["match_odds"].as_array().unwrap().len(), 72);
}

/// Every group finishes in roster order. Thirds of A-H beat the fourth 3-0,
/// thirds of I-L only 1-0, so A-H are the qualifying thirds.
fn settled_group_stage() -> Vec<MatchScore> {
    let mut scores = Vec::new();
    for group in wc2026::world_cup_2026().groups {
        let margin = if group.id <= 'H' { 3 } else { 1 };
        for i in 0..4 {
            for j in (i + 1)..4 {
                let home_goals = if (i, j) == (2, 3) { margin } else { 1 };
                scores.push(MatchScore {
                    home: group.teams[i].clone(),
                    away: group.teams[j].clone(),
                    home_goals,
                    away_goals: 0,
                });
            }
        }
    }
    scores
}

#[test]
fn recorded_best_third_winner_holds_in_every_trial() {
    let mut results = ActualResults {
        group_matches: settled_group_stage(),
        ..ActualResults::default()
    };
    assert_eq!(results.group_matches.len(), 72);
    // South Korea is third in group A; 74 is 1E v 3rd of ABCDF
    results.knockout_winners.insert(74, "South Korea".to_string());

    let report = simulate(500, 1, &results);
    let m74 = report.fixture(74).unwrap();
    let korea = m74.participants.iter().find(|p| p.team == "South Korea").unwrap();
    assert_eq!(korea.p_appear, 1.0);
    assert_eq!(korea.p_win, 1.0);
    let germany = m74.participants.iter().find(|p| p.team == "Germany").unwrap();
    assert_eq!(germany.p_win, 0.0);
    assert_eq!(report.team("South Korea").unwrap().p_round_of_16, 1.0);
}

#[test]
fn recorded_third_place_seating_is_kept() {
    let mut results = ActualResults {
        group_matches: settled_group_stage(),
        ..ActualResults::default()
    };
    results.third_place_slots.insert(74, 'A');
    results.third_place_slots.insert(82, 'E');

    let report = simulate(300, 8, &results);
    assert_eq!(report.recorded_results, 74);
    let appears = |number: u32, team: &str| {
        report
            .fixture(number)
            .unwrap()
            .participants
            .iter()
            .find(|p| p.team == team)
            .map(|p| p.p_appear)
            .unwrap_or(0.0)
    };
    assert_eq!(appears(74, "South Korea"), 1.0);
    assert_eq!(appears(82, "Côte d'Ivoire"), 1.0);
}

#[test]
fn unreachable_recorded_winner_fails_before_any_trial() {
    let mut results = ActualResults::default();
    // 73 is 2A v 2B
    results.knockout_winners.insert(73, "Brazil".to_string());
    let progress = AtomicU32::new(0);
    let err = run_simulation_with_progress(
        &config(1_000, 2),
        &wc2026::world_cup_2026(),
        &fallback_snapshot(),
        &results,
        &AtomicBool::new(false),
        &progress,
    )
    .unwrap_err();
    assert!(matches!(err, SimError::OverrideMismatch(_)));
    assert_eq!(progress.load(Ordering::Relaxed), 0);
}

