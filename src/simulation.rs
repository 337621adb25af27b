use std::env;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::bracket::{TrialContext, run_trial};
use crate::error::SimError;
use crate::fixtures::{Bracket, TournamentConfig};
use crate::goal_model::GoalModel;
use crate::group::TieBreak;
use crate::overrides::ActualResults;
use crate::ratings::{DEFAULT_RATING, RatingSnapshot, TeamIndex};
use crate::report::{ReportMeta, SimulationReport, Tally, build_report};
use crate::scoring::{MatchContext, ScoreSampling};

pub const DEFAULT_TRIALS: u32 = 10_000;
const DEFAULT_SEED: u64 = 2026;
// Each chunk gets its own RNG stream, so results depend on the seed and the
// chunk size but not on the thread count.
const CHUNK_TRIALS: u32 = 250;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub trials: u32,
    pub seed: u64,
    /// 0 = rayon's global pool.
    pub threads: usize,
    pub score_sampling: ScoreSampling,
    pub tie_break: TieBreak,
    pub default_rating: f64,
    pub model: GoalModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: DEFAULT_SEED,
            threads: 0,
            score_sampling: ScoreSampling::default(),
            tie_break: TieBreak::default(),
            default_rating: DEFAULT_RATING,
            model: GoalModel::default(),
        }
    }
}

impl SimulationConfig {
    /// Unset `SIM_SEED` picks a fresh seed; it is recorded in the report.
    pub fn from_env() -> Self {
        let trials = env::var("SIM_TRIALS")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_TRIALS)
            .clamp(1, 10_000_000);
        let seed = env::var("SIM_SEED")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or_else(rand::random);
        let threads = env::var("SIM_THREADS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0)
            .clamp(0, 256);
        let score_sampling = match env::var("SIM_SCORE_SAMPLING") {
            Ok(raw) => ScoreSampling::parse(&raw).unwrap_or_else(|| {
                warn!("unknown SIM_SCORE_SAMPLING={raw}, using dixon_coles");
                ScoreSampling::default()
            }),
            Err(_) => ScoreSampling::default(),
        };
        let tie_break = match env::var("SIM_TIE_BREAK") {
            Ok(raw) => TieBreak::parse(&raw).unwrap_or_else(|| {
                warn!("unknown SIM_TIE_BREAK={raw}, using head_to_head");
                TieBreak::default()
            }),
            Err(_) => TieBreak::default(),
        };
        let default_rating = env::var("RATING_DEFAULT")
            .ok()
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|r| r.is_finite())
            .unwrap_or(DEFAULT_RATING)
            .clamp(500.0, 2500.0);

        Self {
            trials,
            seed,
            threads,
            score_sampling,
            tie_break,
            default_rating,
            model: GoalModel::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.trials == 0 {
            return Err(SimError::InvalidSettings("trials must be positive".to_string()));
        }
        if !(self.default_rating.is_finite() && self.default_rating > 0.0) {
            return Err(SimError::InvalidSettings(format!(
                "default rating {} must be positive",
                self.default_rating
            )));
        }
        Ok(())
    }
}

/// Validate everything, then play `config.trials` tournaments and aggregate
/// them. Setting `cancel` stops the run between trials.
pub fn run_simulation(
    config: &SimulationConfig,
    tournament: &TournamentConfig,
    ratings: &RatingSnapshot,
    results: &ActualResults,
    cancel: &AtomicBool,
) -> Result<SimulationReport, SimError> {
    let progress = AtomicU32::new(0);
    run_simulation_with_progress(config, tournament, ratings, results, cancel, &progress)
}

/// As `run_simulation`, counting finished trials into `progress`.
pub fn run_simulation_with_progress(
    config: &SimulationConfig,
    tournament: &TournamentConfig,
    ratings: &RatingSnapshot,
    results: &ActualResults,
    cancel: &AtomicBool,
    progress: &AtomicU32,
) -> Result<SimulationReport, SimError> {
    config.validate()?;
    let bracket = tournament.validate()?;
    let compiled = results.compile(&bracket)?;

    let snapshot = ratings.clone().with_default(config.default_rating);
    let index = TeamIndex::build(&bracket, &snapshot);
    let matches = MatchContext::new(config.model, index.ratings().to_vec(), config.score_sampling);

    let ctx = TrialContext {
        bracket: &bracket,
        matches: &matches,
        results: &compiled,
        tie_break: config.tie_break,
    };

    info!(
        "simulating {} x {} (seed {}, {:?} scores, {:?} ties, {} recorded results)",
        bracket.name(),
        config.trials,
        config.seed,
        config.score_sampling,
        config.tie_break,
        compiled.recorded_group_matches() + compiled.knockout_winners.iter().flatten().count()
    );
    let started = Instant::now();
    let tally = run_trials(config, &ctx, cancel, progress)?;
    info!("{} trials in {:.2?}", tally.trials, started.elapsed());

    let meta = ReportMeta {
        seed: config.seed,
        rating_source: snapshot.source,
        ratings_updated: snapshot.updated.clone(),
        score_sampling: config.score_sampling,
        tie_break: config.tie_break,
        recorded_results: results.len(),
    };
    Ok(build_report(&bracket, &tally, &matches, meta))
}

/// Trials split into fixed chunks, run in parallel, tallies summed.
pub fn run_trials(
    config: &SimulationConfig,
    ctx: &TrialContext<'_>,
    cancel: &AtomicBool,
    progress: &AtomicU32,
) -> Result<Tally, SimError> {
    let chunks = config.trials.div_ceil(CHUNK_TRIALS);
    let pool = sim_pool(config.threads);

    let tally = with_sim_pool(&pool, || {
        (0..chunks)
            .into_par_iter()
            .map(|chunk| run_chunk(config, ctx, chunk, cancel, progress))
            .try_reduce(|| Tally::for_bracket(ctx.bracket), |a, b| Ok(a.merge(b)))
    })?;

    if cancel.load(Ordering::Relaxed) && tally.trials < config.trials {
        return Err(SimError::Cancelled {
            completed: tally.trials,
            requested: config.trials,
        });
    }
    Ok(tally)
}

fn run_chunk(
    config: &SimulationConfig,
    ctx: &TrialContext<'_>,
    chunk: u32,
    cancel: &AtomicBool,
    progress: &AtomicU32,
) -> Result<Tally, SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    rng.set_stream(u64::from(chunk));

    let start = chunk * CHUNK_TRIALS;
    let count = CHUNK_TRIALS.min(config.trials - start);
    let mut tally = Tally::for_bracket(ctx.bracket);
    for _ in 0..count {
        if cancel.load(Ordering::Relaxed) {
            return Err(SimError::Cancelled {
                completed: progress.load(Ordering::Relaxed),
                requested: config.trials,
            });
        }
        let outcome = run_trial(&mut rng, ctx)?;
        tally.add(&outcome, ctx.bracket);
        progress.fetch_add(1, Ordering::Relaxed);
    }
    Ok(tally)
}

fn sim_pool(threads: usize) -> Option<rayon::ThreadPool> {
    if threads == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            debug!("could not build {threads}-thread pool, using global: {err}");
            None
        }
    }
}

fn with_sim_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

/// Compile a tournament once and hand back the pieces a caller needs to run
/// single trials, e.g. for benchmarks.
pub fn prepare(
    config: &SimulationConfig,
    tournament: &TournamentConfig,
    ratings: &RatingSnapshot,
) -> Result<(Bracket, MatchContext), SimError> {
    config.validate()?;
    let bracket = tournament.validate()?;
    let snapshot = ratings.clone().with_default(config.default_rating);
    let index = TeamIndex::build(&bracket, &snapshot);
    let matches = MatchContext::new(config.model, index.ratings().to_vec(), config.score_sampling);
    Ok((bracket, matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratings::fallback_snapshot;
    use crate::wc2026;

    fn small(trials: u32, threads: usize) -> SimulationConfig {
        SimulationConfig {
            trials,
            threads,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn zero_trials_is_rejected() {
        let err = run_simulation(
            &small(0, 1),
            &wc2026::world_cup_2026(),
            &fallback_snapshot(),
            &ActualResults::default(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(matches!(err, SimError::InvalidSettings(_)));
    }

    #[test]
    fn thread_count_does_not_change_results() {
        let cfg = wc2026::world_cup_2026();
        let ratings = fallback_snapshot();
        let cancel = AtomicBool::new(false);
        let one = run_simulation(&small(600, 1), &cfg, &ratings, &ActualResults::default(), &cancel).unwrap();
        let four = run_simulation(&small(600, 4), &cfg, &ratings, &ActualResults::default(), &cancel).unwrap();
        let champs = |r: &SimulationReport| {
            r.teams
                .iter()
                .map(|t| (t.team.clone(), t.p_champion))
                .collect::<Vec<_>>()
        };
        assert_eq!(champs(&one), champs(&four));
    }

    #[test]
    fn preset_cancel_returns_cancelled() {
        let cancel = AtomicBool::new(true);
        let err = run_simulation(
            &small(1_000, 2),
            &wc2026::world_cup_2026(),
            &fallback_snapshot(),
            &ActualResults::default(),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Cancelled { requested: 1_000, .. }));
    }

    #[test]
    fn progress_counts_every_trial() {
        let progress = AtomicU32::new(0);
        let report = run_simulation_with_progress(
            &small(510, 2),
            &wc2026::world_cup_2026(),
            &fallback_snapshot(),
            &ActualResults::default(),
            &AtomicBool::new(false),
            &progress,
        )
        .unwrap();
        assert_eq!(report.trials, 510);
        assert_eq!(progress.load(Ordering::Relaxed), 510);
    }
}
