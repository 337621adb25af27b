use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};

use crate::calibration::{self, Prob3, dc_tau, poisson_pmf};
use crate::goal_model::GoalModel;

/// How regulation-time scores are drawn inside a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSampling {
    /// Two independent Poisson draws.
    Independent,
    /// One draw from the tau-corrected joint score grid, so simulated draw
    /// rates agree with `calibration::outcome_probs`.
    #[default]
    DixonColes,
}

impl ScoreSampling {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "independent" | "poisson" => Some(Self::Independent),
            "dixon_coles" | "dixon-coles" | "dc" => Some(Self::DixonColes),
            _ => None,
        }
    }
}

/// One Poisson-distributed goal count.
pub fn sample_score<R: Rng>(rng: &mut R, lambda: f64) -> u32 {
    match Poisson::new(lambda) {
        Ok(dist) => {
            let goals: f64 = dist.sample(rng);
            goals as u32
        }
        // lambda <= 0 or NaN
        Err(_) => 0,
    }
}

/// Cumulative table over the (max_goals+1)^2 corrected scorelines of one pairing.
#[derive(Debug, Clone, Default)]
pub struct ScoreGrid {
    side: usize,
    cumulative: Vec<f64>,
}

impl ScoreGrid {
    pub fn new(lambda_a: f64, lambda_b: f64, rho: f64, max_goals: u32) -> Self {
        let pmf_a = poisson_pmf(lambda_a, max_goals);
        let pmf_b = poisson_pmf(lambda_b, max_goals);
        let side = pmf_a.len();

        let mut cumulative = Vec::with_capacity(side * side);
        let mut acc = 0.0;
        for (a, p_a) in pmf_a.iter().enumerate() {
            for (b, p_b) in pmf_b.iter().enumerate() {
                acc += (p_a * p_b * dc_tau(a as u32, b as u32, lambda_a, lambda_b, rho)).max(0.0);
                cumulative.push(acc);
            }
        }
        Self { side, cumulative }
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> (u32, u32) {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        if total <= 0.0 || self.side == 0 {
            return (0, 0);
        }
        let u = rng.gen_range(0.0..total);
        let idx = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len() - 1);
        ((idx / self.side) as u32, (idx % self.side) as u32)
    }

    /// Normalized probability of a level score.
    pub fn draw_prob(&self) -> f64 {
        let total = self.cumulative.last().copied().unwrap_or(0.0);
        if total <= 0.0 {
            return 0.0;
        }
        let mut prev = 0.0;
        let mut draw = 0.0;
        for (idx, c) in self.cumulative.iter().enumerate() {
            if idx / self.side == idx % self.side {
                draw += c - prev;
            }
            prev = *c;
        }
        draw / total
    }
}

/// Score grids for every ordered pair of teams, built once per run and
/// shared read-only between workers.
#[derive(Debug, Clone, Default)]
pub struct PairTable {
    n: usize,
    grids: Vec<ScoreGrid>,
}

impl PairTable {
    pub fn build(model: &GoalModel, ratings: &[f64]) -> Self {
        let n = ratings.len();
        let mut grids = Vec::with_capacity(n * n);
        for (a, ra) in ratings.iter().enumerate() {
            for (b, rb) in ratings.iter().enumerate() {
                if a == b {
                    grids.push(ScoreGrid::default());
                    continue;
                }
                let (la, lb) = model.rates(*ra, *rb);
                grids.push(ScoreGrid::new(la, lb, model.rho, model.max_goals));
            }
        }
        Self { n, grids }
    }

    pub fn get(&self, a: usize, b: usize) -> Option<&ScoreGrid> {
        if a >= self.n || b >= self.n {
            return None;
        }
        self.grids.get(a * self.n + b)
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

/// Everything a trial needs to play one match between two team ids.
#[derive(Debug, Clone)]
pub struct MatchContext {
    model: GoalModel,
    ratings: Vec<f64>,
    sampling: ScoreSampling,
    pairs: PairTable,
}

impl MatchContext {
    pub fn new(model: GoalModel, ratings: Vec<f64>, sampling: ScoreSampling) -> Self {
        let pairs = match sampling {
            ScoreSampling::DixonColes => PairTable::build(&model, &ratings),
            ScoreSampling::Independent => PairTable::default(),
        };
        Self {
            model,
            ratings,
            sampling,
            pairs,
        }
    }

    pub fn model(&self) -> &GoalModel {
        &self.model
    }

    pub fn rating(&self, team: usize) -> f64 {
        self.ratings.get(team).copied().unwrap_or(0.0)
    }

    pub fn ratings(&self) -> &[f64] {
        &self.ratings
    }

    pub fn rates(&self, a: usize, b: usize) -> (f64, f64) {
        self.model.rates(self.rating(a), self.rating(b))
    }

    pub fn odds(&self, a: usize, b: usize) -> Prob3 {
        calibration::match_odds(&self.model, self.rating(a), self.rating(b))
    }

    /// 90-minute score, team `a` first.
    pub fn regulation_score<R: Rng>(&self, rng: &mut R, a: usize, b: usize) -> (u32, u32) {
        if self.sampling == ScoreSampling::DixonColes {
            if let Some(grid) = self.pairs.get(a, b) {
                return grid.sample(rng);
            }
        }
        let (la, lb) = self.rates(a, b);
        (sample_score(rng, la), sample_score(rng, lb))
    }
}
