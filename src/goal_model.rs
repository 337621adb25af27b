use std::env;

use crate::calibration;

const DEFAULT_MU_GOALS: f64 = 1.26;
const DEFAULT_BETA: f64 = 0.0022;
const DEFAULT_RHO: f64 = -0.05;
const DEFAULT_ET_FRACTION: f64 = 1.0 / 3.0;
const DEFAULT_PENALTY_K: f64 = 0.0005;
const DEFAULT_MAX_GOALS: u32 = 10;

// Keeps extreme rating gaps from producing degenerate Poisson rates.
const LAMBDA_MIN: f64 = 0.02;
const LAMBDA_MAX: f64 = 8.0;

/// Parameters of the log-linear goal-rate model plus the knockout tiebreak
/// constants that ride along with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalModel {
    /// Log of the average goals per team per match.
    pub mu: f64,
    /// Log-rate change per rating point of difference.
    pub beta: f64,
    /// Dixon-Coles low-score dependence (negative inflates draws).
    pub rho: f64,
    pub extra_time_fraction: f64,
    /// Penalty-shootout edge per rating point.
    pub penalty_k: f64,
    pub max_goals: u32,
}

impl Default for GoalModel {
    fn default() -> Self {
        Self {
            mu: DEFAULT_MU_GOALS.ln(),
            beta: DEFAULT_BETA,
            rho: DEFAULT_RHO,
            extra_time_fraction: DEFAULT_ET_FRACTION,
            penalty_k: DEFAULT_PENALTY_K,
            max_goals: DEFAULT_MAX_GOALS,
        }
    }
}

impl GoalModel {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            mu: env_f64("MODEL_MU_GOALS")
                .map(|g| g.clamp(0.5, 3.0).ln())
                .unwrap_or(d.mu),
            beta: env_f64("MODEL_BETA")
                .map(|b| b.clamp(0.0, 0.02))
                .unwrap_or(d.beta),
            rho: env_f64("MODEL_RHO")
                .map(|r| r.clamp(-0.30, 0.0))
                .unwrap_or(d.rho),
            extra_time_fraction: env_f64("MODEL_ET_FRACTION")
                .map(|f| f.clamp(0.05, 1.0))
                .unwrap_or(d.extra_time_fraction),
            penalty_k: env_f64("MODEL_PENALTY_K")
                .map(|k| k.clamp(0.0, 0.005))
                .unwrap_or(d.penalty_k),
            max_goals: d.max_goals,
        }
    }

    /// Expected goals for each side over a full match.
    pub fn rates(&self, rating_a: f64, rating_b: f64) -> (f64, f64) {
        let diff = rating_a - rating_b;
        let lambda_a = (self.mu + self.beta * diff).exp();
        let lambda_b = (self.mu - self.beta * diff).exp();
        (
            lambda_a.clamp(LAMBDA_MIN, LAMBDA_MAX),
            lambda_b.clamp(LAMBDA_MIN, LAMBDA_MAX),
        )
    }

    pub fn extra_time_rates(&self, rating_a: f64, rating_b: f64) -> (f64, f64) {
        let (a, b) = self.rates(rating_a, rating_b);
        (a * self.extra_time_fraction, b * self.extra_time_fraction)
    }

    pub fn penalty_win_prob(&self, rating_a: f64, rating_b: f64) -> f64 {
        (0.5 + self.penalty_k * (rating_a - rating_b)).clamp(0.05, 0.95)
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }
}

/// Logistic win expectancy used as the calibration target.
pub fn expected_score(r_a: f64, r_b: f64, divisor: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / divisor))
}

/// Fit beta so the model's implied expected score (win + half a draw)
/// tracks the logistic reference across rating gaps 0..=max_diff.
pub fn fit_beta(base: &GoalModel, divisor: f64, max_diff: f64) -> f64 {
    let mut best_beta = base.beta;
    let mut best_err = f64::MAX;

    // 0.0005..0.0060 in steps of 0.00001
    for steps in 50..=600 {
        let beta = steps as f64 / 100_000.0;
        let err = beta_fit_error(&base.with_beta(beta), divisor, max_diff);
        if err < best_err {
            best_err = err;
            best_beta = beta;
        }
    }

    best_beta
}

pub fn beta_fit_error(model: &GoalModel, divisor: f64, max_diff: f64) -> f64 {
    let mut err = 0.0;
    let mut diff = 0.0;
    while diff <= max_diff {
        let (la, lb) = model.rates(diff, 0.0);
        let p = calibration::outcome_probs(la, lb, model.rho, model.max_goals);
        let implied = p.win + 0.5 * p.draw;
        err += (implied - expected_score(diff, 0.0, divisor)).powi(2);
        diff += 25.0;
    }
    err
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
