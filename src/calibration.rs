use serde::Serialize;

use crate::goal_model::GoalModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

/// Win/draw/loss split from the first side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prob3 {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            win: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            loss: 1.0 / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.win + self.draw + self.loss
    }
}

pub fn classify_outcome(goals_a: u32, goals_b: u32) -> Outcome {
    if goals_a > goals_b {
        Outcome::Win
    } else if goals_a < goals_b {
        Outcome::Loss
    } else {
        Outcome::Draw
    }
}

pub fn empirical_outcome_probs(outcomes: &[Outcome]) -> Prob3 {
    if outcomes.is_empty() {
        return Prob3::uniform();
    }

    let mut win = 0usize;
    let mut draw = 0usize;
    let mut loss = 0usize;
    for outcome in outcomes {
        match outcome {
            Outcome::Win => win += 1,
            Outcome::Draw => draw += 1,
            Outcome::Loss => loss += 1,
        }
    }
    let n = outcomes.len() as f64;
    Prob3 {
        win: win as f64 / n,
        draw: draw as f64 / n,
        loss: loss as f64 / n,
    }
}

/// Exact W/D/L for two ratings under the model (90 minutes only).
pub fn match_odds(model: &GoalModel, rating_a: f64, rating_b: f64) -> Prob3 {
    let (la, lb) = model.rates(rating_a, rating_b);
    outcome_probs(la, lb, model.rho, model.max_goals)
}

/// Sum the Dixon-Coles corrected score grid into W/D/L buckets and
/// renormalize; tau and the truncation both move the raw total off 1.
pub fn outcome_probs(lambda_a: f64, lambda_b: f64, rho: f64, max_goals: u32) -> Prob3 {
    let pmf_a = poisson_pmf(lambda_a, max_goals);
    let pmf_b = poisson_pmf(lambda_b, max_goals);

    let mut p_win = 0.0_f64;
    let mut p_draw = 0.0_f64;
    let mut p_loss = 0.0_f64;

    for (a, p_a) in pmf_a.iter().enumerate() {
        for (b, p_b) in pmf_b.iter().enumerate() {
            let p = (p_a * p_b * dc_tau(a as u32, b as u32, lambda_a, lambda_b, rho)).max(0.0);
            if a > b {
                p_win += p;
            } else if a == b {
                p_draw += p;
            } else {
                p_loss += p;
            }
        }
    }

    let sum = p_win + p_draw + p_loss;
    if sum > 0.0 {
        Prob3 {
            win: p_win / sum,
            draw: p_draw / sum,
            loss: p_loss / sum,
        }
    } else {
        Prob3::uniform()
    }
}

pub fn dc_tau(goals_a: u32, goals_b: u32, lambda_a: f64, lambda_b: f64, rho: f64) -> f64 {
    match (goals_a, goals_b) {
        (0, 0) => 1.0 - lambda_a * lambda_b * rho,
        (0, 1) => 1.0 + lambda_a * rho,
        (1, 0) => 1.0 + lambda_b * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

/// P(X = k) for k in 0..=max_k. The tail beyond max_k is left out.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let max_k = max_k as usize;
    let lambda = lambda.max(0.0);
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmf_matches_closed_form() {
        let pmf = poisson_pmf(1.3, 6);
        let p3 = 1.3_f64.powi(3) * (-1.3_f64).exp() / 6.0;
        assert!((pmf[3] - p3).abs() < 1e-12);
    }

    #[test]
    fn tau_is_identity_above_one_goal() {
        assert_eq!(dc_tau(2, 0, 1.4, 1.1, -0.05), 1.0);
        assert_eq!(dc_tau(3, 3, 1.4, 1.1, -0.05), 1.0);
        assert!(dc_tau(0, 0, 1.4, 1.1, -0.05) > 1.0);
        assert!(dc_tau(1, 1, 1.4, 1.1, -0.05) > 1.0);
    }

    #[test]
    fn negative_rho_raises_draws() {
        let independent = outcome_probs(1.26, 1.26, 0.0, 10);
        let corrected = outcome_probs(1.26, 1.26, -0.05, 10);
        assert!(corrected.draw > independent.draw);
        assert!((corrected.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empirical_probs_count_buckets() {
        let outcomes = [
            classify_outcome(2, 1),
            classify_outcome(0, 0),
            classify_outcome(1, 3),
            classify_outcome(4, 0),
        ];
        let p = empirical_outcome_probs(&outcomes);
        assert!((p.win - 0.5).abs() < 1e-12);
        assert!((p.draw - 0.25).abs() < 1e-12);
        assert!((p.loss - 0.25).abs() < 1e-12);
    }
}
