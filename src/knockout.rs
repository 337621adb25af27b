use rand::Rng;
use serde::Serialize;

use crate::goal_model::GoalModel;
use crate::scoring::{MatchContext, sample_score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decider {
    Regulation,
    ExtraTime,
    Penalties,
    /// Winner taken from a recorded result.
    Recorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnockoutOutcome {
    pub winner: Side,
    pub decided_by: Decider,
    pub home_goals: u32,
    pub away_goals: u32,
}

/// Play a knockout tie between two team ids: 90 minutes, then 30 minutes of
/// extra time at a reduced rate, then a rating-weighted shootout.
pub fn resolve<R: Rng>(rng: &mut R, ctx: &MatchContext, home: usize, away: usize) -> KnockoutOutcome {
    let regulation = ctx.regulation_score(rng, home, away);
    settle(rng, ctx.model(), ctx.rating(home), ctx.rating(away), regulation)
}

/// Same state machine straight from two ratings, independent Poisson draws.
pub fn resolve_by_rating<R: Rng>(rng: &mut R, model: &GoalModel, rating_a: f64, rating_b: f64) -> Side {
    let (la, lb) = model.rates(rating_a, rating_b);
    let regulation = (sample_score(rng, la), sample_score(rng, lb));
    settle(rng, model, rating_a, rating_b, regulation).winner
}

fn settle<R: Rng>(
    rng: &mut R,
    model: &GoalModel,
    rating_a: f64,
    rating_b: f64,
    regulation: (u32, u32),
) -> KnockoutOutcome {
    let (ga, gb) = regulation;
    if ga != gb {
        return KnockoutOutcome {
            winner: if ga > gb { Side::Home } else { Side::Away },
            decided_by: Decider::Regulation,
            home_goals: ga,
            away_goals: gb,
        };
    }

    let (la, lb) = model.extra_time_rates(rating_a, rating_b);
    let (ea, eb) = (sample_score(rng, la), sample_score(rng, lb));
    if ea != eb {
        return KnockoutOutcome {
            winner: if ea > eb { Side::Home } else { Side::Away },
            decided_by: Decider::ExtraTime,
            home_goals: ga + ea,
            away_goals: gb + eb,
        };
    }

    let p_home = model.penalty_win_prob(rating_a, rating_b);
    KnockoutOutcome {
        winner: if rng.gen_bool(p_home) {
            Side::Home
        } else {
            Side::Away
        },
        decided_by: Decider::Penalties,
        home_goals: ga + ea,
        away_goals: gb + eb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoreSampling;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn stronger_side_wins_more_often() {
        let model = GoalModel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 10_000;
        let wins = (0..n)
            .filter(|_| resolve_by_rating(&mut rng, &model, 1850.0, 1550.0) == Side::Home)
            .count();
        let p = wins as f64 / n as f64;
        assert!(p > 0.75, "p = {p}");
    }

    #[test]
    fn equal_sides_split_evenly() {
        let ctx = MatchContext::new(
            GoalModel::default(),
            vec![1700.0, 1700.0],
            ScoreSampling::DixonColes,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let n = 10_000;
        let mut home = 0;
        let mut shootouts = 0;
        for _ in 0..n {
            let out = resolve(&mut rng, &ctx, 0, 1);
            if out.winner == Side::Home {
                home += 1;
            }
            if out.decided_by == Decider::Penalties {
                shootouts += 1;
                assert_eq!(out.home_goals, out.away_goals);
            }
        }
        let p = home as f64 / n as f64;
        assert!((p - 0.5).abs() < 0.03, "p = {p}");
        assert!(shootouts > 0);
    }

    #[test]
    fn decided_score_is_never_level_before_penalties() {
        let ctx = MatchContext::new(
            GoalModel::default(),
            vec![1800.0, 1600.0],
            ScoreSampling::Independent,
        );
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..2_000 {
            let out = resolve(&mut rng, &ctx, 0, 1);
            match out.decided_by {
                Decider::Regulation | Decider::ExtraTime => {
                    assert_ne!(out.home_goals, out.away_goals);
                    let home_ahead = out.home_goals > out.away_goals;
                    assert_eq!(home_ahead, out.winner == Side::Home);
                }
                Decider::Penalties => assert_eq!(out.home_goals, out.away_goals),
                Decider::Recorded => unreachable!(),
            }
        }
    }
}
