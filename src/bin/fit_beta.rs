use wc26_bracket_sim::calibration;
use wc26_bracket_sim::cli;
use wc26_bracket_sim::goal_model::{self, GoalModel};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = cli::args();
    let divisor = cli::parse_arg::<f64>(&args, "--divisor")
        .unwrap_or(400.0)
        .clamp(100.0, 2000.0);
    let max_diff = cli::parse_arg::<f64>(&args, "--max-diff")
        .unwrap_or(800.0)
        .clamp(25.0, 2000.0);

    let base = GoalModel::from_env();
    let beta = goal_model::fit_beta(&base, divisor, max_diff);
    let fitted = base.with_beta(beta);

    println!("divisor={divisor} max_diff={max_diff}");
    println!(
        "current beta={:.5} err={:.6}",
        base.beta,
        goal_model::beta_fit_error(&base, divisor, max_diff)
    );
    println!(
        "fitted  beta={:.5} err={:.6}",
        beta,
        goal_model::beta_fit_error(&fitted, divisor, max_diff)
    );
    println!();
    println!("{:>6} {:>8} {:>8} {:>8} {:>8}", "diff", "win", "draw", "model", "target");
    let mut diff = 0.0;
    while diff <= max_diff {
        let p = calibration::match_odds(&fitted, diff, 0.0);
        println!(
            "{:>6.0} {:>7.1}% {:>7.1}% {:>8.3} {:>8.3}",
            diff,
            p.win * 100.0,
            p.draw * 100.0,
            p.win + 0.5 * p.draw,
            goal_model::expected_score(diff, 0.0, divisor)
        );
        diff += 100.0;
    }

    Ok(())
}
