use wc26_bracket_sim::calibration;
use wc26_bracket_sim::cli;
use wc26_bracket_sim::goal_model::GoalModel;
use wc26_bracket_sim::ratings::{self, RatingFetchConfig};

// Either side may be a team name or a bare rating.
fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let args = cli::args();
    let sides = cli::positionals(&args, &["--default"]);
    let [a, b] = sides.as_slice() else {
        eprintln!("usage: match_odds <team|rating> <team|rating> [--live] [--default RATING]");
        std::process::exit(2);
    };

    let snapshot = if cli::has_flag(&args, "--live") {
        ratings::fetch_live_snapshot(&RatingFetchConfig::from_env())
    } else {
        ratings::fallback_snapshot()
    };
    let snapshot = match cli::parse_arg::<f64>(&args, "--default") {
        Some(default) => snapshot.with_default(default),
        None => snapshot,
    };
    let resolve = |side: &str| {
        side.parse::<f64>()
            .unwrap_or_else(|_| snapshot.get_rating(side))
    };
    let (rating_a, rating_b) = (resolve(a.as_str()), resolve(b.as_str()));

    let model = GoalModel::from_env();
    let (lambda_a, lambda_b) = model.rates(rating_a, rating_b);
    let p = calibration::match_odds(&model, rating_a, rating_b);

    println!("{a} ({rating_a:.2}) v {b} ({rating_b:.2})  ratings: {}", snapshot.source.label());
    println!("xG: {lambda_a:.3} - {lambda_b:.3}");
    println!("{a} win: {:.1}%", p.win * 100.0);
    println!("Draw:    {:.1}%", p.draw * 100.0);
    println!("{b} win: {:.1}%", p.loss * 100.0);
    println!(
        "Shootout edge: {:.1}% for {a}",
        model.penalty_win_prob(rating_a, rating_b) * 100.0
    );

    Ok(())
}
