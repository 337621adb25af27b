use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use log::{info, warn};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Tabs};

use wc26_bracket_sim::cli;
use wc26_bracket_sim::error::SimError;
use wc26_bracket_sim::export;
use wc26_bracket_sim::fixtures::TournamentConfig;
use wc26_bracket_sim::market::{self, GroupTableSource, MarketFetchConfig};
use wc26_bracket_sim::overrides::ActualResults;
use wc26_bracket_sim::ratings::{self, RatingFetchConfig, RatingSnapshot};
use wc26_bracket_sim::report::SimulationReport;
use wc26_bracket_sim::simulation::{SimulationConfig, run_simulation_with_progress};
use wc26_bracket_sim::wc2026;

const CONSOLE_LINES: usize = 200;

struct Inputs {
    settings: SimulationConfig,
    tournament: TournamentConfig,
    ratings: RatingSnapshot,
    results: ActualResults,
    market: Option<market::MarketPrices>,
    json_path: Option<PathBuf>,
    xlsx_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = cli::args();
    if cli::has_flag(&args, "--help") || cli::has_flag(&args, "-h") {
        print_usage();
        return Ok(());
    }
    let plain = cli::has_flag(&args, "--plain");
    let console = init_logging(plain);

    let inputs = load_inputs(&args)?;
    let report = if plain {
        run_plain(&inputs)?
    } else {
        run_tui(&inputs, console)?
    };

    if let Some(report) = report {
        write_exports(&inputs, &report)?;
    }
    Ok(())
}

fn print_usage() {
    println!("wc26_sim [--offline] [--ratings PATH] [--config PATH] [--results PATH]");
    println!("         [--trials N] [--seed N] [--threads N] [--plain] [--json PATH] [--xlsx PATH]");
}

/// In the viewer, log lines go to an in-memory console instead of the terminal.
fn init_logging(plain: bool) -> Option<Arc<Mutex<Vec<String>>>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"));
    if plain {
        builder.init();
        return None;
    }
    let lines = Arc::new(Mutex::new(Vec::new()));
    builder
        .format_timestamp(None)
        .target(env_logger::Target::Pipe(Box::new(ConsoleSink {
            lines: Arc::clone(&lines),
            partial: String::new(),
        })))
        .init();
    Some(lines)
}

struct ConsoleSink {
    lines: Arc<Mutex<Vec<String>>>,
    partial: String,
}

impl Write for ConsoleSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(line.trim_end().to_string());
                let excess = lines.len().saturating_sub(CONSOLE_LINES);
                lines.drain(..excess);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn load_inputs(args: &[String]) -> Result<Inputs> {
    let offline = cli::has_flag(args, "--offline");

    let mut settings = SimulationConfig::from_env();
    if let Some(trials) = cli::parse_arg::<u32>(args, "--trials") {
        settings.trials = trials;
    }
    if let Some(seed) = cli::parse_arg::<u64>(args, "--seed") {
        settings.seed = seed;
    }
    if let Some(threads) = cli::parse_arg::<usize>(args, "--threads") {
        settings.threads = threads;
    }

    let tournament = match cli::arg_value(args, "--config") {
        Some(path) => TournamentConfig::load(&PathBuf::from(path))?,
        None => wc2026::world_cup_2026(),
    };
    let results = match cli::arg_value(args, "--results") {
        Some(path) => ActualResults::load(&PathBuf::from(path))?,
        None => ActualResults::default(),
    };

    let ratings = match cli::arg_value(args, "--ratings") {
        Some(path) => RatingSnapshot::load(&PathBuf::from(path))?,
        None if offline => ratings::fallback_snapshot(),
        None => ratings::fetch_live_snapshot(&RatingFetchConfig::from_env()),
    };
    info!(
        "ratings: {} teams from {} ({})",
        ratings.len(),
        ratings.source.label(),
        ratings.updated
    );

    let market = if offline {
        None
    } else {
        let cfg = MarketFetchConfig::from_env();
        if cfg.enabled() {
            match market::fetch_market_prices(&cfg) {
                Ok(prices) if !prices.is_empty() => Some(prices),
                Ok(_) => None,
                Err(err) => {
                    warn!("market prices unavailable: {err:#}");
                    None
                }
            }
        } else {
            None
        }
    };

    Ok(Inputs {
        settings,
        tournament,
        ratings,
        results,
        market,
        json_path: cli::arg_value(args, "--json").map(PathBuf::from),
        xlsx_path: cli::arg_value(args, "--xlsx").map(PathBuf::from),
    })
}

fn finish_report(inputs: &Inputs, mut report: SimulationReport) -> SimulationReport {
    if let Some(prices) = inputs.market.as_ref() {
        report.apply_market(&market::normalize_group_prices(prices));
    }
    report
}

fn write_exports(inputs: &Inputs, report: &SimulationReport) -> Result<()> {
    if let Some(path) = inputs.json_path.as_ref() {
        export::export_report_json(path, report)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = inputs.xlsx_path.as_ref() {
        let summary = export::export_report_xlsx(path, report)?;
        println!(
            "Wrote {} ({} groups, {} teams, {} fixtures, {} venue rows, {} match odds)",
            path.display(),
            summary.groups,
            summary.teams,
            summary.fixtures,
            summary.venue_rows,
            summary.match_odds
        );
    }
    Ok(())
}

fn run_plain(inputs: &Inputs) -> Result<Option<SimulationReport>> {
    let cancel = AtomicBool::new(false);
    let progress = AtomicU32::new(0);
    let report = run_simulation_with_progress(
        &inputs.settings,
        &inputs.tournament,
        &inputs.ratings,
        &inputs.results,
        &cancel,
        &progress,
    )
    .context("simulation could not run")?;
    let report = finish_report(inputs, report);

    println!("{}", header_line(&report));
    println!();
    println!("{}", groups_text(&report));
    println!("{}", advancement_text(&report));
    println!("{}", fixtures_text(&report));
    println!("{}", odds_text(&report));
    Ok(Some(report))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Groups,
    Advancement,
    Fixtures,
    MatchOdds,
}

const TABS: [Tab; 4] = [Tab::Groups, Tab::Advancement, Tab::Fixtures, Tab::MatchOdds];

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Groups => "1 Groups",
            Tab::Advancement => "2 Advancement",
            Tab::Fixtures => "3 Fixtures",
            Tab::MatchOdds => "4 Match Odds",
        }
    }

    fn index(self) -> usize {
        TABS.iter().position(|t| *t == self).unwrap_or(0)
    }

    fn next(self) -> Tab {
        TABS[(self.index() + 1) % TABS.len()]
    }
}

enum RunState {
    Running { started: Instant },
    Done(Box<SimulationReport>),
    Cancelled { completed: u32 },
    Failed(String),
}

struct App {
    tab: Tab,
    scroll: u16,
    help_overlay: bool,
    should_quit: bool,
    run: RunState,
    requested: u32,
    cancel: Arc<AtomicBool>,
    progress: Arc<AtomicU32>,
    console: Option<Arc<Mutex<Vec<String>>>>,
}

impl App {
    fn on_key(&mut self, key: KeyEvent) {
        let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl_c || key.code == KeyCode::Char('q') {
            if matches!(self.run, RunState::Running { .. }) {
                self.cancel.store(true, Ordering::Relaxed);
                if key.code == KeyCode::Char('q') {
                    self.should_quit = true;
                }
            } else {
                self.should_quit = true;
            }
            return;
        }
        match key.code {
            KeyCode::Char('1') => self.set_tab(Tab::Groups),
            KeyCode::Char('2') => self.set_tab(Tab::Advancement),
            KeyCode::Char('3') => self.set_tab(Tab::Fixtures),
            KeyCode::Char('4') => self.set_tab(Tab::MatchOdds),
            KeyCode::Tab => self.set_tab(self.tab.next()),
            KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageDown => self.scroll = self.scroll.saturating_add(20),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(20),
            KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
            KeyCode::Char('?') => self.help_overlay = !self.help_overlay,
            KeyCode::Esc => self.help_overlay = false,
            _ => {}
        }
    }

    fn set_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.scroll = 0;
        }
    }

    fn report(&self) -> Option<&SimulationReport> {
        match &self.run {
            RunState::Done(report) => Some(&**report),
            _ => None,
        }
    }
}

fn run_tui(inputs: &Inputs, console: Option<Arc<Mutex<Vec<String>>>>) -> Result<Option<SimulationReport>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(AtomicU32::new(0));
    let (tx, rx) = mpsc::channel();

    {
        let settings = inputs.settings.clone();
        let tournament = inputs.tournament.clone();
        let ratings = inputs.ratings.clone();
        let results = inputs.results.clone();
        let cancel = Arc::clone(&cancel);
        let progress = Arc::clone(&progress);
        thread::spawn(move || {
            let out = run_simulation_with_progress(
                &settings,
                &tournament,
                &ratings,
                &results,
                &cancel,
                &progress,
            );
            let _ = tx.send(out);
        });
    }

    let mut app = App {
        tab: Tab::Groups,
        scroll: 0,
        help_overlay: false,
        should_quit: false,
        run: RunState::Running {
            started: Instant::now(),
        },
        requested: inputs.settings.trials,
        cancel,
        progress,
        console,
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, &rx, inputs);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res?;

    match app.run {
        RunState::Done(report) => Ok(Some(*report)),
        RunState::Cancelled { completed } => {
            eprintln!("Simulation cancelled after {completed} of {} trials; no report.", app.requested);
            Ok(None)
        }
        RunState::Failed(msg) => Err(anyhow::anyhow!("simulation could not run: {msg}")),
        RunState::Running { .. } => Ok(None),
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: &mpsc::Receiver<Result<SimulationReport, SimError>>,
    inputs: &Inputs,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        match rx.try_recv() {
            Ok(out) => {
                app.run = match out {
                    Ok(report) => RunState::Done(Box::new(finish_report(inputs, report))),
                    Err(SimError::Cancelled { completed, .. }) => RunState::Cancelled { completed },
                    Err(err) => RunState::Failed(err.to_string()),
                };
            }
            Err(mpsc::TryRecvError::Disconnected) if matches!(app.run, RunState::Running { .. }) => {
                app.run = RunState::Failed("simulation worker stopped unexpectedly".to_string());
            }
            Err(_) => {}
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        // A cancelled run is only left once the worker has reported back.
        if app.should_quit && !matches!(app.run, RunState::Running { .. }) {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(match app.report() {
        Some(report) => header_line(report),
        None => "WC26 BRACKET SIM".to_string(),
    })
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let tabs = Tabs::new(TABS.iter().map(|t| t.title()).collect::<Vec<_>>())
        .select(app.tab.index())
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(tabs, chunks[1]);

    match &app.run {
        RunState::Running { started } => {
            let done = app.progress.load(Ordering::Relaxed);
            let ratio = f64::from(done) / f64::from(app.requested.max(1));
            let label = if app.cancel.load(Ordering::Relaxed) {
                format!("cancelling after {done} trials...")
            } else {
                format!("{done}/{} trials  {:.1}s", app.requested, started.elapsed().as_secs_f64())
            };
            let gauge = Gauge::default()
                .block(Block::default().title("Simulating").borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Green))
                .ratio(ratio.clamp(0.0, 1.0))
                .label(label);
            let area = centered_rect(60, 20, chunks[2]);
            frame.render_widget(gauge, area);
        }
        RunState::Done(report) => {
            let text = match app.tab {
                Tab::Groups => groups_text(report),
                Tab::Advancement => advancement_text(report),
                Tab::Fixtures => fixtures_text(report),
                Tab::MatchOdds => odds_text(report),
            };
            let body = Paragraph::new(text).scroll((app.scroll, 0));
            frame.render_widget(body, chunks[2]);
        }
        RunState::Cancelled { completed } => {
            let msg = format!(
                "Cancelled after {completed} of {} trials. Partial counts are discarded.\n\nq Quit",
                app.requested
            );
            frame.render_widget(Paragraph::new(msg).style(Style::default().fg(Color::Yellow)), chunks[2]);
        }
        RunState::Failed(msg) => {
            let msg = format!("Simulation could not run:\n\n{msg}\n\nq Quit");
            frame.render_widget(Paragraph::new(msg).style(Style::default().fg(Color::Red)), chunks[2]);
        }
    }

    let console = Paragraph::new(console_text(app, chunks[3].height.saturating_sub(2) as usize))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().title("Log").borders(Borders::TOP));
    frame.render_widget(console, chunks[3]);

    let footer = Paragraph::new(
        "1-4/Tab Views | j/k/↑/↓ Scroll | PgUp/PgDn Page | ? Help | Ctrl-C Cancel | q Quit",
    );
    frame.render_widget(footer, chunks[4]);

    if app.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn console_text(app: &App, visible: usize) -> String {
    let Some(console) = app.console.as_ref() else {
        return String::new();
    };
    let Ok(lines) = console.lock() else {
        return String::new();
    };
    let start = lines.len().saturating_sub(visible);
    lines[start..].join("\n")
}

fn header_line(report: &SimulationReport) -> String {
    let market = if report
        .groups
        .iter()
        .any(|g| g.source == GroupTableSource::Market)
    {
        " | market group odds"
    } else {
        ""
    };
    format!(
        "{} | {} trials | seed {} | ratings: {} ({}) | {} recorded results{}",
        report.tournament,
        report.trials,
        report.seed,
        report.rating_source.label(),
        report.ratings_updated,
        report.recorded_results,
        market
    )
}

fn pct(p: f64) -> String {
    format!("{:>5.1}%", p * 100.0)
}

fn groups_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    for group in &report.groups {
        let source = match group.source {
            GroupTableSource::Simulated => "simulated",
            GroupTableSource::Market => "market",
        };
        out.push_str(&format!("Group {} ({source})\n", group.group));
        out.push_str(&format!(
            "  {:<28} {:>7} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}\n",
            "Team", "Rating", "1st", "2nd", "3rd", "4th", "Best3", "Adv", "Win"
        ));
        for row in &group.rows {
            out.push_str(&format!(
                "  {:<28} {:>7.1} {} {} {} {} {} {} {}\n",
                truncate(&row.team, 28),
                row.rating,
                pct(row.p_position[0]),
                pct(row.p_position[1]),
                pct(row.p_position[2]),
                pct(row.p_position[3]),
                pct(row.p_qualify_third),
                pct(row.p_advance),
                pct(row.p_win_group),
            ));
        }
        out.push('\n');
    }
    out
}

fn advancement_text(report: &SimulationReport) -> String {
    let mut out = format!(
        "{:<4} {:<28} {:>3} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}\n",
        "#", "Team", "Grp", "R32", "R16", "QF", "SF", "Final", "Champ", "3rd"
    );
    for (i, t) in report.teams.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<28} {:>3} {} {} {} {} {} {} {}\n",
            i + 1,
            truncate(&t.team, 28),
            t.group,
            pct(t.p_round_of_32),
            pct(t.p_round_of_16),
            pct(t.p_quarter_final),
            pct(t.p_semi_final),
            pct(t.p_final),
            pct(t.p_champion),
            pct(t.p_third_place),
        ));
    }
    out
}

fn fixtures_text(report: &SimulationReport) -> String {
    let mut out = String::new();
    for f in &report.fixtures {
        out.push_str(&format!(
            "M{:<4} {:<14} {:<36} {} v {}   ET {} Pens {}\n",
            f.number,
            f.round.label(),
            truncate(&f.venue, 36),
            f.home_label,
            f.away_label,
            pct(f.p_extra_time),
            pct(f.p_penalties),
        ));
        for p in f.participants.iter().take(6) {
            out.push_str(&format!(
                "       {:<28} plays {}  wins {}\n",
                truncate(&p.team, 28),
                pct(p.p_appear),
                pct(p.p_win)
            ));
        }
        out.push('\n');
    }
    out
}

fn odds_text(report: &SimulationReport) -> String {
    let mut out = format!(
        "{:<3} {:<56} {:>11} {:>6} {:>6} {:>6}\n",
        "Grp", "Match", "xG", "Home", "Draw", "Away"
    );
    for m in &report.match_odds {
        let pairing = format!("{} v {}", m.home, m.away);
        out.push_str(&format!(
            "{:<3} {:<56} {:>5.2}-{:<5.2} {} {} {}\n",
            m.group,
            truncate(&pairing, 56),
            m.lambda_home,
            m.lambda_away,
            pct(m.p_home),
            pct(m.p_draw),
            pct(m.p_away),
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(max.saturating_sub(1)).collect();
        t.push('…');
        t
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "WC26 Bracket Sim - Help",
        "",
        "Views:",
        "  1            Group tables",
        "  2            Advancement by round",
        "  3            Knockout fixtures",
        "  4            Group match odds",
        "  Tab          Next view",
        "",
        "Navigation:",
        "  j/k or ↑/↓   Scroll",
        "  PgUp/PgDn    Page",
        "  g / Home     Top",
        "",
        "  Ctrl-C       Cancel a running simulation",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
