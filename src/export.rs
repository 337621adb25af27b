use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::report::SimulationReport;

pub struct ExportSummary {
    pub groups: usize,
    pub teams: usize,
    pub fixtures: usize,
    pub venue_rows: usize,
    pub match_odds: usize,
}

pub fn export_report_xlsx(path: &Path, report: &SimulationReport) -> Result<ExportSummary> {
    let mut group_rows = vec![vec![
        "Group".to_string(),
        "Team".to_string(),
        "Rating".to_string(),
        "P(1st)".to_string(),
        "P(2nd)".to_string(),
        "P(3rd)".to_string(),
        "P(4th)".to_string(),
        "P(Best 3rd)".to_string(),
        "P(Advance)".to_string(),
        "P(Win Group)".to_string(),
        "P(Top 2)".to_string(),
        "Source".to_string(),
    ]];
    for group in &report.groups {
        for row in &group.rows {
            let mut cells = vec![group.group.to_string(), row.team.clone(), format!("{:.2}", row.rating)];
            cells.extend(row.p_position.iter().map(|p| pct(*p)));
            cells.extend([
                pct(row.p_qualify_third),
                pct(row.p_advance),
                pct(row.p_win_group),
                pct(row.p_qualify),
                format!("{:?}", group.source),
            ]);
            group_rows.push(cells);
        }
    }

    let mut advancement_rows = vec![vec![
        "Team".to_string(),
        "Group".to_string(),
        "Rating".to_string(),
        "R32".to_string(),
        "R16".to_string(),
        "QF".to_string(),
        "SF".to_string(),
        "Final".to_string(),
        "Champion".to_string(),
        "Third Place".to_string(),
    ]];
    for t in &report.teams {
        advancement_rows.push(vec![
            t.team.clone(),
            t.group.to_string(),
            format!("{:.2}", t.rating),
            pct(t.p_round_of_32),
            pct(t.p_round_of_16),
            pct(t.p_quarter_final),
            pct(t.p_semi_final),
            pct(t.p_final),
            pct(t.p_champion),
            pct(t.p_third_place),
        ]);
    }

    let mut fixture_rows = vec![vec![
        "Match".to_string(),
        "Round".to_string(),
        "Venue".to_string(),
        "Slot".to_string(),
        "Team".to_string(),
        "P(Plays)".to_string(),
        "P(Wins)".to_string(),
        "P(Extra Time)".to_string(),
        "P(Penalties)".to_string(),
    ]];
    for f in &report.fixtures {
        let slot = format!("{} v {}", f.home_label, f.away_label);
        for p in &f.participants {
            fixture_rows.push(vec![
                f.number.to_string(),
                f.round.label().to_string(),
                f.venue.clone(),
                slot.clone(),
                p.team.clone(),
                pct(p.p_appear),
                pct(p.p_win),
                pct(f.p_extra_time),
                pct(f.p_penalties),
            ]);
        }
    }

    let mut venue_rows = vec![vec![
        "Team".to_string(),
        "Round".to_string(),
        "Venue".to_string(),
        "P(Plays There)".to_string(),
    ]];
    for v in &report.venues {
        for share in &v.venues {
            venue_rows.push(vec![
                v.team.clone(),
                share.round.label().to_string(),
                share.venue.clone(),
                pct(share.p_appear),
            ]);
        }
    }

    let mut odds_rows = vec![vec![
        "Group".to_string(),
        "Home".to_string(),
        "Away".to_string(),
        "Home Rating".to_string(),
        "Away Rating".to_string(),
        "xG Home".to_string(),
        "xG Away".to_string(),
        "Home Win".to_string(),
        "Draw".to_string(),
        "Away Win".to_string(),
    ]];
    for m in &report.match_odds {
        odds_rows.push(vec![
            m.group.to_string(),
            m.home.clone(),
            m.away.clone(),
            format!("{:.2}", m.home_rating),
            format!("{:.2}", m.away_rating),
            format!("{:.3}", m.lambda_home),
            format!("{:.3}", m.lambda_away),
            pct(m.p_home),
            pct(m.p_draw),
            pct(m.p_away),
        ]);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Groups")?;
        write_rows(sheet, &group_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Advancement")?;
        write_rows(sheet, &advancement_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Fixtures")?;
        write_rows(sheet, &fixture_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Venues")?;
        write_rows(sheet, &venue_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Match Odds")?;
        write_rows(sheet, &odds_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportSummary {
        groups: report.groups.len(),
        teams: advancement_rows.len().saturating_sub(1),
        fixtures: report.fixtures.len(),
        venue_rows: venue_rows.len().saturating_sub(1),
        match_odds: odds_rows.len().saturating_sub(1),
    })
}

/// Pretty JSON, written to a sibling temp file and renamed into place.
pub fn export_report_json(path: &Path, report: &SimulationReport) -> Result<()> {
    let json = report.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

fn pct(p: f64) -> String {
    format!("{:.2}", p * 100.0)
}
