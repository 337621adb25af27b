use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::fixtures::Bracket;
use crate::http_client::{body_snippet, http_client};

pub const DEFAULT_RATING: f64 = 1500.0;
const FALLBACK_UPDATED: &str = "2026-01-19";
const FIFA_API_BASE: &str = "https://www.fifa.com/api/ranking-overview";
const FIFA_API_DATE_IDS: [&str; 3] = ["id13974", "id13973", "id13972"];
// A partial ranking page is worse than the static table.
const MIN_LIVE_TEAMS: usize = 50;

/// FIFA points from the 19 January 2026 men's ranking release, plus estimates
/// for playoff placeholders.
const FALLBACK_FIFA_POINTS: &[(&str, f64)] = &[
    ("Argentina", 1867.25),
    ("France", 1870.00),
    ("Spain", 1853.08),
    ("England", 1823.39),
    ("Brazil", 1775.85),
    ("Belgium", 1730.71),
    ("Netherlands", 1761.71),
    ("Portugal", 1756.12),
    ("Germany", 1724.15),
    ("Italy", 1731.51),
    ("USA", 1680.00),
    ("United States", 1680.00),
    ("Colombia", 1727.33),
    ("Uruguay", 1695.91),
    ("Croatia", 1712.38),
    ("Mexico", 1658.82),
    ("Canada", 1601.29),
    ("Japan", 1665.50),
    ("Morocco", 1682.63),
    ("Switzerland", 1672.69),
    ("Denmark", 1669.87),
    ("Austria", 1630.81),
    ("Senegal", 1706.83),
    ("Iran", 1617.02),
    ("South Korea", 1611.84),
    ("Australia", 1583.86),
    ("Ecuador", 1591.73),
    ("Norway", 1553.14),
    ("Egypt", 1583.49),
    ("Paraguay", 1492.72),
    ("Côte d'Ivoire", 1496.84),
    ("Serbia", 1567.29),
    ("Turkey", 1597.71),
    ("Scotland", 1530.46),
    ("Wales", 1513.64),
    ("Poland", 1559.53),
    ("Romania", 1505.51),
    ("Tunisia", 1503.38),
    ("Panama", 1466.18),
    ("New Zealand", 1362.48),
    ("Curaçao", 1341.53),
    ("Saudi Arabia", 1536.13),
    ("South Africa", 1485.33),
    ("Jamaica", 1442.94),
    ("Costa Rica", 1441.42),
    ("Algeria", 1484.71),
    ("Jordan", 1441.36),
    ("Uzbekistan", 1456.93),
    ("Ghana", 1430.51),
    ("Haiti", 1371.58),
    ("Cape Verde", 1399.43),
    ("Qatar", 1461.79),
    ("UEFA Playoff A", 1550.00),
    ("UEFA Playoff B", 1550.00),
    ("UEFA Playoff C", 1530.00),
    ("UEFA Playoff D", 1550.00),
    ("TBD Playoff", 1400.00),
    ("Intercontinental Playoff 1", 1400.00),
    ("Intercontinental Playoff 2", 1400.00),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingSource {
    Live,
    Fallback,
    File,
}

impl RatingSource {
    pub fn label(self) -> &'static str {
        match self {
            RatingSource::Live => "fifa-api",
            RatingSource::Fallback => "fallback",
            RatingSource::File => "file",
        }
    }
}

/// Immutable rating table for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub ratings: HashMap<String, f64>,
    pub source: RatingSource,
    pub updated: String,
    pub default_rating: f64,
}

impl RatingSnapshot {
    /// Exact-name lookup; a missing or non-positive entry yields the default.
    pub fn get_rating(&self, name: &str) -> f64 {
        self.ratings
            .get(name)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.default_rating)
    }

    pub fn with_default(mut self, default_rating: f64) -> Self {
        self.default_rating = default_rating;
        self
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// A JSON object of name -> rating.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read ratings file {}", path.display()))?;
        let mut ratings: HashMap<String, f64> =
            serde_json::from_str(&raw).context("invalid ratings json")?;
        add_usa_alias(&mut ratings);
        Ok(Self {
            ratings,
            source: RatingSource::File,
            updated: path.display().to_string(),
            default_rating: DEFAULT_RATING,
        })
    }
}

pub fn fallback_snapshot() -> RatingSnapshot {
    RatingSnapshot {
        ratings: FALLBACK_FIFA_POINTS
            .iter()
            .map(|(name, pts)| (name.to_string(), *pts))
            .collect(),
        source: RatingSource::Fallback,
        updated: FALLBACK_UPDATED.to_string(),
        default_rating: DEFAULT_RATING,
    }
}

#[derive(Debug, Clone)]
pub struct RatingFetchConfig {
    pub enabled: bool,
    pub base_url: String,
    pub date_ids: Vec<String>,
}

impl RatingFetchConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("RATINGS_LIVE")
            .ok()
            .map(|v| {
                let t = v.trim().to_ascii_lowercase();
                !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
            })
            .unwrap_or(true);
        let base_url = env::var("FIFA_RANKING_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| FIFA_API_BASE.to_string());
        let date_ids = env::var("FIFA_RANKING_DATE_IDS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|ids| !ids.is_empty())
            .unwrap_or_else(|| FIFA_API_DATE_IDS.iter().map(|s| s.to_string()).collect());
        Self {
            enabled,
            base_url,
            date_ids,
        }
    }

    pub fn offline() -> Self {
        Self {
            enabled: false,
            ..Self::from_env()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RankingOverview {
    #[serde(default)]
    rankings: Vec<RankingEntry>,
}

#[derive(Debug, Deserialize)]
struct RankingEntry {
    #[serde(rename = "rankingItem")]
    ranking_item: Option<RankingItem>,
}

#[derive(Debug, Deserialize)]
struct RankingItem {
    name: Option<String>,
    #[serde(rename = "totalPoints")]
    total_points: Option<f64>,
}

/// Try each ranking release in turn; any failure ends in the static table.
pub fn fetch_live_snapshot(cfg: &RatingFetchConfig) -> RatingSnapshot {
    if !cfg.enabled {
        debug!("live ratings disabled, using fallback table");
        return fallback_snapshot();
    }
    for date_id in &cfg.date_ids {
        match fetch_ranking(&cfg.base_url, date_id) {
            Ok(ratings) => {
                info!("fetched {} live ratings ({date_id})", ratings.len());
                return RatingSnapshot {
                    ratings,
                    source: RatingSource::Live,
                    updated: Utc::now().format("%Y-%m-%d").to_string(),
                    default_rating: DEFAULT_RATING,
                };
            }
            Err(err) => debug!("ranking {date_id} unavailable: {err:#}"),
        }
    }
    warn!("live ratings unavailable, using {FALLBACK_UPDATED} table");
    fallback_snapshot()
}

fn fetch_ranking(base_url: &str, date_id: &str) -> Result<HashMap<String, f64>> {
    let client = http_client()?;
    let resp = client
        .get(base_url)
        .query(&[("locale", "en"), ("dateId", date_id)])
        .send()
        .context("ranking request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading ranking body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("ranking http {}: {}", status, body_snippet(&body)));
    }
    parse_ranking_json(&body)
}

pub fn parse_ranking_json(raw: &str) -> Result<HashMap<String, f64>> {
    let parsed: RankingOverview = serde_json::from_str(raw).context("invalid ranking json")?;
    let mut teams: HashMap<String, f64> = parsed
        .rankings
        .into_iter()
        .filter_map(|entry| {
            let item = entry.ranking_item?;
            let name = item.name?.trim().to_string();
            let points = item.total_points.filter(|p| p.is_finite())?;
            (!name.is_empty()).then_some((name, points))
        })
        .collect();
    if teams.len() <= MIN_LIVE_TEAMS {
        return Err(anyhow::anyhow!(
            "ranking has {} teams, need more than {MIN_LIVE_TEAMS}",
            teams.len()
        ));
    }
    add_usa_alias(&mut teams);
    Ok(teams)
}

fn add_usa_alias(teams: &mut HashMap<String, f64>) {
    if let Some(p) = teams.get("USA").copied() {
        teams.entry("United States".to_string()).or_insert(p);
    }
    if let Some(p) = teams.get("United States").copied() {
        teams.entry("USA".to_string()).or_insert(p);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamEntry {
    pub id: usize,
    pub group: usize,
    pub rating: f64,
}

/// Name -> (team id, group, rating), built once per run.
#[derive(Debug, Clone, Default)]
pub struct TeamIndex {
    by_name: HashMap<String, TeamEntry>,
    ratings: Vec<f64>,
    defaulted: Vec<String>,
}

impl TeamIndex {
    pub fn build(bracket: &Bracket, snapshot: &RatingSnapshot) -> Self {
        let mut by_name = HashMap::with_capacity(bracket.teams().len());
        let mut ratings = Vec::with_capacity(bracket.teams().len());
        let mut defaulted = Vec::new();
        for (id, name) in bracket.teams().iter().enumerate() {
            if !snapshot.ratings.contains_key(name) {
                defaulted.push(name.clone());
            }
            let rating = snapshot.get_rating(name);
            ratings.push(rating);
            by_name.insert(
                name.clone(),
                TeamEntry {
                    id,
                    group: bracket.group_of(id).unwrap_or_default(),
                    rating,
                },
            );
        }
        if !defaulted.is_empty() {
            warn!(
                "{} teams have no rating, using {}: {}",
                defaulted.len(),
                snapshot.default_rating,
                defaulted.join(", ")
            );
        }
        Self {
            by_name,
            ratings,
            defaulted,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TeamEntry> {
        self.by_name.get(name)
    }

    /// Ratings by team id.
    pub fn ratings(&self) -> &[f64] {
        &self.ratings
    }

    /// Teams that fell back to the default rating.
    pub fn defaulted(&self) -> &[String] {
        &self.defaulted
    }
}
