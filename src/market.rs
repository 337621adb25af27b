use std::collections::BTreeMap;
use std::env;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::http_client::{body_snippet, http_client};

const KALSHI_MARKETS_URL: &str = "https://api.elections.kalshi.com/trade-api/v2/markets";
const DEFAULT_SERIES: &str = "KXWCGROUP";
const QUALIFIERS_PER_GROUP: f64 = 2.0;

/// Where a reported group table's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupTableSource {
    #[default]
    Simulated,
    Market,
}

#[derive(Debug, Clone)]
pub struct MarketFetchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub series_ticker: String,
}

impl MarketFetchConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("KALSHI_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let base_url = env::var("KALSHI_MARKETS_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| KALSHI_MARKETS_URL.to_string());
        let series_ticker = env::var("KALSHI_SERIES")
            .ok()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERIES.to_string());
        Self {
            api_key,
            base_url,
            series_ticker,
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Raw quoted prices (0..1) for one team.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RawQuote {
    pub win_group: Option<f64>,
    pub qualify: Option<f64>,
}

/// Group id -> team -> quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketPrices {
    pub groups: BTreeMap<char, BTreeMap<String, RawQuote>>,
}

impl MarketPrices {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn insert_win(&mut self, group: char, team: &str, price: f64) {
        self.quote_mut(group, team).win_group = Some(price);
    }

    pub fn insert_qualify(&mut self, group: char, team: &str, price: f64) {
        self.quote_mut(group, team).qualify = Some(price);
    }

    fn quote_mut(&mut self, group: char, team: &str) -> &mut RawQuote {
        self.groups
            .entry(group)
            .or_default()
            .entry(team.to_string())
            .or_default()
    }
}

/// Overround-free probabilities for one team.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketOdds {
    pub p_win_group: Option<f64>,
    pub p_qualify: Option<f64>,
}

/// Per group: win prices scaled to sum to 1, qualify prices to sum to 2 with
/// no team above 1.
pub fn normalize_group_prices(prices: &MarketPrices) -> BTreeMap<char, BTreeMap<String, MarketOdds>> {
    let mut out = BTreeMap::new();
    for (group, quotes) in &prices.groups {
        let win_sum: f64 = quotes.values().filter_map(|q| valid(q.win_group)).sum();
        let qualify_sum: f64 = quotes.values().filter_map(|q| valid(q.qualify)).sum();

        let table = quotes
            .iter()
            .map(|(team, q)| {
                let p_win_group = valid(q.win_group)
                    .filter(|_| win_sum > 0.0)
                    .map(|p| p / win_sum);
                let p_qualify = valid(q.qualify)
                    .filter(|_| qualify_sum > 0.0)
                    .map(|p| (p * QUALIFIERS_PER_GROUP / qualify_sum).min(1.0));
                (
                    team.clone(),
                    MarketOdds {
                        p_win_group,
                        p_qualify,
                    },
                )
            })
            .collect();
        out.insert(*group, table);
    }
    out
}

fn valid(price: Option<f64>) -> Option<f64> {
    price.filter(|p| p.is_finite() && *p > 0.0)
}

#[derive(Debug, Deserialize)]
struct MarketsPage {
    #[serde(default)]
    markets: Vec<KalshiMarket>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KalshiMarket {
    #[serde(default)]
    title: String,
    #[serde(default)]
    yes_sub_title: Option<String>,
    #[serde(default)]
    yes_bid: Option<f64>,
    #[serde(default)]
    yes_ask: Option<f64>,
    #[serde(default)]
    last_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketKind {
    WinGroup,
    Qualify,
}

/// Group-stage prices from Kalshi. Returns empty prices when no key is set.
pub fn fetch_market_prices(cfg: &MarketFetchConfig) -> Result<MarketPrices> {
    let Some(api_key) = cfg.api_key.as_ref() else {
        debug!("KALSHI_API_KEY not set, skipping market prices");
        return Ok(MarketPrices::default());
    };

    let client = http_client()?;
    let mut prices = MarketPrices::default();
    let mut cursor: Option<String> = None;
    // at most 10 pages
    for _ in 0..10 {
        let mut req = client
            .get(&cfg.base_url)
            .bearer_auth(api_key)
            .query(&[
                ("series_ticker", cfg.series_ticker.as_str()),
                ("status", "open"),
                ("limit", "1000"),
            ]);
        if let Some(c) = cursor.as_deref() {
            req = req.query(&[("cursor", c)]);
        }
        let resp = req.send().context("kalshi request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading kalshi body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("kalshi http {}: {}", status, body_snippet(&body)));
        }
        let next = parse_markets_page(&body, &mut prices)?;
        match next {
            Some(c) if !c.is_empty() => cursor = Some(c),
            _ => break,
        }
    }

    info!("fetched market prices for {} groups", prices.groups.len());
    Ok(prices)
}

/// Group markets on a single page of the markets listing.
pub fn parse_markets_json(raw: &str) -> Result<MarketPrices> {
    let mut prices = MarketPrices::default();
    parse_markets_page(raw, &mut prices)?;
    Ok(prices)
}

// Adds every recognised group market and returns the next cursor.
fn parse_markets_page(raw: &str, prices: &mut MarketPrices) -> Result<Option<String>> {
    let page: MarketsPage = serde_json::from_str(raw).context("invalid kalshi json")?;
    for market in &page.markets {
        let Some((kind, team, group)) = classify_title(&market.title)
            .or_else(|| market.yes_sub_title.as_deref().and_then(classify_title))
        else {
            continue;
        };
        let Some(price) = quoted_price(market) else {
            continue;
        };
        match kind {
            MarketKind::WinGroup => prices.insert_win(group, &team, price),
            MarketKind::Qualify => prices.insert_qualify(group, &team, price),
        }
    }
    Ok(page.cursor)
}

// "Will Spain win Group H?" / "Will Spain advance from Group H?"
fn classify_title(title: &str) -> Option<(MarketKind, String, char)> {
    let t = title.trim().trim_end_matches('?');
    let rest = t.strip_prefix("Will ")?;
    let (team, kind, tail) = if let Some((team, tail)) = rest.split_once(" win Group ") {
        (team, MarketKind::WinGroup, tail)
    } else if let Some((team, tail)) = rest.split_once(" advance from Group ") {
        (team, MarketKind::Qualify, tail)
    } else if let Some((team, tail)) = rest.split_once(" qualify from Group ") {
        (team, MarketKind::Qualify, tail)
    } else {
        return None;
    };
    let group = tail.trim().chars().next()?.to_ascii_uppercase();
    if !group.is_ascii_alphabetic() || team.trim().is_empty() {
        return None;
    }
    Some((kind, team.trim().to_string(), group))
}

// Cents; mid of a two-sided book, else the last trade.
fn quoted_price(market: &KalshiMarket) -> Option<f64> {
    let bid = market.yes_bid.filter(|p| *p > 0.0);
    let ask = market.yes_ask.filter(|p| *p > 0.0 && *p < 100.0);
    let cents = match (bid, ask) {
        (Some(b), Some(a)) => (b + a) / 2.0,
        _ => market.last_price.filter(|p| *p > 0.0)?,
    };
    Some((cents / 100.0).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_group_sums() {
        let mut prices = MarketPrices::default();
        for (team, win, qualify) in [
            ("Spain", 0.62, 0.93),
            ("Uruguay", 0.30, 0.75),
            ("Saudi Arabia", 0.07, 0.30),
            ("Cape Verde", 0.05, 0.18),
        ] {
            prices.insert_win('H', team, win);
            prices.insert_qualify('H', team, qualify);
        }
        let table = normalize_group_prices(&prices);
        let h = &table[&'H'];
        let win: f64 = h.values().filter_map(|o| o.p_win_group).sum();
        let qualify: f64 = h.values().filter_map(|o| o.p_qualify).sum();
        assert!((win - 1.0).abs() < 1e-9);
        assert!((qualify - 2.0).abs() < 1e-9);
    }

    #[test]
    fn qualify_is_capped_at_one() {
        let mut prices = MarketPrices::default();
        prices.insert_qualify('A', "Mexico", 0.99);
        prices.insert_qualify('A', "South Africa", 0.01);
        let table = normalize_group_prices(&prices);
        assert_eq!(table[&'A']["Mexico"].p_qualify, Some(1.0));
    }

    #[test]
    fn parses_group_market_titles() {
        let raw = r#"{
            "markets": [
                {"title": "Will Spain win Group H?", "yes_bid": 60, "yes_ask": 64, "last_price": 61},
                {"title": "Will Uruguay advance from Group H?", "yes_bid": 0, "yes_ask": 0, "last_price": 72},
                {"title": "Will it rain in Miami?", "yes_bid": 10, "yes_ask": 12}
            ],
            "cursor": ""
        }"#;
        let prices = parse_markets_json(raw).unwrap();
        let h = &prices.groups[&'H'];
        assert_eq!(h["Spain"].win_group, Some(0.62));
        assert_eq!(h["Uruguay"].qualify, Some(0.72));
        assert_eq!(prices.groups.len(), 1);
    }

    #[test]
    fn no_key_means_no_fetch() {
        let cfg = MarketFetchConfig {
            api_key: None,
            base_url: KALSHI_MARKETS_URL.to_string(),
            series_ticker: DEFAULT_SERIES.to_string(),
        };
        assert!(!cfg.enabled());
        assert!(fetch_market_prices(&cfg).unwrap().is_empty());
    }
}
