//! Market report built from a screener snapshot: movers, index comparison,
//! recommendations and summary statistics, renderable as a standalone HTML page.

use crate::core::charts::{self, MoverMetric};
use crate::core::indicators::{custom_macd, standard_macd, MacdPeriods};
use crate::core::screener::{self, latest_snapshot};
use crate::domain::model::{HistoryRange, MarketIndex, Period, StockSummary};
use crate::domain::ports::{MarketDataSource, Storage};
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write as _;

pub const BUY_STRATEGY: &str =
    "Stocks with negative weekly change (< -$10) but positive monthly change";
pub const SELL_STRATEGY: &str =
    "Stocks with positive weekly change (> $10) but negative monthly change";

const RECOMMENDATION_PRICE_MOVE: f64 = 10.0;
const TOP_MOVERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub ticker: String,
    pub index: MarketIndex,
    pub current_price: f64,
    pub weekly_change: f64,
    pub weekly_price_change: f64,
    pub monthly_change: f64,
    pub monthly_price_change: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPerformance {
    pub index: MarketIndex,
    pub avg_weekly_change: f64,
    pub avg_monthly_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_stocks: usize,
    pub sp500_count: usize,
    pub nasdaq_count: usize,
    pub weekly_gainers: usize,
    pub weekly_losers: usize,
    pub monthly_gainers: usize,
    pub monthly_losers: usize,
    pub avg_weekly_change: f64,
    pub avg_monthly_change: f64,
    pub top_weekly_gainer: Option<String>,
    pub top_weekly_loser: Option<String>,
}

/// MACD and moving-average charts for one held stock.
#[derive(Debug, Clone, Serialize)]
pub struct StockStatCharts {
    pub ticker: String,
    pub standard_macd: Value,
    pub moving_averages: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportCharts {
    pub top_weekly_gainers: Value,
    pub top_weekly_losers: Value,
    pub top_monthly_gainers: Value,
    pub top_monthly_losers: Value,
    pub index_comparison: Value,
    pub statistics: Vec<StockStatCharts>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockReport {
    pub title: String,
    pub timestamp: String,
    pub buy_strategy: &'static str,
    pub sell_strategy: &'static str,
    pub buy: Vec<Recommendation>,
    pub sell: Vec<Recommendation>,
    pub my_stocks: Vec<StockSummary>,
    pub index_comparison: Vec<IndexPerformance>,
    pub summary: SummaryStats,
    pub charts: ReportCharts,
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    pub recommendations: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Stock Market Report".to_string(),
            recommendations: 15,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Top `n` stocks by `metric`; gainers descending, losers ascending.
pub fn top_movers(
    stocks: &[StockSummary],
    metric: MoverMetric,
    gainers: bool,
    n: usize,
) -> Vec<StockSummary> {
    let mut ranked: Vec<StockSummary> = stocks
        .iter()
        .filter(|s| metric.value(s).is_finite())
        .cloned()
        .collect();
    ranked.sort_by(|a, b| {
        let ord = metric.value(a).total_cmp(&metric.value(b));
        if gainers {
            ord.reverse()
        } else {
            ord
        }
    });
    ranked.truncate(n);
    ranked
}

/// Mean weekly and monthly change per index, ordered by index label.
pub fn index_performance(stocks: &[StockSummary]) -> Vec<IndexPerformance> {
    let mut indices: Vec<MarketIndex> = Vec::new();
    for s in stocks {
        if !indices.contains(&s.index) {
            indices.push(s.index);
        }
    }
    indices.sort_by_key(|i| i.label());

    indices
        .into_iter()
        .map(|index| {
            let members = || stocks.iter().filter(move |s| s.index == index);
            IndexPerformance {
                index,
                avg_weekly_change: mean(members().map(|s| s.weekly_percentage_change)),
                avg_monthly_change: mean(members().map(|s| s.monthly_percentage_change)),
            }
        })
        .collect()
}

/// Shortest decimal form, always with a fractional part: `12.0`, `7.35`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn recommendation(stock: &StockSummary, reason: String) -> Recommendation {
    Recommendation {
        ticker: stock.ticker.clone(),
        index: stock.index,
        current_price: stock.current_price,
        weekly_change: stock.weekly_percentage_change,
        weekly_price_change: stock.weekly_price_change,
        monthly_change: stock.monthly_percentage_change,
        monthly_price_change: stock.monthly_price_change,
        reason,
    }
}

/// Short-term dips in a longer-term uptrend, biggest dollar drop first.
pub fn buy_recommendations(stocks: &[StockSummary], n: usize) -> Vec<Recommendation> {
    let mut picks: Vec<&StockSummary> = stocks
        .iter()
        .filter(|s| {
            s.weekly_price_change < -RECOMMENDATION_PRICE_MOVE && s.monthly_percentage_change > 0.0
        })
        .collect();
    picks.sort_by(|a, b| a.weekly_price_change.total_cmp(&b.weekly_price_change));

    picks
        .into_iter()
        .take(n)
        .map(|s| {
            let reason = format!(
                "Short-term dip (-{}%) in longer-term uptrend (+{}%)",
                format_number(s.weekly_percentage_change.abs()),
                format_number(s.monthly_percentage_change)
            );
            recommendation(s, reason)
        })
        .collect()
}

/// Short-term spikes in a longer-term downtrend, biggest percentage rise first.
pub fn sell_recommendations(stocks: &[StockSummary], n: usize) -> Vec<Recommendation> {
    let mut picks: Vec<&StockSummary> = stocks
        .iter()
        .filter(|s| {
            s.weekly_price_change > RECOMMENDATION_PRICE_MOVE && s.monthly_percentage_change < 0.0
        })
        .collect();
    picks.sort_by(|a, b| b.weekly_percentage_change.total_cmp(&a.weekly_percentage_change));

    picks
        .into_iter()
        .take(n)
        .map(|s| {
            let reason = format!(
                "Short-term spike (+{}%) in longer-term downtrend (-{}%)",
                format_number(s.weekly_percentage_change),
                format_number(s.monthly_percentage_change.abs())
            );
            recommendation(s, reason)
        })
        .collect()
}

fn count_where(stocks: &[StockSummary], pred: impl Fn(&StockSummary) -> bool) -> usize {
    stocks.iter().filter(|s| pred(s)).count()
}

pub fn summary_stats(stocks: &[StockSummary]) -> SummaryStats {

    let top_weekly_gainer = stocks
        .iter()
        .max_by(|a, b| a.weekly_percentage_change.total_cmp(&b.weekly_percentage_change))
        .map(|s| s.ticker.clone());
    let top_weekly_loser = stocks
        .iter()
        .min_by(|a, b| a.weekly_percentage_change.total_cmp(&b.weekly_percentage_change))
        .map(|s| s.ticker.clone());

    SummaryStats {
        total_stocks: stocks.len(),
        sp500_count: count_where(stocks, |s| s.index == MarketIndex::Sp500),
        nasdaq_count: count_where(stocks, |s| s.index == MarketIndex::Nasdaq100),
        weekly_gainers: count_where(stocks, |s| s.weekly_percentage_change > 0.0),
        weekly_losers: count_where(stocks, |s| s.weekly_percentage_change < 0.0),
        monthly_gainers: count_where(stocks, |s| s.monthly_percentage_change > 0.0),
        monthly_losers: count_where(stocks, |s| s.monthly_percentage_change < 0.0),
        avg_weekly_change: mean(stocks.iter().map(|s| s.weekly_percentage_change)),
        avg_monthly_change: mean(stocks.iter().map(|s| s.monthly_percentage_change)),
        top_weekly_gainer,
        top_weekly_loser,
    }
}

impl StockReport {
    pub fn generate(stocks: &[StockSummary], options: &ReportOptions, timestamp: String) -> Self {
        let movers = |metric, gainers| {
            let top = top_movers(stocks, metric, gainers, TOP_MOVERS);
            charts::top_movers_chart(&top, metric, gainers)
        };
        let index_comparison = index_performance(stocks);

        StockReport {
            title: options.title.clone(),
            timestamp,
            buy_strategy: BUY_STRATEGY,
            sell_strategy: SELL_STRATEGY,
            buy: buy_recommendations(stocks, options.recommendations),
            sell: sell_recommendations(stocks, options.recommendations),
            my_stocks: stocks
                .iter()
                .filter(|s| s.index == MarketIndex::MyStocks)
                .cloned()
                .collect(),
            charts: ReportCharts {
                top_weekly_gainers: movers(MoverMetric::Weekly, true),
                top_weekly_losers: movers(MoverMetric::Weekly, false),
                top_monthly_gainers: movers(MoverMetric::Monthly, true),
                top_monthly_losers: movers(MoverMetric::Monthly, false),
                index_comparison: charts::index_comparison_chart(&index_comparison),
                statistics: Vec::new(),
            },
            index_comparison,
            summary: summary_stats(stocks),
        }
    }

    /// Adds MACD and moving-average charts over one year of history for each
    /// held stock. Tickers whose history cannot be fetched are skipped.
    pub async fn with_stock_charts(mut self, market: &dyn MarketDataSource) -> Self {
        let periods = MacdPeriods::default();
        let mut statistics = Vec::with_capacity(self.my_stocks.len());

        for stock in &self.my_stocks {
            let history = match market
                .history(&stock.ticker, HistoryRange::Period(Period::OneYear))
                .await
            {
                Ok(history) if !history.is_empty() => history,
                Ok(_) => {
                    tracing::warn!("No history for {}, skipping its charts", stock.ticker);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping charts for {}: {}", stock.ticker, e);
                    continue;
                }
            };

            let closes = history.closes();
            statistics.push(StockStatCharts {
                ticker: stock.ticker.clone(),
                standard_macd: charts::price_macd_chart(&history, &standard_macd(&closes)),
                moving_averages: charts::moving_averages_chart(
                    &history,
                    &custom_macd(&closes, periods),
                ),
            });
        }

        tracing::info!(
            "Built charts for {} of {} held stocks",
            statistics.len(),
            self.my_stocks.len()
        );
        self.charts.statistics = statistics;
        self
    }
}

/// Loads the newest `stocks_<ts>.csv` from storage, keeping the first row per ticker.
pub async fn load_latest_snapshot<S: Storage>(storage: &S) -> Result<(String, Vec<StockSummary>)> {
    let files = storage.list_files().await?;
    let (timestamp, _) = latest_snapshot(&files).ok_or_else(|| TrackerError::ProcessingError {
        message: "no stocks snapshot found; run the screener first".to_string(),
    })?;

    let data = storage.read_file(&screener::stocks_file_name(&timestamp)).await?;
    let stocks = screener::dedupe_by_ticker(screener::decode_csv(&data)?);
    tracing::info!("Loaded {} stocks from snapshot {}", stocks.len(), timestamp);
    Ok((timestamp, stocks))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "positive"
    } else {
        "negative"
    }
}

/// Chart specs are embedded inside a `<script>` block.
fn script_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn recommendation_rows(
    out: &mut String,
    recs: &[Recommendation],
    weekly_class: &str,
    monthly_class: &str,
) {
    for rec in recs {
        let _ = write!(
            out,
            concat!(
                "<tr><td>{}</td><td>$ {}</td>",
                "<td class='{w}'>{}%</td><td class='{w}'>$ {}</td>",
                "<td class='{m}'>{}%</td><td class='{m}'>$ {}</td><td>{}</td></tr>"
            ),
            escape_html(&rec.ticker),
            rec.current_price,
            rec.weekly_change,
            rec.weekly_price_change,
            rec.monthly_change,
            rec.monthly_price_change,
            escape_html(&rec.reason),
            w = weekly_class,
            m = monthly_class,
        );
    }
}

const RECOMMENDATION_HEADER: &str = concat!(
    "<tr><th>Ticker</th><th>Price</th>",
    "<th>Weekly Change</th><th>Weekly Price Change</th>",
    "<th>Monthly Change</th><th>Monthly Price Change</th><th>Reason</th></tr>"
);

/// Full standalone HTML report with embedded Vega-Lite charts.
pub fn render_html(report: &StockReport) -> String {
    let s = &report.summary;
    let title = escape_html(&report.title);
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
<style>
body {{ font-family: Arial, sans-serif; margin: 20px; }}
.section {{ margin-bottom: 30px; }}
.chart {{ width: 100%; padding: 25px; }}
.recommendations {{ display: flex; }}
.recommendation-column {{ flex: 1; margin-right: 20px; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
tr:nth-child(even) {{ background-color: #f9f9f9; }}
.positive {{ color: green; }}
.negative {{ color: red; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Generated on {timestamp}</p>
<div class="section">
<h2>Market Summary</h2>
<table>
<tr><th>Category</th><th>Value</th></tr>
<tr><td>Total Stocks</td><td>{total}</td></tr>
<tr><td>S&amp;P 500</td><td>{sp500}</td></tr>
<tr><td>NASDAQ 100</td><td>{nasdaq}</td></tr>
<tr><td>Weekly Gainers</td><td class="positive">{wg}</td></tr>
<tr><td>Weekly Losers</td><td class="negative">{wl}</td></tr>
<tr><td>Average Weekly Change</td><td class="{awc}">{aw:.2}%</td></tr>
<tr><td>Average Monthly Change</td><td class="{amc}">{am:.2}%</td></tr>
</table>
</div>
<div class="section">
<h2>My Stocks</h2>
<ul>
"#,
        title = title,
        timestamp = escape_html(&report.timestamp),
        total = s.total_stocks,
        sp500 = s.sp500_count,
        nasdaq = s.nasdaq_count,
        wg = s.weekly_gainers,
        wl = s.weekly_losers,
        awc = sign_class(s.avg_weekly_change),
        aw = s.avg_weekly_change,
        amc = sign_class(s.avg_monthly_change),
        am = s.avg_monthly_change,
    );

    for stock in &report.my_stocks {
        let _ = writeln!(
            html,
            concat!(
                "<li><strong>{}</strong> : ${} | ",
                "Weekly Change: <span class='{}'>{}%</span> | ",
                "Monthly Change: <span class='{}'>{}%</span></li>"
            ),
            escape_html(&stock.ticker),
            stock.current_price,
            sign_class(stock.weekly_percentage_change),
            stock.weekly_percentage_change,
            sign_class(stock.monthly_percentage_change),
            stock.monthly_percentage_change,
        );
    }
    html.push_str("</ul>\n</div>\n");

    for (id, heading) in [
        ("index-comparison", "Index Comparison"),
        ("weekly-gainers", "Top Weekly Gainers"),
        ("weekly-losers", "Top Weekly Losers"),
        ("monthly-gainers", "Top Monthly Gainers"),
        ("monthly-losers", "Top Monthly Losers"),
    ] {
        let _ = writeln!(
            html,
            "<div class=\"section\">\n<h2>{}</h2>\n<div id=\"{}\" class=\"chart\"></div>\n</div>",
            heading, id
        );
    }

    if !report.charts.statistics.is_empty() {
        html.push_str("<div class=\"section\">\n<h2>My Stocks Statistics</h2>\n");
        for (i, stat) in report.charts.statistics.iter().enumerate() {
            let _ = writeln!(
                html,
                concat!(
                    "<h3>{}</h3>\n",
                    "<div id=\"stock-{i}-macd\" class=\"chart\"></div>\n",
                    "<div id=\"stock-{i}-ma\" class=\"chart\"></div>"
                ),
                escape_html(&stat.ticker),
                i = i
            );
        }
        html.push_str("</div>\n");
    }

    let _ = write!(
        html,
        concat!(
            "<div class=\"section\">\n<h2>Recommendations</h2>\n",
            "<div class=\"recommendations\">\n<div class=\"recommendation-column\">\n",
            "<h3>Buy Recommendations</h3>\n<p>{}</p>\n<table>\n{}\n"
        ),
        escape_html(report.buy_strategy),
        RECOMMENDATION_HEADER
    );
    recommendation_rows(&mut html, &report.buy, "negative", "positive");
    let _ = write!(
        html,
        concat!(
            "</table>\n</div>\n<div class=\"recommendation-column\">\n",
            "<h3>Sell Recommendations</h3>\n<p>{}</p>\n<table>\n{}\n"
        ),
        escape_html(report.sell_strategy),
        RECOMMENDATION_HEADER
    );
    recommendation_rows(&mut html, &report.sell, "positive", "negative");
    html.push_str("</table>\n</div>\n</div>\n</div>\n");

    let c = &report.charts;
    html.push_str("<script>\n");
    for (id, spec) in [
        ("index-comparison", &c.index_comparison),
        ("weekly-gainers", &c.top_weekly_gainers),
        ("weekly-losers", &c.top_weekly_losers),
        ("monthly-gainers", &c.top_monthly_gainers),
        ("monthly-losers", &c.top_monthly_losers),
    ] {
        let _ = writeln!(html, "vegaEmbed('#{}', {});", id, script_json(spec));
    }
    for (i, stat) in c.statistics.iter().enumerate() {
        let macd = script_json(&stat.standard_macd);
        let _ = writeln!(html, "vegaEmbed('#stock-{}-macd', {});", i, macd);
        let ma = script_json(&stat.moving_averages);
        let _ = writeln!(html, "vegaEmbed('#stock-{}-ma', {});", i, ma);
    }
    html.push_str("</script>\n</body>\n</html>\n");

    html
}

/// A channel a finished report can be pushed to.
#[async_trait]
pub trait ReportDistributor: Send + Sync {
    fn format_report(&self, report: &StockReport) -> String;

    /// Sends the report, attaching `file` (name, bytes) when given.
    async fn send_report(&self, report: &StockReport, file: Option<(&str, &[u8])>) -> Result<()>;
}
