//! Vega-Lite v5 chart specs, rendered client-side with vega-embed.

use crate::core::indicators::{CustomMacd, MacdSeries};
use crate::core::report::IndexPerformance;
use crate::domain::model::{PriceHistory, StockSummary};
use serde_json::{json, Value};

const SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Which screener metric a movers chart ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoverMetric {
    Weekly,
    Monthly,
}

impl MoverMetric {
    pub fn field(&self) -> &'static str {
        match self {
            MoverMetric::Weekly => "Weekly_Percentage_Change",
            MoverMetric::Monthly => "Monthly_Percentage_Change",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MoverMetric::Weekly => "Weekly Percentage Change",
            MoverMetric::Monthly => "Monthly Percentage Change",
        }
    }

    pub fn value(&self, stock: &StockSummary) -> f64 {
        match self {
            MoverMetric::Weekly => stock.weekly_percentage_change,
            MoverMetric::Monthly => stock.monthly_percentage_change,
        }
    }
}

fn hover_param() -> Value {
    json!({
        "name": "hover",
        "select": {"type": "point", "fields": ["Date"], "nearest": true, "on": "pointerover", "clear": "pointerout"}
    })
}

fn hover_rule() -> Value {
    json!({
        "mark": {"type": "rule", "color": "gray"},
        "encoding": {"opacity": {"condition": {"param": "hover", "empty": false, "value": 1}, "value": 0}}
    })
}

fn line(field: &str, color: &str, dash: Option<[u8; 2]>) -> Value {
    let mut mark = json!({"type": "line", "color": color});
    if let Some(dash) = dash {
        mark["strokeDash"] = json!(dash);
    }
    json!({
        "mark": mark,
        "encoding": {"y": {"field": field, "type": "quantitative"}}
    })
}

fn tooltip(fields: &[(&str, &str)]) -> Value {
    let mut items = vec![json!({"field": "Date", "type": "temporal", "title": "Date"})];
    items.extend(fields.iter().map(|(field, title)| {
        json!({"field": field, "type": "quantitative", "title": title, "format": ".2f"})
    }));
    Value::Array(items)
}

/// Price line on top, MACD/signal lines with a signed histogram below.
pub fn price_macd_chart(history: &PriceHistory, macd: &MacdSeries) -> Value {
    let rows: Vec<Value> = history
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            json!({
                "Date": bar.date,
                "Close": bar.close,
                "Volume": bar.volume,
                "macd": macd.macd.get(i),
                "signal": macd.signal.get(i),
                "histogram": macd.histogram.get(i),
            })
        })
        .collect();

    let price = json!({
        "title": format!("{} - Stock Price", history.ticker),
        "width": "container",
        "height": 300,
        "encoding": {"x": {"field": "Date", "type": "temporal", "title": "Date"}},
        "layer": [
            {
                "mark": {"type": "line", "color": "black"},
                "encoding": {
                    "y": {"field": "Close", "type": "quantitative", "title": "Price", "scale": {"zero": false}}
                }
            },
            {
                "mark": {"type": "point", "opacity": 0},
                "params": [hover_param()],
                "encoding": {
                    "tooltip": [
                        {"field": "Date", "type": "temporal", "title": "Date"},
                        {"field": "Close", "type": "quantitative", "title": "Price", "format": ".2f"},
                        {"field": "Volume", "type": "quantitative", "title": "Volume", "format": ","}
                    ]
                }
            },
            hover_rule()
        ]
    });

    let macd_panel = json!({
        "title": "MACD",
        "width": "container",
        "height": 200,
        "encoding": {"x": {"field": "Date", "type": "temporal", "title": "Date"}},
        "layer": [
            {
                "mark": "bar",
                "encoding": {
                    "y": {"field": "histogram", "type": "quantitative", "title": "MACD"},
                    "color": {"condition": {"test": "datum.histogram > 0", "value": "green"}, "value": "red"}
                }
            },
            line("macd", "blue", None),
            line("signal", "red", None),
            {
                "mark": {"type": "point", "opacity": 0},
                "params": [json!({
                    "name": "hover_macd",
                    "select": {"type": "point", "fields": ["Date"], "nearest": true, "on": "pointerover", "clear": "pointerout"}
                })],
                "encoding": {
                    "tooltip": tooltip(&[("macd", "MACD"), ("signal", "Signal"), ("histogram", "Histogram")])
                }
            }
        ]
    });

    json!({
        "$schema": SCHEMA,
        "data": {"values": rows},
        "vconcat": [price, macd_panel],
        "resolve": {"scale": {"y": "independent"}}
    })
}

/// Price with the three simple moving averages of the custom MACD.
pub fn moving_averages_chart(history: &PriceHistory, custom: &CustomMacd) -> Value {
    let p = custom.periods;
    let fast = format!("MA_{}", p.fast_ma);
    let slow = format!("MA_{}", p.slow_ma);
    let longest = format!("MA_{}", p.longest_ma);

    let rows: Vec<Value> = history
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut row = json!({"Date": bar.date, "Close": bar.close});
            row[&fast] = json!(custom.fast_ma.get(i).copied().flatten());
            row[&slow] = json!(custom.slow_ma.get(i).copied().flatten());
            row[&longest] = json!(custom.longest_ma.get(i).copied().flatten());
            row
        })
        .collect();

    let fast_title = format!("{}-day MA", p.fast_ma);
    let slow_title = format!("{}-day MA", p.slow_ma);
    let longest_title = format!("{}-day MA", p.longest_ma);

    json!({
        "$schema": SCHEMA,
        "title": format!(
            "{} - Price with {}, {}, and {}-day Moving Averages",
            history.ticker, p.fast_ma, p.slow_ma, p.longest_ma
        ),
        "width": "container",
        "height": 400,
        "data": {"values": rows},
        "encoding": {"x": {"field": "Date", "type": "temporal", "title": "Date"}},
        "layer": [
            {
                "mark": {"type": "line", "color": "black"},
                "encoding": {
                    "y": {"field": "Close", "type": "quantitative", "title": "Price", "scale": {"zero": false}}
                }
            },
            line(&fast, "blue", Some([1, 0])),
            line(&slow, "green", Some([5, 5])),
            line(&longest, "red", Some([2, 2])),
            {
                "mark": {"type": "point", "opacity": 0},
                "params": [hover_param()],
                "encoding": {
                    "tooltip": tooltip(&[
                        ("Close", "Price"),
                        (fast.as_str(), fast_title.as_str()),
                        (slow.as_str(), slow_title.as_str()),
                        (longest.as_str(), longest_title.as_str()),
                    ])
                }
            },
            hover_rule()
        ]
    })
}

/// Daily volume, green when the day closed above its open.
pub fn volume_chart(history: &PriceHistory) -> Value {
    json!({
        "$schema": SCHEMA,
        "title": format!("{} - Trading Volume", history.ticker),
        "width": "container",
        "height": 300,
        "data": {"values": history.bars},
        "mark": "bar",
        "encoding": {
            "x": {"field": "date", "type": "temporal", "title": "Date"},
            "y": {"field": "volume", "type": "quantitative", "title": "Volume"},
            "color": {"condition": {"test": "datum.close > datum.open", "value": "green"}, "value": "red"},
            "tooltip": [
                {"field": "date", "type": "temporal"},
                {"field": "volume", "type": "quantitative", "format": ","},
                {"field": "open", "type": "quantitative", "format": ".2f"},
                {"field": "close", "type": "quantitative", "format": ".2f"},
                {"field": "high", "type": "quantitative", "format": ".2f"},
                {"field": "low", "type": "quantitative", "format": ".2f"}
            ]
        }
    })
}

/// Horizontal bars for an already ranked list of movers.
pub fn top_movers_chart(movers: &[StockSummary], metric: MoverMetric, gainers: bool) -> Value {
    let title = format!(
        "Top {} {} by {}",
        movers.len(),
        if gainers { "Gainers" } else { "Losers" },
        metric.title()
    );

    json!({
        "$schema": SCHEMA,
        "title": title,
        "width": "container",
        "height": 300,
        "data": {"values": movers},
        "mark": "bar",
        "encoding": {
            "x": {"field": metric.field(), "type": "quantitative", "title": metric.title()},
            "y": {"field": "Ticker", "type": "nominal", "sort": "-x", "title": "Stock Ticker"},
            "color": {"field": metric.field(), "type": "quantitative", "scale": {"scheme": "blueorange"}},
            "tooltip": [
                {"field": "Ticker", "type": "nominal", "title": "Ticker"},
                {"field": "Index", "type": "nominal", "title": "Index"},
                {"field": "Current_Price", "type": "quantitative", "title": "Current Price", "format": "$.2f"},
                {"field": metric.field(), "type": "quantitative", "title": metric.title(), "format": ".2f"},
                {"field": "Weekly_Price_Change", "type": "quantitative", "title": "Weekly Price Change", "format": "$.2f"}
            ]
        }
    })
}

/// Average weekly and monthly change per index, one column per time period.
pub fn index_comparison_chart(performance: &[IndexPerformance]) -> Value {
    let rows: Vec<Value> = performance
        .iter()
        .flat_map(|p| {
            [
                json!({"Index": p.index, "Time Period": "Weekly", "Average Percentage Change": p.avg_weekly_change}),
                json!({"Index": p.index, "Time Period": "Monthly", "Average Percentage Change": p.avg_monthly_change}),
            ]
        })
        .collect();

    json!({
        "$schema": SCHEMA,
        "title": "Index Performance Comparison",
        "data": {"values": rows},
        "mark": "bar",
        "width": 250,
        "height": 300,
        "encoding": {
            "column": {"field": "Time Period", "type": "nominal"},
            "x": {"field": "Index", "type": "nominal", "title": "Market Index"},
            "y": {"field": "Average Percentage Change", "type": "quantitative", "title": "Avg. Percentage Change"},
            "color": {"field": "Index", "type": "nominal"},
            "tooltip": [
                {"field": "Index", "type": "nominal", "title": "Index"},
                {"field": "Average Percentage Change", "type": "quantitative", "title": "Avg. % Change", "format": ".2f"}
            ]
        }
    })
}
