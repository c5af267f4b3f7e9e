use crate::core::report::{Recommendation, ReportDistributor, StockReport};
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::{validate_url, Validate};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::time::Duration;

/// Discord rejects message content longer than this.
pub const MAX_CONTENT_CHARS: usize = 2000;
const EMBED_COLOR: u32 = 3447003;
const TOP_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct DiscordDistributor {
    client: Client,
    webhook_url: String,
    username: Option<String>,
    avatar_url: Option<String>,
}

impl DiscordDistributor {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let distributor = Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            webhook_url: webhook_url.into(),
            username: None,
            avatar_url: None,
        };
        distributor.validate()?;
        Ok(distributor)
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    pub fn payload(&self, report: &StockReport) -> Value {
        let mut payload = json!({
            "content": truncate(&self.format_report(report), MAX_CONTENT_CHARS),
            "embeds": [{
                "title": format!("{} - {}", report.title, report.timestamp),
                "color": EMBED_COLOR,
                "fields": [],
            }],
        });
        if let Some(username) = &self.username {
            payload["username"] = json!(username);
        }
        if let Some(avatar_url) = &self.avatar_url {
            payload["avatar_url"] = json!(avatar_url);
        }
        payload
    }
}

impl Validate for DiscordDistributor {
    fn validate(&self) -> Result<()> {
        validate_url("webhook_url", &self.webhook_url)?;
        if let Some(avatar_url) = &self.avatar_url {
            validate_url("avatar_url", avatar_url)?;
        }
        Ok(())
    }
}

fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => content[..cut].to_string(),
        None => content.to_string(),
    }
}

fn trend_emoji(change: f64) -> &'static str {
    if change > 0.0 {
        "📈"
    } else {
        "📉"
    }
}

fn recommendation_lines(content: &mut String, recs: &[Recommendation]) {
    for rec in recs.iter().take(TOP_RECOMMENDATIONS) {
        let _ = writeln!(
            content,
            "- **{}**: $ {}  |  Weekly: {}%  |  Monthly: {}% |  Reason: {}",
            rec.ticker, rec.current_price, rec.weekly_change, rec.monthly_change, rec.reason
        );
    }
}

#[async_trait]
impl ReportDistributor for DiscordDistributor {
    fn format_report(&self, report: &StockReport) -> String {
        let s = &report.summary;
        let mut content = String::new();

        let _ = writeln!(content, "# {}", report.title);
        let _ = writeln!(content, "Generated on {}\n", report.timestamp);
        content.push_str("## Market Summary\n");
        let _ = writeln!(
            content,
            "{} Average Weekly Change: {:.2}%",
            trend_emoji(s.avg_weekly_change),
            s.avg_weekly_change
        );
        let _ = writeln!(
            content,
            "{} Average Monthly Change: {:.2}%",
            trend_emoji(s.avg_monthly_change),
            s.avg_monthly_change
        );

        content.push_str("\n## My Stocks\n");
        let mut mine: Vec<_> = report.my_stocks.iter().collect();
        mine.sort_by(|a, b| b.ticker.cmp(&a.ticker));
        for stock in mine {
            let _ = writeln!(
                content,
                "{} - **{}**: $ {}  |  Weekly: {}%  |  Monthly: {}%",
                trend_emoji(stock.weekly_percentage_change),
                stock.ticker,
                stock.current_price,
                stock.weekly_percentage_change,
                stock.monthly_percentage_change
            );
        }

        content.push_str("\n## Top Buy Recommendations\n");
        recommendation_lines(&mut content, &report.buy);
        content.push_str("\n## Top Sell Recommendations\n");
        recommendation_lines(&mut content, &report.sell);
        content.push('\n');

        content
    }

    async fn send_report(&self, report: &StockReport, file: Option<(&str, &[u8])>) -> Result<()> {
        let payload = self.payload(report);

        let request = match file {
            Some((name, data)) => {
                let part = Part::bytes(data.to_vec())
                    .file_name(name.to_string())
                    .mime_str("text/html")?;
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part("file", part);
                self.client.post(&self.webhook_url).multipart(form)
            }
            None => self.client.post(&self.webhook_url).json(&payload),
        };

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            tracing::info!("Report sent via Discord webhook");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!("Failed to send to Discord: {} - {}", status, body);
        Err(TrackerError::DistributionError {
            channel: "discord".to_string(),
            message: format!("webhook returned HTTP {}: {}", status, body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::ReportOptions;
    use crate::domain::model::{MarketIndex, StockSummary};
    use httpmock::prelude::*;

    fn stock(
        ticker: &str,
        index: MarketIndex,
        weekly: f64,
        weekly_pct: f64,
        monthly_pct: f64,
    ) -> StockSummary {
        StockSummary {
            ticker: ticker.to_string(),
            index,
            current_price: 150.0,
            weekly_price_change: weekly,
            weekly_percentage_change: weekly_pct,
            monthly_price_change: monthly_pct,
            monthly_percentage_change: monthly_pct,
        }
    }

    fn report() -> StockReport {
        let stocks = vec![
            stock("AMZN", MarketIndex::Sp500, -20.0, -9.5, 3.0),
            stock("ASML", MarketIndex::Nasdaq100, 30.0, 4.0, -6.0),
            stock("KMX", MarketIndex::MyStocks, 1.0, 1.5, 2.0),
            stock("PLTR", MarketIndex::MyStocks, -2.0, -3.0, 8.0),
        ];
        StockReport::generate(&stocks, &ReportOptions::default(), "2025-03-01 10:00:00".to_string())
    }

    #[test]
    fn test_format_report_sections() {
        let discord = DiscordDistributor::new("https://discord.com/api/webhooks/1/abc").unwrap();
        let content = discord.format_report(&report());

        assert!(content.starts_with("# Stock Market Report\n"));
        assert!(content.contains("## Market Summary"));
        assert!(content.contains("**AMZN**: $ 150  |  Weekly: -9.5%"));
        assert!(content.contains("Reason: Short-term spike (+4%) in longer-term downtrend (-6%)"));
        // watchlist is listed in reverse ticker order
        let pltr = content.find("**PLTR**").unwrap();
        let kmx = content.find("**KMX**").unwrap();
        assert!(pltr < kmx);
        assert!(content.contains("📉 - **PLTR**"));
    }

    #[test]
    fn test_payload_embed_and_identity() {
        let discord = DiscordDistributor::new("https://discord.com/api/webhooks/1/abc")
            .unwrap()
            .with_username("Stock Bot");
        let payload = discord.payload(&report());

        assert_eq!(payload["embeds"][0]["color"], 3447003);
        assert_eq!(payload["embeds"][0]["title"], "Stock Market Report - 2025-03-01 10:00:00");
        assert_eq!(payload["username"], "Stock Bot");
        assert!(payload.get("avatar_url").is_none());
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("📈📈📈", 2), "📈📈");
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn test_rejects_invalid_webhook() {
        assert!(DiscordDistributor::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_send_report_as_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/webhook")
                .header("content-type", "application/json")
                .body_contains("\"color\":3447003");
            then.status(204);
        });

        let discord = DiscordDistributor::new(server.url("/webhook")).unwrap();
        discord.send_report(&report(), None).await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_send_report_with_attachment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/webhook")
                .body_contains("name=\"payload_json\"")
                .body_contains("filename=\"report.html\"");
            then.status(200);
        });

        let discord = DiscordDistributor::new(server.url("/webhook")).unwrap();
        discord
            .send_report(&report(), Some(("report.html", b"<html></html>")))
            .await
            .unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_send_report_failure_is_distribution_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/webhook");
            then.status(400).body("{\"message\": \"Cannot send an empty message\"}");
        });

        let discord = DiscordDistributor::new(server.url("/webhook")).unwrap();
        let err = discord.send_report(&report(), None).await.unwrap_err();
        assert!(matches!(err, TrackerError::DistributionError { .. }));
    }
}
