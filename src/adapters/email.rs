use crate::config::email::EmailConfig;
use crate::core::report::{
    escape_html, format_number, Recommendation, ReportDistributor, StockReport,
};
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write as _;

const CHANNEL: &str = "email";
const TOP_RECOMMENDATIONS: usize = 3;
const TABLE_HEADER: &str =
    "<tr><th>Ticker</th><th>Price</th><th>Weekly Change</th><th>Monthly Change</th></tr>\n";

/// Hands a finished message to a mail server.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<()>;
}

#[async_trait]
impl MailTransport for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(&self, message: Message) -> Result<()> {
        self.send(message).await.map(|_| ()).map_err(distribution_error)
    }
}

fn distribution_error(e: impl std::fmt::Display) -> TrackerError {
    TrackerError::DistributionError {
        channel: CHANNEL.to_string(),
        message: e.to_string(),
    }
}

fn mailbox(field: &str, address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse()
        .map_err(|e| TrackerError::InvalidConfigValueError {
            field: field.to_string(),
            value: address.to_string(),
            reason: format!("Invalid email address: {}", e),
        })
}

/// Sends an HTML summary of the report, with the full report attached.
pub struct EmailDistributor<T = AsyncSmtpTransport<Tokio1Executor>> {
    config: EmailConfig,
    transport: T,
}

impl EmailDistributor {
    /// SMTP over STARTTLS with the configured credentials.
    pub fn new(config: EmailConfig) -> Result<Self> {
        config.validate()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(distribution_error)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_password.clone(),
            ))
            .build();
        Ok(Self { config, transport })
    }
}

impl<T: MailTransport> EmailDistributor<T> {
    pub fn with_transport(config: EmailConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_message(
        &self,
        report: &StockReport,
        file: Option<(&str, &[u8])>,
    ) -> Result<Message> {
        let mut builder = Message::builder()
            .from(mailbox("sender_email", &self.config.sender_email)?)
            .subject(format!("{} - {}", report.title, report.timestamp));
        for recipient in &self.config.recipients {
            builder = builder.to(mailbox("recipients", recipient)?);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(self.format_report(report)));
        if let Some((name, data)) = file {
            body = body.singlepart(
                Attachment::new(name.to_string()).body(data.to_vec(), ContentType::TEXT_HTML),
            );
        }

        builder.multipart(body).map_err(distribution_error)
    }
}

fn recommendation_rows(
    html: &mut String,
    recs: &[Recommendation],
    weekly_class: &str,
    monthly_class: &str,
) {
    for rec in recs.iter().take(TOP_RECOMMENDATIONS) {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>$ {}</td><td class='{w}'>{}%</td><td class='{m}'>{}%</td></tr>",
            escape_html(&rec.ticker),
            format_number(rec.current_price),
            format_number(rec.weekly_change),
            format_number(rec.monthly_change),
            w = weekly_class,
            m = monthly_class,
        );
    }
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "positive"
    } else {
        "negative"
    }
}

#[async_trait]
impl<T: MailTransport> ReportDistributor for EmailDistributor<T> {
    fn format_report(&self, report: &StockReport) -> String {
        let s = &report.summary;
        let mut html = format!(
            r#"<html>
<head>
<style>
body {{ font-family: Arial, sans-serif; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
th {{ background-color: #f2f2f2; }}
.positive {{ color: green; }}
.negative {{ color: red; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>Generated on {timestamp}</p>
<h2>Market Summary</h2>
<p>Average Weekly Change: <span class="{awc}">{aw}%</span></p>
<p>Average Monthly Change: <span class="{amc}">{am}%</span></p>
<h2>Top Buy Recommendations</h2>
<table>
{header}"#,
            header = TABLE_HEADER,
            title = escape_html(&report.title),
            timestamp = escape_html(&report.timestamp),
            awc = sign_class(s.avg_weekly_change),
            aw = format_number((s.avg_weekly_change * 100.0).round() / 100.0),
            amc = sign_class(s.avg_monthly_change),
            am = format_number((s.avg_monthly_change * 100.0).round() / 100.0),
        );
        recommendation_rows(&mut html, &report.buy, "negative", "positive");
        html.push_str("</table>\n<h2>Top Sell Recommendations</h2>\n<table>\n");
        html.push_str(TABLE_HEADER);
        recommendation_rows(&mut html, &report.sell, "positive", "negative");
        html.push_str("</table>\n");
        html.push_str("<p>Please see the attached file for the full report with charts.</p>\n");
        html.push_str("</body>\n</html>\n");
        html
    }

    async fn send_report(&self, report: &StockReport, file: Option<(&str, &[u8])>) -> Result<()> {
        let message = self.build_message(report, file)?;
        self.transport.deliver(message).await?;

        tracing::info!(
            "Report sent via email to {} recipients",
            self.config.recipients.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::ReportOptions;
    use crate::domain::model::{MarketIndex, StockSummary};
    use std::sync::Mutex;

    /// Keeps the raw RFC 5322 text of every delivered message.
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn deliver(&self, message: Message) -> Result<()> {
            if self.fail {
                return Err(distribution_error("connection refused"));
            }
            let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
            self.sent.lock().unwrap().push(raw);
            Ok(())
        }
    }

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_server: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_user: "bot".to_string(),
            smtp_password: "secret".to_string(),
            sender_email: "reports@example.com".to_string(),
            recipients: vec!["a@example.com".to_string(), "b@example.com".to_string()],
        }
    }

    fn recording_distributor() -> EmailDistributor<RecordingTransport> {
        EmailDistributor::with_transport(config(), RecordingTransport::default()).unwrap()
    }

    fn stock(ticker: &str, weekly: f64, weekly_pct: f64, monthly_pct: f64) -> StockSummary {
        StockSummary {
            ticker: ticker.to_string(),
            index: MarketIndex::Sp500,
            current_price: 150.0,
            weekly_price_change: weekly,
            weekly_percentage_change: weekly_pct,
            monthly_price_change: monthly_pct,
            monthly_percentage_change: monthly_pct,
        }
    }

    fn report() -> StockReport {
        let stocks = vec![
            stock("AMZN", -15.0, -7.0, 4.0),
            stock("NFLX", 25.0, 12.0, -3.0),
            stock("META", 1.0, 0.5, 0.5),
        ];
        StockReport::generate(&stocks, &ReportOptions::default(), "20250308_0900".to_string())
    }

    #[tokio::test]
    async fn test_send_report_with_attachment() {
        let distributor = recording_distributor();
        distributor
            .send_report(&report(), Some(("stock_report_20250308_0900.html", b"<html>full</html>")))
            .await
            .unwrap();

        let sent = distributor.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let raw = &sent[0];
        assert!(raw.contains("Subject: Stock Market Report - 20250308_0900"));
        assert!(raw.contains("From: reports@example.com"));
        assert!(raw.contains("a@example.com"));
        assert!(raw.contains("b@example.com"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("filename=\"stock_report_20250308_0900.html\""));
    }

    #[tokio::test]
    async fn test_send_report_without_attachment() {
        let distributor = recording_distributor();
        distributor.send_report(&report(), None).await.unwrap();

        let sent = distributor.transport().sent.lock().unwrap();
        assert!(!sent[0].contains("Content-Disposition: attachment"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_distribution_error() {
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let distributor = EmailDistributor::with_transport(config(), transport).unwrap();

        let err = distributor.send_report(&report(), None).await.unwrap_err();
        assert!(matches!(
            err,
            TrackerError::DistributionError { ref channel, .. } if channel == "email"
        ));
    }

    #[test]
    fn test_format_report_lists_top_recommendations() {
        let distributor = recording_distributor();
        let html = distributor.format_report(&report());

        assert!(html.contains("<h1>Stock Market Report</h1>"));
        assert!(html.contains("<td>AMZN</td><td>$ 150.0</td><td class='negative'>-7.0%</td>"));
        assert!(html.contains("<td>NFLX</td>"));
        assert!(html.contains("Please see the attached file"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut bad = config();
        bad.sender_email = "nobody".to_string();
        assert!(EmailDistributor::with_transport(bad, RecordingTransport::default()).is_err());
    }
}
