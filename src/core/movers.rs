use crate::domain::model::{MarketIndex, PriceChange, PriceHistory, StockSummary};

/// Trading sessions in a week.
pub const WEEK_SESSIONS: usize = 5;
/// Trading sessions the screener treats as a month.
pub const SCREENER_MONTH_SESSIONS: usize = 21;
/// Trading sessions the dashboard headline treats as a month.
pub const DASHBOARD_MONTH_SESSIONS: usize = 20;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Change between the close `sessions_back` sessions before the last one and
/// the last close. Falls back to the first close when the history is shorter.
pub fn price_change(closes: &[f64], sessions_back: usize) -> Option<PriceChange> {
    let to = *closes.last()?;
    let from = if closes.len() > sessions_back {
        closes[closes.len() - 1 - sessions_back]
    } else {
        closes[0]
    };

    if from == 0.0 {
        return None;
    }

    let absolute = to - from;
    Some(PriceChange {
        from,
        to,
        absolute,
        percent: absolute / from * 100.0,
    })
}

impl StockSummary {
    pub fn from_history(history: &PriceHistory, index: MarketIndex) -> Option<Self> {
        let closes = history.closes();
        let weekly = price_change(&closes, WEEK_SESSIONS)?;
        let monthly = price_change(&closes, SCREENER_MONTH_SESSIONS)?;

        Some(Self {
            ticker: history.ticker.clone(),
            index,
            current_price: round2(weekly.to),
            weekly_price_change: round2(weekly.absolute),
            weekly_percentage_change: round2(weekly.percent),
            monthly_price_change: round2(monthly.absolute),
            monthly_percentage_change: round2(monthly.percent),
        })
    }
}
