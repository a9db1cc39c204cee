//! Periodic collateralization report for lending tokens.

use std::time::Duration;

use alloy_primitives::U512;
use vitalwatch_core::{error::AmountError, Amount};

use crate::error::MonitorError;
use crate::notifier::Notifier;
use crate::token::LendingToken;

/// One token's figures for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vitals {
    pub symbol: String,
    pub lending: Amount,
    pub borrowing: Amount,
    pub ratio: String,
}

impl Vitals {
    pub fn report_line(&self) -> String {
        report_line(&self.symbol, &self.ratio)
    }
}

/// `<b>SYMBOL</b> <i>RATIO</i>`
pub fn report_line(symbol: &str, ratio: &str) -> String {
    format!("<b>{symbol}</b> <i>{ratio}</i>")
}

/// `100 * borrowing / lending` as a percentage with two decimals, rounded
/// half-up. Zero lending reports `"0.00%"`.
pub fn collateralization_ratio(
    lending: &Amount,
    borrowing: &Amount,
) -> Result<String, MonitorError> {
    let decimals = lending.decimals().max(borrowing.decimals());
    let l = scaled(lending, decimals)?;
    let b = scaled(borrowing, decimals)?;
    if l.is_zero() {
        return Ok("0.00%".to_string());
    }

    // Hundredths of a percent: round(10000 * b / l).
    let numerator = b
        .checked_mul(U512::from(20_000u64))
        .and_then(|n| n.checked_add(l))
        .ok_or_else(|| invalid(borrowing))?;
    let denominator = l
        .checked_mul(U512::from(2u64))
        .ok_or_else(|| invalid(lending))?;
    let hundredths = numerator / denominator;

    let whole = hundredths / U512::from(100u64);
    let frac = (hundredths % U512::from(100u64)).as_limbs()[0];
    Ok(format!("{whole}.{frac:02}%"))
}

fn scaled(amount: &Amount, decimals: u32) -> Result<U512, AmountError> {
    let mut value = U512::from_str_radix(amount.units(), 10).map_err(|_| invalid(amount))?;
    for _ in amount.decimals()..decimals {
        value = value
            .checked_mul(U512::from(10u64))
            .ok_or_else(|| invalid(amount))?;
    }
    Ok(value)
}

fn invalid(amount: &Amount) -> AmountError {
    AmountError::InvalidAmount {
        amount: amount.units().to_string(),
        decimals: amount.decimals(),
    }
}

/// Query one token's reserves and compute its ratio.
pub async fn check_vitals(token: &LendingToken) -> Result<Vitals, MonitorError> {
    let lending = token.lending_reserve_underlying().await?;
    let borrowing = token.borrowing_reserve_underlying().await?;
    let ratio = collateralization_ratio(&lending, &borrowing)?;
    tracing::info!(
        symbol = token.symbol(),
        lending = %lending,
        borrowing = %borrowing,
        %ratio,
        "vitals checked"
    );
    Ok(Vitals {
        symbol: token.symbol().to_string(),
        lending,
        borrowing,
        ratio,
    })
}

/// Checks every token, sends one message, sleeps, repeats.
pub struct VitalsMonitor<N> {
    tokens: Vec<LendingToken>,
    notifier: N,
    interval: Duration,
}

impl<N: Notifier> VitalsMonitor<N> {
    pub fn new(tokens: Vec<LendingToken>, notifier: N, interval: Duration) -> Self {
        Self {
            tokens,
            notifier,
            interval,
        }
    }

    pub fn tokens(&self) -> &[LendingToken] {
        &self.tokens
    }

    /// The report for one cycle. Tokens are queried one after another.
    pub async fn check_all(&self) -> Result<String, MonitorError> {
        let mut lines = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            lines.push(check_vitals(token).await?.report_line());
        }
        Ok(lines.join("\n"))
    }

    /// One cycle: check, then notify.
    pub async fn tick(&self) -> Result<(), MonitorError> {
        let report = self.check_all().await?;
        self.notifier.send(&report).await
    }

    /// Runs until a query or the notifier fails.
    pub async fn run(&self) -> Result<(), MonitorError> {
        tracing::info!(
            tokens = self.tokens.len(),
            interval_secs = self.interval.as_secs(),
            "vitals monitor started"
        );
        loop {
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "vitals monitor stopped");
                return Err(e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::contract::testing::FakeChain;
    use crate::token::fixtures::*;

    #[derive(Default, Clone)]
    struct Inbox(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Notifier for Inbox {
        async fn send(&self, text: &str) -> Result<(), MonitorError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl Notifier for Unreachable {
        async fn send(&self, _text: &str) -> Result<(), MonitorError> {
            Err(MonitorError::Notify("connection refused".into()))
        }
    }

    fn coins(c: &str, decimals: u32) -> Amount {
        Amount::from_coins(c, decimals).unwrap()
    }

    #[test]
    fn half_borrowed_is_fifty_percent() {
        let ratio = collateralization_ratio(&coins("2", 18), &coins("1", 18)).unwrap();
        assert_eq!(ratio, "50.00%");
        let ratio = collateralization_ratio(&coins("1000", 6), &coins("500", 6)).unwrap();
        assert_eq!(ratio, "50.00%");
    }

    #[test]
    fn nothing_lent_is_zero() {
        assert_eq!(
            collateralization_ratio(&Amount::zero(18), &coins("5", 18)).unwrap(),
            "0.00%"
        );
        assert_eq!(
            collateralization_ratio(&Amount::zero(18), &Amount::zero(18)).unwrap(),
            "0.00%"
        );
    }

    #[test]
    fn rounds_half_up_to_hundredths() {
        let r = |l: &str, b: &str| collateralization_ratio(&coins(l, 0), &coins(b, 0)).unwrap();
        assert_eq!(r("3", "1"), "33.33%");
        assert_eq!(r("3", "2"), "66.67%");
        assert_eq!(r("8", "1"), "12.50%");
        assert_eq!(r("800", "1"), "0.13%");
        assert_eq!(r("1600", "1"), "0.06%");
        assert_eq!(r("1", "3"), "300.00%");
    }

    #[test]
    fn mixed_decimals_are_aligned() {
        let ratio = collateralization_ratio(&coins("2", 18), &coins("1", 6)).unwrap();
        assert_eq!(ratio, "50.00%");
    }

    #[test]
    fn line_format() {
        assert_eq!(report_line("gcDAI", "50.00%"), "<b>gcDAI</b> <i>50.00%</i>");
    }

    #[tokio::test]
    async fn tick_sends_one_line_per_token() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        chain.answer_uint(GCDAI, "lendingReserveUnderlying()", 2_000_000_000_000_000_000);
        chain.answer_uint(GCDAI, "borrowingReserveUnderlying()", 1_000_000_000_000_000_000);
        let token = LendingToken::connect(chain, GCDAI).await.unwrap();

        let inbox = Inbox::default();
        let monitor = VitalsMonitor::new(
            vec![token.clone(), token],
            inbox.clone(),
            Duration::from_secs(60),
        );
        monitor.tick().await.unwrap();

        let sent = inbox.0.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec!["<b>gcDAI</b> <i>50.00%</i>\n<b>gcDAI</b> <i>50.00%</i>".to_string()]
        );
    }

    #[tokio::test]
    async fn check_vitals_reports_amounts() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        chain.answer_uint(GCDAI, "lendingReserveUnderlying()", 0);
        chain.answer_uint(GCDAI, "borrowingReserveUnderlying()", 0);
        let token = LendingToken::connect(chain, GCDAI).await.unwrap();

        let vitals = check_vitals(&token).await.unwrap();
        assert_eq!(vitals.symbol, "gcDAI");
        assert!(vitals.lending.is_zero());
        assert_eq!(vitals.ratio, "0.00%");
    }

    #[tokio::test]
    async fn notifier_failure_ends_run() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        chain.answer_uint(GCDAI, "lendingReserveUnderlying()", 4);
        chain.answer_uint(GCDAI, "borrowingReserveUnderlying()", 1);
        let token = LendingToken::connect(chain, GCDAI).await.unwrap();

        let monitor = VitalsMonitor::new(vec![token], Unreachable, Duration::from_secs(3600));
        assert!(matches!(monitor.run().await, Err(MonitorError::Notify(_))));
    }

    #[tokio::test]
    async fn query_failure_ends_run_before_notifying() {
        let chain = FakeChain::shared();
        gcdai(&chain);
        let token = LendingToken::connect(chain, GCDAI).await.unwrap();

        let inbox = Inbox::default();
        let monitor = VitalsMonitor::new(vec![token], inbox.clone(), Duration::from_secs(3600));
        assert!(matches!(monitor.run().await, Err(MonitorError::Transport(_))));
        assert!(inbox.0.lock().unwrap().is_empty());
    }
}
