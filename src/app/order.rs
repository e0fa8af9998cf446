use {
    crate::{
        app::{
            models::{OrderRecord, TokenRecord},
            services::Services,
        },
        libs::{
            bsc::Chain,
            route::Side,
            tx::SwapOutcome,
            writing::format_price,
        },
    },
    alloy::primitives::U256,
    pancakes::pancake::pancake_swap_v2::format_token,
    rust_decimal::Decimal,
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    tokio::task::JoinHandle,
    tracing::{error, info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Open,
    /// Trailing stop condition met, tracking the extremum.
    Armed,
    /// Settlement dispatched.
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Idle,
    Armed(Decimal),
    Fire,
}

/// One order's trigger logic. Ticks are delivered one at a time by the
/// owning token watcher.
pub struct OrderWatcher<C> {
    record: OrderRecord,
    token: TokenRecord,
    services: Arc<Services<C>>,
    state: OrderState,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    finished: Arc<AtomicBool>,
    settlement: Option<JoinHandle<()>>,
}

impl<C: Chain> OrderWatcher<C> {
    pub fn new(record: OrderRecord, token: TokenRecord, services: Arc<Services<C>>) -> Self {
        Self {
            record,
            token,
            services,
            state: OrderState::Open,
            min_price: None,
            max_price: None,
            finished: Arc::new(AtomicBool::new(false)),
            settlement: None,
        }
    }

    pub fn record(&self) -> &OrderRecord {
        &self.record
    }

    pub fn id(&self) -> u64 {
        self.record.id
    }

    pub fn side(&self) -> Side {
        self.record.side
    }

    pub fn state(&self) -> OrderState {
        if self.finished.load(Ordering::Acquire) {
            OrderState::Closed
        } else {
            self.state
        }
    }

    /// Still accepting ticks.
    pub fn is_active(&self) -> bool {
        matches!(self.state, OrderState::Open | OrderState::Armed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn extremum(&self) -> Option<Decimal> {
        if self.record.above {
            self.max_price
        } else {
            self.min_price
        }
    }

    pub fn set_token(&mut self, token: TokenRecord) {
        self.token = token;
    }

    /// Swap in edited fields. Trailing tracking starts over.
    pub fn replace_record(&mut self, record: OrderRecord) {
        self.record = record;
        if self.is_active() {
            self.state = OrderState::Open;
            self.min_price = None;
            self.max_price = None;
        }
    }

    /// Advance the state machine for one price. Zero means no data.
    pub fn evaluate(&mut self, price: Decimal) -> Trigger {
        if !self.is_active() || price <= Decimal::ZERO {
            return Trigger::Idle;
        }
        let limit = self.record.limit_price.unwrap_or(price);
        let above = self.record.above;
        let hit = if above { price >= limit } else { price <= limit };

        let Some(callback) = self.record.trailing_stop.map(Decimal::from) else {
            return if hit { Trigger::Fire } else { Trigger::Idle };
        };

        if self.state == OrderState::Open {
            if !hit {
                return Trigger::Idle;
            }
            self.state = OrderState::Armed;
            if above {
                self.max_price = Some(price);
            } else {
                self.min_price = Some(price);
            }
            return Trigger::Armed(price);
        }

        let retrace = if above {
            let max = self.max_price.unwrap_or(price);
            if price > max {
                self.max_price = Some(price);
                return Trigger::Idle;
            }
            (Decimal::ONE - price / max) * Decimal::ONE_HUNDRED
        } else {
            let min = self.min_price.unwrap_or(price);
            if price < min {
                self.min_price = Some(price);
                return Trigger::Idle;
            }
            (price / min - Decimal::ONE) * Decimal::ONE_HUNDRED
        };
        if retrace > callback {
            Trigger::Fire
        } else {
            Trigger::Idle
        }
    }

    /// Deliver a tick. Returns true when the order fired.
    pub fn on_price(&mut self, price: Decimal) -> bool {
        match self.evaluate(price) {
            Trigger::Idle => false,
            Trigger::Armed(at) => {
                let numeraire = self.services.oracle.numeraire();
                let msg = format!(
                    "{} {}: trailing stop armed at {} {}",
                    self.token.name(),
                    self.record.describe(&self.token, numeraire),
                    format_price(at),
                    numeraire.symbol()
                );
                info!("{msg}");
                self.services.notifier.notify(msg);
                false
            }
            Trigger::Fire => {
                self.close(price);
                true
            }
        }
    }

    /// Stop taking ticks and settle in the background.
    pub fn close(&mut self, price: Decimal) {
        if !self.is_active() {
            return;
        }
        self.state = OrderState::Closing;
        info!(
            order = self.record.id,
            price = %price,
            "{}",
            self.record.trigger_label()
        );
        let services = self.services.clone();
        let record = self.record.clone();
        let token = self.token.clone();
        let finished = self.finished.clone();
        self.settlement = Some(tokio::spawn(async move {
            settle(&services, &record, &token).await;
            finished.store(true, Ordering::Release);
        }));
    }

    pub fn take_settlement(&mut self) -> Option<JoinHandle<()>> {
        self.settlement.take()
    }
}

/// Execute a fired order, report it, and delete it whatever the outcome.
async fn settle<C: Chain>(services: &Services<C>, record: &OrderRecord, token: &TokenRecord) {
    let outcome = services
        .executor
        .swap(
            record.token,
            record.amount,
            record.side,
            record.slippage,
            &record.gas_price,
        )
        .await;
    let head = format!("{} #{} {}", token.name(), record.id, record.trigger_label());
    let msg = match outcome {
        Ok(SwapOutcome::Success {
            amount_in,
            amount_out,
            tx_hash,
        }) => {
            if record.side == Side::Buy {
                if let Err(e) = services.record_buy(token, amount_in, amount_out).await {
                    warn!(order = record.id, "cost basis not updated: {e:#}");
                }
            }
            format!("{head}: {}. Tx {tx_hash}", describe_fill(record.side, token, amount_in, amount_out))
        }
        Ok(SwapOutcome::Reverted { tx_hash }) => {
            format!("{head}, but the transaction reverted. Tx {tx_hash}")
        }
        Ok(SwapOutcome::TimedOut { tx_hash }) => {
            format!("{head}, but no receipt arrived in time. Tx {tx_hash}")
        }
        Ok(SwapOutcome::Rejected(reason)) => format!("{head}, but the trade was not sent: {reason}"),
        Err(e) => {
            error!(order = record.id, "settlement failed: {e:#}");
            format!("{head}, but the trade failed: {e}")
        }
    };
    info!("{msg}");
    services.notifier.notify(msg);
    if let Err(e) = services.store.delete_order(record.id) {
        error!(order = record.id, "could not delete settled order: {e:#}");
    }
}

pub fn describe_fill(side: Side, token: &TokenRecord, amount_in: U256, amount_out: U256) -> String {
    let decimals = token.decimals as u32;
    match side {
        Side::Buy => format!(
            "bought {} {} for {} BNB",
            format_token(amount_out, decimals),
            token.symbol,
            format_token(amount_in, 18)
        ),
        Side::Sell => format!(
            "sold {} {} for {} BNB",
            format_token(amount_in, decimals),
            token.symbol,
            format_token(amount_out, 18)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app::{models::NewOrder, notify::Notifier, store::JsonStore},
        libs::{bsc::mock::MockChain, price::OracleSettings, tx::TxSettings},
    };
    use alloy::primitives::{address, Address};
    use rust_decimal_macros::dec;

    const TOKEN: Address = address!("0x0000000000000000000000000000000000005678");

    fn watcher(side: Side, above: bool, limit: Option<Decimal>, trailing: Option<u16>) -> OrderWatcher<MockChain> {
        let services = Services::new(
            Arc::new(MockChain::new()),
            Arc::new(JsonStore::in_memory()),
            Notifier::default(),
            OracleSettings::default(),
            TxSettings::default(),
        );
        let token = TokenRecord {
            address: TOKEN,
            symbol: "TKN".into(),
            icon: None,
            decimals: 18,
            default_slippage: dec!(1),
            effective_buy_price: None,
        };
        let order = NewOrder {
            above,
            limit_price: limit,
            trailing_stop: trailing,
            ..NewOrder::market(TOKEN, side, U256::from(1u64), dec!(1))
        };
        OrderWatcher::new(OrderRecord::from_new(1, order), token, services)
    }

    #[test]
    fn market_order_fires_on_first_price() {
        let mut w = watcher(Side::Buy, false, None, None);
        assert_eq!(w.evaluate(dec!(0)), Trigger::Idle);
        assert_eq!(w.evaluate(dec!(123.4)), Trigger::Fire);
        let mut w = watcher(Side::Sell, true, None, None);
        assert_eq!(w.evaluate(dec!(0.0000001)), Trigger::Fire);
    }

    #[test]
    fn plain_limits_compare_against_the_limit() {
        let mut stop = watcher(Side::Sell, false, Some(dec!(5)), None);
        assert_eq!(stop.evaluate(dec!(5.1)), Trigger::Idle);
        assert_eq!(stop.evaluate(dec!(5)), Trigger::Fire);
        let mut tp = watcher(Side::Sell, true, Some(dec!(5)), None);
        assert_eq!(tp.evaluate(dec!(4.9)), Trigger::Idle);
        assert_eq!(tp.evaluate(dec!(5.2)), Trigger::Fire);
    }

    #[test]
    fn trailing_buy_fires_on_rise_from_minimum() {
        let mut w = watcher(Side::Buy, false, Some(dec!(10)), Some(5));
        assert_eq!(w.evaluate(dec!(10)), Trigger::Armed(dec!(10)));
        let mut mins = vec![w.extremum()];
        for p in [dec!(9), dec!(8)] {
            assert_eq!(w.evaluate(p), Trigger::Idle);
            mins.push(w.extremum());
        }
        assert_eq!(mins, vec![Some(dec!(10)), Some(dec!(9)), Some(dec!(8))]);
        assert_eq!(w.evaluate(dec!(8.4)), Trigger::Idle);
        assert_eq!(w.evaluate(dec!(8.5)), Trigger::Fire);
        assert_eq!(w.extremum(), Some(dec!(8)));
    }

    #[test]
    fn trailing_sell_tracks_the_maximum() {
        let mut w = watcher(Side::Sell, true, Some(dec!(0.0002)), Some(5));
        assert_eq!(w.evaluate(dec!(0.00018)), Trigger::Idle);
        assert_eq!(w.state(), OrderState::Open);
        assert_eq!(w.evaluate(dec!(0.00021)), Trigger::Armed(dec!(0.00021)));
        assert_eq!(w.state(), OrderState::Armed);
        assert_eq!(w.evaluate(dec!(0.00023)), Trigger::Idle);
        assert_eq!(w.extremum(), Some(dec!(0.00023)));
        assert_eq!(w.evaluate(dec!(0.000225)), Trigger::Idle);
        assert_eq!(w.evaluate(dec!(0.000215)), Trigger::Fire);
    }

    #[test]
    fn zero_never_arms() {
        let mut w = watcher(Side::Sell, false, None, Some(3));
        assert_eq!(w.evaluate(dec!(0)), Trigger::Idle);
        assert_eq!(w.state(), OrderState::Open);
    }

    #[test]
    fn edit_resets_trailing_state() {
        let mut w = watcher(Side::Buy, false, None, Some(5));
        assert!(matches!(w.evaluate(dec!(3)), Trigger::Armed(_)));
        let mut record = w.record().clone();
        record.trailing_stop = Some(10);
        w.replace_record(record);
        assert_eq!(w.state(), OrderState::Open);
        assert_eq!(w.extremum(), None);
    }

    #[tokio::test]
    async fn closing_stops_further_ticks() {
        let mut w = watcher(Side::Sell, true, None, None);
        assert!(w.on_price(dec!(1)));
        assert_eq!(w.state(), OrderState::Closing);
        assert_eq!(w.evaluate(dec!(2)), Trigger::Idle);
        w.take_settlement().unwrap().await.unwrap();
        assert_eq!(w.state(), OrderState::Closed);
        assert!(w.is_finished());
    }
}
