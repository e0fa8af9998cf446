use {
    crate::{
        constants::{
            APPROVAL_GAS_BUMP_WEI, APPROVAL_GAS_FALLBACK, BNB_GAS_RESERVE, GAS_LIMIT_FAILSAFE,
            GAS_MARGIN_PCT, NONCE_REFRESH_EVERY, RECEIPT_POLL_EVERY, RECEIPT_TIMEOUT_SECS,
            SWAP_DEADLINE_SECS, approval_threshold,
        },
        libs::{
            bsc::{Chain, TxReceipt},
            error::{as_rejection, Rejection},
            route::{Route, Router, Side},
        },
    },
    alloy::{
        network::TransactionBuilder,
        primitives::{Address, B256, U256},
        rpc::types::TransactionRequest,
        sol_types::SolEvent,
    },
    anyhow::{anyhow, Result},
    dashmap::{DashMap, DashSet},
    pancakes::{
        pancake::{
            pancake_swap_v2::{apply_slippage, approve_calldata, buy_calldata, sell_calldata, IERC20, IWBNB},
            WBNB,
        },
        plug::from_human,
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::{
        fmt,
        str::FromStr,
        sync::{Arc, Mutex, PoisonError},
        time::Duration,
    },
    tokio::{task::JoinHandle, time::Instant},
    tracing::{debug, info, warn},
};

/// Gas price to pay: the node's suggestion, a fixed wei amount, or the
/// suggestion plus some gwei. Persisted as `""`/`"network"`, `"5000000000"`
/// and `"+10.1"` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GasPriceSpec {
    #[default]
    Network,
    Absolute(u128),
    Offset(Decimal),
}

impl FromStr for GasPriceSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("network") || s.eq_ignore_ascii_case("none") {
            return Ok(GasPriceSpec::Network);
        }
        if let Some(offset) = s.strip_prefix('+') {
            let gwei = Decimal::from_str(offset.trim()).map_err(|e| anyhow!("bad gas offset `{s}`: {e}"))?;
            if gwei.is_sign_negative() {
                return Err(anyhow!("bad gas offset `{s}`"));
            }
            return Ok(GasPriceSpec::Offset(gwei));
        }
        let wei = s.parse::<u128>().map_err(|e| anyhow!("bad gas price `{s}`: {e}"))?;
        Ok(GasPriceSpec::Absolute(wei))
    }
}

impl fmt::Display for GasPriceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasPriceSpec::Network => f.write_str("network"),
            GasPriceSpec::Absolute(wei) => write!(f, "{wei}"),
            GasPriceSpec::Offset(gwei) => write!(f, "+{gwei}"),
        }
    }
}

impl TryFrom<String> for GasPriceSpec {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<GasPriceSpec> for String {
    fn from(spec: GasPriceSpec) -> Self {
        spec.to_string()
    }
}

/// Wallet nonce shared by every sender in the process. The cached value
/// only ever moves forward, so a lagging node cannot hand a used nonce back.
pub struct NonceManager<C> {
    chain: Arc<C>,
    next: Mutex<u64>,
}

impl<C: Chain> NonceManager<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self {
            chain,
            next: Mutex::new(0),
        }
    }

    /// `max(cached, pending)`, committing the next value before returning.
    pub async fn allocate(&self) -> Result<u64> {
        let pending = self.chain.pending_nonce(self.chain.wallet()).await?;
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let nonce = (*next).max(pending);
        *next = nonce + 1;
        Ok(nonce)
    }

    /// Catch up with transactions sent from elsewhere.
    pub async fn refresh(&self) -> Result<u64> {
        let pending = self.chain.pending_nonce(self.chain.wallet()).await?;
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        *next = (*next).max(pending);
        Ok(*next)
    }

    pub fn peek(&self) -> u64 {
        *self.next.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct TxSettings {
    /// Ratio above which swaps are rejected.
    pub max_price_impact: Decimal,
    pub gas_limit_failsafe: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll: Duration,
    pub nonce_refresh: Duration,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            max_price_impact: Decimal::new(5, 2),
            gas_limit_failsafe: GAS_LIMIT_FAILSAFE,
            receipt_timeout: Duration::from_secs(*RECEIPT_TIMEOUT_SECS),
            receipt_poll: RECEIPT_POLL_EVERY,
            nonce_refresh: NONCE_REFRESH_EVERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// `amount_out` comes from the receipt logs, after any transfer tax.
    Success {
        amount_in: U256,
        amount_out: U256,
        tx_hash: B256,
    },
    Reverted {
        tx_hash: B256,
    },
    TimedOut {
        tx_hash: B256,
    },
    Rejected(Rejection),
}

pub struct TxExecutor<C> {
    chain: Arc<C>,
    router: Arc<Router<C>>,
    nonces: NonceManager<C>,
    approved: DashSet<Address>,
    approving: DashMap<Address, Arc<tokio::sync::Mutex<()>>>,
    settings: TxSettings,
}

impl<C: Chain> TxExecutor<C> {
    pub fn new(chain: Arc<C>, router: Arc<Router<C>>, settings: TxSettings) -> Self {
        Self {
            nonces: NonceManager::new(chain.clone()),
            chain,
            router,
            approved: DashSet::new(),
            approving: DashMap::new(),
            settings,
        }
    }

    pub fn nonces(&self) -> &NonceManager<C> {
        &self.nonces
    }

    /// Keep the cached nonce in step with transactions sent from elsewhere.
    pub fn spawn_nonce_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut every = tokio::time::interval(this.settings.nonce_refresh);
            every.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                every.tick().await;
                match this.nonces.refresh().await {
                    Ok(n) => debug!(nonce = n, "nonce refreshed"),
                    Err(e) => warn!("nonce refresh failed: {e:#}"),
                }
            }
        })
    }

    pub async fn resolve_gas_price(&self, spec: &GasPriceSpec) -> Result<u128> {
        Ok(match spec {
            GasPriceSpec::Absolute(wei) => *wei,
            GasPriceSpec::Network => self.chain.gas_price().await?,
            GasPriceSpec::Offset(gwei) => {
                let extra = u128::try_from(from_human(*gwei, 9)).map_err(|_| anyhow!("gas offset too large"))?;
                self.chain.gas_price().await?.saturating_add(extra)
            }
        })
    }

    /// Cached positively only; a miss always asks the chain.
    pub async fn is_approved(&self, token: Address) -> Result<bool> {
        if self.approved.contains(&token) {
            return Ok(true);
        }
        let allowance = self
            .chain
            .allowance(token, self.chain.wallet(), self.router.router_address())
            .await?;
        if allowance >= approval_threshold() {
            self.approved.insert(token);
            return Ok(true);
        }
        Ok(false)
    }

    /// Give the router an unlimited allowance for `token` unless it already has one.
    pub async fn approve(&self, token: Address) -> Result<bool> {
        let lock = self
            .approving
            .entry(token)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if self.is_approved(token).await? {
            return Ok(true);
        }
        let wallet = self.chain.wallet();
        let spender = self.router.router_address();
        let tx = TransactionRequest::default()
            .with_from(wallet)
            .with_to(token)
            .with_input(approve_calldata(spender, U256::MAX));
        let gas_price = self.chain.gas_price().await?.saturating_add(APPROVAL_GAS_BUMP_WEI);
        let gas_limit = match self.chain.estimate_gas(&tx).await {
            Ok(gas) => gas * GAS_MARGIN_PCT / 100,
            Err(e) => {
                debug!(%token, "approval gas estimate failed, using fallback: {e:#}");
                APPROVAL_GAS_FALLBACK
            }
        };

        let nonce = self.nonces.allocate().await?;
        let tx = tx
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price);
        let tx_hash = self.chain.send_transaction(tx).await?;
        info!(%token, %tx_hash, "approval sent");

        match self.wait_receipt(tx_hash).await? {
            Some(r) if r.success => {
                self.approved.insert(token);
                info!(%token, "approved");
                Ok(true)
            }
            Some(_) => {
                warn!(%token, %tx_hash, "approval reverted");
                Ok(false)
            }
            None => {
                warn!(%token, %tx_hash, "approval receipt timed out");
                Ok(false)
            }
        }
    }

    /// Swap `amount` (BNB wei for buys, token units for sells) through the
    /// best v2 path. Pre-flight problems come back as [`SwapOutcome::Rejected`];
    /// RPC failures are errors.
    pub async fn swap(
        &self,
        token: Address,
        amount: U256,
        side: Side,
        slippage: Decimal,
        gas: &GasPriceSpec,
    ) -> Result<SwapOutcome> {
        match self.try_swap(token, amount, side, slippage, gas).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => match as_rejection(&e) {
                Some(r) => Ok(SwapOutcome::Rejected(r.clone())),
                None => Err(e),
            },
        }
    }

    async fn try_swap(
        &self,
        token: Address,
        amount: U256,
        side: Side,
        slippage: Decimal,
        gas: &GasPriceSpec,
    ) -> Result<SwapOutcome> {
        if slippage < Decimal::ZERO || slippage >= Decimal::ONE_HUNDRED {
            return Err(Rejection::InvalidSlippage.into());
        }
        if amount.is_zero() {
            return Err(Rejection::ZeroAmount.into());
        }
        let wallet = self.chain.wallet();
        let amount_in = match side {
            Side::Buy => {
                let balance = self.chain.native_balance(wallet).await?;
                if amount > balance.saturating_sub(BNB_GAS_RESERVE) {
                    return Err(Rejection::InsufficientBalance.into());
                }
                amount
            }
            Side::Sell => {
                let balance = self.chain.token_balance(token, wallet).await?;
                if balance.is_zero() {
                    return Err(Rejection::InsufficientBalance.into());
                }
                if amount > balance {
                    debug!(%token, %amount, %balance, "sell amount clamped to balance");
                }
                amount.min(balance)
            }
        };

        let gas_price = self.resolve_gas_price(gas).await?;
        let route = self.router.best_path(token, amount_in, side).await?;
        let impact = self
            .router
            .price_impact(token, amount_in, side, None, Some(&route))
            .await?;
        if impact > self.settings.max_price_impact {
            return Err(Rejection::PriceImpact(impact).into());
        }

        let min_out = apply_slippage(route.amount_out, slippage);
        let tx = self.swap_request(amount_in, min_out, side, &route);
        let estimate = self
            .chain
            .estimate_gas(&tx)
            .await
            .map_err(|e| Rejection::GasEstimate(format!("{e:#}")))?;
        let gas_limit = estimate * GAS_MARGIN_PCT / 100;
        if gas_limit > self.settings.gas_limit_failsafe {
            return Err(Rejection::GasCeiling(gas_limit).into());
        }

        let nonce = self.nonces.allocate().await?;
        let tx = tx
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price);
        debug!(nonce, gas_limit, gas_price, "sending {side}");
        let tx_hash = self.chain.send_transaction(tx).await?;
        info!(%token, %tx_hash, %side, "swap sent via {} hop(s)", route.hops());

        let Some(receipt) = self.wait_receipt(tx_hash).await? else {
            return Ok(SwapOutcome::TimedOut { tx_hash });
        };
        if !receipt.success {
            return Ok(SwapOutcome::Reverted { tx_hash });
        }
        let amount_out = match side {
            Side::Buy => received_tokens(&receipt, token, wallet),
            Side::Sell => received_bnb(&receipt, self.router.router_address()),
        };
        Ok(SwapOutcome::Success {
            amount_in,
            amount_out,
            tx_hash,
        })
    }

    fn swap_request(&self, amount_in: U256, min_out: U256, side: Side, route: &Route) -> TransactionRequest {
        let wallet = self.chain.wallet();
        let deadline = U256::from(chrono::Utc::now().timestamp().max(0) as u64 + SWAP_DEADLINE_SECS);
        let tx = TransactionRequest::default()
            .with_from(wallet)
            .with_to(self.router.router_address());
        match side {
            Side::Buy => tx
                .with_value(amount_in)
                .with_input(buy_calldata(min_out, route.path.clone(), wallet, deadline)),
            Side::Sell => tx.with_input(sell_calldata(
                amount_in,
                min_out,
                route.path.clone(),
                wallet,
                deadline,
            )),
        }
    }

    async fn wait_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        let deadline = Instant::now() + self.settings.receipt_timeout;
        loop {
            match self.chain.receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(Some(receipt)),
                Ok(None) => {}
                Err(e) => debug!(%tx_hash, "receipt poll failed: {e:#}"),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.settings.receipt_poll).await;
        }
    }
}

/// Tokens transferred to `wallet` by the swap.
fn received_tokens(receipt: &TxReceipt, token: Address, wallet: Address) -> U256 {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == token)
        .filter_map(|log| IERC20::Transfer::decode_log_data(&log.data).ok())
        .filter(|t| t.to == wallet)
        .fold(U256::ZERO, |acc, t| acc + t.value)
}

/// BNB unwrapped by the router for the wallet.
fn received_bnb(receipt: &TxReceipt, router: Address) -> U256 {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == WBNB)
        .filter_map(|log| IWBNB::Withdrawal::decode_log_data(&log.data).ok())
        .filter(|w| w.src == router)
        .fold(U256::ZERO, |acc, w| acc + w.wad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::{
        bsc::mock::{MockChain, WALLET},
        price::{OracleSettings, PriceOracle},
    };
    use alloy::primitives::address;
    use pancakes::pancake::Version;
    use rust_decimal_macros::dec;

    const TOKEN: Address = address!("0x0000000000000000000000000000000000001234");

    fn e18(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18))
    }

    /// 1 BNB = 1000 tokens, 200 BNB deep, quotes at the pool ratio minus the fee.
    fn market() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        chain.add_token(TOKEN, "TKN", 18);
        chain.add_pair(Version::V2.factory(), TOKEN, WBNB, e18(200_000), e18(200));
        chain.set_quote(vec![TOKEN, WBNB], U256::from(9975u64), U256::from(10_000_000u64));
        chain.set_quote(vec![WBNB, TOKEN], U256::from(9_975_000u64), U256::from(10_000u64));
        chain.set_native(e18(10));
        chain
    }

    fn executor(chain: Arc<MockChain>) -> Arc<TxExecutor<MockChain>> {
        let oracle = Arc::new(PriceOracle::new(chain.clone(), OracleSettings::default()));
        let router = Arc::new(Router::new(chain.clone(), oracle));
        Arc::new(TxExecutor::new(
            chain,
            router,
            TxSettings {
                receipt_timeout: Duration::from_millis(50),
                receipt_poll: Duration::from_millis(5),
                ..TxSettings::default()
            },
        ))
    }

    #[test]
    fn gas_spec_parses_all_forms() {
        assert_eq!("".parse::<GasPriceSpec>().unwrap(), GasPriceSpec::Network);
        assert_eq!("+10.1".parse::<GasPriceSpec>().unwrap(), GasPriceSpec::Offset(dec!(10.1)));
        assert_eq!(
            "5000000000".parse::<GasPriceSpec>().unwrap(),
            GasPriceSpec::Absolute(5_000_000_000)
        );
        assert!("fast".parse::<GasPriceSpec>().is_err());
        let json = serde_json::to_string(&GasPriceSpec::Offset(dec!(2.5))).unwrap();
        assert_eq!(json, "\"+2.5\"");
    }

    #[tokio::test]
    async fn offset_is_added_to_network_price() {
        let tx = executor(market());
        let wei = tx.resolve_gas_price(&GasPriceSpec::Offset(dec!(0.5))).await.unwrap();
        assert_eq!(wei, 3_500_000_000);
    }

    #[tokio::test]
    async fn concurrent_allocations_never_share_a_nonce() {
        let chain = market();
        chain.set_pending_nonce(7);
        let tx = executor(chain);
        let handles: Vec<_> = (0..64)
            .map(|_| {
                let tx = tx.clone();
                tokio::spawn(async move { tx.nonces().allocate().await.unwrap() })
            })
            .collect();
        let mut seen = std::collections::HashSet::new();
        for h in handles {
            assert!(seen.insert(h.await.unwrap()));
        }
        assert_eq!(seen.len(), 64);
        assert_eq!(seen.iter().min(), Some(&7));
        assert_eq!(tx.nonces().peek(), 71);
    }

    #[tokio::test]
    async fn lagging_node_never_gets_a_used_nonce_back() {
        let chain = market();
        chain.set_pending_nonce(5);
        chain.set_balance(TOKEN, WALLET, e18(10));
        let tx = executor(chain.clone());
        let out = tx
            .swap(TOKEN, e18(1), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert!(matches!(out, SwapOutcome::Success { .. }));
        assert_eq!(chain.sent()[0].nonce, Some(5));

        // node behind the one that took the transaction
        chain.set_pending_nonce(5);
        assert_eq!(tx.nonces().refresh().await.unwrap(), 6);
        assert_eq!(tx.nonces().allocate().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn unsent_nonce_is_skipped_not_reused() {
        let chain = market();
        chain.set_pending_nonce(3);
        let tx = executor(chain.clone());
        assert_eq!(tx.nonces().allocate().await.unwrap(), 3);
        // the send never happened, the chain still says 3
        assert_eq!(tx.nonces().refresh().await.unwrap(), 4);
        assert_eq!(tx.nonces().allocate().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn background_refresh_follows_external_transactions() {
        let chain = market();
        let oracle = Arc::new(PriceOracle::new(chain.clone(), OracleSettings::default()));
        let router = Arc::new(Router::new(chain.clone(), oracle));
        let tx = Arc::new(TxExecutor::new(
            chain.clone(),
            router,
            TxSettings {
                nonce_refresh: Duration::from_millis(10),
                ..TxSettings::default()
            },
        ));
        let job = tx.spawn_nonce_refresh();
        assert_eq!(tx.nonces().allocate().await.unwrap(), 0);

        // two transactions sent by another wallet client
        chain.set_pending_nonce(3);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(tx.nonces().peek(), 3);
        job.abort();
    }

    #[tokio::test]
    async fn sell_is_clamped_to_balance() {
        let chain = market();
        chain.set_balance(TOKEN, WALLET, e18(400));
        let tx = executor(chain.clone());
        let out = tx
            .swap(TOKEN, e18(1000), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        let SwapOutcome::Success { amount_in, amount_out, .. } = out else {
            panic!("unexpected {out:?}");
        };
        assert_eq!(amount_in, e18(400));
        assert_eq!(amount_out, e18(400) * U256::from(9975u64) / U256::from(10_000_000u64));
        let sells = chain.sells_sent();
        assert_eq!(sells.len(), 1);
        assert_eq!(sells[0].amountIn, e18(400));
        assert_eq!(chain.balance(TOKEN, WALLET), U256::ZERO);
    }

    #[tokio::test]
    async fn buy_keeps_gas_reserve() {
        let chain = market();
        chain.set_native(e18(1));
        let tx = executor(chain.clone());
        let out = tx
            .swap(TOKEN, e18(1), Side::Buy, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert_eq!(out, SwapOutcome::Rejected(Rejection::InsufficientBalance));
        assert!(chain.sent().is_empty());

        let out = tx
            .swap(TOKEN, e18(1) / U256::from(2u64), Side::Buy, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        let SwapOutcome::Success { amount_out, .. } = out else {
            panic!("unexpected {out:?}");
        };
        assert_eq!(amount_out, U256::from(498_750u64) * U256::from(10u64).pow(U256::from(15)));
        assert_eq!(chain.balance(TOKEN, WALLET), amount_out);
        assert_eq!(chain.native(), e18(1) / U256::from(2u64));
        let buys = chain.buys_sent();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].path, vec![WBNB, TOKEN]);
        assert_eq!(buys[0].to, WALLET);
    }

    #[tokio::test]
    async fn gas_ceiling_blocks_send() {
        let chain = market();
        chain.set_balance(TOKEN, WALLET, e18(10));
        chain.set_gas_estimate(3_000_000);
        let tx = executor(chain.clone());
        let out = tx
            .swap(TOKEN, e18(10), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert_eq!(out, SwapOutcome::Rejected(Rejection::GasCeiling(3_600_000)));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn deep_trade_is_rejected_on_impact() {
        let chain = market();
        chain.set_balance(TOKEN, WALLET, e18(1000));
        // pool returns half of the fair output
        chain.set_quote(vec![TOKEN, WBNB], U256::from(1u64), U256::from(2000u64));
        let tx = executor(chain.clone());
        let out = tx
            .swap(TOKEN, e18(1000), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert!(matches!(out, SwapOutcome::Rejected(Rejection::PriceImpact(_))));
    }

    #[tokio::test]
    async fn reverted_and_timed_out_are_reported() {
        let chain = market();
        chain.set_balance(TOKEN, WALLET, e18(10));
        let tx = executor(chain.clone());
        chain.revert_next();
        let out = tx
            .swap(TOKEN, e18(1), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert!(matches!(out, SwapOutcome::Reverted { .. }));

        chain.drop_receipts(true);
        let out = tx
            .swap(TOKEN, e18(1), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert!(matches!(out, SwapOutcome::TimedOut { .. }));
        let nonces: Vec<_> = chain.sent().iter().map(|t| t.nonce.unwrap()).collect();
        assert_eq!(nonces, vec![0, 1]);
    }

    #[tokio::test]
    async fn failed_estimates() {
        let chain = market();
        chain.set_balance(TOKEN, WALLET, e18(10));
        chain.fail_estimates(true);
        let tx = executor(chain.clone());

        // approvals fall back to a fixed limit
        assert!(tx.approve(TOKEN).await.unwrap());
        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].gas, Some(APPROVAL_GAS_FALLBACK));
        assert_eq!(sent[0].gas_price, Some(3_000_000_000 + APPROVAL_GAS_BUMP_WEI));

        // swaps are not sent blind
        let out = tx
            .swap(TOKEN, e18(1), Side::Sell, dec!(1), &GasPriceSpec::Network)
            .await
            .unwrap();
        assert!(matches!(out, SwapOutcome::Rejected(Rejection::GasEstimate(_))));
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn approval_is_sent_once() {
        let chain = market();
        let tx = executor(chain.clone());
        assert!(!tx.is_approved(TOKEN).await.unwrap());
        assert!(tx.approve(TOKEN).await.unwrap());
        assert!(tx.approve(TOKEN).await.unwrap());
        assert!(tx.is_approved(TOKEN).await.unwrap());
        assert_eq!(chain.approvals_sent(), 1);
    }
}
