use {
    crate::{
        app::{models::TokenRecord, notify::Notifier, store::Store},
        libs::{
            bsc::Chain,
            price::{OracleSettings, PriceOracle},
            route::Router,
            tx::{TxExecutor, TxSettings},
        },
    },
    alloy::primitives::U256,
    anyhow::Result,
    pancakes::plug::{ratio_to_decimal, to_human},
    rust_decimal::Decimal,
    std::sync::Arc,
    tracing::debug,
};

/// Engine dependencies, built once and shared by every watcher.
pub struct Services<C> {
    pub chain: Arc<C>,
    pub oracle: Arc<PriceOracle<C>>,
    pub router: Arc<Router<C>>,
    pub executor: Arc<TxExecutor<C>>,
    pub store: Arc<dyn Store>,
    pub notifier: Notifier,
}

impl<C: Chain> Services<C> {
    pub fn new(
        chain: Arc<C>,
        store: Arc<dyn Store>,
        notifier: Notifier,
        oracle_settings: OracleSettings,
        tx_settings: TxSettings,
    ) -> Arc<Self> {
        let oracle = Arc::new(PriceOracle::new(chain.clone(), oracle_settings));
        let router = Arc::new(Router::new(chain.clone(), oracle.clone()));
        let executor = Arc::new(TxExecutor::new(chain.clone(), router.clone(), tx_settings));
        Arc::new(Self {
            chain,
            oracle,
            router,
            executor,
            store,
            notifier,
        })
    }

    /// Fold a filled buy into the token's average cost and persist it.
    /// `spent` is BNB wei, `received` token units; call after the buy is mined.
    pub async fn record_buy(&self, token: &TokenRecord, spent: U256, received: U256) -> Result<Decimal> {
        if received.is_zero() {
            anyhow::bail!("buy of {} received nothing", token.symbol);
        }
        let paid_bnb = ratio_to_decimal(
            spent * U256::from(10u64).pow(U256::from(token.decimals)),
            received * U256::from(10u64).pow(U256::from(18u64)),
        );
        let paid = self.oracle.bnb_to_numeraire(paid_bnb).await?;

        let previous = self
            .store
            .token(token.address)?
            .and_then(|t| t.effective_buy_price);
        let balance = self.chain.token_balance(token.address, self.chain.wallet()).await?;
        let held_before = to_human(balance.saturating_sub(received), token.decimals);
        let received_h = to_human(received, token.decimals);

        let basis = match previous {
            Some(prev) if !held_before.is_zero() => {
                (prev * held_before + paid * received_h) / (held_before + received_h)
            }
            _ => paid,
        };
        debug!(token = %token.symbol, %basis, "cost basis updated");
        self.store.update_cost_basis(token.address, Some(basis))?;
        Ok(basis)
    }
}
