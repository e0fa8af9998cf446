use {
    crate::{
        app::{
            models::{NewOrder, OrderEdit, OrderRecord, TokenEdit, TokenRecord},
            order::describe_fill,
            notify::Notifier,
            services::Services,
            store::JsonStore,
            token::TokenWatcher,
        },
        constants::{BSC_CHAIN_ID, SELL_ALL_GAS_OFFSET_GWEI},
        libs::{
            bsc::{Chain, ChainClient},
            config::{load_env, Config},
            error::{EngineError, Rejection},
            price::{Numeraire, OracleSettings},
            route::Side,
            tx::{GasPriceSpec, SwapOutcome, TxSettings},
            writing::{format_pct, format_price, init_logging},
        },
    },
    alloy::primitives::{Address, U256},
    anyhow::Result,
    pancakes::{pancake::pancake_swap_v2::format_token, plug::to_human},
    rust_decimal::Decimal,
    std::{collections::HashMap, fmt, sync::Arc, time::Duration},
    tokio::sync::RwLock,
    tracing::{info, warn},
};

/// Wire the engine from the environment and run it until ctrl-c.
pub async fn init() -> Result<()> {
    load_env();
    let _log_guard = init_logging()?;
    let cfg = Config::from_env()?;
    info!(?cfg, "starting");

    let client = ChainClient::new(&cfg)?;
    let chain_id = client.chain_id().await?;
    if chain_id != *BSC_CHAIN_ID {
        anyhow::bail!("RPC serves chain {chain_id}, expected {}", *BSC_CHAIN_ID);
    }
    info!(wallet = %client.wallet(), chain_id, "connected");

    let (notifier, mut messages) = Notifier::channel();
    let store = Arc::new(JsonStore::open(&cfg.store_path)?);
    let services = Services::new(
        Arc::new(client),
        store,
        notifier,
        OracleSettings {
            numeraire: if cfg.price_in_usd { Numeraire::Usd } else { Numeraire::Bnb },
            min_pool_size_bnb: cfg.min_pool_size_bnb,
        },
        TxSettings {
            max_price_impact: cfg.max_price_impact,
            ..TxSettings::default()
        },
    );
    let nonce_job = services.executor.spawn_nonce_refresh();

    let bot = TradeBot::new(services, cfg.admin_chat_id, cfg.monitor_interval);
    bot.start().await?;

    // No chat transport is wired in; notifications land in the log.
    let chat = cfg.admin_chat_id;
    let drain = tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            info!(chat, "{msg}");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    bot.shutdown().await;
    nonce_job.abort();
    drain.abort();
    Ok(())
}

/// Read-only snapshot of one token.
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub token: TokenRecord,
    pub numeraire: Numeraire,
    pub price: Decimal,
    pub price_usd: Decimal,
    /// Pool the price came from, e.g. `v2 WBNB`.
    pub quote_used: Option<String>,
    pub balance: U256,
    pub value: Decimal,
    pub value_usd: Decimal,
    /// Current price against the cost basis.
    pub basis_change: Option<Decimal>,
    pub orders: Vec<String>,
    /// Front-end handle of the previous status message, to edit it in place.
    pub last_message_id: Option<i64>,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = self.numeraire.symbol();
        writeln!(f, "{}", self.token.name())?;
        write!(f, "Price: {} {sym}", format_price(self.price))?;
        if self.numeraire == Numeraire::Bnb {
            write!(f, " (${})", format_price(self.price_usd))?;
        }
        if let Some(q) = &self.quote_used {
            write!(f, " via {q}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Balance: {} {} = {} {sym} (${})",
            format_token(self.balance, self.token.decimals as u32),
            self.token.symbol,
            format_price(self.value),
            self.value_usd.round_dp(2)
        )?;
        if let (Some(basis), Some(change)) = (self.token.effective_buy_price, self.basis_change) {
            writeln!(f, "Bought at {} {sym} ({})", format_price(basis), format_pct(change))?;
        }
        for line in &self.orders {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WalletSummary {
    pub address: Address,
    pub bnb_balance: U256,
    pub bnb_price: Decimal,
    pub tokens: Vec<TokenStatus>,
    /// Tokens plus BNB, in the numeraire.
    pub total_value: Decimal,
    pub total_value_usd: Decimal,
}

impl fmt::Display for WalletSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Wallet {}", self.address)?;
        writeln!(
            f,
            "BNB: {} (${} per BNB)",
            format_token(self.bnb_balance, 18),
            self.bnb_price.round_dp(2)
        )?;
        for t in &self.tokens {
            write!(f, "{t}")?;
        }
        write!(f, "Total: ${}", self.total_value_usd.round_dp(2))
    }
}

/// Entry point for the chat front end. User operations are reached through [`TradeBot::guard`].
pub struct TradeBot<C> {
    services: Arc<Services<C>>,
    admin_chat_id: i64,
    interval: Duration,
    watchers: RwLock<HashMap<Address, Arc<TokenWatcher<C>>>>,
}

impl<C: Chain> TradeBot<C> {
    pub fn new(services: Arc<Services<C>>, admin_chat_id: i64, interval: Duration) -> Self {
        Self {
            services,
            admin_chat_id,
            interval,
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// The user operations, for the configured admin chat only.
    pub fn guard(&self, chat_id: i64) -> Result<Admin<'_, C>, EngineError> {
        if chat_id != self.admin_chat_id {
            warn!(chat_id, "unauthorized access attempt");
            return Err(EngineError::Unauthorized(chat_id));
        }
        Ok(Admin { bot: self })
    }

    /// Start watching every stored token.
    pub async fn start(&self) -> Result<()> {
        let tokens = self.services.store.tokens()?;
        let mut watchers = self.watchers.write().await;
        for token in tokens {
            let orders = self.services.store.orders(token.address)?;
            info!(token = %token.symbol, orders = orders.len(), "watching");
            let watcher = Arc::new(TokenWatcher::new(
                self.services.clone(),
                token.clone(),
                orders,
                self.interval,
            ));
            watcher.start();
            watchers.insert(token.address, watcher);
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.write().await;
        for (_, w) in watchers.drain() {
            w.stop().await;
        }
    }

    async fn watcher(&self, token: Address) -> Result<Arc<TokenWatcher<C>>, EngineError> {
        self.watchers
            .read()
            .await
            .get(&token)
            .cloned()
            .ok_or(EngineError::UnknownToken(token))
    }

    async fn watcher_for_order(&self, id: u64) -> Result<Arc<TokenWatcher<C>>, EngineError> {
        let watchers: Vec<_> = self.watchers.read().await.values().cloned().collect();
        for w in watchers {
            if w.has_order(id).await {
                return Ok(w);
            }
        }
        Err(EngineError::UnknownOrder(id))
    }
}

/// Proof that the caller passed [`TradeBot::guard`]. User operations only
/// exist on this handle.
pub struct Admin<'a, C> {
    bot: &'a TradeBot<C>,
}

impl<C: Chain> Admin<'_, C> {
    pub async fn add_token(
        &self,
        address: Address,
        icon: Option<String>,
        default_slippage: Decimal,
    ) -> Result<TokenRecord> {
        if self.bot.watchers.read().await.contains_key(&address) {
            return Err(EngineError::DuplicateToken(address).into());
        }
        let chain = &self.bot.services.chain;
        let mut token = TokenRecord {
            address,
            symbol: chain.symbol(address).await?,
            icon,
            decimals: chain.decimals(address).await?,
            default_slippage: Decimal::ZERO,
            effective_buy_price: None,
        };
        TokenEdit::DefaultSlippage(default_slippage).apply(&mut token)?;
        self.bot.services.store.insert_token(token.clone())?;
        let watcher = Arc::new(TokenWatcher::new(
            self.bot.services.clone(),
            token.clone(),
            Vec::new(),
            self.bot.interval,
        ));
        watcher.start();
        self.bot.watchers.write().await.insert(address, watcher);
        info!(token = %token.symbol, %address, "token added");
        Ok(token)
    }

    pub async fn edit_token(&self, address: Address, edit: TokenEdit) -> Result<TokenRecord> {
        let watcher = self.bot.watcher(address).await?;
        let mut token = self
            .bot.services
            .store
            .token(address)?
            .ok_or(EngineError::UnknownToken(address))?;
        edit.apply(&mut token)?;
        self.bot.services.store.update_token(&token)?;
        watcher.set_token(token.clone()).await;
        info!(token = %token.symbol, ?edit, "token edited");
        Ok(token)
    }

    /// Stop the token's job, then drop it and its orders.
    pub async fn remove_token(&self, address: Address) -> Result<()> {
        let watcher = self.bot.watcher(address).await?;
        watcher.stop().await;
        self.bot.services.store.delete_token(address)?;
        self.bot.watchers.write().await.remove(&address);
        info!(%address, "token removed");
        Ok(())
    }

    pub async fn create_order(&self, order: NewOrder) -> Result<OrderRecord> {
        order.validate()?;
        let watcher = self.bot.watcher(order.token).await?;
        let record = self.bot.services.store.insert_order(order)?;
        watcher.add_order(record.clone()).await;
        info!(order = record.id, kind = %record.kind(), "order created");
        Ok(record)
    }

    /// Persist first; the live order only changes once the write succeeded.
    pub async fn edit_order(&self, id: u64, edit: OrderEdit) -> Result<OrderRecord> {
        let watcher = self.bot.watcher_for_order(id).await?;
        let store = self.bot.services.store.clone();
        let updated = watcher
            .with_active_order(id, |order| -> Result<OrderRecord> {
                let mut record = order.record().clone();
                edit.apply(&mut record);
                record.validate()?;
                store.update_order(&record)?;
                order.replace_record(record.clone());
                Ok(record)
            })
            .await
            .ok_or(EngineError::UnknownOrder(id))??;
        info!(order = id, ?edit, "order edited");
        Ok(updated)
    }

    pub async fn remove_order(&self, id: u64) -> Result<()> {
        let watcher = self.bot.watcher_for_order(id).await?;
        if !watcher.remove_order(id).await {
            // already settling, settlement deletes the row
            return Err(EngineError::UnknownOrder(id).into());
        }
        self.bot.services.store.delete_order(id)?;
        info!(order = id, "order removed");
        Ok(())
    }

    pub async fn approve(&self, token: Address) -> Result<bool> {
        let record = self.bot.watcher(token).await?.token().await;
        let ok = self.bot.services.executor.approve(token).await?;
        let msg = if ok {
            format!("{} approved for trading", record.name())
        } else {
            format!("Approval of {} failed", record.name())
        };
        self.bot.services.notifier.notify(msg);
        Ok(ok)
    }

    /// Buy with `amount` BNB wei right away. Nothing is persisted.
    pub async fn buy_now(
        &self,
        token: Address,
        amount: U256,
        slippage: Option<Decimal>,
        gas: GasPriceSpec,
    ) -> Result<SwapOutcome> {
        let record = self.bot.watcher(token).await?.token().await;
        let slippage = slippage.unwrap_or(record.default_slippage);
        self.manual_swap(&record, amount, Side::Buy, slippage, gas).await
    }

    /// Sell `amount` token units right away, approving first when needed.
    pub async fn sell_now(
        &self,
        token: Address,
        amount: U256,
        slippage: Option<Decimal>,
        gas: GasPriceSpec,
    ) -> Result<SwapOutcome> {
        let record = self.bot.watcher(token).await?.token().await;
        if !self.bot.services.executor.approve(token).await? {
            self.bot.services
                .notifier
                .notify(format!("Approval of {} failed, sell not sent", record.name()));
            return Ok(SwapOutcome::Rejected(Rejection::NotApproved));
        }
        let slippage = slippage.unwrap_or(record.default_slippage);
        self.manual_swap(&record, amount, Side::Sell, slippage, gas).await
    }

    /// Sell the whole balance at default slippage with a raised gas price.
    pub async fn sell_all(&self, token: Address) -> Result<SwapOutcome> {
        let watcher = self.bot.watcher(token).await?;
        let balance = self
            .bot.services
            .chain
            .token_balance(token, self.bot.services.chain.wallet())
            .await?;
        let gas = SELL_ALL_GAS_OFFSET_GWEI.parse::<GasPriceSpec>()?;
        let outcome = self.sell_now(token, balance, None, gas).await?;
        let pending = watcher.orders().await.len();
        if pending > 0 {
            let record = watcher.token().await;
            self.bot.services.notifier.notify(format!(
                "{} still has {pending} pending order(s)",
                record.name()
            ));
        }
        Ok(outcome)
    }

    async fn manual_swap(
        &self,
        token: &TokenRecord,
        amount: U256,
        side: Side,
        slippage: Decimal,
        gas: GasPriceSpec,
    ) -> Result<SwapOutcome> {
        let outcome = self
            .bot.services
            .executor
            .swap(token.address, amount, side, slippage, &gas)
            .await;
        let msg = match &outcome {
            Ok(SwapOutcome::Success {
                amount_in,
                amount_out,
                tx_hash,
            }) => {
                if side == Side::Buy {
                    if let Err(e) = self.bot.services.record_buy(token, *amount_in, *amount_out).await {
                        warn!(token = %token.symbol, "cost basis not updated: {e:#}");
                    }
                }
                format!(
                    "{}: {}. Tx {tx_hash}",
                    token.name(),
                    describe_fill(side, token, *amount_in, *amount_out)
                )
            }
            Ok(SwapOutcome::Reverted { tx_hash }) => {
                format!("{} {side} reverted. Tx {tx_hash}", token.name())
            }
            Ok(SwapOutcome::TimedOut { tx_hash }) => {
                format!("{} {side} sent but not confirmed in time. Tx {tx_hash}", token.name())
            }
            Ok(SwapOutcome::Rejected(reason)) => {
                format!("{} {side} not sent: {reason}", token.name())
            }
            Err(e) => format!("{} {side} failed: {e}", token.name()),
        };
        info!("{msg}");
        self.bot.services.notifier.notify(msg);
        outcome
    }

    pub async fn status(&self, token: Address) -> Result<TokenStatus> {
        let watcher = self.bot.watcher(token).await?;
        let record = match self.bot.services.store.token(token)? {
            Some(t) => t,
            None => watcher.token().await,
        };
        let oracle = &self.bot.services.oracle;
        let numeraire = oracle.numeraire();
        let quote = oracle.token_price(token).await?;
        let price_usd = oracle.token_price_usd(token).await?;
        let balance = self
            .bot.services
            .chain
            .token_balance(token, self.bot.services.chain.wallet())
            .await?;
        let held = to_human(balance, record.decimals);
        let basis_change = record
            .effective_buy_price
            .filter(|b| !b.is_zero() && !quote.price.is_zero())
            .map(|b| quote.price / b - Decimal::ONE);
        let orders = watcher
            .orders()
            .await
            .into_iter()
            .map(|(o, extremum)| {
                let mut line = o.describe(&record, numeraire);
                if let Some(x) = extremum {
                    line.push_str(&format!(" (armed, extremum {})", format_price(x)));
                }
                line
            })
            .collect();
        Ok(TokenStatus {
            numeraire,
            price: quote.price,
            price_usd,
            quote_used: quote.lp.map(|lp| {
                let base = if lp.base == pancakes::pancake::WBNB {
                    "WBNB"
                } else if lp.base == pancakes::pancake::BUSD {
                    "BUSD"
                } else {
                    "USDT"
                };
                format!("{} {base}", lp.version.as_str())
            }),
            balance,
            value: quote.price.saturating_mul(held),
            value_usd: price_usd.saturating_mul(held),
            basis_change,
            orders,
            last_message_id: watcher.last_status_message().await,
            token: record,
        })
    }

    /// Remember which front-end message shows this token's status.
    pub async fn set_status_message(&self, token: Address, message_id: Option<i64>) -> Result<()> {
        self.bot.watcher(token).await?.set_last_status_message(message_id).await;
        Ok(())
    }

    pub async fn wallet_summary(&self) -> Result<WalletSummary> {
        let chain = &self.bot.services.chain;
        let oracle = &self.bot.services.oracle;
        let address = chain.wallet();
        let bnb_balance = chain.native_balance(address).await?;
        let bnb_price = oracle.bnb_price().await?;
        let bnb = to_human(bnb_balance, 18);

        let mut addresses: Vec<_> = self.bot.watchers.read().await.keys().copied().collect();
        addresses.sort();
        let mut tokens = Vec::with_capacity(addresses.len());
        for a in addresses {
            match self.status(a).await {
                Ok(s) => tokens.push(s),
                Err(e) => warn!(token = %a, "status unavailable: {e:#}"),
            }
        }
        let tokens_usd: Decimal = tokens.iter().map(|t| t.value_usd).sum();
        let total_value_usd = tokens_usd + bnb.saturating_mul(bnb_price);
        let total_value = match oracle.numeraire() {
            Numeraire::Usd => total_value_usd,
            Numeraire::Bnb => total_value_usd / bnb_price,
        };
        Ok(WalletSummary {
            address,
            bnb_balance,
            bnb_price,
            tokens,
            total_value,
            total_value_usd,
        })
    }
}
