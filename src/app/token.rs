use {
    crate::{
        app::{
            models::{OrderRecord, TokenRecord},
            order::OrderWatcher,
            services::Services,
        },
        libs::{bsc::Chain, route::Side},
    },
    std::{
        sync::{Arc, Mutex as StdMutex, PoisonError},
        time::Duration,
    },
    tokio::{
        sync::Mutex,
        task::JoinHandle,
        time::{interval, MissedTickBehavior},
    },
    tracing::{debug, warn},
};

/// A token's live state, guarded by the watcher's lock for the whole of a tick.
pub struct WatchedToken<C> {
    pub token: TokenRecord,
    pub orders: Vec<OrderWatcher<C>>,
    /// Handle of the last status message shown for this token, owned by the front end.
    pub last_status_message_id: Option<i64>,
    /// Ticks run so far.
    pub ticks: u64,
}

pub struct TokenWatcher<C> {
    inner: Arc<Mutex<WatchedToken<C>>>,
    services: Arc<Services<C>>,
    every: Duration,
    job: StdMutex<Option<JoinHandle<()>>>,
}

impl<C: Chain> TokenWatcher<C> {
    pub fn new(
        services: Arc<Services<C>>,
        token: TokenRecord,
        orders: Vec<OrderRecord>,
        every: Duration,
    ) -> Self {
        let orders = orders
            .into_iter()
            .map(|o| OrderWatcher::new(o, token.clone(), services.clone()))
            .collect();
        Self {
            inner: Arc::new(Mutex::new(WatchedToken {
                token,
                orders,
                last_status_message_id: None,
                ticks: 0,
            })),
            services,
            every,
            job: StdMutex::new(None),
        }
    }

    /// Start the recurring price job. Overrunning ticks are skipped, not queued.
    pub fn start(&self) {
        let mut job = self.job.lock().unwrap_or_else(PoisonError::into_inner);
        if job.is_some() {
            return;
        }
        let inner = self.inner.clone();
        let services = self.services.clone();
        let every = self.every;
        *job = Some(tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let mut watched = inner.lock().await;
                run_tick(&mut watched, &services).await;
            }
        }));
    }

    /// Stop the job; a tick in progress is cancelled at its next await point.
    pub async fn stop(&self) {
        let job = self.job.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(job) = job {
            job.abort();
            let _ = job.await;
        }
    }

    /// Run one tick now, outside the timer.
    pub async fn tick(&self) {
        let mut watched = self.inner.lock().await;
        run_tick(&mut watched, &self.services).await;
    }

    pub async fn ticks(&self) -> u64 {
        self.inner.lock().await.ticks
    }

    pub async fn token(&self) -> TokenRecord {
        self.inner.lock().await.token.clone()
    }

    pub async fn set_token(&self, token: TokenRecord) {
        let mut watched = self.inner.lock().await;
        for order in watched.orders.iter_mut() {
            order.set_token(token.clone());
        }
        watched.token = token;
    }

    pub async fn add_order(&self, record: OrderRecord) {
        let mut watched = self.inner.lock().await;
        let order = OrderWatcher::new(record, watched.token.clone(), self.services.clone());
        watched.orders.push(order);
    }

    pub async fn has_order(&self, id: u64) -> bool {
        self.inner.lock().await.orders.iter().any(|o| o.id() == id)
    }

    /// Run `f` on the live order with `id`, if it is still open.
    pub async fn with_active_order<R>(
        &self,
        id: u64,
        f: impl FnOnce(&mut OrderWatcher<C>) -> R,
    ) -> Option<R> {
        let mut watched = self.inner.lock().await;
        watched
            .orders
            .iter_mut()
            .find(|o| o.id() == id && o.is_active())
            .map(f)
    }

    /// Drop an open order from the live set. Orders already settling stay.
    pub async fn remove_order(&self, id: u64) -> bool {
        let mut watched = self.inner.lock().await;
        let before = watched.orders.len();
        watched.orders.retain(|o| o.id() != id || !o.is_active());
        watched.orders.len() != before
    }

    pub async fn orders(&self) -> Vec<(OrderRecord, Option<rust_decimal::Decimal>)> {
        let watched = self.inner.lock().await;
        watched
            .orders
            .iter()
            .filter(|o| o.is_active())
            .map(|o| (o.record().clone(), o.extremum()))
            .collect()
    }

    pub async fn last_status_message(&self) -> Option<i64> {
        self.inner.lock().await.last_status_message_id
    }

    pub async fn set_last_status_message(&self, id: Option<i64>) {
        self.inner.lock().await.last_status_message_id = id;
    }

    #[cfg(test)]
    pub async fn join_settlements(&self) {
        let handles: Vec<_> = {
            let mut watched = self.inner.lock().await;
            watched.orders.iter_mut().filter_map(|o| o.take_settlement()).collect()
        };
        for h in handles {
            let _ = h.await;
        }
    }
}

async fn run_tick<C: Chain>(watched: &mut WatchedToken<C>, services: &Services<C>) {
    watched.ticks += 1;
    let address = watched.token.address;
    match services.store.token(address) {
        Ok(Some(stored)) => watched.token.effective_buy_price = stored.effective_buy_price,
        Ok(None) => {}
        Err(e) => warn!(token = %watched.token.symbol, "could not reload token: {e:#}"),
    }

    if !watched.orders.iter().any(|o| o.is_active()) {
        watched.orders.retain(|o| !o.is_finished());
        return;
    }

    let quote = match services.oracle.token_price(address).await {
        Ok(q) => q,
        Err(e) => {
            warn!(token = %watched.token.symbol, "price lookup failed: {e:#}");
            return;
        }
    };
    if quote.price.is_zero() {
        debug!(token = %watched.token.symbol, "no price yet");
        return;
    }

    let wants_sell = watched
        .orders
        .iter()
        .any(|o| o.is_active() && o.side() == Side::Sell);
    let can_sell = !wants_sell || ensure_approved(&watched.token, services).await;

    for order in watched.orders.iter_mut() {
        if order.side() == Side::Sell && !can_sell {
            continue;
        }
        order.on_price(quote.price);
    }
    watched.orders.retain(|o| !o.is_finished());
}

async fn ensure_approved<C: Chain>(token: &TokenRecord, services: &Services<C>) -> bool {
    match services.executor.is_approved(token.address).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => {
            warn!(token = %token.symbol, "allowance check failed: {e:#}");
            return false;
        }
    }
    match services.executor.approve(token.address).await {
        Ok(true) => {
            services
                .notifier
                .notify(format!("{} approved for trading", token.name()));
            true
        }
        Ok(false) => {
            services
                .notifier
                .notify(format!("Approval of {} failed, will retry", token.name()));
            false
        }
        Err(e) => {
            warn!(token = %token.symbol, "approval failed: {e:#}");
            false
        }
    }
}
