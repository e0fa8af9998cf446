use {
    crate::{
        constants::{BNB_PRICE_TTL, LP_TTL, PRICE_TTL},
        libs::bsc::Chain,
    },
    alloy::primitives::{Address, U256},
    anyhow::{bail, Result},
    moka::future::Cache,
    pancakes::{
        pancake::{is_stable, Version, BASE_TOKENS, BUSD, WBNB},
        plug::{normalize_18, ratio_to_decimal, to_human},
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
    tracing::debug,
};

/// Unit prices are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Numeraire {
    Bnb,
    Usd,
}

impl Numeraire {
    pub fn symbol(self) -> &'static str {
        match self {
            Numeraire::Bnb => "BNB",
            Numeraire::Usd => "$",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub numeraire: Numeraire,
    pub min_pool_size_bnb: Decimal,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            numeraire: Numeraire::Bnb,
            min_pool_size_bnb: Decimal::from(25),
        }
    }
}

/// A pool pairing a token with one of the base tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lp {
    pub pair: Address,
    pub base: Address,
    pub version: Version,
}

/// Price of one whole token in the configured numeraire. Zero means unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: Decimal,
    pub lp: Option<Lp>,
}

impl Quote {
    pub const UNKNOWN: Quote = Quote {
        price: Decimal::ZERO,
        lp: None,
    };
}

#[derive(Debug, Clone, Copy)]
struct PoolState {
    /// Token side reserve, 18 decimals.
    token_reserve: U256,
    /// Base side value in BNB.
    depth_bnb: Decimal,
    price_bnb: Decimal,
}

pub struct PriceOracle<C> {
    chain: Arc<C>,
    settings: OracleSettings,
    prices: Cache<Address, Quote>,
    lps: Cache<Address, Vec<Lp>>,
    bnb: Cache<(), Decimal>,
}

impl<C: Chain> PriceOracle<C> {
    pub fn new(chain: Arc<C>, settings: OracleSettings) -> Self {
        Self {
            chain,
            settings,
            prices: Cache::builder()
                .time_to_live(PRICE_TTL)
                .max_capacity(1000)
                .build(),
            lps: Cache::builder()
                .time_to_live(LP_TTL)
                .max_capacity(1000)
                .build(),
            bnb: Cache::builder().time_to_live(BNB_PRICE_TTL).max_capacity(1).build(),
        }
    }

    pub fn numeraire(&self) -> Numeraire {
        self.settings.numeraire
    }

    /// USD per BNB from the v2 BUSD/WBNB pool.
    pub async fn bnb_price(&self) -> Result<Decimal> {
        if let Some(p) = self.bnb.get(&()).await {
            return Ok(p);
        }
        let Some(pair) = self.chain.get_pair(Version::V2.factory(), BUSD, WBNB).await? else {
            bail!("BUSD/WBNB pool not found");
        };
        let busd = self.chain.token_balance(BUSD, pair).await?;
        let wbnb = self.chain.token_balance(WBNB, pair).await?;
        let price = ratio_to_decimal(busd, wbnb);
        if price.is_zero() {
            bail!("BUSD/WBNB pool is empty");
        }
        self.bnb.insert((), price).await;
        Ok(price)
    }

    /// Price of `token` in the numeraire, with the pool it came from.
    pub async fn token_price(&self, token: Address) -> Result<Quote> {
        if let Some(q) = self.prices.get(&token).await {
            return Ok(q);
        }
        let quote = match self.price_bnb(token).await? {
            Some((price_bnb, lp)) => Quote {
                price: self.bnb_to_numeraire(price_bnb).await?,
                lp,
            },
            None => Quote::UNKNOWN,
        };
        self.prices.insert(token, quote).await;
        Ok(quote)
    }

    /// Token price in USD regardless of the numeraire.
    pub async fn token_price_usd(&self, token: Address) -> Result<Decimal> {
        let q = self.token_price(token).await?;
        match self.settings.numeraire {
            Numeraire::Usd => Ok(q.price),
            Numeraire::Bnb => Ok(q.price.saturating_mul(self.bnb_price().await?)),
        }
    }

    /// Numeraire price converted to BNB.
    pub async fn numeraire_to_bnb(&self, price: Decimal) -> Result<Decimal> {
        match self.settings.numeraire {
            Numeraire::Bnb => Ok(price),
            Numeraire::Usd => Ok(price / self.bnb_price().await?),
        }
    }

    /// BNB price converted to the numeraire.
    pub async fn bnb_to_numeraire(&self, price_bnb: Decimal) -> Result<Decimal> {
        match self.settings.numeraire {
            Numeraire::Bnb => Ok(price_bnb),
            Numeraire::Usd => Ok(price_bnb.saturating_mul(self.bnb_price().await?)),
        }
    }

    /// Pools pairing `token` with a base token across both factory generations.
    pub async fn find_lps(&self, token: Address) -> Result<Vec<Lp>> {
        if let Some(lps) = self.lps.get(&token).await {
            return Ok(lps);
        }
        let mut lps = Vec::new();
        for version in Version::ALL {
            for base in BASE_TOKENS {
                if base == token {
                    continue;
                }
                if let Some(pair) = self.chain.get_pair(version.factory(), token, base).await? {
                    lps.push(Lp { pair, base, version });
                }
            }
        }
        // absent pools may still be created, only remember hits
        if !lps.is_empty() {
            self.lps.insert(token, lps.clone()).await;
        }
        Ok(lps)
    }

    async fn price_bnb(&self, token: Address) -> Result<Option<(Decimal, Option<Lp>)>> {
        if token == WBNB {
            return Ok(Some((Decimal::ONE, None)));
        }
        let mut deepest: Option<(PoolState, Lp)> = None;
        let mut best: Option<(PoolState, Lp)> = None;
        for lp in self.find_lps(token).await? {
            let Some(state) = self.pool_state(token, lp).await? else {
                continue;
            };
            let bigger = |cur: &Option<(PoolState, Lp)>| {
                cur.as_ref()
                    .is_none_or(|(s, _)| state.token_reserve > s.token_reserve)
            };
            if bigger(&deepest) {
                deepest = Some((state, lp));
            }
            if state.depth_bnb >= self.settings.min_pool_size_bnb && bigger(&best) {
                best = Some((state, lp));
            }
        }
        let chosen = match (best, deepest) {
            (Some(b), _) => Some(b),
            (None, Some(d)) => {
                debug!(%token, pair = %d.1.pair, "no pool above minimum size, using the deepest one");
                Some(d)
            }
            (None, None) => None,
        };
        Ok(chosen.map(|(s, lp)| (s.price_bnb, Some(lp))))
    }

    async fn pool_state(&self, token: Address, lp: Lp) -> Result<Option<PoolState>> {
        let token_decimals = self.chain.decimals(token).await?;
        let base_decimals = self.chain.decimals(lp.base).await?;
        let token_reserve = normalize_18(self.chain.token_balance(token, lp.pair).await?, token_decimals);
        let base_reserve = normalize_18(self.chain.token_balance(lp.base, lp.pair).await?, base_decimals);
        if token_reserve.is_zero() || base_reserve.is_zero() {
            return Ok(None);
        }
        let mut price_bnb = ratio_to_decimal(base_reserve, token_reserve);
        let mut depth_bnb = to_human(base_reserve, 18);
        if is_stable(lp.base) {
            let bnb = self.bnb_price().await?;
            price_bnb /= bnb;
            depth_bnb /= bnb;
        }
        Ok(Some(PoolState {
            token_reserve,
            depth_bnb,
            price_bnb,
        }))
    }
}
