use {
    crate::libs::{bsc::Chain, error::Rejection, price::PriceOracle},
    alloy::primitives::{Address, U256},
    anyhow::Result,
    futures_util::future::join_all,
    pancakes::{
        pancake::pancake_swap_v2::{candidate_paths, PANCAKE_V2_ROUTER},
        plug::{fair_amount_out, normalize_18, price_impact},
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::{fmt, sync::Arc},
};

/// Trade direction, always against BNB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_sell(self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: Vec<Address>,
    pub amount_out: U256,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

pub struct Router<C> {
    chain: Arc<C>,
    oracle: Arc<PriceOracle<C>>,
}

impl<C: Chain> Router<C> {
    pub fn new(chain: Arc<C>, oracle: Arc<PriceOracle<C>>) -> Self {
        Self { chain, oracle }
    }

    pub fn router_address(&self) -> Address {
        PANCAKE_V2_ROUTER
    }

    /// Path with the largest quoted output. Reverting quotes are dropped;
    /// if all of them revert the result is [`Rejection::NoViableRoute`].
    pub async fn best_path(&self, token: Address, amount_in: U256, side: Side) -> Result<Route> {
        let router = self.router_address();
        let paths = candidate_paths(token, side.is_sell());
        let quotes = join_all(
            paths
                .iter()
                .map(|path| self.chain.amounts_out(router, amount_in, path)),
        )
        .await;

        let mut best: Option<Route> = None;
        for (path, quote) in paths.into_iter().zip(quotes) {
            let Some(amount_out) = quote?.and_then(|amounts| amounts.last().copied()) else {
                continue;
            };
            if amount_out.is_zero() {
                continue;
            }
            if best.as_ref().is_none_or(|b| amount_out > b.amount_out) {
                best = Some(Route { path, amount_out });
            }
        }
        best.ok_or_else(|| Rejection::NoViableRoute.into())
    }

    /// Depth-driven share of the fair output lost when trading `amount_in`.
    /// `price` is in the oracle's numeraire; both it and `route` are looked up
    /// when absent.
    pub async fn price_impact(
        &self,
        token: Address,
        amount_in: U256,
        side: Side,
        price: Option<Decimal>,
        route: Option<&Route>,
    ) -> Result<Decimal> {
        let price = match price {
            Some(p) => p,
            None => self.oracle.token_price(token).await?.price,
        };
        let price_bnb = self.oracle.numeraire_to_bnb(price).await?;
        if price_bnb <= Decimal::ZERO {
            return Ok(Decimal::ONE);
        }
        let owned;
        let route = match route {
            Some(r) => r,
            None => {
                owned = self.best_path(token, amount_in, side).await?;
                &owned
            }
        };
        let token_decimals = self.chain.decimals(token).await?;
        let (decimals_in, decimals_out) = match side {
            Side::Sell => (token_decimals, 18),
            Side::Buy => (18, token_decimals),
        };
        let fair = fair_amount_out(amount_in, price_bnb, side.is_sell(), decimals_in);
        let actual = normalize_18(route.amount_out, decimals_out);
        Ok(price_impact(fair, actual, route.hops()))
    }
}
