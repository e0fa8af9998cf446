use {
    crate::libs::{
        error::EngineError,
        price::Numeraire,
        route::Side,
        tx::GasPriceSpec,
        writing::format_price,
    },
    alloy::primitives::{Address, U256},
    chrono::{DateTime, Utc},
    pancakes::pancake::pancake_swap_v2::format_token,
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub address: Address,
    pub symbol: String,
    pub icon: Option<String>,
    pub decimals: u8,
    /// Percent.
    pub default_slippage: Decimal,
    /// Average cost of the held amount, in the numeraire.
    pub effective_buy_price: Option<Decimal>,
}

impl TokenRecord {
    pub fn name(&self) -> String {
        match &self.icon {
            Some(icon) => format!("{icon} {}", self.symbol),
            None => self.symbol.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    LimitBuy,
    BuyStop,
    StopLoss,
    TakeProfit,
}

impl OrderKind {
    pub fn of(side: Side, above: bool) -> Self {
        match (side, above) {
            (Side::Buy, false) => OrderKind::LimitBuy,
            (Side::Buy, true) => OrderKind::BuyStop,
            (Side::Sell, false) => OrderKind::StopLoss,
            (Side::Sell, true) => OrderKind::TakeProfit,
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderKind::LimitBuy => "Limit buy",
            OrderKind::BuyStop => "Buy stop",
            OrderKind::StopLoss => "Stop loss",
            OrderKind::TakeProfit => "Take profit",
        })
    }
}

/// Order fields as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub token: Address,
    pub side: Side,
    pub above: bool,
    /// `None` executes at the first price seen.
    pub limit_price: Option<Decimal>,
    /// Callback percentage.
    pub trailing_stop: Option<u16>,
    /// BNB wei for buys, token units for sells.
    pub amount: U256,
    pub slippage: Decimal,
    #[serde(default)]
    pub gas_price: GasPriceSpec,
}

impl NewOrder {
    pub fn market(token: Address, side: Side, amount: U256, slippage: Decimal) -> Self {
        Self {
            token,
            side,
            above: side.is_sell(),
            limit_price: None,
            trailing_stop: None,
            amount,
            slippage,
            gas_price: GasPriceSpec::Network,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_fields(
            self.limit_price,
            self.trailing_stop,
            self.amount,
            self.slippage,
        )
    }
}

fn validate_fields(
    limit_price: Option<Decimal>,
    trailing_stop: Option<u16>,
    amount: U256,
    slippage: Decimal,
) -> Result<(), EngineError> {
    if limit_price.is_some_and(|p| p <= Decimal::ZERO) {
        return Err(EngineError::InvalidOrder("limit price must be positive".into()));
    }
    if trailing_stop.is_some_and(|t| t == 0 || t >= 100) {
        return Err(EngineError::InvalidOrder("trailing stop must be within 1..99%".into()));
    }
    if amount.is_zero() {
        return Err(EngineError::InvalidOrder("amount must be positive".into()));
    }
    if slippage < Decimal::ZERO || slippage >= Decimal::ONE_HUNDRED {
        return Err(EngineError::InvalidOrder("slippage must be within 0..100%".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: u64,
    pub token: Address,
    pub side: Side,
    pub above: bool,
    pub limit_price: Option<Decimal>,
    pub trailing_stop: Option<u16>,
    pub amount: U256,
    pub slippage: Decimal,
    #[serde(default)]
    pub gas_price: GasPriceSpec,
    pub created: DateTime<Utc>,
}

impl OrderRecord {
    pub fn from_new(id: u64, order: NewOrder) -> Self {
        Self {
            id,
            token: order.token,
            side: order.side,
            above: order.above,
            limit_price: order.limit_price,
            trailing_stop: order.trailing_stop,
            amount: order.amount,
            slippage: order.slippage,
            gas_price: order.gas_price,
            created: Utc::now(),
        }
    }

    pub fn kind(&self) -> OrderKind {
        OrderKind::of(self.side, self.above)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_fields(
            self.limit_price,
            self.trailing_stop,
            self.amount,
            self.slippage,
        )
    }

    /// Notice sent when the order fires.
    pub fn trigger_label(&self) -> String {
        if self.trailing_stop.is_some() {
            "Trailing stop loss triggered".to_string()
        } else {
            format!("{} triggered", self.kind())
        }
    }

    /// One line, e.g. `#4 Take profit >= 0.0002 BNB, 1000 CAKE, trailing 5%`.
    pub fn describe(&self, token: &TokenRecord, numeraire: Numeraire) -> String {
        let cmp = if self.above { ">=" } else { "<=" };
        let limit = match self.limit_price {
            Some(p) => format!("{cmp} {} {}", format_price(p), numeraire.symbol()),
            None => "at market".to_string(),
        };
        let amount = match self.side {
            Side::Buy => format!("{} BNB", format_token(self.amount, 18)),
            Side::Sell => format!("{} {}", format_token(self.amount, token.decimals as u32), token.symbol),
        };
        let kind = match self.trailing_stop {
            Some(_) => format!("Trailing {}", self.kind().to_string().to_lowercase()),
            None => self.kind().to_string(),
        };
        let mut line = format!("#{} {kind} {limit}, {amount}", self.id);
        if let Some(t) = self.trailing_stop {
            line.push_str(&format!(", trailing {t}%"));
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEdit {
    Icon(Option<String>),
    DefaultSlippage(Decimal),
}

impl TokenEdit {
    pub fn apply(&self, token: &mut TokenRecord) -> Result<(), EngineError> {
        match self {
            TokenEdit::Icon(icon) => token.icon = icon.clone(),
            TokenEdit::DefaultSlippage(s) => {
                if *s < Decimal::ZERO || *s >= Decimal::ONE_HUNDRED {
                    return Err(EngineError::InvalidOrder(
                        "slippage must be within 0..100%".into(),
                    ));
                }
                token.default_slippage = *s;
            }
        }
        Ok(())
    }
}

/// A single-field change to a live order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEdit {
    LimitPrice(Option<Decimal>),
    TrailingStop(Option<u16>),
    Amount(U256),
    Slippage(Decimal),
    GasPrice(GasPriceSpec),
}

impl OrderEdit {
    pub fn apply(&self, order: &mut OrderRecord) {
        match self {
            OrderEdit::LimitPrice(p) => order.limit_price = *p,
            OrderEdit::TrailingStop(t) => order.trailing_stop = *t,
            OrderEdit::Amount(a) => order.amount = *a,
            OrderEdit::Slippage(s) => order.slippage = *s,
            OrderEdit::GasPrice(g) => order.gas_price = *g,
        }
    }
}
