use {
    anyhow::{bail, Context, Result},
    dotenv::dotenv,
    rust_decimal::Decimal,
    std::{fmt::Debug, path::PathBuf, str::FromStr, time::Duration},
};

pub fn load_env() {
    dotenv().ok();
}

#[derive(Clone)]
pub struct Config {
    pub bsc_rpc: String,
    pub private_key: String,
    pub rpc_auth_user: Option<String>,
    pub rpc_auth_password: Option<String>,
    pub admin_chat_id: i64,
    /// Pools holding less than this much BNB-equivalent are ignored for pricing.
    pub min_pool_size_bnb: Decimal,
    /// Ratio, e.g. 0.05 for 5%.
    pub max_price_impact: Decimal,
    pub monitor_interval: Duration,
    pub price_in_usd: bool,
    pub store_path: PathBuf,
}

impl Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bsc_rpc", &self.bsc_rpc)
            .field("rpc_auth_user", &self.rpc_auth_user)
            .field("admin_chat_id", &self.admin_chat_id)
            .field("min_pool_size_bnb", &self.min_pool_size_bnb)
            .field("max_price_impact", &self.max_price_impact)
            .field("monitor_interval", &self.monitor_interval)
            .field("price_in_usd", &self.price_in_usd)
            .field("store_path", &self.store_path)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        load_env();
        let private_key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY is not set")?;
        validate_private_key(&private_key)?;
        let admin_chat_id = std::env::var("ADMIN_CHAT_ID")
            .context("ADMIN_CHAT_ID is not set")?
            .trim()
            .parse::<i64>()
            .context("ADMIN_CHAT_ID must be an integer")?;

        let rpc_auth_user = non_empty_var("RPC_AUTH_USER");
        let rpc_auth_password = non_empty_var("RPC_AUTH_PASSWORD");
        if rpc_auth_user.is_some() != rpc_auth_password.is_some() {
            bail!("RPC_AUTH_USER and RPC_AUTH_PASSWORD must be set together");
        }

        let interval_secs = Self::get_var_t::<f64>("MONITOR_INTERVAL", 5.0);
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            bail!("MONITOR_INTERVAL must be a positive number of seconds");
        }

        let cfg = Self {
            bsc_rpc: std::env::var("BSC_RPC")
                .unwrap_or_else(|_| "https://bsc-dataseed.binance.org".to_string()),
            private_key,
            rpc_auth_user,
            rpc_auth_password,
            admin_chat_id,
            min_pool_size_bnb: Self::get_var_t("MIN_POOL_SIZE_BNB", Decimal::from(25)),
            max_price_impact: Self::get_var_t("MAX_PRICE_IMPACT", Decimal::new(5, 2)),
            monitor_interval: Duration::from_secs_f64(interval_secs),
            price_in_usd: Self::get_var_t("PRICE_IN_USD", false),
            store_path: PathBuf::from(
                std::env::var("STORE_PATH").unwrap_or_else(|_| "user_data/orders.json".to_string()),
            ),
        };
        if cfg.max_price_impact <= Decimal::ZERO {
            bail!("MAX_PRICE_IMPACT must be positive");
        }
        Ok(cfg)
    }

    /// Parse env var to T; fall back to typed default.
    pub fn get_var_t<T>(key: &str, default: T) -> T
    where
        T: FromStr,
        <T as FromStr>::Err: Debug,
    {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn validate_private_key(pk: &str) -> Result<()> {
    match hex::decode(pk.trim().trim_start_matches("0x")) {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => bail!("PRIVATE_KEY must be 64 hexadecimal characters"),
    }
}
