use {
    super::chain::{Chain, TxReceipt},
    crate::{constants::BSC_CHAIN_ID, libs::config::Config},
    alloy::{
        eips::eip2718::Encodable2718,
        network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
        primitives::{Address, B256, U256},
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::{client::RpcClient, types::TransactionRequest},
        signers::{local::PrivateKeySigner, Signer},
        transports::http::Http,
    },
    anyhow::{Context, Result},
    async_trait::async_trait,
    dashmap::DashMap,
    pancakes::pancake::pancake_swap_v2::{IERC20, IPancakeFactory, IPancakeRouter02},
    reqwest::Client as HttpClient,
    serde_json::Value,
    std::str::FromStr,
    tracing::debug,
    url::Url,
};

/// JSON-RPC client bound to one wallet key.
#[derive(Clone)]
pub struct ChainClient {
    rpc_url: Url,
    http: HttpClient,
    auth: Option<(String, String)>,
    provider: DynProvider,
    wallet: EthereumWallet,
    address: Address,
    decimals: DashMap<Address, u8>,
    symbols: DashMap<Address, String>,
}

impl ChainClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let rpc_url =
            Url::parse(&cfg.bsc_rpc).with_context(|| format!("Failed to parse BSC_RPC: {}", cfg.bsc_rpc))?;
        let signer = PrivateKeySigner::from_str(cfg.private_key.trim())
            .context("PRIVATE_KEY did not contain a valid hex encoded secret")?
            .with_chain_id(Some(*BSC_CHAIN_ID));
        let address = signer.address();

        let auth = cfg.rpc_auth_user.clone().zip(cfg.rpc_auth_password.clone());
        let mut transport_url = rpc_url.clone();
        if let Some((user, password)) = &auth {
            // reqwest turns URL credentials into a basic auth header
            transport_url
                .set_username(user)
                .map_err(|_| anyhow::anyhow!("BSC_RPC cannot carry credentials"))?;
            transport_url
                .set_password(Some(password))
                .map_err(|_| anyhow::anyhow!("BSC_RPC cannot carry credentials"))?;
        }

        let http = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;
        let transport = Http::with_client(http.clone(), transport_url);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(RpcClient::new(transport, false))
            .erased();

        Ok(Self {
            rpc_url,
            http,
            auth,
            provider,
            wallet: EthereumWallet::from(signer),
            address,
            decimals: DashMap::new(),
            symbols: DashMap::new(),
        })
    }

    /// Numeric chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64> {
        let res = self.raw_call("eth_chainId", Vec::new()).await?;
        let hex = res.as_str().context("chainId not string")?;
        u64::from_str_radix(hex.trim_start_matches("0x"), 16).context("bad chainId hex")
    }

    /// Arbitrary JSON-RPC call for methods without a typed wrapper.
    pub async fn raw_call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": Value::Array(params),
        });
        let mut req = self.http.post(self.rpc_url.as_str()).json(&body);
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }
        let res = req.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?;
        let v: Value = match serde_json::from_slice(&bytes) {
            Ok(json) => json,
            Err(e) => {
                let mut sample = String::from_utf8_lossy(&bytes).to_string();
                if sample.len() > 512 {
                    sample.truncate(512);
                }
                let hint = if sample.trim_start().starts_with('<') {
                    "Response looks like HTML; BSC_RPC may be a gateway page or blocked. Use an HTTPS JSON-RPC endpoint."
                } else if sample.trim().is_empty() {
                    "Empty body from RPC. Endpoint may be down or require authentication."
                } else {
                    "Non-JSON response from RPC."
                };
                anyhow::bail!(
                    "RPC decode error ({status}): {e}. {hint}\nEndpoint: {}\nSample: {}",
                    self.rpc_url,
                    sample
                );
            }
        };
        if let Some(err) = v.get("error") {
            anyhow::bail!("rpc error: {}", err);
        }
        Ok(v.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn is_revert(err: &alloy::contract::Error) -> bool {
    err.as_revert_data().is_some() || err.to_string().to_lowercase().contains("revert")
}

#[async_trait]
impl Chain for ChainClient {
    fn wallet(&self) -> Address {
        self.address
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        Ok(self.provider.get_balance(owner).await?)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let erc20 = IERC20::new(token, &self.provider);
        erc20
            .balanceOf(owner)
            .call()
            .await
            .with_context(|| format!("balanceOf({owner}) on {token}"))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        if let Some(d) = self.decimals.get(&token) {
            return Ok(*d);
        }
        let d = IERC20::new(token, &self.provider)
            .decimals()
            .call()
            .await
            .with_context(|| format!("decimals() on {token}"))?;
        self.decimals.insert(token, d);
        Ok(d)
    }

    async fn symbol(&self, token: Address) -> Result<String> {
        if let Some(s) = self.symbols.get(&token) {
            return Ok(s.clone());
        }
        let s = IERC20::new(token, &self.provider)
            .symbol()
            .call()
            .await
            .with_context(|| format!("symbol() on {token}"))?;
        self.symbols.insert(token, s.clone());
        Ok(s)
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        IERC20::new(token, &self.provider)
            .allowance(owner, spender)
            .call()
            .await
            .with_context(|| format!("allowance() on {token}"))
    }

    async fn get_pair(&self, factory: Address, a: Address, b: Address) -> Result<Option<Address>> {
        let pair = IPancakeFactory::new(factory, &self.provider)
            .getPair(a, b)
            .call()
            .await
            .with_context(|| format!("getPair({a}, {b}) on {factory}"))?;
        Ok((!pair.is_zero()).then_some(pair))
    }

    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Option<Vec<U256>>> {
        let router = IPancakeRouter02::new(router, &self.provider);
        match router.getAmountsOut(amount_in, path.to_vec()).call().await {
            Ok(amounts) => Ok(Some(amounts)),
            Err(err) if is_revert(&err) => {
                debug!(?path, "getAmountsOut reverted: {err}");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn pending_nonce(&self, owner: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(owner).pending().await?)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
        let envelope = tx
            .with_from(self.address)
            .with_chain_id(*BSC_CHAIN_ID)
            .build(&self.wallet)
            .await
            .context("failed to sign transaction")?;
        let raw = envelope.encoded_2718();
        let pending = self.provider.send_raw_transaction(&raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            return Ok(None);
        };
        Ok(Some(TxReceipt {
            success: receipt.status(),
            logs: receipt.inner.logs().iter().map(|l| l.inner.clone()).collect(),
        }))
    }
}
