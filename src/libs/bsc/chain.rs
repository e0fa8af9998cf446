use {
    alloy::{
        primitives::{Address, Log, B256, U256},
        rpc::types::TransactionRequest,
    },
    anyhow::Result,
    async_trait::async_trait,
};

/// Mined transaction as seen by the engine.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub success: bool,
    pub logs: Vec<Log>,
}

/// Everything the engine needs from the chain, for one wallet.
#[async_trait]
pub trait Chain: Send + Sync + 'static {
    /// Address of the signing wallet.
    fn wallet(&self) -> Address;

    async fn native_balance(&self, owner: Address) -> Result<U256>;
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    async fn decimals(&self, token: Address) -> Result<u8>;
    async fn symbol(&self, token: Address) -> Result<String>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// Pair address from `factory`, `None` when the pair was never created.
    async fn get_pair(&self, factory: Address, a: Address, b: Address) -> Result<Option<Address>>;

    /// `getAmountsOut` on `router`. A reverted quote (no liquidity) is `None`.
    async fn amounts_out(
        &self,
        router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Option<Vec<U256>>>;

    async fn gas_price(&self) -> Result<u128>;
    async fn pending_nonce(&self, owner: Address) -> Result<u64>;
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    /// Sign with the wallet key and submit. `tx` carries nonce, gas and price.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256>;

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>>;
}
