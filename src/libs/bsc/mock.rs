//! In-process chain for tests: balances, pools and quotes are set up front and
//! receipts are synthesized from the decoded swap calldata.
use {
    super::chain::{Chain, TxReceipt},
    alloy::{
        primitives::{keccak256, Address, Bytes, Log, B256, U256},
        rpc::types::TransactionRequest,
        sol_types::{SolCall, SolEvent},
    },
    anyhow::{bail, Result},
    async_trait::async_trait,
    dashmap::DashMap,
    pancakes::pancake::{
        pancake_swap_v2::{IERC20, IPancakeRouter02, IWBNB},
        WBNB,
    },
    std::sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

pub const WALLET: Address = Address::repeat_byte(0xAA);

#[derive(Default)]
pub struct MockChain {
    native: Mutex<U256>,
    balances: DashMap<(Address, Address), U256>,
    decimals: DashMap<Address, u8>,
    symbols: DashMap<Address, String>,
    allowances: DashMap<(Address, Address, Address), U256>,
    pairs: DashMap<(Address, Address, Address), Address>,
    /// Output ratio `num / den` per exact path; a missing path reverts.
    quotes: DashMap<Vec<Address>, (U256, U256)>,
    gas_estimate: AtomicU64,
    fail_estimate: AtomicBool,
    pending: AtomicU64,
    receipts: DashMap<B256, TxReceipt>,
    pub sent: Mutex<Vec<TransactionRequest>>,
    revert_next: AtomicBool,
    drop_receipts: AtomicBool,
    reads: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.gas_estimate.store(150_000, Ordering::SeqCst);
        chain.decimals.insert(WBNB, 18);
        chain.symbols.insert(WBNB, "WBNB".into());
        chain
    }

    pub fn set_native(&self, wei: U256) {
        *self.native.lock().unwrap() = wei;
    }

    pub fn native(&self) -> U256 {
        *self.native.lock().unwrap()
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.balances.insert((token, owner), amount);
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances.get(&(token, owner)).map(|b| *b).unwrap_or_default()
    }

    pub fn add_token(&self, token: Address, symbol: &str, decimals: u8) {
        self.decimals.insert(token, decimals);
        self.symbols.insert(token, symbol.to_string());
    }

    /// Register a pool and fund it with the given reserves. Returns the pair address.
    pub fn add_pair(
        &self,
        factory: Address,
        a: Address,
        b: Address,
        reserve_a: U256,
        reserve_b: U256,
    ) -> Address {
        let mut seed = factory.to_vec();
        seed.extend_from_slice(a.as_slice());
        seed.extend_from_slice(b.as_slice());
        let pair = Address::from_word(keccak256(seed));
        self.pairs.insert((factory, a, b), pair);
        self.pairs.insert((factory, b, a), pair);
        self.set_balance(a, pair, reserve_a);
        self.set_balance(b, pair, reserve_b);
        pair
    }

    /// `getAmountsOut(amount, path)` returns `amount * num / den` as the final amount.
    pub fn set_quote(&self, path: Vec<Address>, num: U256, den: U256) {
        self.quotes.insert(path, (num, den));
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.gas_estimate.store(gas, Ordering::SeqCst);
    }

    pub fn fail_estimates(&self, fail: bool) {
        self.fail_estimate.store(fail, Ordering::SeqCst);
    }

    pub fn set_pending_nonce(&self, nonce: u64) {
        self.pending.store(nonce, Ordering::SeqCst);
    }

    pub fn revert_next(&self) {
        self.revert_next.store(true, Ordering::SeqCst);
    }

    pub fn drop_receipts(&self, drop: bool) {
        self.drop_receipts.store(drop, Ordering::SeqCst);
    }

    /// Chain reads served so far, sends excluded.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_inputs(&self) -> Vec<Bytes> {
        self.sent()
            .iter()
            .filter_map(|tx| tx.input.input().cloned())
            .collect()
    }

    pub fn approvals_sent(&self) -> usize {
        self.sent_inputs()
            .iter()
            .filter(|data| data.starts_with(&IERC20::approveCall::SELECTOR))
            .count()
    }

    pub fn sells_sent(&self) -> Vec<IPancakeRouter02::swapExactTokensForETHSupportingFeeOnTransferTokensCall> {
        self.sent_inputs()
            .iter()
            .filter_map(|data| {
                IPancakeRouter02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::abi_decode(data).ok()
            })
            .collect()
    }

    pub fn buys_sent(&self) -> Vec<IPancakeRouter02::swapExactETHForTokensSupportingFeeOnTransferTokensCall> {
        self.sent_inputs()
            .iter()
            .filter_map(|data| {
                IPancakeRouter02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::abi_decode(data).ok()
            })
            .collect()
    }

    fn quote(&self, amount_in: U256, path: &[Address]) -> Option<U256> {
        let (num, den) = *self.quotes.get(path)?;
        Some(amount_in * num / den)
    }

    /// Apply the call's effects and return the logs it would emit.
    fn execute(&self, to: Address, value: U256, data: &[u8]) -> Result<Vec<Log>> {
        if let Ok(call) = IERC20::approveCall::abi_decode(data) {
            self.allowances.insert((to, WALLET, call.spender), call.value);
            return Ok(Vec::new());
        }
        if let Ok(call) =
            IPancakeRouter02::swapExactETHForTokensSupportingFeeOnTransferTokensCall::abi_decode(data)
        {
            let Some(out) = self.quote(value, &call.path) else {
                bail!("no quote");
            };
            if out < call.amountOutMin {
                bail!("INSUFFICIENT_OUTPUT_AMOUNT");
            }
            let token = *call.path.last().unwrap_or(&WBNB);
            *self.native.lock().unwrap() -= value;
            self.set_balance(token, call.to, self.balance(token, call.to) + out);
            let transfer = IERC20::Transfer {
                from: Address::repeat_byte(0x99),
                to: call.to,
                value: out,
            };
            return Ok(vec![Log {
                address: token,
                data: transfer.encode_log_data(),
            }]);
        }
        if let Ok(call) =
            IPancakeRouter02::swapExactTokensForETHSupportingFeeOnTransferTokensCall::abi_decode(data)
        {
            let Some(out) = self.quote(call.amountIn, &call.path) else {
                bail!("no quote");
            };
            if out < call.amountOutMin {
                bail!("INSUFFICIENT_OUTPUT_AMOUNT");
            }
            let token = call.path[0];
            let held = self.balance(token, WALLET);
            if held < call.amountIn {
                bail!("TRANSFER_FROM_FAILED");
            }
            self.set_balance(token, WALLET, held - call.amountIn);
            *self.native.lock().unwrap() += out;
            let withdrawal = IWBNB::Withdrawal { src: to, wad: out };
            return Ok(vec![Log {
                address: WBNB,
                data: withdrawal.encode_log_data(),
            }]);
        }
        bail!("unknown calldata")
    }
}

#[async_trait]
impl Chain for MockChain {
    fn wallet(&self) -> Address {
        WALLET
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256> {
        self.read();
        Ok(self.native())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.read();
        Ok(self.balance(token, owner))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        self.read();
        match self.decimals.get(&token) {
            Some(d) => Ok(*d),
            None => bail!("decimals() reverted on {token}"),
        }
    }

    async fn symbol(&self, token: Address) -> Result<String> {
        self.read();
        match self.symbols.get(&token) {
            Some(s) => Ok(s.clone()),
            None => bail!("symbol() reverted on {token}"),
        }
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.read();
        Ok(self
            .allowances
            .get(&(token, owner, spender))
            .map(|a| *a)
            .unwrap_or_default())
    }

    async fn get_pair(&self, factory: Address, a: Address, b: Address) -> Result<Option<Address>> {
        self.read();
        Ok(self.pairs.get(&(factory, a, b)).map(|p| *p))
    }

    async fn amounts_out(
        &self,
        _router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<Option<Vec<U256>>> {
        self.read();
        Ok(self.quote(amount_in, path).map(|out| {
            let mut amounts = vec![amount_in; path.len() - 1];
            amounts.push(out);
            amounts
        }))
    }

    async fn gas_price(&self) -> Result<u128> {
        self.read();
        Ok(3_000_000_000)
    }

    async fn pending_nonce(&self, _owner: Address) -> Result<u64> {
        self.read();
        Ok(self.pending.load(Ordering::SeqCst))
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64> {
        self.read();
        if self.fail_estimate.load(Ordering::SeqCst) {
            bail!("execution reverted");
        }
        Ok(self.gas_estimate.load(Ordering::SeqCst))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
        let nonce = tx.nonce.unwrap_or_default();
        let tx_hash = keccak256(nonce.to_be_bytes());
        let to = tx.to.and_then(|kind| kind.to().copied()).unwrap_or_default();
        let value = tx.value.unwrap_or_default();
        let data = tx.input.input().cloned().unwrap_or_default();
        self.sent.lock().unwrap().push(tx);
        self.pending.fetch_max(nonce + 1, Ordering::SeqCst);

        let outcome = if self.revert_next.swap(false, Ordering::SeqCst) {
            Err(anyhow::anyhow!("forced revert"))
        } else {
            self.execute(to, value, &data)
        };
        let receipt = match outcome {
            Ok(logs) => TxReceipt {
                success: true,
                logs,
            },
            Err(_) => TxReceipt {
                success: false,
                logs: Vec::new(),
            },
        };
        self.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        self.read();
        if self.drop_receipts.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.receipts.get(&tx_hash).map(|r| r.clone()))
    }
}
