use {
    crate::{
        app::models::{NewOrder, OrderRecord, TokenRecord},
        libs::error::EngineError,
    },
    alloy::primitives::Address,
    anyhow::{Context, Result},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        sync::{Mutex, PoisonError},
    },
};

/// Record operations the engine needs from persistence.
pub trait Store: Send + Sync {
    fn tokens(&self) -> Result<Vec<TokenRecord>>;
    fn token(&self, address: Address) -> Result<Option<TokenRecord>>;
    fn insert_token(&self, token: TokenRecord) -> Result<()>;
    fn update_token(&self, token: &TokenRecord) -> Result<()>;
    /// Removes the token and all of its orders.
    fn delete_token(&self, address: Address) -> Result<()>;
    fn update_cost_basis(&self, address: Address, price: Option<Decimal>) -> Result<()>;

    fn orders(&self, token: Address) -> Result<Vec<OrderRecord>>;
    fn insert_order(&self, order: NewOrder) -> Result<OrderRecord>;
    fn update_order(&self, order: &OrderRecord) -> Result<()>;
    fn delete_order(&self, id: u64) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    next_order_id: u64,
    tokens: Vec<TokenRecord>,
    orders: Vec<OrderRecord>,
}

/// JSON document on disk, rewritten on every mutation.
pub struct JsonStore {
    path: Option<PathBuf>,
    doc: Mutex<Document>,
}

impl JsonStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            Document::default()
        };
        Ok(Self {
            path: Some(path),
            doc: Mutex::new(doc),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: Mutex::new(Document::default()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.doc.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply `f` to a copy, write it out, then swap it in. A failed write
    /// leaves the in-memory document untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut Document) -> Result<R>) -> Result<R> {
        let mut doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = doc.clone();
        let out = f(&mut next)?;
        self.save(&next)?;
        *doc = next;
        Ok(out)
    }

    fn save(&self, doc: &Document) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(doc)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn tokens(&self) -> Result<Vec<TokenRecord>> {
        Ok(self.read(|d| d.tokens.clone()))
    }

    fn token(&self, address: Address) -> Result<Option<TokenRecord>> {
        Ok(self.read(|d| d.tokens.iter().find(|t| t.address == address).cloned()))
    }

    fn insert_token(&self, token: TokenRecord) -> Result<()> {
        self.mutate(|d| {
            if d.tokens.iter().any(|t| t.address == token.address) {
                return Err(EngineError::DuplicateToken(token.address).into());
            }
            d.tokens.push(token);
            Ok(())
        })
    }

    fn update_token(&self, token: &TokenRecord) -> Result<()> {
        self.mutate(|d| {
            let slot = d
                .tokens
                .iter_mut()
                .find(|t| t.address == token.address)
                .ok_or(EngineError::UnknownToken(token.address))?;
            *slot = token.clone();
            Ok(())
        })
    }

    fn delete_token(&self, address: Address) -> Result<()> {
        self.mutate(|d| {
            d.tokens.retain(|t| t.address != address);
            d.orders.retain(|o| o.token != address);
            Ok(())
        })
    }

    fn update_cost_basis(&self, address: Address, price: Option<Decimal>) -> Result<()> {
        self.mutate(|d| {
            let token = d
                .tokens
                .iter_mut()
                .find(|t| t.address == address)
                .ok_or(EngineError::UnknownToken(address))?;
            token.effective_buy_price = price;
            Ok(())
        })
    }

    fn orders(&self, token: Address) -> Result<Vec<OrderRecord>> {
        Ok(self.read(|d| d.orders.iter().filter(|o| o.token == token).cloned().collect()))
    }

    fn insert_order(&self, order: NewOrder) -> Result<OrderRecord> {
        self.mutate(|d| {
            if !d.tokens.iter().any(|t| t.address == order.token) {
                return Err(EngineError::UnknownToken(order.token).into());
            }
            d.next_order_id += 1;
            let record = OrderRecord::from_new(d.next_order_id, order);
            d.orders.push(record.clone());
            Ok(record)
        })
    }

    fn update_order(&self, order: &OrderRecord) -> Result<()> {
        self.mutate(|d| {
            let slot = d
                .orders
                .iter_mut()
                .find(|o| o.id == order.id)
                .ok_or(EngineError::UnknownOrder(order.id))?;
            *slot = order.clone();
            Ok(())
        })
    }

    fn delete_order(&self, id: u64) -> Result<()> {
        self.mutate(|d| {
            d.orders.retain(|o| o.id != id);
            Ok(())
        })
    }
}
