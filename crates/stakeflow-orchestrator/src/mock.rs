//! In-memory wallet, token and staking contract sharing one scripted world.

use {
    crate::provider::{Collaborators, Erc20Client, ProviderResult, StakingContract, WalletProvider},
    alloy_primitives::{address, Address, TxHash, U256},
    async_trait::async_trait,
    stakeflow_common::{
        config::StorageType, ChainParams, ProviderError, StakeflowConfig, TransactionRequest, TxReceipt,
    },
    std::{
        collections::{HashMap, VecDeque},
        sync::{Arc, Mutex, MutexGuard},
        time::Duration,
    },
    tokio::sync::broadcast,
};

pub const TOKEN: Address = address!("361D2689F8aaC8e1EB4A810Aa928fc9C78f608ca");
pub const STAKING: Address = address!("7D0ce8CB4F3615A1c9437026b2b53d2C58a9a976");
pub const ROUTER: Address = address!("00000000000000000000000000000000000000aa");
pub const SOURCE: Address = address!("00000000000000000000000000000000000000bb");
pub const OWNER: Address = address!("00000000000000000000000000000000000000cc");

/// `n` whole tokens at 18 decimals.
pub fn tokens(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub struct World {
    pub chain_id: u64,
    pub known_chains: Vec<u64>,
    pub connected: bool,
    pub token_code: usize,
    pub token_balance: U256,
    pub allowance: U256,
    pub staked: U256,
    /// Credited to the owner by any transaction sent to [`ROUTER`].
    pub swap_output: U256,
    pub read_delay: Option<Duration>,
    /// Next stake mines with a failed receipt.
    pub revert_next: bool,
    /// Chain the wallet jumps to right after the next approval.
    pub hop_chain_on_approve: Option<u64>,
    receipts: HashMap<TxHash, bool>,
    nonce: u8,
    calls: HashMap<String, usize>,
    failures: HashMap<String, VecDeque<ProviderError>>,
    chain_events: broadcast::Sender<u64>,
}

impl Default for World {
    fn default() -> Self {
        let (chain_events, _) = broadcast::channel(16);
        Self {
            chain_id: 80002,
            known_chains: vec![1, 137, 80002],
            connected: true,
            token_code: 2_048,
            token_balance: U256::ZERO,
            allowance: U256::ZERO,
            staked: U256::ZERO,
            swap_output: U256::ZERO,
            read_delay: None,
            revert_next: false,
            hop_chain_on_approve: None,
            receipts: HashMap::new(),
            nonce: 0,
            calls: HashMap::new(),
            failures: HashMap::new(),
            chain_events,
        }
    }
}

impl World {
    fn mine(&mut self, status: bool) -> TxHash {
        self.nonce = self.nonce.wrapping_add(1);
        let hash = TxHash::with_last_byte(self.nonce);
        self.receipts.insert(hash, status);
        hash
    }

    fn set_chain(&mut self, chain_id: u64) {
        self.chain_id = chain_id;
        let _ = self.chain_events.send(chain_id);
    }
}

#[derive(Clone)]
struct Shared(Arc<Mutex<World>>);

impl Shared {
    /// Counts the call, then pops any scripted failure for it.
    fn enter(&self, method: &str) -> ProviderResult<MutexGuard<'_, World>> {
        let mut world = self.0.lock().unwrap();
        *world.calls.entry(method.to_string()).or_default() += 1;
        if let Some(err) = world.failures.get_mut(method).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        Ok(world)
    }

    async fn read<T>(&self, method: &str, f: impl FnOnce(&World) -> T) -> ProviderResult<T> {
        let (value, delay) = {
            let world = self.enter(method)?;
            (f(&world), world.read_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(value)
    }
}

pub struct FakeWallet {
    world: Shared,
    owner: Address,
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn accounts(&self) -> ProviderResult<Vec<Address>> {
        let world = self.world.enter("accounts")?;
        Ok(if world.connected { vec![self.owner] } else { Vec::new() })
    }

    async fn chain_id(&self) -> ProviderResult<u64> {
        Ok(self.world.enter("chain_id")?.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> ProviderResult<()> {
        let mut world = self.world.enter("switch_chain")?;
        if !world.known_chains.contains(&chain_id) {
            return Err(ProviderError::rpc(
                ProviderError::UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID {:#x}", chain_id),
            ));
        }
        world.set_chain(chain_id);
        Ok(())
    }

    async fn add_chain(&self, params: &ChainParams) -> ProviderResult<()> {
        let mut world = self.world.enter("add_chain")?;
        let chain_id = u64::from_str_radix(params.chain_id.trim_start_matches("0x"), 16)
            .map_err(|e| ProviderError::rpc(-32602, e.to_string()))?;
        world.known_chains.push(chain_id);
        Ok(())
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> ProviderResult<TxHash> {
        let mut world = self.world.enter("send_transaction")?;
        if tx.to == ROUTER {
            let output = world.swap_output;
            world.token_balance += output;
        }
        Ok(world.mine(true))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> ProviderResult<TxReceipt> {
        let world = self.world.enter("wait_for_receipt")?;
        let status = *world
            .receipts
            .get(&hash)
            .ok_or_else(|| ProviderError::rpc(-32000, format!("unknown transaction {}", hash)))?;
        Ok(TxReceipt {
            transaction_hash: hash,
            status,
            block_number: Some(u64::from(world.nonce)),
        })
    }

    fn chain_changed(&self) -> broadcast::Receiver<u64> {
        self.world.0.lock().unwrap().chain_events.subscribe()
    }
}

pub struct FakeErc20 {
    world: Shared,
}

#[async_trait]
impl Erc20Client for FakeErc20 {
    async fn code_size(&self, _token: Address) -> ProviderResult<usize> {
        self.world.read("code_size", |w| w.token_code).await
    }

    async fn decimals(&self, _token: Address) -> ProviderResult<u8> {
        self.world.read("decimals", |_| 18).await
    }

    async fn symbol(&self, _token: Address) -> ProviderResult<String> {
        self.world.read("symbol", |_| "TT".to_string()).await
    }

    async fn name(&self, _token: Address) -> ProviderResult<String> {
        self.world.read("name", |_| "Test Token".to_string()).await
    }

    async fn balance_of(&self, _token: Address, _owner: Address) -> ProviderResult<U256> {
        self.world.read("balance_of", |w| w.token_balance).await
    }

    async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> ProviderResult<U256> {
        self.world.read("allowance", |w| w.allowance).await
    }

    async fn approve(&self, _token: Address, _spender: Address, amount: U256) -> ProviderResult<TxHash> {
        let mut world = self.world.enter("approve")?;
        world.allowance = amount;
        let hash = world.mine(true);
        if let Some(chain_id) = world.hop_chain_on_approve.take() {
            world.set_chain(chain_id);
        }
        Ok(hash)
    }
}

pub struct FakeStaking {
    world: Shared,
    owner: Address,
}

#[async_trait]
impl StakingContract for FakeStaking {
    fn address(&self) -> Address {
        STAKING
    }

    async fn stake(&self, amount: U256) -> ProviderResult<TxHash> {
        let mut world = self.world.enter("stake")?;
        if world.revert_next {
            world.revert_next = false;
            return Ok(world.mine(false));
        }
        if world.allowance < amount {
            return Err(ProviderError::Reverted("ERC20: insufficient allowance".into()));
        }
        if world.token_balance < amount {
            return Err(ProviderError::Reverted("ERC20: transfer amount exceeds balance".into()));
        }
        world.allowance -= amount;
        world.token_balance -= amount;
        world.staked += amount;
        Ok(world.mine(true))
    }

    async fn unstake(&self, amount: U256) -> ProviderResult<TxHash> {
        let mut world = self.world.enter("unstake")?;
        if world.staked < amount {
            return Err(ProviderError::Reverted("Insufficient staked amount".into()));
        }
        world.staked -= amount;
        world.token_balance += amount;
        Ok(world.mine(true))
    }

    async fn staked_balance(&self, account: Address) -> ProviderResult<U256> {
        let owner = self.owner;
        self.world
            .read("staked_balance", |w| if account == owner { w.staked } else { U256::ZERO })
            .await
    }

    async fn total_staked(&self) -> ProviderResult<U256> {
        self.world.read("total_staked", |w| w.staked).await
    }

    async fn token(&self) -> ProviderResult<Address> {
        self.world.read("token", |_| TOKEN).await
    }
}

pub struct Harness {
    world: Shared,
    pub owner: Address,
    pub wallet: Arc<FakeWallet>,
    pub erc20: Arc<FakeErc20>,
    pub staking: Arc<FakeStaking>,
}

impl Harness {
    pub fn new() -> Self {
        let world = Shared(Arc::new(Mutex::new(World::default())));
        Self {
            wallet: Arc::new(FakeWallet {
                world: world.clone(),
                owner: OWNER,
            }),
            erc20: Arc::new(FakeErc20 { world: world.clone() }),
            staking: Arc::new(FakeStaking {
                world: world.clone(),
                owner: OWNER,
            }),
            owner: OWNER,
            world,
        }
    }

    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.0.lock().unwrap()
    }

    /// Queues a failure for the next call of `method`.
    pub fn fail_next(&self, method: &str, err: ProviderError) {
        self.world()
            .failures
            .entry(method.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.world().calls.get(method).copied().unwrap_or(0)
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            wallet: self.wallet.clone(),
            erc20: self.erc20.clone(),
            staking: self.staking.clone(),
        }
    }

    pub fn config(&self) -> StakeflowConfig {
        let mut config = StakeflowConfig::default();
        config.ledger.storage = StorageType::Memory;
        config
    }
}
