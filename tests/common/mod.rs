//! 集成测试共用的注册表与内存 RPC
#![allow(dead_code)]

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use swaprelay::executor::builder::{BuilderConfig, TransactionBuilder};
use swaprelay::executor::context::SwapRequest;
use swaprelay::fees::{FeeSchedule, SwapFeeCalculator};
use swaprelay::registry::{PoolConfig, SwapRegistry, TokenConfig};
use swaprelay::routes::generate_routes;
use swaprelay::rpc::memory::{rent_exempt_minimum, InMemoryRpc};
use swaprelay::rpc::SwapRpcClient;
use swaprelay::token::{get_associated_token_address, NATIVE_MINT, TOKEN_ACCOUNT_LEN};

pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;
pub const SLIPPAGE_BPS: u16 = 100;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn token_rent() -> u64 {
    rent_exempt_minimum(TOKEN_ACCOUNT_LEN)
}

fn token(symbol: &str, mint: Pubkey, decimals: u8) -> TokenConfig {
    TokenConfig {
        symbol: symbol.to_string(),
        mint,
        decimals,
        name: None,
        pool_token: false,
    }
}

fn pool(token_a: &str, token_b: &str) -> PoolConfig {
    PoolConfig {
        id: format!("{}/{}", token_a, token_b),
        account: Pubkey::new_unique(),
        authority: Pubkey::new_unique(),
        pool_token_mint: Pubkey::new_unique(),
        token_account_a: Pubkey::new_unique(),
        token_account_b: Pubkey::new_unique(),
        fee_account: Pubkey::new_unique(),
        fee_numerator: 25,
        fee_denominator: 10_000,
        owner_trade_fee_numerator: 5,
        owner_trade_fee_denominator: 10_000,
        token_a_name: token_a.to_string(),
        token_b_name: token_b.to_string(),
        program_version: 2,
        deprecated: false,
    }
}

/// SOL/USDC 和 ETH/USDC 两个池子：SOL <-> ETH 只能经 USDC 两跳
pub struct Fixture {
    pub registry: SwapRegistry,
    pub rpc: Arc<InMemoryRpc>,
    pub owner: Pubkey,
    pub relayer: Pubkey,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self::with_pools(&[("SOL", "USDC"), ("ETH", "USDC")]);
        fixture.set_reserves("SOL/USDC", 1_000 * LAMPORTS_PER_SOL, 100_000_000_000);
        fixture.set_reserves("ETH/USDC", 100_000_000_000, 1_000_000_000_000);
        fixture
    }

    /// SOL/USDC 和 ETH/SOL：USDC <-> ETH 经 SOL 两跳
    pub fn sol_hub() -> Self {
        let fixture = Self::with_pools(&[("SOL", "USDC"), ("ETH", "SOL")]);
        fixture.set_reserves("SOL/USDC", 1_000 * LAMPORTS_PER_SOL, 100_000_000_000);
        fixture.set_reserves("ETH/SOL", 100_000_000_000, 10_000 * LAMPORTS_PER_SOL);
        fixture
    }

    fn with_pools(pools: &[(&str, &str)]) -> Self {
        init_logger();

        let registry = SwapRegistry::new(
            [
                token("SOL", *NATIVE_MINT, 9),
                token("USDC", Pubkey::new_unique(), 6),
                token("ETH", Pubkey::new_unique(), 8),
            ],
            pools.iter().map(|(a, b)| pool(a, b)),
        )
        .unwrap();

        let rpc = Arc::new(InMemoryRpc::new(LAMPORTS_PER_SIGNATURE));
        let fixture = Self {
            registry,
            rpc,
            owner: Pubkey::new_unique(),
            relayer: Pubkey::new_unique(),
        };
        fixture.rpc.set_wallet(fixture.owner, 10 * LAMPORTS_PER_SOL);
        fixture.rpc.set_wallet(fixture.relayer, LAMPORTS_PER_SOL);
        fixture
    }

    pub fn set_reserves(&self, pool_id: &str, reserve_a: u64, reserve_b: u64) {
        let pool = self.registry.pool(pool_id).unwrap();
        let mint_a = self.mint(&pool.token_a_name);
        let mint_b = self.mint(&pool.token_b_name);
        self.rpc
            .set_token_account(pool.token_account_a, &mint_a, &pool.authority, reserve_a);
        self.rpc
            .set_token_account(pool.token_account_b, &mint_b, &pool.authority, reserve_b);
    }

    pub fn mint(&self, symbol: &str) -> Pubkey {
        self.registry.token(symbol).unwrap().mint
    }

    pub fn associated(&self, owner: &Pubkey, symbol: &str) -> Pubkey {
        get_associated_token_address(owner, &self.mint(symbol))
    }

    /// 给 owner 的关联账户写入余额，返回账户地址
    pub fn fund(&self, symbol: &str, amount: u64) -> Pubkey {
        let address = self.associated(&self.owner, symbol);
        self.rpc
            .set_token_account(address, &self.mint(symbol), &self.owner, amount);
        address
    }

    pub fn rpc(&self) -> Arc<dyn SwapRpcClient> {
        self.rpc.clone()
    }

    pub fn builder(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.rpc(), BuilderConfig::default())
    }

    pub fn builder_with_limit(&self, max_transaction_size: usize) -> TransactionBuilder {
        TransactionBuilder::new(self.rpc(), BuilderConfig { max_transaction_size })
    }

    pub fn calculator(&self) -> SwapFeeCalculator {
        SwapFeeCalculator::new(self.rpc(), FeeSchedule::default())
    }

    pub fn route(&self, from: &str, to: &str) -> swaprelay::routes::Route {
        generate_routes(&self.registry)
            .routes_for(from, to)
            .into_iter()
            .next()
            .unwrap()
    }

    /// relayer 代付、使用默认源账户和目标账户的请求
    pub fn request(&self, from: &str, to: &str, amount: u64) -> SwapRequest {
        SwapRequest::from_route(
            &self.registry,
            &self.route(from, to),
            from,
            to,
            self.owner,
            Some(self.relayer),
            None,
            None,
            amount,
            SLIPPAGE_BPS,
        )
        .unwrap()
    }
}
