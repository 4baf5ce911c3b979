//! 单次兑换构建的请求与上下文

use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
};

use crate::error::{SwapError, SwapResult};
use crate::executor::swap::{resolve_legs, SwapLeg};
use crate::registry::SwapRegistry;
use crate::routes::{Route, MAX_ROUTE_LEGS};
use crate::token::{get_associated_token_address, is_native_mint};

/// 兑换请求（已校验的用户意图）
#[derive(Debug, Clone)]
pub struct SwapRequest {
    /// 钱包地址（token 账户的 owner）
    pub owner: Pubkey,
    /// 代付手续费的 relayer；None 时由 owner 自己付
    pub relayer: Option<Pubkey>,
    pub source_mint: Pubkey,
    /// 源 token 账户；None 时使用关联账户（SOL 则从钱包余额包装）
    pub source_account: Option<Pubkey>,
    pub destination_mint: Pubkey,
    pub destination_address: Option<Pubkey>,
    pub legs: Vec<SwapLeg>,
    pub amount: u64,
    pub slippage_bps: u16,
}

impl SwapRequest {
    /// 从注册表解析路由并组装请求
    #[allow(clippy::too_many_arguments)]
    pub fn from_route(
        registry: &SwapRegistry,
        route: &Route,
        from_symbol: &str,
        to_symbol: &str,
        owner: Pubkey,
        relayer: Option<Pubkey>,
        source_account: Option<Pubkey>,
        destination_address: Option<Pubkey>,
        amount: u64,
        slippage_bps: u16,
    ) -> SwapResult<Self> {
        let mint_of = |symbol: &str| {
            registry
                .token(symbol)
                .map(|t| t.mint)
                .ok_or_else(|| SwapError::SwapData(format!("unknown token {}", symbol)))
        };
        let source_mint = mint_of(from_symbol)?;
        let destination_mint = mint_of(to_symbol)?;

        let legs = resolve_legs(registry, route, from_symbol)?;
        if legs.last().map(|leg| leg.destination_mint) != Some(destination_mint) {
            return Err(SwapError::SwapData(format!(
                "route {:?} does not end at {}",
                route.pools(),
                to_symbol
            )));
        }

        Ok(Self {
            owner,
            relayer,
            source_mint,
            source_account,
            destination_mint,
            destination_address,
            legs,
            amount,
            slippage_bps,
        })
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.relayer.unwrap_or(self.owner)
    }

    pub fn is_transitive(&self) -> bool {
        self.legs.len() == MAX_ROUTE_LEGS
    }

    /// 源是否需要从钱包 SOL 余额包装
    pub fn wraps_native_source(&self) -> bool {
        is_native_mint(&self.source_mint)
            && self.source_account.map_or(true, |account| account == self.owner)
    }

    /// 用户声明的源 token 账户（包装 SOL 时没有）
    pub fn declared_source_account(&self) -> Option<Pubkey> {
        if self.wraps_native_source() {
            return None;
        }
        Some(
            self.source_account
                .unwrap_or_else(|| get_associated_token_address(&self.owner, &self.source_mint)),
        )
    }
}

/// 构建上下文：每个请求独占一份，按流水线顺序修改
///
/// 指令只追加不重排：创建 → 注资/初始化 → 兑换 → 关闭
pub struct BuildContext {
    pub request: SwapRequest,
    pub instructions: Vec<Instruction>,
    /// 被拆分到额外交易里的指令
    pub additional_instructions: Vec<Instruction>,
    pub ephemeral_signers: Vec<Keypair>,
    /// 构建结束时需要关闭的临时 wSOL 账户
    pub accounts_to_close: Vec<Pubkey>,
    pub account_creation_fee: u64,
    pub additional_payback_fee: u64,
    /// 源 token 是否刚从 SOL 包装而来（决定目标账户创建能否拆到额外交易）
    pub source_wrapped_from_native: bool,
    pub source_account: Option<Pubkey>,
    pub transit_account: Option<Pubkey>,
    pub destination_account: Option<Pubkey>,
    token_account_rent: Option<u64>,
}

impl BuildContext {
    pub fn new(request: SwapRequest) -> Self {
        Self {
            request,
            instructions: Vec::new(),
            additional_instructions: Vec::new(),
            ephemeral_signers: Vec::new(),
            accounts_to_close: Vec::new(),
            account_creation_fee: 0,
            additional_payback_fee: 0,
            source_wrapped_from_native: false,
            source_account: None,
            transit_account: None,
            destination_account: None,
            token_account_rent: None,
        }
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.request.fee_payer()
    }

    pub fn owner(&self) -> Pubkey {
        self.request.owner
    }

    pub fn cached_rent(&self) -> Option<u64> {
        self.token_account_rent
    }

    pub fn cache_rent(&mut self, rent: u64) {
        self.token_account_rent = Some(rent);
    }

    /// 登记一个临时账户：参与签名，构建结束时关闭
    pub fn register_ephemeral(&mut self, keypair: Keypair) -> Pubkey {
        let address = keypair.pubkey();
        self.accounts_to_close.push(address);
        self.ephemeral_signers.push(keypair);
        address
    }

    pub fn add_account_creation_fee(&mut self, lamports: u64) -> SwapResult<()> {
        self.account_creation_fee = self
            .account_creation_fee
            .checked_add(lamports)
            .ok_or_else(|| SwapError::FeeEstimation("account creation fee overflow".to_string()))?;
        Ok(())
    }

    pub fn add_additional_payback_fee(&mut self, lamports: u64) -> SwapResult<()> {
        self.additional_payback_fee = self
            .additional_payback_fee
            .checked_add(lamports)
            .ok_or_else(|| SwapError::FeeEstimation("payback fee overflow".to_string()))?;
        Ok(())
    }
}
