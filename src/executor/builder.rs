//! 兑换交易构建器
//!
//! 流程（严格按顺序，任何一步失败都直接中止，不返回部分结果）:
//! 1. 地址冲突检查
//! 2. 中转账户（两跳路由）
//! 3. 源账户校验（SOL 需要先包装成 wSOL）
//! 4. 目标账户解析（必要时拆分到额外交易）
//! 5. 兑换指令
//! 6. 关闭临时 wSOL 账户
//! 7. 收集签名者
//! 8. 生成 1 或 2 笔待签名交易

use log::{debug, info, warn};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, signature::Keypair};
use std::sync::Arc;

use crate::destination::{analyse_destination, DestinationAccount};
use crate::error::{SourceValidationError, SwapError, SwapResult};
use crate::executor::context::{BuildContext, SwapRequest};
use crate::executor::swap::{quote_legs, swap_instruction, LegQuote};
use crate::rpc::SwapRpcClient;
use crate::token::{
    close_account_instruction, create_associated_account_instruction,
    create_token_account_instructions, get_associated_token_address, is_native_mint,
    unpack_token_account, NATIVE_MINT,
};
use crate::types::{serialized_transaction_size, FeeAmount, PreparedTransaction, SwapPreparation};

/// 网络允许的单笔交易最大字节数
pub const PACKET_DATA_SIZE: usize = 1232;

/// 默认的交易体积上限（字节），给钱包端追加的指令留出余量
pub const DEFAULT_MAX_TRANSACTION_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct BuilderConfig {
    /// 主交易序列化后超过这个大小时，目标账户创建被拆到额外交易
    pub max_transaction_size: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
        }
    }
}

/// 各交易的签名者
struct SignerSet {
    primary_signers: Vec<Keypair>,
    primary_required: Vec<Pubkey>,
    additional_required: Vec<Pubkey>,
}

/// 交易构建器
///
/// 自身无可变状态，可以通过 Arc 在多个并发请求间共享
pub struct TransactionBuilder {
    rpc: Arc<dyn SwapRpcClient>,
    config: BuilderConfig,
}

impl TransactionBuilder {
    pub fn new(rpc: Arc<dyn SwapRpcClient>, config: BuilderConfig) -> Self {
        Self { rpc, config }
    }

    /// 构建兑换交易
    pub async fn prepare_swap_transaction(&self, request: SwapRequest) -> SwapResult<SwapPreparation> {
        info!("═══════════════════════════════════════════════════════");
        info!("🏗️  开始构建兑换交易");
        info!("   Owner: {}", request.owner);
        info!("   {} -> {} ({} 跳)", request.source_mint, request.destination_mint, request.legs.len());
        info!("   输入数量: {}", request.amount);
        info!("═══════════════════════════════════════════════════════");

        if request.legs.is_empty() {
            return Err(SwapError::SwapData("route has no legs".to_string()));
        }

        let mut ctx = BuildContext::new(request);

        self.check_address_conflict(&ctx)?;
        self.ensure_transit_account(&mut ctx).await?;
        self.validate_source(&mut ctx).await?;
        self.resolve_destination(&mut ctx).await?;
        self.append_swap_instructions(&mut ctx).await?;
        self.append_cleanup(&mut ctx);
        let signers = self.collect_signers(&mut ctx);
        let preparation = self.finalize(ctx, signers).await?;

        info!(
            "✅ 兑换交易已构建: {} 笔交易, 额外补偿 {} lamports",
            preparation.transactions.len(),
            preparation.additional_payback_fee
        );
        Ok(preparation)
    }

    async fn token_account_rent(&self, ctx: &mut BuildContext) -> SwapResult<u64> {
        if let Some(rent) = ctx.cached_rent() {
            return Ok(rent);
        }
        let rent = self.rpc.token_account_rent().await?;
        ctx.cache_rent(rent);
        Ok(rent)
    }

    /// 1. 源账户不能是 relayer 自己的关联账户
    fn check_address_conflict(&self, ctx: &BuildContext) -> SwapResult<()> {
        let (Some(relayer), Some(source)) = (ctx.request.relayer, ctx.request.declared_source_account())
        else {
            return Ok(());
        };
        let relayer_account = get_associated_token_address(&relayer, &ctx.request.source_mint);
        if source == relayer_account {
            warn!("⚠️  源账户 {} 是 relayer 的关联账户", source);
            return Err(SwapError::AddressConflict(source));
        }
        Ok(())
    }

    /// 2. 两跳路由的中转账户：复用 owner 的关联账户，不存在则创建；中间 token 是 wSOL 时用临时账户
    async fn ensure_transit_account(&self, ctx: &mut BuildContext) -> SwapResult<()> {
        if !ctx.request.is_transitive() {
            return Ok(());
        }

        let intermediate_mint = ctx.request.legs[0].destination_mint;
        if ctx.request.legs[1].source_mint != intermediate_mint {
            return Err(SwapError::TransitAccount(format!(
                "route legs {} and {} do not share a token",
                ctx.request.legs[0].pool.id, ctx.request.legs[1].pool.id
            )));
        }

        let owner = ctx.owner();
        let fee_payer = ctx.fee_payer();

        if is_native_mint(&intermediate_mint) {
            let rent = self.token_account_rent(ctx).await?;
            let keypair = Keypair::new();
            let address = ctx.register_ephemeral(keypair);
            ctx.instructions.extend(create_token_account_instructions(
                &fee_payer,
                &address,
                &NATIVE_MINT,
                &owner,
                rent,
            ));
            ctx.add_account_creation_fee(rent)?;
            ctx.transit_account = Some(address);
            debug!("🔀 中转 wSOL 临时账户: {}", address);
            return Ok(());
        }

        let associated = get_associated_token_address(&owner, &intermediate_mint);
        match self.rpc.get_account_info(&associated).await? {
            None => {
                let rent = self.token_account_rent(ctx).await?;
                ctx.instructions.push(create_associated_account_instruction(
                    &fee_payer,
                    &owner,
                    &intermediate_mint,
                ));
                ctx.add_account_creation_fee(rent)?;
                debug!("🔀 创建中转账户: {}", associated);
            }
            Some(account) => match unpack_token_account(&account) {
                Some(info) if info.mint == intermediate_mint && info.owner == owner => {
                    debug!("🔀 复用中转账户: {}", associated);
                }
                _ => {
                    return Err(SwapError::TransitAccount(format!(
                        "account {} is not a token account of {} owned by {}",
                        associated, intermediate_mint, owner
                    )));
                }
            },
        }
        ctx.transit_account = Some(associated);
        Ok(())
    }

    /// 3. 源账户校验；SOL 源在这里包装成 wSOL 临时账户
    async fn validate_source(&self, ctx: &mut BuildContext) -> SwapResult<()> {
        let amount = ctx.request.amount;
        if amount == 0 {
            return Err(SourceValidationError::ZeroAmount.into());
        }

        let owner = ctx.owner();

        if ctx.request.wraps_native_source() {
            let rent = self.token_account_rent(ctx).await?;
            let required = amount
                .checked_add(rent)
                .ok_or_else(|| SwapError::SwapData(format!("amount {} overflows with rent", amount)))?;
            let available = self
                .rpc
                .get_account_info(&owner)
                .await?
                .map_or(0, |account| account.lamports);
            if available < required {
                warn!("❌ SOL 余额不足: 需要 {} lamports, 当前 {} lamports", required, available);
                return Err(SourceValidationError::InsufficientBalance { required, available }.into());
            }

            let address = ctx.register_ephemeral(Keypair::new());
            ctx.instructions.extend(create_token_account_instructions(
                &owner,
                &address,
                &NATIVE_MINT,
                &owner,
                required,
            ));
            ctx.source_wrapped_from_native = true;
            ctx.source_account = Some(address);
            debug!("📦 包装 {} lamports 到临时 wSOL 账户 {}", amount, address);
            return Ok(());
        }

        let Some(address) = ctx.request.declared_source_account() else {
            return Err(SourceValidationError::AccountNotFound(owner).into());
        };
        let info = self
            .rpc
            .get_token_account(&address)
            .await?
            .ok_or(SourceValidationError::AccountNotFound(address))?;

        if info.mint != ctx.request.source_mint {
            return Err(SourceValidationError::MintMismatch {
                account: address,
                expected: ctx.request.source_mint,
                actual: info.mint,
            }
            .into());
        }
        if info.amount < amount {
            warn!("❌ 源账户余额不足: 需要 {}, 当前 {}", amount, info.amount);
            return Err(SourceValidationError::InsufficientBalance {
                required: amount,
                available: info.amount,
            }
            .into());
        }

        ctx.source_account = Some(address);
        debug!("✅ 源账户 {} 余额 {}", address, info.amount);
        Ok(())
    }

    /// 4. 目标账户：wSOL 建临时账户；其他 token 建关联账户，
    /// 源刚包装过且主交易超出体积上限时拆到额外交易
    async fn resolve_destination(&self, ctx: &mut BuildContext) -> SwapResult<()> {
        let owner = ctx.owner();
        let fee_payer = ctx.fee_payer();
        let destination_mint = ctx.request.destination_mint;

        let destination = analyse_destination(
            self.rpc.as_ref(),
            ctx.request.destination_address.as_ref(),
            &destination_mint,
            &owner,
        )
        .await?;

        let address = destination.address();
        if Some(address) == ctx.source_account || Some(address) == ctx.transit_account {
            return Err(SwapError::DestinationResolution(format!(
                "destination {} collides with an input account",
                address
            )));
        }

        match destination {
            DestinationAccount::Existing(address) => {
                debug!("✅ 目标账户已存在: {}", address);
            }
            DestinationAccount::CreateEphemeral(keypair) => {
                let rent = self.token_account_rent(ctx).await?;
                let address = ctx.register_ephemeral(keypair);
                ctx.instructions.extend(create_token_account_instructions(
                    &fee_payer,
                    &address,
                    &NATIVE_MINT,
                    &owner,
                    rent,
                ));
                ctx.add_account_creation_fee(rent)?;
                debug!("🆕 目标 wSOL 临时账户: {}", address);
            }
            DestinationAccount::CreateAssociated(address) => {
                let rent = self.token_account_rent(ctx).await?;
                let create = create_associated_account_instruction(&fee_payer, &owner, &destination_mint);
                ctx.destination_account = Some(address);

                let may_split = ctx.source_wrapped_from_native && ctx.request.destination_address.is_none();
                if may_split && self.exceeds_size_limit(ctx, &create)? {
                    info!("✂️  主交易超出体积上限，目标账户 {} 的创建拆到额外交易", address);
                    ctx.additional_instructions.push(create);
                    ctx.add_additional_payback_fee(rent)?;
                } else {
                    debug!("🆕 创建目标关联账户: {}", address);
                    ctx.instructions.push(create);
                    ctx.add_account_creation_fee(rent)?;
                }
            }
        }

        ctx.destination_account = Some(address);
        Ok(())
    }

    /// 预估加上 extra 之后主交易的最终体积（兑换与关闭指令按当前上下文推算）
    fn exceeds_size_limit(&self, ctx: &BuildContext, extra: &Instruction) -> SwapResult<bool> {
        let mut projected = ctx.instructions.clone();
        projected.push(extra.clone());
        projected.extend(self.swap_instruction_layout(ctx, 0, &[])?);
        projected.extend(self.close_instructions(ctx));

        let size = serialized_transaction_size(&projected, &ctx.fee_payer());
        debug!(
            "📏 预估主交易大小: {} bytes (上限 {} bytes)",
            size, self.config.max_transaction_size
        );
        Ok(size > self.config.max_transaction_size)
    }

    /// 按腿生成兑换指令；quotes 为空时用 0 金额占位（只用于估算体积）
    fn swap_instruction_layout(
        &self,
        ctx: &BuildContext,
        amount_in: u64,
        quotes: &[LegQuote],
    ) -> SwapResult<Vec<Instruction>> {
        let owner = ctx.owner();
        let source = ctx
            .source_account
            .ok_or_else(|| SwapError::SwapData("source account not resolved".to_string()))?;
        let destination = ctx
            .destination_account
            .ok_or_else(|| SwapError::SwapData("destination account not resolved".to_string()))?;

        let legs = &ctx.request.legs;
        let mut instructions = Vec::with_capacity(legs.len());
        for (index, leg) in legs.iter().enumerate() {
            let leg_source = if index == 0 {
                source
            } else {
                ctx.transit_account
                    .ok_or_else(|| SwapError::SwapData("transit account not resolved".to_string()))?
            };
            let leg_destination = if index + 1 == legs.len() {
                destination
            } else {
                ctx.transit_account
                    .ok_or_else(|| SwapError::SwapData("transit account not resolved".to_string()))?
            };
            let (leg_in, leg_min_out) = quotes
                .get(index)
                .map_or((amount_in, 0), |quote| (quote.amount_in, quote.minimum_out));

            instructions.push(swap_instruction(
                leg,
                &owner,
                &leg_source,
                &leg_destination,
                leg_in,
                leg_min_out,
            )?);
        }
        Ok(instructions)
    }

    /// 5. 兑换指令
    async fn append_swap_instructions(&self, ctx: &mut BuildContext) -> SwapResult<()> {
        let quotes = quote_legs(
            self.rpc.as_ref(),
            &ctx.request.legs,
            ctx.request.amount,
            ctx.request.slippage_bps,
        )
        .await?;
        let instructions = self.swap_instruction_layout(ctx, ctx.request.amount, &quotes)?;
        debug!("🔁 添加 {} 条兑换指令", instructions.len());
        ctx.instructions.extend(instructions);
        Ok(())
    }

    fn close_instructions(&self, ctx: &BuildContext) -> Vec<Instruction> {
        let owner = ctx.owner();
        ctx.accounts_to_close
            .iter()
            .map(|account| close_account_instruction(account, &owner, &owner))
            .collect()
    }

    /// 6. 关闭临时 wSOL 账户，余额和租金退回 owner
    fn append_cleanup(&self, ctx: &mut BuildContext) {
        let closes = self.close_instructions(ctx);
        if !closes.is_empty() {
            debug!("🗑️  添加 {} 条关闭账户指令", closes.len());
        }
        ctx.instructions.extend(closes);
    }

    /// 7. 收集签名者：临时账户 keypair 归主交易；owner 和 fee payer 由外部签名
    fn collect_signers(&self, ctx: &mut BuildContext) -> SignerSet {
        let fee_payer = ctx.fee_payer();
        let owner = ctx.owner();

        let mut primary_required = vec![fee_payer];
        if owner != fee_payer {
            primary_required.push(owner);
        }

        SignerSet {
            primary_signers: std::mem::take(&mut ctx.ephemeral_signers),
            primary_required,
            additional_required: vec![fee_payer],
        }
    }

    /// 8. 生成待签名交易：额外交易（如有）在前
    async fn finalize(&self, ctx: BuildContext, signers: SignerSet) -> SwapResult<SwapPreparation> {
        let owner = ctx.owner();
        let fee_payer = ctx.fee_payer();
        let mut transactions = Vec::with_capacity(2);
        let mut additional_payback_fee = 0;

        if !ctx.additional_instructions.is_empty() {
            let transaction = self
                .prepare(
                    ctx.additional_instructions,
                    Vec::new(),
                    signers.additional_required,
                    owner,
                    fee_payer,
                    ctx.additional_payback_fee,
                )
                .await?;
            additional_payback_fee = transaction.expected_fee.total();
            transactions.push(transaction);
        }

        let primary = self
            .prepare(
                ctx.instructions,
                signers.primary_signers,
                signers.primary_required,
                owner,
                fee_payer,
                ctx.account_creation_fee,
            )
            .await?;
        transactions.push(primary);

        Ok(SwapPreparation {
            transactions,
            additional_payback_fee,
        })
    }

    async fn prepare(
        &self,
        instructions: Vec<Instruction>,
        signers: Vec<Keypair>,
        required_signers: Vec<Pubkey>,
        owner: Pubkey,
        fee_payer: Pubkey,
        account_balances: u64,
    ) -> SwapResult<PreparedTransaction> {
        let recent_blockhash = self.rpc.get_recent_blockhash().await?;
        let mut transaction = PreparedTransaction {
            instructions,
            signers,
            required_signers,
            owner,
            recent_blockhash,
            fee_payer,
            expected_fee: FeeAmount::default(),
        };

        let network_fee = self.rpc.estimate_transaction_fee(&transaction.message()).await?;
        transaction.expected_fee = FeeAmount {
            transaction: network_fee,
            account_balances,
            deposit: 0,
        };

        let size = transaction.serialized_size();
        if size > PACKET_DATA_SIZE {
            warn!("⚠️  交易大小 {} bytes 超过网络上限 {} bytes", size, PACKET_DATA_SIZE);
        }
        debug!(
            "📦 交易: {} 条指令, {} bytes, 预计费用 {} lamports",
            transaction.instructions.len(),
            size,
            transaction.expected_fee.total()
        );
        Ok(transaction)
    }
}
