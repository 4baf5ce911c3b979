//! 兑换网络费用计算
//!
//! 每条规则只往 transaction 或 account_balances 上累加，不存在减项

use log::debug;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

use crate::destination::analyse_destination;
use crate::error::{SwapError, SwapResult};
use crate::routes::Route;
use crate::rpc::SwapRpcClient;
use crate::token::is_native_mint;
use crate::types::FeeAmount;

/// relayer（fee payer）+ 用户，各一个签名
pub const BASE_SIGNATURES: u64 = 2;

/// 拆成两笔交易时额外需要的签名数
pub const SPLIT_TRANSACTION_SIGNATURES: u64 = 2;

pub const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// 网络费率
#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    pub lamports_per_signature: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            lamports_per_signature: DEFAULT_LAMPORTS_PER_SIGNATURE,
        }
    }
}

pub struct SwapFeeCalculator {
    rpc: Arc<dyn SwapRpcClient>,
    schedule: FeeSchedule,
}

impl SwapFeeCalculator {
    pub fn new(rpc: Arc<dyn SwapRpcClient>, schedule: FeeSchedule) -> Self {
        Self { rpc, schedule }
    }

    pub fn schedule(&self) -> FeeSchedule {
        self.schedule
    }

    /// 计算兑换所需的网络费用
    ///
    /// 1. 基础：relayer + 用户两个签名
    /// 2. 源是 wSOL：临时账户要签名 +1
    /// 3. 目标需要创建且不是 wSOL：+1 份免租金余额
    /// 4. 目标是 wSOL：关闭（解包）步骤 +1 签名
    /// 5. 两跳 + 源是 wSOL + 未指定目标地址：拆成两笔交易 +2 签名
    pub async fn calculate_swapping_network_fees(
        &self,
        route: &Route,
        source_mint: &Pubkey,
        destination_mint: &Pubkey,
        destination_address: Option<&Pubkey>,
        owner: &Pubkey,
    ) -> SwapResult<FeeAmount> {
        let source_is_native = is_native_mint(source_mint);
        let destination_is_native = is_native_mint(destination_mint);

        let mut signatures = BASE_SIGNATURES;
        let mut account_balances = 0u64;

        if source_is_native {
            signatures += 1;
        }

        let destination =
            analyse_destination(self.rpc.as_ref(), destination_address, destination_mint, owner).await?;
        if destination.needs_creation() && !destination_is_native {
            account_balances = account_balances
                .checked_add(self.rpc.token_account_rent().await?)
                .ok_or_else(|| SwapError::FeeEstimation("account rent overflow".to_string()))?;
        }

        if destination_is_native {
            signatures += 1;
        }

        if route.is_transitive() && source_is_native && destination_address.is_none() {
            signatures += SPLIT_TRANSACTION_SIGNATURES;
        }

        let transaction = signatures
            .checked_mul(self.schedule.lamports_per_signature)
            .ok_or_else(|| SwapError::FeeEstimation("signature fee overflow".to_string()))?;

        let fee = FeeAmount {
            transaction,
            account_balances,
            deposit: 0,
        };
        debug!(
            "💰 兑换网络费用: {} 个签名, 签名费 {} lamports, 账户租金 {} lamports",
            signatures, fee.transaction, fee.account_balances
        );
        Ok(fee)
    }
}
