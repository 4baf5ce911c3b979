//! 手续费补偿：relayer 代付的 SOL 由用户用某个 token 偿还
//!
//! 纯计算，不读链、不产生指令

use log::{debug, warn};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use crate::executor::swap::calculate_input_amount;
use crate::fees::BASE_SIGNATURES;

/// 把某个 token 换成 SOL 的补偿池
#[derive(Debug, Clone, Copy)]
pub struct CompensationPool {
    pub reserve_token: u64,
    pub reserve_native: u64,
    pub fee_fraction: (u128, u128),
}

/// 候选的付费钱包
#[derive(Debug, Clone)]
pub struct FeeWallet {
    pub mint: Pubkey,
    pub symbol: String,
    pub balance: u64,
    pub is_native: bool,
    pub pool: Option<CompensationPool>,
}

#[derive(Debug, Clone)]
pub struct FeeCompensationInput<'a> {
    pub new_accounts: u64,
    /// 两个基础签名之外的签名数
    pub extra_signatures: u64,
    pub lamports_per_signature: u64,
    pub rent_per_account: u64,
    pub wallets: &'a [FeeWallet],
    pub preferred_fee_token: Option<Pubkey>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeeBreakdown {
    pub account_rent: u64,
    pub transaction_fee: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeCompensation {
    pub breakdown: FeeBreakdown,
    pub total_lamports: u64,
    /// 选中的付费 token；没有任何候选钱包时为 None
    pub fee_token: Option<Pubkey>,
    pub amount_in_fee_token: u64,
    pub has_enough_balance: bool,
}

/// 支付 lamports 需要的该钱包 token 数量；无法兑换时返回 None
fn amount_in_wallet_token(wallet: &FeeWallet, lamports: u64) -> Option<u64> {
    if wallet.is_native {
        return Some(lamports);
    }
    let pool = wallet.pool?;
    calculate_input_amount(pool.reserve_token, pool.reserve_native, lamports, pool.fee_fraction)
}

/// 计算补偿金额并选择付费 token
///
/// 选择顺序：
/// 1. 指定的 token（在候选中且可兑换）
/// 2. 余额足够的 SOL 钱包
/// 3. 按输入顺序第一个余额足够的候选
/// 4. SOL 钱包（余额不足），否则第一个可兑换的候选
pub fn compute_fee_compensation(input: &FeeCompensationInput<'_>) -> FeeCompensation {
    let breakdown = FeeBreakdown {
        account_rent: input.new_accounts.saturating_mul(input.rent_per_account),
        transaction_fee: BASE_SIGNATURES
            .saturating_add(input.extra_signatures)
            .saturating_mul(input.lamports_per_signature),
    };
    let total_lamports = breakdown.account_rent.saturating_add(breakdown.transaction_fee);

    let candidates: Vec<(&FeeWallet, u64)> = input
        .wallets
        .iter()
        .filter_map(|wallet| amount_in_wallet_token(wallet, total_lamports).map(|amount| (wallet, amount)))
        .collect();

    let preferred = input.preferred_fee_token.and_then(|mint| {
        let found = candidates.iter().find(|(wallet, _)| wallet.mint == mint).copied();
        if found.is_none() {
            warn!("⚠️  指定的付费 token {} 不在可用候选中，改用默认选择", mint);
        }
        found
    });

    let native = candidates.iter().find(|(wallet, _)| wallet.is_native).copied();
    let sufficient = |(wallet, amount): &(&FeeWallet, u64)| wallet.balance >= *amount;

    let chosen = preferred
        .or_else(|| native.filter(sufficient))
        .or_else(|| candidates.iter().find(|c| sufficient(c)).copied())
        .or(native)
        .or_else(|| candidates.first().copied());

    let compensation = match chosen {
        Some((wallet, amount)) => FeeCompensation {
            breakdown,
            total_lamports,
            fee_token: Some(wallet.mint),
            amount_in_fee_token: amount,
            has_enough_balance: wallet.balance >= amount,
        },
        None => FeeCompensation {
            breakdown,
            total_lamports,
            fee_token: None,
            amount_in_fee_token: 0,
            has_enough_balance: false,
        },
    };

    debug!(
        "🧾 补偿: 租金 {} + 签名费 {} = {} lamports, 付费 token {:?} 数量 {} (余额足够: {})",
        breakdown.account_rent,
        breakdown.transaction_fee,
        total_lamports,
        compensation.fee_token,
        compensation.amount_in_fee_token,
        compensation.has_enough_balance
    );
    compensation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::NATIVE_MINT;

    const RENT: u64 = 2_039_280;

    fn native(balance: u64) -> FeeWallet {
        FeeWallet {
            mint: *NATIVE_MINT,
            symbol: "SOL".to_string(),
            balance,
            is_native: true,
            pool: None,
        }
    }

    /// 1 USDC(6 位) ≈ 0.01 SOL 的池子
    fn usdc(balance: u64) -> FeeWallet {
        FeeWallet {
            mint: Pubkey::new_unique(),
            symbol: "USDC".to_string(),
            balance,
            is_native: false,
            pool: Some(CompensationPool {
                reserve_token: 1_000_000_000_000,
                reserve_native: 10_000_000_000_000,
                fee_fraction: (30, 10_000),
            }),
        }
    }

    fn input(wallets: &[FeeWallet]) -> FeeCompensationInput<'_> {
        FeeCompensationInput {
            new_accounts: 1,
            extra_signatures: 1,
            lamports_per_signature: 5_000,
            rent_per_account: RENT,
            wallets,
            preferred_fee_token: None,
        }
    }

    #[test]
    fn breakdown_sums_rent_and_signatures() {
        let wallets = [native(10_000_000)];
        let result = compute_fee_compensation(&input(&wallets));
        assert_eq!(result.breakdown.account_rent, RENT);
        assert_eq!(result.breakdown.transaction_fee, 15_000);
        assert_eq!(result.total_lamports, RENT + 15_000);
    }

    #[test]
    fn native_wallet_pays_its_lamport_total() {
        let wallets = [usdc(1_000_000_000), native(10_000_000)];
        let result = compute_fee_compensation(&input(&wallets));
        assert_eq!(result.fee_token, Some(*NATIVE_MINT));
        assert_eq!(result.amount_in_fee_token, result.total_lamports);
        assert!(result.has_enough_balance);
    }

    #[test]
    fn falls_back_to_first_sufficient_token() {
        let wallets = [usdc(1_000_000_000), native(1_000)];
        let result = compute_fee_compensation(&input(&wallets));
        assert_eq!(result.fee_token, Some(wallets[0].mint));
        assert!(result.has_enough_balance);
        assert!(result.amount_in_fee_token > 0);
        assert!(result.amount_in_fee_token < result.total_lamports);
    }

    #[test]
    fn insufficient_everywhere_reports_native() {
        let wallets = [usdc(1), native(1_000)];
        let result = compute_fee_compensation(&input(&wallets));
        assert_eq!(result.fee_token, Some(*NATIVE_MINT));
        assert!(!result.has_enough_balance);
    }

    #[test]
    fn preferred_token_is_honored() {
        let wallets = [native(10_000_000), usdc(1_000_000_000)];
        let mut request = input(&wallets);
        request.preferred_fee_token = Some(wallets[1].mint);
        let result = compute_fee_compensation(&request);
        assert_eq!(result.fee_token, Some(wallets[1].mint));
    }

    #[test]
    fn unknown_preference_uses_default_choice() {
        let wallets = [native(10_000_000)];
        let mut request = input(&wallets);
        request.preferred_fee_token = Some(Pubkey::new_unique());
        assert_eq!(compute_fee_compensation(&request).fee_token, Some(*NATIVE_MINT));
    }

    #[test]
    fn no_wallets_means_no_fee_token() {
        let result = compute_fee_compensation(&input(&[]));
        assert_eq!(result.fee_token, None);
        assert!(!result.has_enough_balance);
    }
}
