//! 池子兑换指令构建
//!
//! SPL token-swap 兼容的 Swap 指令（Orca v1/v2 程序）
//! 数据格式: [tag=1(1), amount_in(8), minimum_amount_out(8)]
//!
//! 金额计算:
//! 1. 恒定乘积 x * y = k，先扣除交易费 + owner 费
//! 2. 按滑点（bps）向下取最小输出
//! 3. 两跳时第二跳的输入 = 第一跳的最小输出

use log::debug;
use once_cell::sync::Lazy;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use crate::error::{SwapError, SwapResult};
use crate::registry::{PoolConfig, SwapRegistry};
use crate::routes::Route;
use crate::rpc::SwapRpcClient;
use crate::token::{unpack_token_account, TOKEN_PROGRAM_ID};

static ORCA_SWAP_PROGRAM_V1: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("DjVE6JNiYqPL2QXyCUUh8rNjHrbz9hXHNYt99MQ59qw1")
        .expect("Invalid ORCA_SWAP_PROGRAM_V1")
});

static ORCA_SWAP_PROGRAM_V2: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("9W959DqEETiGZocYWCQPaJ6sBmUzgfxXfqGeTEdp3aQP")
        .expect("Invalid ORCA_SWAP_PROGRAM_V2")
});

const SWAP_INSTRUCTION_TAG: u8 = 1;

const BASIS_POINTS: u128 = 10_000;

/// 按池子的 program version 选择兑换程序
pub fn swap_program_id(program_version: u8) -> Option<Pubkey> {
    match program_version {
        1 => Some(*ORCA_SWAP_PROGRAM_V1),
        2 => Some(*ORCA_SWAP_PROGRAM_V2),
        _ => None,
    }
}

/// 路由中的一跳（方向已确定）
#[derive(Debug, Clone)]
pub struct SwapLeg {
    pub pool: PoolConfig,
    pub source_mint: Pubkey,
    pub destination_mint: Pubkey,
    /// 池子里接收输入 token 的账户
    pub pool_source: Pubkey,
    /// 池子里付出输出 token 的账户
    pub pool_destination: Pubkey,
}

/// 把路由解析成有方向的兑换腿，from_symbol 为第一跳的输入 token
pub fn resolve_legs(registry: &SwapRegistry, route: &Route, from_symbol: &str) -> SwapResult<Vec<SwapLeg>> {
    let pools = registry
        .resolve_route(route)
        .ok_or_else(|| SwapError::SwapData(format!("route {:?} references unknown pool", route.pools())))?;

    let mut legs = Vec::with_capacity(pools.len());
    let mut input_symbol = from_symbol.to_string();
    for pool in pools {
        let output_symbol = pool
            .other_token(&input_symbol)
            .ok_or_else(|| SwapError::SwapData(format!("pool {} does not trade {}", pool.id, input_symbol)))?
            .to_string();

        let mint_of = |symbol: &str| {
            registry
                .token(symbol)
                .map(|t| t.mint)
                .ok_or_else(|| SwapError::SwapData(format!("unknown token {}", symbol)))
        };
        let source_mint = mint_of(&input_symbol)?;
        let destination_mint = mint_of(&output_symbol)?;

        let (pool_source, pool_destination) = if pool.token_a_name == input_symbol {
            (pool.token_account_a, pool.token_account_b)
        } else {
            (pool.token_account_b, pool.token_account_a)
        };

        legs.push(SwapLeg {
            pool,
            source_mint,
            destination_mint,
            pool_source,
            pool_destination,
        });
        input_symbol = output_symbol;
    }

    Ok(legs)
}

/// 恒定乘积公式计算输出（扣除手续费后）
pub fn calculate_output_amount(
    reserve_in: u64,
    reserve_out: u64,
    amount_in: u64,
    fee_fraction: (u128, u128),
) -> u64 {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return 0;
    }
    let (fee_num, fee_den) = fee_fraction;
    if fee_den == 0 || fee_num >= fee_den {
        return 0;
    }

    // Calculate the input amount after trading fees using u128 to avoid overflow
    let amount_in_with_fee = (amount_in as u128) * (fee_den - fee_num) / fee_den;

    // Calculate the output using the constant product invariant
    let numerator = amount_in_with_fee * (reserve_out as u128);
    let denominator = (reserve_in as u128) + amount_in_with_fee;
    let output = numerator / denominator;

    output.min(u64::MAX as u128) as u64
}

/// 反向计算：要拿到 amount_out 需要投入多少（向上取整）
///
/// amount_out 不小于 reserve_out 时返回 None
pub fn calculate_input_amount(
    reserve_in: u64,
    reserve_out: u64,
    amount_out: u64,
    fee_fraction: (u128, u128),
) -> Option<u64> {
    if amount_out == 0 {
        return Some(0);
    }
    if reserve_in == 0 || amount_out >= reserve_out {
        return None;
    }
    let (fee_num, fee_den) = fee_fraction;
    if fee_den == 0 || fee_num >= fee_den {
        return None;
    }

    let amount_in_with_fee = ((reserve_in as u128) * (amount_out as u128))
        .div_ceil((reserve_out - amount_out) as u128);
    let amount_in = (amount_in_with_fee * fee_den).div_ceil(fee_den - fee_num);

    u64::try_from(amount_in).ok()
}

/// 按滑点计算最小输出
pub fn minimum_amount_out(expected: u64, slippage_bps: u16) -> u64 {
    let slippage = (slippage_bps as u128).min(BASIS_POINTS);
    let min_out = (expected as u128)
        .saturating_mul(BASIS_POINTS - slippage)
        .checked_div(BASIS_POINTS)
        .unwrap_or(0);
    min_out as u64
}

/// 构建单跳的兑换指令
pub fn swap_instruction(
    leg: &SwapLeg,
    user_transfer_authority: &Pubkey,
    source: &Pubkey,
    destination: &Pubkey,
    amount_in: u64,
    minimum_amount_out: u64,
) -> SwapResult<Instruction> {
    let program_id = swap_program_id(leg.pool.program_version).ok_or_else(|| {
        SwapError::SwapData(format!(
            "pool {} has unsupported program version {}",
            leg.pool.id, leg.pool.program_version
        ))
    })?;

    let mut data = Vec::with_capacity(17);
    data.push(SWAP_INSTRUCTION_TAG);
    data.extend_from_slice(&amount_in.to_le_bytes());
    data.extend_from_slice(&minimum_amount_out.to_le_bytes());

    let accounts = vec![
        AccountMeta::new_readonly(leg.pool.account, false),           // 0: swap
        AccountMeta::new_readonly(leg.pool.authority, false),         // 1: authority
        AccountMeta::new_readonly(*user_transfer_authority, true),    // 2: user transfer authority (signer)
        AccountMeta::new(*source, false),                             // 3: 用户输入账户
        AccountMeta::new(leg.pool_source, false),                     // 4: 池子输入账户
        AccountMeta::new(leg.pool_destination, false),                // 5: 池子输出账户
        AccountMeta::new(*destination, false),                        // 6: 用户输出账户
        AccountMeta::new(leg.pool.pool_token_mint, false),            // 7: LP mint
        AccountMeta::new(leg.pool.fee_account, false),                // 8: fee account
        AccountMeta::new_readonly(*TOKEN_PROGRAM_ID, false),          // 9: token_program
    ];

    Ok(Instruction {
        program_id,
        accounts,
        data,
    })
}

/// 单跳报价
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegQuote {
    pub amount_in: u64,
    pub expected_out: u64,
    pub minimum_out: u64,
}

/// 读取所有腿的池子储备并逐跳报价
pub async fn quote_legs(
    rpc: &dyn SwapRpcClient,
    legs: &[SwapLeg],
    amount_in: u64,
    slippage_bps: u16,
) -> SwapResult<Vec<LegQuote>> {
    let addresses: Vec<Pubkey> = legs
        .iter()
        .flat_map(|leg| [leg.pool_source, leg.pool_destination])
        .collect();
    let accounts = rpc.get_multiple_accounts_info(&addresses).await?;
    if accounts.len() != addresses.len() {
        return Err(SwapError::SwapData(format!(
            "expected {} pool accounts, got {}",
            addresses.len(),
            accounts.len()
        )));
    }

    let mut reserves = Vec::with_capacity(addresses.len());
    for (address, account) in addresses.iter().zip(&accounts) {
        let info = account
            .as_ref()
            .and_then(unpack_token_account)
            .ok_or_else(|| SwapError::SwapData(format!("pool token account {} not found", address)))?;
        reserves.push(info.amount);
    }

    let mut quotes = Vec::with_capacity(legs.len());
    let mut input = amount_in;
    for (leg, pair) in legs.iter().zip(reserves.chunks(2)) {
        let expected_out = calculate_output_amount(pair[0], pair[1], input, leg.pool.fee_fraction());
        let minimum_out = minimum_amount_out(expected_out, slippage_bps);
        if minimum_out == 0 {
            return Err(SwapError::SwapData(format!(
                "input {} is too small for pool {}",
                input, leg.pool.id
            )));
        }
        debug!(
            "💱 {}: {} -> 预期 {} / 最少 {} (滑点 {} bps)",
            leg.pool.id, input, expected_out, minimum_out, slippage_bps
        );
        quotes.push(LegQuote {
            amount_in: input,
            expected_out,
            minimum_out,
        });
        input = minimum_out;
    }

    Ok(quotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: (u128, u128) = (30, 10_000);

    #[test]
    fn output_follows_constant_product() {
        // 1_000_000 / 1_000_000 池子，投入 1000，扣 0.3% 手续费
        let out = calculate_output_amount(1_000_000, 1_000_000, 1_000, FEE);
        assert_eq!(out, 996);
    }

    #[test]
    fn output_is_zero_for_empty_pool() {
        assert_eq!(calculate_output_amount(0, 1_000, 10, FEE), 0);
        assert_eq!(calculate_output_amount(1_000, 1_000, 0, FEE), 0);
    }

    #[test]
    fn input_amount_covers_requested_output() {
        let needed = calculate_input_amount(5_000_000, 2_000_000, 10_000, FEE).unwrap();
        assert!(calculate_output_amount(5_000_000, 2_000_000, needed, FEE) >= 10_000);
        assert!(calculate_output_amount(5_000_000, 2_000_000, needed - 2, FEE) < 10_000);
    }

    #[test]
    fn input_amount_rejects_draining_pool() {
        assert_eq!(calculate_input_amount(1_000, 1_000, 1_000, FEE), None);
    }

    #[test]
    fn slippage_rounds_down() {
        assert_eq!(minimum_amount_out(1_000, 50), 995);
        assert_eq!(minimum_amount_out(999, 100), 989);
        assert_eq!(minimum_amount_out(1_000, 20_000), 0);
    }
}
