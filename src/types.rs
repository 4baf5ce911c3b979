use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    message::Message,
    pubkey::Pubkey,
    signature::Keypair,
    transaction::Transaction,
};
use std::ops::{Add, AddAssign};

/// 兑换网络费用（单位 lamports）
///
/// 只定义加法：费用规则只会累加，不存在减项；溢出时饱和到 u64::MAX
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAmount {
    /// 签名费
    pub transaction: u64,
    /// 新建账户的免租金余额
    pub account_balances: u64,
    /// 流动性存入押金，兑换场景恒为 0
    pub deposit: u64,
}

impl FeeAmount {
    pub fn total(&self) -> u64 {
        self.transaction
            .saturating_add(self.account_balances)
            .saturating_add(self.deposit)
    }

    pub fn checked_add(self, rhs: FeeAmount) -> Option<FeeAmount> {
        Some(FeeAmount {
            transaction: self.transaction.checked_add(rhs.transaction)?,
            account_balances: self.account_balances.checked_add(rhs.account_balances)?,
            deposit: self.deposit.checked_add(rhs.deposit)?,
        })
    }
}

impl Add for FeeAmount {
    type Output = FeeAmount;

    fn add(self, rhs: FeeAmount) -> FeeAmount {
        FeeAmount {
            transaction: self.transaction.saturating_add(rhs.transaction),
            account_balances: self.account_balances.saturating_add(rhs.account_balances),
            deposit: self.deposit.saturating_add(rhs.deposit),
        }
    }
}

impl AddAssign for FeeAmount {
    fn add_assign(&mut self, rhs: FeeAmount) {
        *self = *self + rhs;
    }
}

/// 待签名的交易
///
/// 临时账户的 keypair 随交易一起交给签名方；owner 和 fee payer 由外部签名
#[derive(Debug)]
pub struct PreparedTransaction {
    pub instructions: Vec<Instruction>,
    pub signers: Vec<Keypair>,
    pub required_signers: Vec<Pubkey>,
    pub owner: Pubkey,
    pub recent_blockhash: Hash,
    pub fee_payer: Pubkey,
    pub expected_fee: FeeAmount,
}

impl PreparedTransaction {
    /// 编译后的 legacy message（签名方直接签这个）
    pub fn message(&self) -> Message {
        Message::new_with_blockhash(&self.instructions, Some(&self.fee_payer), &self.recent_blockhash)
    }

    /// 序列化后的交易大小（签名位用占位符填充）
    pub fn serialized_size(&self) -> usize {
        serialized_transaction_size(&self.instructions, &self.fee_payer)
    }
}

/// 估算一组指令打包成交易后的字节数
pub fn serialized_transaction_size(instructions: &[Instruction], fee_payer: &Pubkey) -> usize {
    let transaction = Transaction::new_unsigned(Message::new(instructions, Some(fee_payer)));
    bincode::serialized_size(&transaction)
        .map(|size| size as usize)
        .unwrap_or(usize::MAX)
}

/// prepare_swap_transaction 的结果
///
/// 有两笔交易时，额外交易排在前面，必须先于兑换交易上链
#[derive(Debug)]
pub struct SwapPreparation {
    pub transactions: Vec<PreparedTransaction>,
    /// 额外交易产生、需要补偿给 relayer 的费用
    pub additional_payback_fee: u64,
}

impl SwapPreparation {
    pub fn total_expected_fee(&self) -> FeeAmount {
        self.transactions
            .iter()
            .fold(FeeAmount::default(), |acc, tx| acc + tx.expected_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_addition_saturates_instead_of_overflowing() {
        let near_max = FeeAmount {
            transaction: u64::MAX - 1,
            account_balances: 10,
            deposit: 0,
        };
        assert_eq!(near_max.total(), u64::MAX);

        let sum = near_max + FeeAmount { transaction: 5, ..FeeAmount::default() };
        assert_eq!(sum.transaction, u64::MAX);
        assert_eq!(sum.account_balances, 10);
        assert_eq!(near_max.checked_add(FeeAmount { transaction: 5, ..FeeAmount::default() }), None);
    }

    #[test]
    fn total_is_sum_of_fields() {
        let fee = FeeAmount {
            transaction: 15_000,
            account_balances: 2_039_280,
            deposit: 0,
        };
        assert_eq!(fee.total(), 2_054_280);
    }

    #[test]
    fn addition_keeps_total_consistent() {
        let a = FeeAmount { transaction: 5_000, account_balances: 0, deposit: 1 };
        let b = FeeAmount { transaction: 10_000, account_balances: 2_039_280, deposit: 0 };
        let sum = a + b;
        assert_eq!(sum.total(), a.total() + b.total());
        assert_eq!(a.checked_add(b), Some(sum));
    }

    #[test]
    fn checked_add_detects_overflow() {
        let a = FeeAmount { transaction: u64::MAX, account_balances: 0, deposit: 0 };
        let b = FeeAmount { transaction: 1, account_balances: 0, deposit: 0 };
        assert_eq!(a.checked_add(b), None);
    }
}
