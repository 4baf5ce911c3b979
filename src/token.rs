//! Token 程序相关的地址派生、账户解析和指令构建
//!
//! 程序地址用 Lazy 缓存；账户布局和指令数据交给 spl-token 处理，
//! 公钥统一通过字节转换成 solana-sdk 的 Pubkey，避免 SDK 版本间的类型冲突

use once_cell::sync::Lazy;
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_system_interface::instruction::create_account;
use spl_token::instruction::TokenInstruction;
use spl_token::solana_program::program_pack::Pack;

pub static TOKEN_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA")
        .expect("Invalid TOKEN_PROGRAM_ID")
});

pub static ASSOCIATED_TOKEN_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL")
        .expect("Invalid ASSOCIATED_TOKEN_PROGRAM_ID")
});

pub static SYSTEM_PROGRAM_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("11111111111111111111111111111111").expect("Invalid SYSTEM_PROGRAM_ID")
});

pub static RENT_SYSVAR_ID: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("SysvarRent111111111111111111111111111111111").expect("Invalid RENT_SYSVAR_ID")
});

/// wSOL mint
pub static NATIVE_MINT: Lazy<Pubkey> = Lazy::new(|| {
    Pubkey::try_from("So11111111111111111111111111111111111111112").expect("Invalid NATIVE_MINT")
});

/// Token 账户数据长度（165 字节）
pub const TOKEN_ACCOUNT_LEN: usize = spl_token::state::Account::LEN;

pub fn is_native_mint(mint: &Pubkey) -> bool {
    *mint == *NATIVE_MINT
}

/// 派生 (owner, mint) 的关联代币账户地址
pub fn get_associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

/// 已初始化 token 账户中与兑换相关的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
}

/// 解析 token 账户；非 token 程序所有或未初始化时返回 None
pub fn unpack_token_account(account: &Account) -> Option<TokenAccountInfo> {
    if account.owner != *TOKEN_PROGRAM_ID {
        return None;
    }
    let state = spl_token::state::Account::unpack(&account.data).ok()?;
    Some(TokenAccountInfo {
        mint: Pubkey::new_from_array(state.mint.to_bytes()),
        owner: Pubkey::new_from_array(state.owner.to_bytes()),
        amount: state.amount,
    })
}

/// 构造一个已初始化 token 账户的链上表示（测试和 mock RPC 使用）
pub fn pack_token_account(mint: &Pubkey, owner: &Pubkey, amount: u64, lamports: u64) -> Account {
    use spl_token::solana_program::pubkey::Pubkey as SplPubkey;

    let state = spl_token::state::Account {
        mint: SplPubkey::new_from_array(mint.to_bytes()),
        owner: SplPubkey::new_from_array(owner.to_bytes()),
        amount,
        state: spl_token::state::AccountState::Initialized,
        ..Default::default()
    };
    let mut data = vec![0u8; TOKEN_ACCOUNT_LEN];
    spl_token::state::Account::pack(state, &mut data).expect("token account buffer has fixed size");

    Account {
        lamports,
        data,
        owner: *TOKEN_PROGRAM_ID,
        executable: false,
        rent_epoch: 0,
    }
}

/// 创建关联代币账户（CreateIdempotent），payer 支付租金
pub fn create_associated_account_instruction(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
) -> Instruction {
    let associated = get_associated_token_address(owner, mint);
    Instruction {
        program_id: *ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),                         // 0. 支付者
            AccountMeta::new(associated, false),                    // 1. 关联代币账户
            AccountMeta::new_readonly(*owner, false),               // 2. 拥有者
            AccountMeta::new_readonly(*mint, false),                // 3. mint
            AccountMeta::new_readonly(*SYSTEM_PROGRAM_ID, false),   // 4. system_program
            AccountMeta::new_readonly(*TOKEN_PROGRAM_ID, false),    // 5. token_program
        ],
        data: vec![1],
    }
}

/// 创建并初始化一个临时 token 账户
///
/// `lamports` 由 funder 转入，包含租金（wSOL 场景下还包含要包装的数量）
pub fn create_token_account_instructions(
    funder: &Pubkey,
    account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    lamports: u64,
) -> [Instruction; 2] {
    let create = create_account(
        funder,
        account,
        lamports,
        TOKEN_ACCOUNT_LEN as u64,
        &TOKEN_PROGRAM_ID,
    );
    let initialize = Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*RENT_SYSVAR_ID, false),
        ],
        data: TokenInstruction::InitializeAccount.pack(),
    };
    [create, initialize]
}

/// 关闭 token 账户，余额（含租金）退回 destination
pub fn close_account_instruction(
    account: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: TokenInstruction::CloseAccount.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_address_is_deterministic() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_eq!(
            get_associated_token_address(&owner, &mint),
            get_associated_token_address(&owner, &mint)
        );
        assert_ne!(
            get_associated_token_address(&owner, &mint),
            get_associated_token_address(&owner, &Pubkey::new_unique())
        );
    }

    #[test]
    fn unpack_reads_packed_account() {
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let account = pack_token_account(&mint, &owner, 42, 2_039_280);

        let info = unpack_token_account(&account).unwrap();
        assert_eq!(info.mint, mint);
        assert_eq!(info.owner, owner);
        assert_eq!(info.amount, 42);
    }

    #[test]
    fn unpack_rejects_foreign_owner() {
        let mut account = pack_token_account(&Pubkey::new_unique(), &Pubkey::new_unique(), 1, 1);
        account.owner = *SYSTEM_PROGRAM_ID;
        assert!(unpack_token_account(&account).is_none());
    }

    #[test]
    fn close_instruction_requires_owner_signature() {
        let account = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let ix = close_account_instruction(&account, &owner, &owner);
        assert_eq!(ix.data, vec![9]);
        assert!(ix.accounts[2].is_signer);
    }
}
