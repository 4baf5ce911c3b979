//! 目标账户分析：判断接收 token 的账户是否需要创建

use log::debug;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

use crate::error::SwapResult;
use crate::rpc::SwapRpcClient;
use crate::token::{get_associated_token_address, is_native_mint};

/// 目标账户分析结果
#[derive(Debug)]
pub enum DestinationAccount {
    /// 已存在且持有该 mint，直接复用
    Existing(Pubkey),
    /// 关联代币账户尚未初始化，需要创建
    CreateAssociated(Pubkey),
    /// wSOL：每次都新建临时账户，先转入余额再初始化
    CreateEphemeral(Keypair),
}

impl DestinationAccount {
    pub fn address(&self) -> Pubkey {
        match self {
            DestinationAccount::Existing(address) | DestinationAccount::CreateAssociated(address) => {
                *address
            }
            DestinationAccount::CreateEphemeral(keypair) => keypair.pubkey(),
        }
    }

    pub fn needs_creation(&self) -> bool {
        !matches!(self, DestinationAccount::Existing(_))
    }
}

/// 分析目标账户
///
/// 1. 指定了地址且该地址已持有 mint 的 token → 复用
/// 2. mint 是 wSOL → 新建临时账户（不使用关联地址）
/// 3. 否则派生 (owner, mint) 的关联地址，未初始化则需要创建
pub async fn analyse_destination(
    rpc: &dyn SwapRpcClient,
    destination_address: Option<&Pubkey>,
    mint: &Pubkey,
    owner: &Pubkey,
) -> SwapResult<DestinationAccount> {
    if let Some(address) = destination_address {
        if let Some(account) = rpc.get_token_account(address).await? {
            if account.mint == *mint {
                debug!("✅ 复用目标账户 {}", address);
                return Ok(DestinationAccount::Existing(*address));
            }
        }
    }

    if is_native_mint(mint) {
        let keypair = Keypair::new();
        debug!("🆕 目标为 wSOL，新建临时账户 {}", keypair.pubkey());
        return Ok(DestinationAccount::CreateEphemeral(keypair));
    }

    let associated = get_associated_token_address(owner, mint);
    match rpc.get_token_account(&associated).await? {
        Some(account) if account.mint == *mint => Ok(DestinationAccount::Existing(associated)),
        _ => {
            debug!("🆕 关联账户 {} 未初始化，需要创建", associated);
            Ok(DestinationAccount::CreateAssociated(associated))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::memory::InMemoryRpc;
    use crate::token::NATIVE_MINT;

    #[tokio::test]
    async fn reuses_explicit_destination_with_matching_mint() {
        let rpc = InMemoryRpc::new(5_000);
        let (owner, mint, address) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        rpc.set_token_account(address, &mint, &owner, 0);

        let result = analyse_destination(&rpc, Some(&address), &mint, &owner).await.unwrap();
        assert!(matches!(result, DestinationAccount::Existing(a) if a == address));
        assert!(!result.needs_creation());
    }

    #[tokio::test]
    async fn falls_back_to_associated_account() {
        let rpc = InMemoryRpc::new(5_000);
        let (owner, mint) = (Pubkey::new_unique(), Pubkey::new_unique());
        let associated = get_associated_token_address(&owner, &mint);

        // 指定地址持有别的 mint，不能复用
        let other = Pubkey::new_unique();
        rpc.set_token_account(other, &Pubkey::new_unique(), &owner, 0);
        let result = analyse_destination(&rpc, Some(&other), &mint, &owner).await.unwrap();
        assert!(matches!(result, DestinationAccount::CreateAssociated(a) if a == associated));

        rpc.set_token_account(associated, &mint, &owner, 0);
        let result = analyse_destination(&rpc, None, &mint, &owner).await.unwrap();
        assert!(matches!(result, DestinationAccount::Existing(a) if a == associated));
    }

    #[tokio::test]
    async fn wrapped_sol_always_gets_a_fresh_account() {
        let rpc = InMemoryRpc::new(5_000);
        let owner = Pubkey::new_unique();
        rpc.set_token_account(get_associated_token_address(&owner, &NATIVE_MINT), &NATIVE_MINT, &owner, 0);

        let first = analyse_destination(&rpc, None, &NATIVE_MINT, &owner).await.unwrap();
        let second = analyse_destination(&rpc, None, &NATIVE_MINT, &owner).await.unwrap();
        assert!(first.needs_creation());
        assert_ne!(first.address(), second.address());
    }
}
