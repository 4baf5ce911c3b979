//! RPC 协作方接口
//!
//! 核心只依赖这个 trait；重试、限流等策略由具体实现负责

use async_trait::async_trait;
use log::debug;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{account::Account, hash::Hash, message::Message, pubkey::Pubkey};

use crate::error::{SwapError, SwapResult};
use crate::token::{unpack_token_account, TokenAccountInfo, TOKEN_ACCOUNT_LEN};

#[async_trait]
pub trait SwapRpcClient: Send + Sync {
    async fn get_account_info(&self, address: &Pubkey) -> SwapResult<Option<Account>>;

    async fn get_multiple_accounts_info(&self, addresses: &[Pubkey]) -> SwapResult<Vec<Option<Account>>>;

    async fn get_recent_blockhash(&self) -> SwapResult<Hash>;

    /// 估算一条 message 的网络费用（lamports）
    async fn estimate_transaction_fee(&self, message: &Message) -> SwapResult<u64>;

    async fn get_minimum_balance_for_rent_exemption(&self, span: usize) -> SwapResult<u64>;

    /// 读取并解析 token 账户；账户不存在或不是已初始化的 token 账户时返回 None
    async fn get_token_account(&self, address: &Pubkey) -> SwapResult<Option<TokenAccountInfo>> {
        Ok(self
            .get_account_info(address)
            .await?
            .as_ref()
            .and_then(unpack_token_account))
    }

    /// token 账户的免租金最低余额
    async fn token_account_rent(&self) -> SwapResult<u64> {
        self.get_minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_LEN).await
    }
}

#[async_trait]
impl SwapRpcClient for RpcClient {
    async fn get_account_info(&self, address: &Pubkey) -> SwapResult<Option<Account>> {
        let response = self
            .get_account_with_commitment(address, self.commitment())
            .await?;
        debug!("🔍 getAccountInfo {} -> {}", address, response.value.is_some());
        Ok(response.value)
    }

    async fn get_multiple_accounts_info(&self, addresses: &[Pubkey]) -> SwapResult<Vec<Option<Account>>> {
        Ok(self.get_multiple_accounts(addresses).await?)
    }

    async fn get_recent_blockhash(&self) -> SwapResult<Hash> {
        Ok(self.get_latest_blockhash().await?)
    }

    async fn estimate_transaction_fee(&self, message: &Message) -> SwapResult<u64> {
        self.get_fee_for_message(message)
            .await
            .map_err(|e| SwapError::FeeEstimation(e.to_string()))
    }

    async fn get_minimum_balance_for_rent_exemption(&self, span: usize) -> SwapResult<u64> {
        Ok(RpcClient::get_minimum_balance_for_rent_exemption(self, span).await?)
    }
}

/// 内存账户存储，供离线演示和测试使用
pub mod memory {
    use super::*;
    use crate::token::{pack_token_account, SYSTEM_PROGRAM_ID};
    use parking_lot::RwLock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// 每字节每 epoch 的租金 * 2 年豁免（与主网参数一致）
    const RENT_LAMPORTS_PER_BYTE: u64 = 6_960;
    /// 账户元数据的固定开销
    const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

    pub struct InMemoryRpc {
        accounts: RwLock<HashMap<Pubkey, Account>>,
        blockhash: Hash,
        lamports_per_signature: u64,
        offline: AtomicBool,
        fee_estimation_down: AtomicBool,
    }

    impl InMemoryRpc {
        pub fn new(lamports_per_signature: u64) -> Self {
            Self {
                accounts: RwLock::new(HashMap::new()),
                blockhash: Hash::new_from_array([7u8; 32]),
                lamports_per_signature,
                offline: AtomicBool::new(false),
                fee_estimation_down: AtomicBool::new(false),
            }
        }

        pub fn set_account(&self, address: Pubkey, account: Account) {
            self.accounts.write().insert(address, account);
        }

        pub fn remove_account(&self, address: &Pubkey) {
            self.accounts.write().remove(address);
        }

        /// 写入一个已初始化的 token 账户（余额为免租金最低值）
        pub fn set_token_account(&self, address: Pubkey, mint: &Pubkey, owner: &Pubkey, amount: u64) {
            let lamports = rent_exempt_minimum(TOKEN_ACCOUNT_LEN);
            self.set_account(address, pack_token_account(mint, owner, amount, lamports));
        }

        /// 写入一个只有 SOL 余额的钱包账户
        pub fn set_wallet(&self, address: Pubkey, lamports: u64) {
            self.set_account(
                address,
                Account {
                    lamports,
                    data: Vec::new(),
                    owner: *SYSTEM_PROGRAM_ID,
                    executable: false,
                    rent_epoch: 0,
                },
            );
        }

        /// 模拟 RPC 节点不可用：之后所有调用都返回网络错误
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        pub fn set_fee_estimation_down(&self, down: bool) {
            self.fee_estimation_down.store(down, Ordering::SeqCst);
        }

        pub fn blockhash(&self) -> Hash {
            self.blockhash
        }

        fn ensure_online(&self) -> SwapResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(SwapError::Network("rpc endpoint unreachable".to_string()));
            }
            Ok(())
        }
    }

    pub fn rent_exempt_minimum(span: usize) -> u64 {
        (ACCOUNT_STORAGE_OVERHEAD + span as u64) * RENT_LAMPORTS_PER_BYTE
    }

    #[async_trait]
    impl SwapRpcClient for InMemoryRpc {
        async fn get_account_info(&self, address: &Pubkey) -> SwapResult<Option<Account>> {
            self.ensure_online()?;
            Ok(self.accounts.read().get(address).cloned())
        }

        async fn get_multiple_accounts_info(&self, addresses: &[Pubkey]) -> SwapResult<Vec<Option<Account>>> {
            self.ensure_online()?;
            let accounts = self.accounts.read();
            Ok(addresses.iter().map(|address| accounts.get(address).cloned()).collect())
        }

        async fn get_recent_blockhash(&self) -> SwapResult<Hash> {
            self.ensure_online()?;
            Ok(self.blockhash)
        }

        async fn estimate_transaction_fee(&self, message: &Message) -> SwapResult<u64> {
            self.ensure_online()?;
            if self.fee_estimation_down.load(Ordering::SeqCst) {
                return Err(SwapError::FeeEstimation("fee service unavailable".to_string()));
            }
            Ok(message.header.num_required_signatures as u64 * self.lamports_per_signature)
        }

        async fn get_minimum_balance_for_rent_exemption(&self, span: usize) -> SwapResult<u64> {
            self.ensure_online()?;
            Ok(rent_exempt_minimum(span))
        }
    }

}
