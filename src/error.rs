//! 兑换构建流程的错误类型
//!
//! 每个流水线步骤对应一种错误，调用方据此给出具体提示

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type SwapResult<T> = std::result::Result<T, SwapError>;

#[derive(Debug, Error)]
pub enum SwapError {
    /// 源账户与 relayer 自己的关联账户相同（请求格式错误）
    #[error("source account {0} conflicts with the relayer's own token account")]
    AddressConflict(Pubkey),

    #[error("transit account error: {0}")]
    TransitAccount(String),

    #[error("source validation failed: {0}")]
    SourceValidation(#[from] SourceValidationError),

    #[error("destination resolution failed: {0}")]
    DestinationResolution(String),

    #[error("swap data error: {0}")]
    SwapData(String),

    #[error("fee estimation failed: {0}")]
    FeeEstimation(String),

    /// 唯一可重试的错误，重试由调用方/RPC 客户端负责
    #[error("network error: {0}")]
    Network(String),
}

/// 源账户校验的细分原因
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceValidationError {
    #[error("source account {0} does not exist")]
    AccountNotFound(Pubkey),

    #[error("source account {account} holds mint {actual}, expected {expected}")]
    MintMismatch {
        account: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },

    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("input amount must be greater than zero")]
    ZeroAmount,
}

impl SwapError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::Network(_))
    }

    /// 映射为面向用户的提示文案
    pub fn user_message(&self) -> &'static str {
        match self {
            SwapError::AddressConflict(_) => "This source account cannot be used for swapping",
            SwapError::TransitAccount(_) => "Trading pair not supported",
            SwapError::SourceValidation(SourceValidationError::InsufficientBalance { .. }) => {
                "Not enough balance"
            }
            SwapError::SourceValidation(SourceValidationError::ZeroAmount) => {
                "Enter an amount greater than zero"
            }
            SwapError::SourceValidation(_) => "Source token account not found",
            SwapError::DestinationResolution(_) => "Could not prepare the receiving account",
            SwapError::SwapData(_) => "Trading pair not supported",
            SwapError::FeeEstimation(_) => "Could not estimate network fee",
            SwapError::Network(_) => "Network error, please try again",
        }
    }
}

impl From<solana_client::client_error::ClientError> for SwapError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        SwapError::Network(err.to_string())
    }
}
