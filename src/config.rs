use anyhow::{Context, Result};
use serde::Deserialize;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::executor::builder::{BuilderConfig, PACKET_DATA_SIZE};
use crate::fees::FeeSchedule;

/// 全局配置
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // 网络配置
    pub rpc_endpoint: String,
    pub commitment_level: String,

    // 注册表
    pub tokens_config_path: String,
    pub pools_config_path: String,

    // 费用与交易参数
    pub lamports_per_signature: u64,
    pub max_transaction_size: usize,
    pub default_slippage_bps: u16,

    // 代付手续费的 relayer
    pub relayer_address: Option<String>,

    // 演示兑换（全部可选）
    pub swap_owner: Option<String>,
    pub swap_from: Option<String>,
    pub swap_to: Option<String>,
    pub swap_amount: Option<u64>,
    pub swap_destination: Option<String>,
}

/// 演示兑换参数
#[derive(Debug, Clone)]
pub struct DemoSwap {
    pub owner: Pubkey,
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub destination: Option<Pubkey>,
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).with_context(|| format!("{} is not a valid address: {}", field, value))
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let config = envy::from_env::<Config>()
            .context("Failed to load configuration from environment variables")?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置参数
    fn validate(&self) -> Result<()> {
        if self.lamports_per_signature == 0 {
            anyhow::bail!("lamports_per_signature must be > 0");
        }

        if self.max_transaction_size == 0 || self.max_transaction_size > PACKET_DATA_SIZE {
            anyhow::bail!("max_transaction_size must be between 1 and {}", PACKET_DATA_SIZE);
        }

        if self.default_slippage_bps > 10_000 {
            anyhow::bail!("default_slippage_bps must be <= 10000");
        }

        if let Some(relayer) = &self.relayer_address {
            parse_pubkey("relayer_address", relayer)?;
        }

        // 演示兑换要么完整配置，要么完全不配置
        let demo_fields = [
            self.swap_owner.is_some(),
            self.swap_from.is_some(),
            self.swap_to.is_some(),
            self.swap_amount.is_some(),
        ];
        if demo_fields.iter().any(|set| *set) && !demo_fields.iter().all(|set| *set) {
            anyhow::bail!("swap_owner, swap_from, swap_to and swap_amount must be set together");
        }
        if self.swap_amount == Some(0) {
            anyhow::bail!("swap_amount must be greater than 0");
        }

        Ok(())
    }

    /// 获取 CommitmentConfig
    pub fn get_commitment_config(&self) -> CommitmentConfig {
        match self.commitment_level.to_lowercase().as_str() {
            "processed" => CommitmentConfig::processed(),
            "confirmed" => CommitmentConfig::confirmed(),
            "finalized" => CommitmentConfig::finalized(),
            _ => {
                log::warn!("⚠️  未知的 commitment_level: {}, 使用默认值 'confirmed'", self.commitment_level);
                CommitmentConfig::confirmed()
            }
        }
    }

    pub fn get_relayer(&self) -> Result<Option<Pubkey>> {
        self.relayer_address
            .as_deref()
            .map(|value| parse_pubkey("relayer_address", value))
            .transpose()
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            lamports_per_signature: self.lamports_per_signature,
        }
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            max_transaction_size: self.max_transaction_size,
        }
    }

    /// 获取演示兑换参数（未配置时为 None）
    pub fn get_demo_swap(&self) -> Result<Option<DemoSwap>> {
        let (Some(owner), Some(from), Some(to), Some(amount)) =
            (&self.swap_owner, &self.swap_from, &self.swap_to, self.swap_amount)
        else {
            return Ok(None);
        };

        Ok(Some(DemoSwap {
            owner: parse_pubkey("swap_owner", owner)?,
            from: from.clone(),
            to: to.clone(),
            amount,
            destination: self
                .swap_destination
                .as_deref()
                .map(|value| parse_pubkey("swap_destination", value))
                .transpose()?,
        }))
    }

    /// 打印配置摘要
    pub fn print_summary(&self) {
        log::info!("=== Configuration Summary ===");
        log::info!("Network:");
        log::info!("  RPC: {}", self.rpc_endpoint);
        log::info!("  Commitment: {}", self.commitment_level);
        log::info!("");
        log::info!("Registry:");
        log::info!("  Tokens: {}", self.tokens_config_path);
        log::info!("  Pools: {}", self.pools_config_path);
        log::info!("");
        log::info!("Fees:");
        log::info!("  Lamports / Signature: {}", self.lamports_per_signature);
        log::info!("  Max Transaction Size: {} bytes", self.max_transaction_size);
        log::info!("  Default Slippage: {} bps", self.default_slippage_bps);
        log::info!("  Relayer: {}", self.relayer_address.as_deref().unwrap_or("NONE (owner pays)"));
        log::info!("");
        log::info!("Demo Swap:");
        match (&self.swap_from, &self.swap_to, self.swap_amount) {
            (Some(from), Some(to), Some(amount)) => {
                log::info!("  🔁 {} {} -> {}", amount, from, to);
            }
            _ => log::info!("  DISABLED"),
        }
        log::info!("=============================");
    }
}
