//! 静态配置：token 表和池子表
//!
//! 启动时从 JSON 文件加载，之后只读；重新加载时整体替换快照

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::executor::swap::swap_program_id;
use crate::routes::{generate_routes, Route, RouteConfigs};

fn deserialize_pubkey<'de, D>(deserializer: D) -> std::result::Result<Pubkey, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Pubkey::try_from(raw.as_str()).map_err(serde::de::Error::custom)
}

/// Token 配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// 由 JSON 的 key 填充
    #[serde(skip)]
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub mint: Pubkey,
    pub decimals: u8,
    #[serde(default)]
    pub name: Option<String>,
    /// LP token 不参与路由
    #[serde(default)]
    pub pool_token: bool,
}

/// 池子配置（SPL token-swap 兼容）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(skip)]
    pub id: String,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub account: Pubkey,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub authority: Pubkey,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub pool_token_mint: Pubkey,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub token_account_a: Pubkey,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub token_account_b: Pubkey,
    #[serde(deserialize_with = "deserialize_pubkey")]
    pub fee_account: Pubkey,
    pub fee_numerator: u64,
    pub fee_denominator: u64,
    #[serde(default)]
    pub owner_trade_fee_numerator: u64,
    #[serde(default = "default_denominator")]
    pub owner_trade_fee_denominator: u64,
    pub token_a_name: String,
    pub token_b_name: String,
    #[serde(default = "default_program_version")]
    pub program_version: u8,
    #[serde(default)]
    pub deprecated: bool,
}

fn default_denominator() -> u64 {
    10_000
}

fn default_program_version() -> u8 {
    2
}

impl PoolConfig {
    pub fn contains(&self, symbol: &str) -> bool {
        self.token_a_name == symbol || self.token_b_name == symbol
    }

    /// 池子另一侧的 token；symbol 不在池子里时返回 None
    pub fn other_token(&self, symbol: &str) -> Option<&str> {
        if self.token_a_name == symbol {
            Some(&self.token_b_name)
        } else if self.token_b_name == symbol {
            Some(&self.token_a_name)
        } else {
            None
        }
    }

    /// 总手续费率（交易费 + owner 费），返回 (分子, 分母)
    pub fn fee_fraction(&self) -> (u128, u128) {
        let trade_num = self.fee_numerator as u128;
        let trade_den = self.fee_denominator as u128;
        let owner_num = self.owner_trade_fee_numerator as u128;
        let owner_den = self.owner_trade_fee_denominator as u128;

        if trade_den == owner_den {
            (trade_num + owner_num, trade_den)
        } else {
            (trade_num * owner_den + owner_num * trade_den, trade_den * owner_den)
        }
    }
}

/// token 表 + 池子表，构造后只读
#[derive(Debug, Clone, Default)]
pub struct SwapRegistry {
    tokens: BTreeMap<String, TokenConfig>,
    pools: BTreeMap<String, PoolConfig>,
}

impl SwapRegistry {
    pub fn new(
        tokens: impl IntoIterator<Item = TokenConfig>,
        pools: impl IntoIterator<Item = PoolConfig>,
    ) -> Result<Self> {
        let registry = Self {
            tokens: tokens.into_iter().map(|t| (t.symbol.clone(), t)).collect(),
            pools: pools.into_iter().map(|p| (p.id.clone(), p)).collect(),
        };
        registry.validate()?;
        Ok(registry)
    }

    /// 从 Orca 格式的 JSON 解析（key 为 symbol / pool id）
    pub fn from_json(tokens_json: &str, pools_json: &str) -> Result<Self> {
        let tokens: BTreeMap<String, TokenConfig> =
            serde_json::from_str(tokens_json).context("Failed to parse token config")?;
        let pools: BTreeMap<String, PoolConfig> =
            serde_json::from_str(pools_json).context("Failed to parse pool config")?;

        Self::new(
            tokens.into_iter().map(|(symbol, mut token)| {
                token.symbol = symbol;
                token
            }),
            pools.into_iter().map(|(id, mut pool)| {
                pool.id = id;
                pool
            }),
        )
    }

    pub fn load(tokens_path: &Path, pools_path: &Path) -> Result<Self> {
        let tokens_json = std::fs::read_to_string(tokens_path)
            .with_context(|| format!("读取 token 配置失败: {}", tokens_path.display()))?;
        let pools_json = std::fs::read_to_string(pools_path)
            .with_context(|| format!("读取池子配置失败: {}", pools_path.display()))?;
        Self::from_json(&tokens_json, &pools_json)
    }

    fn validate(&self) -> Result<()> {
        for pool in self.pools.values() {
            for name in [&pool.token_a_name, &pool.token_b_name] {
                if !self.tokens.contains_key(name) {
                    anyhow::bail!("pool {} references unknown token {}", pool.id, name);
                }
            }
            if pool.token_a_name == pool.token_b_name {
                anyhow::bail!("pool {} has identical legs", pool.id);
            }
            if pool.fee_denominator == 0 || pool.owner_trade_fee_denominator == 0 {
                anyhow::bail!("pool {} has a zero fee denominator", pool.id);
            }
            if swap_program_id(pool.program_version).is_none() {
                anyhow::bail!(
                    "pool {} has unsupported program version {}",
                    pool.id,
                    pool.program_version
                );
            }
        }
        Ok(())
    }

    pub fn tokens(&self) -> impl Iterator<Item = &TokenConfig> {
        self.tokens.values()
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolConfig> {
        self.pools.values()
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenConfig> {
        self.tokens.get(symbol)
    }

    pub fn token_by_mint(&self, mint: &Pubkey) -> Option<&TokenConfig> {
        self.tokens.values().find(|t| t.mint == *mint)
    }

    pub fn pool(&self, id: &str) -> Option<&PoolConfig> {
        self.pools.get(id)
    }

    /// 把路由里的 pool id 解析成池子配置；有未知 id 时返回 None
    pub fn resolve_route(&self, route: &Route) -> Option<Vec<PoolConfig>> {
        route
            .pools()
            .iter()
            .map(|id| self.pools.get(id).cloned())
            .collect()
    }
}

/// 一份不可变快照：注册表 + 由它生成的路由表
#[derive(Debug)]
pub struct RegistrySnapshot {
    pub registry: SwapRegistry,
    pub routes: RouteConfigs,
}

impl RegistrySnapshot {
    pub fn new(registry: SwapRegistry) -> Self {
        let routes = generate_routes(&registry);
        Self { registry, routes }
    }
}

/// 可热重载的注册表句柄
///
/// 读方拿到的是 Arc 快照，重载只替换指针，进行中的构建不受影响
pub struct RegistryHandle {
    current: ArcSwap<RegistrySnapshot>,
    tokens_path: PathBuf,
    pools_path: PathBuf,
}

impl RegistryHandle {
    pub fn load(tokens_path: impl Into<PathBuf>, pools_path: impl Into<PathBuf>) -> Result<Self> {
        let tokens_path = tokens_path.into();
        let pools_path = pools_path.into();
        let registry = SwapRegistry::load(&tokens_path, &pools_path)?;
        let snapshot = RegistrySnapshot::new(registry);
        info!(
            "✅ 注册表已加载: {} tokens, {} pools, {} 个交易对",
            snapshot.registry.tokens.len(),
            snapshot.registry.pools.len(),
            snapshot.routes.len()
        );

        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
            tokens_path,
            pools_path,
        })
    }

    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.load_full()
    }

    /// 重新读取配置文件；失败时保留旧快照
    pub fn reload(&self) -> Result<()> {
        match SwapRegistry::load(&self.tokens_path, &self.pools_path) {
            Ok(registry) => {
                let snapshot = RegistrySnapshot::new(registry);
                info!("🔄 注册表已重新加载: {} 个交易对", snapshot.routes.len());
                self.current.store(Arc::new(snapshot));
                Ok(())
            }
            Err(e) => {
                warn!("⚠️  注册表重新加载失败，继续使用旧配置: {:#}", e);
                Err(e)
            }
        }
    }
}
