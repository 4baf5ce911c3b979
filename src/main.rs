use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{info, warn};
use solana_client::nonblocking::rpc_client::RpcClient;
use std::sync::Arc;

use swaprelay::compensation::{compute_fee_compensation, FeeCompensationInput, FeeWallet};
use swaprelay::config::{Config, DemoSwap};
use swaprelay::fees::BASE_SIGNATURES;
use swaprelay::registry::{RegistryHandle, RegistrySnapshot};
use swaprelay::rpc::SwapRpcClient;
use swaprelay::token::NATIVE_MINT;
use swaprelay::{SwapFeeCalculator, SwapRequest, TransactionBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    env_logger::init();

    info!("🚀 SwapRelay - Route Planner & Transaction Builder");
    info!("================================================");

    // 加载配置
    let config = Config::from_env()?;
    config.print_summary();

    // 加载注册表并生成路由
    let registry = RegistryHandle::load(&config.tokens_config_path, &config.pools_config_path)?;
    let snapshot = registry.snapshot();
    for (id, routes) in snapshot.routes.iter() {
        let direct = routes.iter().filter(|r| !r.is_transitive()).count();
        info!("  {:<16} {} 条路由 (直连 {})", id, routes.len(), direct);
    }

    let Some(demo) = config.get_demo_swap()? else {
        info!("ℹ️  未配置演示兑换，退出");
        return Ok(());
    };

    let rpc: Arc<dyn SwapRpcClient> = Arc::new(RpcClient::new_with_commitment(
        config.rpc_endpoint.clone(),
        config.get_commitment_config(),
    ));

    run_demo_swap(&config, &snapshot, rpc, demo).await
}

async fn run_demo_swap(
    config: &Config,
    snapshot: &RegistrySnapshot,
    rpc: Arc<dyn SwapRpcClient>,
    demo: DemoSwap,
) -> Result<()> {
    let registry = &snapshot.registry;
    let routes = snapshot.routes.routes_for(&demo.from, &demo.to);
    let route = routes
        .first()
        .with_context(|| format!("trading pair {}/{} is not supported", demo.from, demo.to))?;
    info!("🧭 使用路由: {:?}", route.pools());

    let source_mint = registry
        .token(&demo.from)
        .with_context(|| format!("unknown token {}", demo.from))?
        .mint;
    let destination_mint = registry
        .token(&demo.to)
        .with_context(|| format!("unknown token {}", demo.to))?
        .mint;

    // 网络费用
    let schedule = config.fee_schedule();
    let calculator = SwapFeeCalculator::new(rpc.clone(), schedule);
    let fee = calculator
        .calculate_swapping_network_fees(
            route,
            &source_mint,
            &destination_mint,
            demo.destination.as_ref(),
            &demo.owner,
        )
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.user_message(), e))?;
    info!(
        "💰 网络费用: 签名 {} + 租金 {} = {} lamports",
        fee.transaction,
        fee.account_balances,
        fee.total()
    );

    // 补偿
    let rent = rpc.token_account_rent().await?;
    let owner_lamports = rpc
        .get_account_info(&demo.owner)
        .await?
        .map_or(0, |account| account.lamports);
    let wallets = [FeeWallet {
        mint: *NATIVE_MINT,
        symbol: "SOL".to_string(),
        balance: owner_lamports,
        is_native: true,
        pool: None,
    }];
    let compensation = compute_fee_compensation(&FeeCompensationInput {
        new_accounts: fee.account_balances / rent.max(1),
        extra_signatures: (fee.transaction / schedule.lamports_per_signature).saturating_sub(BASE_SIGNATURES),
        lamports_per_signature: schedule.lamports_per_signature,
        rent_per_account: rent,
        wallets: &wallets,
        preferred_fee_token: None,
    });
    info!(
        "🧾 补偿: {} lamports (余额足够: {})",
        compensation.total_lamports, compensation.has_enough_balance
    );
    if !compensation.has_enough_balance {
        warn!("⚠️  钱包余额不足以支付手续费补偿");
    }

    // 构建交易
    let request = SwapRequest::from_route(
        registry,
        route,
        &demo.from,
        &demo.to,
        demo.owner,
        config.get_relayer()?,
        None,
        demo.destination,
        demo.amount,
        config.default_slippage_bps,
    )?;
    let builder = TransactionBuilder::new(rpc, config.builder_config());
    let preparation = builder
        .prepare_swap_transaction(request)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", e.user_message(), e))?;

    for (index, transaction) in preparation.transactions.iter().enumerate() {
        info!(
            "📦 交易 #{}: {} 条指令, 预计费用 {} lamports, 需要签名 {:?}",
            index + 1,
            transaction.instructions.len(),
            transaction.expected_fee.total(),
            transaction.required_signers
        );
        println!("{}", STANDARD.encode(transaction.message().serialize()));
    }
    if preparation.additional_payback_fee > 0 {
        info!("💸 额外交易补偿: {} lamports", preparation.additional_payback_fee);
    }

    Ok(())
}
