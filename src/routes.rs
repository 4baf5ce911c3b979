//! 交易对 ID 与路由表生成
//!
//! 纯计算，无 I/O。路由最多两跳：直连池子，或经过一个中间 token 的两个池子

use log::debug;
use std::collections::BTreeMap;

use crate::registry::{PoolConfig, SwapRegistry};

/// 稳定币在交易对里总是排在第二位
pub const STABLE_TOKENS: [&str; 2] = ["USDC", "USDT"];

pub const TRADE_ID_SEPARATOR: char = '/';

pub const MAX_ROUTE_LEGS: usize = 2;

fn is_stable(symbol: &str) -> bool {
    STABLE_TOKENS.contains(&symbol)
}

/// 确定性的二元排序
pub fn order_pair<'a>(x: &'a str, y: &'a str) -> (&'a str, &'a str) {
    match (is_stable(x), is_stable(y)) {
        (true, false) => (y, x),
        (false, true) => (x, y),
        _ if x <= y => (x, y),
        _ => (y, x),
    }
}

/// 与方向无关的交易对 ID：trade_id(A, B) == trade_id(B, A)
pub fn trade_id(x: &str, y: &str) -> String {
    let (first, second) = order_pair(x, y);
    format!("{}{}{}", first, TRADE_ID_SEPARATOR, second)
}

/// 一条路由：1 到 2 个 pool id，按兑换顺序排列
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route(Vec<String>);

impl Route {
    pub fn direct(pool_id: impl Into<String>) -> Self {
        Route(vec![pool_id.into()])
    }

    pub fn two_hop(first: impl Into<String>, second: impl Into<String>) -> Self {
        Route(vec![first.into(), second.into()])
    }

    pub fn pools(&self) -> &[String] {
        &self.0
    }

    pub fn legs(&self) -> usize {
        self.0.len()
    }

    pub fn is_transitive(&self) -> bool {
        self.0.len() == MAX_ROUTE_LEGS
    }

    pub fn reversed(&self) -> Self {
        Route(self.0.iter().rev().cloned().collect())
    }
}

/// trade id -> 候选路由（方向为 trade id 的第一个 token 到第二个 token）
#[derive(Debug, Clone, Default)]
pub struct RouteConfigs {
    routes: BTreeMap<String, Vec<Route>>,
}

impl RouteConfigs {
    pub fn get(&self, trade_id: &str) -> Option<&[Route]> {
        self.routes.get(trade_id).map(Vec::as_slice)
    }

    /// from -> to 方向的路由；空列表表示该交易对不支持
    pub fn routes_for(&self, from: &str, to: &str) -> Vec<Route> {
        let Some(routes) = self.routes.get(&trade_id(from, to)) else {
            return Vec::new();
        };
        if order_pair(from, to).0 == from {
            routes.clone()
        } else {
            routes.iter().map(Route::reversed).collect()
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Route>)> {
        self.routes.iter()
    }
}

/// 为所有非 LP token 的无序对生成路由
///
/// 结果 = 直连池子 ∪ { (含 A 不含 B 的池子, 含中间 token 和 B 的池子) }
pub fn generate_routes(registry: &SwapRegistry) -> RouteConfigs {
    let symbols: Vec<&str> = registry
        .tokens()
        .filter(|t| !t.pool_token)
        .map(|t| t.symbol.as_str())
        .collect();
    let pools: Vec<&PoolConfig> = registry.pools().filter(|p| !p.deprecated).collect();

    let mut routes = BTreeMap::new();
    for (i, a) in symbols.iter().enumerate() {
        for b in &symbols[i + 1..] {
            let (from, to) = order_pair(a, b);
            let candidates = routes_between(from, to, &pools, registry);
            if !candidates.is_empty() {
                debug!("🛣️  {}: {} 条路由", trade_id(from, to), candidates.len());
            }
            routes.insert(trade_id(from, to), candidates);
        }
    }

    RouteConfigs { routes }
}

fn routes_between(
    from: &str,
    to: &str,
    pools: &[&PoolConfig],
    registry: &SwapRegistry,
) -> Vec<Route> {
    let mut routes: Vec<Route> = pools
        .iter()
        .filter(|p| p.contains(from) && p.contains(to))
        .map(|p| Route::direct(p.id.clone()))
        .collect();

    for first in pools.iter().filter(|p| p.contains(from) && !p.contains(to)) {
        let Some(middle) = first.other_token(from) else {
            continue;
        };
        if registry.token(middle).map_or(true, |t| t.pool_token) {
            continue;
        }
        for second in pools.iter().filter(|p| p.contains(middle) && p.contains(to)) {
            routes.push(Route::two_hop(first.id.clone(), second.id.clone()));
        }
    }

    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TokenConfig;
    use solana_sdk::pubkey::Pubkey;

    fn token(symbol: &str) -> TokenConfig {
        TokenConfig {
            symbol: symbol.to_string(),
            mint: Pubkey::new_unique(),
            decimals: 6,
            name: None,
            pool_token: false,
        }
    }

    fn pool(a: &str, b: &str) -> PoolConfig {
        PoolConfig {
            id: format!("{}/{}", a, b),
            account: Pubkey::new_unique(),
            authority: Pubkey::new_unique(),
            pool_token_mint: Pubkey::new_unique(),
            token_account_a: Pubkey::new_unique(),
            token_account_b: Pubkey::new_unique(),
            fee_account: Pubkey::new_unique(),
            fee_numerator: 25,
            fee_denominator: 10_000,
            owner_trade_fee_numerator: 5,
            owner_trade_fee_denominator: 10_000,
            token_a_name: a.to_string(),
            token_b_name: b.to_string(),
            program_version: 2,
            deprecated: false,
        }
    }

    fn registry(tokens: &[&str], pools: Vec<PoolConfig>) -> SwapRegistry {
        SwapRegistry::new(tokens.iter().map(|s| token(s)), pools).unwrap()
    }

    #[test]
    fn trade_id_is_symmetric_and_stable() {
        let symbols = ["SOL", "USDC", "USDT", "ETH", "BTC", "ORCA"];
        for x in symbols {
            for y in symbols {
                assert_eq!(trade_id(x, y), trade_id(y, x));
                assert_eq!(trade_id(x, y), trade_id(x, y));
            }
        }
    }

    #[test]
    fn stable_token_goes_second() {
        assert_eq!(trade_id("USDC", "SOL"), "SOL/USDC");
        assert_eq!(trade_id("ZZZ", "USDT"), "ZZZ/USDT");
        assert_eq!(trade_id("USDT", "USDC"), "USDC/USDT");
        assert_eq!(trade_id("SOL", "ETH"), "ETH/SOL");
    }

    #[test]
    fn two_hop_route_through_shared_token() {
        let registry = registry(&["A", "B", "C", "D"], vec![pool("A", "B"), pool("B", "C")]);
        let routes = generate_routes(&registry);

        let a_c = routes.get(&trade_id("A", "C")).unwrap();
        assert_eq!(a_c, &[Route::two_hop("A/B", "B/C")]);

        assert!(routes.get(&trade_id("A", "D")).unwrap().is_empty());
    }

    #[test]
    fn direct_routes_come_before_two_hop() {
        let registry = registry(
            &["A", "B", "C"],
            vec![pool("A", "B"), pool("B", "C"), pool("A", "C")],
        );
        let routes = generate_routes(&registry);
        let a_c = routes.get(&trade_id("A", "C")).unwrap();
        assert_eq!(a_c, &[Route::direct("A/C"), Route::two_hop("A/B", "B/C")]);
    }

    #[test]
    fn routes_never_exceed_two_legs_and_legs_connect() {
        let registry = registry(
            &["A", "B", "C", "D", "E"],
            vec![pool("A", "B"), pool("B", "C"), pool("C", "D"), pool("D", "E"), pool("A", "E")],
        );
        let routes = generate_routes(&registry);

        for (id, candidates) in routes.iter() {
            let (from, to) = id.split_once(TRADE_ID_SEPARATOR).unwrap();
            for route in candidates {
                assert!(route.legs() >= 1 && route.legs() <= MAX_ROUTE_LEGS);
                let pools = registry.resolve_route(route).unwrap();
                assert!(pools[0].contains(from));
                assert!(pools.last().unwrap().contains(to));
                if route.is_transitive() {
                    let middle = pools[0].other_token(from).unwrap();
                    assert!(pools[1].contains(middle));
                }
            }
        }
    }

    #[test]
    fn pool_tokens_and_deprecated_pools_are_excluded() {
        let mut lp = token("A/B");
        lp.pool_token = true;
        let mut old = pool("A", "C");
        old.deprecated = true;
        let registry = SwapRegistry::new(
            vec![token("A"), token("B"), token("C"), lp],
            vec![pool("A", "B"), old],
        )
        .unwrap();

        let routes = generate_routes(&registry);
        assert!(routes.get(&trade_id("A", "A/B")).is_none());
        assert!(routes.get(&trade_id("A", "C")).unwrap().is_empty());
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn routes_for_reorients_legs() {
        let registry = registry(&["A", "B", "C"], vec![pool("A", "B"), pool("B", "C")]);
        let routes = generate_routes(&registry);

        assert_eq!(routes.routes_for("A", "C"), vec![Route::two_hop("A/B", "B/C")]);
        assert_eq!(routes.routes_for("C", "A"), vec![Route::two_hop("B/C", "A/B")]);
        assert!(routes.routes_for("A", "Z").is_empty());
    }
}
