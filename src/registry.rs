//! Static catalog of tracked positions, plus grouping helpers.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::config::{Config, LendingPool, ProtocolContracts};
use crate::types::{Balance, Position};

/// Immutable, per-process view of every protocol's contracts.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    protocols: BTreeMap<String, HashMap<String, ProtocolContracts>>,
}

impl Registry {
    pub fn from_config(config: &Config) -> Self {
        let protocols = config
            .protocols
            .iter()
            .map(|(protocol, chains)| {
                let chains = chains
                    .iter()
                    .map(|(chain, contracts)| {
                        let mut contracts = contracts.clone();
                        for position in &mut contracts.positions {
                            position.chain = chain.clone();
                        }
                        (chain.clone(), contracts)
                    })
                    .collect();
                (protocol.clone(), chains)
            })
            .collect();

        Self { protocols }
    }

    pub fn protocols(&self) -> impl Iterator<Item = &str> {
        self.protocols.keys().map(String::as_str)
    }

    pub fn protocol_positions(&self, protocol: &str, chain: &str) -> Vec<Position> {
        self.protocols
            .get(protocol)
            .and_then(|chains| chains.get(chain))
            .map(|contracts| contracts.positions.clone())
            .unwrap_or_default()
    }

    /// All positions on a chain, across protocols
    pub fn positions(&self, chain: &str) -> Vec<Position> {
        self.protocols()
            .flat_map(|protocol| self.protocol_positions(protocol, chain))
            .collect()
    }

    pub fn protocol_lending_pools(&self, protocol: &str, chain: &str) -> Vec<LendingPool> {
        self.protocols
            .get(protocol)
            .and_then(|chains| chains.get(chain))
            .map(|contracts| contracts.lending_pools.clone())
            .unwrap_or_default()
    }

    /// All lending pools on a chain, across protocols
    pub fn lending_pools(&self, chain: &str) -> Vec<LendingPool> {
        self.protocols()
            .flat_map(|protocol| self.protocol_lending_pools(protocol, chain))
            .collect()
    }
}

/// Group items by key, keeping each group in input order.
pub fn group_by<K, T>(items: impl IntoIterator<Item = T>, key: impl Fn(&T) -> K) -> HashMap<K, Vec<T>>
where
    K: Eq + Hash,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    for item in items {
        groups.entry(key(&item)).or_default().push(item);
    }
    groups
}

pub fn group_by_provider(balances: Vec<Balance>) -> HashMap<Option<String>, Vec<Balance>> {
    group_by(balances, |balance| balance.provider.clone())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;
    use crate::types::Category;

    #[test]
    fn test_positions_are_stamped_with_chain() {
        let config = Config::load().unwrap();
        let registry = Registry::from_config(&config);

        let positions = registry.positions("ethereum");
        assert!(!positions.is_empty());
        assert!(positions.iter().all(|p| p.chain == "ethereum"));
        assert!(registry.positions("fantom").is_empty());
    }

    #[test]
    fn test_lending_pools_by_chain() {
        let config = Config::load().unwrap();
        let registry = Registry::from_config(&config);

        assert_eq!(registry.lending_pools("fantom").len(), 1);
        assert!(registry.lending_pools("ethereum").is_empty());
        assert!(registry.protocol_lending_pools("geist", "ethereum").is_empty());
    }

    #[test]
    fn test_unknown_protocol_is_empty() {
        let registry = Registry::default();
        assert!(registry.protocol_positions("nope", "ethereum").is_empty());
        assert_eq!(registry.protocols().count(), 0);
    }

    #[test]
    fn test_group_by_preserves_order_within_group() {
        let groups = group_by(vec![1, 2, 3, 4, 5, 6], |n| n % 2);
        assert_eq!(groups[&0], vec![2, 4, 6]);
        assert_eq!(groups[&1], vec![1, 3, 5]);
    }

    #[test]
    fn test_group_by_provider() {
        let balance = |byte: u8, provider: Option<&str>| {
            let mut balance = Balance::new("ethereum", Address::repeat_byte(byte), Category::Farm)
                .with_amount(U256::from(byte));
            balance.provider = provider.map(str::to_string);
            balance
        };

        let groups = group_by_provider(vec![
            balance(1, Some("uniswap")),
            balance(2, Some("curve")),
            balance(3, Some("uniswap")),
            balance(4, None),
        ]);

        assert_eq!(groups.len(), 3);
        let uniswap = &groups[&Some("uniswap".to_string())];
        assert_eq!(uniswap[0].address, Address::repeat_byte(1));
        assert_eq!(uniswap[1].address, Address::repeat_byte(3));
        assert_eq!(groups[&None].len(), 1);
    }
}
