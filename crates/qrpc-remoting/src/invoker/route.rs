//! Load-balancing policies for multi-address services.
//!
//! A policy picks one address from the ordered candidate set of a service
//! key. Stateful policies keep their state per service key and are safe
//! under concurrent routing for the same key; that state is dropped every
//! 24 hours so long-gone addresses do not accumulate.

use crate::domain::{LoadBalance, ServiceKey};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifetime of per-key policy state
const STATE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Virtual nodes per address on the hash ring
const VIRTUAL_NODES: usize = 100;

/// LFU counters are reset once one passes this value
const LFU_COUNT_CEILING: u64 = 1_000_000;

/// Address selection policy.
pub trait LoadBalancer: Send + Sync {
    /// Pick one of `addresses`. Returns `None` only for an empty set.
    fn route(&self, service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String>;
}

impl LoadBalance {
    /// Policy implementation for this variant
    pub fn router(&self) -> Arc<dyn LoadBalancer> {
        match self {
            LoadBalance::Random => Arc::new(RandomBalancer),
            LoadBalance::Round => Arc::new(RoundBalancer::default()),
            LoadBalance::Lru => Arc::new(LruBalancer::default()),
            LoadBalance::Lfu => Arc::new(LfuBalancer::default()),
            LoadBalance::ConsistentHash => Arc::new(ConsistentHashBalancer),
        }
    }
}

/// Per-service-key state, cleared every [`STATE_TTL`]
struct KeyedState<T> {
    entries: DashMap<ServiceKey, T>,
    expires_at: Mutex<Instant>,
}

impl<T: Default> KeyedState<T> {
    fn with<R>(&self, key: &ServiceKey, f: impl FnOnce(&mut T) -> R) -> R {
        {
            let mut expires_at = self.expires_at.lock();
            let now = Instant::now();
            if now >= *expires_at {
                self.entries.clear();
                *expires_at = now + STATE_TTL;
            }
        }
        let mut entry = self.entries.entry(key.clone()).or_default();
        f(entry.value_mut())
    }
}

impl<T> Default for KeyedState<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            expires_at: Mutex::new(Instant::now() + STATE_TTL),
        }
    }
}

/// Uniform random pick
#[derive(Debug, Default)]
pub struct RandomBalancer;

impl LoadBalancer for RandomBalancer {
    fn route(&self, _service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..addresses.len());
        addresses.iter().nth(index).cloned()
    }
}

/// Round robin from a random starting point
#[derive(Default)]
pub struct RoundBalancer {
    counters: KeyedState<RoundCounter>,
}

struct RoundCounter(AtomicUsize);

impl Default for RoundCounter {
    fn default() -> Self {
        // Random start so restarted invokers do not all hit the first address
        Self(AtomicUsize::new(rand::thread_rng().gen_range(0..100)))
    }
}

impl LoadBalancer for RoundBalancer {
    fn route(&self, service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        let count = self
            .counters
            .with(service_key, |counter| counter.0.fetch_add(1, Ordering::Relaxed));
        addresses.iter().nth(count % addresses.len()).cloned()
    }
}

/// Least recently used address
#[derive(Default)]
pub struct LruBalancer {
    orders: KeyedState<VecDeque<String>>,
}

impl LoadBalancer for LruBalancer {
    fn route(&self, service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        self.orders.with(service_key, |order| {
            order.retain(|address| addresses.contains(address));
            for address in addresses {
                if !order.contains(address) {
                    order.push_back(address.clone());
                }
            }

            let eldest = order.pop_front()?;
            order.push_back(eldest.clone());
            Some(eldest)
        })
    }
}

/// Least frequently used address
#[derive(Default)]
pub struct LfuBalancer {
    counts: KeyedState<HashMap<String, u64>>,
}

impl LoadBalancer for LfuBalancer {
    fn route(&self, service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String> {
        if addresses.is_empty() {
            return None;
        }
        self.counts.with(service_key, |counts| {
            counts.retain(|address, _| addresses.contains(address));
            let mut rng = rand::thread_rng();
            for address in addresses {
                if !counts.contains_key(address) || counts[address] > LFU_COUNT_CEILING {
                    // Random initial spread so new invokers do not stampede one address
                    counts.insert(address.clone(), rng.gen_range(0..addresses.len() as u64));
                }
            }

            let chosen = addresses
                .iter()
                .min_by_key(|address| counts.get(*address).copied().unwrap_or(0))?
                .clone();
            *counts.entry(chosen.clone()).or_insert(0) += 1;
            Some(chosen)
        })
    }
}

/// Ring of virtual nodes hashed on the service key.
///
/// Stateless: the same key and address set always give the same address.
#[derive(Debug, Default)]
pub struct ConsistentHashBalancer;

impl ConsistentHashBalancer {
    fn hash(data: &str) -> u64 {
        let digest = Sha256::digest(data.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }
}

impl LoadBalancer for ConsistentHashBalancer {
    fn route(&self, service_key: &ServiceKey, addresses: &BTreeSet<String>) -> Option<String> {
        let mut ring = BTreeMap::new();
        for address in addresses {
            for node in 0..VIRTUAL_NODES {
                ring.insert(Self::hash(&format!("SHARD-{address}-NODE-{node}")), address);
            }
        }

        let point = Self::hash(service_key.as_str());
        ring.range(point..)
            .next()
            .or_else(|| ring.iter().next())
            .map(|(_, address)| (*address).clone())
    }
}
