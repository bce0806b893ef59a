use crate::{BridgeAware, Translation, UniswapMulticall};
use ethers_core::types::{Address, Bytes, U256};
use lru::LruCache;
use pilot_core::types::{MetaTransaction, Operation};
use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, trace};

/// Per-call results kept by default
pub const DEFAULT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(size) => size,
    None => unreachable!(),
};

#[derive(Clone, Copy, Debug)]
pub struct TranslationOptions {
    /// Number of per-call results to memoize
    pub cache_size: NonZeroUsize,
    /// Bridge-aware module guarding the avatar, enables [`BridgeAware`]
    pub bridge_aware: Option<Address>,
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            bridge_aware: None,
        }
    }
}

/// A rewrite suggested for a recorded call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applicable {
    pub title: String,
    pub result: Vec<MetaTransaction>,
}

type CacheKey = (u64, Address, U256, Bytes, Operation);

fn cache_key(call: &MetaTransaction, chain_id: u64) -> CacheKey {
    (chain_id, call.to, call.value, call.data.clone(), call.operation)
}

/// Runs translation rules in registration order. The first rule with a result wins.
#[derive(Debug)]
pub struct Translations {
    rules: Vec<Box<dyn Translation>>,
    cache: Mutex<LruCache<CacheKey, Option<Applicable>>>,
}

impl Translations {
    /// The built-in rules: multicall unfolding, then bridge acknowledgements if a bridge-aware
    /// module is configured.
    pub fn new(options: TranslationOptions) -> Self {
        let mut rules: Vec<Box<dyn Translation>> = vec![Box::new(UniswapMulticall)];
        if let Some(module) = options.bridge_aware {
            rules.push(Box::new(BridgeAware::new(module)));
        }
        Self::with_rules(rules, options.cache_size)
    }

    pub fn with_rules(rules: Vec<Box<dyn Translation>>, cache_size: NonZeroUsize) -> Self {
        Self { rules, cache: Mutex::new(LruCache::new(cache_size)) }
    }

    pub fn rules(&self) -> impl Iterator<Item = &dyn Translation> {
        self.rules.iter().map(|rule| rule.as_ref())
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<CacheKey, Option<Applicable>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Finds the first rule that rewrites `call`.
    pub fn find_applicable(&self, call: &MetaTransaction, chain_id: u64) -> Option<Applicable> {
        let key = cache_key(call, chain_id);
        if let Some(cached) = self.cache().get(&key) {
            trace!(target: "pilot::translations", to = ?call.to, "cached translation");
            return cached.clone()
        }

        let applicable = self.rules.iter().find_map(|rule| match rule.translate(call, chain_id) {
            Ok(result) => {
                result.map(|result| Applicable { title: rule.title().to_string(), result })
            }
            Err(err) => {
                debug!(target: "pilot::translations", rule = rule.title(), %err, "not applicable");
                None
            }
        });
        self.cache().put(key, applicable.clone());
        applicable
    }

    /// Finds the first rule that rewrites the whole batch.
    pub fn translate_global(
        &self,
        batch: &[MetaTransaction],
        chain_id: u64,
        avatar: Address,
    ) -> Option<Applicable> {
        self.rules.iter().find_map(|rule| global(rule.as_ref(), batch, chain_id, avatar))
    }

    /// Applies every auto-apply rule in turn, each seeing the output of the previous one.
    ///
    /// Returns `None` if no rule changed the batch.
    pub fn auto_apply(
        &self,
        batch: &[MetaTransaction],
        chain_id: u64,
        avatar: Address,
    ) -> Option<Vec<MetaTransaction>> {
        let mut current: Option<Vec<MetaTransaction>> = None;
        for rule in self.rules.iter().filter(|rule| rule.auto_apply()) {
            let input = current.as_deref().unwrap_or(batch);
            if let Some(applied) = global(rule.as_ref(), input, chain_id, avatar) {
                debug!(target: "pilot::translations", rule = %applied.title, "auto applied");
                current = Some(applied.result);
            }
        }
        current
    }
}

impl Default for Translations {
    fn default() -> Self {
        Self::new(TranslationOptions::default())
    }
}

fn global(
    rule: &dyn Translation,
    batch: &[MetaTransaction],
    chain_id: u64,
    avatar: Address,
) -> Option<Applicable> {
    match rule.translate_global(batch, chain_id, avatar) {
        Ok(result) => result.map(|result| Applicable { title: rule.title().to_string(), result }),
        Err(err) => {
            debug!(target: "pilot::translations", rule = rule.title(), %err, "not applicable");
            None
        }
    }
}
