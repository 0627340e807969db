use std::{
    net::Ipv4Addr,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    error::{Error, Result},
    AddressPool, PoolId, PoolIdGenerator, Scope,
};

/// A snapshot of a pool handed out by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolLease {
    pub id: PoolId,
    /// The block as configured
    pub cidr: String,
    pub scope: Scope,
    pub gateway: Ipv4Addr,
}

impl PoolLease {
    fn of(pool: &AddressPool, scope: Scope) -> Self {
        Self {
            id: pool.id().clone(),
            cidr: pool.cidr().to_string(),
            scope,
            gateway: pool.gateway(),
        }
    }
}

/// Pools of both scopes, in configuration order
#[derive(Debug, Default)]
struct Pools {
    global: Vec<AddressPool>,
    local: Vec<AddressPool>,
}

impl Pools {
    fn scope(&self, scope: Scope) -> &[AddressPool] {
        match scope {
            Scope::Global => &self.global,
            Scope::Local => &self.local,
        }
    }

    fn scope_mut(&mut self, scope: Scope) -> &mut [AddressPool] {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Local => &mut self.local,
        }
    }

    /// Search global pools first, then local ones
    fn by_id_mut(&mut self, id: &str) -> Result<(&mut AddressPool, Scope)> {
        let Self { global, local } = self;
        global
            .iter_mut()
            .map(|pool| (pool, Scope::Global))
            .chain(local.iter_mut().map(|pool| (pool, Scope::Local)))
            .find(|(pool, _)| pool.id() == id)
            .ok_or_else(|| Error::PoolNotFound(id.to_string()))
    }
}

/// The global and local pool collections.
///
/// Membership is fixed at construction. Every operation holds the registry lock for its whole
/// lookup-and-mutate sequence, so two callers can never claim the same pool or address.
#[derive(Debug)]
pub struct PoolRegistry {
    pools: Mutex<Pools>,
}

impl PoolRegistry {
    /// Build every pool from its CIDR block, generating a fresh identifier for each
    pub fn new<S: AsRef<str>>(global: &[S], local: &[S]) -> Result<Self> {
        Self::with_generator(global, local, &mut PoolIdGenerator::new())
    }

    /// Build every pool, drawing identifiers from `generator`
    pub fn with_generator<S: AsRef<str>>(
        global: &[S],
        local: &[S],
        generator: &mut PoolIdGenerator,
    ) -> Result<Self> {
        let mut build = |cidrs: &[S]| -> Result<Vec<AddressPool>> {
            cidrs
                .iter()
                .map(|cidr| AddressPool::new(cidr.as_ref(), generator.generate()))
                .collect()
        };
        let global = build(global)?;
        let local = build(local)?;

        Ok(Self {
            pools: Mutex::new(Pools { global, local }),
        })
    }

    /// Acquire the registry lock. A panic while holding it cannot leave a pool half-updated,
    /// so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Pools> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the first free pool of a scope, in configuration order
    #[profiling::function]
    pub fn find_free_pool(&self, scope: Scope) -> Result<PoolLease> {
        let mut pools = self.lock();
        let pool = pools
            .scope_mut(scope)
            .iter_mut()
            .find(|pool| !pool.is_taken())
            .ok_or(Error::PoolExhausted(scope))?;
        pool.set_taken(true);
        log::debug!("Claimed free {} pool {} ({})", scope, pool.id(), pool.cidr());
        Ok(PoolLease::of(pool, scope))
    }

    /// Claim the pool of a scope configured with exactly `cidr`.
    ///
    /// The claim succeeds even if the pool is already taken.
    #[profiling::function]
    pub fn find_pool_by_value(&self, scope: Scope, cidr: &str) -> Result<PoolLease> {
        let mut pools = self.lock();
        let pool = pools
            .scope_mut(scope)
            .iter_mut()
            .find(|pool| pool.cidr() == cidr)
            .ok_or_else(|| Error::PoolNotFound(cidr.to_string()))?;
        if pool.is_taken() {
            log::warn!("Pool {} ({}) was requested again while taken", pool.id(), cidr);
        }
        pool.set_taken(true);
        log::debug!("Claimed {} pool {} ({})", scope, pool.id(), cidr);
        Ok(PoolLease::of(pool, scope))
    }

    /// Look up a pool of either scope by its identifier without claiming it
    pub fn find_pool_by_id(&self, id: &str) -> Result<PoolLease> {
        let mut pools = self.lock();
        let (pool, scope) = pools.by_id_mut(id)?;
        Ok(PoolLease::of(pool, scope))
    }

    /// Mark a pool free again. Returns `false` if no pool has this identifier.
    pub fn release_pool(&self, id: &str) -> bool {
        let mut pools = self.lock();
        match pools.by_id_mut(id) {
            Ok((pool, scope)) => {
                pool.set_taken(false);
                log::debug!("Released {} pool {} ({})", scope, id, pool.cidr());
                true
            }
            Err(_) => false,
        }
    }

    /// Issue the next available address of a pool
    #[profiling::function]
    pub fn take_address(&self, id: &str) -> Result<Ipv4Addr> {
        self.lock().by_id_mut(id)?.0.take_address()
    }

    /// Return an issued address to its pool
    #[profiling::function]
    pub fn release_address(&self, id: &str, addr: Ipv4Addr) -> Result<()> {
        self.lock().by_id_mut(id)?.0.release_address(addr)
    }

    /// Remember an explicitly requested address. Returns `false` if no pool has this identifier.
    pub fn record_external_address(&self, id: &str, addr: Ipv4Addr) -> bool {
        match self.lock().by_id_mut(id) {
            Ok((pool, _)) => {
                pool.record_external(addr);
                true
            }
            Err(_) => false,
        }
    }

    /// Run `f` against a pool while holding the registry lock
    pub fn with_pool<R>(&self, id: &str, f: impl FnOnce(&AddressPool) -> R) -> Result<R> {
        let mut pools = self.lock();
        let (pool, _) = pools.by_id_mut(id)?;
        Ok(f(pool))
    }

    #[must_use]
    pub fn pool_count(&self, scope: Scope) -> usize {
        self.lock().scope(scope).len()
    }

    #[must_use]
    pub fn taken_count(&self, scope: Scope) -> usize {
        ScopeUsage::of(self.lock().scope(scope)).taken
    }

    /// Total number of addresses still available across a scope
    #[must_use]
    pub fn available_count(&self, scope: Scope) -> usize {
        ScopeUsage::of(self.lock().scope(scope)).available
    }

    /// Occupancy of both scopes, read under a single lock
    #[must_use]
    pub fn usage(&self) -> Usage {
        let pools = self.lock();
        Usage {
            global: ScopeUsage::of(pools.scope(Scope::Global)),
            local: ScopeUsage::of(pools.scope(Scope::Local)),
        }
    }
}

/// Occupancy of the pools of one scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeUsage {
    pub pools: usize,
    pub taken: usize,
    /// Addresses that can still be issued across every pool of the scope
    pub available: usize,
}

impl ScopeUsage {
    fn of(pools: &[AddressPool]) -> Self {
        Self {
            pools: pools.len(),
            taken: pools.iter().filter(|pool| pool.is_taken()).count(),
            available: pools.iter().map(|pool| pool.available().len()).sum(),
        }
    }
}

/// A consistent snapshot of registry occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub global: ScopeUsage,
    pub local: ScopeUsage,
}

impl Usage {
    #[must_use]
    pub fn scope(&self, scope: Scope) -> ScopeUsage {
        match scope {
            Scope::Global => self.global,
            Scope::Local => self.local,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    fn registry() -> PoolRegistry {
        PoolRegistry::new(
            &["10.0.0.0/24", "10.0.1.0/24"],
            &["192.168.0.0/24", "192.168.1.0/28"],
        )
        .unwrap()
    }

    #[test]
    fn test_construction() {
        let registry = registry();
        assert_eq!(registry.pool_count(Scope::Global), 2);
        assert_eq!(registry.pool_count(Scope::Local), 2);
        assert_eq!(registry.taken_count(Scope::Global), 0);
        assert_eq!(registry.available_count(Scope::Global), 506);
        assert_eq!(registry.available_count(Scope::Local), 253 + 13);
    }

    #[test]
    fn test_usage_snapshot() {
        let registry = registry();
        let lease = registry.find_free_pool(Scope::Local).unwrap();
        registry.take_address(lease.id.as_str()).unwrap();

        let usage = registry.usage();
        assert_eq!(
            usage.scope(Scope::Global),
            ScopeUsage {
                pools: 2,
                taken: 0,
                available: 506
            }
        );
        assert_eq!(
            usage.local,
            ScopeUsage {
                pools: 2,
                taken: 1,
                available: 252 + 13
            }
        );
        assert_eq!(usage.local.taken, registry.taken_count(Scope::Local));
        assert_eq!(usage.local.available, registry.available_count(Scope::Local));
    }

    #[test]
    fn test_padded_cidr_is_found_by_value() {
        let registry = PoolRegistry::new(&[" 10.0.0.0/24 "], &[] as &[&str]).unwrap();
        let lease = registry
            .find_pool_by_value(Scope::Global, "10.0.0.0/24")
            .unwrap();
        assert_eq!(lease.cidr, "10.0.0.0/24");
    }

    #[test]
    fn test_invalid_pool_aborts_construction() {
        let result = PoolRegistry::new(&["10.0.0.0/24"], &["192.168.0.0"]);
        assert!(matches!(result, Err(Error::InvalidPoolConfiguration(_))));
    }

    #[test]
    fn test_free_pools_in_order_then_exhausted() {
        let registry = registry();
        assert_eq!(
            registry.find_free_pool(Scope::Global).unwrap().cidr,
            "10.0.0.0/24"
        );
        assert_eq!(
            registry.find_free_pool(Scope::Global).unwrap().cidr,
            "10.0.1.0/24"
        );
        assert_eq!(
            registry.find_free_pool(Scope::Global),
            Err(Error::PoolExhausted(Scope::Global))
        );

        // Global exhaustion never spills into the local scope
        assert_eq!(registry.taken_count(Scope::Local), 0);
    }

    #[test]
    fn test_release_makes_pool_free_again() {
        let registry = registry();
        let lease = registry.find_free_pool(Scope::Local).unwrap();
        assert!(registry.release_pool(lease.id.as_str()));
        assert!(registry.release_pool(lease.id.as_str()));
        assert_eq!(registry.find_free_pool(Scope::Local).unwrap(), lease);
    }

    #[test]
    fn test_release_unknown_pool() {
        assert!(!registry().release_pool("missing"));
    }

    #[test]
    fn test_find_by_value_is_scoped() {
        let registry = registry();
        let lease = registry
            .find_pool_by_value(Scope::Local, "192.168.1.0/28")
            .unwrap();
        assert_eq!(lease.scope, Scope::Local);
        assert_eq!(lease.gateway, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(registry.taken_count(Scope::Local), 1);

        assert_eq!(
            registry.find_pool_by_value(Scope::Global, "192.168.1.0/28"),
            Err(Error::PoolNotFound("192.168.1.0/28".to_string()))
        );
    }

    #[test]
    fn test_find_by_id_spans_scopes() {
        let registry = registry();
        let local = registry.find_free_pool(Scope::Local).unwrap();
        assert_eq!(registry.find_pool_by_id(local.id.as_str()).unwrap(), local);
        assert!(matches!(
            registry.find_pool_by_id("missing"),
            Err(Error::PoolNotFound(_))
        ));
    }

    #[test]
    fn test_address_round_trip() {
        let registry = registry();
        let lease = registry.find_free_pool(Scope::Global).unwrap();
        let id = lease.id.as_str();

        let addr = registry.take_address(id).unwrap();
        registry.release_address(id, addr).unwrap();
        assert_eq!(registry.take_address(id).unwrap(), addr);
        assert_eq!(
            registry.with_pool(id, AddressPool::issued_len).unwrap(),
            1
        );
        assert!(matches!(
            registry.take_address("missing"),
            Err(Error::PoolNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_pool_claims_are_unique() {
        let cidrs: Vec<String> = (0..64).map(|i| format!("10.{i}.0.0/24")).collect();
        let registry = Arc::new(PoolRegistry::new(cidrs.as_slice(), &[] as &[String]).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let mut claimed = Vec::new();
                    while let Ok(lease) = registry.find_free_pool(Scope::Global) {
                        claimed.push(lease.id);
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "pool claimed twice");
            }
        }
        assert_eq!(seen.len(), 64);
    }

    #[test]
    fn test_concurrent_address_requests_are_unique() {
        let registry = Arc::new(PoolRegistry::new(&["10.0.0.0/22"], &[] as &[&str]).unwrap());
        let id = registry.find_free_pool(Scope::Global).unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let id = id.clone();
                thread::spawn(move || {
                    let mut issued = Vec::new();
                    while let Ok(addr) = registry.take_address(id.as_str()) {
                        issued.push(addr);
                    }
                    issued
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for addr in handle.join().unwrap() {
                assert!(seen.insert(addr), "address issued twice");
            }
        }
        assert_eq!(seen.len(), 1021);
    }
}
