use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use templeerp_core::TenantId;

/// Keyed rows partitioned by temple. Every call names the tenant; there is no
/// cross-tenant read.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn list(&self, tenant_id: TenantId) -> Vec<V>;

    /// Mutate a row in place, starting from `V::default()` when absent.
    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(&mut V))
    where
        V: Default;

    /// Drop every row of every tenant ahead of a replay.
    fn clear_all(&self);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(&mut V))
    where
        V: Default,
    {
        (**self).update(tenant_id, key, f)
    }

    fn clear_all(&self) {
        (**self).clear_all()
    }
}

/// Process-local store. Rows live in one map per tenant.
///
/// A poisoned lock reads as empty and drops writes; the read models are
/// rebuilt from the event store on the next boot.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    tenants: RwLock<HashMap<TenantId, HashMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let tenants = self.tenants.read().ok()?;
        tenants.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let mut tenants = self.tenants.write().ok()?;
        tenants.get_mut(&tenant_id)?.remove(key)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        self.tenants
            .read()
            .ok()
            .and_then(|tenants| tenants.get(&tenant_id).map(|rows| rows.values().cloned().collect()))
            .unwrap_or_default()
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(&mut V))
    where
        V: Default,
    {
        if let Ok(mut tenants) = self.tenants.write() {
            f(tenants.entry(tenant_id).or_default().entry(key).or_default());
        }
    }

    fn clear_all(&self) {
        if let Ok(mut tenants) = self.tenants.write() {
            tenants.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temples_never_see_each_others_rows() {
        let store: InMemoryTenantStore<&'static str, i32> = InMemoryTenantStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());

        store.upsert(t1, "hundi", 1);
        store.upsert(t2, "hundi", 2);

        assert_eq!(store.get(t1, &"hundi"), Some(1));
        assert_eq!(store.get(t2, &"hundi"), Some(2));
        assert_eq!(store.list(t1), vec![1]);
        assert_eq!(store.remove(t2, &"hundi"), Some(2));
        assert!(store.get(t2, &"hundi").is_none());
        assert_eq!(store.get(t1, &"hundi"), Some(1));
    }

    #[test]
    fn update_starts_from_default_and_accumulates() {
        let store: InMemoryTenantStore<u32, Vec<&'static str>> = InMemoryTenantStore::new();
        let t = TenantId::new();

        store.update(t, 7, &mut |rows| rows.push("lamp"));
        store.update(t, 7, &mut |rows| rows.push("wick"));

        assert_eq!(store.get(t, &7), Some(vec!["lamp", "wick"]));
        assert!(store.list(TenantId::new()).is_empty());
    }

    #[test]
    fn clear_all_empties_every_tenant() {
        let store: InMemoryTenantStore<u8, u8> = InMemoryTenantStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        store.upsert(t1, 1, 1);
        store.upsert(t2, 2, 2);

        store.clear_all();

        assert!(store.list(t1).is_empty());
        assert!(store.list(t2).is_empty());
    }
}
