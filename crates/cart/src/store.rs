//! Concurrent in-memory cart store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};

use common::CartId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::cart::Cart;

/// Working state behind the per-cart lock.
struct CartEntry {
    cart: Cart,
    /// Set when the cart is deleted while another task waits on its lock.
    removed: bool,
}

struct CartSlot {
    /// Last committed state; what readers see.
    committed: SyncRwLock<Cart>,
    entry: Arc<Mutex<CartEntry>>,
}

impl CartSlot {
    fn new(cart: Cart) -> Self {
        Self {
            committed: SyncRwLock::new(cart.clone()),
            entry: Arc::new(Mutex::new(CartEntry {
                cart,
                removed: false,
            })),
        }
    }

    fn snapshot(&self) -> Cart {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn commit(&self, cart: &Cart) {
        *self
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = cart.clone();
    }
}

/// Keyed store of carts with per-cart exclusive access.
///
/// The map itself is guarded by a read-write lock. Each cart sits behind its
/// own async mutex so compound sequences (read-merge-write on add-item,
/// load-authorize-publish-delete on checkout) run without interleaving on
/// the same cart while different carts proceed in parallel.
///
/// Plain reads never take the per-cart mutex: they return the last committed
/// snapshot, so a checkout stuck on a slow collaborator does not hold up
/// `get` on the same cart.
///
/// Constructed once per process and shared via `Arc`.
#[derive(Default)]
pub struct CartStore {
    carts: RwLock<HashMap<CartId, Arc<CartSlot>>>,
}

impl CartStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new cart, replacing any cart with the same ID.
    pub async fn insert(&self, cart: Cart) {
        let id = cart.id();
        self.carts
            .write()
            .await
            .insert(id, Arc::new(CartSlot::new(cart)));
    }

    /// Returns the last committed state of a cart.
    pub async fn get(&self, id: CartId) -> Option<Cart> {
        let slot = self.carts.read().await.get(&id).cloned()?;
        Some(slot.snapshot())
    }

    /// Takes exclusive access to a cart.
    ///
    /// Returns `None` if the cart does not exist, including when it was
    /// removed while this call was waiting for the lock.
    pub async fn lock(&self, id: CartId) -> Option<LockedCart> {
        let slot = self.carts.read().await.get(&id).cloned()?;
        let guard = Arc::clone(&slot.entry).lock_owned().await;
        if guard.removed {
            return None;
        }
        Some(LockedCart { slot, guard })
    }

    /// Deletes a cart the caller holds exclusive access to.
    pub async fn remove(&self, mut locked: LockedCart) {
        let id = locked.cart().id();
        self.carts.write().await.remove(&id);
        locked.guard.removed = true;
    }

    /// Number of carts currently stored.
    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }
}

/// Exclusive handle on one cart; the lock is released on drop.
pub struct LockedCart {
    slot: Arc<CartSlot>,
    guard: OwnedMutexGuard<CartEntry>,
}

impl LockedCart {
    pub fn cart(&self) -> &Cart {
        &self.guard.cart
    }

    /// Applies `f` to a copy of the cart and commits it if `f` succeeds.
    ///
    /// On error the cart is left exactly as it was.
    pub fn update<T, E>(&mut self, f: impl FnOnce(&mut Cart) -> Result<T, E>) -> Result<T, E> {
        let mut draft = self.guard.cart.clone();
        let value = f(&mut draft)?;
        self.slot.commit(&draft);
        self.guard.cart = draft;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::{CustomerId, LineItem, ProductId};

    use super::*;
    use crate::value_objects::Quantity;

    async fn store_with_cart() -> (Arc<CartStore>, CartId) {
        let store = Arc::new(CartStore::new());
        let cart = Cart::new(CustomerId::new("C1"));
        let id = cart.id();
        store.insert(cart).await;
        (store, id)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (store, id) = store_with_cart().await;
        let cart = store.get(id).await.unwrap();
        assert_eq!(cart.id(), id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = CartStore::new();
        assert!(store.get(CartId::new()).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_mutation_through_lock_is_visible() {
        let (store, id) = store_with_cart().await;
        {
            let mut locked = store.lock(id).await.unwrap();
            locked
                .update(|cart| cart.add_item(ProductId::new("P1"), Quantity::new(2).unwrap()))
                .unwrap();
        }
        let cart = store.get(id).await.unwrap();
        assert_eq!(cart.items(), &[LineItem::new("P1", 2)]);
    }

    #[tokio::test]
    async fn test_remove_deletes_cart() {
        let (store, id) = store_with_cart().await;
        let locked = store.lock(id).await.unwrap();
        store.remove(locked).await;

        assert!(store.get(id).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_waiter_sees_removal() {
        let (store, id) = store_with_cart().await;
        let locked = store.lock(id).await.unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.lock(id).await.is_some() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.remove(locked).await;

        assert!(!waiter.await.unwrap(), "waiter must not see a removed cart");
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let (store, id) = store_with_cart().await;

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut locked = store.lock(id).await.unwrap();
                    tokio::task::yield_now().await;
                    locked
                        .update(|cart| cart.add_item(ProductId::new("P1"), Quantity::new(1).unwrap()))
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let cart = store.get(id).await.unwrap();
        assert_eq!(cart.items(), &[LineItem::new("P1", 50)]);
    }

    #[tokio::test]
    async fn test_get_does_not_wait_for_lock_holder() {
        let (store, id) = store_with_cart().await;
        let mut locked = store.lock(id).await.unwrap();
        locked
            .update(|cart| cart.add_item(ProductId::new("P1"), Quantity::new(2).unwrap()))
            .unwrap();

        let cart = tokio::time::timeout(Duration::from_millis(100), store.get(id))
            .await
            .expect("get blocked on the cart lock")
            .unwrap();
        assert_eq!(cart.items(), &[LineItem::new("P1", 2)]);
        drop(locked);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_cart_unchanged() {
        let (store, id) = store_with_cart().await;
        let mut locked = store.lock(id).await.unwrap();

        let result: Result<(), &str> = locked.update(|cart| {
            cart.add_item(ProductId::new("P1"), Quantity::new(1).unwrap())
                .unwrap();
            Err("rejected")
        });

        assert_eq!(result, Err("rejected"));
        assert!(locked.cart().is_empty());
        drop(locked);
        assert!(store.get(id).await.unwrap().is_empty());
    }
}
