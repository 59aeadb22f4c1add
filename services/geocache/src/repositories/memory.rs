//! In-process repository
//!
//! Mirrors the constraints of the PostgreSQL schema: unique usernames,
//! emails and tokens, caches bound to an existing creator, one association
//! row per user/cache pair and cascading deletes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{GeocacheRepository, RepoError, RepoResult};
use crate::models::{Cache, CacheFilter, NewCache, NewUser, User};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i64, User>,
    caches: BTreeMap<i64, Cache>,
    completed: BTreeSet<(i64, i64)>,
    favorites: BTreeSet<(i64, i64)>,
    next_user_id: i64,
    next_cache_id: i64,
}

impl MemoryState {
    fn unique_violation(&self, candidate: &User) -> Option<&'static str> {
        self.users
            .values()
            .filter(|user| user.id != candidate.id)
            .find_map(|user| {
                if user.username == candidate.username {
                    Some("users_username_key")
                } else if user.email == candidate.email {
                    Some("users_email_key")
                } else if user.session_token == candidate.session_token {
                    Some("users_session_token_key")
                } else if user.update_token == candidate.update_token {
                    Some("users_update_token_key")
                } else {
                    None
                }
            })
    }

    fn associated(&self, set: &BTreeSet<(i64, i64)>, user_id: i64) -> Vec<Cache> {
        let mut caches: Vec<Cache> = set
            .iter()
            .filter(|(user, _)| *user == user_id)
            .filter_map(|(_, cache_id)| self.caches.get(cache_id).cloned())
            .collect();
        caches.sort_by_key(|cache| cache.id);
        caches
    }

    fn ensure_pair(&self, user_id: i64, cache_id: i64) -> RepoResult<()> {
        if !self.users.contains_key(&user_id) {
            Err(RepoError::NotFound("User"))
        } else if !self.caches.contains_key(&cache_id) {
            Err(RepoError::NotFound("Cache"))
        } else {
            Ok(())
        }
    }
}

/// Repository keeping everything in memory behind an async lock
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeocacheRepository for MemoryRepository {
    async fn create_user(&self, new_user: &NewUser) -> RepoResult<User> {
        let mut state = self.state.write().await;

        let mut user = User {
            id: 0,
            name: new_user.name.clone(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            session_token: new_user.session.session_token.clone(),
            session_expiration: new_user.session.session_expiration,
            update_token: new_user.session.update_token.clone(),
        };

        if let Some(constraint) = state.unique_violation(&user) {
            return Err(RepoError::Duplicate {
                constraint: constraint.to_string(),
            });
        }

        state.next_user_id += 1;
        user.id = state.next_user_id;
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|user| user.email == email).cloned())
    }

    async fn save_session(&self, user: &User) -> RepoResult<()> {
        let mut state = self.state.write().await;

        if let Some(constraint) = state.unique_violation(user) {
            return Err(RepoError::Duplicate {
                constraint: constraint.to_string(),
            });
        }

        let stored = state.users.get_mut(&user.id).ok_or(RepoError::NotFound("User"))?;
        stored.apply_session(user.session());

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> RepoResult<Option<User>> {
        let mut state = self.state.write().await;

        let Some(user) = state.users.remove(&id) else {
            return Ok(None);
        };

        let owned: Vec<i64> = state
            .caches
            .values()
            .filter(|cache| cache.created_by == user.username)
            .map(|cache| cache.id)
            .collect();
        for cache_id in &owned {
            state.caches.remove(cache_id);
        }

        let orphaned = |(user_id, cache_id): &(i64, i64)| {
            *user_id == id || owned.contains(cache_id)
        };
        state.completed.retain(|pair| !orphaned(pair));
        state.favorites.retain(|pair| !orphaned(pair));

        Ok(Some(user))
    }

    async fn create_cache(&self, new_cache: &NewCache) -> RepoResult<Cache> {
        let mut state = self.state.write().await;

        if !state
            .users
            .values()
            .any(|user| user.username == new_cache.created_by)
        {
            return Err(RepoError::NotFound("User"));
        }

        state.next_cache_id += 1;
        let cache = Cache {
            id: state.next_cache_id,
            name: new_cache.name.clone(),
            created_by: new_cache.created_by.clone(),
            location: new_cache.location.clone(),
            description: new_cache.description.clone(),
            hint: new_cache.hint.clone(),
            size: new_cache.size.clone(),
            difficulty: new_cache.difficulty,
            terrain: new_cache.terrain,
            last_found: new_cache.last_found.clone(),
            date_created: new_cache.date_created.clone(),
        };
        state.caches.insert(cache.id, cache.clone());

        Ok(cache)
    }

    async fn list_caches(&self) -> RepoResult<Vec<Cache>> {
        Ok(self.state.read().await.caches.values().cloned().collect())
    }

    async fn find_cache(&self, id: i64) -> RepoResult<Option<Cache>> {
        Ok(self.state.read().await.caches.get(&id).cloned())
    }

    async fn list_caches_by_creator(&self, username: &str) -> RepoResult<Vec<Cache>> {
        let state = self.state.read().await;
        Ok(state
            .caches
            .values()
            .filter(|cache| cache.created_by == username)
            .cloned()
            .collect())
    }

    async fn list_caches_matching(&self, filter: &CacheFilter) -> RepoResult<Vec<Cache>> {
        let state = self.state.read().await;
        Ok(state
            .caches
            .values()
            .filter(|cache| filter.matches(cache))
            .cloned()
            .collect())
    }

    async fn delete_cache(&self, id: i64) -> RepoResult<Option<Cache>> {
        let mut state = self.state.write().await;

        let cache = state.caches.remove(&id);
        if cache.is_some() {
            state.completed.retain(|(_, cache_id)| *cache_id != id);
            state.favorites.retain(|(_, cache_id)| *cache_id != id);
        }

        Ok(cache)
    }

    async fn add_completed(
        &self,
        user_id: i64,
        cache_id: i64,
        found_on: &str,
    ) -> RepoResult<Cache> {
        let mut state = self.state.write().await;
        state.ensure_pair(user_id, cache_id)?;

        let cache = state.caches.get_mut(&cache_id).ok_or(RepoError::NotFound("Cache"))?;
        cache.last_found = found_on.to_string();
        let cache = cache.clone();

        state.completed.insert((user_id, cache_id));

        Ok(cache)
    }

    async fn list_completed(&self, user_id: i64) -> RepoResult<Vec<Cache>> {
        let state = self.state.read().await;
        Ok(state.associated(&state.completed, user_id))
    }

    async fn add_favorite(&self, user_id: i64, cache_id: i64) -> RepoResult<Cache> {
        let mut state = self.state.write().await;
        state.ensure_pair(user_id, cache_id)?;

        state.favorites.insert((user_id, cache_id));

        state.caches.get(&cache_id).cloned().ok_or(RepoError::NotFound("Cache"))
    }

    async fn list_favorited(&self, user_id: i64) -> RepoResult<Vec<Cache>> {
        let state = self.state.read().await;
        Ok(state.associated(&state.favorites, user_id))
    }

    async fn health_check(&self) -> RepoResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NO_FINDS_YET, RegisterUserRequest};

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser::register(RegisterUserRequest {
            name: Some("Ann".to_string()),
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some("pw".to_string()),
        })
        .unwrap()
    }

    fn new_cache(created_by: &str, name: &str) -> NewCache {
        NewCache {
            name: name.to_string(),
            created_by: created_by.to_string(),
            location: "Park".to_string(),
            description: "desc".to_string(),
            hint: None,
            size: Some("small".to_string()),
            difficulty: Some(2),
            terrain: Some(1),
            last_found: NO_FINDS_YET.to_string(),
            date_created: "2024-01-01".to_string(),
        }
    }

    #[tokio::test]
    async fn create_user_assigns_ids_and_enforces_uniqueness() {
        let repo = MemoryRepository::new();

        let ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let bob = repo.create_user(&new_user("bob", "b@x.com")).await.unwrap();
        assert_eq!((ann.id, bob.id), (1, 2));

        let err = repo
            .create_user(&new_user("ann1", "other@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { constraint } if constraint == "users_username_key"));

        let err = repo
            .create_user(&new_user("carol", "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Duplicate { constraint } if constraint == "users_email_key"));
    }

    #[tokio::test]
    async fn create_cache_requires_an_existing_creator() {
        let repo = MemoryRepository::new();

        let err = repo.create_cache(&new_cache("ghost", "A")).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound("User")));

        repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let cache = repo.create_cache(&new_cache("ann1", "A")).await.unwrap();
        assert_eq!(cache.id, 1);
        assert_eq!(repo.list_caches_by_creator("ann1").await.unwrap(), vec![cache]);
    }

    #[tokio::test]
    async fn completion_is_recorded_once_per_pair() {
        let repo = MemoryRepository::new();
        let ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let cache = repo.create_cache(&new_cache("ann1", "A")).await.unwrap();

        repo.add_completed(ann.id, cache.id, "2024-02-01").await.unwrap();
        let updated = repo.add_completed(ann.id, cache.id, "2024-03-01").await.unwrap();

        assert_eq!(updated.last_found, "2024-03-01");
        assert_eq!(repo.list_completed(ann.id).await.unwrap(), vec![updated]);
        assert!(repo.list_favorited(ann.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn favorite_leaves_last_found_alone() {
        let repo = MemoryRepository::new();
        let ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let cache = repo.create_cache(&new_cache("ann1", "A")).await.unwrap();

        let favorited = repo.add_favorite(ann.id, cache.id).await.unwrap();
        repo.add_favorite(ann.id, cache.id).await.unwrap();

        assert_eq!(favorited.last_found, NO_FINDS_YET);
        assert_eq!(repo.list_favorited(ann.id).await.unwrap().len(), 1);

        let err = repo.add_favorite(ann.id, 99).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound("Cache")));

        let err = repo.add_favorite(99, cache.id).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound("User")));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let repo = MemoryRepository::new();
        let ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let bob = repo.create_user(&new_user("bob", "b@x.com")).await.unwrap();
        let anns = repo.create_cache(&new_cache("ann1", "A")).await.unwrap();
        let bobs = repo.create_cache(&new_cache("bob", "B")).await.unwrap();
        repo.add_completed(bob.id, anns.id, "2024-02-01").await.unwrap();
        repo.add_favorite(ann.id, bobs.id).await.unwrap();

        let deleted = repo.delete_user(ann.id).await.unwrap().unwrap();

        assert_eq!(deleted.username, "ann1");
        assert!(repo.find_user(ann.id).await.unwrap().is_none());
        assert_eq!(repo.list_caches().await.unwrap(), vec![bobs]);
        assert!(repo.list_completed(bob.id).await.unwrap().is_empty());
        assert!(repo.delete_user(ann.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_cache_drops_its_associations() {
        let repo = MemoryRepository::new();
        let ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let cache = repo.create_cache(&new_cache("ann1", "A")).await.unwrap();
        repo.add_completed(ann.id, cache.id, "2024-02-01").await.unwrap();
        repo.add_favorite(ann.id, cache.id).await.unwrap();

        assert!(repo.delete_cache(cache.id).await.unwrap().is_some());

        assert!(repo.list_caches().await.unwrap().is_empty());
        assert!(repo.list_completed(ann.id).await.unwrap().is_empty());
        assert!(repo.list_favorited(ann.id).await.unwrap().is_empty());
        assert!(repo.delete_cache(cache.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_session_replaces_stored_tokens() {
        let repo = MemoryRepository::new();
        let mut ann = repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let old_token = ann.session_token.clone();

        ann.renew_session();
        repo.save_session(&ann).await.unwrap();

        let stored = repo.find_user(ann.id).await.unwrap().unwrap();
        assert!(!stored.verify_session_token(&old_token));
        assert!(stored.verify_session_token(&ann.session_token));
        assert!(stored.verify_update_token(&ann.update_token));
    }

    #[tokio::test]
    async fn filter_listing_uses_exact_matches() {
        let repo = MemoryRepository::new();
        repo.create_user(&new_user("ann1", "a@x.com")).await.unwrap();
        let mut hard = new_cache("ann1", "Hard");
        hard.difficulty = Some(5);
        repo.create_cache(&new_cache("ann1", "Easy")).await.unwrap();
        repo.create_cache(&hard).await.unwrap();

        let filter = CacheFilter::parse("difficulty", "5").unwrap();
        let matching = repo.list_caches_matching(&filter).await.unwrap();

        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].name, "Hard");
    }
}
