//! PostgreSQL repository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::{GeocacheRepository, RepoError, RepoResult};
use crate::models::{Cache, CacheFilter, NewCache, NewUser, User};

const USER_COLUMNS: &str = "id, name, username, email, password_hash, session_token, \
                            session_expiration, update_token";

const CACHE_COLUMNS: &str = "id, name, created_by, location, description, hint, size, \
                             difficulty, terrain, last_found, date_created";

const JOINED_CACHE_COLUMNS: &str = "c.id, c.name, c.created_by, c.location, c.description, \
                                    c.hint, c.size, c.difficulty, c.terrain, c.last_found, \
                                    c.date_created";

/// Table definitions, applied in order when the service starts
const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        session_token TEXT NOT NULL UNIQUE,
        session_expiration TIMESTAMPTZ NOT NULL,
        update_token TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS caches (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        created_by TEXT NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        location TEXT NOT NULL,
        description TEXT NOT NULL,
        hint TEXT,
        size TEXT,
        difficulty INTEGER,
        terrain INTEGER,
        last_found TEXT NOT NULL,
        date_created TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS caches_completed (
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        cache_id BIGINT NOT NULL REFERENCES caches (id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, cache_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS favorites (
        user_id BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        cache_id BIGINT NOT NULL REFERENCES caches (id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, cache_id)
    )
    "#,
];

/// Repository backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Create a new repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet
    pub async fn ensure_schema(&self) -> RepoResult<()> {
        info!("Ensuring database schema");

        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn list_associated(&self, table: &str, user_id: i64) -> RepoResult<Vec<Cache>> {
        let caches = sqlx::query_as::<_, Cache>(&format!(
            "SELECT {} FROM caches c JOIN {} a ON a.cache_id = c.id \
             WHERE a.user_id = $1 ORDER BY c.id",
            JOINED_CACHE_COLUMNS, table
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(caches)
    }

    async fn find_user_by(&self, column: &str, value: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl GeocacheRepository for PgRepository {
    async fn create_user(&self, new_user: &NewUser) -> RepoResult<User> {
        info!("Creating new user: {}", new_user.username);

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, username, email, password_hash, session_token,
                               session_expiration, update_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&new_user.name)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.session.session_token)
        .bind(new_user.session.session_expiration)
        .bind(&new_user.session.update_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users =
            sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(users)
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.find_user_by("username", username).await
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.find_user_by("email", email).await
    }

    async fn save_session(&self, user: &User) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET session_token = $1, update_token = $2, session_expiration = $3
            WHERE id = $4
            "#,
        )
        .bind(&user.session_token)
        .bind(&user.update_token)
        .bind(user.session_expiration)
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound("User"));
        }

        Ok(())
    }

    async fn delete_user(&self, id: i64) -> RepoResult<Option<User>> {
        info!("Deleting user: {}", id);

        let user = sqlx::query_as::<_, User>(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_cache(&self, new_cache: &NewCache) -> RepoResult<Cache> {
        info!("Creating cache {} for {}", new_cache.name, new_cache.created_by);

        let cache = sqlx::query_as::<_, Cache>(&format!(
            r#"
            INSERT INTO caches (name, created_by, location, description, hint, size,
                                difficulty, terrain, last_found, date_created)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            CACHE_COLUMNS
        ))
        .bind(&new_cache.name)
        .bind(&new_cache.created_by)
        .bind(&new_cache.location)
        .bind(&new_cache.description)
        .bind(&new_cache.hint)
        .bind(&new_cache.size)
        .bind(new_cache.difficulty)
        .bind(new_cache.terrain)
        .bind(&new_cache.last_found)
        .bind(&new_cache.date_created)
        .fetch_one(&self.pool)
        .await?;

        Ok(cache)
    }

    async fn list_caches(&self) -> RepoResult<Vec<Cache>> {
        let caches =
            sqlx::query_as::<_, Cache>(&format!("SELECT {} FROM caches ORDER BY id", CACHE_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(caches)
    }

    async fn find_cache(&self, id: i64) -> RepoResult<Option<Cache>> {
        let cache = sqlx::query_as::<_, Cache>(&format!(
            "SELECT {} FROM caches WHERE id = $1",
            CACHE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cache)
    }

    async fn list_caches_by_creator(&self, username: &str) -> RepoResult<Vec<Cache>> {
        let caches = sqlx::query_as::<_, Cache>(&format!(
            "SELECT {} FROM caches WHERE created_by = $1 ORDER BY id",
            CACHE_COLUMNS
        ))
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(caches)
    }

    async fn list_caches_matching(&self, filter: &CacheFilter) -> RepoResult<Vec<Cache>> {
        // The column name comes from a closed enum, never from the request.
        let sql = format!(
            "SELECT {} FROM caches WHERE {} = $1 ORDER BY id",
            CACHE_COLUMNS,
            filter.category().as_str()
        );

        let query = sqlx::query_as::<_, Cache>(&sql);
        let query = match filter {
            CacheFilter::Text(_, value) => query.bind(value.clone()),
            CacheFilter::Number(_, value) => query.bind(*value),
        };

        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn delete_cache(&self, id: i64) -> RepoResult<Option<Cache>> {
        info!("Deleting cache: {}", id);

        let cache = sqlx::query_as::<_, Cache>(&format!(
            "DELETE FROM caches WHERE id = $1 RETURNING {}",
            CACHE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cache)
    }

    async fn add_completed(
        &self,
        user_id: i64,
        cache_id: i64,
        found_on: &str,
    ) -> RepoResult<Cache> {
        let mut tx = self.pool.begin().await?;

        let cache = sqlx::query_as::<_, Cache>(&format!(
            "UPDATE caches SET last_found = $1 WHERE id = $2 RETURNING {}",
            CACHE_COLUMNS
        ))
        .bind(found_on)
        .bind(cache_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepoError::NotFound("Cache"))?;

        sqlx::query(
            r#"
            INSERT INTO caches_completed (user_id, cache_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, cache_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(cache_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(cache)
    }

    async fn list_completed(&self, user_id: i64) -> RepoResult<Vec<Cache>> {
        self.list_associated("caches_completed", user_id).await
    }

    async fn add_favorite(&self, user_id: i64, cache_id: i64) -> RepoResult<Cache> {
        sqlx::query(
            r#"
            INSERT INTO favorites (user_id, cache_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, cache_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(cache_id)
        .execute(&self.pool)
        .await?;

        self.find_cache(cache_id).await?.ok_or(RepoError::NotFound("Cache"))
    }

    async fn list_favorited(&self, user_id: i64) -> RepoResult<Vec<Cache>> {
        self.list_associated("favorites", user_id).await
    }

    async fn health_check(&self) -> RepoResult<bool> {
        common::database::health_check(&self.pool)
            .await
            .map_err(|e| RepoError::Persistence(e.to_string()))
    }
}
