//! Cache model, its wire forms and the attribute filter

use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ModelError, User, required};

/// Value of `last_found` until somebody completes the cache
pub const NO_FINDS_YET: &str = "no finds yet!";

/// Cache entity
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Cache {
    pub id: i64,
    pub name: String,
    pub created_by: String,
    pub location: String,
    pub description: String,
    pub hint: Option<String>,
    pub size: Option<String>,
    pub difficulty: Option<i32>,
    pub terrain: Option<i32>,
    pub last_found: String,
    pub date_created: String,
}

/// Cache creation payload as received over the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCacheRequest {
    pub name: Option<String>,
    pub created_by: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub hint: Option<String>,
    pub size: Option<String>,
    pub difficulty: Option<i32>,
    pub terrain: Option<i32>,
    pub date_created: Option<String>,
}

/// Validated cache ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCache {
    pub name: String,
    pub created_by: String,
    pub location: String,
    pub description: String,
    pub hint: Option<String>,
    pub size: Option<String>,
    pub difficulty: Option<i32>,
    pub terrain: Option<i32>,
    pub last_found: String,
    pub date_created: String,
}

/// Full representation of a cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheView {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub description: String,
    pub hint: Option<String>,
    pub size: Option<String>,
    pub difficulty: Option<i32>,
    pub terrain: Option<i32>,
    pub last_found: String,
    pub date_created: String,
    pub created_by: String,
}

/// Compact representation used inside a user
#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub id: i64,
    pub location: String,
    pub description: String,
    pub difficulty: Option<i32>,
    pub date_created: String,
}

/// Today's date as stored in `last_found`
pub fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

impl NewCache {
    /// Validate a creation request on behalf of `creator`
    pub fn create(request: CreateCacheRequest, creator: &User) -> Result<Self, ModelError> {
        let name = required(request.name, "name")?;
        let created_by = required(request.created_by, "created_by")?;
        let location = required(request.location, "location")?;
        let description = required(request.description, "description")?;
        let date_created = required(request.date_created, "date_created")?;

        if created_by != creator.username {
            return Err(ModelError::CreatorMismatch);
        }

        Ok(Self {
            name,
            created_by,
            location,
            description,
            hint: request.hint,
            size: request.size,
            difficulty: request.difficulty,
            terrain: request.terrain,
            last_found: NO_FINDS_YET.to_string(),
            date_created,
        })
    }
}

impl Cache {
    pub fn summary(&self) -> CacheSummary {
        CacheSummary {
            id: self.id,
            location: self.location.clone(),
            description: self.description.clone(),
            difficulty: self.difficulty,
            date_created: self.date_created.clone(),
        }
    }
}

impl From<Cache> for CacheView {
    fn from(cache: Cache) -> Self {
        Self {
            id: cache.id,
            name: cache.name,
            location: cache.location,
            description: cache.description,
            hint: cache.hint,
            size: cache.size,
            difficulty: cache.difficulty,
            terrain: cache.terrain,
            last_found: cache.last_found,
            date_created: cache.date_created,
            created_by: cache.created_by,
        }
    }
}

/// Cache attribute a listing can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCategory {
    Name,
    Location,
    Description,
    Hint,
    Size,
    Difficulty,
    Terrain,
    LastFound,
    DateCreated,
    CreatedBy,
}

impl CacheCategory {
    /// Column name, which is also the category's name on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            CacheCategory::Name => "name",
            CacheCategory::Location => "location",
            CacheCategory::Description => "description",
            CacheCategory::Hint => "hint",
            CacheCategory::Size => "size",
            CacheCategory::Difficulty => "difficulty",
            CacheCategory::Terrain => "terrain",
            CacheCategory::LastFound => "last_found",
            CacheCategory::DateCreated => "date_created",
            CacheCategory::CreatedBy => "created_by",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, CacheCategory::Difficulty | CacheCategory::Terrain)
    }
}

impl FromStr for CacheCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(CacheCategory::Name),
            "location" => Ok(CacheCategory::Location),
            "description" => Ok(CacheCategory::Description),
            "hint" => Ok(CacheCategory::Hint),
            "size" => Ok(CacheCategory::Size),
            "difficulty" => Ok(CacheCategory::Difficulty),
            "terrain" => Ok(CacheCategory::Terrain),
            "last_found" => Ok(CacheCategory::LastFound),
            "date_created" => Ok(CacheCategory::DateCreated),
            "created_by" => Ok(CacheCategory::CreatedBy),
            _ => Err(ModelError::InvalidCategory),
        }
    }
}

/// Exact-match filter on one cache attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFilter {
    Text(CacheCategory, String),
    Number(CacheCategory, i32),
}

impl CacheFilter {
    pub fn parse(category: &str, item: &str) -> Result<Self, ModelError> {
        let category: CacheCategory = category.parse()?;

        if category.is_numeric() {
            let value = item
                .parse()
                .map_err(|_| ModelError::InvalidValue(category.as_str()))?;
            Ok(CacheFilter::Number(category, value))
        } else {
            Ok(CacheFilter::Text(category, item.to_string()))
        }
    }

    pub fn category(&self) -> CacheCategory {
        match self {
            CacheFilter::Text(category, _) | CacheFilter::Number(category, _) => *category,
        }
    }

    pub fn matches(&self, cache: &Cache) -> bool {
        match self {
            CacheFilter::Number(CacheCategory::Difficulty, value) => {
                cache.difficulty == Some(*value)
            }
            CacheFilter::Number(CacheCategory::Terrain, value) => cache.terrain == Some(*value),
            CacheFilter::Number(..) => false,
            CacheFilter::Text(category, value) => {
                let field = match category {
                    CacheCategory::Name => Some(&cache.name),
                    CacheCategory::Location => Some(&cache.location),
                    CacheCategory::Description => Some(&cache.description),
                    CacheCategory::Hint => cache.hint.as_ref(),
                    CacheCategory::Size => cache.size.as_ref(),
                    CacheCategory::LastFound => Some(&cache.last_found),
                    CacheCategory::DateCreated => Some(&cache.date_created),
                    CacheCategory::CreatedBy => Some(&cache.created_by),
                    CacheCategory::Difficulty | CacheCategory::Terrain => None,
                };
                field == Some(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionTokens;

    fn owner() -> User {
        let session = SessionTokens::issue();
        User {
            id: 1,
            name: "Ann".to_string(),
            username: "ann1".to_string(),
            email: "a@x.com".to_string(),
            password_hash: String::new(),
            session_token: session.session_token,
            session_expiration: session.session_expiration,
            update_token: session.update_token,
        }
    }

    fn request() -> CreateCacheRequest {
        CreateCacheRequest {
            name: Some("Cache A".to_string()),
            created_by: Some("ann1".to_string()),
            location: Some("Park".to_string()),
            description: Some("desc".to_string()),
            date_created: Some("2024-01-01".to_string()),
            ..Default::default()
        }
    }

    fn cache() -> Cache {
        Cache {
            id: 7,
            name: "Cache A".to_string(),
            created_by: "ann1".to_string(),
            location: "Park".to_string(),
            description: "desc".to_string(),
            hint: None,
            size: Some("small".to_string()),
            difficulty: Some(3),
            terrain: None,
            last_found: NO_FINDS_YET.to_string(),
            date_created: "2024-01-01".to_string(),
        }
    }

    #[test]
    fn create_starts_without_finds() {
        let new_cache = NewCache::create(request(), &owner()).unwrap();

        assert_eq!(new_cache.last_found, NO_FINDS_YET);
        assert_eq!(new_cache.date_created, "2024-01-01");
        assert_eq!(new_cache.created_by, "ann1");
    }

    #[test]
    fn create_requires_fields_in_order() {
        let err = NewCache::create(
            CreateCacheRequest {
                location: None,
                date_created: None,
                ..request()
            },
            &owner(),
        )
        .unwrap_err();
        assert_eq!(err, ModelError::MissingField("location"));

        let err = NewCache::create(
            CreateCacheRequest {
                date_created: None,
                ..request()
            },
            &owner(),
        )
        .unwrap_err();
        assert_eq!(err, ModelError::MissingField("date_created"));
    }

    #[test]
    fn create_rejects_foreign_creator() {
        let err = NewCache::create(
            CreateCacheRequest {
                created_by: Some("bob".to_string()),
                ..request()
            },
            &owner(),
        )
        .unwrap_err();

        assert_eq!(err, ModelError::CreatorMismatch);
    }

    #[test]
    fn summary_is_compact() {
        let json = serde_json::to_value(cache().summary()).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();

        assert_eq!(
            keys,
            ["date_created", "description", "difficulty", "id", "location"]
        );
    }

    #[test]
    fn full_view_names_the_creator() {
        let json = serde_json::to_value(CacheView::from(cache())).unwrap();

        assert_eq!(json["created_by"], "ann1");
        assert_eq!(json["name"], "Cache A");
        assert_eq!(json["hint"], serde_json::Value::Null);
    }

    #[test]
    fn filter_parses_categories() {
        assert_eq!(
            CacheFilter::parse("difficulty", "3").unwrap(),
            CacheFilter::Number(CacheCategory::Difficulty, 3)
        );
        assert_eq!(
            CacheFilter::parse("size", "small").unwrap(),
            CacheFilter::Text(CacheCategory::Size, "small".to_string())
        );
        assert_eq!(
            CacheFilter::parse("terrain", "steep").unwrap_err(),
            ModelError::InvalidValue("terrain")
        );
        assert_eq!(
            CacheFilter::parse("distance", "1").unwrap_err(),
            ModelError::InvalidCategory
        );
    }

    #[test]
    fn filter_matches_exact_values() {
        let cache = cache();

        assert!(CacheFilter::parse("difficulty", "3").unwrap().matches(&cache));
        assert!(!CacheFilter::parse("terrain", "3").unwrap().matches(&cache));
        assert!(CacheFilter::parse("size", "small").unwrap().matches(&cache));
        assert!(!CacheFilter::parse("hint", "small").unwrap().matches(&cache));
        assert!(CacheFilter::parse("created_by", "ann1").unwrap().matches(&cache));
    }

    #[test]
    fn today_is_iso_formatted() {
        let date = today();

        assert_eq!(date.len(), 10);
        assert!(chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_ok());
    }
}
