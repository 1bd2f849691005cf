use super::traits::ProfileRepository;
use crate::errors::StoreError;
use crate::models::{Profile, ProfileChanges, ProfileChangeset, ProfileRow};
use crate::schema::profiles;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteProfileRepository {
    db: Arc<Mutex<SqliteConnection>>,
}

impl SqliteProfileRepository {
    pub fn new(db: Arc<Mutex<SqliteConnection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProfileRepository for SqliteProfileRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let mut conn = self.db.lock().map_err(|_| StoreError::ConnectionPoisoned)?;
        let row = profiles::table
            .find(user_id.to_string())
            .first::<ProfileRow>(&mut *conn)
            .optional()?;
        row.map(to_profile).transpose()
    }

    async fn update(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<Profile>, StoreError> {
        let mut conn = self.db.lock().map_err(|_| StoreError::ConnectionPoisoned)?;
        let changeset = ProfileChangeset {
            full_name: changes.full_name.clone(),
            avatar_url: changes.avatar_url.clone(),
            updated_at: Utc::now().naive_utc(),
        };

        let row = diesel::update(profiles::table.find(user_id.to_string()))
            .set(&changeset)
            .returning(profiles::all_columns)
            .get_result::<ProfileRow>(&mut *conn)
            .optional()?;
        row.map(to_profile).transpose()
    }
}

fn to_profile(row: ProfileRow) -> Result<Profile, StoreError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|err| StoreError::CorruptRow(format!("bad profile id {:?}: {err}", row.id)))?;

    Ok(Profile {
        id,
        email: row.email,
        full_name: row.full_name,
        avatar_url: row.avatar_url,
        role: row.role,
        created_at: row.created_at.and_utc(),
        updated_at: row.updated_at.and_utc(),
    })
}
