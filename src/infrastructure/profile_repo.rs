use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::ProfileRepository;
use crate::domain::user::{NewProfile, Profile};
use crate::schema::profiles;

use super::models::{NewProfileRow, ProfileRow};

pub struct DieselProfileRepository {
    pool: DbPool,
}

impl DieselProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProfileRepository for DieselProfileRepository {
    fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = profiles::table
            .find(id)
            .select(ProfileRow::as_select())
            .first(&mut conn)
            .optional()?;
        row.map(Profile::try_from).transpose()
    }

    fn insert(&self, profile: NewProfile) -> Result<Profile, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::insert_into(profiles::table)
            .values(&NewProfileRow {
                id: profile.id,
                email: profile.email,
                username: profile.username,
                role: profile.role.as_str().to_string(),
            })
            .returning(ProfileRow::as_returning())
            .get_result(&mut conn)?;
        row.try_into()
    }

    fn username_taken(&self, username: &str, excluding: Uuid) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let count: i64 = profiles::table
            .filter(profiles::username.eq(username))
            .filter(profiles::id.ne(excluding))
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }

    fn update_username(&self, id: Uuid, username: &str) -> Result<Option<Profile>, DomainError> {
        let mut conn = self.pool.get()?;
        let row = diesel::update(profiles::table.find(id))
            .set((
                profiles::username.eq(username),
                profiles::updated_at.eq(Utc::now()),
            ))
            .returning(ProfileRow::as_returning())
            .get_result(&mut conn)
            .optional()?;
        row.map(Profile::try_from).transpose()
    }
}
