use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use super::authz::Resource;
use super::domain::{
    Amenities, ApplicationId, ApplicationStatus, ApplicationWithApplicant, ApplicationWithListing,
    ImageId, ImageRef, ListingDetails, ListingFields, ListingId, ListingStatus, ListingSummary,
    NewUser, ProfileUpdate, RoomType, StoredCredentials, UserId, UserProfile,
};
use super::repository::{
    ApplicationRepository, ListingRepository, OwnershipResolver, RepositoryError, UserRepository,
};
use crate::config::DatabaseConfig;

const LISTING_COLUMNS: &str = r#"
    SELECT l.id, l.user_id, l.location, l.rent_amount, l.room_type, l.available_date,
           l.roommates_needed, l.amenities, l.house_rules, l.contact_preferences, l.status,
           l.created_at, u.name AS owner_name, u.email AS owner_email,
           (SELECT li.image_path FROM listing_images li
             WHERE li.listing_id = l.id ORDER BY li.id ASC LIMIT 1) AS featured_image
    FROM listings l
    JOIN users u ON l.user_id = u.id
"#;

/// SQLite-backed implementation of every marketplace repository.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the configured database. Call [`SqliteStore::migrate`] next.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(unavailable)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        Ok(Self { pool })
    }

    /// Private, migrated database that lives as long as the store.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(unavailable)?
            .foreign_keys(true);

        // Every connection to `sqlite::memory:` is a separate database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("migration failed: {err}")))
    }

    /// Writes a consistent snapshot of the live database to `target`.
    pub async fn backup_into(&self, target: &Path) -> Result<(), RepositoryError> {
        let target = target.to_str().ok_or_else(|| {
            RepositoryError::Unavailable(format!("backup path {target:?} is not valid UTF-8"))
        })?;

        sqlx::query("VACUUM INTO ?")
            .bind(target)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn unavailable(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Unavailable(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("unexpected {column} value '{value}' in storage"))
}

fn room_type(raw: &str) -> Result<RoomType, RepositoryError> {
    RoomType::parse(raw).ok_or_else(|| corrupt("room_type", raw))
}

fn listing_status(raw: &str) -> Result<ListingStatus, RepositoryError> {
    ListingStatus::parse(raw).ok_or_else(|| corrupt("listing status", raw))
}

fn application_status(raw: &str) -> Result<ApplicationStatus, RepositoryError> {
    ApplicationStatus::parse(raw).ok_or_else(|| corrupt("application status", raw))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    name: Option<String>,
    phone: Option<String>,
    bio: Option<String>,
    profile_pic: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            username: row.username,
            email: row.email,
            name: row.name,
            phone: row.phone,
            bio: row.bio,
            profile_pic: row.profile_pic,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: i64,
    user_id: i64,
    location: String,
    rent_amount: f64,
    room_type: String,
    available_date: NaiveDate,
    roommates_needed: i64,
    amenities: String,
    house_rules: Option<String>,
    contact_preferences: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    owner_name: Option<String>,
    owner_email: String,
    featured_image: Option<String>,
}

impl ListingRow {
    fn into_summary(self) -> Result<ListingSummary, RepositoryError> {
        let roommates_needed = u32::try_from(self.roommates_needed)
            .map_err(|_| corrupt("roommates_needed", self.roommates_needed))?;

        Ok(ListingSummary {
            id: ListingId(self.id),
            user_id: UserId(self.user_id),
            room_type: room_type(&self.room_type)?,
            status: listing_status(&self.status)?,
            amenities: Amenities::from_storage(&self.amenities),
            location: self.location,
            rent_amount: self.rent_amount,
            available_date: self.available_date,
            roommates_needed,
            house_rules: self.house_rules,
            contact_preferences: self.contact_preferences,
            created_at: self.created_at,
            owner_name: self.owner_name,
            owner_email: self.owner_email,
            featured_image: self.featured_image,
        })
    }
}

impl ListingSummary {
    fn with_images(self, images: Vec<ImageRef>) -> ListingDetails {
        ListingDetails {
            id: self.id,
            user_id: self.user_id,
            location: self.location,
            rent_amount: self.rent_amount,
            room_type: self.room_type,
            available_date: self.available_date,
            roommates_needed: self.roommates_needed,
            amenities: self.amenities,
            house_rules: self.house_rules,
            contact_preferences: self.contact_preferences,
            status: self.status,
            created_at: self.created_at,
            owner_name: self.owner_name,
            owner_email: self.owner_email,
            images,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: i64,
    listing_id: i64,
    image_path: String,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for ImageRef {
    fn from(row: ImageRow) -> Self {
        Self {
            id: ImageId(row.id),
            listing_id: ListingId(row.listing_id),
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubmittedApplicationRow {
    id: i64,
    listing_id: i64,
    user_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    location: String,
    rent_amount: f64,
    room_type: String,
    listing_status: String,
    owner_name: Option<String>,
}

impl SubmittedApplicationRow {
    fn into_view(self) -> Result<ApplicationWithListing, RepositoryError> {
        Ok(ApplicationWithListing {
            id: ApplicationId(self.id),
            listing_id: ListingId(self.listing_id),
            user_id: UserId(self.user_id),
            status: application_status(&self.status)?,
            created_at: self.created_at,
            room_type: room_type(&self.room_type)?,
            listing_status: listing_status(&self.listing_status)?,
            location: self.location,
            rent_amount: self.rent_amount,
            owner_name: self.owner_name,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReceivedApplicationRow {
    id: i64,
    listing_id: i64,
    user_id: i64,
    status: String,
    created_at: DateTime<Utc>,
    applicant_name: Option<String>,
    applicant_email: String,
    applicant_phone: Option<String>,
}

impl ReceivedApplicationRow {
    fn into_view(self) -> Result<ApplicationWithApplicant, RepositoryError> {
        Ok(ApplicationWithApplicant {
            id: ApplicationId(self.id),
            listing_id: ListingId(self.listing_id),
            user_id: UserId(self.user_id),
            status: application_status(&self.status)?,
            created_at: self.created_at,
            applicant_name: self.applicant_name,
            applicant_email: self.applicant_email,
            applicant_phone: self.applicant_phone,
        })
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> Result<UserId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (username, password, email, name, phone) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.phone)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(UserId(done.last_insert_rowid())),
            Err(err) if is_unique_violation(&err) => {
                Err(RepositoryError::Conflict("user already exists".to_string()))
            }
            Err(err) => Err(unavailable(err)),
        }
    }

    async fn credentials(
        &self,
        username: &str,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        Ok(row.map(|(id, password_hash)| StoredCredentials {
            user_id: UserId(id),
            password_hash,
        }))
    }

    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, name, phone, bio, profile_pic, created_at
             FROM users WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(row.map(UserProfile::from))
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE users SET name = ?, email = ?, phone = ?, bio = ? WHERE id = ?")
                .bind(&update.name)
                .bind(&update.email)
                .bind(&update.phone)
                .bind(&update.bio)
                .bind(id.0)
                .execute(&self.pool)
                .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(RepositoryError::NotFound),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(RepositoryError::Conflict("email already in use".to_string()))
            }
            Err(err) => Err(unavailable(err)),
        }
    }
}

#[async_trait]
impl ListingRepository for SqliteStore {
    async fn insert_listing(
        &self,
        owner: UserId,
        fields: &ListingFields,
    ) -> Result<ListingId, RepositoryError> {
        let done = sqlx::query(
            "INSERT INTO listings (
                user_id, location, rent_amount, room_type, available_date,
                roommates_needed, amenities, house_rules, contact_preferences
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(owner.0)
        .bind(&fields.location)
        .bind(fields.rent_amount)
        .bind(fields.room_type.label())
        .bind(fields.available_date)
        .bind(i64::from(fields.roommates_needed))
        .bind(fields.amenities.to_storage())
        .bind(&fields.house_rules)
        .bind(&fields.contact_preferences)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(ListingId(done.last_insert_rowid()))
    }

    async fn replace_listing(
        &self,
        id: ListingId,
        fields: &ListingFields,
    ) -> Result<(), RepositoryError> {
        let done = sqlx::query(
            "UPDATE listings
             SET location = ?, rent_amount = ?, room_type = ?, available_date = ?,
                 roommates_needed = ?, amenities = ?, house_rules = ?, contact_preferences = ?
             WHERE id = ?",
        )
        .bind(&fields.location)
        .bind(fields.rent_amount)
        .bind(fields.room_type.label())
        .bind(fields.available_date)
        .bind(i64::from(fields.roommates_needed))
        .bind(fields.amenities.to_storage())
        .bind(&fields.house_rules)
        .bind(&fields.contact_preferences)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_listing_status(
        &self,
        id: ListingId,
        status: ListingStatus,
    ) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE listings SET status = ? WHERE id = ?")
            .bind(status.label())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn active_listing(
        &self,
        id: ListingId,
    ) -> Result<Option<ListingDetails>, RepositoryError> {
        let sql = format!("{LISTING_COLUMNS} WHERE l.id = ? AND l.status = 'active'");
        let row: Option<ListingRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let images: Vec<ImageRow> = sqlx::query_as(
            "SELECT id, listing_id, image_path, created_at
             FROM listing_images WHERE listing_id = ? ORDER BY id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let summary = row.into_summary()?;
        Ok(Some(
            summary.with_images(images.into_iter().map(ImageRef::from).collect()),
        ))
    }

    async fn active_listings(
        &self,
        max_rent: Option<f64>,
    ) -> Result<Vec<ListingSummary>, RepositoryError> {
        let filter = if max_rent.is_some() {
            " AND l.rent_amount <= ?"
        } else {
            ""
        };
        let sql = format!(
            "{LISTING_COLUMNS} WHERE l.status = 'active'{filter} \
             ORDER BY l.created_at DESC, l.id DESC"
        );

        let mut query = sqlx::query_as::<_, ListingRow>(&sql);
        if let Some(max_rent) = max_rent {
            query = query.bind(max_rent);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(ListingRow::into_summary)
            .collect()
    }

    async fn insert_images(
        &self,
        id: ListingId,
        paths: &[String],
    ) -> Result<Vec<ImageRef>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        let mut images = Vec::with_capacity(paths.len());

        for path in paths {
            let row: ImageRow = sqlx::query_as(
                "INSERT INTO listing_images (listing_id, image_path) VALUES (?, ?)
                 RETURNING id, listing_id, image_path, created_at",
            )
            .bind(id.0)
            .bind(path)
            .fetch_one(&mut *tx)
            .await
            .map_err(unavailable)?;
            images.push(ImageRef::from(row));
        }

        tx.commit().await.map_err(unavailable)?;
        Ok(images)
    }
}

#[async_trait]
impl ApplicationRepository for SqliteStore {
    async fn insert_application(
        &self,
        listing: ListingId,
        applicant: UserId,
    ) -> Result<ApplicationId, RepositoryError> {
        // The active check and the insert are one statement; the unique index on
        // (listing_id, user_id) settles concurrent submissions.
        let result = sqlx::query(
            "INSERT INTO applications (listing_id, user_id, status)
             SELECT id, ?, 'pending' FROM listings WHERE id = ? AND status = 'active'",
        )
        .bind(applicant.0)
        .bind(listing.0)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 1 => {
                return Ok(ApplicationId(done.last_insert_rowid()))
            }
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(RepositoryError::Conflict(
                    "already applied to this listing".to_string(),
                ))
            }
            Err(err) => return Err(unavailable(err)),
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM applications WHERE listing_id = ? AND user_id = ?")
                .bind(listing.0)
                .bind(applicant.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;
        if existing.is_some() {
            return Err(RepositoryError::Conflict(
                "already applied to this listing".to_string(),
            ));
        }

        let status: Option<String> = sqlx::query_scalar("SELECT status FROM listings WHERE id = ?")
            .bind(listing.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        match status {
            None => Err(RepositoryError::NotFound),
            Some(_) => Err(RepositoryError::ListingInactive),
        }
    }

    async fn applications_by_applicant(
        &self,
        applicant: UserId,
    ) -> Result<Vec<ApplicationWithListing>, RepositoryError> {
        let rows: Vec<SubmittedApplicationRow> = sqlx::query_as(
            "SELECT a.id, a.listing_id, a.user_id, a.status, a.created_at,
                    l.location, l.rent_amount, l.room_type, l.status AS listing_status,
                    u.name AS owner_name
             FROM applications a
             JOIN listings l ON a.listing_id = l.id
             JOIN users u ON l.user_id = u.id
             WHERE a.user_id = ?
             ORDER BY a.created_at DESC, a.id DESC",
        )
        .bind(applicant.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(SubmittedApplicationRow::into_view)
            .collect()
    }

    async fn applications_for_listing(
        &self,
        listing: ListingId,
    ) -> Result<Vec<ApplicationWithApplicant>, RepositoryError> {
        let rows: Vec<ReceivedApplicationRow> = sqlx::query_as(
            "SELECT a.id, a.listing_id, a.user_id, a.status, a.created_at,
                    u.name AS applicant_name, u.email AS applicant_email,
                    u.phone AS applicant_phone
             FROM applications a
             JOIN users u ON a.user_id = u.id
             WHERE a.listing_id = ?
             ORDER BY a.created_at DESC, a.id DESC",
        )
        .bind(listing.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(ReceivedApplicationRow::into_view)
            .collect()
    }

    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError> {
        let done = sqlx::query("UPDATE applications SET status = ? WHERE id = ?")
            .bind(status.label())
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if done.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl OwnershipResolver for SqliteStore {
    async fn resolve_owner(&self, resource: Resource) -> Result<Option<UserId>, RepositoryError> {
        let owner: Option<i64> = match resource {
            Resource::Listing(id) => sqlx::query_scalar("SELECT user_id FROM listings WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?,
            Resource::Application(id) => sqlx::query_scalar(
                "SELECT l.user_id
                 FROM applications a
                 JOIN listings l ON a.listing_id = l.id
                 WHERE a.id = ?",
            )
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?,
        };

        Ok(owner.map(UserId))
    }
}
