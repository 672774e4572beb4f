use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Identifier wrapper for registered users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Identifier wrapper for room listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub i64);

/// Identifier wrapper for tenancy applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

/// Identifier wrapper for listing image attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub i64);

macro_rules! display_id {
    ($($id:ty),*) => {
        $(impl std::fmt::Display for $id {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_id!(UserId, ListingId, ApplicationId, ImageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Private,
    Shared,
}

impl RoomType {
    pub const fn label(self) -> &'static str {
        match self {
            RoomType::Private => "private",
            RoomType::Shared => "shared",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "private" => Some(Self::Private),
            "shared" => Some(Self::Shared),
            _ => None,
        }
    }
}

/// Listings only leave `Active` through a soft delete; nothing moves them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Inactive,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Status tracked for each tenancy application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Ordered amenity tags. Persisted as a single comma-delimited column, so tags may not
/// contain commas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amenities(Vec<String>);

pub const AMENITY_DELIMITER: char = ',';

impl Amenities {
    /// Trims each tag and drops blanks; fails on the first tag containing the delimiter.
    pub fn from_tags<I, T>(tags: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut cleaned = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() {
                continue;
            }
            if tag.contains(AMENITY_DELIMITER) {
                return Err(format!(
                    "amenity '{tag}' may not contain '{AMENITY_DELIMITER}'"
                ));
            }
            cleaned.push(tag.to_string());
        }
        Ok(Self(cleaned))
    }

    pub fn to_storage(&self) -> String {
        self.0.join(&AMENITY_DELIMITER.to_string())
    }

    pub fn from_storage(raw: &str) -> Self {
        Self(
            raw.split(AMENITY_DELIMITER)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn tags(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Listing fields as they arrive from a client. Every field is optional on the wire so that
/// validation can report which one is missing instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDraft {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "form_number")]
    pub rent_amount: Option<f64>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub available_date: Option<String>,
    #[serde(default, deserialize_with = "form_number")]
    pub roommates_needed: Option<i64>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub house_rules: Option<String>,
    #[serde(default)]
    pub contact_preferences: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormNumber<T> {
    Number(T),
    Text(String),
}

/// Numbers may arrive as JSON numbers or as form text. Blank text counts as absent.
fn form_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match Option::<FormNumber<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FormNumber::Number(value)) => Ok(Some(value)),
        Some(FormNumber::Text(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse()
                .map(Some)
                .map_err(|err| de::Error::custom(format!("'{raw}' is not a number ({err})")))
        }
    }
}

/// Validated listing content written on create and on full replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFields {
    pub location: String,
    pub rent_amount: f64,
    pub room_type: RoomType,
    pub available_date: NaiveDate,
    pub roommates_needed: u32,
    pub amenities: Amenities,
    pub house_rules: Option<String>,
    pub contact_preferences: Option<String>,
}

impl ListingDraft {
    pub fn validate(&self) -> Result<ListingFields, String> {
        let location = self
            .location
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or("location is required")?
            .to_string();

        let rent_amount = self.rent_amount.ok_or("rent_amount is required")?;
        if !rent_amount.is_finite() || rent_amount < 0.0 {
            return Err("rent_amount must be a non-negative number".to_string());
        }

        let room_type = match self.room_type.as_deref().map(str::trim) {
            None | Some("") => return Err("room_type is required".to_string()),
            Some(raw) => RoomType::parse(raw)
                .ok_or_else(|| format!("room_type '{raw}' must be private or shared"))?,
        };

        let available_date = match self.available_date.as_deref().map(str::trim) {
            None | Some("") => return Err("available_date is required".to_string()),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|err| format!("available_date '{raw}' is not YYYY-MM-DD ({err})"))?,
        };

        let roommates_needed = self.roommates_needed.ok_or("roommates_needed is required")?;
        let roommates_needed = u32::try_from(roommates_needed)
            .ok()
            .filter(|count| *count > 0)
            .ok_or("roommates_needed must be a positive whole number")?;

        let amenities = match &self.amenities {
            Some(tags) => Amenities::from_tags(tags)?,
            None => Amenities::default(),
        };

        Ok(ListingFields {
            location,
            rent_amount,
            room_type,
            available_date,
            roommates_needed,
            amenities,
            house_rules: non_blank(&self.house_rules),
            contact_preferences: non_blank(&self.contact_preferences),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Stored attachment reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRef {
    pub id: ImageId,
    pub listing_id: ListingId,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

/// A single active listing joined with its owner and every attached image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingDetails {
    pub id: ListingId,
    pub user_id: UserId,
    pub location: String,
    pub rent_amount: f64,
    pub room_type: RoomType,
    pub available_date: NaiveDate,
    pub roommates_needed: u32,
    pub amenities: Amenities,
    pub house_rules: Option<String>,
    pub contact_preferences: Option<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    pub owner_email: String,
    pub images: Vec<ImageRef>,
}

/// Listing row used by the browse and search views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSummary {
    pub id: ListingId,
    pub user_id: UserId,
    pub location: String,
    pub rent_amount: f64,
    pub room_type: RoomType,
    pub available_date: NaiveDate,
    pub roommates_needed: u32,
    pub amenities: Amenities,
    pub house_rules: Option<String>,
    pub contact_preferences: Option<String>,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    pub owner_email: String,
    /// First image uploaded for the listing.
    pub featured_image: Option<String>,
}

/// An applicant's view of one of their applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationWithListing {
    pub id: ApplicationId,
    pub listing_id: ListingId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub location: String,
    pub rent_amount: f64,
    pub room_type: RoomType,
    pub listing_status: ListingStatus,
    pub owner_name: Option<String>,
}

/// A listing owner's view of an application received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationWithApplicant {
    pub id: ApplicationId,
    pub listing_id: ListingId,
    pub user_id: UserId,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub applicant_name: Option<String>,
    pub applicant_email: String,
    pub applicant_phone: Option<String>,
}

/// Public user profile; the credential hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row inserted on registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Credential lookup result used by login.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user_id: UserId,
    pub password_hash: String,
}

/// Self-service profile replacement.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}
