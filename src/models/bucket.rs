//! Represents a logical bucket, the namespace the gateway serves objects from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket in the disk backend.
///
/// The gateway is bound to exactly one bucket at startup; every object key
/// is resolved inside it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Bucket name (lowercase letters, digits, dots, hyphens).
    pub name: String,

    /// Region label recorded at creation time.
    pub region: String,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
