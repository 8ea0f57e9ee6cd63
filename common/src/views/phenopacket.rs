use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const PHENOPACKET_RESOURCE_TYPE: &str = "phenopacket";

/// Attributes of a phenopacket resource.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Phenopacket {
    /// Internal surrogate key of the stored record.
    pub record_id: Uuid,

    pub subject_id: String,

    /// Phenotypic sex of the subject (`MALE`, `FEMALE`, `OTHER_SEX`,
    /// `UNKNOWN_SEX`).
    pub sex: String,

    /// Whether any interpretation reports a genomic variant.
    pub has_variants: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// The full GA4GH Phenopacket v2 document.
    #[schema(value_type = Object)]
    pub phenopacket: serde_json::Value,
}
