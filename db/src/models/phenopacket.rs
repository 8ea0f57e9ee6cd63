use std::fmt::Display;

use chrono::{DateTime, Utc};
use diesel::{
    QueryableByName,
    sql_types::{Bool, Jsonb, Text, Timestamptz},
};
use hnf1b_common::{
    value::FieldValue,
    views::{PHENOPACKET_RESOURCE_TYPE, Phenopacket, Resource},
};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::query::{FieldTarget, RecordFields};

pub const PHENOPACKETS_TABLE: &str = "phenopackets";

/// The JSONB column holding the full phenopacket.
pub const DOCUMENT_COLUMN: &str = "document";

pub const PHENOPACKET_COLUMNS: &[&str] = &[
    "id",
    "phenopacket_id",
    "subject_id",
    "sex",
    "has_variants",
    "created_at",
    "updated_at",
    DOCUMENT_COLUMN,
];

pub const UNKNOWN_SEX: &str = "UNKNOWN_SEX";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("phenopacket is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("phenopacket document must be a JSON object")]
    NotAnObject,
}

/// One row of the `phenopackets` table.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct DbPhenopacket {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: Uuid,

    /// The document's own `id`.
    #[diesel(sql_type = Text)]
    pub phenopacket_id: String,

    #[diesel(sql_type = Text)]
    pub subject_id: String,

    #[diesel(sql_type = Text)]
    pub sex: String,

    /// Denormalized from the interpretations so it can be filtered and
    /// sorted on an index.
    #[diesel(sql_type = Bool)]
    pub has_variants: bool,

    #[diesel(sql_type = Timestamptz)]
    pub created_at: DateTime<Utc>,

    #[diesel(sql_type = Timestamptz)]
    pub updated_at: DateTime<Utc>,

    #[diesel(sql_type = Jsonb)]
    pub document: Value,
}

impl Display for DbPhenopacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DbPhenopacket {{ id: {}, phenopacket_id: {}, subject_id: {} }}",
            self.id, self.phenopacket_id, self.subject_id
        )
    }
}

impl DbPhenopacket {
    /// Derive a row from a GA4GH Phenopacket v2 document.
    ///
    /// `created_at` is taken from `metaData.created` when it is a valid
    /// RFC 3339 timestamp, otherwise the current time is used.
    pub fn from_document(document: Value) -> Result<Self, ModelError> {
        if !document.is_object() {
            return Err(ModelError::NotAnObject);
        }

        let phenopacket_id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingField("id"))?
            .to_string();

        let subject = document.get("subject");
        let subject_id = subject
            .and_then(|s| s.get("id"))
            .and_then(Value::as_str)
            .ok_or(ModelError::MissingField("subject.id"))?
            .to_string();
        let sex = subject
            .and_then(|s| s.get("sex"))
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_SEX)
            .to_string();

        let created_at = document
            .pointer("/metaData/created")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Self {
            id: Uuid::new_v4(),
            has_variants: has_genomic_interpretations(&document),
            phenopacket_id,
            subject_id,
            sex,
            created_at,
            updated_at: created_at,
            document,
        })
    }

    pub fn into_resource(self) -> Resource<Phenopacket> {
        Resource {
            kind: PHENOPACKET_RESOURCE_TYPE.into(),
            id: self.phenopacket_id.clone(),
            attributes: self.into(),
        }
    }
}

fn has_genomic_interpretations(document: &Value) -> bool {
    document
        .get("interpretations")
        .and_then(Value::as_array)
        .is_some_and(|interpretations| {
            interpretations.iter().any(|i| {
                i.pointer("/diagnosis/genomicInterpretations")
                    .and_then(Value::as_array)
                    .is_some_and(|g| !g.is_empty())
            })
        })
}

impl RecordFields for DbPhenopacket {
    fn field(&self, target: &FieldTarget) -> Option<FieldValue> {
        match target {
            FieldTarget::Column(column) => match *column {
                "id" => Some(FieldValue::Uuid(self.id)),
                "phenopacket_id" => Some(FieldValue::Text(self.phenopacket_id.clone())),
                "subject_id" => Some(FieldValue::Text(self.subject_id.clone())),
                "sex" => Some(FieldValue::Text(self.sex.clone())),
                "has_variants" => Some(FieldValue::Bool(self.has_variants)),
                "created_at" => Some(FieldValue::Timestamp(self.created_at)),
                "updated_at" => Some(FieldValue::Timestamp(self.updated_at)),
                _ => None,
            },
            // Mirrors `#>>`: strings come back unquoted, other JSON values as
            // their JSON text, and JSON null as SQL NULL.
            FieldTarget::Json(path) => {
                let mut node = &self.document;
                for segment in path.iter() {
                    node = match node {
                        Value::Object(map) => map.get(*segment)?,
                        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                match node {
                    Value::Null => None,
                    Value::String(s) => Some(FieldValue::Text(s.clone())),
                    other => Some(FieldValue::Text(other.to_string())),
                }
            }
        }
    }
}

impl From<DbPhenopacket> for Phenopacket {
    fn from(value: DbPhenopacket) -> Self {
        Self {
            record_id: value.id,
            subject_id: value.subject_id,
            sex: value.sex,
            has_variants: value.has_variants,
            created_at: value.created_at,
            updated_at: value.updated_at,
            phenopacket: value.document,
        }
    }
}
