use std::collections::HashMap;

use hnf1b_common::{params::SortDirection, value::FieldKind};
use thiserror::Error;

/// Where a public field lives in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTarget {
    /// A plain table column.
    Column(&'static str),

    /// A path into the JSONB `document` column.
    Json(&'static [&'static str]),
}

/// Filter operators, as spelled in `filter[field][op]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

impl FilterOp {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "eq" => FilterOp::Eq,
            "ne" => FilterOp::Ne,
            "in" => FilterOp::In,
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            "exists" => FilterOp::Exists,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::In => "in",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Exists => "exists",
        }
    }
}

const EQUALITY_OPS: &[FilterOp] = &[FilterOp::Eq, FilterOp::Ne, FilterOp::In];
const RANGE_OPS: &[FilterOp] = &[
    FilterOp::Eq,
    FilterOp::Gt,
    FilterOp::Gte,
    FilterOp::Lt,
    FilterOp::Lte,
];
const ID_OPS: &[FilterOp] = &[FilterOp::Eq, FilterOp::In];
const BOOL_OPS: &[FilterOp] = &[FilterOp::Eq];
const EXISTS_OPS: &[FilterOp] = &[FilterOp::Exists];

pub const SEX_VALUES: &[&str] = &["MALE", "FEMALE", "OTHER_SEX", "UNKNOWN_SEX"];

/// A whitelisted field: its storage location, type and what clients may do
/// with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub target: FieldTarget,
    pub kind: FieldKind,

    /// Allowed operators. The first one is used when `filter[field]` carries
    /// no explicit operator.
    pub ops: &'static [FilterOp],

    pub sortable: bool,

    /// Whether values are unique per record, so the field alone gives a
    /// total order.
    pub unique: bool,

    /// Permitted values for enumerated text fields.
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldSpec {
    pub fn column(name: &'static str, kind: FieldKind, ops: &'static [FilterOp]) -> Self {
        Self {
            name,
            target: FieldTarget::Column(name),
            kind,
            ops,
            sortable: false,
            unique: false,
            allowed: None,
        }
    }

    pub fn json(
        name: &'static str,
        path: &'static [&'static str],
        kind: FieldKind,
        ops: &'static [FilterOp],
    ) -> Self {
        Self {
            name,
            target: FieldTarget::Json(path),
            kind,
            ops,
            sortable: false,
            unique: false,
            allowed: None,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn allowed(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn allows(&self, op: FilterOp) -> bool {
        self.ops.contains(&op)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("field '{0}' is registered twice")]
    Duplicate(&'static str),

    #[error("field '{0}' has no filter operators")]
    NoOperators(&'static str),

    #[error("field '{0}' is a JSON path and cannot be sortable")]
    SortableJson(&'static str),

    #[error("tiebreaker '{0}' must be a registered, sortable, unique field")]
    Tiebreaker(&'static str),

    #[error("default sort field '{0}' must be a registered, sortable field")]
    DefaultSort(&'static str),
}

/// The static whitelist of queryable fields for one resource type.
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: HashMap<&'static str, FieldSpec>,
    tiebreaker: &'static str,
    default_sort: Vec<(&'static str, SortDirection)>,
}

impl FieldRegistry {
    pub fn new(
        specs: Vec<FieldSpec>,
        tiebreaker: &'static str,
        default_sort: Vec<(&'static str, SortDirection)>,
    ) -> Result<Self, RegistryError> {
        let mut fields = HashMap::with_capacity(specs.len());
        for spec in specs {
            if spec.ops.is_empty() {
                return Err(RegistryError::NoOperators(spec.name));
            }
            if spec.sortable && matches!(spec.target, FieldTarget::Json(_)) {
                return Err(RegistryError::SortableJson(spec.name));
            }
            if let Some(previous) = fields.insert(spec.name, spec) {
                return Err(RegistryError::Duplicate(previous.name));
            }
        }

        match fields.get(tiebreaker) {
            Some(spec) if spec.sortable && spec.unique => {}
            _ => return Err(RegistryError::Tiebreaker(tiebreaker)),
        }

        for &(name, _) in &default_sort {
            if !fields.get(name).is_some_and(|spec| spec.sortable) {
                return Err(RegistryError::DefaultSort(name));
            }
        }

        Ok(Self {
            fields,
            tiebreaker,
            default_sort,
        })
    }

    /// The whitelist for phenopacket records.
    pub fn phenopackets() -> Result<Self, RegistryError> {
        Self::new(
            vec![
                FieldSpec::column("id", FieldKind::Uuid, ID_OPS)
                    .sortable()
                    .unique(),
                FieldSpec::column("phenopacket_id", FieldKind::Text, EQUALITY_OPS)
                    .sortable()
                    .unique(),
                FieldSpec::column("subject_id", FieldKind::Text, EQUALITY_OPS).sortable(),
                FieldSpec::column("sex", FieldKind::Text, EQUALITY_OPS)
                    .sortable()
                    .allowed(SEX_VALUES),
                FieldSpec::column("has_variants", FieldKind::Bool, BOOL_OPS).sortable(),
                FieldSpec::column("created_at", FieldKind::Timestamp, RANGE_OPS).sortable(),
                FieldSpec::column("updated_at", FieldKind::Timestamp, RANGE_OPS).sortable(),
                FieldSpec::json(
                    "karyotypic_sex",
                    &["subject", "karyotypicSex"],
                    FieldKind::Text,
                    EQUALITY_OPS,
                ),
                FieldSpec::json(
                    "interpretations",
                    &["interpretations"],
                    FieldKind::Bool,
                    EXISTS_OPS,
                ),
                FieldSpec::json("diseases", &["diseases"], FieldKind::Bool, EXISTS_OPS),
            ],
            "id",
            vec![("created_at", SortDirection::Asc)],
        )
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn tiebreaker(&self) -> &FieldSpec {
        // Checked in `new`.
        &self.fields[self.tiebreaker]
    }

    pub fn default_sort(&self) -> &[(&'static str, SortDirection)] {
        &self.default_sort
    }
}
