use hnf1b_common::{
    cursor::Cursor,
    error::PageError,
    params::{FilterParam, SortDirection, SortParam},
    value::{FieldKind, FieldValue},
};
use sha2::{Digest, Sha256};

use super::{CmpOp, FieldRegistry, FieldSpec, FieldTarget, FilterOp, Predicate, RecordFields};

/// Number of hex characters of the sort digest embedded in cursors.
const FINGERPRINT_LEN: usize = 16;

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: &'static str,
    pub target: FieldTarget,
    pub kind: FieldKind,
    pub direction: SortDirection,
}

impl OrderKey {
    fn from_spec(spec: &FieldSpec, direction: SortDirection) -> Self {
        Self {
            field: spec.name,
            target: spec.target,
            kind: spec.kind,
            direction,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            direction: self.direction.reverse(),
            ..self.clone()
        }
    }
}

/// The compiled form of a request's filters and sort.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub predicate: Predicate,

    /// Full ordering, always ending in a total order.
    pub order: Vec<OrderKey>,

    /// Digest of `order`; embedded in every cursor issued for it.
    pub fingerprint: String,
}

impl CompiledQuery {
    /// Decode a cursor token and check it belongs to this ordering.
    ///
    /// Cursors issued under a different sort are rejected rather than
    /// reinterpreted.
    pub fn boundary(&self, token: &str) -> Result<Vec<FieldValue>, PageError> {
        let cursor = Cursor::decode(token)?;

        if cursor.sort != self.fingerprint {
            return Err(PageError::invalid_cursor(
                "cursor was issued for a different sort order",
            ));
        }
        if cursor.keys.len() != self.order.len() {
            return Err(PageError::invalid_cursor(format!(
                "expected {} sort keys, found {}",
                self.order.len(),
                cursor.keys.len()
            )));
        }
        for (key, value) in self.order.iter().zip(&cursor.keys) {
            if key.kind != value.kind() {
                return Err(PageError::invalid_cursor(format!(
                    "sort key '{}' must be {}, found {}",
                    key.field,
                    key.kind,
                    value.kind()
                )));
            }
        }

        Ok(cursor.keys)
    }

    /// Encode the cursor of `record` under this ordering. Returns `None` if
    /// any sort key is NULL on the record.
    pub fn cursor_for<R: RecordFields + ?Sized>(&self, record: &R) -> Option<String> {
        let keys = self
            .order
            .iter()
            .map(|key| record.field(&key.target))
            .collect::<Option<Vec<_>>>()?;
        Some(Cursor::new(self.fingerprint.clone(), keys).encode())
    }
}

impl FieldRegistry {
    /// Compile filter and sort parameters against this whitelist.
    ///
    /// Unknown fields are errors, never ignored. Filters are combined with
    /// AND. When no sort key is unique the tiebreaker is appended, in the
    /// direction of the primary key.
    pub fn compile(
        &self,
        filters: &[FilterParam],
        sort: &[SortParam],
    ) -> Result<CompiledQuery, PageError> {
        let predicate = Predicate::and(
            filters
                .iter()
                .map(|f| self.compile_filter(f))
                .collect::<Result<Vec<_>, _>>()?,
        );

        let mut order = Vec::with_capacity(sort.len() + 1);
        if sort.is_empty() {
            for &(name, direction) in self.default_sort() {
                let spec = self
                    .get(name)
                    .ok_or_else(|| PageError::UnknownSortField(name.to_string()))?;
                order.push(OrderKey::from_spec(spec, direction));
            }
        } else {
            for param in sort {
                let spec = self
                    .get(&param.field)
                    .filter(|spec| spec.sortable)
                    .ok_or_else(|| PageError::UnknownSortField(param.field.clone()))?;
                order.push(OrderKey::from_spec(spec, param.direction));
            }
        }

        let total = order
            .iter()
            .any(|key| self.get(key.field).is_some_and(|spec| spec.unique));
        if !total {
            let direction = order
                .first()
                .map(|key| key.direction)
                .unwrap_or(SortDirection::Asc);
            order.push(OrderKey::from_spec(self.tiebreaker(), direction));
        }

        let fingerprint = fingerprint(&order);
        Ok(CompiledQuery {
            predicate,
            order,
            fingerprint,
        })
    }

    fn compile_filter(&self, param: &FilterParam) -> Result<Predicate, PageError> {
        let spec = self
            .get(&param.field)
            .ok_or_else(|| PageError::UnknownFilterField(param.field.clone()))?;

        let op = match param.op.as_deref() {
            Some(raw) => FilterOp::parse(raw).ok_or_else(|| {
                PageError::invalid_filter(spec.name, format!("unknown operator '{raw}'"))
            })?,
            None if param.value.contains(',') && spec.allows(FilterOp::In) => FilterOp::In,
            None => spec.ops[0],
        };
        if !spec.allows(op) {
            return Err(PageError::invalid_filter(
                spec.name,
                format!("operator '{}' is not supported", op.as_str()),
            ));
        }

        let predicate = match op {
            FilterOp::Exists => {
                let exists = match FieldKind::Bool.parse(&param.value) {
                    Ok(FieldValue::Bool(b)) => b,
                    _ => {
                        return Err(PageError::invalid_filter(
                            spec.name,
                            "exists expects true or false",
                        ));
                    }
                };
                Predicate::Exists {
                    target: spec.target,
                    exists,
                }
            }
            FilterOp::In => Predicate::In {
                target: spec.target,
                values: param
                    .value
                    .split(',')
                    .map(|raw| parse_value(spec, raw))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            FilterOp::Eq => compare(spec, CmpOp::Eq, &param.value)?,
            FilterOp::Ne => compare(spec, CmpOp::Ne, &param.value)?,
            FilterOp::Gt => compare(spec, CmpOp::Gt, &param.value)?,
            FilterOp::Gte => compare(spec, CmpOp::Gte, &param.value)?,
            FilterOp::Lt => compare(spec, CmpOp::Lt, &param.value)?,
            FilterOp::Lte => compare(spec, CmpOp::Lte, &param.value)?,
        };

        Ok(predicate)
    }
}

fn compare(spec: &FieldSpec, op: CmpOp, raw: &str) -> Result<Predicate, PageError> {
    Ok(Predicate::Compare {
        target: spec.target,
        op,
        value: parse_value(spec, raw)?,
    })
}

fn parse_value(spec: &FieldSpec, raw: &str) -> Result<FieldValue, PageError> {
    if raw.trim().is_empty() {
        return Err(PageError::invalid_filter(spec.name, "empty filter value"));
    }

    let value = spec
        .kind
        .parse(raw)
        .map_err(|reason| PageError::invalid_filter(spec.name, reason))?;

    if let (Some(allowed), FieldValue::Text(text)) = (spec.allowed, &value) {
        if !allowed.contains(&text.as_str()) {
            return Err(PageError::invalid_filter(
                spec.name,
                format!("'{text}' is not one of {}", allowed.join(", ")),
            ));
        }
    }

    Ok(value)
}

fn fingerprint(order: &[OrderKey]) -> String {
    let canonical = order
        .iter()
        .map(|key| match key.direction {
            SortDirection::Asc => key.field.to_string(),
            SortDirection::Desc => format!("-{}", key.field),
        })
        .collect::<Vec<_>>()
        .join(",");

    let digest = hex::encode(Sha256::digest(canonical.as_bytes()));
    digest[..FINGERPRINT_LEN].to_string()
}
