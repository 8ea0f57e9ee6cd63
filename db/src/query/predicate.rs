use std::cmp::Ordering;

use hnf1b_common::value::FieldValue;

use super::FieldTarget;

/// Read access to the whitelisted fields of a stored record.
pub trait RecordFields {
    /// The value at `target`, or `None` where SQL would see NULL.
    fn field(&self, target: &FieldTarget) -> Option<FieldValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Gte => ordering != Ordering::Less,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A filter expression over one record. Values are always carried as data
/// and end up as bind parameters when rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        target: FieldTarget,
        op: CmpOp,
        value: FieldValue,
    },
    In {
        target: FieldTarget,
        values: Vec<FieldValue>,
    },
    /// Whether a JSON path resolves to a non-null value.
    Exists { target: FieldTarget, exists: bool },
    /// Lexicographic comparison of a compound key, `(a, b) > ($1, $2)`.
    Row {
        targets: Vec<FieldTarget>,
        op: CmpOp,
        values: Vec<FieldValue>,
    },
}

impl Predicate {
    /// Conjunction that drops `True` terms and collapses trivial cases.
    pub fn and(terms: Vec<Predicate>) -> Predicate {
        let mut terms: Vec<Predicate> = terms
            .into_iter()
            .filter(|t| *t != Predicate::True)
            .collect();
        match terms.len() {
            0 => Predicate::True,
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        }
    }

    /// Disjunction; a single term is returned unchanged.
    pub fn or(mut terms: Vec<Predicate>) -> Predicate {
        match terms.len() {
            1 => terms.remove(0),
            _ => Predicate::Or(terms),
        }
    }

    /// Evaluate with SQL semantics: any comparison against NULL is false.
    pub fn matches<R: RecordFields + ?Sized>(&self, record: &R) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(terms) => terms.iter().all(|t| t.matches(record)),
            Predicate::Or(terms) => terms.iter().any(|t| t.matches(record)),
            Predicate::Compare { target, op, value } => record
                .field(target)
                .and_then(|actual| actual.compare(value))
                .is_some_and(|ordering| op.holds(ordering)),
            Predicate::In { target, values } => record
                .field(target)
                .is_some_and(|actual| values.contains(&actual)),
            Predicate::Exists { target, exists } => record.field(target).is_some() == *exists,
            Predicate::Row {
                targets,
                op,
                values,
            } => {
                let mut ordering = Ordering::Equal;
                for (target, value) in targets.iter().zip(values) {
                    let Some(step) = record.field(target).and_then(|actual| actual.compare(value))
                    else {
                        return false;
                    };
                    if step != Ordering::Equal {
                        ordering = step;
                        break;
                    }
                }
                op.holds(ordering)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct Fake(HashMap<&'static str, FieldValue>);

    impl RecordFields for Fake {
        fn field(&self, target: &FieldTarget) -> Option<FieldValue> {
            match target {
                FieldTarget::Column(c) => self.0.get(c).cloned(),
                FieldTarget::Json(_) => None,
            }
        }
    }

    fn record(a: &str, b: &str) -> Fake {
        Fake(HashMap::from([
            ("a", FieldValue::Text(a.into())),
            ("b", FieldValue::Text(b.into())),
        ]))
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.into())
    }

    #[test]
    fn and_collapses_trivial_terms() {
        assert_eq!(Predicate::and(vec![]), Predicate::True);
        assert_eq!(Predicate::and(vec![Predicate::True, Predicate::True]), Predicate::True);

        let cmp = Predicate::Compare {
            target: FieldTarget::Column("a"),
            op: CmpOp::Eq,
            value: text("x"),
        };
        assert_eq!(Predicate::and(vec![Predicate::True, cmp.clone()]), cmp);
    }

    #[test]
    fn comparisons_against_null_are_false() {
        let pred = Predicate::Compare {
            target: FieldTarget::Column("missing"),
            op: CmpOp::Ne,
            value: text("x"),
        };
        assert!(!pred.matches(&record("a", "b")));
    }

    #[test]
    fn in_matches_any_listed_value() {
        let pred = Predicate::In {
            target: FieldTarget::Column("a"),
            values: vec![text("x"), text("y")],
        };
        assert!(pred.matches(&record("y", "_")));
        assert!(!pred.matches(&record("z", "_")));
    }

    #[test]
    fn row_comparison_is_lexicographic() {
        let pred = Predicate::Row {
            targets: vec![FieldTarget::Column("a"), FieldTarget::Column("b")],
            op: CmpOp::Gt,
            values: vec![text("m"), text("m")],
        };
        assert!(pred.matches(&record("n", "a")));
        assert!(pred.matches(&record("m", "n")));
        assert!(!pred.matches(&record("m", "m")));
        assert!(!pred.matches(&record("l", "z")));
    }

    #[test]
    fn exists_checks_for_non_null() {
        let present = Predicate::Exists {
            target: FieldTarget::Column("a"),
            exists: true,
        };
        let absent = Predicate::Exists {
            target: FieldTarget::Column("missing"),
            exists: false,
        };
        assert!(present.matches(&record("a", "b")));
        assert!(absent.matches(&record("a", "b")));
    }
}
