//! Keyset predicates for cursor pagination.
//!
//! Given the boundary key of a cursor, `after` selects the records strictly
//! following it in the requested order and `before` those strictly preceding
//! it. When every key shares one direction this is a single row comparison,
//! which Postgres can serve from a composite index. Mixed directions expand
//! into the equivalent disjunction:
//!
//! ```text
//! (k1 > v1) OR (k1 = v1 AND k2 < v2) OR (k1 = v1 AND k2 = v2 AND k3 > v3)
//! ```

use hnf1b_common::{params::SortDirection, value::FieldValue};

use super::{CmpOp, OrderKey, Predicate};

pub fn after(order: &[OrderKey], boundary: &[FieldValue]) -> Predicate {
    seek(order, boundary, false)
}

pub fn before(order: &[OrderKey], boundary: &[FieldValue]) -> Predicate {
    seek(order, boundary, true)
}

fn strict(direction: SortDirection, backwards: bool) -> CmpOp {
    match (direction, backwards) {
        (SortDirection::Asc, false) | (SortDirection::Desc, true) => CmpOp::Gt,
        (SortDirection::Desc, false) | (SortDirection::Asc, true) => CmpOp::Lt,
    }
}

fn seek(order: &[OrderKey], boundary: &[FieldValue], backwards: bool) -> Predicate {
    let Some(first) = order.first() else {
        return Predicate::True;
    };

    if order.len() == 1 {
        return Predicate::Compare {
            target: first.target,
            op: strict(first.direction, backwards),
            value: boundary[0].clone(),
        };
    }

    if order.iter().all(|key| key.direction == first.direction) {
        return Predicate::Row {
            targets: order.iter().map(|key| key.target).collect(),
            op: strict(first.direction, backwards),
            values: boundary.to_vec(),
        };
    }

    let branches = order
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let mut terms: Vec<Predicate> = order[..i]
                .iter()
                .zip(boundary)
                .map(|(prefix, value)| Predicate::Compare {
                    target: prefix.target,
                    op: CmpOp::Eq,
                    value: value.clone(),
                })
                .collect();
            terms.push(Predicate::Compare {
                target: key.target,
                op: strict(key.direction, backwards),
                value: boundary[i].clone(),
            });
            Predicate::and(terms)
        })
        .collect();

    Predicate::or(branches)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use hnf1b_common::value::FieldKind;

    use super::*;
    use crate::query::{FieldTarget, RecordFields};

    struct Row(HashMap<&'static str, FieldValue>);

    impl RecordFields for Row {
        fn field(&self, target: &FieldTarget) -> Option<FieldValue> {
            match target {
                FieldTarget::Column(c) => self.0.get(c).cloned(),
                FieldTarget::Json(_) => None,
            }
        }
    }

    fn key(field: &'static str, direction: SortDirection) -> OrderKey {
        OrderKey {
            field,
            target: FieldTarget::Column(field),
            kind: FieldKind::Text,
            direction,
        }
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.into())
    }

    fn row(a: &str, b: &str) -> Row {
        Row(HashMap::from([("a", text(a)), ("b", text(b))]))
    }

    #[test]
    fn single_key_is_a_plain_comparison() {
        let order = [key("a", SortDirection::Desc)];
        assert_eq!(
            after(&order, &[text("m")]),
            Predicate::Compare {
                target: FieldTarget::Column("a"),
                op: CmpOp::Lt,
                value: text("m"),
            }
        );
        assert!(matches!(
            before(&order, &[text("m")]),
            Predicate::Compare { op: CmpOp::Gt, .. }
        ));
    }

    #[test]
    fn uniform_direction_uses_row_comparison() {
        let order = [key("a", SortDirection::Asc), key("b", SortDirection::Asc)];
        let pred = after(&order, &[text("m"), text("m")]);
        assert!(matches!(pred, Predicate::Row { op: CmpOp::Gt, .. }));

        assert!(pred.matches(&row("m", "n")));
        assert!(!pred.matches(&row("m", "m")));
        assert!(!before(&order, &[text("m"), text("m")]).matches(&row("m", "n")));
        assert!(before(&order, &[text("m"), text("m")]).matches(&row("l", "z")));
    }

    #[test]
    fn mixed_directions_expand_to_disjunction() {
        // ORDER BY a DESC, b ASC
        let order = [key("a", SortDirection::Desc), key("b", SortDirection::Asc)];
        let pred = after(&order, &[text("m"), text("m")]);
        assert!(matches!(&pred, Predicate::Or(branches) if branches.len() == 2));

        assert!(pred.matches(&row("l", "a")));
        assert!(pred.matches(&row("m", "n")));
        assert!(!pred.matches(&row("m", "l")));
        assert!(!pred.matches(&row("m", "m")));
        assert!(!pred.matches(&row("n", "z")));

        let back = before(&order, &[text("m"), text("m")]);
        assert!(back.matches(&row("n", "z")));
        assert!(back.matches(&row("m", "l")));
        assert!(!back.matches(&row("m", "n")));
    }
}
