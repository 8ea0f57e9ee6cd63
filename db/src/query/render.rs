//! Rendering of compiled queries into parameterized Postgres SQL.
//!
//! Identifiers come only from the field whitelist and are always quoted.
//! Every client-supplied value becomes a positional `$n` bind.

use std::fmt::Write;

use hnf1b_common::{params::SortDirection, value::FieldValue};

use super::{FieldTarget, OrderKey, Predicate};
use crate::models::DOCUMENT_COLUMN;

/// A bind parameter, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Value(FieldValue),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

struct Renderer {
    sql: String,
    binds: Vec<Bind>,
}

impl Renderer {
    fn new() -> Self {
        Self {
            sql: String::with_capacity(256),
            binds: Vec::new(),
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn bind(&mut self, bind: Bind) {
        self.binds.push(bind);
        let _ = write!(self.sql, "${}", self.binds.len());
    }

    fn target(&mut self, target: &FieldTarget) {
        match target {
            FieldTarget::Column(column) => self.push(&quote_ident(column)),
            FieldTarget::Json(path) => {
                let _ = write!(
                    self.sql,
                    "({} #>> {})",
                    quote_ident(DOCUMENT_COLUMN),
                    json_path(path)
                );
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::True => self.push("TRUE"),
            Predicate::And(terms) => self.junction(terms, " AND ", "TRUE"),
            Predicate::Or(terms) => self.junction(terms, " OR ", "FALSE"),
            Predicate::Compare { target, op, value } => {
                self.target(target);
                let _ = write!(self.sql, " {} ", op.as_sql());
                self.bind(Bind::Value(value.clone()));
            }
            Predicate::In { target, values } => {
                if values.is_empty() {
                    self.push("FALSE");
                    return;
                }
                self.target(target);
                self.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(Bind::Value(value.clone()));
                }
                self.push(")");
            }
            Predicate::Exists { target, exists } => {
                let op = if *exists { "<>" } else { "=" };
                match target {
                    // JSON null counts as absent.
                    FieldTarget::Json(path) => {
                        let _ = write!(
                            self.sql,
                            "COALESCE(jsonb_typeof({} #> {}), 'null') {op} 'null'",
                            quote_ident(DOCUMENT_COLUMN),
                            json_path(path)
                        );
                    }
                    FieldTarget::Column(column) => {
                        let not = if *exists { " NOT" } else { "" };
                        let _ = write!(self.sql, "{} IS{not} NULL", quote_ident(column));
                    }
                }
            }
            Predicate::Row {
                targets,
                op,
                values,
            } => {
                self.push("(");
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.target(target);
                }
                let _ = write!(self.sql, ") {} (", op.as_sql());
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(Bind::Value(value.clone()));
                }
                self.push(")");
            }
        }
    }

    fn junction(&mut self, terms: &[Predicate], sep: &str, empty: &str) {
        if terms.is_empty() {
            self.push(empty);
            return;
        }
        self.push("(");
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            self.predicate(term);
        }
        self.push(")");
    }

    fn filter(&mut self, predicate: &Predicate) {
        if *predicate != Predicate::True {
            self.push(" WHERE ");
            self.predicate(predicate);
        }
    }

    fn order(&mut self, order: &[OrderKey]) {
        for (i, key) in order.iter().enumerate() {
            self.push(if i == 0 { " ORDER BY " } else { ", " });
            self.target(&key.target);
            self.push(match key.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            });
        }
    }

    fn finish(self) -> SqlStatement {
        SqlStatement {
            sql: self.sql,
            binds: self.binds,
        }
    }
}

/// `SELECT <columns> FROM <table> [WHERE ..] [ORDER BY ..] LIMIT $n [OFFSET $m]`
pub fn render_select(
    table: &str,
    columns: &[&str],
    predicate: &Predicate,
    order: &[OrderKey],
    limit: i64,
    offset: i64,
) -> SqlStatement {
    let mut r = Renderer::new();
    r.push("SELECT ");
    r.push(
        &columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
    );
    r.push(" FROM ");
    r.push(&quote_ident(table));
    r.filter(predicate);
    r.order(order);
    r.push(" LIMIT ");
    r.bind(Bind::Int(limit));
    if offset > 0 {
        r.push(" OFFSET ");
        r.bind(Bind::Int(offset));
    }
    r.finish()
}

/// `SELECT COUNT(*) AS total FROM <table> [WHERE ..]`
pub fn render_count(table: &str, predicate: &Predicate) -> SqlStatement {
    let mut r = Renderer::new();
    r.push("SELECT COUNT(*) AS total FROM ");
    r.push(&quote_ident(table));
    r.filter(predicate);
    r.finish()
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A Postgres text-array literal for `#>`/`#>>`, e.g. `'{"subject","sex"}'`.
fn json_path(path: &[&str]) -> String {
    let elements = path
        .iter()
        .map(|segment| {
            let escaped = segment.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("'{{{}}}'", elements.replace('\'', "''"))
}
