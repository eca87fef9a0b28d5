//! Command values for the gRain dialect.
//!
//! Each value is what an [`InferenceEngine`](crate::engine::InferenceEngine) operation
//! receives; its `Display` impl renders the command text a gRain session evaluates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::network::{Combination, Distribution};

/// Renders `c("a","b")`, or `c()` for an empty list.
pub fn quoted_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items
        .into_iter()
        .map(|item| format!("\"{}\"", item.as_ref()))
        .collect::<Vec<String>>()
        .join(",");
    format!("c({joined})")
}

/// `library(gRain)` / `library(gRain, lib.loc="/opt/R/library")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLibrary {
    pub name: String,
    pub lib_loc: Option<String>,
}

impl fmt::Display for ImportLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lib_loc {
            Some(loc) => write!(f, "library({}, lib.loc=\"{}\")", self.name, loc.replace('\\', "/")),
            None => write!(f, "library({})", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    /// Conditional probability table with explicit values.
    Conditional,
    /// Deterministic logical AND over the parents.
    And,
    /// Deterministic logical OR over the parents.
    Or,
}

impl TableKind {
    pub fn function(&self) -> &'static str {
        match self {
            TableKind::Conditional => "cptable",
            TableKind::And => "andtable",
            TableKind::Or => "ortable",
        }
    }
}

impl From<Combination> for TableKind {
    fn from(combination: Combination) -> Self {
        match combination {
            Combination::Plain => TableKind::Conditional,
            Combination::And => TableKind::And,
            Combination::Or => TableKind::Or,
        }
    }
}

/// Creation of one node's table in the engine.
///
/// `t.a <- cptable(~ tub + asia, values = c(5, 95, 1, 99), levels = c("yes","no"))`
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub alias: String,
    pub kind: TableKind,
    /// The node's own name followed by its parents' names.
    pub formula: Vec<String>,
    /// Present for conditional tables only.
    pub values: Option<Distribution>,
    pub levels: Vec<String>,
}

impl TableSpec {
    /// `tub + asia`
    pub fn formula_text(&self) -> String {
        self.formula.join(" + ")
    }
}

impl fmt::Display for TableSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels = quoted_list(&self.levels);
        match (&self.kind, &self.values) {
            (TableKind::Conditional, Some(values)) => write!(
                f,
                "{} <- {}(~ {}, values = c({}), levels = {})",
                self.alias,
                self.kind.function(),
                self.formula_text(),
                values,
                levels
            ),
            _ => write!(
                f,
                "{} <- {}(~ {}, levels = {})",
                self.alias,
                self.kind.function(),
                self.formula_text(),
                levels
            ),
        }
    }
}

/// `bn.asia <- grain(compileCPT(list(a, t.a, s)))`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileModel {
    pub network_alias: String,
    pub node_aliases: Vec<String>,
}

impl fmt::Display for CompileModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- grain(compileCPT(list({})))",
            self.network_alias,
            self.node_aliases.join(", ")
        )
    }
}

/// `bn.asia.temp.0 <- setEvidence(bn.asia, c("asia","either"), c("yes","yes"))`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsorbEvidence {
    pub base: String,
    pub temp: String,
    pub nodes: Vec<String>,
    pub levels: Vec<String>,
}

impl AbsorbEvidence {
    pub fn from_snapshot(base: &str, temp: &str, snapshot: &[(String, String)]) -> Self {
        AbsorbEvidence {
            base: base.to_string(),
            temp: temp.to_string(),
            nodes: snapshot.iter().map(|(node, _)| node.clone()).collect(),
            levels: snapshot.iter().map(|(_, level)| level.clone()).collect(),
        }
    }
}

impl fmt::Display for AbsorbEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- setEvidence({}, {}, {})",
            self.temp,
            self.base,
            quoted_list(&self.nodes),
            quoted_list(&self.levels)
        )
    }
}

/// `bn.asia.res.0 <- querygrain(bn.asia.temp.0, nodes=c("tub"), type="marginal")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMarginal {
    pub model: String,
    pub result: String,
    pub nodes: Vec<String>,
}

impl fmt::Display for QueryMarginal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- querygrain({}, nodes={}, type=\"marginal\")",
            self.result,
            self.model,
            quoted_list(&self.nodes)
        )
    }
}

/// `bn.asia.res.0$tub`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMarginal<'a> {
    pub result: &'a str,
    pub node: &'a str,
}

impl fmt::Display for FetchMarginal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.result, self.node)
    }
}

/// `querygrain(bn.asia.temp.0, nodes=c("asia"), type="joint")`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryJoint {
    pub model: String,
    pub nodes: Vec<String>,
}

impl fmt::Display for QueryJoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "querygrain({}, nodes={}, type=\"joint\")",
            self.model,
            quoted_list(&self.nodes)
        )
    }
}

/// `rm(bn.asia.temp.0)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release<'a>(pub &'a str);

impl fmt::Display for Release<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rm({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_conditional_table_text() {
        let spec = TableSpec {
            alias: "t.a".into(),
            kind: TableKind::Conditional,
            formula: vec!["tub".into(), "asia".into()],
            values: Some(Distribution::from_weights([5, 95, 1, 99]).unwrap()),
            levels: vec!["yes".into(), "no".into()],
        };
        assert_eq!(
            spec.to_string(),
            "t.a <- cptable(~ tub + asia, values = c(5, 95, 1, 99), levels = c(\"yes\",\"no\"))"
        );
    }

    #[test]
    fn test_logical_table_text_has_no_values() {
        let spec = TableSpec {
            alias: "e.lt".into(),
            kind: TableKind::Or,
            formula: vec!["either".into(), "lung".into(), "tub".into()],
            values: None,
            levels: vec!["yes".into(), "no".into()],
        };
        assert_eq!(
            spec.to_string(),
            "e.lt <- ortable(~ either + lung + tub, levels = c(\"yes\",\"no\"))"
        );
    }

    #[test]
    fn test_evidence_text() {
        let snapshot = vec![
            ("asia".to_string(), "yes".to_string()),
            ("either".to_string(), "yes".to_string()),
        ];
        let cmd = AbsorbEvidence::from_snapshot("bn.asia", "bn.asia.temp.3", &snapshot);
        assert_eq!(
            cmd.to_string(),
            "bn.asia.temp.3 <- setEvidence(bn.asia, c(\"asia\",\"either\"), c(\"yes\",\"yes\"))"
        );
        let empty = AbsorbEvidence::from_snapshot("bn.asia", "tmp", &[]);
        assert_eq!(empty.to_string(), "tmp <- setEvidence(bn.asia, c(), c())");
    }

    #[test]
    fn test_query_texts() {
        let marginal = QueryMarginal {
            model: "tmp".into(),
            result: "res".into(),
            nodes: vec!["rain".into(), "sprinkler".into()],
        };
        assert_eq!(
            marginal.to_string(),
            "res <- querygrain(tmp, nodes=c(\"rain\",\"sprinkler\"), type=\"marginal\")"
        );
        let joint = QueryJoint {
            model: "tmp".into(),
            nodes: vec!["grasswet".into()],
        };
        assert_eq!(
            joint.to_string(),
            "querygrain(tmp, nodes=c(\"grasswet\"), type=\"joint\")"
        );
        assert_eq!(
            FetchMarginal {
                result: "res",
                node: "rain"
            }
            .to_string(),
            "res$rain"
        );
        assert_eq!(Release("res").to_string(), "rm(res)");
    }

    #[test]
    fn test_library_text() {
        let plain = ImportLibrary {
            name: "gRain".into(),
            lib_loc: None,
        };
        assert_eq!(plain.to_string(), "library(gRain)");
        let located = ImportLibrary {
            name: "gRbase".into(),
            lib_loc: Some("C:\\R\\library".into()),
        };
        assert_eq!(
            located.to_string(),
            "library(gRbase, lib.loc=\"C:/R/library\")"
        );
    }
}
