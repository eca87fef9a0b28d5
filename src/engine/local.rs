//! In-process interpreter for the gRain command subset the crate emits.
//!
//! Models are compiled from their tables and queried exactly, by enumerating every
//! configuration of the variables not fixed by evidence. That is plenty for the small
//! networks this crate targets and keeps results deterministic.

use once_cell::sync::Lazy;
use petgraph::{algo::toposort, graph::DiGraph};
use regex::{Captures, Regex};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use super::{EngineValue, Marginals, Session};
use crate::{alias::TableKind, error::BayesError};

/// Upper bound on the configurations a single query may enumerate.
pub const MAX_CONFIGURATIONS: usize = 1 << 22;

const KNOWN_LIBRARIES: [&str; 2] = ["gRbase", "gRain"];

struct Grammar {
    library: Regex,
    table: Regex,
    compile: Regex,
    evidence: Regex,
    query: Regex,
    fetch: Regex,
    remove: Regex,
    symbol: Regex,
    quoted: Regex,
}

/// A symbol: a letter or dot, then letters, digits, `_` or `.`. Matches what
/// [`Node::new`](crate::network::Node::new) accepts as a name.
const NAME: &str = r"[\p{Alphabetic}.][\p{Alphabetic}\p{N}_.]*";

impl Grammar {
    fn create() -> Result<Self, regex::Error> {
        Ok(Grammar {
            library: Regex::new(r#"^library\(\s*(\w+)\s*(?:,\s*lib\.loc\s*=\s*"[^"]*"\s*)?\)$"#)?,
            table: Regex::new(&format!(
                r"^({NAME})\s*<-\s*(cptable|andtable|ortable)\(\s*~\s*([^,]+?)\s*(?:,\s*values\s*=\s*c\(([^)]*)\))?\s*,\s*levels\s*=\s*c\(([^)]*)\)\s*\)$"
            ))?,
            compile: Regex::new(&format!(
                r"^({NAME})\s*<-\s*grain\(\s*compileCPT\(\s*list\(([^)]*)\)\s*\)\s*\)$"
            ))?,
            evidence: Regex::new(&format!(
                r"^({NAME})\s*<-\s*setEvidence\(\s*({NAME})\s*,\s*c\(([^)]*)\)\s*,\s*c\(([^)]*)\)\s*\)$"
            ))?,
            query: Regex::new(&format!(
                r#"^(?:({NAME})\s*<-\s*)?querygrain\(\s*({NAME})\s*,\s*nodes\s*=\s*c\(([^)]*)\)\s*,\s*type\s*=\s*"(marginal|joint)"\s*\)$"#
            ))?,
            fetch: Regex::new(&format!(r"^({NAME})\$({NAME})$"))?,
            remove: Regex::new(&format!(r"^rm\(\s*({NAME})\s*\)$"))?,
            symbol: Regex::new(&format!(r"^({NAME})$"))?,
            quoted: Regex::new(r#""([^"]*)""#)?,
        })
    }

    fn quoted_list(&self, list: &str) -> Vec<String> {
        self.quoted
            .captures_iter(list)
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

static GRAMMAR: Lazy<Result<Grammar, regex::Error>> = Lazy::new(Grammar::create);

fn grammar() -> Result<&'static Grammar, BayesError> {
    GRAMMAR.as_ref().map_err(|e| BayesError::from(e.clone()))
}

fn engine_error<S: Into<String>>(msg: S) -> BayesError {
    BayesError::Engine(msg.into())
}

fn parse_numbers(list: &str) -> Result<Vec<f64>, BayesError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .map_err(|_| engine_error(format!("'{item}' is not numeric")))
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Table {
    kind: TableKind,
    /// The table's own variable first, then its parents.
    variables: Vec<String>,
    values: Option<Vec<f64>>,
    levels: Vec<String>,
}

impl Table {
    fn name(&self) -> &str {
        &self.variables[0]
    }

    /// Expands the table to one normalized block per parent configuration, the table's own
    /// variable varying fastest and then the parents in formula order.
    fn expand(&self, parent_levels: &[usize]) -> Result<Vec<f64>, BayesError> {
        let own = self.levels.len();
        let configurations: usize = parent_levels.iter().product();
        let size = own * configurations;
        match self.kind {
            TableKind::Conditional => {
                let given = self.values.as_deref().unwrap_or_default();
                let mut values: Vec<f64> = if given.is_empty() {
                    vec![1.0; size]
                } else if size % given.len() == 0 {
                    given.iter().cycle().take(size).copied().collect()
                } else {
                    return Err(engine_error(format!(
                        "table for '{}' has {} values, which does not fit {} configurations",
                        self.name(),
                        given.len(),
                        size
                    )));
                };
                for block in values.chunks_mut(own) {
                    let total: f64 = block.iter().sum();
                    if total <= 0.0 {
                        return Err(engine_error(format!(
                            "table for '{}' has a block summing to zero",
                            self.name()
                        )));
                    }
                    block.iter_mut().for_each(|v| *v /= total);
                }
                Ok(values)
            }
            TableKind::And | TableKind::Or => {
                if own != 2 {
                    return Err(engine_error(format!(
                        "logical table '{}' needs exactly two levels",
                        self.name()
                    )));
                }
                let mut values = Vec::with_capacity(size);
                for configuration in 0..configurations {
                    let mut rest = configuration;
                    let (mut all, mut any) = (true, false);
                    for levels in parent_levels {
                        let level = rest % levels;
                        rest /= levels;
                        all &= level == 0;
                        any |= level == 0;
                    }
                    let holds = match self.kind {
                        TableKind::And => all,
                        _ => any,
                    };
                    values.extend(if holds { [1.0, 0.0] } else { [0.0, 1.0] });
                }
                Ok(values)
            }
        }
    }
}

#[derive(Debug)]
struct Variable {
    name: String,
    levels: Vec<String>,
    /// Positions of the parents in the model, in formula order.
    parents: Vec<usize>,
    cpt: Vec<f64>,
}

/// A compiled model: variables in topological order plus the evidence absorbed so far.
#[derive(Debug, Clone)]
struct Model {
    variables: Arc<Vec<Variable>>,
    evidence: Vec<Option<usize>>,
}

impl Model {
    fn compile(tables: &[&Table]) -> Result<Model, BayesError> {
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (i, table) in tables.iter().enumerate() {
            if position.insert(table.name(), i).is_some() {
                return Err(engine_error(format!(
                    "variable '{}' has more than one table",
                    table.name()
                )));
            }
        }

        let mut graph = DiGraph::<usize, ()>::new();
        let indices: Vec<_> = (0..tables.len()).map(|i| graph.add_node(i)).collect();
        for (i, table) in tables.iter().enumerate() {
            for parent in &table.variables[1..] {
                let p = position.get(parent.as_str()).ok_or_else(|| {
                    engine_error(format!(
                        "variable '{parent}' in the formula of '{}' has no table",
                        table.name()
                    ))
                })?;
                graph.add_edge(indices[*p], indices[i], ());
            }
        }
        let order: Vec<usize> = toposort(&graph, None)
            .map_err(|cycle| {
                engine_error(format!(
                    "the model has a cycle through '{}'",
                    tables[graph[cycle.node_id()]].name()
                ))
            })?
            .into_iter()
            .map(|idx| graph[idx])
            .collect();

        let mut slot = vec![0; tables.len()];
        for (pos, table) in order.iter().enumerate() {
            slot[*table] = pos;
        }
        let variables = order
            .iter()
            .map(|&t| {
                let table = tables[t];
                let parents: Vec<usize> = table.variables[1..]
                    .iter()
                    .map(|p| position[p.as_str()])
                    .collect();
                let parent_levels: Vec<usize> =
                    parents.iter().map(|&p| tables[p].levels.len()).collect();
                Ok(Variable {
                    name: table.name().to_string(),
                    levels: table.levels.clone(),
                    parents: parents.into_iter().map(|p| slot[p]).collect(),
                    cpt: table.expand(&parent_levels)?,
                })
            })
            .collect::<Result<Vec<Variable>, BayesError>>()?;

        let evidence = vec![None; variables.len()];
        Ok(Model {
            variables: Arc::new(variables),
            evidence,
        })
    }

    fn variable(&self, name: &str) -> Result<usize, BayesError> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .ok_or_else(|| engine_error(format!("node '{name}' is not in the model")))
    }

    fn with_evidence(&self, nodes: &[String], levels: &[String]) -> Result<Model, BayesError> {
        if nodes.len() != levels.len() {
            return Err(engine_error(format!(
                "setEvidence got {} nodes but {} states",
                nodes.len(),
                levels.len()
            )));
        }
        let mut model = self.clone();
        for (node, level) in nodes.iter().zip(levels) {
            let v = model.variable(node)?;
            let index = model.variables[v]
                .levels
                .iter()
                .position(|l| l == level)
                .ok_or_else(|| engine_error(format!("'{level}' is not a state of '{node}'")))?;
            model.evidence[v] = Some(index);
        }
        if model.enumerate(|_, _| {})? <= 0.0 {
            return Err(engine_error("the evidence has zero probability"));
        }
        Ok(model)
    }

    fn weight(&self, state: &[usize]) -> f64 {
        self.variables
            .iter()
            .enumerate()
            .map(|(i, var)| {
                let mut index = state[i];
                let mut stride = var.levels.len();
                for &p in &var.parents {
                    index += state[p] * stride;
                    stride *= self.variables[p].levels.len();
                }
                var.cpt[index]
            })
            .product()
    }

    /// Visits every configuration consistent with the evidence that has non-zero weight and
    /// returns the total weight.
    fn enumerate<F>(&self, mut visit: F) -> Result<f64, BayesError>
    where
        F: FnMut(&[usize], f64),
    {
        let free: Vec<usize> = (0..self.variables.len())
            .filter(|&v| self.evidence[v].is_none())
            .collect();
        let configurations = free.iter().try_fold(1usize, |acc, &v| {
            acc.checked_mul(self.variables[v].levels.len())
                .filter(|n| *n <= MAX_CONFIGURATIONS)
        });
        if configurations.is_none() {
            return Err(engine_error(format!(
                "query would enumerate more than {MAX_CONFIGURATIONS} configurations"
            )));
        }

        let mut state: Vec<usize> = self.evidence.iter().map(|e| e.unwrap_or(0)).collect();
        let mut total = 0.0;
        loop {
            let weight = self.weight(&state);
            if weight > 0.0 {
                visit(&state, weight);
                total += weight;
            }
            let mut wrapped = true;
            for &v in &free {
                state[v] += 1;
                if state[v] < self.variables[v].levels.len() {
                    wrapped = false;
                    break;
                }
                state[v] = 0;
            }
            if wrapped {
                break;
            }
        }
        Ok(total)
    }

    /// Normalized marginals of the requested nodes that carry no evidence.
    fn marginals(&self, nodes: &[String]) -> Result<Marginals, BayesError> {
        let mut targets = Vec::new();
        for node in nodes {
            let v = self.variable(node)?;
            if self.evidence[v].is_none() {
                targets.push((node.clone(), v));
            }
        }
        let mut sums: Vec<Vec<f64>> = targets
            .iter()
            .map(|(_, v)| vec![0.0; self.variables[*v].levels.len()])
            .collect();
        let total = self.enumerate(|state, weight| {
            for (k, (_, v)) in targets.iter().enumerate() {
                sums[k][state[*v]] += weight;
            }
        })?;
        if total <= 0.0 {
            return Err(engine_error("the model has zero total probability"));
        }
        Ok(targets
            .into_iter()
            .zip(sums)
            .map(|((node, _), values)| (node, values.into_iter().map(|x| x / total).collect()))
            .collect())
    }

    /// Normalized joint distribution of `nodes`, the first node varying fastest.
    fn joint(&self, nodes: &[String]) -> Result<Vec<f64>, BayesError> {
        let vars = nodes
            .iter()
            .map(|node| self.variable(node))
            .collect::<Result<Vec<usize>, BayesError>>()?;
        let size: usize = vars
            .iter()
            .map(|&v| self.variables[v].levels.len())
            .product();
        let mut joint = vec![0.0; size];
        let total = self.enumerate(|state, weight| {
            let mut index = 0;
            let mut stride = 1;
            for &v in &vars {
                index += state[v] * stride;
                stride *= self.variables[v].levels.len();
            }
            joint[index] += weight;
        })?;
        if total <= 0.0 {
            return Err(engine_error("the model has zero total probability"));
        }
        Ok(joint.into_iter().map(|x| x / total).collect())
    }
}

#[derive(Debug, Clone)]
enum Object {
    Table(Table),
    Model(Model),
    Marginals(Marginals),
    Numbers(Vec<f64>),
}

/// A gRain session evaluated in-process.
#[derive(Debug, Default)]
pub struct LocalSession {
    libraries: BTreeSet<String>,
    objects: HashMap<String, Object>,
}

impl LocalSession {
    pub fn new() -> Self {
        LocalSession::default()
    }

    /// Names currently bound in the session, sorted.
    pub fn bindings(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    /// Drops every binding. Loaded libraries stay loaded.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    fn require_grain(&self, function: &str) -> Result<(), BayesError> {
        if self.libraries.contains("gRain") {
            Ok(())
        } else {
            Err(engine_error(format!("could not find function \"{function}\"")))
        }
    }

    fn object(&self, name: &str) -> Result<&Object, BayesError> {
        self.objects
            .get(name)
            .ok_or_else(|| engine_error(format!("object '{name}' not found")))
    }

    fn model(&self, name: &str) -> Result<&Model, BayesError> {
        match self.object(name)? {
            Object::Model(model) => Ok(model),
            _ => Err(engine_error(format!("'{name}' is not a grain object"))),
        }
    }

    fn library(&mut self, name: &str) -> Result<EngineValue, BayesError> {
        if !KNOWN_LIBRARIES.contains(&name) {
            return Err(engine_error(format!("there is no package called '{name}'")));
        }
        // gRain attaches gRbase as a dependency.
        if name == "gRain" {
            self.libraries.insert("gRbase".to_string());
        }
        self.libraries.insert(name.to_string());
        Ok(EngineValue::Null)
    }

    fn table(&mut self, grammar: &Grammar, caps: &Captures) -> Result<EngineValue, BayesError> {
        let kind = match &caps[2] {
            "andtable" => TableKind::And,
            "ortable" => TableKind::Or,
            _ => TableKind::Conditional,
        };
        self.require_grain(kind.function())?;
        let variables: Vec<String> = caps[3]
            .split('+')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if variables.is_empty() {
            return Err(engine_error("table formula names no variable"));
        }
        let levels = grammar.quoted_list(&caps[5]);
        if levels.is_empty() {
            return Err(engine_error(format!(
                "table for '{}' has no levels",
                variables[0]
            )));
        }
        let values = caps.get(4).map(|m| parse_numbers(m.as_str())).transpose()?;
        if let Some(values) = &values {
            if values.iter().any(|v| *v < 0.0 || !v.is_finite()) {
                return Err(engine_error(format!(
                    "table for '{}' has a negative or non-finite value",
                    variables[0]
                )));
            }
        }
        self.objects.insert(
            caps[1].to_string(),
            Object::Table(Table {
                kind,
                variables,
                values,
                levels,
            }),
        );
        Ok(EngineValue::Null)
    }

    fn compile(&mut self, caps: &Captures) -> Result<EngineValue, BayesError> {
        self.require_grain("compileCPT")?;
        let model = {
            let tables = caps[2]
                .split(',')
                .map(str::trim)
                .filter(|alias| !alias.is_empty())
                .map(|alias| match self.object(alias)? {
                    Object::Table(table) => Ok(table),
                    _ => Err(engine_error(format!("'{alias}' is not a cptable"))),
                })
                .collect::<Result<Vec<&Table>, BayesError>>()?;
            if tables.is_empty() {
                return Err(engine_error("compileCPT needs at least one table"));
            }
            Model::compile(&tables)?
        };
        self.objects
            .insert(caps[1].to_string(), Object::Model(model));
        Ok(EngineValue::Null)
    }

    fn evidence(&mut self, grammar: &Grammar, caps: &Captures) -> Result<EngineValue, BayesError> {
        self.require_grain("setEvidence")?;
        let nodes = grammar.quoted_list(&caps[3]);
        let levels = grammar.quoted_list(&caps[4]);
        let model = self.model(&caps[2])?.with_evidence(&nodes, &levels)?;
        self.objects
            .insert(caps[1].to_string(), Object::Model(model));
        Ok(EngineValue::Null)
    }

    fn query(&mut self, grammar: &Grammar, caps: &Captures) -> Result<EngineValue, BayesError> {
        self.require_grain("querygrain")?;
        let nodes = grammar.quoted_list(&caps[3]);
        let model = self.model(&caps[2])?;
        let (object, value) = match &caps[4] {
            "joint" => {
                let joint = model.joint(&nodes)?;
                (Object::Numbers(joint.clone()), EngineValue::Numbers(joint))
            }
            _ => (Object::Marginals(model.marginals(&nodes)?), EngineValue::Null),
        };
        if let Some(target) = caps.get(1) {
            self.objects.insert(target.as_str().to_string(), object);
        }
        Ok(value)
    }

    fn fetch(&self, caps: &Captures) -> Result<EngineValue, BayesError> {
        match self.object(&caps[1])? {
            Object::Marginals(marginals) => Ok(marginals
                .get(&caps[2])
                .map(|values| EngineValue::Numbers(values.clone()))
                .unwrap_or(EngineValue::Null)),
            _ => Err(engine_error(format!(
                "$ operator is invalid for '{}'",
                &caps[1]
            ))),
        }
    }

    fn symbol(&self, name: &str) -> Result<EngineValue, BayesError> {
        match self.object(name)? {
            Object::Numbers(values) => Ok(EngineValue::Numbers(values.clone())),
            _ => Ok(EngineValue::Null),
        }
    }
}

impl Session for LocalSession {
    fn eval(&mut self, command: &str) -> Result<EngineValue, BayesError> {
        let grammar = grammar()?;
        let command = command.trim();
        if let Some(caps) = grammar.library.captures(command) {
            self.library(&caps[1])
        } else if let Some(caps) = grammar.table.captures(command) {
            self.table(grammar, &caps)
        } else if let Some(caps) = grammar.compile.captures(command) {
            self.compile(&caps)
        } else if let Some(caps) = grammar.evidence.captures(command) {
            self.evidence(grammar, &caps)
        } else if let Some(caps) = grammar.query.captures(command) {
            self.query(grammar, &caps)
        } else if let Some(caps) = grammar.fetch.captures(command) {
            self.fetch(&caps)
        } else if let Some(caps) = grammar.remove.captures(command) {
            self.objects.remove(&caps[1]);
            Ok(EngineValue::Null)
        } else if let Some(caps) = grammar.symbol.captures(command) {
            self.symbol(&caps[1])
        } else {
            Err(engine_error(format!("unsupported command: {command}")))
        }
    }
}
