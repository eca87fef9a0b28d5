use parking_lot::Mutex;

use super::{EngineValue, InferenceEngine, LocalSession, Marginals, Session};
use crate::{
    alias::{
        AbsorbEvidence, CompileModel, FetchMarginal, ImportLibrary, QueryJoint, QueryMarginal,
        Release, TableSpec,
    },
    error::BayesError,
};

/// [`InferenceEngine`] that renders every operation as gRain command text and evaluates it on
/// a single [`Session`].
///
/// The session sits behind a mutex, so commands from concurrent callers are evaluated one
/// at a time. A marginal query and the reads of its per-node results share one lock
/// acquisition.
#[derive(Debug)]
pub struct GrainEngine<S> {
    session: Mutex<S>,
}

impl GrainEngine<LocalSession> {
    /// Engine backed by the in-process interpreter.
    pub fn local() -> Self {
        GrainEngine::new(LocalSession::new())
    }
}

impl<S: Session> GrainEngine<S> {
    pub fn new(session: S) -> Self {
        GrainEngine {
            session: Mutex::new(session),
        }
    }

    pub fn into_inner(self) -> S {
        self.session.into_inner()
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with_session<R, F: FnOnce(&mut S) -> R>(&self, f: F) -> R {
        f(&mut *self.session.lock())
    }

    /// Evaluates raw command text.
    pub fn eval(&self, command: &str) -> Result<EngineValue, BayesError> {
        let mut session = self.session.lock();
        eval_on(&mut *session, command)
    }

    fn eval_unit(&self, command: &str) -> Result<(), BayesError> {
        self.eval(command).map(|_| ())
    }
}

fn eval_on<S: Session + ?Sized>(session: &mut S, command: &str) -> Result<EngineValue, BayesError> {
    tracing::trace!("eval: {}", command);
    session.eval(command)
}

impl<S: Session> InferenceEngine for GrainEngine<S> {
    fn import_library(&self, library: &ImportLibrary) -> Result<(), BayesError> {
        self.eval_unit(&library.to_string())
    }

    fn create_table(&self, table: &TableSpec) -> Result<(), BayesError> {
        self.eval_unit(&table.to_string())
    }

    fn compile_model(&self, model: &CompileModel) -> Result<(), BayesError> {
        self.eval_unit(&model.to_string())
    }

    fn absorb_evidence(&self, evidence: &AbsorbEvidence) -> Result<(), BayesError> {
        self.eval_unit(&evidence.to_string())
    }

    fn query_marginal(&self, query: &QueryMarginal) -> Result<Marginals, BayesError> {
        let mut session = self.session.lock();
        eval_on(&mut *session, &query.to_string())?;
        let mut marginals = Marginals::new();
        for node in &query.nodes {
            let fetch = FetchMarginal {
                result: &query.result,
                node,
            };
            if let Some(values) = eval_on(&mut *session, &fetch.to_string())?.into_numbers() {
                marginals.insert(node.clone(), values);
            }
        }
        Ok(marginals)
    }

    fn query_joint(&self, query: &QueryJoint) -> Result<Vec<f64>, BayesError> {
        self.eval(&query.to_string())?.into_numbers().ok_or_else(|| {
            BayesError::Engine(format!("joint query over {:?} returned NULL", query.nodes))
        })
    }

    fn release(&self, name: &str) -> Result<(), BayesError> {
        self.eval_unit(&Release(name).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use test_log::test;

    /// Answers commands from a script and remembers what it was asked.
    #[derive(Default)]
    struct ScriptedSession {
        replies: VecDeque<Result<EngineValue, BayesError>>,
        seen: Vec<String>,
    }

    impl Session for ScriptedSession {
        fn eval(&mut self, command: &str) -> Result<EngineValue, BayesError> {
            self.seen.push(command.to_string());
            self.replies.pop_front().unwrap_or(Ok(EngineValue::Null))
        }
    }

    #[test]
    fn test_query_marginal_skips_null_entries() {
        let session = ScriptedSession {
            replies: VecDeque::from(vec![
                Ok(EngineValue::Null),
                Ok(EngineValue::Numbers(vec![0.25, 0.75])),
                Ok(EngineValue::Null),
            ]),
            ..Default::default()
        };
        let engine = GrainEngine::new(session);
        let marginals = engine
            .query_marginal(&QueryMarginal {
                model: "tmp".into(),
                result: "res".into(),
                nodes: vec!["rain".into(), "grasswet".into()],
            })
            .unwrap();
        assert_eq!(marginals.get("rain"), Some(&vec![0.25, 0.75]));
        assert!(!marginals.contains_key("grasswet"));

        let seen = engine.into_inner().seen;
        assert_eq!(
            seen,
            vec![
                "res <- querygrain(tmp, nodes=c(\"rain\",\"grasswet\"), type=\"marginal\")",
                "res$rain",
                "res$grasswet",
            ]
        );
    }

    #[test]
    fn test_query_joint_null_is_engine_error() {
        let engine = GrainEngine::new(ScriptedSession::default());
        let err = engine
            .query_joint(&QueryJoint {
                model: "tmp".into(),
                nodes: vec!["rain".into()],
            })
            .unwrap_err();
        assert!(matches!(err, BayesError::Engine(_)));
    }

    #[test]
    fn test_session_errors_propagate() {
        let session = ScriptedSession {
            replies: VecDeque::from(vec![Err(BayesError::Engine("object 'x' not found".into()))]),
            ..Default::default()
        };
        let engine = GrainEngine::new(session);
        assert_eq!(
            engine.release("x"),
            Err(BayesError::Engine("object 'x' not found".into()))
        );
    }
}
