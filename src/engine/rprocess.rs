//! A [`Session`] backed by a child `R` process.

use std::{
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use super::{EngineValue, Session};
use crate::error::BayesError;

/// Drives `R --vanilla --slave` over its standard streams.
///
/// Every command is evaluated in the global environment inside `tryCatch`, and the outcome
/// comes back as exactly one marker line: `NUM <values>`, `NULL` or `ERR <message>`. Other
/// output (package start-up banners, warnings) is skipped.
#[derive(Debug)]
pub struct RProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl RProcess {
    pub fn spawn(binary: &str) -> Result<Self, BayesError> {
        let mut child = Command::new(binary)
            .args(["--vanilla", "--slave"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BayesError::Io("R stdin is not piped".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BayesError::Io("R stdout is not piped".to_string()))?;
        tracing::debug!("spawned R session (pid {})", child.id());
        Ok(RProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

fn escape(command: &str) -> String {
    command.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Wraps `command` so that R prints a single marker line describing the result.
pub(crate) fn wrap(command: &str) -> String {
    format!(
        concat!(
            ".bn.v <- tryCatch(eval(parse(text = \"{}\"), envir = globalenv()), ",
            "error = function(e) structure(conditionMessage(e), class = \"bn.error\")); ",
            "if (inherits(.bn.v, \"bn.error\")) cat(\"ERR\", gsub(\"\\n\", \" \", .bn.v), \"\\n\") ",
            "else if (is.numeric(.bn.v)) cat(\"NUM\", format(as.vector(.bn.v), digits = 17), \"\\n\") ",
            "else cat(\"NULL\\n\"); rm(.bn.v)\n"
        ),
        escape(command)
    )
}

/// Parses one line of R output. `None` means the line is not a marker line.
pub(crate) fn parse_reply(line: &str) -> Option<Result<EngineValue, BayesError>> {
    let line = line.trim();
    if line == "NULL" {
        return Some(Ok(EngineValue::Null));
    }
    if let Some(message) = line.strip_prefix("ERR") {
        return Some(Err(BayesError::Engine(message.trim().to_string())));
    }
    let numbers = line.strip_prefix("NUM")?;
    let parsed = numbers
        .split_whitespace()
        .map(|token| match token {
            "NA" | "NaN" => Ok(f64::NAN),
            _ => token.parse::<f64>(),
        })
        .collect::<Result<Vec<f64>, _>>()
        .map(EngineValue::Numbers)
        .map_err(|e| BayesError::Engine(format!("malformed numeric reply '{line}': {e}")));
    Some(parsed)
}

impl Session for RProcess {
    fn eval(&mut self, command: &str) -> Result<EngineValue, BayesError> {
        self.stdin.write_all(wrap(command).as_bytes())?;
        self.stdin.flush()?;
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(BayesError::Engine(
                    "R session closed its output".to_string(),
                ));
            }
            if let Some(reply) = parse_reply(&line) {
                return reply;
            }
            tracing::trace!("R: {}", line.trim_end());
        }
    }
}

impl Drop for RProcess {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"q(save = \"no\")\n");
        let _ = self.stdin.flush();
        if let Err(e) = self.child.wait() {
            tracing::debug!("R session did not exit cleanly: {}", e);
        }
    }
}
