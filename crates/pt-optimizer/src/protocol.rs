//! Output contract of the external program.

use serde::{Deserialize, Serialize};

use pt_types::ProtocolError;

/// How runs of the external program are invoked and read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverProtocol {
    /// Marker of the line carrying the runtime, e.g.
    /// `c process-time: 1m 2s  62.00 seconds`. The runtime is the token
    /// before the trailing `seconds`.
    pub runtime_marker: String,
    /// Marker of a verified solution.
    pub success_marker: String,
    /// Marker the program prints when it refutes an instance.
    pub unsatisfiable_marker: String,
    /// Name of the program-side timeout flag, passed as `{flag}={seconds}`.
    pub timeout_flag: String,
}

impl Default for SolverProtocol {
    fn default() -> Self {
        Self {
            runtime_marker: "c process-time".to_string(),
            success_marker: "s SATISFIABLE".to_string(),
            unsatisfiable_marker: "s UNSATISFIABLE".to_string(),
            timeout_flag: "--time".to_string(),
        }
    }
}

/// What one run reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunReport {
    pub runtime: f64,
    pub solved: bool,
}

impl SolverProtocol {
    /// Parse a run's captured output.
    ///
    /// `instance` and `command` only feed error messages.
    pub fn parse(&self, output: &str, instance: &str, command: &str) -> Result<RunReport, ProtocolError> {
        let mut runtime = None;
        let mut solved = false;

        for line in output.lines() {
            if line.contains(&self.unsatisfiable_marker) {
                return Err(ProtocolError::UnexpectedUnsatisfiable {
                    instance: instance.to_string(),
                });
            }
            if line.contains(&self.success_marker) {
                solved = true;
            }
            if line.contains(&self.runtime_marker) {
                runtime = Some(Self::parse_runtime(line)?);
            }
        }

        let runtime = runtime.ok_or_else(|| ProtocolError::MissingRuntime {
            command: command.to_string(),
        })?;
        if !(runtime > 0.0) {
            return Err(ProtocolError::NonPositiveRuntime {
                runtime,
                command: command.to_string(),
            });
        }
        Ok(RunReport { runtime, solved })
    }

    fn parse_runtime(line: &str) -> Result<f64, ProtocolError> {
        let unparseable = || ProtocolError::UnparseableRuntime {
            line: line.to_string(),
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [.., value, "seconds"] => value.parse::<f64>().map_err(|_| unparseable()),
            _ => Err(unparseable()),
        }
    }

    /// The timeout argument for a limit in seconds (rounded up).
    pub fn timeout_arg(&self, limit: f64) -> String {
        format!("{}={}", self.timeout_flag, limit.ceil() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLVED: &str = "\
c ---- [ result ] ----
s SATISFIABLE
v 1 -2 3 0
c process-time:                            3.41 seconds
";

    fn parse(output: &str) -> Result<RunReport, ProtocolError> {
        SolverProtocol::default().parse(output, "a.cnf", "kissat a.cnf")
    }

    #[test]
    fn parses_solved_run() {
        let report = parse(SOLVED).unwrap();
        assert_eq!(report.runtime, 3.41);
        assert!(report.solved);
    }

    #[test]
    fn parses_unknown_result() {
        let report = parse("s UNKNOWN\nc process-time: 1m 40s 100.02 seconds\n").unwrap();
        assert!(!report.solved);
        assert_eq!(report.runtime, 100.02);
    }

    #[test]
    fn unsatisfiable_is_a_protocol_violation() {
        let err = parse("s UNSATISFIABLE\nc process-time: 1.0 seconds\n").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedUnsatisfiable {
                instance: "a.cnf".into()
            }
        );
    }

    #[test]
    fn missing_or_broken_runtime() {
        assert!(matches!(
            parse("s SATISFIABLE\n"),
            Err(ProtocolError::MissingRuntime { .. })
        ));
        assert!(matches!(
            parse("c process-time: fast seconds\n"),
            Err(ProtocolError::UnparseableRuntime { .. })
        ));
        assert!(matches!(
            parse("c process-time: 2.0 ms\n"),
            Err(ProtocolError::UnparseableRuntime { .. })
        ));
        assert!(matches!(
            parse("c process-time: 0.0 seconds\n"),
            Err(ProtocolError::NonPositiveRuntime { .. })
        ));
    }

    #[test]
    fn timeout_arg_rounds_up() {
        let protocol = SolverProtocol::default();
        assert_eq!(protocol.timeout_arg(55.2), "--time=56");
        assert_eq!(protocol.timeout_arg(5.0), "--time=5");
    }
}
