//! Translation of native termination codes into typed outcomes.

use std::fmt;
use std::os::raw::c_int;

use ipopt_bridge_sys::ApplicationReturnStatus;
use serde::Serialize;
use thiserror::Error;

/// Termination status reported by the native solver, one variant per documented code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SolveStatus {
    /// Terminated at a locally optimal point.
    SolveSucceeded,
    /// Terminated at a point satisfying the "acceptable" tolerances.
    SolvedToAcceptableLevel,
    /// Converged to a point of local infeasibility.
    InfeasibleProblemDetected,
    /// Search direction became too small.
    SearchDirectionBecomesTooSmall,
    /// Iterates appear to diverge.
    DivergingIterates,
    /// The intermediate callback asked to stop.
    UserRequestedStop,
    /// Feasible point found for a square problem.
    FeasiblePointFound,
    MaximumIterationsExceeded,
    RestorationFailed,
    ErrorInStepComputation,
    MaximumCpuTimeExceeded,
    MaximumWallTimeExceeded,
    NotEnoughDegreesOfFreedom,
    InvalidProblemDefinition,
    InvalidOption,
    /// A callback produced NaN or infinity.
    InvalidNumberDetected,
    UnrecoverableException,
    NonIpoptExceptionThrown,
    InsufficientMemory,
    /// Internal error, also used for codes this table does not know.
    InternalError,
}

/// Semantic class of a [`SolveStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Success,
    Acceptable,
    Infeasible,
    Stalled,
    Diverged,
    LimitExceeded,
    RestorationFailed,
    StepComputation,
    InvalidInput,
    InsufficientMemory,
    InternalFailure,
    UserStop,
}

impl From<ApplicationReturnStatus> for SolveStatus {
    fn from(status: ApplicationReturnStatus) -> Self {
        use ApplicationReturnStatus as R;
        match status {
            R::SolveSucceeded => SolveStatus::SolveSucceeded,
            R::SolvedToAcceptableLevel => SolveStatus::SolvedToAcceptableLevel,
            R::InfeasibleProblemDetected => SolveStatus::InfeasibleProblemDetected,
            R::SearchDirectionBecomesTooSmall => SolveStatus::SearchDirectionBecomesTooSmall,
            R::DivergingIterates => SolveStatus::DivergingIterates,
            R::UserRequestedStop => SolveStatus::UserRequestedStop,
            R::FeasiblePointFound => SolveStatus::FeasiblePointFound,
            R::MaximumIterationsExceeded => SolveStatus::MaximumIterationsExceeded,
            R::RestorationFailed => SolveStatus::RestorationFailed,
            R::ErrorInStepComputation => SolveStatus::ErrorInStepComputation,
            R::MaximumCpuTimeExceeded => SolveStatus::MaximumCpuTimeExceeded,
            R::MaximumWallTimeExceeded => SolveStatus::MaximumWallTimeExceeded,
            R::NotEnoughDegreesOfFreedom => SolveStatus::NotEnoughDegreesOfFreedom,
            R::InvalidProblemDefinition => SolveStatus::InvalidProblemDefinition,
            R::InvalidOption => SolveStatus::InvalidOption,
            R::InvalidNumberDetected => SolveStatus::InvalidNumberDetected,
            R::UnrecoverableException => SolveStatus::UnrecoverableException,
            R::NonIpoptExceptionThrown => SolveStatus::NonIpoptExceptionThrown,
            R::InsufficientMemory => SolveStatus::InsufficientMemory,
            R::InternalError => SolveStatus::InternalError,
        }
    }
}

impl SolveStatus {
    /// Translate a raw native return code. Unknown codes become [`SolveStatus::InternalError`].
    pub fn from_code(code: c_int) -> Self {
        ApplicationReturnStatus::from_raw(code)
            .map(SolveStatus::from)
            .unwrap_or(SolveStatus::InternalError)
    }

    /// Only a locally optimal termination counts as success.
    pub fn is_success(self) -> bool {
        self == SolveStatus::SolveSucceeded
    }

    pub fn outcome(self) -> Outcome {
        match self {
            SolveStatus::SolveSucceeded => Outcome::Success,
            SolveStatus::SolvedToAcceptableLevel | SolveStatus::FeasiblePointFound => {
                Outcome::Acceptable
            }
            SolveStatus::InfeasibleProblemDetected => Outcome::Infeasible,
            SolveStatus::SearchDirectionBecomesTooSmall => Outcome::Stalled,
            SolveStatus::DivergingIterates => Outcome::Diverged,
            SolveStatus::UserRequestedStop => Outcome::UserStop,
            SolveStatus::MaximumIterationsExceeded
            | SolveStatus::MaximumCpuTimeExceeded
            | SolveStatus::MaximumWallTimeExceeded => Outcome::LimitExceeded,
            SolveStatus::RestorationFailed => Outcome::RestorationFailed,
            SolveStatus::ErrorInStepComputation => Outcome::StepComputation,
            SolveStatus::NotEnoughDegreesOfFreedom
            | SolveStatus::InvalidProblemDefinition
            | SolveStatus::InvalidOption
            | SolveStatus::InvalidNumberDetected => Outcome::InvalidInput,
            SolveStatus::InsufficientMemory => Outcome::InsufficientMemory,
            SolveStatus::UnrecoverableException
            | SolveStatus::NonIpoptExceptionThrown
            | SolveStatus::InternalError => Outcome::InternalFailure,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SolveStatus::SolveSucceeded => "optimal solution found",
            SolveStatus::SolvedToAcceptableLevel => "solved to acceptable level",
            SolveStatus::InfeasibleProblemDetected => "converged to a point of local infeasibility",
            SolveStatus::SearchDirectionBecomesTooSmall => "search direction became too small",
            SolveStatus::DivergingIterates => "iterates diverging",
            SolveStatus::UserRequestedStop => "stopping optimization at user request",
            SolveStatus::FeasiblePointFound => "feasible point for square problem found",
            SolveStatus::MaximumIterationsExceeded => "maximum number of iterations exceeded",
            SolveStatus::RestorationFailed => "restoration phase failed",
            SolveStatus::ErrorInStepComputation => "error in step computation",
            SolveStatus::MaximumCpuTimeExceeded => "maximum CPU time exceeded",
            SolveStatus::MaximumWallTimeExceeded => "maximum wallclock time exceeded",
            SolveStatus::NotEnoughDegreesOfFreedom => "problem has too few degrees of freedom",
            SolveStatus::InvalidProblemDefinition => "problem definition is invalid",
            SolveStatus::InvalidOption => "invalid option",
            SolveStatus::InvalidNumberDetected => "invalid number in NLP function or derivative detected",
            SolveStatus::UnrecoverableException => "unrecoverable exception",
            SolveStatus::NonIpoptExceptionThrown => "unknown exception caught in the native solver",
            SolveStatus::InsufficientMemory => "not enough memory",
            SolveStatus::InternalError => "internal error in the native solver",
        }
    }

    /// `Ok(())` for success, otherwise a [`StatusError`] carrying `code`.
    pub fn into_result(self, code: c_int) -> Result<(), StatusError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(StatusError {
                status: self,
                code,
                description: self.description(),
            })
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A non-success termination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("solver terminated with {status:?} (code {code}): {description}")]
pub struct StatusError {
    pub status: SolveStatus,
    /// Raw code as returned by the native solver.
    pub code: c_int,
    pub description: &'static str,
}

impl StatusError {
    pub fn outcome(&self) -> Outcome {
        self.status.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_code_zero_succeeds() {
        for raw in ApplicationReturnStatus::ALL {
            let status = SolveStatus::from_code(raw.code());
            assert_eq!(status.is_success(), raw.code() == 0, "{status:?}");
            assert_eq!(status.into_result(raw.code()).is_ok(), raw.code() == 0);
        }
    }

    #[test]
    fn test_every_code_maps_to_distinct_status() {
        let mut seen = std::collections::HashSet::new();
        for raw in ApplicationReturnStatus::ALL {
            assert!(seen.insert(SolveStatus::from_code(raw.code())));
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_unknown_codes_are_internal_errors() {
        for code in [7, 42, -6, -14, -99, -200, c_int::MIN, c_int::MAX] {
            let status = SolveStatus::from_code(code);
            assert_eq!(status, SolveStatus::InternalError);
            assert_eq!(status.outcome(), Outcome::InternalFailure);

            let err = status.into_result(code).unwrap_err();
            assert_eq!(err.code, code);
        }
    }

    #[test]
    fn test_outcome_classes() {
        assert_eq!(SolveStatus::from_code(1).outcome(), Outcome::Acceptable);
        assert_eq!(SolveStatus::from_code(2).outcome(), Outcome::Infeasible);
        assert_eq!(SolveStatus::from_code(3).outcome(), Outcome::Stalled);
        assert_eq!(SolveStatus::from_code(4).outcome(), Outcome::Diverged);
        assert_eq!(SolveStatus::from_code(5).outcome(), Outcome::UserStop);
        assert_eq!(SolveStatus::from_code(-1).outcome(), Outcome::LimitExceeded);
        assert_eq!(SolveStatus::from_code(-5).outcome(), Outcome::LimitExceeded);
        assert_eq!(SolveStatus::from_code(-2).outcome(), Outcome::RestorationFailed);
        assert_eq!(SolveStatus::from_code(-3).outcome(), Outcome::StepComputation);
        assert_eq!(SolveStatus::from_code(-12).outcome(), Outcome::InvalidInput);
        assert_eq!(SolveStatus::from_code(-102).outcome(), Outcome::InsufficientMemory);
        assert_eq!(SolveStatus::from_code(-101).outcome(), Outcome::InternalFailure);
    }

    #[test]
    fn test_wall_time_is_not_cpu_time() {
        assert_eq!(SolveStatus::from_code(-5), SolveStatus::MaximumWallTimeExceeded);
        assert_eq!(SolveStatus::from_code(-4), SolveStatus::MaximumCpuTimeExceeded);
    }

    #[test]
    fn test_status_error_message() {
        let err = SolveStatus::from_code(-1).into_result(-1).unwrap_err();
        assert_eq!(err.outcome(), Outcome::LimitExceeded);
        let message = err.to_string();
        assert!(message.contains("MaximumIterationsExceeded"));
        assert!(message.contains("code -1"));
        assert!(message.contains("maximum number of iterations exceeded"));
    }
}
