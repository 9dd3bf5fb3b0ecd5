//! Error types for barrier_certificate

use thiserror::Error;

/// Main error type for the safety-filtered controller
#[derive(Debug, Error)]
pub enum RoboticsError {
    /// Pose sample with non-finite values or a non-unit quaternion
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    /// Lookahead offset makes the feedback-linearization map singular
    #[error("Singular mapping: lookahead offset d = {0} makes J = R(theta) diag(1, d) non-invertible")]
    SingularMapping(f64),
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// The CBF and box constraints admit no feasible virtual velocity
    #[error("Solver infeasible: {0}")]
    SolverInfeasible(String),
    /// Solve exceeded its time budget
    #[error("Solver timeout after {elapsed_us} us (budget {budget_us} us)")]
    SolverTimeout { elapsed_us: u64, budget_us: u64 },
    /// Numerical computation failed (matrix inversion, solver breakdown, etc.)
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Pose sample addressed to a robot that was not discovered at startup
    #[error("Unknown robot: {0}")]
    UnknownRobot(String),
    /// Discovery reported the same robot twice
    #[error("Duplicate robot: {0}")]
    DuplicateRobot(String),
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    /// Configuration could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
    /// Visualization error
    #[error("Visualization error: {0}")]
    VisualizationError(String),
}

impl RoboticsError {
    /// Errors local to one pose sample. The pipeline skips the cycle and
    /// waits for the next sample; everything else is fatal at startup.
    pub fn is_per_sample(&self) -> bool {
        matches!(
            self,
            RoboticsError::MalformedInput(_)
                | RoboticsError::SolverInfeasible(_)
                | RoboticsError::SolverTimeout { .. }
                | RoboticsError::NumericalError(_)
        )
    }
}

/// Result type alias for robotics operations
pub type RoboticsResult<T> = Result<T, RoboticsError>;
