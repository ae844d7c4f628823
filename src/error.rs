use crate::domain::Stage;

/// Error categories surfaced by a run.
///
/// The kind is assigned where the error originates and is never rewritten by
/// the orchestrator; it only adds the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Io,
    Schema,
    Type,
    MergeConflict,
    Computation,
    ExternalService,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config | ErrorKind::Io => 2,
            ErrorKind::Schema | ErrorKind::Type | ErrorKind::MergeConflict => 3,
            ErrorKind::Computation => 4,
            ErrorKind::ExternalService => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Config => "config error",
            ErrorKind::Io => "io error",
            ErrorKind::Schema => "schema error",
            ErrorKind::Type => "type error",
            ErrorKind::MergeConflict => "merge conflict",
            ErrorKind::Computation => "computation error",
            ErrorKind::ExternalService => "external service error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    stage: Option<Stage>,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage: None,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn merge_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MergeConflict, message)
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Computation, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Tag the error with the stage it surfaced in. The first tag sticks.
    pub fn at_stage(mut self, stage: Stage) -> Self {
        if self.stage.is_none() {
            self.stage = Some(stage);
        }
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "[{stage}] {}: {}", self.kind.label(), self.message),
            None => write!(f, "{}: {}", self.kind.label(), self.message),
        }
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("stage", &self.stage)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_and_kind() {
        let err = AppError::external("timed out").at_stage(Stage::Summarize);
        assert_eq!(err.to_string(), "[summarize] external service error: timed out");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn first_stage_tag_wins() {
        let err = AppError::schema("missing `date`")
            .at_stage(Stage::Ingest)
            .at_stage(Stage::Merge);
        assert_eq!(err.stage(), Some(Stage::Ingest));
        assert_eq!(err.kind(), ErrorKind::Schema);
    }
}
