// harvester-core/src/domain/pipeline/state.rs

use crate::domain::error::DomainError;
use serde::Serialize;
use std::fmt;

/// Lifecycle of one pipeline run.
///
/// Phases advance strictly in order. `Failed` is reachable from every active
/// phase and is absorbing, as is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting,
    Validating,
    Transforming,
    Loading,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Extracting | Self::Validating | Self::Transforming | Self::Loading
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn transition(self, to: PipelineState) -> Result<PipelineState, DomainError> {
        use PipelineState::*;
        let allowed = match (self, to) {
            (Idle, Extracting)
            | (Extracting, Validating)
            | (Validating, Transforming)
            | (Transforming, Loading)
            | (Loading, Completed) => true,
            (from, Failed) => from.is_active(),
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(DomainError::IllegalTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::Transforming => "transforming",
            Self::Loading => "loading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
