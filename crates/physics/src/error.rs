use compute::ComputeError;
use thiserror::Error;

use crate::types::{BodyId, JointId};

#[derive(Error, Debug)]
pub enum PhysicsError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyId),
    #[error("unknown joint {0:?}")]
    UnknownJoint(JointId),
    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),
    #[error("invalid joint: {0}")]
    InvalidJoint(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse configuration")]
    Config(#[from] serde_json::Error),
    #[error("compute backend error")]
    Compute(#[from] ComputeError),
}
