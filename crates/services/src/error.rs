//! Shared error types for the services crate.

use thiserror::Error;

use interview_core::model::RoundId;
use remote::RemoteError;

/// Errors reported by host capabilities (fullscreen, speech).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CapabilityError {
    #[error("{0} is not supported by this environment")]
    Unsupported(&'static str),
    #[error("{0} request was denied")]
    Denied(&'static str),
}

/// Errors emitted by `RoundController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("round {round} cannot be {action}")]
    WrongRoundKind {
        round: RoundId,
        action: &'static str,
    },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Errors emitted by `SessionDriver`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    #[error("unknown round: {0}")]
    UnknownRound(RoundId),
    #[error("controller is not ready")]
    NotReady,
    #[error("round event channel closed")]
    Interrupted,
    #[error(transparent)]
    Controller(#[from] ControllerError),
}
