use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const PREP_PREFIX: &str = "prep_";
const TECH_PREFIX: &str = "tech_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoundError {
    #[error("round identifier is empty")]
    Empty,

    #[error("unknown round: {0}")]
    Unknown(RoundId),
}

/// Server-assigned identifier of an interview round (e.g. `prep_oa`, `oa_mcq`).
///
/// Treated as opaque: the client only interprets it through [`RoundKind::classify`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    /// Create a round id from a server-provided string.
    ///
    /// # Errors
    ///
    /// Returns `RoundError::Empty` for blank identifiers.
    pub fn new(raw: impl Into<String>) -> Result<Self, RoundError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RoundError::Empty);
        }
        if trimmed.len() == raw.len() {
            return Ok(Self(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for preparation interstitials (`prep_*`).
    #[must_use]
    pub fn is_prep(&self) -> bool {
        self.0.starts_with(PREP_PREFIX)
    }
}

impl fmt::Debug for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoundId({})", self.0)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interactive round families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Mcq,
    Coding,
    TechnicalChat,
}

impl TaskKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TaskKind::Mcq => "mcq",
            TaskKind::Coding => "coding",
            TaskKind::TechnicalChat => "technical-chat",
        }
    }
}

/// How the client treats a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundKind {
    /// Resume analysis runs server-side; the client waits and then advances.
    Analysis,
    /// Timed preparation screen, advanced when the countdown expires.
    Prep,
    /// Interactive round that submits its own results.
    Task(TaskKind),
}

impl RoundKind {
    /// Classify a round by naming convention so new `prep_*` / `tech_*` rounds
    /// work without code changes.
    ///
    /// # Errors
    ///
    /// Returns `RoundError::Unknown` when the id matches no known family.
    pub fn classify(round: &RoundId) -> Result<Self, RoundError> {
        let raw = round.as_str();
        if round.is_prep() {
            return Ok(Self::Prep);
        }
        if raw.starts_with(TECH_PREFIX) {
            return Ok(Self::Task(TaskKind::TechnicalChat));
        }
        match raw {
            "resume_analysis" => Ok(Self::Analysis),
            "oa_mcq" => Ok(Self::Task(TaskKind::Mcq)),
            "oa_coding" => Ok(Self::Task(TaskKind::Coding)),
            _ => Err(RoundError::Unknown(round.clone())),
        }
    }
}

/// Copy shown on a preparation screen.
#[must_use]
pub fn prep_message(round: &RoundId) -> &'static str {
    match round.as_str() {
        "prep_oa" => "Online Assessment (MCQ) starting shortly.\nFocus on your core concepts.",
        "prep_coding" => {
            "Coding Challenge starting shortly.\nYou will be given one LeetCode-style problem."
        }
        "prep_tech_1" => {
            "Technical Round 1 (DSA) starting shortly.\nYou will be asked to explain your coding approach verbally."
        }
        "prep_tech_2" => {
            "Technical Round 2 (System Design) starting shortly.\nPrepare to discuss projects and architecture."
        }
        _ => "Get Ready",
    }
}
