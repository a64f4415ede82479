//! Error types for the sealed-bid auction subsystem
//!
//! Every rejected operation maps to exactly one variant so callers can render
//! a specific message. Conditions that are part of the normal lifecycle
//! (result not yet available, forfeiture after timeout) are not errors.

use crate::domain::{Amount, AuctionId, BidderId, Phase, Timestamp};
use thiserror::Error;

/// Auction subsystem errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuctionError {
    /// Deadlines are inverted or not in the future
    #[error("Invalid timing: commit deadline {commit_deadline} must be after now ({now}) and before reveal deadline {reveal_deadline}")]
    InvalidTiming {
        commit_deadline: Timestamp,
        reveal_deadline: Timestamp,
        now: Timestamp,
    },

    /// Auction terms or metadata failed validation
    #[error("Invalid auction terms: {reason}")]
    InvalidTerms { reason: String },

    /// Unknown auction id
    #[error("Auction not found: {auction_id}")]
    AuctionNotFound { auction_id: AuctionId },

    /// Operation not allowed in the current phase or bond state
    #[error("{operation} not allowed in phase {phase}")]
    WrongPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// Bidder has no locked bond for this auction
    #[error("Bidder {bidder} has no locked bond")]
    NoBond { bidder: BidderId },

    /// Bidder already deposited a bond
    #[error("Bidder {bidder} already bonded")]
    AlreadyBonded { bidder: BidderId },

    /// Committed amount under the reserve price
    #[error("Bid {amount} below minimum {minimum}")]
    BelowMinimum { amount: Amount, minimum: Amount },

    /// Bidder already holds a valid or in-flight commitment
    #[error("Bidder {bidder} already committed")]
    DuplicateCommit { bidder: BidderId },

    /// Bidder is not entitled to the requested refund or claim
    #[error("Bidder {bidder} not eligible for {operation}")]
    NotEligible {
        bidder: BidderId,
        operation: &'static str,
    },

    /// Final payment does not equal clearing price minus bond
    #[error("Wrong final payment: expected {expected}, got {actual}")]
    WrongAmount { expected: Amount, actual: Amount },

    /// Proof verification rejected or failed
    #[error("Proof verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// Payment confirmation rejected or failed
    #[error("Payment confirmation failed: {reason}")]
    PaymentFailed { reason: String },
}

impl AuctionError {
    /// Stable machine-readable kind for presentation layers
    pub fn kind(&self) -> &'static str {
        match self {
            AuctionError::InvalidTiming { .. } => "InvalidTiming",
            AuctionError::InvalidTerms { .. } => "InvalidTerms",
            AuctionError::AuctionNotFound { .. } => "AuctionNotFound",
            AuctionError::WrongPhase { .. } => "WrongPhase",
            AuctionError::NoBond { .. } => "NoBond",
            AuctionError::AlreadyBonded { .. } => "AlreadyBonded",
            AuctionError::BelowMinimum { .. } => "BelowMinimum",
            AuctionError::DuplicateCommit { .. } => "DuplicateCommit",
            AuctionError::NotEligible { .. } => "NotEligible",
            AuctionError::WrongAmount { .. } => "WrongAmount",
            AuctionError::VerificationFailed { .. } => "VerificationFailed",
            AuctionError::PaymentFailed { .. } => "PaymentFailed",
        }
    }
}

/// Result type for auction operations
pub type AuctionResult<T> = Result<T, AuctionError>;
