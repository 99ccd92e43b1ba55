// Services module - contains the approval workflow

pub mod approval_service;

pub use approval_service::{
    ApprovalError, ApprovalWorkflow, Proposal, ReapplyOutcome, Repositories, ReviewOutcome,
};
