//! Controls for Connection, Session, and Link event loops
//!
//! These are the messages sent over the internal `tokio::sync::mpsc` channels that let a
//! `ConnectionHandle`/`SessionHandle`/link instance talk to its owning engine task without
//! blocking the engine's main select loop on a synchronous call.

use amqp1_types::definitions::{self, ErrorCondition};
use tokio::sync::{mpsc, oneshot};

#[cfg(feature = "transaction")]
use amqp1_types::{messaging::Accepted, transaction::{TransactionError, TransactionId}};

use crate::{
    connection::{engine::SessionId, AllocSessionError},
    endpoint::{InputHandle, OutputHandle},
    link::LinkRelay,
    session::{AllocLinkError, SessionIncomingItem},
};

#[cfg(feature = "transaction")]
use crate::transaction::AllocTxnIdError;

pub(crate) enum ConnectionControl {
    Open,
    Close(Option<definitions::Error>),
    AllocateSession {
        tx: mpsc::Sender<SessionIncomingItem>,
        responder: oneshot::Sender<Result<(u16, SessionId), AllocSessionError>>,
    },
    DeallocateSession(SessionId),
    GetMaxFrameSize(oneshot::Sender<u32>),
}

impl std::fmt::Debug for ConnectionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "ConnectionControl::Open"),
            Self::Close(_) => write!(f, "ConnectionControl::Close"),
            Self::AllocateSession { .. } => write!(f, "ConnectionControl::AllocateSession"),
            Self::DeallocateSession(_) => write!(f, "ConnectionControl::DeallocateSession"),
            Self::GetMaxFrameSize(_) => write!(f, "ConnectionControl::GetMaxFrameSize"),
        }
    }
}

pub(crate) enum SessionControl {
    End(Option<definitions::Error>),
    AllocateLink {
        link_name: String,
        link_relay: LinkRelay<()>,
        responder: oneshot::Sender<Result<OutputHandle, AllocLinkError>>,
    },
    AllocateIncomingLink {
        link_name: String,
        link_relay: LinkRelay<()>,
        input_handle: InputHandle,
        responder: oneshot::Sender<Result<OutputHandle, AllocLinkError>>,
    },
    DeallocateLink(OutputHandle),
    Disposition(amqp1_types::performatives::Disposition),
    CloseConnectionWithError((ErrorCondition, Option<String>)),
    GetMaxFrameSize(oneshot::Sender<u32>),

    #[cfg(feature = "transaction")]
    AllocateTransactionId {
        resp: oneshot::Sender<Result<TransactionId, AllocTxnIdError>>,
    },
    #[cfg(feature = "transaction")]
    CommitTransaction {
        txn_id: TransactionId,
        resp: oneshot::Sender<Result<Accepted, TransactionError>>,
    },
    #[cfg(feature = "transaction")]
    RollbackTransaction {
        txn_id: TransactionId,
        resp: oneshot::Sender<Result<Accepted, TransactionError>>,
    },
    #[cfg(feature = "transaction")]
    AbortTransaction(TransactionId),
}

impl std::fmt::Display for SessionControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::End(_) => "End",
            Self::AllocateLink { .. } => "AllocateLink",
            Self::AllocateIncomingLink { .. } => "AllocateIncomingLink",
            Self::DeallocateLink(_) => "DeallocateLink",
            Self::Disposition(_) => "Disposition",
            Self::CloseConnectionWithError(_) => "CloseConnectionWithError",
            Self::GetMaxFrameSize(_) => "GetMaxFrameSize",
            #[cfg(feature = "transaction")]
            Self::AllocateTransactionId { .. } => "AllocateTransactionId",
            #[cfg(feature = "transaction")]
            Self::CommitTransaction { .. } => "CommitTransaction",
            #[cfg(feature = "transaction")]
            Self::RollbackTransaction { .. } => "RollbackTransaction",
            #[cfg(feature = "transaction")]
            Self::AbortTransaction(_) => "AbortTransaction",
        };
        write!(f, "{}", name)
    }
}

pub(crate) enum LinkControl {}
