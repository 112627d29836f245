//! Defines traits for link implementations

use async_trait::async_trait;
use amqp1_types::{
    definitions::{DeliveryNumber, DeliveryTag, Error, MessageFormat, ReceiverSettleMode, Role},
    messaging::{message::DecodeIntoMessage, DeliveryState},
    performatives::{Attach, Detach, Transfer},
};
use futures_util::Future;
use tokio::sync::mpsc;

use crate::{
    control::SessionControl,
    link::{delivery::Delivery, state::LinkState, LinkFrame},
    util::{AsByteIterator, IntoReader},
    Payload,
};

use super::{OutputHandle, Settlement};

#[async_trait]
pub(crate) trait LinkDetach {
    type DetachError: Send;

    async fn on_incoming_detach(&mut self, detach: Detach) -> Result<(), Self::DetachError>;

    async fn send_detach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        closed: bool,
        error: Option<Error>,
    ) -> Result<(), Self::DetachError>;
}

#[async_trait]
pub(crate) trait LinkAttach {
    /// Outcome of exchanging the local and remote Attach performatives.
    type AttachExchange: Send;
    type AttachError: Send;

    async fn on_incoming_attach(
        &mut self,
        attach: Attach,
    ) -> Result<Self::AttachExchange, Self::AttachError>;

    async fn send_attach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
        is_reattaching: bool,
    ) -> Result<(), Self::AttachError>;
}

pub(crate) trait Link: LinkAttach + LinkDetach {
    fn role() -> Role;
}

#[async_trait]
pub(crate) trait LinkExt: Link {
    type FlowState;
    type Unsettled;
    type Target;

    fn local_state(&self) -> &LinkState;

    fn name(&self) -> &str;

    fn output_handle(&self) -> &Option<OutputHandle>;

    fn output_handle_mut(&mut self) -> &mut Option<OutputHandle>;

    fn flow_state(&self) -> &Self::FlowState;

    fn unsettled(&self) -> &Self::Unsettled;

    fn rcv_settle_mode(&self) -> &ReceiverSettleMode;

    fn target(&self) -> &Option<Self::Target>;

    /// Sends the local Attach and waits for the remote peer's Attach in response.
    async fn exchange_attach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        reader: &mut mpsc::Receiver<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
        is_reattaching: bool,
    ) -> Result<Self::AttachExchange, Self::AttachError>;

    /// Reacts to a failed attach exchange, closing the link or the session as the error demands.
    async fn handle_attach_error(
        &mut self,
        attach_error: Self::AttachError,
        writer: &mpsc::Sender<LinkFrame>,
        reader: &mut mpsc::Receiver<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
    ) -> Self::AttachError;
}

#[async_trait]
pub(crate) trait SenderLink: Link + LinkExt {
    type TransferError: Send;

    /// Send message via transfer frame(s) and return whether the message is already settled
    async fn send_payload<Fut>(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        detached: Fut,
        payload: Payload,
        message_format: MessageFormat,
        settled: Option<bool>,
        state: Option<DeliveryState>,
        batchable: bool,
        max_frame_size: u32,
    ) -> Result<Settlement, Self::TransferError>
    where
        Fut: Future<Output = Option<LinkFrame>> + Send;
}

#[async_trait]
pub(crate) trait ReceiverLink: Link + LinkExt {
    type FlowError: Send;
    type TransferError: Send;
    type DispositionError: Send;

    /// Set and send flow state
    async fn send_flow(
        &self,
        writer: &mpsc::Sender<LinkFrame>,
        link_credit: Option<u32>,
        drain: Option<bool>,
        echo: bool,
    ) -> Result<(), Self::FlowError>;

    async fn on_incomplete_transfer(
        &mut self,
        delivery_tag: DeliveryTag,
        section_number: u32,
        section_offset: u64,
    );

    /// Updates the unsettled map entry for `delivery_tag` with the state carried
    /// inline on a Transfer frame, equivalent to receiving a Disposition for it
    /// immediately before the transfer.
    async fn on_transfer_state(
        &self,
        delivery_tag: &Option<DeliveryTag>,
        settled: Option<bool>,
        state: DeliveryState,
    ) -> Result<(), Self::DispositionError>;

    /// Handles a (possibly final) Transfer frame that carries a complete message.
    async fn on_complete_transfer<'a, T, P>(
        &'a mut self,
        transfer: Transfer,
        payload: P,
    ) -> Result<Delivery<T>, Self::TransferError>
    where
        T: DecodeIntoMessage + Send,
        for<'b> P: IntoReader + AsByteIterator<'b> + Send + 'a;

    async fn dispose(
        &self,
        writer: &mpsc::Sender<LinkFrame>,
        delivery_id: DeliveryNumber,
        delivery_tag: DeliveryTag,
        settled: Option<bool>,
        state: DeliveryState,
        batchable: bool,
        rcv_settle_mode: Option<ReceiverSettleMode>,
    ) -> Result<(), Self::DispositionError>;
}
