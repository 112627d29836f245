//! Implements AMQP1.0 Link

mod frame;
use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use amqp1_types::{
    definitions::{
        self, AmqpError, DeliveryNumber, DeliveryTag, ReceiverSettleMode, Role, SenderSettleMode,
        SequenceNo, SessionError,
    },
    messaging::{DeliveryState, Source, Target, TargetArchetype},
    performatives::{Attach, Detach, Disposition, Transfer},
    primitives::Symbol,
};
pub(crate) use frame::*;
pub mod builder;
pub mod delivery;
mod error;
pub mod receiver;
mod receiver_link;
pub mod sender;
mod sender_link;

pub(crate) mod source;

pub(crate) mod state;

pub(crate) mod target_archetype;

pub use error::*;

pub use receiver::Receiver;
pub use sender::Sender;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, instrument, trace};

use crate::{
    control::SessionControl,
    endpoint::{self, InputHandle, LinkFlow, OutputHandle},
    link::delivery::UnsettledMessage,
    util::{AsDeliveryState, Consumer, Producer},
    Payload,
};

use self::state::{LinkFlowState, LinkState, UnsettledMap};

/// Default amount of link credit
pub const DEFAULT_CREDIT: SequenceNo = 200;

pub(crate) type SenderFlowState = Consumer<Arc<LinkFlowState<role::Sender>>>;
pub(crate) type ReceiverFlowState = Arc<LinkFlowState<role::Receiver>>;

/// Type alias for sender link that ONLY represents the inner state of a Sender
pub(crate) type SenderLink<T> = Link<role::Sender, T, SenderFlowState, UnsettledMessage>;

/// Type alias for receiver link that ONLY represents the inner state of receiver
pub(crate) type ReceiverLink<T> = Link<role::Receiver, T, ReceiverFlowState, Option<DeliveryState>>;

pub(crate) type ArcUnsettledMap<M> = Arc<RwLock<Option<UnsettledMap<M>>>>;
pub(crate) type ArcSenderUnsettledMap = ArcUnsettledMap<UnsettledMessage>;
pub(crate) type ArcReceiverUnsettledMap = ArcUnsettledMap<Option<DeliveryState>>;

// const CLOSED: u8 = 0b0000_0100;
// const DETACHED: u8 = 0b0000_0010;

pub mod role {
    //! Type state definition of link role

    use amqp1_types::definitions::Role;

    /// Type state for link::builder::Builder
    #[derive(Debug)]
    pub struct Sender {}

    /// Type state for link::builder::Builder
    #[derive(Debug)]
    pub struct Receiver {}

    // /// Type state for link::builder::Builder
    // #[cfg(feature = "transaction")]
    // #[derive(Debug)]
    // pub struct Controller {}

    pub(crate) trait IntoRole {
        fn into_role() -> Role;
    }

    impl IntoRole for Sender {
        fn into_role() -> Role {
            Role::Sender
        }
    }

    impl IntoRole for Receiver {
        fn into_role() -> Role {
            Role::Receiver
        }
    }

    // #[cfg(feature = "transaction")]
    // impl IntoRole for Controller {
    //     fn into_role() -> Role {
    //         Role::Sender
    //     }
    // }
}

/// Manages the link state
///
/// # Type Parameters
///
/// R: role
///
/// T: target
///
/// F: link flow state
///
/// M: unsettledMessage type
#[derive(Debug)]
pub struct Link<R, T, F, M> {
    pub(crate) role: PhantomData<R>,

    pub(crate) local_state: LinkState,
    // pub(crate) state_code: Arc<AtomicU8>,
    pub(crate) name: String,

    pub(crate) output_handle: Option<OutputHandle>, // local handle
    pub(crate) input_handle: Option<InputHandle>,   // remote handle

    /// The `Sender` will manage whether to wait for incoming disposition
    pub(crate) snd_settle_mode: SenderSettleMode,
    pub(crate) rcv_settle_mode: ReceiverSettleMode,

    pub(crate) source: Option<Source>, // TODO: Option?
    pub(crate) target: Option<T>,      // TODO: Option?

    /// If zero, the max size is not set.
    /// If zero, the attach frame should treated is None
    pub(crate) max_message_size: u64,

    // capabilities
    pub(crate) offered_capabilities: Option<Vec<Symbol>>,
    pub(crate) desired_capabilities: Option<Vec<Symbol>>,

    // See Section 2.6.7 Flow Control
    // pub(crate) delivery_count: SequenceNo, // TODO: the first value is the initial_delivery_count?
    // pub(crate) properties: Option<Fields>,
    // pub(crate) flow_state: Consumer<Arc<LinkFlowState>>,
    pub(crate) flow_state: F,
    pub(crate) unsettled: ArcUnsettledMap<M>,
}

impl<R, T, F, M> Link<R, T, F, M> {
    pub(crate) fn error_if_closed(&self) -> Result<(), definitions::Error>
    where
        R: role::IntoRole + Send + Sync,
    {
        match self.local_state {
            LinkState::Unattached
            | LinkState::AttachSent
            | LinkState::AttachReceived
            | LinkState::Attached
            | LinkState::DetachSent
            | LinkState::DetachReceived
            | LinkState::Detached
            | LinkState::CloseSent
            | LinkState::CloseReceived => Ok(()),
            LinkState::Closed => Err(definitions::Error::new(
                AmqpError::NotAllowed,
                "Link is permanently closed".to_string(),
                None,
            )),
        }
    }

    /// Builds and sends the local side of an Attach performative.
    ///
    /// `session` and `is_reattaching` are accepted to match the call sites in
    /// `receiver_link.rs`/`sender_link.rs`; re-attaching with resumption semantics is out of
    /// scope, so `is_reattaching` does not change the frame built here.
    pub(crate) async fn send_attach_inner<E>(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        _session: &mpsc::Sender<SessionControl>,
        _is_reattaching: bool,
    ) -> Result<(), E>
    where
        R: role::IntoRole + Send + Sync,
        T: Into<TargetArchetype> + Clone + Send,
        F: AsRef<LinkFlowState<R>> + Send + Sync,
        M: AsDeliveryState + Send + Sync,
        E: From<definitions::Error> + Send,
    {
        self.error_if_closed()?;

        let handle = match &self.output_handle {
            Some(h) => h.clone(),
            None => {
                return Err(definitions::Error::new(
                    AmqpError::InvalidField,
                    Some("Output handle is None".into()),
                    None,
                )
                .into())
            }
        };
        let unsettled: Option<BTreeMap<DeliveryTag, DeliveryState>> = {
            let guard = self.unsettled.read().await;
            guard.as_ref().and_then(|map| match map.is_empty() {
                true => None,
                false => Some(
                    map.iter()
                        .filter_map(|(key, val)| {
                            val.as_delivery_state()
                                .map(|state| (key.clone(), state.clone()))
                        })
                        .collect(),
                ),
            })
        };

        let max_message_size = match self.max_message_size {
            0 => None,
            val => Some(val),
        };
        let initial_delivery_count = Some(self.flow_state.as_ref().initial_delivery_count().await);
        let properties = self.flow_state.as_ref().properties().await;

        let attach = Attach {
            name: self.name.clone(),
            handle: handle.into(),
            role: R::into_role(),
            snd_settle_mode: self.snd_settle_mode.clone(),
            rcv_settle_mode: self.rcv_settle_mode.clone(),
            source: self.source.clone().map(Box::new),
            target: self.target.clone().map(Into::into).map(Box::new),
            unsettled,
            incomplete_unsettled: false,
            initial_delivery_count,
            max_message_size,
            offered_capabilities: self.offered_capabilities.clone().map(Into::into),
            desired_capabilities: self.desired_capabilities.clone().map(Into::into),
            properties,
        };
        let frame = LinkFrame::Attach(attach);

        match self.local_state {
            LinkState::Unattached | LinkState::Detached | LinkState::DetachSent => {
                writer.send(frame).await.map_err(|_| {
                    definitions::Error::new(AmqpError::IllegalState, None, None).into()
                })?;
                self.local_state = LinkState::AttachSent;
            }
            LinkState::AttachReceived => {
                writer.send(frame).await.map_err(|_| {
                    definitions::Error::new(AmqpError::IllegalState, None, None).into()
                })?;
                self.local_state = LinkState::Attached;
            }
            _ => {
                return Err(definitions::Error::new(AmqpError::IllegalState, None, None).into())
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<R, T, F, M> endpoint::LinkDetach for Link<R, T, F, M>
where
    R: role::IntoRole + Send + Sync,
    T: Send,
    F: Send + Sync,
    M: Send + Sync,
{
    type DetachError = error::DetachError;

    /// Closing or not isn't taken care of here but outside
    #[instrument(skip_all)]
    async fn on_incoming_detach(&mut self, detach: Detach) -> Result<(), Self::DetachError> {
        trace!(detach = ?detach);

        match detach.closed {
            true => match self.local_state {
                LinkState::Attached
                | LinkState::AttachSent
                | LinkState::AttachReceived
                | LinkState::DetachSent
                | LinkState::DetachReceived => self.local_state = LinkState::CloseReceived,
                LinkState::CloseSent => {
                    self.local_state = LinkState::Closed;
                    let _ = self.output_handle.take();
                }
                _ => return Err(Self::DetachError::IllegalState),
            },
            false => {
                match self.local_state {
                    LinkState::Attached => self.local_state = LinkState::DetachReceived,
                    LinkState::DetachSent => {
                        self.local_state = LinkState::Detached;
                        // Dropping output handle as it is already detached
                        let _ = self.output_handle.take();
                    }
                    _ => return Err(Self::DetachError::IllegalState),
                }
            }
        }

        if let Some(err) = detach.error {
            return Err(err.into());
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn send_detach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<(), Self::DetachError> {
        match self.local_state {
            LinkState::Attached => {
                self.local_state = LinkState::DetachSent;
            }
            LinkState::DetachReceived => {
                self.local_state = LinkState::Detached;
            }
            _ => return Err(Self::DetachError::IllegalState),
        }

        match self.output_handle.take() {
            Some(handle) => {
                let detach = Detach {
                    handle: handle.into(),
                    closed,
                    error,
                };

                debug!("Sending detach: {:?}", detach);

                writer
                    .send(LinkFrame::Detach(detach))
                    .await
                    .map_err(|_| Self::DetachError::IllegalSessionState)?;
            }
            None => return Err(Self::DetachError::IllegalState),
        }

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) enum LinkRelay<O> {
    Sender {
        tx: mpsc::Sender<LinkIncomingItem>,
        output_handle: O,
        // This should be wrapped inside a Producer because the SenderLink
        // needs to consume link credit from LinkFlowState
        flow_state: Producer<Arc<LinkFlowState<role::Sender>>>,
        unsettled: ArcSenderUnsettledMap,
        receiver_settle_mode: ReceiverSettleMode,
        // state_code: Arc<AtomicU8>,
    },
    Receiver {
        tx: mpsc::Sender<LinkIncomingItem>,
        output_handle: O,
        flow_state: ReceiverFlowState,
        unsettled: ArcReceiverUnsettledMap,
        receiver_settle_mode: ReceiverSettleMode,
        // state_code: Arc<AtomicU8>,
        more: bool,
    },
}

impl LinkRelay<()> {
    pub(crate) fn new_sender(
        tx: mpsc::Sender<LinkIncomingItem>,
        flow_state: Producer<Arc<LinkFlowState<role::Sender>>>,
        unsettled: ArcSenderUnsettledMap,
    ) -> Self {
        LinkRelay::Sender {
            tx,
            output_handle: (),
            flow_state,
            unsettled,
            receiver_settle_mode: ReceiverSettleMode::default(),
        }
    }

    pub(crate) fn new_receiver(
        tx: mpsc::Sender<LinkIncomingItem>,
        flow_state: ReceiverFlowState,
        unsettled: ArcReceiverUnsettledMap,
        receiver_settle_mode: ReceiverSettleMode,
    ) -> Self {
        LinkRelay::Receiver {
            tx,
            output_handle: (),
            flow_state,
            unsettled,
            receiver_settle_mode,
            more: false,
        }
    }

    pub fn with_output_handle(self, output_handle: OutputHandle) -> LinkRelay<OutputHandle> {
        match self {
            LinkRelay::Sender {
                tx,
                flow_state,
                unsettled,
                receiver_settle_mode,
                ..
            } => LinkRelay::Sender {
                tx,
                output_handle,
                flow_state,
                unsettled,
                receiver_settle_mode,
            },
            LinkRelay::Receiver {
                tx,
                flow_state,
                unsettled,
                receiver_settle_mode,
                more,
                ..
            } => LinkRelay::Receiver {
                tx,
                output_handle,
                flow_state,
                unsettled,
                receiver_settle_mode,
                more,
            },
        }
    }
}

impl LinkRelay<OutputHandle> {
    pub(crate) fn output_handle(&self) -> &OutputHandle {
        match self {
            Self::Sender { output_handle, .. } => output_handle,
            Self::Receiver { output_handle, .. } => output_handle,
        }
    }

    pub(crate) async fn send(
        &mut self,
        frame: LinkFrame,
    ) -> Result<(), mpsc::error::SendError<LinkFrame>> {
        match self {
            LinkRelay::Sender { tx, .. } => tx.send(frame).await,
            LinkRelay::Receiver { tx, .. } => tx.send(frame).await,
        }
    }

    pub(crate) async fn on_incoming_flow(&mut self, flow: LinkFlow) -> Option<LinkFlow> {
        match self {
            LinkRelay::Sender {
                flow_state,
                output_handle,
                ..
            } => {
                flow_state
                    .on_incoming_flow(flow, output_handle.clone())
                    .await
            }
            LinkRelay::Receiver {
                flow_state,
                output_handle,
                ..
            } => {
                flow_state
                    .on_incoming_flow(flow, output_handle.clone())
                    .await
            }
        }
    }

    /// Returns whether an echo is needed
    pub(crate) async fn on_incoming_disposition(
        &mut self,
        _role: Role, // Is a role check necessary?
        settled: bool,
        state: Option<DeliveryState>,
        // Disposition only contains the delivery ids, which are assigned by the
        // sessions
        delivery_tag: DeliveryTag,
    ) -> bool {
        match self {
            LinkRelay::Sender {
                unsettled,
                receiver_settle_mode,
                ..
            } => {
                // TODO: verfify role?
                let echo = if settled {
                    // TODO: Reply with disposition?
                    // Upon receiving the updated delivery state from the receiver, the sender will, if it has not already spontaneously
                    // attained a terminal state (e.g., through the expiry of the TTL at the sender), update its view of the state and
                    // communicate this back to the sending application.

                    // Since we are settling (ie. forgetting) this message, we don't care whether the
                    // receiving end is alive or not
                    let _result = remove_from_unsettled(unsettled, &delivery_tag)
                        .await
                        .map(|msg| msg.settle_with_state(state));
                    false
                } else {
                    let is_terminal = match &state {
                        Some(s) => s.is_terminal(),
                        None => false, // Probably should not assume the state is not specified
                    };
                    // Once the receiving application has finished processing the message,
                    // it indicates to the link endpoint a **terminal delivery state** that
                    // reflects the outcome of the application processing
                    if is_terminal {
                        let mut guard = unsettled.write().await;
                        let removed = guard
                            .as_mut()
                            .and_then(|map| map.remove(&delivery_tag));
                        drop(guard);
                        let _result = removed.map(|msg| msg.settle_with_state(state));
                    } else {
                        let mut guard = unsettled.write().await;
                        if let Some(msg) = guard.as_mut().and_then(|map| map.get_mut(&delivery_tag)) {
                            if let Some(state) = state {
                                *msg.state_mut() = state;
                            }
                        }
                    }
                    // If the receiver is in mode Second, it will send a non-settled terminal state
                    // to indicate end of processing
                    match receiver_settle_mode {
                        ReceiverSettleMode::First => {
                            // The receiver will spontaneously settle all incoming transfers.
                            false
                        }
                        ReceiverSettleMode::Second => {
                            // The receiver will only settle after sending the disposition to
                            // the sender and receiving a disposition indicating settlement of the
                            // delivery from the sender.

                            is_terminal
                        }
                    }
                };

                echo
            }
            LinkRelay::Receiver { unsettled, .. } => {
                if settled {
                    let _state = remove_from_unsettled(unsettled, &delivery_tag).await;
                } else {
                    let mut guard = unsettled.write().await;
                    if let Some(msg_state) = guard.as_mut().and_then(|map| map.get_mut(&delivery_tag)) {
                        if state.is_some() {
                            *msg_state = state;
                        }
                    }
                }

                // Only the sender needs to auto-reply to receiver's disposition, thus
                // `echo = false`
                false
            }
        }
    }

    /// LinkRelay operates in session's event loop
    pub(crate) async fn on_incoming_transfer(
        &mut self,
        transfer: Transfer,
        payload: Payload,
    ) -> Result<Option<(DeliveryNumber, DeliveryTag)>, (bool, definitions::Error)> {
        match self {
            LinkRelay::Sender { .. } => {
                // TODO: This should not happen, but should the link detach if this happens?
                Err((
                    true, // Closing the link
                    definitions::Error::new(
                        AmqpError::NotAllowed,
                        Some("Sender should never receive a transfer".to_string()),
                        None,
                    ),
                ))
            }
            LinkRelay::Receiver {
                tx,
                receiver_settle_mode,
                more,
                ..
            } => {
                let settled = transfer.settled.unwrap_or(false);
                let delivery_id = transfer.delivery_id;
                let delivery_tag = transfer.delivery_tag.clone();
                let transfer_more = transfer.more;

                tx.send(LinkFrame::Transfer {
                    input_handle: InputHandle::from(transfer.handle.clone()),
                    performative: transfer,
                    payload,
                })
                .await
                .map_err(|_| {
                    (
                        true,
                        definitions::Error::new(SessionError::UnattachedHandle, None, None),
                    )
                })?;

                if !settled {
                    if let ReceiverSettleMode::Second = receiver_settle_mode {
                        // The delivery-id MUST be supplied on the first transfer of a
                        // multi-transfer delivery.
                        // And self.more should be false upon the first transfer
                        if !(*more) {
                            // The same delivery ID should be used for a multi-transfer delivery
                            match (delivery_id, delivery_tag) {
                                (Some(id), Some(tag)) => return Ok(Some((id, tag))),
                                _ => {
                                    // This should be an error, but it will be handled by
                                    // the link instead of the session. So just return a None
                                    return Ok(None);
                                }
                            }
                        }
                        // The last transfer of multi-transfer delivery should have
                        // `more` set to false
                        *more = transfer_more;
                    }
                }
                Ok(None)
            }
        }
    }

    pub async fn on_incoming_detach(
        &mut self,
        detach: Detach,
    ) -> Result<(), mpsc::error::SendError<LinkFrame>> {
        match self {
            LinkRelay::Sender { tx, .. } => {
                // state_code.fetch_or(DETACHED, Ordering::Release);
                // if detach.closed {
                //     state_code.fetch_or(CLOSED, Ordering::Release);
                // }
                tx.send(LinkFrame::Detach(detach)).await?;
            }
            LinkRelay::Receiver { tx, .. } => {
                // state_code.fetch_or(DETACHED, Ordering::Release);
                // if detach.closed {
                //     state_code.fetch_or(CLOSED, Ordering::Release);
                // }
                tx.send(LinkFrame::Detach(detach)).await?;
            }
        }
        Ok(())
    }
}

pub(crate) async fn remove_from_unsettled<M>(
    unsettled: &RwLock<Option<UnsettledMap<M>>>,
    key: &DeliveryTag,
) -> Option<M> {
    let mut lock = unsettled.write().await;
    lock.as_mut().and_then(|map| map.remove(key))
}

pub(crate) fn get_max_message_size(local: u64, remote: Option<u64>) -> u64 {
    let remote_max_msg_size = remote.unwrap_or(0);
    match local {
        0 => remote_max_msg_size,
        val => {
            if remote_max_msg_size == 0 {
                val
            } else {
                u64::min(val, remote_max_msg_size)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::link::state::LinkFlowStateInner;

    #[tokio::test]
    async fn test_producer_notify() {
        use std::sync::Arc;
        use tokio::sync::Notify;

        use super::*;
        use crate::endpoint::OutputHandle;
        use crate::util::{Produce, Producer};

        let notifier = Arc::new(Notify::new());
        let state = LinkFlowState::sender(LinkFlowStateInner {
            initial_delivery_count: 0,
            delivery_count: 0,
            link_credit: 0,
            available: 0,
            drain: false,
            properties: None,
        });
        let mut producer = Producer::new(notifier.clone(), Arc::new(state));
        let notified = notifier.notified();

        let handle = tokio::spawn(async move {
            let item = (LinkFlow::default(), OutputHandle(0));
            producer.produce(item).await;
        });

        notified.await;
        println!("wait passed");

        handle.await.unwrap();
    }

    /// A disposition settling a delivery resolves that delivery's pending `send`
    /// future exactly once, and does not touch unrelated deliveries.
    #[tokio::test]
    async fn disposition_settles_matching_delivery_only() {
        use std::sync::Arc;
        use tokio::sync::{oneshot, Notify, RwLock};

        use amqp1_types::messaging::Accepted;

        use super::*;
        use crate::link::delivery::UnsettledMessage;
        use crate::util::Producer;

        let notifier = Arc::new(Notify::new());
        let flow_state = Arc::new(LinkFlowState::sender(LinkFlowStateInner {
            initial_delivery_count: 0,
            delivery_count: 0,
            link_credit: 1,
            available: 0,
            drain: false,
            properties: None,
        }));
        let producer = Producer::new(notifier, flow_state);

        let (tx, _rx) = mpsc::channel(1);
        let unsettled: ArcSenderUnsettledMap = Arc::new(RwLock::new(None));

        let (settled_tx, settled_rx) = oneshot::channel();
        let (other_tx, mut other_rx) = oneshot::channel();
        {
            let mut guard = unsettled.write().await;
            let map = guard.get_or_insert(BTreeMap::new());
            map.insert(
                DeliveryTag::from(b"1".to_vec()),
                UnsettledMessage::new(Payload::from(vec![]), settled_tx),
            );
            map.insert(
                DeliveryTag::from(b"2".to_vec()),
                UnsettledMessage::new(Payload::from(vec![]), other_tx),
            );
        }

        let mut relay =
            LinkRelay::new_sender(tx, producer, unsettled).with_output_handle(OutputHandle(0));
        let echo = relay
            .on_incoming_disposition(
                Role::Receiver,
                true,
                Some(DeliveryState::Accepted(Accepted {})),
                DeliveryTag::from(b"1".to_vec()),
            )
            .await;
        assert!(!echo);

        let outcome = settled_rx.await.expect("delivery 1 should be settled");
        assert!(matches!(outcome, Some(DeliveryState::Accepted(_))));

        // Delivery 2 must still be pending; its sender must not have fired.
        assert!(other_rx.try_recv().is_err());
        drop(other_rx);
    }
}
