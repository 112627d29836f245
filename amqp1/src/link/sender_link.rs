use amqp1_types::definitions::MessageFormat;
use futures_util::Future;
use tokio::sync::oneshot;

use crate::endpoint::Settlement;
use crate::util::Consume;

use super::target_archetype::VerifyTargetArchetype;
use super::{*};

/// Approximate byte cost of everything in a `Transfer` frame besides the message payload: the
/// frame header, the performative's fixed fields, and the handle. Used only to decide where to
/// split a message across multiple transfers, so an underestimate just forces an extra split.
pub(crate) const TRANSFER_FRAME_OVERHEAD: usize = 64;

impl<T> SenderLink<T> {
    /// A non-empty remote `unsettled` map means the remote peer is attempting to resume a
    /// previous link. Resumption is not supported, so any such attempt fails the attach.
    async fn handle_unsettled_in_attach(
        &mut self,
        remote_unsettled: Option<BTreeMap<DeliveryTag, DeliveryState>>,
    ) -> Result<SenderAttachExchange, SenderAttachError> {
        let remote_is_empty = match remote_unsettled {
            Some(map) => map.is_empty(),
            None => true,
        };

        if remote_is_empty {
            Ok(SenderAttachExchange::Complete)
        } else {
            Err(SenderAttachError::IllegalState)
        }
    }

    async fn send_transfer_frame(
        &self,
        writer: &mpsc::Sender<LinkFrame>,
        performative: Transfer,
        payload: Payload,
    ) -> Result<(), LinkStateError> {
        let input_handle = self
            .input_handle
            .clone()
            .ok_or(LinkStateError::IllegalState)?;
        writer
            .send(LinkFrame::Transfer {
                input_handle,
                performative,
                payload,
            })
            .await
            .map_err(|_| LinkStateError::IllegalSessionState)
    }
}

#[async_trait]
impl<Tar> endpoint::SenderLink for SenderLink<Tar>
where
    Tar: Into<TargetArchetype>
        + TryFrom<TargetArchetype>
        + VerifyTargetArchetype
        + Clone
        + Send
        + Sync,
{
    type TransferError = LinkStateError;

    async fn send_payload<Fut>(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        mut detached: Fut,
        payload: Payload,
        message_format: MessageFormat,
        settled: Option<bool>,
        state: Option<DeliveryState>,
        batchable: bool,
        max_frame_size: u32,
    ) -> Result<Settlement, Self::TransferError>
    where
        Fut: Future<Output = Option<LinkFrame>> + Send,
    {
        if !matches!(self.local_state, LinkState::Attached) {
            return Err(LinkStateError::IllegalState);
        }

        tokio::select! {
            biased;

            frame = &mut detached => {
                return Err(match frame {
                    Some(LinkFrame::Detach(detach)) if detach.closed => LinkStateError::RemoteClosed,
                    Some(LinkFrame::Detach(_)) => LinkStateError::RemoteDetached,
                    _ => LinkStateError::IllegalSessionState,
                });
            }
            _ = self.flow_state.consume(1) => {}
        }

        let handle = self
            .output_handle
            .clone()
            .ok_or(LinkStateError::IllegalState)?
            .into();

        // `delivery_count` was just incremented by `consume(1)` above and is otherwise only
        // ever advanced once per delivery, so it doubles as a monotonic per-link delivery tag.
        let delivery_count = self.flow_state.as_ref().delivery_count().await;
        let delivery_tag = DeliveryTag::from(delivery_count.to_string().into_bytes());

        let settled =
            settled.unwrap_or_else(|| matches!(self.snd_settle_mode, SenderSettleMode::Settled));

        let max_payload_len = (max_frame_size as usize)
            .saturating_sub(TRANSFER_FRAME_OVERHEAD)
            .saturating_sub(delivery_tag.len())
            .max(1);

        if payload.len() <= max_payload_len {
            let transfer = Transfer {
                handle,
                // The session assigns delivery-id from its own next-outgoing-id counter.
                delivery_id: None,
                delivery_tag: Some(delivery_tag.clone()),
                message_format: Some(message_format),
                settled: Some(settled),
                more: false,
                rcv_settle_mode: None,
                state,
                resume: false,
                aborted: false,
                batchable,
            };
            self.send_transfer_frame(writer, transfer, payload.clone())
                .await?;
        } else {
            let mut offset = 0;
            while offset < payload.len() {
                let end = std::cmp::min(offset + max_payload_len, payload.len());
                let is_first = offset == 0;
                let more = end < payload.len();
                let chunk = payload.slice(offset..end);

                // Only the first transfer of a multi-frame delivery carries the delivery-tag
                // and message metadata; continuations repeat nothing but the payload.
                let transfer = Transfer {
                    handle: handle.clone(),
                    delivery_id: None,
                    delivery_tag: is_first.then(|| delivery_tag.clone()),
                    message_format: is_first.then_some(message_format),
                    settled: is_first.then_some(settled),
                    more,
                    rcv_settle_mode: None,
                    state: if is_first { state.clone() } else { None },
                    resume: false,
                    aborted: false,
                    batchable,
                };
                self.send_transfer_frame(writer, transfer, chunk).await?;

                offset = end;
            }
        }

        if settled {
            Ok(Settlement::Settled(delivery_tag))
        } else {
            let (tx, rx) = oneshot::channel();
            let unsettled = UnsettledMessage::new(payload, tx);
            {
                let mut guard = self.unsettled.write().await;
                guard
                    .get_or_insert(BTreeMap::new())
                    .insert(delivery_tag.clone(), unsettled);
            }
            Ok(Settlement::Unsettled {
                delivery_tag,
                outcome: rx,
            })
        }
    }
}

#[async_trait]
impl<T> endpoint::LinkAttach for SenderLink<T>
where
    T: Into<TargetArchetype>
        + TryFrom<TargetArchetype>
        + VerifyTargetArchetype
        + Clone
        + Send
        + Sync,
{
    type AttachExchange = SenderAttachExchange;
    type AttachError = SenderAttachError;

    async fn on_incoming_attach(
        &mut self,
        remote_attach: Attach,
    ) -> Result<Self::AttachExchange, Self::AttachError> {
        use self::source::VerifySource;

        match (&self.local_state, remote_attach.incomplete_unsettled) {
            (LinkState::AttachSent, false) => {
                self.local_state = LinkState::Attached;
            }
            (LinkState::IncompleteAttachSent, false) => {
                self.local_state = LinkState::IncompleteAttachExchanged;
            }
            (LinkState::Unattached, false) | (LinkState::Detached, false) => {
                self.local_state = LinkState::AttachReceived; // re-attaching
            }
            (LinkState::AttachSent, true) | (LinkState::IncompleteAttachSent, true) => {
                self.local_state = LinkState::IncompleteAttachExchanged;
            }
            (LinkState::Unattached, true) | (LinkState::Detached, true) => {
                self.local_state = LinkState::IncompleteAttachReceived; // re-attaching
            }
            _ => return Err(SenderAttachError::IllegalState),
        };

        self.input_handle = Some(InputHandle::from(remote_attach.handle));

        if self.snd_settle_mode != remote_attach.snd_settle_mode {
            return Err(SenderAttachError::SndSettleModeNotSupported);
        }

        if self.rcv_settle_mode != remote_attach.rcv_settle_mode {
            return Err(SenderAttachError::RcvSettleModeNotSupported);
        }

        // The sender is considered to hold the authoritative version of the source
        // properties, so a remote Source is only used for verification.
        let remote_source = remote_attach
            .source
            .ok_or(SenderAttachError::IncomingSourceIsNone)?;
        if let Some(local_source) = &self.source {
            local_source.verify_as_sender(&remote_source)?;
        }

        // The receiver is considered to hold the authoritative version of the target
        // properties, so the remote Target always replaces the local one.
        let remote_target = remote_attach
            .target
            .ok_or(SenderAttachError::IncomingTargetIsNone)?;
        let target = T::try_from(*remote_target)
            .map_err(|_| SenderAttachError::CoordinatorIsNotImplemented)?;
        self.target = Some(target);

        self.max_message_size =
            get_max_message_size(self.max_message_size, remote_attach.max_message_size);

        self.handle_unsettled_in_attach(remote_attach.unsettled)
            .await
    }

    async fn send_attach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
        is_reattaching: bool,
    ) -> Result<(), Self::AttachError> {
        self.send_attach_inner(writer, session, is_reattaching)
            .await?;
        Ok(())
    }
}

impl<T> endpoint::Link for SenderLink<T>
where
    T: Into<TargetArchetype>
        + TryFrom<TargetArchetype>
        + VerifyTargetArchetype
        + Clone
        + Send
        + Sync,
{
    fn role() -> Role {
        Role::Sender
    }
}

#[async_trait]
impl<T> endpoint::LinkExt for SenderLink<T>
where
    T: Into<TargetArchetype>
        + TryFrom<TargetArchetype>
        + VerifyTargetArchetype
        + Clone
        + Send
        + Sync,
{
    type FlowState = SenderFlowState;
    type Unsettled = ArcSenderUnsettledMap;
    type Target = T;

    fn local_state(&self) -> &LinkState {
        &self.local_state
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn output_handle(&self) -> &Option<OutputHandle> {
        &self.output_handle
    }

    fn output_handle_mut(&mut self) -> &mut Option<OutputHandle> {
        &mut self.output_handle
    }

    fn flow_state(&self) -> &Self::FlowState {
        &self.flow_state
    }

    fn unsettled(&self) -> &Self::Unsettled {
        &self.unsettled
    }

    fn rcv_settle_mode(&self) -> &ReceiverSettleMode {
        &self.rcv_settle_mode
    }

    fn target(&self) -> &Option<Self::Target> {
        &self.target
    }

    async fn exchange_attach(
        &mut self,
        writer: &mpsc::Sender<LinkFrame>,
        reader: &mut mpsc::Receiver<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
        is_reattaching: bool,
    ) -> Result<Self::AttachExchange, SenderAttachError> {
        // Send out local attach
        self.send_attach(writer, session, is_reattaching).await?;

        // Wait for remote attach
        let remote_attach = match reader
            .recv()
            .await
            .ok_or(SenderAttachError::IllegalSessionState)?
        {
            LinkFrame::Attach(attach) => attach,
            _ => return Err(SenderAttachError::NonAttachFrameReceived),
        };

        self.on_incoming_attach(remote_attach).await
    }

    async fn handle_attach_error(
        &mut self,
        attach_error: SenderAttachError,
        writer: &mpsc::Sender<LinkFrame>,
        reader: &mut mpsc::Receiver<LinkFrame>,
        session: &mpsc::Sender<SessionControl>,
    ) -> SenderAttachError {
        match attach_error {
            // Errors that indicate failed attachment
            SenderAttachError::IllegalSessionState
            | SenderAttachError::IllegalState
            | SenderAttachError::NonAttachFrameReceived
            | SenderAttachError::ExpectImmediateDetach
            | SenderAttachError::RemoteClosedWithError(_) => attach_error,

            SenderAttachError::DuplicatedLinkName => {
                let error = definitions::Error::new(
                    SessionError::HandleInUse,
                    "Link name is in use".to_string(),
                    None,
                );
                session
                    .send(SessionControl::End(Some(error)))
                    .await
                    .map(|_| attach_error)
                    .unwrap_or(SenderAttachError::IllegalSessionState)
            }

            SenderAttachError::SndSettleModeNotSupported
            | SenderAttachError::RcvSettleModeNotSupported
            | SenderAttachError::IncomingSourceIsNone
            | SenderAttachError::IncomingTargetIsNone => {
                // Just send detach immediately
                let err = self
                    .send_detach(writer, true, None)
                    .await
                    .map(|_| attach_error)
                    .unwrap_or(SenderAttachError::IllegalSessionState);
                recv_detach(self, reader, err).await
            }

            SenderAttachError::CoordinatorIsNotImplemented
            | SenderAttachError::TargetAddressIsNoneWhenDynamicIsTrue
            | SenderAttachError::SourceAddressIsSomeWhenDynamicIsTrue
            | SenderAttachError::DynamicNodePropertiesIsSomeWhenDynamicIsFalse => {
                match (&attach_error).try_into() {
                    Ok(error) => match self.send_detach(writer, true, Some(error)).await {
                        Ok(_) => recv_detach(self, reader, attach_error).await,
                        Err(_) => SenderAttachError::IllegalSessionState,
                    },
                    Err(_) => attach_error,
                }
            }
        }
    }
}

async fn recv_detach<T>(
    link: &mut SenderLink<T>,
    reader: &mut mpsc::Receiver<LinkFrame>,
    err: SenderAttachError,
) -> SenderAttachError
where
    T: Into<TargetArchetype>
        + TryFrom<TargetArchetype>
        + VerifyTargetArchetype
        + Clone
        + Send
        + Sync,
{
    match reader.recv().await {
        Some(LinkFrame::Detach(remote_detach)) => match link.on_incoming_detach(remote_detach).await {
            Ok(_) => err,
            Err(detach_error) => detach_error.try_into().unwrap_or(err),
        },
        Some(_) => SenderAttachError::NonAttachFrameReceived,
        None => SenderAttachError::IllegalSessionState,
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Notify;

    use super::*;
    use crate::link::state::LinkFlowStateInner;

    fn attached_sender_link(settle_mode: SenderSettleMode) -> SenderLink<Target> {
        let flow_state = Arc::new(LinkFlowState::sender(LinkFlowStateInner {
            initial_delivery_count: 0,
            delivery_count: 0,
            link_credit: 10,
            available: 0,
            drain: false,
            properties: None,
        }));
        let consumer = Consumer::new(Arc::new(Notify::new()), flow_state);

        Link {
            role: PhantomData,
            local_state: LinkState::Attached,
            name: "test-sender".to_string(),
            output_handle: Some(OutputHandle(0)),
            input_handle: Some(InputHandle(0)),
            snd_settle_mode: settle_mode,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: Some(Target::builder().address("q1").build()),
            max_message_size: 0,
            offered_capabilities: None,
            desired_capabilities: None,
            flow_state: consumer,
            unsettled: Arc::new(RwLock::new(None)),
        }
    }

    /// An oversized payload is split across multiple `Transfer` frames, each but the
    /// last carrying `more = true`, only the first carrying a delivery-tag, and the
    /// concatenated payloads reproducing the original bytes (§4.8).
    #[tokio::test]
    async fn send_payload_splits_oversized_message_into_multiple_transfers() {
        let mut link = attached_sender_link(SenderSettleMode::Settled);
        let (writer, mut reader) = mpsc::channel(16);

        let payload = Payload::from(vec![7u8; 100]);
        let max_frame_size = 64u32;

        let settlement = endpoint::SenderLink::send_payload(
            &mut link,
            &writer,
            futures_util::future::pending::<Option<LinkFrame>>(),
            payload,
            0,
            Some(true),
            None,
            false,
            max_frame_size,
        )
        .await
        .unwrap();
        drop(writer);

        let mut frames = Vec::new();
        while let Some(frame) = reader.recv().await {
            frames.push(frame);
        }
        assert!(frames.len() > 1, "expected the oversized payload to be split");

        let mut reassembled = Vec::new();
        let mut tags = Vec::new();
        let last = frames.len() - 1;
        for (i, frame) in frames.iter().enumerate() {
            match frame {
                LinkFrame::Transfer { performative, payload: chunk, .. } => {
                    reassembled.extend_from_slice(chunk);
                    if let Some(tag) = &performative.delivery_tag {
                        tags.push(tag.clone());
                    }
                    assert_eq!(performative.more, i != last);
                }
                other => panic!("expected a Transfer frame, got {:?}", other),
            }
        }
        assert_eq!(reassembled, vec![7u8; 100]);
        assert_eq!(tags.len(), 1, "only the first transfer should carry a delivery-tag");

        match settlement {
            Settlement::Settled(tag) => assert_eq!(tag, tags[0]),
            Settlement::Unsettled { .. } => panic!("expected an immediately settled outcome"),
        }
    }

    /// A payload that fits within one frame is sent as a single, non-`more` Transfer.
    #[tokio::test]
    async fn send_payload_keeps_small_message_in_one_transfer() {
        let mut link = attached_sender_link(SenderSettleMode::Settled);
        let (writer, mut reader) = mpsc::channel(16);

        endpoint::SenderLink::send_payload(
            &mut link,
            &writer,
            futures_util::future::pending::<Option<LinkFrame>>(),
            Payload::from(vec![1u8; 8]),
            0,
            Some(true),
            None,
            false,
            4096,
        )
        .await
        .unwrap();
        drop(writer);

        let frame = reader.recv().await.expect("one transfer expected");
        assert!(reader.recv().await.is_none());
        match frame {
            LinkFrame::Transfer { performative, .. } => {
                assert!(!performative.more);
                assert!(performative.delivery_tag.is_some());
            }
            other => panic!("expected a Transfer frame, got {:?}", other),
        }
    }
}
