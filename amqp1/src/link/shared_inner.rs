use async_trait::async_trait;
use amqp1_types::definitions;
use tokio::sync::mpsc;

use crate::{
    control::SessionControl,
    endpoint::{self, LinkAttach, LinkDetach, LinkExt},
};

use super::{error::DetachError as LinkDetachError, LinkFrame, LinkRelay};

/// Common plumbing shared by [`super::sender::SenderInner`] and
/// [`super::receiver::ReceiverInner`]: the mpsc channels to the session and
/// the underlying [`Link`](endpoint::Link) state machine.
#[async_trait]
pub(crate) trait LinkEndpointInner {
    type Link: endpoint::LinkExt + Send + Sync;

    fn link(&self) -> &Self::Link;

    fn link_mut(&mut self) -> &mut Self::Link;

    fn reader_mut(&mut self) -> &mut mpsc::Receiver<LinkFrame>;

    fn buffer_size(&self) -> usize;

    fn as_new_link_relay(&self, tx: mpsc::Sender<LinkFrame>) -> LinkRelay<()>;

    fn session_control(&self) -> &mpsc::Sender<SessionControl>;

    async fn exchange_attach(
        &mut self,
        is_reattaching: bool,
    ) -> Result<<Self::Link as LinkAttach>::AttachExchange, <Self::Link as LinkAttach>::AttachError>;

    async fn handle_attach_error(
        &mut self,
        attach_error: <Self::Link as LinkAttach>::AttachError,
    ) -> <Self::Link as LinkAttach>::AttachError;

    async fn send_detach(
        &mut self,
        closed: bool,
        error: Option<definitions::Error>,
    ) -> Result<(), <Self::Link as LinkDetach>::DetachError>;
}

#[async_trait]
pub(crate) trait LinkEndpointInnerDetach: LinkEndpointInner {
    async fn close_with_error(
        &mut self,
        error: Option<definitions::Error>,
    ) -> Result<(), <Self::Link as LinkDetach>::DetachError>;

    async fn detach_with_error(
        &mut self,
        error: Option<definitions::Error>,
    ) -> Result<(), <Self::Link as LinkDetach>::DetachError>;
}

#[async_trait]
impl<T> LinkEndpointInnerDetach for T
where
    T: LinkEndpointInner + Send + Sync,
    <T::Link as LinkDetach>::DetachError: From<LinkDetachError>,
{
    async fn close_with_error(
        &mut self,
        error: Option<definitions::Error>,
    ) -> Result<(), <Self::Link as LinkDetach>::DetachError> {
        self.send_detach(true, error).await?;
        let detach = recv_remote_detach(self).await?;
        self.link_mut().on_incoming_detach(detach).await?;
        Ok(())
    }

    async fn detach_with_error(
        &mut self,
        error: Option<definitions::Error>,
    ) -> Result<(), <Self::Link as LinkDetach>::DetachError> {
        self.send_detach(false, error).await?;
        let detach = recv_remote_detach(self).await?;
        let closed = detach.closed;
        self.link_mut().on_incoming_detach(detach).await?;
        if closed {
            Err(LinkDetachError::ClosedByRemote.into())
        } else {
            Ok(())
        }
    }
}

/// Waits for the remote peer's Detach performative, skipping any other frame that may still
/// be in flight on the link's incoming channel.
pub(crate) async fn recv_remote_detach<T>(
    inner: &mut T,
) -> Result<definitions::Detach, <T::Link as LinkDetach>::DetachError>
where
    T: LinkEndpointInner + Send + Sync,
    <T::Link as LinkDetach>::DetachError: From<LinkDetachError>,
{
    loop {
        match inner.reader_mut().recv().await {
            Some(LinkFrame::Detach(detach)) => return Ok(detach),
            Some(_) => continue,
            None => return Err(LinkDetachError::IllegalSessionState.into()),
        }
    }
}
