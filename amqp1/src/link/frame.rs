use bytes::Bytes;
use amqp1_types::performatives::{Attach, Detach, Disposition, Flow, Transfer};

use crate::endpoint::InputHandle;

pub type LinkIncomingItem = LinkFrame;

#[derive(Debug)]
pub enum LinkFrame {
    Attach(Attach),
    Flow(Flow),
    Transfer {
        input_handle: InputHandle,
        performative: Transfer,
        payload: Bytes,
    },
    Disposition(Disposition),
    Detach(Detach),
}
