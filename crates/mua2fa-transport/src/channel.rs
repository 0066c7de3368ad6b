//! An in-process [`Connection`] backed by tokio channels.
//!
//! The server half ([`ChannelConnection`]) and the client half
//! ([`ChannelPeer`]) exchange encoded [`Frame`] bytes, so every payload is
//! pushed through the real wire encoding on each hop.
//!
//! ```text
//!                 outbound: Outbound (frame bytes / finish / disconnect)
//!  ChannelConnection ─────────────────────────────────────▶ ChannelPeer
//!        ▲                                                     │
//!        └──── shared inbound: InboundFrame (conn id + bytes) ◀┘
//! ```
//!
//! All peers of one server share a single inbound sender, tagged with the
//! connection id, so the server loop reads one queue.

use mua2fa_protocol::{Decode, Encode, Profile};
use tokio::sync::mpsc;

use crate::payload::{ClientboundPayload, Frame, ServerboundPayload};
use crate::{Connection, ConnectionId, DisconnectReason, TransportError};

enum Outbound {
    Payload(Vec<u8>),
    FinishTask,
    Disconnect(DisconnectReason),
}

/// Bytes a client sent, tagged with the connection they came from.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub connection: ConnectionId,
    pub bytes: Vec<u8>,
}

impl InboundFrame {
    pub fn decode(&self) -> Result<ServerboundPayload, TransportError> {
        ServerboundPayload::from_frame(&Frame::from_bytes(&self.bytes)?)
    }
}

/// What the client side observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Payload(ClientboundPayload),
    /// The server finished the configuration task; the player may join.
    TaskFinished,
    Disconnected(DisconnectReason),
}

/// Creates a connected pair for one player.
pub fn channel_pair(
    id: ConnectionId,
    profile: Profile,
    inbound: mpsc::UnboundedSender<InboundFrame>,
) -> (ChannelConnection, ChannelPeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = ChannelConnection {
        id,
        profile: profile.clone(),
        outbound: tx,
    };
    let peer = ChannelPeer {
        id,
        profile,
        outbound: rx,
        inbound,
    };
    (connection, peer)
}

// ---------------------------------------------------------------------------
// Server half
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelConnection {
    id: ConnectionId,
    profile: Profile,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ChannelConnection {
    fn push(&self, message: Outbound) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }
}

impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn profile(&self) -> &Profile {
        &self.profile
    }

    fn send(&self, payload: ClientboundPayload) -> Result<(), TransportError> {
        let bytes = payload.to_frame()?.to_bytes()?;
        tracing::debug!(conn = %self.id, id = payload.id(), len = bytes.len(), "sending payload");
        self.push(Outbound::Payload(bytes))
    }

    fn finish_task(&self) -> Result<(), TransportError> {
        self.push(Outbound::FinishTask)
    }

    fn disconnect(&self, reason: DisconnectReason) -> Result<(), TransportError> {
        self.push(Outbound::Disconnect(reason))
    }
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payload(bytes) => write!(f, "Payload({} bytes)", bytes.len()),
            Self::FinishTask => f.write_str("FinishTask"),
            Self::Disconnect(reason) => write!(f, "Disconnect({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client half
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChannelPeer {
    id: ConnectionId,
    profile: Profile,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<InboundFrame>,
}

impl ChannelPeer {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Sends a payload to the server.
    pub fn send(&self, payload: &ServerboundPayload) -> Result<(), TransportError> {
        let bytes = payload.to_frame()?.to_bytes()?;
        self.inbound
            .send(InboundFrame {
                connection: self.id,
                bytes,
            })
            .map_err(|_| TransportError::ConnectionClosed(self.id.to_string()))
    }

    /// Waits for the next event from the server.
    ///
    /// Returns `Ok(None)` once the server half has been dropped.
    pub async fn recv(&mut self) -> Result<Option<PeerEvent>, TransportError> {
        self.outbound.recv().await.map(into_event).transpose()
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<PeerEvent>, TransportError> {
        self.outbound.try_recv().ok().map(into_event).transpose()
    }
}

fn into_event(message: Outbound) -> Result<PeerEvent, TransportError> {
    match message {
        Outbound::Payload(bytes) => {
            let frame = Frame::from_bytes(&bytes)?;
            Ok(PeerEvent::Payload(ClientboundPayload::from_frame(&frame)?))
        }
        Outbound::FinishTask => Ok(PeerEvent::TaskFinished),
        Outbound::Disconnect(reason) => Ok(PeerEvent::Disconnected(reason)),
    }
}
