use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddrV4;

use crate::status::{NetResult, Status};

/// Byte appended after the payload so the buffer is always text-safe to
/// inspect. One byte of capacity is reserved for it.
pub const TERMINATOR: u8 = 0;

/// Fixed-capacity framed buffer filled by receive calls. Holds at most
/// `C - 1` payload bytes; `payload[length]` is always [`TERMINATOR`].
/// Connectionless receives record the sender address alongside the bytes.
pub struct Packet<const C: usize = 2048> {
    payload: [u8; C],
    length: usize,
    sender: Option<SocketAddrV4>,
}

impl<const C: usize> Packet<C> {
    // a packet always reserves one byte of capacity for the terminator
    const CAPACITY_CHECK: () = assert!(C >= 1);

    /// The capacity must hold at least the terminator byte:
    ///
    /// ```compile_fail
    /// let packet: sockstack::Packet<0> = sockstack::Packet::new();
    /// ```
    pub fn new() -> Packet<C> {
        let () = Self::CAPACITY_CHECK;
        Packet {
            payload: [0; C],
            length: 0,
            sender: None,
        }
    }

    pub const fn capacity(&self) -> usize {
        C
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The valid payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.payload[..self.length]
    }

    /// Lossy UTF-8 view of the payload, for diagnostics.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }

    /// Who sent this datagram. `None` for connection-oriented receives.
    pub fn sender(&self) -> Option<SocketAddrV4> {
        self.sender
    }

    /// Fill the packet from caller bytes, e.g. before a send. Rejects
    /// payloads that would not leave room for the terminator.
    pub fn set_payload(&mut self, bytes: &[u8]) -> NetResult<()> {
        if bytes.len() > C - 1 {
            return Err(Status::PacketError);
        }
        self.payload[..bytes.len()].copy_from_slice(bytes);
        self.length = bytes.len();
        self.payload[self.length] = TERMINATOR;
        self.sender = None;
        Ok(())
    }

    pub fn terminated(&self) -> bool {
        self.payload[self.length] == TERMINATOR
    }

    /// Receive window handed to the OS. Capped one short of capacity so an
    /// oversized datagram truncates instead of claiming the terminator slot.
    pub(crate) fn writable(&mut self) -> &mut [u8] {
        &mut self.payload[..C - 1]
    }

    /// Receive-path fill: the OS wrote `length` bytes into [`writable`].
    pub(crate) fn commit(&mut self, length: usize, sender: Option<SocketAddrV4>) {
        debug_assert!(length <= C - 1);
        self.length = length;
        self.payload[self.length] = TERMINATOR;
        self.sender = sender;
    }
}

impl<const C: usize> Default for Packet<C> {
    fn default() -> Packet<C> {
        Packet::new()
    }
}

impl<const C: usize> fmt::Debug for Packet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.payload[..self.length.min(16)];
        f.debug_struct("Packet")
            .field("capacity", &C)
            .field("length", &self.length)
            .field("head", &head)
            .field("sender", &self.sender)
            .finish()
    }
}
