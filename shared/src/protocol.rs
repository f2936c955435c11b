//! Application message catalog and its fixed-layout wire codec.
//!
//! Every frame on the wire is exactly [`FRAME_LEN`] bytes:
//!
//! ```text
//! [ 1 byte: MsgKind tag ][ payload laid out by the tag, zero-padded to MSG_APP_CAPACITY ]
//! ```
//!
//! Multi-byte integers and floats are little-endian. Bounded strings occupy a
//! fixed slot of `N` bytes: at most `N - 1` bytes of UTF-8 text followed by at
//! least one zero byte. Text is first cut at its first NUL character, since
//! the decoder stops reading there. Text still longer than the slot is cut at
//! the last character boundary that fits. Both cuts are silent.
//!
//! Payload sizes are checked against [`MSG_APP_CAPACITY`] at compile time, both
//! for the whole catalog and for each message type the first time it is
//! encoded, so an oversized message kind cannot be built.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use crate::error::CodecError;
use crate::{ConnectionHandle, Position};

/// Maximum application payload carried by a single frame.
pub const MSG_APP_CAPACITY: usize = 256;
/// Size of every encoded frame: kind tag plus padded payload.
pub const FRAME_LEN: usize = 1 + MSG_APP_CAPACITY;

pub const USER_NAME_CAPACITY: usize = 64;
pub const SKIN_CAPACITY: usize = 64;
/// Large enough for any textual IPv6 address plus terminator.
pub const IP_ADDRESS_CAPACITY: usize = 46;

pub type Frame = [u8; FRAME_LEN];
pub type UserName = BoundedStr<USER_NAME_CAPACITY>;
pub type SkinName = BoundedStr<SKIN_CAPACITY>;
pub type IpAddressText = BoundedStr<IP_ADDRESS_CAPACITY>;

/// Wire tag of every application message. Discriminants are part of the
/// protocol and must not be reordered.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    UserSetup = 0,
    UserCmdMove = 1,
    UserUpdate = 2,
    UserDisconnect = 3,
    Heartbeat = 4,
}

impl MsgKind {
    pub const ALL: [MsgKind; 5] = [
        MsgKind::UserSetup,
        MsgKind::UserCmdMove,
        MsgKind::UserUpdate,
        MsgKind::UserDisconnect,
        MsgKind::Heartbeat,
    ];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn payload_len(self) -> usize {
        match self {
            MsgKind::UserSetup => <UserSetup as AppMessage>::PAYLOAD_LEN,
            MsgKind::UserCmdMove => <MovementIntent as AppMessage>::PAYLOAD_LEN,
            MsgKind::UserUpdate => <UserUpdate as AppMessage>::PAYLOAD_LEN,
            MsgKind::UserDisconnect => <UserDisconnect as AppMessage>::PAYLOAD_LEN,
            MsgKind::Heartbeat => <Heartbeat as AppMessage>::PAYLOAD_LEN,
        }
    }

    /// Human readable name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            MsgKind::UserSetup => "MsgUserSetupFromServer",
            MsgKind::UserCmdMove => "MsgUserCmdMoveFromClient",
            MsgKind::UserUpdate => "MsgUserUpdateFromServer",
            MsgKind::UserDisconnect => "MsgUserDisconnectFromServer",
            MsgKind::Heartbeat => "MsgHeartbeatFromClient",
        }
    }
}

impl TryFrom<u8> for MsgKind {
    type Error = CodecError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        MsgKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.tag() == tag)
            .ok_or(CodecError::UnknownKind(tag))
    }
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const _: () = {
    let mut i = 0;
    while i < MsgKind::ALL.len() {
        assert!(
            MsgKind::ALL[i].payload_len() <= MSG_APP_CAPACITY,
            "message payload exceeds MSG_APP_CAPACITY"
        );
        i += 1;
    }
};

/// A message type with a fixed payload layout.
pub trait AppMessage: Sized {
    const KIND: MsgKind;
    const PAYLOAD_LEN: usize;

    /// Writes exactly `PAYLOAD_LEN` bytes.
    fn write_payload(&self, out: &mut &mut [u8]);

    /// Reads from a cursor holding at least `PAYLOAD_LEN` bytes.
    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError>;
}

struct CapacityCheck<M>(PhantomData<M>);

impl<M: AppMessage> CapacityCheck<M> {
    const FITS: () = assert!(
        M::PAYLOAD_LEN <= MSG_APP_CAPACITY,
        "message payload exceeds MSG_APP_CAPACITY"
    );
}

/// Encodes one message into the front of `buf`, returning the frame length.
///
/// The whole frame is rewritten, padding included, so `buf` may be reused.
pub fn encode_into<M: AppMessage>(message: &M, buf: &mut [u8]) -> Result<usize, CodecError> {
    #[allow(clippy::let_unit_value)]
    let () = CapacityCheck::<M>::FITS;

    if buf.len() < FRAME_LEN {
        return Err(CodecError::BufferTooSmall {
            needed: FRAME_LEN,
            available: buf.len(),
        });
    }

    let frame = &mut buf[..FRAME_LEN];
    frame.fill(0);
    frame[0] = M::KIND.tag();

    let mut payload: &mut [u8] = &mut frame[1..];
    let capacity = payload.len();
    message.write_payload(&mut payload);
    let written = capacity - payload.len();

    debug_assert_eq!(
        written,
        M::PAYLOAD_LEN,
        "{} payload writer disagrees with its declared length",
        M::KIND
    );
    if written != M::PAYLOAD_LEN {
        return Err(CodecError::PayloadLength {
            kind: M::KIND,
            written,
            declared: M::PAYLOAD_LEN,
        });
    }

    Ok(FRAME_LEN)
}

fn decode_payload<M: AppMessage>(payload: &[u8]) -> Result<M, CodecError> {
    if payload.len() < M::PAYLOAD_LEN {
        return Err(CodecError::Truncated {
            kind: M::KIND,
            needed: M::PAYLOAD_LEN,
            available: payload.len(),
        });
    }
    let mut cursor = &payload[..M::PAYLOAD_LEN];
    M::read_payload(&mut cursor)
}

/// UTF-8 text that fits a null-terminated slot of `N` bytes.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BoundedStr<const N: usize> {
    text: String,
}

impl<const N: usize> BoundedStr<N> {
    /// Longest text kept; one byte of the slot is always the terminator.
    pub const MAX_LEN: usize = N - 1;

    /// Copies `text` up to its first NUL, keeping at most `MAX_LEN` bytes and
    /// backing off to a character boundary when the limit falls inside a
    /// multi-byte character.
    pub fn new(text: &str) -> Self {
        let text = text.split('\0').next().unwrap_or_default();
        let mut end = text.len().min(Self::MAX_LEN);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: text[..end].to_owned(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn write(&self, out: &mut &mut [u8]) {
        let bytes = self.text.as_bytes();
        out.put_slice(bytes);
        out.put_bytes(0, N - bytes.len());
    }

    fn read(payload: &mut &[u8], field: &'static str) -> Result<Self, CodecError> {
        let slot = &payload[..N];
        let end = slot
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::Unterminated { field })?;
        let text = std::str::from_utf8(&slot[..end])
            .map_err(|_| CodecError::InvalidUtf8 { field })?
            .to_owned();
        payload.advance(N);
        Ok(Self { text })
    }
}

impl<const N: usize> fmt::Debug for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.text, f)
    }
}

impl<const N: usize> fmt::Display for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl<const N: usize> From<&str> for BoundedStr<N> {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl<const N: usize> PartialEq<&str> for BoundedStr<N> {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

fn read_bool(payload: &mut &[u8], field: &'static str) -> Result<bool, CodecError> {
    match payload.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(CodecError::InvalidEnum { field, value }),
    }
}

fn write_position(out: &mut &mut [u8], position: &Position) {
    out.put_f32_le(position.x);
    out.put_f32_le(position.y);
    out.put_f32_le(position.z);
}

fn read_position(payload: &mut &[u8]) -> Position {
    Position {
        x: payload.get_f32_le(),
        y: payload.get_f32_le(),
        z: payload.get_f32_le(),
    }
}

/// Introduces a player to a client: the recipient itself when
/// `is_current_client` is set, otherwise another participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSetup {
    pub connection: ConnectionHandle,
    pub is_current_client: bool,
    pub user_name: UserName,
    pub skin: SkinName,
    pub ip_address: IpAddressText,
}

impl UserSetup {
    pub fn new(
        connection: ConnectionHandle,
        is_current_client: bool,
        user_name: &str,
        skin: &str,
        ip_address: &str,
    ) -> Self {
        Self {
            connection,
            is_current_client,
            user_name: UserName::new(user_name),
            skin: SkinName::new(skin),
            ip_address: IpAddressText::new(ip_address),
        }
    }
}

impl AppMessage for UserSetup {
    const KIND: MsgKind = MsgKind::UserSetup;
    const PAYLOAD_LEN: usize = 4 + 1 + USER_NAME_CAPACITY + SKIN_CAPACITY + IP_ADDRESS_CAPACITY;

    fn write_payload(&self, out: &mut &mut [u8]) {
        out.put_u32_le(self.connection.0);
        out.put_u8(u8::from(self.is_current_client));
        self.user_name.write(out);
        self.skin.write(out);
        self.ip_address.write(out);
    }

    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            connection: ConnectionHandle(payload.get_u32_le()),
            is_current_client: read_bool(payload, "is_current_client")?,
            user_name: UserName::read(payload, "user_name")?,
            skin: SkinName::read(payload, "skin")?,
            ip_address: IpAddressText::read(payload, "ip_address")?,
        })
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalDirection {
    #[default]
    None = 0,
    Left = 1,
    Right = 2,
}

impl HorizontalDirection {
    /// Sign of the X displacement: left is negative.
    pub fn signum(self) -> f32 {
        match self {
            HorizontalDirection::None => 0.0,
            HorizontalDirection::Left => -1.0,
            HorizontalDirection::Right => 1.0,
        }
    }
}

impl TryFrom<u8> for HorizontalDirection {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(HorizontalDirection::None),
            1 => Ok(HorizontalDirection::Left),
            2 => Ok(HorizontalDirection::Right),
            value => Err(CodecError::InvalidEnum {
                field: "horizontal",
                value,
            }),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalDirection {
    #[default]
    None = 0,
    Up = 1,
    Down = 2,
}

impl VerticalDirection {
    /// Sign of the Y displacement: up is positive.
    pub fn signum(self) -> f32 {
        match self {
            VerticalDirection::None => 0.0,
            VerticalDirection::Up => 1.0,
            VerticalDirection::Down => -1.0,
        }
    }
}

impl TryFrom<u8> for VerticalDirection {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(VerticalDirection::None),
            1 => Ok(VerticalDirection::Up),
            2 => Ok(VerticalDirection::Down),
            value => Err(CodecError::InvalidEnum {
                field: "vertical",
                value,
            }),
        }
    }
}

/// A client's request to move, carried by `UserCmdMove` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MovementIntent {
    pub horizontal: HorizontalDirection,
    pub vertical: VerticalDirection,
}

impl MovementIntent {
    pub fn new(horizontal: HorizontalDirection, vertical: VerticalDirection) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    /// True when neither axis asks for movement. Such an intent is malformed.
    pub fn is_idle(&self) -> bool {
        self.horizontal == HorizontalDirection::None && self.vertical == VerticalDirection::None
    }

    /// (dx, dy) for one resolution step of size `step`.
    pub fn displacement(&self, step: f32) -> (f32, f32) {
        (
            self.horizontal.signum() * step,
            self.vertical.signum() * step,
        )
    }
}

impl AppMessage for MovementIntent {
    const KIND: MsgKind = MsgKind::UserCmdMove;
    const PAYLOAD_LEN: usize = 2;

    fn write_payload(&self, out: &mut &mut [u8]) {
        out.put_u8(self.horizontal as u8);
        out.put_u8(self.vertical as u8);
    }

    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            horizontal: HorizontalDirection::try_from(payload.get_u8())?,
            vertical: VerticalDirection::try_from(payload.get_u8())?,
        })
    }
}

/// Authoritative absolute position of a named player.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub user_name: UserName,
    pub position: Position,
}

impl UserUpdate {
    pub fn new(user_name: &str, position: Position) -> Self {
        Self {
            user_name: UserName::new(user_name),
            position,
        }
    }
}

impl AppMessage for UserUpdate {
    const KIND: MsgKind = MsgKind::UserUpdate;
    const PAYLOAD_LEN: usize = USER_NAME_CAPACITY + 3 * 4;

    fn write_payload(&self, out: &mut &mut [u8]) {
        self.user_name.write(out);
        write_position(out, &self.position);
    }

    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            user_name: UserName::read(payload, "user_name")?,
            position: read_position(payload),
        })
    }
}

/// A player left the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDisconnect {
    pub user_name: UserName,
}

impl UserDisconnect {
    pub fn new(user_name: &str) -> Self {
        Self {
            user_name: UserName::new(user_name),
        }
    }
}

impl AppMessage for UserDisconnect {
    const KIND: MsgKind = MsgKind::UserDisconnect;
    const PAYLOAD_LEN: usize = USER_NAME_CAPACITY;

    fn write_payload(&self, out: &mut &mut [u8]) {
        self.user_name.write(out);
    }

    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            user_name: UserName::read(payload, "user_name")?,
        })
    }
}

/// Keep-alive sent by idle clients so the server does not time them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub timestamp_ms: u64,
}

impl AppMessage for Heartbeat {
    const KIND: MsgKind = MsgKind::Heartbeat;
    const PAYLOAD_LEN: usize = 8;

    fn write_payload(&self, out: &mut &mut [u8]) {
        out.put_u64_le(self.timestamp_ms);
    }

    fn read_payload(payload: &mut &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            timestamp_ms: payload.get_u64_le(),
        })
    }
}

/// Any application message, one variant per [`MsgKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    UserSetup(UserSetup),
    UserCmdMove(MovementIntent),
    UserUpdate(UserUpdate),
    UserDisconnect(UserDisconnect),
    Heartbeat(Heartbeat),
}

impl Message {
    pub fn kind(&self) -> MsgKind {
        match self {
            Message::UserSetup(_) => MsgKind::UserSetup,
            Message::UserCmdMove(_) => MsgKind::UserCmdMove,
            Message::UserUpdate(_) => MsgKind::UserUpdate,
            Message::UserDisconnect(_) => MsgKind::UserDisconnect,
            Message::Heartbeat(_) => MsgKind::Heartbeat,
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        match self {
            Message::UserSetup(msg) => encode_into(msg, buf),
            Message::UserCmdMove(msg) => encode_into(msg, buf),
            Message::UserUpdate(msg) => encode_into(msg, buf),
            Message::UserDisconnect(msg) => encode_into(msg, buf),
            Message::Heartbeat(msg) => encode_into(msg, buf),
        }
    }

    pub fn encode(&self) -> Result<Frame, CodecError> {
        let mut frame = [0u8; FRAME_LEN];
        self.encode_into(&mut frame)?;
        Ok(frame)
    }

    /// Decodes a frame. Trailing bytes past the kind's payload are ignored, so
    /// both padded and unpadded frames are accepted.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (&tag, payload) = bytes.split_first().ok_or(CodecError::Empty)?;
        let message = match MsgKind::try_from(tag)? {
            MsgKind::UserSetup => Message::UserSetup(decode_payload(payload)?),
            MsgKind::UserCmdMove => Message::UserCmdMove(decode_payload(payload)?),
            MsgKind::UserUpdate => Message::UserUpdate(decode_payload(payload)?),
            MsgKind::UserDisconnect => Message::UserDisconnect(decode_payload(payload)?),
            MsgKind::Heartbeat => Message::Heartbeat(decode_payload(payload)?),
        };
        Ok(message)
    }
}

impl From<UserSetup> for Message {
    fn from(msg: UserSetup) -> Self {
        Message::UserSetup(msg)
    }
}

impl From<MovementIntent> for Message {
    fn from(msg: MovementIntent) -> Self {
        Message::UserCmdMove(msg)
    }
}

impl From<UserUpdate> for Message {
    fn from(msg: UserUpdate) -> Self {
        Message::UserUpdate(msg)
    }
}

impl From<UserDisconnect> for Message {
    fn from(msg: UserDisconnect) -> Self {
        Message::UserDisconnect(msg)
    }
}

impl From<Heartbeat> for Message {
    fn from(msg: Heartbeat) -> Self {
        Message::Heartbeat(msg)
    }
}
