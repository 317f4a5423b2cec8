//! MT primitive types and parameter schema.
//!
//! Every command parameter is a value implementing [`Wire`]: it knows how to
//! append itself to an output buffer and how to consume itself off the front
//! of an input slice. Composite types (structs, tagged sums, length-prefixed
//! sequences) are built out of these primitives the same way the coprocessor
//! firmware's own parameter tables are: an ordered list of typed fields.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use thiserror::Error;

/// Errors raised while encoding or decoding a single parameter value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("not enough bytes: need {need}, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("{0} value out of range for its wire width")]
    OutOfRange(&'static str),

    #[error("invalid tag byte 0x{0:02x} for {1}")]
    InvalidTag(u8, &'static str),

    #[error("{0} bytes remained unconsumed after decoding a fixed record")]
    TrailingData(usize),
}

/// A value that can be serialized onto and deserialized off of an MT frame
/// payload, in the declared order of its owning command's schema.
pub trait Wire: Sized {
    fn write(&self, out: &mut Vec<u8>);
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError>;
}

fn take(input: &[u8], n: usize) -> Result<(&[u8], &[u8]), TypeError> {
    if input.len() < n {
        return Err(TypeError::Truncated {
            need: n,
            have: input.len(),
        });
    }
    Ok((&input[..n], &input[n..]))
}

impl Wire for u8 {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 1)?;
        Ok((head[0], rest))
    }
}

impl Wire for u16 {
    fn write(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, *self);
        out.extend_from_slice(&buf);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 2)?;
        Ok((LittleEndian::read_u16(head), rest))
    }
}

impl Wire for u32 {
    fn write(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        LittleEndian::write_u32(&mut buf, *self);
        out.extend_from_slice(&buf);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 4)?;
        Ok((LittleEndian::read_u32(head), rest))
    }
}

impl Wire for bool {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(if *self { 1 } else { 0 });
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 1)?;
        Ok((head[0] != 0, rest))
    }
}

/// 8-byte little-endian IEEE extended unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Eui64(pub [u8; 8]);

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Wire for Eui64 {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(head);
        Ok((Eui64(buf), rest))
    }
}

/// 16-bit network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Nwk(pub u16);

impl Wire for Nwk {
    fn write(&self, out: &mut Vec<u8>) {
        self.0.write(out);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (v, rest) = u16::read(input)?;
        Ok((Nwk(v), rest))
    }
}

/// Extended PAN id: an 8-byte little-endian identifier, wire-identical to
/// [`Eui64`] but naming the network-level rather than device-level concept.
pub type ExtendedPanId = Eui64;

/// 16-bit PAN identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PanId(pub u16);

impl Wire for PanId {
    fn write(&self, out: &mut Vec<u8>) {
        self.0.write(out);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (v, rest) = u16::read(input)?;
        Ok((PanId(v), rest))
    }
}

/// 32-bit channel mask, bit `k` set means channel `k` is in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Channels(pub u32);

impl Channels {
    pub const EMPTY: Channels = Channels(0);
    /// Alias for `EMPTY` matching the coprocessor-side name used when
    /// disabling the secondary channel set (`update_network`'s
    /// `BDBSetChannel(Primary=false, NO_CHANNELS)` step).
    pub const NO_CHANNELS: Channels = Channels(0);

    pub fn from_channel_list(channels: &[u8]) -> Self {
        let mut mask = 0u32;
        for &ch in channels {
            mask |= 1 << ch;
        }
        Channels(mask)
    }

    pub fn contains(&self, channel: u8) -> bool {
        channel < 32 && (self.0 & (1 << channel)) != 0
    }

    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..32).filter(move |&c| self.contains(c))
    }
}

impl Wire for Channels {
    fn write(&self, out: &mut Vec<u8>) {
        self.0.write(out);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (v, rest) = u32::read(input)?;
        Ok((Channels(v), rest))
    }
}

/// 16-byte network key material. Opaque to the driver; never logged.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct KeyData(pub [u8; 16]);

impl fmt::Debug for KeyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyData(..)")
    }
}

impl Wire for KeyData {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (head, rest) = take(input, 16)?;
        let mut buf = [0u8; 16];
        buf.copy_from_slice(head);
        Ok((KeyData(buf), rest))
    }
}

/// One-byte length prefix followed by that many bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortBytes(pub Vec<u8>);

impl From<Vec<u8>> for ShortBytes {
    fn from(v: Vec<u8>) -> Self {
        ShortBytes(v)
    }
}

impl Wire for ShortBytes {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.0.len() as u8);
        out.extend_from_slice(&self.0);
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (len, rest) = u8::read(input)?;
        let (data, rest) = take(rest, len as usize)?;
        Ok((ShortBytes(data.to_vec()), rest))
    }
}

/// One-byte count prefix followed by that many serialized `T`s.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LvList<T>(pub Vec<T>);

impl<T> From<Vec<T>> for LvList<T> {
    fn from(v: Vec<T>) -> Self {
        LvList(v)
    }
}

impl<T: Wire> Wire for LvList<T> {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.0.len() as u8);
        for item in &self.0 {
            item.write(out);
        }
    }
    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (count, mut rest) = u8::read(input)?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (item, next) = T::read(rest)?;
            items.push(item);
            rest = next;
        }
        Ok((LvList(items), rest))
    }
}

/// Addressing mode tag for [`AddrModeAddress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
    NotPresent,
    Group,
    Nwk,
    Ieee,
    Broadcast,
}

impl AddrMode {
    fn to_byte(self) -> u8 {
        match self {
            AddrMode::NotPresent => 0,
            AddrMode::Group => 1,
            AddrMode::Nwk => 2,
            AddrMode::Ieee => 3,
            AddrMode::Broadcast => 0x0f,
        }
    }

    fn from_byte(b: u8) -> Result<Self, TypeError> {
        match b {
            0 => Ok(AddrMode::NotPresent),
            1 => Ok(AddrMode::Group),
            2 => Ok(AddrMode::Nwk),
            3 => Ok(AddrMode::Ieee),
            0x0f => Ok(AddrMode::Broadcast),
            other => Err(TypeError::InvalidTag(other, "AddrMode")),
        }
    }
}

/// A tagged address: the mode tag followed by an 8-byte address field.
/// IEEE addresses occupy the field directly; all other modes store their
/// 2-byte address zero-padded to 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrModeAddress {
    NotPresent,
    Group(u16),
    Nwk(Nwk),
    Ieee(Eui64),
    Broadcast(u16),
}

impl AddrModeAddress {
    pub fn mode(&self) -> AddrMode {
        match self {
            AddrModeAddress::NotPresent => AddrMode::NotPresent,
            AddrModeAddress::Group(_) => AddrMode::Group,
            AddrModeAddress::Nwk(_) => AddrMode::Nwk,
            AddrModeAddress::Ieee(_) => AddrMode::Ieee,
            AddrModeAddress::Broadcast(_) => AddrMode::Broadcast,
        }
    }
}

impl Wire for AddrModeAddress {
    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.mode().to_byte());
        let mut field = [0u8; 8];
        match self {
            AddrModeAddress::NotPresent => {}
            AddrModeAddress::Group(v) | AddrModeAddress::Broadcast(v) => {
                field[..2].copy_from_slice(&v.to_le_bytes());
            }
            AddrModeAddress::Nwk(nwk) => {
                field[..2].copy_from_slice(&nwk.0.to_le_bytes());
            }
            AddrModeAddress::Ieee(eui) => field.copy_from_slice(&eui.0),
        }
        out.extend_from_slice(&field);
    }

    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        let (tag, rest) = u8::read(input)?;
        let mode = AddrMode::from_byte(tag)?;
        let (field, rest) = take(rest, 8)?;
        let value = match mode {
            AddrMode::NotPresent => AddrModeAddress::NotPresent,
            AddrMode::Group => AddrModeAddress::Group(LittleEndian::read_u16(&field[..2])),
            AddrMode::Nwk => AddrModeAddress::Nwk(Nwk(LittleEndian::read_u16(&field[..2]))),
            AddrMode::Broadcast => {
                AddrModeAddress::Broadcast(LittleEndian::read_u16(&field[..2]))
            }
            AddrMode::Ieee => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(field);
                AddrModeAddress::Ieee(Eui64(buf))
            }
        };
        Ok((value, rest))
    }
}

/// Declares a dense coprocessor-side enumeration backed by `uint8`/`uint16`.
/// Decoding an unrecognized discriminant yields `Unknown(raw)` rather than
/// failing, so forward-compatible frames still parse (spec: enumerations).
macro_rules! mt_enum {
    ($name:ident: $repr:ty { $($variant:ident = $value:expr),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
            Unknown($repr),
        }

        impl $name {
            pub fn value(self) -> $repr {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Unknown(v) => v,
                }
            }
        }

        impl From<$repr> for $name {
            fn from(v: $repr) -> Self {
                match v {
                    $($value => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }
        }

        impl $crate::mt::types::Wire for $name {
            fn write(&self, out: &mut Vec<u8>) {
                self.value().write(out);
            }
            fn read(input: &[u8]) -> Result<(Self, &[u8]), $crate::mt::types::TypeError> {
                let (raw, rest) = <$repr as $crate::mt::types::Wire>::read(input)?;
                Ok((Self::from(raw), rest))
            }
        }
    };
}

/// Declares a bitmask enumeration whose known bits are named and whose
/// unrecognized bits remain visible (rather than being rejected) so a
/// forward-compatible capability mask still round-trips.
macro_rules! mt_flags {
    ($name:ident: $repr:ty { $($variant:ident = $value:expr),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub $repr);

        impl $name {
            $(#[allow(non_upper_case_globals)] pub const $variant: $repr = $value;)*

            pub fn contains(&self, bit: $repr) -> bool {
                (self.0 & bit) == bit
            }
        }

        impl $crate::mt::types::Wire for $name {
            fn write(&self, out: &mut Vec<u8>) {
                self.0.write(out);
            }
            fn read(input: &[u8]) -> Result<(Self, &[u8]), $crate::mt::types::TypeError> {
                let (raw, rest) = <$repr as $crate::mt::types::Wire>::read(input)?;
                Ok((Self(raw), rest))
            }
        }
    };
}

pub(crate) use mt_enum;
pub(crate) use mt_flags;

mt_enum!(Status: u8 {
    Success = 0x00,
    Failure = 0x01,
});

mt_enum!(ResetReason: u8 {
    PowerUp = 0x00,
    External = 0x01,
    Watchdog = 0x02,
});

mt_enum!(ResetType: u8 {
    Hard = 0x00,
    Soft = 0x01,
});

mt_enum!(DeviceState: u8 {
    InitializedNotStarted = 0x00,
    InitializedNotConnected = 0x01,
    DiscoveringPans = 0x02,
    Joining = 0x03,
    ReJoining = 0x04,
    JoinedNotAuthenticated = 0x05,
    JoinedAsEndDevice = 0x06,
    JoinedAsRouter = 0x07,
    StartingAsCoordinator = 0x08,
    StartedAsCoordinator = 0x09,
    LostParent = 0x0a,
});

mt_enum!(ZdoStatus: u8 {
    Success = 0x00,
    InvalidParameter = 0x80,
    DeviceNotFound = 0x83,
    NotSupported = 0x84,
    Timeout = 0x85,
});

mt_enum!(BdbCommissioningStatus: u8 {
    Success = 0x00,
    InProgress = 0x01,
    NotAaCapable = 0x02,
    NoNetwork = 0x03,
    TargetFailure = 0x04,
    FormationFailure = 0x05,
    NoIdentifyQueryResponse = 0x06,
    BindingTableFull = 0x07,
    NoScanResponse = 0x08,
    NotPermitted = 0x09,
});

mt_flags!(MtCapabilities: u16 {
    CapSys = 0x0001,
    CapMac = 0x0002,
    CapNwk = 0x0004,
    CapAf = 0x0008,
    CapZdo = 0x0010,
    CapSapi = 0x0020,
    CapUtil = 0x0040,
    CapDebug = 0x0080,
    CapApp = 0x0100,
    CapZoad = 0x1000,
});

mt_flags!(BdbCommissioningMode: u8 {
    None = 0x00,
    Initiator = 0x01,
    NwkFormation = 0x04,
    NwkSteering = 0x08,
    Finding = 0x10,
    Touchlink = 0x20,
    ParentLost = 0x40,
});
