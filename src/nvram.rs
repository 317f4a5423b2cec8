//! NVRAM item identifiers and the NIB (network information base) blob layout.
//!
//! Most NV items this driver touches are opaque scalars handed straight to
//! `SYS.OSALNVRead`/`SYS.OSALNVWrite` as raw bytes. The NIB is the one item
//! this driver needs to partially understand: startup reads the coordinator's
//! current channel, channel mask, PAN id, and extended PAN id out of it, and
//! a channel-changing `update_network` call patches the channel fields back
//! in before rewriting it, leaving every other byte of the blob untouched.

use thiserror::Error;

use crate::mt::types::{mt_enum, mt_flags, Channels, ExtendedPanId, PanId, TypeError, Wire};

/// `HAS_CONFIGURED_ZSTACK3`'s "yes, formed" sentinel value.
pub const HAS_CONFIGURED_SENTINEL: u8 = 0x55;

/// Z-Stack's coordinator-role concentrator/child-aging defaults this driver
/// writes on every startup, not only when forming a fresh network.
pub const CONCENTRATOR_ENABLE: u8 = 0x01;
pub const CONCENTRATOR_DISCOVERY: u8 = 0x01;
pub const CONCENTRATOR_RADIUS: u8 = 0x0a;
pub const SRC_RTG_EXPIRY_SECONDS: u8 = 0x1e;
pub const NWK_CHILD_AGE_ENABLE: u8 = 0x01;

mt_enum!(LogicalType: u8 {
    Coordinator = 0x00,
    Router = 0x01,
    EndDevice = 0x02,
});

mt_flags!(StartupOption: u8 {
    ClearConfig = 0x01,
    ClearState = 0x02,
});

/// Serialize any [`Wire`] value to the raw bytes an `OSALNVWrite.Value`
/// (a [`crate::mt::types::ShortBytes`]) wraps.
pub fn encode<T: Wire>(value: &T) -> Vec<u8> {
    let mut buf = Vec::new();
    value.write(&mut buf);
    buf
}

/// NVRAM item identifiers read or written by this driver. Not an exhaustive
/// list of every item Z-Stack defines, only the ones the startup and
/// network-update flows touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NvId {
    HasConfiguredZStack3 = 0x0060,
    StartupOption = 0x0003,
    Nib = 0x0021,
    PanId = 0x0083,
    ChanList = 0x0084,
    LogicalType = 0x0087,
    PreCfgKey = 0x0062,
    PreCfgKeysEnable = 0x0063,
    ExtendedPanId = 0x002d,
    ZdoDirectCb = 0x008f,
    ConcentratorEnable = 0x0092,
    ConcentratorDiscovery = 0x0093,
    ConcentratorRc = 0x009a,
    SrcRtgExpiryTime = 0x009b,
    NwkChildAgeEnable = 0x009c,
}

impl NvId {
    pub fn id(self) -> u16 {
        self as u16
    }
}

const NIB_CHANNEL_OFFSET: usize = 24;
const NIB_CHANNEL_LIST_OFFSET: usize = 40;
const NIB_PAN_ID_OFFSET: usize = 35;
const NIB_EXTENDED_PAN_ID_OFFSET: usize = 57;
const NIB_MIN_LEN: usize = NIB_EXTENDED_PAN_ID_OFFSET + 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NibError {
    #[error("NIB blob of {0} bytes is too short to contain the channel fields")]
    TooShort(usize),
}

/// The NIB blob, held opaque apart from the fields this driver reads and
/// rewrites. Round-trips every other byte unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nib(Vec<u8>);

impl Nib {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, NibError> {
        if bytes.len() < NIB_MIN_LEN {
            return Err(NibError::TooShort(bytes.len()));
        }
        Ok(Nib(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The coordinator's current logical channel.
    pub fn channel(&self) -> u8 {
        self.0[NIB_CHANNEL_OFFSET]
    }

    /// The full channel mask the network was formed/configured to use.
    pub fn channel_list(&self) -> Channels {
        let (mask, _) = Channels::read(&self.0[NIB_CHANNEL_LIST_OFFSET..]).expect(
            "NIB_MIN_LEN guarantees at least 4 bytes remain at NIB_CHANNEL_LIST_OFFSET",
        );
        mask
    }

    /// The coordinator's PAN id.
    pub fn pan_id(&self) -> PanId {
        let (pan_id, _) = PanId::read(&self.0[NIB_PAN_ID_OFFSET..])
            .expect("NIB_MIN_LEN guarantees at least 2 bytes remain at NIB_PAN_ID_OFFSET");
        pan_id
    }

    /// The coordinator's extended (64-bit) PAN id.
    pub fn extended_pan_id(&self) -> ExtendedPanId {
        let (extended_pan_id, _) = ExtendedPanId::read(&self.0[NIB_EXTENDED_PAN_ID_OFFSET..])
            .expect(
                "NIB_MIN_LEN guarantees at least 8 bytes remain at NIB_EXTENDED_PAN_ID_OFFSET",
            );
        extended_pan_id
    }

    /// Rewrite the channel and channel-mask fields in place, leaving every
    /// other byte untouched, per `update_network`'s NIB-rewrite path.
    pub fn set_channel_fields(&mut self, channel: u8, channel_list: Channels) {
        self.0[NIB_CHANNEL_OFFSET] = channel;
        let mut buf = Vec::with_capacity(4);
        channel_list.write(&mut buf);
        self.0[NIB_CHANNEL_LIST_OFFSET..NIB_CHANNEL_LIST_OFFSET + 4].copy_from_slice(&buf);
    }
}

impl Wire for Nib {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }

    fn read(input: &[u8]) -> Result<(Self, &[u8]), TypeError> {
        // The NIB is read out of `OSALNVRead.Rsp::value` as a whole; there is
        // no trailing data to stop at, so it consumes the entire slice.
        Ok((Nib(input.to_vec()), &input[input.len()..]))
    }
}

/// The retained test fixture's NIB blob: channel 25, channel mask
/// `[15, 20, 25]`. Shared across this module's own tests and the
/// startup-flow integration test, which both need a coprocessor-realistic
/// NIB to read back.
#[cfg(test)]
pub(crate) fn sample_nib_bytes() -> Vec<u8> {
    let hex = concat!(
        "790502331433001e0000000105018f00070002051e000000190000000000000000",
        "000000FFFE080000801002",
        "0f0f040001000000010000000000124b001caaac5c0100000000000000000000",
        "000000000000000000000000000000000000000000000000000000000f0300",
        "01780a0100000020470000",
    );
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nib() -> Vec<u8> {
        sample_nib_bytes()
    }

    #[test]
    fn channel_and_mask_match_the_fixture_values() {
        let nib = Nib::from_bytes(sample_nib()).unwrap();
        assert_eq!(nib.channel(), 25);
        assert_eq!(nib.channel_list(), Channels::from_channel_list(&[15, 20, 25]));
    }

    #[test]
    fn pan_id_and_extended_pan_id_match_the_fixture_values() {
        let nib = Nib::from_bytes(sample_nib()).unwrap();
        assert_eq!(nib.pan_id(), PanId(0xff00));
        assert_eq!(
            nib.extended_pan_id(),
            ExtendedPanId([0x00, 0x12, 0x4b, 0x00, 0x1c, 0xaa, 0xac, 0x5c])
        );
    }

    #[test]
    fn set_channel_fields_only_touches_those_bytes() {
        let mut nib = Nib::from_bytes(sample_nib()).unwrap();
        let before = nib.as_bytes().to_vec();

        nib.set_channel_fields(20, Channels::from_channel_list(&[20]));

        assert_eq!(nib.channel(), 20);
        assert_eq!(nib.channel_list(), Channels::from_channel_list(&[20]));

        let after = nib.as_bytes().to_vec();
        for (i, (b, a)) in before.iter().zip(after.iter()).enumerate() {
            if i == NIB_CHANNEL_OFFSET
                || (NIB_CHANNEL_LIST_OFFSET..NIB_CHANNEL_LIST_OFFSET + 4).contains(&i)
            {
                continue;
            }
            assert_eq!(b, a, "byte {i} changed unexpectedly");
        }
    }

    #[test]
    fn too_short_blob_is_rejected() {
        assert_eq!(Nib::from_bytes(vec![0; 10]), Err(NibError::TooShort(10)));
    }

    #[test]
    fn encode_matches_manual_single_byte_writes() {
        assert_eq!(encode(&LogicalType::Coordinator), vec![0x00]);
        assert_eq!(encode(&StartupOption(StartupOption::ClearState)), vec![0x02]);
        assert_eq!(encode(&true), vec![0x01]);
        assert_eq!(encode(&HAS_CONFIGURED_SENTINEL), vec![0x55]);
    }
}
