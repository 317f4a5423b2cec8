//! Command catalog scaffolding: the traits and macros every concrete MT
//! command in [`crate::mt::commands`] is built from.
//!
//! A command class is identified by `(subsystem, id, type)`, equivalently by
//! its [`CommandHeader`]. Instances are immutable once built: this crate
//! enforces that structurally by never exposing `&mut` accessors on a
//! payload struct, rather than policing it at runtime. "Partial" commands are
//! not a state a bound value can be in — a partial command is represented as
//! a predicate (a [`Matcher`]) instead, so a sendable value and an unbound
//! matcher are simply different Rust types and a half-bound value can never
//! be accidentally serialized.

use thiserror::Error;

use super::frame::GeneralFrame;
use super::header::CommandHeader;
use super::types::{TypeError, Wire};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("wrong frame header: expected {expected}, got {actual}")]
    WrongHeader {
        expected: CommandHeader,
        actual: CommandHeader,
    },

    #[error("{0} bytes remained after decoding all declared parameters")]
    TrailingData(usize),

    #[error(transparent)]
    Type(#[from] TypeError),
}

/// A fully-bound value that can be written to the wire as a request.
pub trait Sendable: Wire {
    fn header() -> CommandHeader;
    fn to_frame(&self) -> GeneralFrame {
        let mut payload = Vec::new();
        self.write(&mut payload);
        GeneralFrame::new(Self::header(), payload)
    }
}

/// A fully-bound value decoded from a matching inbound frame.
pub trait Decodable: Wire + Sized {
    fn header() -> CommandHeader;
    fn from_frame(frame: &GeneralFrame) -> Result<Self, CommandError> {
        decode_exact(frame, Self::header())
    }
}

pub(crate) fn decode_exact<T: Wire>(
    frame: &GeneralFrame,
    expected: CommandHeader,
) -> Result<T, CommandError> {
    if frame.header != expected {
        return Err(CommandError::WrongHeader {
            expected,
            actual: frame.header,
        });
    }
    let (value, rest) = T::read(&frame.payload)?;
    if !rest.is_empty() {
        return Err(CommandError::TrailingData(rest.len()));
    }
    Ok(value)
}

/// A predicate over a fully-bound decoded value, used to register listeners.
/// `Matcher::any()` matches every instance of the class; `Matcher::where_`
/// narrows to instances whose projection equals a given value. This is the
/// "partial command as matcher, not as a half-built value" design from the
/// spec's design notes: wildcards never exist as unbound struct fields, they
/// exist only as the absence of a constraint in a predicate.
pub struct Matcher<T> {
    predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: 'static> Matcher<T> {
    pub fn any() -> Self {
        Matcher {
            predicate: Box::new(|_| true),
        }
    }

    /// Build a matcher that requires `projection(actual) == expected`.
    pub fn field_eq<V: PartialEq + Send + Sync + 'static>(
        expected: V,
        projection: impl Fn(&T) -> V + Send + Sync + 'static,
    ) -> Self {
        Matcher {
            predicate: Box::new(move |actual| projection(actual) == expected),
        }
    }

    /// Build a matcher from an arbitrary predicate, for conditions
    /// `field_eq` can't express directly — e.g. "state is one of several
    /// acceptable values" (startup accepts either `StartedAsCoordinator`
    /// or `RestoredNetworkState`).
    pub fn predicate(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Matcher {
            predicate: Box::new(predicate),
        }
    }

    /// Combine two matchers, requiring both to hold (used to match e.g. an
    /// `AF.DataConfirm` on both `Endpoint` and `TSN` at once).
    pub fn and(self, other: Matcher<T>) -> Self {
        Matcher {
            predicate: Box::new(move |actual| {
                (self.predicate)(actual) && (other.predicate)(actual)
            }),
        }
    }

    pub fn matches(&self, actual: &T) -> bool {
        (self.predicate)(actual)
    }
}

/// Declares the bound payload struct for one command's request, response, or
/// AREQ callback schema: an ordered list of typed fields. Serialization
/// concatenates field serializations in declaration order; deserialization
/// reads fields in the same order and the outer caller ([`decode_exact`])
/// rejects any leftover bytes.
macro_rules! mt_payload {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(pub $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl $crate::mt::types::Wire for $name {
            fn write(&self, out: &mut Vec<u8>) {
                $( $crate::mt::types::Wire::write(&self.$field, out); )*
            }

            #[allow(unused_variables, unused_mut)]
            fn read(input: &[u8]) -> Result<(Self, &[u8]), $crate::mt::types::TypeError> {
                $( let ($field, input) = <$ty as $crate::mt::types::Wire>::read(input)?; )*
                Ok(($name { $($field),* }, input))
            }
        }
    };
}

/// Wires a `Req`/`Rsp` pair to their SREQ/SRSP headers, SRSP = SREQ + 0x0040.
macro_rules! mt_sreq {
    ($subsystem:expr, $id:expr, $req:ty, $rsp:ty) => {
        impl $crate::mt::command::Sendable for $req {
            fn header() -> $crate::mt::header::CommandHeader {
                $crate::mt::header::CommandHeader::new(
                    $subsystem,
                    $crate::mt::header::CommandType::Sreq,
                    $id,
                )
            }
        }

        impl $crate::mt::command::Decodable for $rsp {
            fn header() -> $crate::mt::header::CommandHeader {
                <$req as $crate::mt::command::Sendable>::header().srsp_header()
            }
        }
    };
}

/// Wires an AREQ callback payload to its header. The coprocessor is always
/// the sender for every AREQ this driver consumes, so only `Decodable` is
/// generated; a subsystem that needed a host-originated AREQ would add
/// `Sendable` too, the same way `mt_sreq!` does for the request half.
macro_rules! mt_areq {
    ($subsystem:expr, $id:expr, $callback:ty) => {
        impl $crate::mt::command::Decodable for $callback {
            fn header() -> $crate::mt::header::CommandHeader {
                $crate::mt::header::CommandHeader::new(
                    $subsystem,
                    $crate::mt::header::CommandType::Areq,
                    $id,
                )
            }
        }
    };
}

/// Wires a host-originated, fire-and-forget AREQ (no SRSP, no callback
/// reply of its own) to its header. `SYS.ResetReq` is this driver's only
/// instance: the coprocessor acknowledges a reset via the separate
/// `SYS.ResetInd` callback rather than an SRSP, so the request side is
/// `Sendable` only.
macro_rules! mt_areq_out {
    ($subsystem:expr, $id:expr, $req:ty) => {
        impl $crate::mt::command::Sendable for $req {
            fn header() -> $crate::mt::header::CommandHeader {
                $crate::mt::header::CommandHeader::new(
                    $subsystem,
                    $crate::mt::header::CommandType::Areq,
                    $id,
                )
            }
        }
    };
}

pub(crate) use mt_areq;
pub(crate) use mt_areq_out;
pub(crate) use mt_payload;
pub(crate) use mt_sreq;
