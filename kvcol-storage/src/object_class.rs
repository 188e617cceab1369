//! Storage object classes.
//!
//! An object class selects the replication / erasure-coding layout the store
//! applies to an object. The engine only needs to name, validate and pass
//! classes through, so the set is a closed enum rather than an open registry.

use std::fmt;
use std::str::FromStr;

use kvcol_result::{Error, Result};

use crate::constants::OBJECT_CLASS_NAME_MAX_LEN;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    /// Single shard.
    S1,
    S2,
    S4,
    S8,
    S16,
    S32,
    /// Striped over all targets.
    #[default]
    SX,
    /// Two-way replication, one group.
    Rp2G1,
    /// Two-way replication, all groups.
    Rp2GX,
    Rp3G1,
    Rp3GX,
    /// Erasure coding, two data cells plus one parity.
    Ec2P1G1,
    Ec2P1GX,
    Ec4P2G1,
    Ec4P2GX,
}

impl ObjectClass {
    /// Class used for all metadata values (anchor, header, footer, page lists).
    pub const METADATA: ObjectClass = ObjectClass::SX;

    pub const ALL: [ObjectClass; 15] = [
        ObjectClass::S1,
        ObjectClass::S2,
        ObjectClass::S4,
        ObjectClass::S8,
        ObjectClass::S16,
        ObjectClass::S32,
        ObjectClass::SX,
        ObjectClass::Rp2G1,
        ObjectClass::Rp2GX,
        ObjectClass::Rp3G1,
        ObjectClass::Rp3GX,
        ObjectClass::Ec2P1G1,
        ObjectClass::Ec2P1GX,
        ObjectClass::Ec4P2G1,
        ObjectClass::Ec4P2GX,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObjectClass::S1 => "S1",
            ObjectClass::S2 => "S2",
            ObjectClass::S4 => "S4",
            ObjectClass::S8 => "S8",
            ObjectClass::S16 => "S16",
            ObjectClass::S32 => "S32",
            ObjectClass::SX => "SX",
            ObjectClass::Rp2G1 => "RP_2G1",
            ObjectClass::Rp2GX => "RP_2GX",
            ObjectClass::Rp3G1 => "RP_3G1",
            ObjectClass::Rp3GX => "RP_3GX",
            ObjectClass::Ec2P1G1 => "EC_2P1G1",
            ObjectClass::Ec2P1GX => "EC_2P1GX",
            ObjectClass::Ec4P2G1 => "EC_4P2G1",
            ObjectClass::Ec4P2GX => "EC_4P2GX",
        }
    }

    /// Looks up a class by name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.len() > OBJECT_CLASS_NAME_MAX_LEN {
            return None;
        }
        Self::ALL.into_iter().find(|class| class.name() == name)
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ObjectClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::UnknownObjectClass(s.to_string()))
    }
}
