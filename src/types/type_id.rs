//! IEC 60870-5-101/-104 type identification.
//!
//! The type id is an open-ended 1-byte value; whether a given id can be
//! decoded is decided by the info-object registry, not by this type. Named
//! constants cover the standard table.

/// Type identification of an ASDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u8);

impl TypeId {
    // Process information - monitoring direction
    /// Single-point information
    pub const M_SP_NA_1: TypeId = TypeId(1);
    /// Single-point information with time tag
    pub const M_SP_TA_1: TypeId = TypeId(2);
    /// Double-point information
    pub const M_DP_NA_1: TypeId = TypeId(3);
    /// Double-point information with time tag
    pub const M_DP_TA_1: TypeId = TypeId(4);
    /// Step position information
    pub const M_ST_NA_1: TypeId = TypeId(5);
    /// Bitstring of 32 bit
    pub const M_BO_NA_1: TypeId = TypeId(7);
    /// Measured value, normalized
    pub const M_ME_NA_1: TypeId = TypeId(9);
    /// Measured value, scaled
    pub const M_ME_NB_1: TypeId = TypeId(11);
    /// Measured value, short floating point
    pub const M_ME_NC_1: TypeId = TypeId(13);
    /// Integrated totals
    pub const M_IT_NA_1: TypeId = TypeId(15);
    /// Single-point information with CP56Time2a time tag
    pub const M_SP_TB_1: TypeId = TypeId(30);
    /// Double-point information with CP56Time2a time tag
    pub const M_DP_TB_1: TypeId = TypeId(31);
    /// Measured value, short floating point with CP56Time2a time tag
    pub const M_ME_TF_1: TypeId = TypeId(36);

    // Process information - control direction
    /// Single command
    pub const C_SC_NA_1: TypeId = TypeId(45);
    /// Double command
    pub const C_DC_NA_1: TypeId = TypeId(46);
    /// Regulating step command
    pub const C_RC_NA_1: TypeId = TypeId(47);
    /// Set-point command, normalized
    pub const C_SE_NA_1: TypeId = TypeId(48);
    /// Set-point command, scaled
    pub const C_SE_NB_1: TypeId = TypeId(49);
    /// Set-point command, short floating point
    pub const C_SE_NC_1: TypeId = TypeId(50);
    /// Bitstring of 32 bit command
    pub const C_BO_NA_1: TypeId = TypeId(51);

    // System information - monitoring direction
    /// End of initialization
    pub const M_EI_NA_1: TypeId = TypeId(70);

    // System information - control direction
    /// Interrogation command
    pub const C_IC_NA_1: TypeId = TypeId(100);
    /// Counter interrogation command
    pub const C_CI_NA_1: TypeId = TypeId(101);
    /// Read command
    pub const C_RD_NA_1: TypeId = TypeId(102);
    /// Clock synchronization command
    pub const C_CS_NA_1: TypeId = TypeId(103);
    /// Test command
    pub const C_TS_NA_1: TypeId = TypeId(104);
    /// Reset process command
    pub const C_RP_NA_1: TypeId = TypeId(105);

    /// Get the raw byte value.
    #[inline]
    pub const fn as_u8(&self) -> u8 {
        self.0
    }

    /// Standard mnemonic, if this id is part of the named table.
    pub const fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            1 => "M_SP_NA_1",
            2 => "M_SP_TA_1",
            3 => "M_DP_NA_1",
            4 => "M_DP_TA_1",
            5 => "M_ST_NA_1",
            7 => "M_BO_NA_1",
            9 => "M_ME_NA_1",
            11 => "M_ME_NB_1",
            13 => "M_ME_NC_1",
            15 => "M_IT_NA_1",
            30 => "M_SP_TB_1",
            31 => "M_DP_TB_1",
            36 => "M_ME_TF_1",
            45 => "C_SC_NA_1",
            46 => "C_DC_NA_1",
            47 => "C_RC_NA_1",
            48 => "C_SE_NA_1",
            49 => "C_SE_NB_1",
            50 => "C_SE_NC_1",
            51 => "C_BO_NA_1",
            70 => "M_EI_NA_1",
            100 => "C_IC_NA_1",
            101 => "C_CI_NA_1",
            102 => "C_RD_NA_1",
            103 => "C_CS_NA_1",
            104 => "C_TS_NA_1",
            105 => "C_RP_NA_1",
            _ => return None,
        })
    }
}

impl From<u8> for TypeId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "TypeId({})", self.0),
        }
    }
}
