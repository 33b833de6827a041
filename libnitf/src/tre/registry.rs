use std::{collections::HashMap, sync::LazyLock};

use super::descriptor::{int, real, repeat, text, when, TreDescriptor};

/// Country code list
const CCLSTA: TreDescriptor = TreDescriptor {
    tag: "CCLSTA",
    fields: &[
        int!("CC_STD_LEN", 3),
        text!("CC_STD", sized_by "CC_STD_LEN"),
        int!("CC_ORG_LEN", 3),
        text!("CC_ORG", sized_by "CC_ORG_LEN"),
        text!("CC_UUID", 36),
        int!("NUM_SUPPLEMENTAL_IDENTIFIERS", 3),
        repeat!("SUPPLEMENTAL_IDENTIFIERS", count = "NUM_SUPPLEMENTAL_IDENTIFIERS", [
            int!("SUPP_ID_LEN", 3),
            text!("SUPP_ID", sized_by "SUPP_ID_LEN"),
        ]),
    ],
};

/// Exploitation usability
const USE00A: TreDescriptor = TreDescriptor {
    tag: "USE00A",
    fields: &[
        int!("ANGLE_TO_NORTH", 3),
        real!("MEAN_GSD", 5),
        text!("RESERVED1", 1),
        int!("DYNAMIC_RANGE", 5),
        text!("RESERVED2", 3),
        text!("RESERVED3", 1),
        text!("RESERVED4", 3),
        real!("OBL_ANG", 5),
        real!("ROLL_ANG", 6),
        text!("RESERVED5", 12),
        text!("RESERVED6", 15),
        text!("RESERVED7", 4),
        text!("RESERVED8", 1),
        text!("RESERVED9", 3),
        text!("RESERVED10", 1),
        text!("RESERVED11", 1),
        int!("N_REF", 2),
        int!("REV_NUM", 5),
        int!("N_SEG", 3),
        int!("MAX_LP_SEG", 6),
        text!("RESERVED12", 6),
        text!("RESERVED13", 6),
        real!("SUN_EL", 5),
        real!("SUN_AZ", 5),
    ],
};

/// Image block information
const BLOCKA: TreDescriptor = TreDescriptor {
    tag: "BLOCKA",
    fields: &[
        int!("BLOCK_INSTANCE", 2),
        text!("N_GRAY", 5),
        int!("L_LINES", 5),
        text!("LAYOVER_ANGLE", 3),
        text!("SHADOW_ANGLE", 3),
        text!("RESERVED1", 16),
        text!("FRLC_LOC", 21),
        text!("LRLC_LOC", 21),
        text!("LRFC_LOC", 21),
        text!("FRFC_LOC", 21),
        text!("RESERVED2", 5),
    ],
};

/// Standard ID
const STDIDC: TreDescriptor = TreDescriptor {
    tag: "STDIDC",
    fields: &[
        text!("ACQUISITION_DATE", 14),
        text!("MISSION", 14),
        text!("PASS", 2),
        int!("OP_NUM", 3),
        text!("START_SEGMENT", 2),
        int!("REPRO_NUM", 2),
        text!("REPLAY_REGEN", 3),
        text!("BLANK_FILL", 1),
        int!("START_COLUMN", 3),
        int!("START_ROW", 5),
        text!("END_SEGMENT", 2),
        int!("END_COLUMN", 3),
        int!("END_ROW", 5),
        text!("COUNTRY", 2),
        text!("WAC", 4),
        text!("LOCATION", 11),
        text!("RESERVED1", 5),
        text!("RESERVED2", 8),
    ],
};

/// Additional image identification
const AIMIDB: TreDescriptor = TreDescriptor {
    tag: "AIMIDB",
    fields: &[
        text!("ACQUISITION_DATE", 14),
        text!("MISSION_NO", 4),
        text!("MISSION_IDENTIFICATION", 10),
        text!("FLIGHT_NO", 2),
        int!("OP_NUM", 3),
        text!("CURRENT_SEGMENT", 2),
        int!("REPRO_NUM", 2),
        text!("REPLAY", 3),
        text!("RESERVED_1", 1),
        int!("START_TILE_COLUMN", 3),
        int!("START_TILE_ROW", 5),
        text!("END_SEGMENT", 2),
        int!("END_TILE_COLUMN", 3),
        int!("END_TILE_ROW", 5),
        text!("COUNTRY", 2),
        text!("RESERVED_2", 4),
        text!("LOCATION", 11),
        text!("RESERVED_3", 13),
    ],
};

/// Commercial support data identification
const CSDIDA: TreDescriptor = TreDescriptor {
    tag: "CSDIDA",
    fields: &[
        int!("DAY", 2),
        text!("MONTH", 3),
        int!("YEAR", 4),
        text!("PLATFORM_CODE", 2),
        int!("VEHICLE_ID", 2),
        int!("PASS", 2),
        int!("OPERATION", 3),
        text!("SENSOR_ID", 2),
        text!("PRODUCT_ID", 2),
        text!("RESERVED_1", 4),
        text!("TIME", 14),
        text!("PROCESS_TIME", 14),
        text!("RESERVED_2", 2),
        text!("RESERVED_3", 2),
        text!("RESERVED_4", 1),
        text!("RESERVED_5", 1),
        text!("SOFTWARE_VERSION_NUMBER", 10),
    ],
};

/// Image chip support data
const ICHIPB: TreDescriptor = TreDescriptor {
    tag: "ICHIPB",
    fields: &[
        int!("XFRM_FLAG", 2),
        real!("SCALE_FACTOR", 10),
        int!("ANAMRPH_CORR", 2),
        int!("SCANBLK_NUM", 2),
        real!("OP_ROW_11", 12),
        real!("OP_COL_11", 12),
        real!("OP_ROW_12", 12),
        real!("OP_COL_12", 12),
        real!("OP_ROW_21", 12),
        real!("OP_COL_21", 12),
        real!("OP_ROW_22", 12),
        real!("OP_COL_22", 12),
        real!("FI_ROW_11", 12),
        real!("FI_COL_11", 12),
        real!("FI_ROW_12", 12),
        real!("FI_COL_12", 12),
        real!("FI_ROW_21", 12),
        real!("FI_COL_21", 12),
        real!("FI_ROW_22", 12),
        real!("FI_COL_22", 12),
        int!("FI_ROW", 8),
        int!("FI_COL", 8),
    ],
};

/// Mission target information
const MSTGTA: TreDescriptor = TreDescriptor {
    tag: "MSTGTA",
    fields: &[
        int!("TGT_NUM", 5),
        text!("TGT_ID", 12),
        text!("TGT_BE", 15),
        text!("TGT_PRI", 3),
        text!("TGT_REQ", 12),
        text!("TGT_LTIOV", 12),
        text!("TGT_TYPE", 1),
        text!("TGT_COLL", 1),
        text!("TGT_CAT", 5),
        text!("TGT_UTC", 7),
        text!("TGT_ELEV", 6),
        text!("TGT_ELEV_UNIT", 1),
        text!("TGT_LOC", 21),
    ],
};

/// Softcopy history
const HISTOA: TreDescriptor = TreDescriptor {
    tag: "HISTOA",
    fields: &[
        text!("SYSTYPE", 20),
        text!("PC", 12),
        text!("PE", 4),
        text!("REMAP_FLAG", 1),
        text!("LUTID", 2),
        int!("NEVENTS", 2),
        repeat!("EVENTS", count = "NEVENTS", [
            text!("PDATE", 14),
            text!("PSITE", 10),
            text!("PAS", 10),
            int!("NIPCOM", 1),
            repeat!("IPCOMS", count = "NIPCOM", [text!("IPCOM", 80)]),
            int!("IBPP", 2),
            text!("IPVTYPE", 3),
            text!("INBWC", 10),
            text!("DISP_FLAG", 1),
            text!("ROT_FLAG", 1),
            when!("ROT_FLAG" == "1", [real!("ROT_ANGLE", 8)]),
            text!("ASYM_FLAG", 1),
            when!("ASYM_FLAG" == "1", [
                real!("ZOOMROW", 7),
                text!("ROWOP", 1),
                real!("ZOOMCOL", 7),
                text!("COLOP", 1),
            ]),
            text!("PROJ_FLAG", 1),
            text!("SHARP_FLAG", 1),
            when!("SHARP_FLAG" == "1", [int!("SHARPFAM", 2), int!("SHARPMEM", 2)]),
            text!("MAG_FLAG", 1),
            when!("MAG_FLAG" == "1", [real!("MAG_LEVEL", 7)]),
            text!("DRA_FLAG", 1),
            when!("DRA_FLAG" == "1", [real!("DRA_MULT", 7), int!("DRA_SUB", 5)]),
            text!("TTC_FLAG", 1),
            when!("TTC_FLAG" == "1", [int!("TTCFAM", 2), int!("TTCMEM", 2)]),
            text!("DEVLUT_FLAG", 1),
            int!("OBPP", 2),
            text!("OPVTYPE", 3),
            text!("OUTBWC", 10),
        ]),
    ],
};

static DESCRIPTORS: &[TreDescriptor] = &[
    CCLSTA, USE00A, BLOCKA, STDIDC, AIMIDB, CSDIDA, ICHIPB, MSTGTA, HISTOA,
];

static REGISTRY: LazyLock<HashMap<&'static str, &'static TreDescriptor>> =
    LazyLock::new(|| DESCRIPTORS.iter().map(|d| (d.tag, d)).collect());

/// Looks up the descriptor registered for `tag`
#[must_use]
pub fn lookup(tag: &str) -> Option<&'static TreDescriptor> {
    REGISTRY.get(tag).copied()
}

/// Tags with a registered descriptor
pub fn registered_tags() -> impl Iterator<Item = &'static str> {
    DESCRIPTORS.iter().map(|d| d.tag)
}
