//! Format constants: record header, record type codes, bookkeeping atoms,
//! current-user stream, picture stream and stream names.

// -------- Record header --------
/// [ver_inst u16][type u16][len u32]
pub const RECORD_HEADER_SIZE: usize = 8;
pub const HDR_OFF_VER_INST: usize = 0;
pub const HDR_OFF_TYPE: usize = 2;
pub const HDR_OFF_LEN: usize = 4;

/// Low nibble of the first header word.
pub const HDR_VER_MASK: u16 = 0x000F;
/// Container records of the PowerPoint/escher family carry ver = 0xF.
pub const HDR_VER_CONTAINER: u8 = 0x0F;
/// Deepest container nesting the decoder accepts.
pub const MAX_RECORD_NESTING: usize = 64;

// -------- PowerPoint record types (containers) --------
pub const RT_DOCUMENT: u16 = 1000;
pub const RT_SLIDE: u16 = 1006;
pub const RT_NOTES: u16 = 1008;
pub const RT_ENVIRONMENT: u16 = 1010;
pub const RT_SLIDE_PERSIST: u16 = 1012;
pub const RT_MAIN_MASTER: u16 = 1016;
pub const RT_SLIDE_SHOW_SLIDE_INFO: u16 = 1017;
pub const RT_EX_OBJ_LIST: u16 = 1033;
pub const RT_PP_DRAWING_GROUP: u16 = 1035;
pub const RT_PP_DRAWING: u16 = 1036;
pub const RT_LIST: u16 = 2000;
pub const RT_FONT_COLLECTION: u16 = 2005;
pub const RT_SOUND_COLLECTION: u16 = 2020;
pub const RT_SOUND: u16 = 2022;
pub const RT_HANDOUT: u16 = 4041;
pub const RT_EX_EMBED: u16 = 4044;
pub const RT_EX_HYPERLINK: u16 = 4055;
pub const RT_HEADERS_FOOTERS: u16 = 4057;
pub const RT_SLIDE_LIST_WITH_TEXT: u16 = 4080;
pub const RT_INTERACTIVE_INFO: u16 = 4082;
pub const RT_PROG_TAGS: u16 = 5000;
pub const RT_PROG_BINARY_TAG: u16 = 5002;
pub const RT_BINARY_TAG_DATA: u16 = 5003;

// -------- PowerPoint record types (atoms) --------
pub const RT_DOCUMENT_ATOM: u16 = 1001;
pub const RT_SLIDE_ATOM: u16 = 1007;
pub const RT_USER_EDIT_ATOM: u16 = 4085;
pub const RT_CURRENT_USER_ATOM: u16 = 4086;
pub const RT_PERSIST_PTR_FULL: u16 = 6001;
pub const RT_PERSIST_PTR_INCREMENTAL: u16 = 6002;
pub const RT_DOCUMENT_ENCRYPTION_ATOM: u16 = 12052;

// -------- Escher (drawing) record types --------
pub const ESCHER_DGG_CONTAINER: u16 = 0xF000;
pub const ESCHER_BSTORE_CONTAINER: u16 = 0xF001;
pub const ESCHER_DG_CONTAINER: u16 = 0xF002;
pub const ESCHER_SPGR_CONTAINER: u16 = 0xF003;
pub const ESCHER_SP_CONTAINER: u16 = 0xF004;
pub const ESCHER_SOLVER_CONTAINER: u16 = 0xF005;
pub const ESCHER_BSE: u16 = 0xF007;
/// Blip record types are 0xF018 + native picture type.
pub const ESCHER_BLIP_FIRST: u16 = 0xF018;
pub const ESCHER_BLIP_LAST: u16 = 0xF117;
pub const ESCHER_BLIP_EMF: u16 = 0xF01A;
pub const ESCHER_BLIP_WMF: u16 = 0xF01B;
pub const ESCHER_BLIP_PICT: u16 = 0xF01C;

// -------- UserEditAtom --------
pub const USER_EDIT_ATOM_LEN: u32 = 0x1C;
pub const USER_EDIT_ATOM_LEN_ENCRYPTED: u32 = 0x20;
pub const UEA_OFF_LAST_VIEWED_SLIDE: usize = 0;
pub const UEA_OFF_VERSION: usize = 4;
pub const UEA_OFF_LAST_EDIT: usize = 8;
pub const UEA_OFF_PERSIST_PTRS: usize = 12;
pub const UEA_OFF_DOC_PERSIST_REF: usize = 16;
pub const UEA_OFF_MAX_PERSIST: usize = 20;
pub const UEA_OFF_LAST_VIEW_TYPE: usize = 24;
pub const UEA_OFF_UNUSED: usize = 26;
pub const UEA_OFF_ENCRYPT_REF: usize = 28;
/// minorVersion 0x0000, majorVersion 0x0003.
pub const UEA_DEFAULT_VERSION: u32 = 0x0003_0000;

pub const LAST_VIEW_NONE: u16 = 0;
pub const LAST_VIEW_SLIDE_VIEW: u16 = 1;
pub const LAST_VIEW_OUTLINE_VIEW: u16 = 2;
pub const LAST_VIEW_NOTES: u16 = 3;

/// A broken edit chain is usually fixed by the atom sitting this many bytes
/// before the smallest known record offset.
pub const EDIT_CHAIN_REPAIR_DISTANCE: u32 = 36;

// -------- PersistPtrHolder --------
pub const PERSIST_ID_MASK: u32 = 0x000F_FFFF;
pub const PERSIST_COUNT_SHIFT: u32 = 20;
pub const PERSIST_COUNT_MAX: u32 = 0x0FFF;

// -------- Current User stream --------
pub const CURRENT_USER_MIN_SIZE: usize = 28;
pub const CURRENT_USER_SIZE_FIELD: u32 = 20;
pub const HEADER_TOKEN_PLAIN: u32 = 0xE391_C05F;
pub const HEADER_TOKEN_ENCRYPTED: u32 = 0xF3D1_C4DF;
pub const DOC_FINAL_VERSION: u16 = 0x03F4;
pub const CURRENT_USER_MAJOR: u8 = 3;
pub const CURRENT_USER_MINOR: u8 = 0;
pub const CURRENT_USER_RELEASE: u32 = 8;
pub const CURRENT_USER_MAX_NAME: usize = 512;
pub const CU_OFF_SIZE: usize = 8;
pub const CU_OFF_TOKEN: usize = 12;
pub const CU_OFF_EDIT_OFFSET: usize = 16;
pub const CU_OFF_NAME_LEN: usize = 20;
pub const CU_OFF_DOC_VERSION: usize = 22;
pub const CU_OFF_MAJOR: usize = 24;
pub const CU_OFF_MINOR: usize = 25;
pub const CU_OFF_NAME: usize = 28;

// -------- Pictures stream --------
pub const PICTURE_PREAMBLE_SIZE: usize = 8;
pub const PICTURE_UID_SIZE: usize = 16;
/// [cbSize u32][rcBounds 16][ptSize 8][cbSave u32][compression u8][filter u8]
pub const METAFILE_HEADER_SIZE: usize = 34;
pub const METAFILE_COMPRESSION_DEFLATE: u8 = 0x00;
pub const METAFILE_COMPRESSION_NONE: u8 = 0xFE;
pub const METAFILE_FILTER_NONE: u8 = 0xFE;
pub const BITMAP_TAG: u8 = 0xFF;

/// FBSE fixed fields: btWin32, btMacOS, uid, tag, size, cRef, foDelay, usage, cbName, unused2, unused3.
pub const BSE_PARTS: [usize; 11] = [1, 1, 16, 2, 4, 4, 4, 1, 1, 1, 1];
pub const BSE_FIXED_SIZE: usize = 36;
pub const BSE_OFF_CB_NAME: usize = 33;

/// Blip instances that carry a second 16-byte uid.
pub const BLIP_DOUBLE_UID_INSTANCES: [u16; 8] =
    [0x217, 0x3D5, 0x46B, 0x543, 0x6E1, 0x6E3, 0x6E5, 0x7A9];

// -------- Encryption --------
/// Password tried when the caller did not supply one.
pub const DEFAULT_PASSWORD: &str = "VelvetSweatshop";
pub const ENCRYPTION_SALT_SIZE: usize = 16;
pub const ENCRYPTION_VERIFIER_SIZE: usize = 16;
pub const ENCRYPTION_VERIFIER_HASH_SIZE: usize = 32;
pub const ENCRYPTION_SPIN_COUNT: u32 = 10_000;
pub const ENCRYPTION_VERSION_MAJOR: u16 = 2;
pub const ENCRYPTION_VERSION_MINOR: u16 = 2;

// -------- Stream names --------
pub const STREAM_DOCUMENT: &str = "PowerPoint Document";
pub const STREAM_CURRENT_USER: &str = "Current User";
pub const STREAM_PICTURES: &str = "Pictures";
/// Main stream of the PowerPoint 4.0 format.
pub const STREAM_PP40: &str = "PP40";

// -------- Size guards (defaults, overridable via config) --------
pub const DEFAULT_MAX_RECORD_BYTES: usize = 200_000_000;
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 512 * 1024 * 1024;
