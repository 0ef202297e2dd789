use serde::Serialize;

use crate::consts::ESCHER_BLIP_FIRST;

/// Picture formats of the blip store. Native ids are offsets from 0xF018.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PictureType {
    Emf,
    Wmf,
    Pict,
    Jpeg,
    Png,
    Dib,
    Tiff,
    CmykJpeg,
}

impl PictureType {
    pub const ALL: [PictureType; 8] = [
        PictureType::Emf,
        PictureType::Wmf,
        PictureType::Pict,
        PictureType::Jpeg,
        PictureType::Png,
        PictureType::Dib,
        PictureType::Tiff,
        PictureType::CmykJpeg,
    ];

    pub fn native_id(self) -> u8 {
        match self {
            PictureType::Emf => 0x02,
            PictureType::Wmf => 0x03,
            PictureType::Pict => 0x04,
            PictureType::Jpeg => 0x05,
            PictureType::Png => 0x06,
            PictureType::Dib => 0x07,
            PictureType::Tiff => 0x11,
            PictureType::CmykJpeg => 0x12,
        }
    }

    pub fn from_native_id(id: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.native_id() as u16 == id)
    }

    /// Blip record type carried in the picture preamble.
    pub fn rec_type(self) -> u16 {
        ESCHER_BLIP_FIRST + self.native_id() as u16
    }

    pub fn from_rec_type(rec_type: u16) -> Option<Self> {
        rec_type
            .checked_sub(ESCHER_BLIP_FIRST)
            .and_then(Self::from_native_id)
    }

    /// Instance written for new pictures (single uid).
    pub fn default_instance(self) -> u16 {
        match self {
            PictureType::Emf => 0x3D4,
            PictureType::Wmf => 0x216,
            PictureType::Pict => 0x542,
            PictureType::Jpeg => 0x46A,
            PictureType::Png => 0x6E0,
            PictureType::Dib => 0x7A8,
            PictureType::Tiff => 0x6E4,
            PictureType::CmykJpeg => 0x6E2,
        }
    }

    /// Metafiles carry a 34-byte header and a deflated body; bitmaps a 1-byte tag.
    pub fn is_metafile(self) -> bool {
        matches!(self, PictureType::Emf | PictureType::Wmf | PictureType::Pict)
    }

    pub fn extension(self) -> &'static str {
        match self {
            PictureType::Emf => "emf",
            PictureType::Wmf => "wmf",
            PictureType::Pict => "pict",
            PictureType::Jpeg | PictureType::CmykJpeg => "jpeg",
            PictureType::Png => "png",
            PictureType::Dib => "dib",
            PictureType::Tiff => "tiff",
        }
    }

    /// Parse a user-supplied name ("png", "jpg", "emf", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "emf" => Some(PictureType::Emf),
            "wmf" => Some(PictureType::Wmf),
            "pict" | "pct" => Some(PictureType::Pict),
            "jpeg" | "jpg" => Some(PictureType::Jpeg),
            "png" => Some(PictureType::Png),
            "dib" | "bmp" => Some(PictureType::Dib),
            "tiff" | "tif" => Some(PictureType::Tiff),
            "cmykjpeg" => Some(PictureType::CmykJpeg),
            _ => None,
        }
    }
}
