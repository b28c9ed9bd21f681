//! X11 protocol requests
//!
//! Core request opcodes handled by the server. Extension requests use
//! opcodes handed out by the extension registry and are not listed here.

/// X11 request opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestOpcode {
    CreateWindow = 1,
    ChangeWindowAttributes = 2,
    GetWindowAttributes = 3,
    DestroyWindow = 4,
    DestroySubwindows = 5,
    ReparentWindow = 7,
    MapWindow = 8,
    MapSubwindows = 9,
    UnmapWindow = 10,
    UnmapSubwindows = 11,
    ConfigureWindow = 12,
    GetGeometry = 14,
    QueryTree = 15,
    InternAtom = 16,
    GetAtomName = 17,
    ChangeProperty = 18,
    DeleteProperty = 19,
    GetProperty = 20,
    ListProperties = 21,
    SetSelectionOwner = 22,
    GetSelectionOwner = 23,
    ConvertSelection = 24,
    QueryPointer = 38,
    SetInputFocus = 42,
    GetInputFocus = 43,
    OpenFont = 45,
    CloseFont = 46,
    QueryFont = 47,
    QueryTextExtents = 48,
    ListFonts = 49,
    ListFontsWithInfo = 50,
    GetFontPath = 52,
    CreatePixmap = 53,
    FreePixmap = 54,
    CreateGC = 55,
    ChangeGC = 56,
    CopyGC = 57,
    SetClipRectangles = 59,
    FreeGC = 60,
    ClearArea = 61,
    CopyArea = 62,
    CopyPlane = 63,
    PolyPoint = 64,
    PolyLine = 65,
    PolySegment = 66,
    PolyRectangle = 67,
    FillPoly = 69,
    PolyFillRectangle = 70,
    PutImage = 72,
    GetImage = 73,
    PolyText8 = 74,
    PolyText16 = 75,
    ImageText8 = 76,
    ImageText16 = 77,
    CreateColormap = 78,
    FreeColormap = 79,
    AllocColor = 84,
    AllocNamedColor = 85,
    QueryColors = 91,
    LookupColor = 92,
    QueryBestSize = 97,
    QueryExtension = 98,
    ListExtensions = 99,
    GetKeyboardMapping = 101,
    GetModifierMapping = 119,
    NoOperation = 127,
}

impl RequestOpcode {
    pub const ALL: [RequestOpcode; 66] = [
        RequestOpcode::CreateWindow,
        RequestOpcode::ChangeWindowAttributes,
        RequestOpcode::GetWindowAttributes,
        RequestOpcode::DestroyWindow,
        RequestOpcode::DestroySubwindows,
        RequestOpcode::ReparentWindow,
        RequestOpcode::MapWindow,
        RequestOpcode::MapSubwindows,
        RequestOpcode::UnmapWindow,
        RequestOpcode::UnmapSubwindows,
        RequestOpcode::ConfigureWindow,
        RequestOpcode::GetGeometry,
        RequestOpcode::QueryTree,
        RequestOpcode::InternAtom,
        RequestOpcode::GetAtomName,
        RequestOpcode::ChangeProperty,
        RequestOpcode::DeleteProperty,
        RequestOpcode::GetProperty,
        RequestOpcode::ListProperties,
        RequestOpcode::SetSelectionOwner,
        RequestOpcode::GetSelectionOwner,
        RequestOpcode::ConvertSelection,
        RequestOpcode::QueryPointer,
        RequestOpcode::SetInputFocus,
        RequestOpcode::GetInputFocus,
        RequestOpcode::OpenFont,
        RequestOpcode::CloseFont,
        RequestOpcode::QueryFont,
        RequestOpcode::QueryTextExtents,
        RequestOpcode::ListFonts,
        RequestOpcode::ListFontsWithInfo,
        RequestOpcode::GetFontPath,
        RequestOpcode::CreatePixmap,
        RequestOpcode::FreePixmap,
        RequestOpcode::CreateGC,
        RequestOpcode::ChangeGC,
        RequestOpcode::CopyGC,
        RequestOpcode::SetClipRectangles,
        RequestOpcode::FreeGC,
        RequestOpcode::ClearArea,
        RequestOpcode::CopyArea,
        RequestOpcode::CopyPlane,
        RequestOpcode::PolyPoint,
        RequestOpcode::PolyLine,
        RequestOpcode::PolySegment,
        RequestOpcode::PolyRectangle,
        RequestOpcode::FillPoly,
        RequestOpcode::PolyFillRectangle,
        RequestOpcode::PutImage,
        RequestOpcode::GetImage,
        RequestOpcode::PolyText8,
        RequestOpcode::PolyText16,
        RequestOpcode::ImageText8,
        RequestOpcode::ImageText16,
        RequestOpcode::CreateColormap,
        RequestOpcode::FreeColormap,
        RequestOpcode::AllocColor,
        RequestOpcode::AllocNamedColor,
        RequestOpcode::QueryColors,
        RequestOpcode::LookupColor,
        RequestOpcode::QueryBestSize,
        RequestOpcode::QueryExtension,
        RequestOpcode::ListExtensions,
        RequestOpcode::GetKeyboardMapping,
        RequestOpcode::GetModifierMapping,
        RequestOpcode::NoOperation,
    ];

    pub fn from_u8(opcode: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u8 == opcode)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOpcode::CreateWindow => "CreateWindow",
            RequestOpcode::ChangeWindowAttributes => "ChangeWindowAttributes",
            RequestOpcode::GetWindowAttributes => "GetWindowAttributes",
            RequestOpcode::DestroyWindow => "DestroyWindow",
            RequestOpcode::DestroySubwindows => "DestroySubwindows",
            RequestOpcode::ReparentWindow => "ReparentWindow",
            RequestOpcode::MapWindow => "MapWindow",
            RequestOpcode::MapSubwindows => "MapSubwindows",
            RequestOpcode::UnmapWindow => "UnmapWindow",
            RequestOpcode::UnmapSubwindows => "UnmapSubwindows",
            RequestOpcode::ConfigureWindow => "ConfigureWindow",
            RequestOpcode::GetGeometry => "GetGeometry",
            RequestOpcode::QueryTree => "QueryTree",
            RequestOpcode::InternAtom => "InternAtom",
            RequestOpcode::GetAtomName => "GetAtomName",
            RequestOpcode::ChangeProperty => "ChangeProperty",
            RequestOpcode::DeleteProperty => "DeleteProperty",
            RequestOpcode::GetProperty => "GetProperty",
            RequestOpcode::ListProperties => "ListProperties",
            RequestOpcode::SetSelectionOwner => "SetSelectionOwner",
            RequestOpcode::GetSelectionOwner => "GetSelectionOwner",
            RequestOpcode::ConvertSelection => "ConvertSelection",
            RequestOpcode::QueryPointer => "QueryPointer",
            RequestOpcode::SetInputFocus => "SetInputFocus",
            RequestOpcode::GetInputFocus => "GetInputFocus",
            RequestOpcode::OpenFont => "OpenFont",
            RequestOpcode::CloseFont => "CloseFont",
            RequestOpcode::QueryFont => "QueryFont",
            RequestOpcode::QueryTextExtents => "QueryTextExtents",
            RequestOpcode::ListFonts => "ListFonts",
            RequestOpcode::ListFontsWithInfo => "ListFontsWithInfo",
            RequestOpcode::GetFontPath => "GetFontPath",
            RequestOpcode::CreatePixmap => "CreatePixmap",
            RequestOpcode::FreePixmap => "FreePixmap",
            RequestOpcode::CreateGC => "CreateGC",
            RequestOpcode::ChangeGC => "ChangeGC",
            RequestOpcode::CopyGC => "CopyGC",
            RequestOpcode::SetClipRectangles => "SetClipRectangles",
            RequestOpcode::FreeGC => "FreeGC",
            RequestOpcode::ClearArea => "ClearArea",
            RequestOpcode::CopyArea => "CopyArea",
            RequestOpcode::CopyPlane => "CopyPlane",
            RequestOpcode::PolyPoint => "PolyPoint",
            RequestOpcode::PolyLine => "PolyLine",
            RequestOpcode::PolySegment => "PolySegment",
            RequestOpcode::PolyRectangle => "PolyRectangle",
            RequestOpcode::FillPoly => "FillPoly",
            RequestOpcode::PolyFillRectangle => "PolyFillRectangle",
            RequestOpcode::PutImage => "PutImage",
            RequestOpcode::GetImage => "GetImage",
            RequestOpcode::PolyText8 => "PolyText8",
            RequestOpcode::PolyText16 => "PolyText16",
            RequestOpcode::ImageText8 => "ImageText8",
            RequestOpcode::ImageText16 => "ImageText16",
            RequestOpcode::CreateColormap => "CreateColormap",
            RequestOpcode::FreeColormap => "FreeColormap",
            RequestOpcode::AllocColor => "AllocColor",
            RequestOpcode::AllocNamedColor => "AllocNamedColor",
            RequestOpcode::QueryColors => "QueryColors",
            RequestOpcode::LookupColor => "LookupColor",
            RequestOpcode::QueryBestSize => "QueryBestSize",
            RequestOpcode::QueryExtension => "QueryExtension",
            RequestOpcode::ListExtensions => "ListExtensions",
            RequestOpcode::GetKeyboardMapping => "GetKeyboardMapping",
            RequestOpcode::GetModifierMapping => "GetModifierMapping",
            RequestOpcode::NoOperation => "NoOperation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_matches_discriminant() {
        for op in RequestOpcode::ALL {
            assert_eq!(RequestOpcode::from_u8(op as u8), Some(op));
        }
        assert_eq!(RequestOpcode::from_u8(6), None);
        assert_eq!(RequestOpcode::from_u8(128), None);
    }
}
