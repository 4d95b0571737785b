// Component tags: the stable numeric identity of each column kind.
//
// Module overview: a component's tag is what survives on disk, so tag
// codes are append-only and never reused. Codes this build does not
// recognize decode as `Unknown` and keep their payload bytes intact,
// which lets an older build carry a newer world through a load/flush
// cycle without shedding data.

/// Byte length of a `Position` row: a 4x4 matrix of `f32`, little-endian.
pub const POSITION_LEN: usize = 64;

/// Byte length of a `CharacterState` row: velocity as 3x`f32` followed by
/// an orientation quaternion as 4x`f32`, little-endian.
pub const CHARACTER_STATE_LEN: usize = 28;

/// Identity of a component column.
///
/// **Critical constraint: codes are append-only.** Every tag keeps its
/// numeric code forever; retiring a component means its code is never
/// assigned again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentTag {
    /// Local transform within the owning graph node.
    Position,
    /// Display name, UTF-8, variable length.
    Name,
    /// Movement state for player characters.
    CharacterState,
    /// A tag minted by a build newer than this one. Payload is opaque.
    /// Construct through `from_code`; the named variants own codes 0..3,
    /// so a well-formed `Unknown` always carries a code of 3 or higher.
    Unknown(u16),
}

/// Row layout of a component column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentLayout {
    /// Every row is exactly this many bytes.
    Fixed(usize),
    /// Rows carry their own length.
    Variable,
}

impl ComponentTag {
    /// Numeric code as written to disk.
    pub fn code(self) -> u16 {
        match self {
            ComponentTag::Position => 0,
            ComponentTag::Name => 1,
            ComponentTag::CharacterState => 2,
            ComponentTag::Unknown(code) => code,
        }
    }

    /// Maps a wire code back to a tag.
    ///
    /// Known codes always produce the named variant, so `Unknown` never
    /// shadows a tag this build understands.
    pub fn from_code(code: u16) -> ComponentTag {
        match code {
            0 => ComponentTag::Position,
            1 => ComponentTag::Name,
            2 => ComponentTag::CharacterState,
            other => ComponentTag::Unknown(other),
        }
    }

    /// Row layout for this tag. Unknown tags are variable by definition since
    /// their payloads are opaque.
    pub fn layout(self) -> ComponentLayout {
        match self {
            ComponentTag::Position => ComponentLayout::Fixed(POSITION_LEN),
            ComponentTag::Name => ComponentLayout::Variable,
            ComponentTag::CharacterState => ComponentLayout::Fixed(CHARACTER_STATE_LEN),
            ComponentTag::Unknown(_) => ComponentLayout::Variable,
        }
    }

    /// True for tags this build has a layout and meaning for.
    pub fn is_known(self) -> bool {
        !matches!(self, ComponentTag::Unknown(_))
    }
}
