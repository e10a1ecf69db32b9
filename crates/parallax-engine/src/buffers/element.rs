use bytemuck::Pod;

/// Numeric element kind stored in a buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ElementKind {
    F32,
    U16,
    U32,
}

impl ElementKind {
    #[inline]
    pub fn byte_size(self) -> usize {
        match self {
            ElementKind::F32 | ElementKind::U32 => 4,
            ElementKind::U16 => 2,
        }
    }
}

/// Element types a [`super::BufferAttribute`] can hold.
pub trait Element: Pod + Default + PartialEq + std::fmt::Debug {
    const KIND: ElementKind;

    /// Widening conversion used when re-basing index values.
    fn to_u32(self) -> u32;

    /// Narrowing conversion; `None` when the value does not fit.
    fn from_u32(v: u32) -> Option<Self>;
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;

    fn to_u32(self) -> u32 {
        self as u32
    }

    fn from_u32(v: u32) -> Option<Self> {
        Some(v as f32)
    }
}

impl Element for u16 {
    const KIND: ElementKind = ElementKind::U16;

    fn to_u32(self) -> u32 {
        self as u32
    }

    fn from_u32(v: u32) -> Option<Self> {
        u16::try_from(v).ok()
    }
}

impl Element for u32 {
    const KIND: ElementKind = ElementKind::U32;

    fn to_u32(self) -> u32 {
        self
    }

    fn from_u32(v: u32) -> Option<Self> {
        Some(v)
    }
}
