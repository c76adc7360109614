//! Placement requests queued by the editor and applied at save.

use bitflags::bitflags;

bitflags! {
    /// Anchor of injected text within its rectangle.
    ///
    /// At most one horizontal (`LEFT`, `CENTER`, `RIGHT`) and one vertical
    /// (`TOP`, `MIDDLE`, `BOTTOM`) flag is honored. When several are set,
    /// `RIGHT` beats `CENTER` beats `LEFT`, and `BOTTOM` beats `MIDDLE`
    /// beats `TOP`. No flag on an axis means `LEFT` / `TOP`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Alignment: u32 {
        /// Bottom edge
        const BOTTOM = 0b000001;
        /// Right edge
        const RIGHT = 0b000010;
        /// Top edge
        const TOP = 0b000100;
        /// Left edge
        const LEFT = 0b001000;
        /// Horizontal center
        const CENTER = 0b010000;
        /// Vertical middle
        const MIDDLE = 0b100000;
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::LEFT | Alignment::TOP
    }
}

/// Resolved horizontal anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizontal {
    /// Text starts at the left edge
    Left,
    /// Text is centered
    Center,
    /// Text ends at the right edge
    Right,
}

/// Resolved vertical anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vertical {
    /// Ascent touches the top edge
    Top,
    /// Glyph box centered
    Middle,
    /// Descent touches the bottom edge
    Bottom,
}

impl Alignment {
    /// The honored horizontal flag.
    pub fn horizontal(self) -> Horizontal {
        if self.contains(Alignment::RIGHT) {
            Horizontal::Right
        } else if self.contains(Alignment::CENTER) {
            Horizontal::Center
        } else {
            Horizontal::Left
        }
    }

    /// The honored vertical flag.
    pub fn vertical(self) -> Vertical {
        if self.contains(Alignment::BOTTOM) {
            Vertical::Bottom
        } else if self.contains(Alignment::MIDDLE) {
            Vertical::Middle
        } else {
            Vertical::Top
        }
    }
}

/// Key of a registered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageHandle(pub(crate) usize);

impl ImageHandle {
    /// Registration index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Rectangle in caller space: origin top-left, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge, measured from the top of the page
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl Rect {
    /// Create a rectangle.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bottom edge in PDF space for a page of `reference_height`.
    pub fn pdf_bottom(&self, reference_height: f64) -> f64 {
        reference_height - self.y - self.height
    }

    /// Top edge in PDF space for a page of `reference_height`.
    pub fn pdf_top(&self, reference_height: f64) -> f64 {
        reference_height - self.y
    }
}

/// Text style captured when the text was inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Registered font name
    pub font: String,
    /// Size in points
    pub size: f64,
    /// Draw a dotted hairline around the rectangle
    pub show_border: bool,
}

/// One queued injection.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementRequest {
    /// Text drawn with a registered font
    Text {
        /// 1-based page number
        page: usize,
        /// Target rectangle
        rect: Rect,
        /// Anchor within the rectangle
        alignment: Alignment,
        /// The text
        text: String,
        /// Style snapshot
        style: TextStyle,
    },
    /// Image scaled to fill the rectangle
    Image {
        /// 1-based page number
        page: usize,
        /// Target rectangle
        rect: Rect,
        /// Registered image
        image: ImageHandle,
    },
}

impl PlacementRequest {
    /// 1-based page number.
    pub fn page(&self) -> usize {
        match self {
            PlacementRequest::Text { page, .. } | PlacementRequest::Image { page, .. } => *page,
        }
    }
}
