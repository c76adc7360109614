//! Content stream builder for injected placements.
//!
//! Produces the operator text of one appended content stream per page
//! (ISO 32000-1, sections 8 and 9).

use super::object_serializer::format_real;
use std::fmt::Write;

/// Operations the injector emits.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentStreamOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Concatenate matrix (cm)
    Transform(f64, f64, f64, f64, f64, f64),
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font resource and size (Tf)
    SetFont(String, f64),
    /// Move text position (Td)
    MoveText(f64, f64),
    /// Show hex-encoded CID text (Tj), already formatted as `<XXXX...>`
    ShowHexText(String),
    /// Set line width (w)
    SetLineWidth(f64),
    /// Set dash pattern (d)
    SetDashPattern(Vec<f64>, f64),
    /// Rectangle (re)
    Rectangle(f64, f64, f64, f64),
    /// Stroke (S)
    Stroke,
    /// Paint XObject (Do)
    PaintXObject(String),
}

/// Accumulates operators and renders them one per line.
#[derive(Debug, Clone, Default)]
pub struct ContentStreamBuilder {
    operations: Vec<ContentStreamOp>,
}

impl ContentStreamBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw operation.
    pub fn op(&mut self, op: ContentStreamOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Begin a text object.
    pub fn begin_text(&mut self) -> &mut Self {
        self.op(ContentStreamOp::BeginText)
    }

    /// End a text object.
    pub fn end_text(&mut self) -> &mut Self {
        self.op(ContentStreamOp::EndText)
    }

    /// Select font resource `font_name` at `size`.
    pub fn set_font(&mut self, font_name: &str, size: f64) -> &mut Self {
        self.op(ContentStreamOp::SetFont(font_name.to_string(), size))
    }

    /// Move to `(x, y)` and show a hex string.
    pub fn hex_text(&mut self, hex_string: &str, x: f64, y: f64) -> &mut Self {
        self.op(ContentStreamOp::MoveText(x, y))
            .op(ContentStreamOp::ShowHexText(hex_string.to_string()))
    }

    /// Save graphics state.
    pub fn save_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::SaveState)
    }

    /// Restore graphics state.
    pub fn restore_state(&mut self) -> &mut Self {
        self.op(ContentStreamOp::RestoreState)
    }

    /// Concatenate a transformation matrix.
    pub fn transform(&mut self, a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> &mut Self {
        self.op(ContentStreamOp::Transform(a, b, c, d, e, f))
    }

    /// Set the stroke width.
    pub fn set_line_width(&mut self, width: f64) -> &mut Self {
        self.op(ContentStreamOp::SetLineWidth(width))
    }

    /// Set a dash pattern; an empty pattern means a solid line.
    pub fn set_dash_pattern(&mut self, pattern: Vec<f64>, phase: f64) -> &mut Self {
        self.op(ContentStreamOp::SetDashPattern(pattern, phase))
    }

    /// Append a rectangle path.
    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.op(ContentStreamOp::Rectangle(x, y, width, height))
    }

    /// Stroke the current path.
    pub fn stroke(&mut self) -> &mut Self {
        self.op(ContentStreamOp::Stroke)
    }

    /// Paint image XObject `name` into the unit square scaled to
    /// `width` x `height` at `(x, y)`.
    pub fn draw_image(&mut self, name: &str, x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.save_state()
            .transform(width, 0.0, 0.0, height, x, y)
            .op(ContentStreamOp::PaintXObject(name.to_string()))
            .restore_state()
    }

    /// Whether nothing has been added.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Operations added so far.
    pub fn operations(&self) -> &[ContentStreamOp] {
        &self.operations
    }

    /// Render the operators, one per line.
    pub fn build(&self) -> Vec<u8> {
        let mut buf = String::new();
        for op in &self.operations {
            write_op(&mut buf, op);
            buf.push('\n');
        }
        buf.into_bytes()
    }
}

fn write_op(w: &mut String, op: &ContentStreamOp) {
    let n = format_real;
    // Writing to a String cannot fail.
    let _ = match op {
        ContentStreamOp::SaveState => write!(w, "q"),
        ContentStreamOp::RestoreState => write!(w, "Q"),
        ContentStreamOp::Transform(a, b, c, d, e, f) => write!(
            w,
            "{} {} {} {} {} {} cm",
            n(*a),
            n(*b),
            n(*c),
            n(*d),
            n(*e),
            n(*f)
        ),
        ContentStreamOp::BeginText => write!(w, "BT"),
        ContentStreamOp::EndText => write!(w, "ET"),
        ContentStreamOp::SetFont(name, size) => write!(w, "/{} {} Tf", name, n(*size)),
        ContentStreamOp::MoveText(tx, ty) => write!(w, "{} {} Td", n(*tx), n(*ty)),
        ContentStreamOp::ShowHexText(hex) => write!(w, "{} Tj", hex),
        ContentStreamOp::SetLineWidth(width) => write!(w, "{} w", n(*width)),
        ContentStreamOp::SetDashPattern(pattern, phase) => {
            let dashes: Vec<String> = pattern.iter().map(|v| n(*v)).collect();
            write!(w, "[{}] {} d", dashes.join(" "), n(*phase))
        },
        ContentStreamOp::Rectangle(x, y, width, height) => {
            write!(w, "{} {} {} {} re", n(*x), n(*y), n(*width), n(*height))
        },
        ContentStreamOp::Stroke => write!(w, "S"),
        ContentStreamOp::PaintXObject(name) => write!(w, "/{} Do", name),
    };
}
