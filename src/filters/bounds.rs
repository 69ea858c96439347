//! Filter primitive subregion computation.
use crate::rect::{IRect, Rect};
use crate::transform::Transform;

use super::context::{FilterContext, FilterInput};

/// A helper type for filter primitive subregion computation.
///
/// The primitive's `x`/`y`/`width`/`height` are already normalized to user-space units by the
/// time this is built (`UserSpacePrimitive::get_bounds()`), so no further coordinate-system
/// lookups are needed here.
#[derive(Clone, Copy)]
pub struct BoundsBuilder<'a> {
    /// The filter context.
    ctx: &'a FilterContext,

    /// The transform to use when generating the rect.
    transform: Transform,

    /// The inverse transform used when adding rects.
    inverse: Transform,

    /// The current bounding rectangle.
    rect: Option<Rect>,

    /// Whether one of the input nodes is standard input.
    standard_input_was_referenced: bool,

    /// Filter primitive subregion, already normalized to user-space units.
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

/// The result of [`BoundsBuilder::compute`].
#[derive(Debug, Clone, Copy)]
pub struct ComputedBounds {
    /// The exact bounds, in the paffine-transformed surface coordinate system.
    pub unclipped: Rect,

    /// The bounds clipped to the filter's effects region, in pixels.
    pub clipped: IRect,
}

impl<'a> BoundsBuilder<'a> {
    /// Constructs a new `BoundsBuilder`.
    ///
    /// `x`, `y`, `width`, `height` are the filter primitive subregion properties, already
    /// normalized to user-space units (see `UserSpacePrimitive`).
    #[inline]
    pub fn new(
        ctx: &'a FilterContext,
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    ) -> Self {
        // FIXME: we panic if paffine is not invertible... do we need to check here?
        Self {
            ctx,
            transform: ctx.paffine(),
            inverse: ctx.paffine().invert().unwrap(),
            rect: None,
            standard_input_was_referenced: false,
            x,
            y,
            width,
            height,
        }
    }

    /// Adds a filter primitive input to the bounding box.
    #[inline]
    pub fn add_input(mut self, input: &FilterInput) -> Self {
        // If a standard input was referenced, the default value is the filter effects region
        // regardless of other referenced inputs. This means we can skip computing the bounds.
        if self.standard_input_was_referenced {
            return self;
        }

        match *input {
            FilterInput::StandardInput(_) => {
                self.standard_input_was_referenced = true;
            }
            FilterInput::PrimitiveOutput(ref output) => {
                let input_rect = self.inverse.transform_rect(&Rect::from(output.bounds));
                self.rect = Some(self.rect.map_or(input_rect, |r| input_rect.union(&r)));
            }
        }

        self
    }

    /// Computes the final bounds, both unclipped (in the paffine coordinate system) and clipped
    /// to the filter's effects region (in pixels).
    pub fn compute(self, ctx: &FilterContext) -> ComputedBounds {
        // The default value is the filter effects region converted into
        // the paffine coordinate system.
        let mut rect = match self.rect {
            Some(r) if !self.standard_input_was_referenced => r,
            _ => self.inverse.transform_rect(&ctx.effects_region()),
        };

        // If any of the properties were specified, we need to respect them. These replacements
        // are possible because of the paffine coordinate system.
        if let Some(x) = self.x {
            let w = rect.width();
            rect.x0 = x;
            rect.x1 = rect.x0 + w;
        }
        if let Some(y) = self.y {
            let h = rect.height();
            rect.y0 = y;
            rect.y1 = rect.y0 + h;
        }
        if let Some(width) = self.width {
            rect.x1 = rect.x0 + width;
        }
        if let Some(height) = self.height {
            rect.y1 = rect.y0 + height;
        }

        // Convert into the surface coordinate system.
        let unclipped = self.transform.transform_rect(&rect);
        let clipped = unclipped
            .intersection(&ctx.effects_region())
            .unwrap_or_default();

        ComputedBounds {
            unclipped,
            clipped: clipped.into(),
        }
    }
}
