//! CSS color values.

use cssparser::Parser;

use crate::error::*;
use crate::parsers::Parse;

pub use cssparser::Color;

impl Parse for cssparser::Color {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<cssparser::Color, ParseError<'i>> {
        Ok(cssparser::Color::parse(parser)?)
    }
}

impl Parse for cssparser::RGBA {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<cssparser::RGBA, ParseError<'i>> {
        let loc = parser.current_source_location();

        match cssparser::Color::parse(parser)? {
            cssparser::Color::RGBA(rgba) => Ok(rgba),
            cssparser::Color::CurrentColor => Err(loc.new_custom_error(ValueErrorKind::Value(
                "currentColor is not allowed here".to_string(),
            ))),
        }
    }
}

/// Resolves a `cssparser::Color` down to a concrete `RGBA`.
///
/// By the time paint servers and filter primitives reach pixel-level code, `currentColor`
/// must already have been substituted by the cascade (see `properties::ComputedValues`'s
/// `color` property); this is just the last mile from "resolved color value" to the RGBA
/// tuple that the rendering backend wants.
pub fn color_to_rgba(color: &cssparser::Color) -> cssparser::RGBA {
    match *color {
        cssparser::Color::RGBA(rgba) => rgba,
        cssparser::Color::CurrentColor => {
            unreachable!("currentColor must be resolved by the cascade before painting")
        }
    }
}
