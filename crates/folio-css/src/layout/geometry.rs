//! Used widths, heights and margins.
//!
//! [CSS 2.1 § 10 Visual formatting model details](https://www.w3.org/TR/CSS2/visudet.html)
//!
//! Everything here works on the flow-relative axes of the box: the "width"
//! equations of § 10.3 apply to the inline axis and the "height" rules of
//! § 10.6 to the block axis, whatever the writing mode.

use crate::style::{
    AutoLength, BoxSizing, ComputedStyle, LengthPercentage, LogicalSide, PhysicalSide,
};

use super::box_model::{EdgeSizes, border_edges};

/// How an `auto` inline size is resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InlineSizing {
    /// [§ 10.3.3](https://www.w3.org/TR/CSS2/visudet.html#blockwidth):
    /// fill the containing block.
    Stretch,
    /// [§ 10.3.5](https://www.w3.org/TR/CSS2/visudet.html#float-width):
    /// "min(max(preferred minimum width, available width), preferred width)".
    ShrinkToFit {
        /// Preferred minimum content width.
        min_content: f32,
        /// Preferred content width.
        max_content: f32,
    },
}

/// Used box geometry, flow-relative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsedGeometry {
    /// Used margins.
    pub margin: EdgeSizes,
    /// Used border widths.
    pub border: EdgeSizes,
    /// Used padding.
    pub padding: EdgeSizes,
    /// Content inline size.
    pub inline_size: f32,
    /// Content block size when it is definite.
    pub block_size: Option<f32>,
    /// `min-block-size` as a content size.
    pub min_block_size: f32,
    /// `max-block-size` as a content size.
    pub max_block_size: Option<f32>,
}

impl UsedGeometry {
    /// Inline size of the margin box.
    #[must_use]
    pub fn outer_inline_size(&self) -> f32 {
        self.inline_size + self.margin.inline_sum() + self.border.inline_sum() + self.padding.inline_sum()
    }

    /// Block-start edges above the content: margin, border, padding.
    #[must_use]
    pub fn block_start_edges(&self) -> f32 {
        self.margin.block_start + self.border.block_start + self.padding.block_start
    }

    /// Border and padding below the content.
    #[must_use]
    pub fn block_end_decoration(&self) -> f32 {
        self.border.block_end + self.padding.block_end
    }

    /// [§ 10.7 Minimum and maximum heights](https://www.w3.org/TR/CSS2/visudet.html#min-max-heights)
    ///
    /// Used content block size for content that measured `content`.
    #[must_use]
    pub fn clamp_block(&self, content: f32) -> f32 {
        let size = self.block_size.unwrap_or(content);
        let size = self.max_block_size.map_or(size, |max| size.min(max));
        size.max(self.min_block_size).max(0.0)
    }
}

/// `width`/`height` and their min/max counterparts along one logical axis.
struct AxisProperties {
    size: AutoLength,
    min: LengthPercentage,
    max: Option<LengthPercentage>,
}

fn axis(style: &ComputedStyle, inline: bool) -> AxisProperties {
    // The inline axis is horizontal unless the writing mode is vertical.
    if inline != style.writing_mode.is_vertical() {
        AxisProperties {
            size: style.width,
            min: style.min_width,
            max: style.max_width,
        }
    } else {
        AxisProperties {
            size: style.height,
            min: style.min_height,
            max: style.max_height,
        }
    }
}

fn logical_margin(style: &ComputedStyle, side: LogicalSide, basis: f32) -> Option<f32> {
    style.margin[style.physical(side).index()].resolve(basis)
}

/// Padding resolves percentages against the containing block's inline size.
fn padding_edges(style: &ComputedStyle, basis: f32) -> EdgeSizes {
    let sides = PhysicalSide::ALL.map(|side| style.padding[side.index()].resolve(basis).max(0.0));
    EdgeSizes::from_physical(style, sides)
}

/// Convert a specified size to a content size under `box-sizing`.
fn content_size(style: &ComputedStyle, specified: f32, decoration: f32) -> f32 {
    match style.box_sizing {
        BoxSizing::ContentBox => specified,
        BoxSizing::BorderBox => specified - decoration,
    }
    .max(0.0)
}

/// [§ 10.3.3 Block-level, non-replaced elements in normal flow](https://www.w3.org/TR/CSS2/visudet.html#blockwidth)
///
/// "'margin-left' + 'border-left-width' + 'padding-left' + 'width' +
/// 'padding-right' + 'border-right-width' + 'margin-right' = width of
/// containing block"
///
/// Returns `(content, margin_start, margin_end)`.
fn solve_inline(
    containing: f32,
    decoration: f32,
    size: Option<f32>,
    margin_start: Option<f32>,
    margin_end: Option<f32>,
    sizing: InlineSizing,
) -> (f32, f32, f32) {
    let Some(size) = size else {
        // "If 'width' is set to 'auto', any other 'auto' values become '0'
        // and 'width' follows from the resulting equality."
        let start = margin_start.unwrap_or(0.0);
        let end = margin_end.unwrap_or(0.0);
        let available = (containing - decoration - start - end).max(0.0);
        let content = match sizing {
            InlineSizing::Stretch => available,
            InlineSizing::ShrinkToFit {
                min_content,
                max_content,
            } => min_content.max(available).min(max_content),
        };
        return (content, start, end);
    };

    // [§ 10.3.5 Floating, non-replaced elements](https://www.w3.org/TR/CSS2/visudet.html#float-width):
    // a float's width is never stretched to fill the line, so its margins
    // keep their computed values.
    if matches!(sizing, InlineSizing::ShrinkToFit { .. }) {
        return (size, margin_start.unwrap_or(0.0), margin_end.unwrap_or(0.0));
    }

    let used = size + decoration;
    // "If 'width' is not 'auto' and ... is larger than the width of the
    // containing block, then any 'auto' values for 'margin-left' or
    // 'margin-right' are, for the following rules, treated as zero."
    let too_wide = used + margin_start.unwrap_or(0.0) + margin_end.unwrap_or(0.0) > containing;
    let (margin_start, margin_end) = if too_wide {
        (margin_start.or(Some(0.0)), margin_end.or(Some(0.0)))
    } else {
        (margin_start, margin_end)
    };
    match (margin_start, margin_end) {
        // "If all of the above have a computed value other than 'auto', the
        // values are said to be 'over-constrained' and one of the used values
        // will have to be different from its computed value." The inline-end
        // margin gives way.
        (Some(start), Some(_)) => (size, start, containing - used - start),
        // "If there is exactly one value specified as 'auto', its used value
        // follows from the equality."
        (None, Some(end)) => (size, containing - used - end, end),
        (Some(start), None) => (size, start, containing - used - start),
        // "If both 'margin-left' and 'margin-right' are 'auto', their used
        // values are equal."
        (None, None) => {
            let half = (containing - used) / 2.0;
            (size, half, half)
        }
    }
}

/// Resolve the geometry of a block-level box or float against a containing
/// block of `containing_inline × containing_block`.
///
/// [§ 10.4 Minimum and maximum widths](https://www.w3.org/TR/CSS2/visudet.html#min-max-widths):
/// the tentative width is clamped and the equation solved again, once for
/// `max-width` and once for `min-width`.
#[must_use]
pub fn resolve_block_geometry(
    style: &ComputedStyle,
    containing_inline: f32,
    containing_block: Option<f32>,
    sizing: InlineSizing,
) -> UsedGeometry {
    let containing_inline = containing_inline.max(0.0);
    let border = border_edges(style);
    let padding = padding_edges(style, containing_inline);
    let inline_decoration = border.inline_sum() + padding.inline_sum();
    let block_decoration = border.block_sum() + padding.block_sum();

    let inline_props = axis(style, true);
    let margin_start = logical_margin(style, LogicalSide::InlineStart, containing_inline);
    let margin_end = logical_margin(style, LogicalSide::InlineEnd, containing_inline);
    let floated = matches!(sizing, InlineSizing::ShrinkToFit { .. });
    // Auto margins of floats are zero (§ 10.3.5).
    let (margin_start, margin_end) = if floated {
        (margin_start.or(Some(0.0)), margin_end.or(Some(0.0)))
    } else {
        (margin_start, margin_end)
    };

    let specified = inline_props
        .size
        .resolve(containing_inline)
        .map(|s| content_size(style, s, inline_decoration));
    let solve = |size: Option<f32>| {
        solve_inline(containing_inline, inline_decoration, size, margin_start, margin_end, sizing)
    };
    let mut solved = solve(specified);
    if let Some(max) = inline_props.max.map(|m| content_size(style, m.resolve(containing_inline), inline_decoration))
        && solved.0 > max
    {
        solved = solve(Some(max));
    }
    let min = content_size(style, inline_props.min.resolve(containing_inline), inline_decoration);
    if solved.0 < min {
        solved = solve(Some(min));
    }
    let (inline_size, start, end) = solved;

    // [§ 10.6.3](https://www.w3.org/TR/CSS2/visudet.html#normal-block): a
    // percentage height against an indefinite containing block is `auto`.
    let block_props = axis(style, false);
    let resolve_block = |length: LengthPercentage| match (length, containing_block) {
        (LengthPercentage::Percent(_), None) => None,
        (length, basis) => Some(length.resolve(basis.unwrap_or(0.0))),
    };
    let block_size = match block_props.size {
        AutoLength::Auto => None,
        AutoLength::Length(length) => resolve_block(length),
    }
    .map(|s| content_size(style, s, block_decoration));
    let min_block_size = resolve_block(block_props.min)
        .map_or(0.0, |s| content_size(style, s, block_decoration));
    let max_block_size = block_props
        .max
        .and_then(resolve_block)
        .map(|s| content_size(style, s, block_decoration));

    // Vertical margins of block boxes: auto is zero (§ 10.6.3).
    let margin = EdgeSizes {
        block_start: logical_margin(style, LogicalSide::BlockStart, containing_inline).unwrap_or(0.0),
        block_end: logical_margin(style, LogicalSide::BlockEnd, containing_inline).unwrap_or(0.0),
        inline_start: start,
        inline_end: end,
    };

    UsedGeometry {
        margin,
        border,
        padding,
        inline_size: inline_size.max(0.0),
        block_size: block_size.map(|s| s.max(0.0)),
        min_block_size,
        max_block_size,
    }
}

/// [§ 10.3.2 Inline, replaced elements](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-width)
/// and [§ 10.6.2](https://www.w3.org/TR/CSS2/visudet.html#inline-replaced-height).
///
/// `intrinsic` is `(inline, block)`. Missing dimensions follow the intrinsic
/// ratio; the result is then clamped by min/max in both axes.
#[must_use]
pub fn resolve_replaced_geometry(
    style: &ComputedStyle,
    containing_inline: f32,
    containing_block: Option<f32>,
    intrinsic: (f32, f32),
) -> UsedGeometry {
    let mut used = resolve_block_geometry(
        style,
        containing_inline,
        containing_block,
        InlineSizing::ShrinkToFit {
            min_content: 0.0,
            max_content: f32::MAX,
        },
    );
    let inline_props = axis(style, true);
    let inline_decoration = used.border.inline_sum() + used.padding.inline_sum();
    let specified_inline = inline_props
        .size
        .resolve(containing_inline)
        .map(|s| content_size(style, s, inline_decoration));
    let (iw, ih) = intrinsic;
    let ratio = if ih > 0.0 { iw / ih } else { 0.0 };
    let (inline, block) = match (specified_inline, used.block_size) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, if ratio > 0.0 { w / ratio } else { ih }),
        (None, Some(h)) => (if ratio > 0.0 { h * ratio } else { iw }, h),
        (None, None) => (iw, ih),
    };
    let max_inline = inline_props
        .max
        .map(|m| content_size(style, m.resolve(containing_inline), inline_decoration));
    let min_inline = content_size(style, inline_props.min.resolve(containing_inline), inline_decoration);
    let mut inline_size = max_inline.map_or(inline, |max| inline.min(max)).max(min_inline);
    let mut block_size = used.clamp_block(block);
    // Keep the ratio when only one axis was clamped and the other was derived.
    if specified_inline.is_none() && used.block_size.is_none() && ratio > 0.0 {
        if (inline_size - inline).abs() > f32::EPSILON {
            block_size = used.clamp_block(inline_size / ratio);
        } else if (block_size - block).abs() > f32::EPSILON {
            inline_size = max_inline.map_or(block_size * ratio, |max| (block_size * ratio).min(max));
        }
    }
    used.inline_size = inline_size.max(0.0);
    used.block_size = Some(block_size.max(0.0));
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{BorderStyle, WritingMode};

    fn style() -> ComputedStyle {
        ComputedStyle::default()
    }

    #[test]
    fn test_auto_width_fills_containing_block() {
        let mut s = style();
        s.padding = [LengthPercentage::Px(10.0); 4];
        s.margin = [AutoLength::Length(LengthPercentage::Px(5.0)); 4];
        let used = resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch);
        assert!((used.inline_size - 270.0).abs() < 1e-3);
        assert!((used.outer_inline_size() - 300.0).abs() < 1e-3);
    }

    #[test]
    fn test_auto_margins_center() {
        let mut s = style();
        s.width = AutoLength::Length(LengthPercentage::Px(100.0));
        s.margin[PhysicalSide::Left.index()] = AutoLength::Auto;
        s.margin[PhysicalSide::Right.index()] = AutoLength::Auto;
        let used = resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch);
        assert!((used.margin.inline_start - 100.0).abs() < 1e-3);
        assert!((used.margin.inline_end - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_over_constrained_gives_way_on_inline_end() {
        let mut s = style();
        s.width = AutoLength::Length(LengthPercentage::Px(100.0));
        s.margin = [AutoLength::Length(LengthPercentage::Px(20.0)); 4];
        let used = resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch);
        assert!((used.margin.inline_start - 20.0).abs() < 1e-3);
        assert!((used.margin.inline_end - 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_fixed_width_float_keeps_its_margins() {
        let mut s = style();
        s.width = AutoLength::Length(LengthPercentage::Px(100.0));
        let sizing = InlineSizing::ShrinkToFit {
            min_content: 0.0,
            max_content: 300.0,
        };
        let used = resolve_block_geometry(&s, 300.0, None, sizing);
        assert!((used.inline_size - 100.0).abs() < 1e-3);
        assert!(used.margin.inline_end.abs() < 1e-3);
        assert!((used.outer_inline_size() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_max_then_min_width_resolve_again() {
        let mut s = style();
        s.max_width = Some(LengthPercentage::Percent(50.0));
        s.min_width = LengthPercentage::Px(200.0);
        let used = resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch);
        assert!((used.inline_size - 200.0).abs() < 1e-3);
        assert!((used.margin.inline_end - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_border_box_sizing_and_negative_clamp() {
        let mut s = style();
        s.box_sizing = BoxSizing::BorderBox;
        s.width = AutoLength::Length(LengthPercentage::Px(10.0));
        s.padding = [LengthPercentage::Px(8.0); 4];
        s.border_style = [BorderStyle::Solid; 4];
        s.border_width = [2.0; 4];
        let used = resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch);
        assert!(used.inline_size.abs() < 1e-3);
    }

    #[test]
    fn test_percentage_height_needs_definite_container() {
        let mut s = style();
        s.height = AutoLength::Length(LengthPercentage::Percent(50.0));
        assert_eq!(resolve_block_geometry(&s, 300.0, None, InlineSizing::Stretch).block_size, None);
        let used = resolve_block_geometry(&s, 300.0, Some(400.0), InlineSizing::Stretch);
        assert_eq!(used.block_size, Some(200.0));
    }

    #[test]
    fn test_vertical_writing_mode_swaps_axes() {
        let mut s = style();
        s.writing_mode = WritingMode::VerticalRl;
        s.height = AutoLength::Length(LengthPercentage::Px(120.0));
        let used = resolve_block_geometry(&s, 500.0, None, InlineSizing::Stretch);
        assert!((used.inline_size - 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_shrink_to_fit_float() {
        let s = style();
        let sizing = InlineSizing::ShrinkToFit {
            min_content: 40.0,
            max_content: 90.0,
        };
        assert!((resolve_block_geometry(&s, 300.0, None, sizing).inline_size - 90.0).abs() < 1e-3);
        assert!((resolve_block_geometry(&s, 60.0, None, sizing).inline_size - 60.0).abs() < 1e-3);
        assert!((resolve_block_geometry(&s, 20.0, None, sizing).inline_size - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_replaced_keeps_ratio() {
        let mut s = style();
        s.width = AutoLength::Length(LengthPercentage::Px(200.0));
        let used = resolve_replaced_geometry(&s, 600.0, None, (400.0, 300.0));
        assert!((used.inline_size - 200.0).abs() < 1e-3);
        assert_eq!(used.block_size, Some(150.0));

        let mut capped = style();
        capped.max_width = Some(LengthPercentage::Percent(100.0));
        let used = resolve_replaced_geometry(&capped, 100.0, None, (400.0, 300.0));
        assert!((used.inline_size - 100.0).abs() < 1e-3);
        assert_eq!(used.block_size, Some(75.0));
    }
}
