//! Viewer options.
//!
//! Options arrive as JSON from the host (or from CLI flags) and turn into two
//! things the engine understands: a User-origin stylesheet, and the default
//! page box used when no `@page` rule sets one.

use std::fmt::Write;

use folio_css::{MediaEnvironment, PageStyle};
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// Options recognized by the viewer. Every field has a default, so any
/// subset may be given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerOptions {
    /// Root font size in px.
    pub font_size: f32,
    /// Show two pages side by side.
    pub spread_view: bool,
    /// Width of the border drawn around each page, in px.
    pub page_border: f32,
    /// Turn on automatic hyphenation.
    pub hyphenate: bool,
    /// Light text on a dark background.
    pub night_mode: bool,
    /// Unitless line height for the root element.
    pub line_height: Option<f32>,
    /// Preferred column width in px; pages get as many columns as fit.
    pub column_width: Option<f32>,
    /// Root font family.
    pub font_family: Option<String>,
    /// Area the pages are shown in.
    pub viewport: Viewport,
    /// Extra CSS applied with User origin.
    pub user_style_sheet: Option<String>,
    /// Lay out every page in the background after loading, instead of only
    /// the pages navigation reaches.
    pub render_all_pages: bool,
    /// Lay the document out again when the viewport is resized.
    pub autoresize: bool,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            font_size: 16.0,
            spread_view: false,
            page_border: 1.0,
            hyphenate: false,
            night_mode: false,
            line_height: None,
            column_width: None,
            font_family: None,
            viewport: Viewport::default(),
            user_style_sheet: None,
            render_all_pages: true,
            autoresize: true,
        }
    }
}

/// The host's display area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    /// Width in px.
    pub width: f32,
    /// Height in px.
    pub height: f32,
    /// Space kept free around the page area.
    pub margins: Margins,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 1000.0,
            margins: Margins::default(),
        }
    }
}

/// Viewport margins in px.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    /// Top.
    pub top: f32,
    /// Right.
    pub right: f32,
    /// Bottom.
    pub bottom: f32,
    /// Left.
    pub left: f32,
}

impl ViewerOptions {
    /// Parse options from JSON. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ViewerError::Options`] when the text is not valid JSON or a
    /// field has the wrong type.
    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The stylesheet these options stand for, applied with User origin
    /// before [`Self::user_style_sheet`].
    #[must_use]
    pub fn generated_style_sheet(&self) -> String {
        let mut root = format!("font-size: {}px;", self.font_size);
        if let Some(family) = &self.font_family {
            let _ = write!(root, " font-family: {family};");
        }
        if let Some(line_height) = self.line_height {
            let _ = write!(root, " line-height: {line_height};");
        }
        if let Some(width) = self.column_width {
            let _ = write!(root, " column-width: {width}px;");
        }
        if self.hyphenate {
            root.push_str(" hyphens: auto;");
        }
        let mut css = format!(":root {{ {root} }}\n");
        if self.night_mode {
            css.push_str(":root { background-color: #000; color: #fff; }\na { color: #8cf; }\n");
        }
        css
    }

    /// The page box used when no `@page` rule gives one: the viewport (half
    /// of it in spread view) with the viewport margins as page margins.
    #[must_use]
    pub fn page_style(&self) -> PageStyle {
        let Margins {
            top,
            right,
            bottom,
            left,
        } = self.viewport.margins;
        let width = if self.spread_view {
            self.viewport.width / 2.0
        } else {
            self.viewport.width
        };
        PageStyle::new(width.max(0.0), self.viewport.height.max(0.0), [top, right, bottom, left])
    }

    /// Media environment for `@media` evaluation.
    #[must_use]
    pub fn media(&self) -> MediaEnvironment {
        MediaEnvironment::print(self.viewport.width, self.viewport.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ViewerOptions::from_json(
            r#"{"fontSize": 20, "spreadView": true, "viewport": {"width": 1000, "margins": {"top": 5}}}"#,
        )
        .unwrap();
        assert!((options.font_size - 20.0).abs() < f32::EPSILON);
        assert!(options.spread_view);
        assert!(options.render_all_pages);
        assert!((options.viewport.height - 1000.0).abs() < f32::EPSILON);
        assert!((options.viewport.margins.top - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_bad_json_is_an_options_error() {
        assert!(matches!(
            ViewerOptions::from_json(r#"{"fontSize": "big"}"#),
            Err(ViewerError::Options(_))
        ));
    }

    #[test]
    fn test_generated_sheet() {
        let options = ViewerOptions {
            line_height: Some(1.5),
            night_mode: true,
            hyphenate: true,
            ..ViewerOptions::default()
        };
        let css = options.generated_style_sheet();
        assert!(css.contains("font-size: 16px;"));
        assert!(css.contains("line-height: 1.5;"));
        assert!(css.contains("hyphens: auto;"));
        assert!(css.contains("background-color: #000"));
    }

    #[test]
    fn test_spread_view_halves_the_page() {
        let options = ViewerOptions {
            spread_view: true,
            ..ViewerOptions::default()
        };
        let page = options.page_style();
        assert!((page.width - 400.0).abs() < f32::EPSILON);
        assert!((page.height - 1000.0).abs() < f32::EPSILON);
    }
}
