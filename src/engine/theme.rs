//! Reader appearance pushed to the engine with `setTheme`
//!
//! Serializes to:
//! ```json
//! {
//!   "style": {"lineHeight": 1.4, "justify": true, "hyphenate": true,
//!             "theme": {"bg": "#FFFFFF", "fg": "#000000", "name": "light"},
//!             "fontSize": 100},
//!   "layout": {"gap": 0.06, "maxInlineSize": 720, "maxBlockSize": 1440,
//!              "maxColumnCount": 2, "flow": "paginated", "animated": true, "margin": 48}
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Named color scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeName {
    #[default]
    Light,
    Dark,
    Sepia,
}

impl ThemeName {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "sepia" => Some(Self::Sepia),
            _ => None,
        }
    }

    pub fn colors(&self) -> ThemeColors {
        let (bg, fg) = match self {
            ThemeName::Light => ("#FFFFFF", "#000000"),
            ThemeName::Dark => ("#121212", "#E0E0E0"),
            ThemeName::Sepia => ("#F4ECD8", "#5B4636"),
        };
        ThemeColors {
            bg: bg.to_string(),
            fg: fg.to_string(),
            name: *self,
        }
    }
}

/// Page flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    Paginated,
    Scrolled,
}

impl Flow {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paginated" => Some(Self::Paginated),
            "scrolled" => Some(Self::Scrolled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub name: ThemeName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeStyle {
    pub line_height: f64,
    pub justify: bool,
    pub hyphenate: bool,
    pub theme: ThemeColors,
    /// Percentage of the engine's base size
    pub font_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeLayout {
    pub gap: f64,
    pub max_inline_size: u32,
    pub max_block_size: u32,
    pub max_column_count: u32,
    pub flow: Flow,
    pub animated: bool,
    pub margin: u32,
}

/// Full `setTheme` argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub style: ThemeStyle,
    pub layout: ThemeLayout,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            style: ThemeStyle {
                line_height: 1.4,
                justify: true,
                hyphenate: true,
                theme: ThemeName::Light.colors(),
                font_size: 100.0,
            },
            layout: ThemeLayout {
                gap: 0.06,
                max_inline_size: 720,
                max_block_size: 1440,
                max_column_count: 2,
                flow: Flow::Paginated,
                animated: true,
                margin: 48,
            },
        }
    }
}

impl Theme {
    pub fn with_name(mut self, name: ThemeName) -> Self {
        self.style.theme = name.colors();
        self
    }

    pub fn with_flow(mut self, flow: Flow) -> Self {
        self.layout.flow = flow;
        self
    }

    pub fn with_font_size(mut self, font_size: f64) -> Self {
        self.style.font_size = font_size;
        self
    }

    pub fn with_line_height(mut self, line_height: f64) -> Self {
        self.style.line_height = line_height;
        self
    }
}
