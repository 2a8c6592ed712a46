use crate::color::Palette;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SettingsError {
    #[error("initial zoom must be positive, got {0}")]
    InvalidZoom(f64),
    #[error("zoom step must be positive, got {0}")]
    InvalidZoomStep(f64),
    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),
    #[error("scroll threshold must be within (0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Viewer behavior that users may tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Swatch used for new annotations until the user picks another.
    pub default_color: Palette,
    pub initial_zoom: f64,
    /// Increment applied by zoom in / zoom out.
    pub zoom_step: f64,
    /// Pages materialized when a document opens.
    pub initial_pages: u32,
    /// Pages materialized each time scrolling passes the threshold.
    pub scroll_batch: u32,
    /// Scroll fraction (0..1) beyond which more pages load.
    pub scroll_threshold: f64,
    /// Pages materialized past a navigation target.
    pub navigation_lookahead: u32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            default_color: Palette::Yellow,
            initial_zoom: 1.0,
            zoom_step: 0.05,
            initial_pages: 2,
            scroll_batch: 2,
            scroll_threshold: 0.8,
            navigation_lookahead: 5,
        }
    }
}

impl ViewerSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.initial_zoom.is_finite() && self.initial_zoom > 0.0) {
            return Err(SettingsError::InvalidZoom(self.initial_zoom));
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 0.0) {
            return Err(SettingsError::InvalidZoomStep(self.zoom_step));
        }
        if self.initial_pages == 0 {
            return Err(SettingsError::ZeroCount("initial_pages"));
        }
        if self.scroll_batch == 0 {
            return Err(SettingsError::ZeroCount("scroll_batch"));
        }
        if !(self.scroll_threshold > 0.0 && self.scroll_threshold <= 1.0) {
            return Err(SettingsError::InvalidThreshold(self.scroll_threshold));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ViewerSettings::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ViewerSettings =
            serde_json::from_str(r#"{"default_color": "blue", "zoom_step": 0.1}"#)
                .expect("settings should parse");

        assert_eq!(settings.default_color, Palette::Blue);
        assert_eq!(settings.zoom_step, 0.1);
        assert_eq!(settings.initial_pages, 2);
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_zoom = ViewerSettings { initial_zoom: 0.0, ..Default::default() };
        assert_eq!(bad_zoom.validate(), Err(SettingsError::InvalidZoom(0.0)));

        let bad_batch = ViewerSettings { scroll_batch: 0, ..Default::default() };
        assert_eq!(bad_batch.validate(), Err(SettingsError::ZeroCount("scroll_batch")));

        let bad_threshold = ViewerSettings { scroll_threshold: 1.5, ..Default::default() };
        assert_eq!(bad_threshold.validate(), Err(SettingsError::InvalidThreshold(1.5)));
    }
}
