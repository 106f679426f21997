//! Avatar rendering contract.
//!
//! The renderer (Live2D or anything else) sits behind [`AvatarModel`]
//! so the runtime, the playback coordinator, and the tests never touch
//! a GPU. [`NullAvatar`] is the headless implementation used in tests
//! and when running without a display.

pub mod registry;

use crate::error::Result;

/// Transform and per-frame drawing contract for an avatar model.
pub trait AvatarModel {
    /// Apply a named expression.
    ///
    /// # Errors
    ///
    /// Returns an error when the model does not know the expression.
    fn set_expression(&mut self, id: &str) -> Result<()>;

    /// Return all expression parameters to their defaults.
    fn reset_expressions(&mut self);

    /// Mouth-open parameter in `0.0..=1.0`.
    fn set_mouth_open(&mut self, value: f32);

    /// Absolute rotation in degrees around the model center.
    fn rotate(&mut self, degrees: f32);

    /// Screen-space offset of the model center.
    fn set_offset(&mut self, dx: f32, dy: f32);

    /// Uniform scale factor.
    fn set_scale(&mut self, scale: f32);

    /// Advance model-internal animation by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Draw the current frame.
    fn draw(&mut self);
}

/// Headless avatar recording the last applied state.
#[derive(Debug, Clone)]
pub struct NullAvatar {
    expression: Option<String>,
    mouth_open: f32,
    rotation: f32,
    offset: (f32, f32),
    scale: f32,
    frames_drawn: u64,
}

impl Default for NullAvatar {
    fn default() -> Self {
        Self {
            expression: None,
            mouth_open: 0.0,
            rotation: 0.0,
            offset: (0.0, 0.0),
            scale: 1.0,
            frames_drawn: 0,
        }
    }
}

impl NullAvatar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    #[must_use]
    pub fn mouth_open(&self) -> f32 {
        self.mouth_open
    }

    #[must_use]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    #[must_use]
    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl AvatarModel for NullAvatar {
    fn set_expression(&mut self, id: &str) -> Result<()> {
        self.expression = Some(id.to_owned());
        Ok(())
    }

    fn reset_expressions(&mut self) {
        self.expression = None;
    }

    fn set_mouth_open(&mut self, value: f32) {
        self.mouth_open = value.clamp(0.0, 1.0);
    }

    fn rotate(&mut self, degrees: f32) {
        self.rotation = degrees;
    }

    fn set_offset(&mut self, dx: f32, dy: f32) {
        self.offset = (dx, dy);
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn update(&mut self, _dt: f32) {}

    fn draw(&mut self) {
        self.frames_drawn += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_avatar_records_state() {
        let mut avatar = NullAvatar::new();
        avatar.set_expression("wow").unwrap();
        avatar.set_mouth_open(0.4);
        avatar.rotate(2.5);
        avatar.set_offset(10.0, -5.0);
        avatar.set_scale(1.2);
        avatar.draw();

        assert_eq!(avatar.expression(), Some("wow"));
        assert!((avatar.mouth_open() - 0.4).abs() < 1e-6);
        assert!((avatar.rotation() - 2.5).abs() < 1e-6);
        assert_eq!(avatar.offset(), (10.0, -5.0));
        assert_eq!(avatar.frames_drawn(), 1);

        avatar.reset_expressions();
        assert!(avatar.expression().is_none());
    }

    #[test]
    fn mouth_open_is_clamped() {
        let mut avatar = NullAvatar::new();
        avatar.set_mouth_open(3.0);
        assert_eq!(avatar.mouth_open(), 1.0);
        avatar.set_mouth_open(-1.0);
        assert_eq!(avatar.mouth_open(), 0.0);
    }
}
