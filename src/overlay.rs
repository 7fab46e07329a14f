//! On-screen text collaborator
//!
//! The skybox only reports what it shows; drawing text is left to whatever UI the
//! application has. Implement [`TextOverlay`] over it.

/// RGBA8 color
pub type Color = [u8; 4];

pub const BLACK: Color = [0, 0, 0, 255];

/// Something that can put a line of text on screen
pub trait TextOverlay {
    /// Height of the screen in pixels, for bottom-anchored text
    fn screen_height(&self) -> u32;

    /// Draw `text` with its top-left corner at (`x`, `y`)
    fn draw_text(&mut self, text: &str, x: i32, y: i32, font_size: u32, color: Color);
}
