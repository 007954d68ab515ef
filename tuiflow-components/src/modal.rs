//! Shared overlay chrome: dims whatever has already been drawn into a
//! [`Buffer`] region and centers a confirmation box within it. Not a
//! factory-registered type itself — `crud` (and any future component that
//! needs a confirm-style interruption) draws through this.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;

/// Dims every cell in `area` by blending its background toward black.
/// `factor` ranges 0.0 (no change) to 1.0 (fully black).
pub fn dim_area(buf: &mut Buffer, area: Rect, factor: f32) {
    let factor = factor.clamp(0.0, 1.0);
    let dim_amount = (255.0 * factor) as u8;
    for y in area.y..area.y.saturating_add(area.height) {
        for x in area.x..area.x.saturating_add(area.width) {
            if let Color::Rgb(r, g, b) = buf[(x, y)].bg {
                buf[(x, y)].set_bg(Color::Rgb(
                    r.saturating_sub(dim_amount),
                    g.saturating_sub(dim_amount),
                    b.saturating_sub(dim_amount),
                ));
            }
        }
    }
}

/// A rectangle of `width`×`height` centered within `area`, clamped so it
/// never exceeds `area` minus a one-cell margin.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(2));
    let height = height.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
