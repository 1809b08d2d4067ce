/// Framebuffer clear color in linear RGBA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Moves the RGB channels towards black by `amount`, leaving alpha alone.
    pub fn darken(&mut self, amount: f32) {
        self.r = (self.r - amount).max(0.0);
        self.g = (self.g - amount).max(0.0);
        self.b = (self.b - amount).max(0.0);
    }
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 4]> for ClearColor {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::new(r, g, b, a)
    }
}

impl From<ClearColor> for wgpu::Color {
    fn from(c: ClearColor) -> Self {
        wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }
    }
}
