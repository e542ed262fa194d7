/// Named linear-space colours used by scene files and materials

use glam::Vec3;

pub struct LinearColor;

impl LinearColor {
    pub const BLACK: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const WHITE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
    pub const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const GREEN: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const BLUE: Vec3 = Vec3::new(0.0, 0.0, 1.0);
    pub const YELLOW: Vec3 = Vec3::new(1.0, 1.0, 0.0);
    pub const MAGENTA: Vec3 = Vec3::new(1.0, 0.0, 1.0);
    pub const CYAN: Vec3 = Vec3::new(0.0, 1.0, 1.0);
    pub const GRAY: Vec3 = Vec3::new(0.2, 0.2, 0.2);
    pub const LIGHT_GRAY: Vec3 = Vec3::new(0.45, 0.45, 0.45);
    pub const ORANGE: Vec3 = Vec3::new(1.0, 0.5, 0.0);
    pub const PURPLE: Vec3 = Vec3::new(0.31, 0.149, 0.513);
    pub const SUN: Vec3 = Vec3::new(1.0, 0.7294, 0.4156);

    /// Every name accepted by `by_name`
    pub const NAMES: [&'static str; 13] = [
        "black", "white", "red", "green", "blue", "yellow", "magenta",
        "cyan", "gray", "light_gray", "orange", "purple", "sun",
    ];

    /// Palette lookup, case-insensitive
    pub fn by_name(name: &str) -> Option<Vec3> {
        let color = match name.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "yellow" => Self::YELLOW,
            "magenta" => Self::MAGENTA,
            "cyan" => Self::CYAN,
            "gray" => Self::GRAY,
            "light_gray" => Self::LIGHT_GRAY,
            "orange" => Self::ORANGE,
            "purple" => Self::PURPLE,
            "sun" => Self::SUN,
            _ => return None,
        };
        Some(color)
    }
}
