//! Color utilities: hex parsing, HSL conversion, WCAG contrast.

use serde::{Deserialize, Serialize};

/// Minimum contrast ratio for normal text (WCAG AA).
pub const WCAG_AA_CONTRAST: f64 = 4.5;

pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in `[0, 360)`, saturation and lightness in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse `#RGB` or `#RRGGBB` (leading `#` optional, any case).
///
/// Returns `None` for anything else, including named colors and gradients.
pub fn parse_hex(s: &str) -> Option<Rgb> {
    let s = s.trim();
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        3 => {
            let b = hex.as_bytes();
            Some(Rgb::new(expand_nibble(b[0])?, expand_nibble(b[1])?, expand_nibble(b[2])?))
        }
        6 => Some(Rgb::new(
            parse_byte(&hex[0..2])?,
            parse_byte(&hex[2..4])?,
            parse_byte(&hex[4..6])?,
        )),
        _ => None,
    }
}

fn expand_nibble(c: u8) -> Option<u8> {
    let v = (c as char).to_digit(16)? as u8;
    Some(v << 4 | v)
}

fn parse_byte(s: &str) -> Option<u8> {
    u8::from_str_radix(s, 16).ok()
}

/// Normalize a hex string to lowercase `#rrggbb`.
pub fn normalize_hex(s: &str) -> Option<String> {
    parse_hex(s).map(Rgb::to_hex)
}

pub fn rgb_to_hsl(rgb: Rgb) -> Hsl {
    let r = rgb.r as f64 / 255.0;
    let g = rgb.g as f64 / 255.0;
    let b = rgb.b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;

    if delta == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l: l * 100.0 };
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if max == r {
        (g - b) / delta + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };

    Hsl {
        h: (h * 60.0).rem_euclid(360.0),
        s: s * 100.0,
        l: l * 100.0,
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
    let h = hsl.h.rem_euclid(360.0) / 360.0;
    let s = (hsl.s / 100.0).clamp(0.0, 1.0);
    let l = (hsl.l / 100.0).clamp(0.0, 1.0);

    if s == 0.0 {
        let v = to_channel(l);
        return Rgb::new(v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    Rgb::new(
        to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_channel(hue_to_rgb(p, q, h)),
        to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn to_channel(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn linearize(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance in `[0, 1]`.
pub fn relative_luminance(rgb: Rgb) -> f64 {
    0.2126 * linearize(rgb.r) + 0.7152 * linearize(rgb.g) + 0.0722 * linearize(rgb.b)
}

/// WCAG contrast ratio in `[1, 21]`. Symmetric in its arguments.
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    (la.max(lb) + 0.05) / (la.min(lb) + 0.05)
}

/// White when it reaches AA contrast on `background`, black otherwise.
pub fn suggest_text_color(background: Rgb) -> Rgb {
    if contrast_ratio(background, WHITE) >= WCAG_AA_CONTRAST {
        WHITE
    } else {
        BLACK
    }
}

/// Euclidean distance in RGB space.
pub fn rgb_distance(a: Rgb, b: Rgb) -> f64 {
    let dr = a.r as f64 - b.r as f64;
    let dg = a.g as f64 - b.g as f64;
    let db = a.b as f64 - b.b as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// Closest palette entry and its distance. Ties go to the earliest entry.
pub fn nearest_color(target: Rgb, palette: &[Rgb]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in palette.iter().enumerate() {
        let d = rgb_distance(target, *candidate);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_hex("#fff"), Some(WHITE));
        assert_eq!(parse_hex("00FF00"), Some(Rgb::new(0, 255, 0)));
        assert_eq!(parse_hex("#1a2B3c"), Some(Rgb::new(0x1a, 0x2b, 0x3c)));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("red"), None);
        assert_eq!(parse_hex("linear-gradient(#fff, #000)"), None);
    }

    #[test]
    fn hex_output_is_lowercase() {
        assert_eq!(Rgb::new(0xAB, 0xCD, 0xEF).to_hex(), "#abcdef");
        assert_eq!(normalize_hex("#ABC").as_deref(), Some("#aabbcc"));
    }

    #[test]
    fn hsl_known_values() {
        let red = rgb_to_hsl(Rgb::new(255, 0, 0));
        assert_eq!((red.h, red.s, red.l), (0.0, 100.0, 50.0));

        let blue = rgb_to_hsl(Rgb::new(0, 0, 255));
        assert!((blue.h - 240.0).abs() < 1e-9);

        let grey = rgb_to_hsl(Rgb::new(128, 128, 128));
        assert_eq!(grey.s, 0.0);
    }

    #[test]
    fn hsl_round_trip_is_exact() {
        for r in (0..=255).step_by(15) {
            for g in (0..=255).step_by(17) {
                for b in (0..=255).step_by(51) {
                    let rgb = Rgb::new(r as u8, g as u8, b as u8);
                    let hsl = rgb_to_hsl(rgb);
                    assert!((0.0..360.0).contains(&hsl.h));
                    assert_eq!(hsl_to_rgb(hsl), rgb, "round trip of {rgb:?}");
                }
            }
        }
    }

    #[test]
    fn contrast_black_white_is_21() {
        let ratio = contrast_ratio(BLACK, WHITE);
        assert!((ratio - 21.0).abs() < 1e-9);
        assert_eq!(contrast_ratio(WHITE, BLACK), ratio);
        assert!((contrast_ratio(WHITE, WHITE) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn text_color_suggestion() {
        assert_eq!(suggest_text_color(BLACK), WHITE);
        assert_eq!(suggest_text_color(WHITE), BLACK);
        assert_eq!(suggest_text_color(Rgb::new(0, 0, 128)), WHITE);
        assert_eq!(suggest_text_color(Rgb::new(255, 255, 0)), BLACK);
    }

    #[test]
    fn nearest_color_prefers_first_on_tie() {
        let palette = [Rgb::new(10, 0, 0), Rgb::new(0, 10, 0), Rgb::new(200, 200, 200)];
        let (idx, d) = nearest_color(BLACK, &palette).unwrap();
        assert_eq!(idx, 0);
        assert!((d - 10.0).abs() < 1e-12);
        assert_eq!(nearest_color(BLACK, &[]), None);
    }
}
