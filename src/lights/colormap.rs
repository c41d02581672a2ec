// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Turns color indices into actual colors. Effects only deal in indices, so this is for
//! consumers that need to show something, like the preview.

use serde::Serialize;

/// An 8 bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A color in HSL space. All components are from 0 to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    pub fn new(h: f64, s: f64, l: f64) -> Hsl {
        Hsl { h, s, l }
    }

    pub fn to_rgb(&self) -> Rgb {
        let (r, g, b) = if self.s == 0.0 {
            (self.l, self.l, self.l)
        } else {
            let v2 = if self.l < 0.5 {
                self.l * (1.0 + self.s)
            } else {
                (self.l + self.s) - (self.s * self.l)
            };
            let v1 = 2.0 * self.l - v2;
            (
                hue_to_channel(v1, v2, self.h + 1.0 / 3.0),
                hue_to_channel(v1, v2, self.h),
                hue_to_channel(v1, v2, self.h - 1.0 / 3.0),
            )
        };

        Rgb {
            r: to_byte(r),
            g: to_byte(g),
            b: to_byte(b),
        }
    }
}

fn hue_to_channel(v1: f64, v2: f64, mut h: f64) -> f64 {
    if h < 0.0 {
        h += 1.0;
    }
    if h > 1.0 {
        h -= 1.0;
    }

    if 6.0 * h < 1.0 {
        v1 + (v2 - v1) * 6.0 * h
    } else if 2.0 * h < 1.0 {
        v2
    } else if 3.0 * h < 2.0 {
        v1 + (v2 - v1) * (2.0 / 3.0 - h) * 6.0
    } else {
        v1
    }
}

fn to_byte(channel: f64) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0) as u8
}

/// An indexed palette.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Colormap {
    colors: Vec<Hsl>,
}

impl Colormap {
    pub fn new(colors: Vec<Hsl>) -> Colormap {
        Colormap { colors }
    }

    /// Spreads `size` fully saturated colors evenly across the hue circle, from red back to red.
    pub fn rainbow(size: usize) -> Colormap {
        let step = if size > 1 {
            1.0 / (size - 1) as f64
        } else {
            0.0
        };
        Colormap {
            colors: (0..size)
                .map(|idx| Hsl::new(idx as f64 * step, 1.0, 0.5))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Hsl> {
        self.colors.get(idx)
    }

    /// Looks up a color index as emitted by an effect. Indices wrap around the palette, and
    /// full brightness maps to the palette's own lightness of 0.5.
    pub fn color(&self, color_index: i64, brightness: f64) -> Rgb {
        if self.colors.is_empty() {
            return Rgb::default();
        }

        let idx = color_index.rem_euclid(self.colors.len() as i64) as usize;
        let mut color = self.colors[idx];
        color.l = brightness.clamp(0.0, 1.0) / 2.0;
        color.to_rgb()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hsl_to_rgb() {
        assert_eq!(Rgb { r: 255, g: 0, b: 0 }, Hsl::new(0.0, 1.0, 0.5).to_rgb());
        assert_eq!(Rgb { r: 0, g: 255, b: 0 }, Hsl::new(1.0 / 3.0, 1.0, 0.5).to_rgb());
        assert_eq!(Rgb { r: 0, g: 0, b: 255 }, Hsl::new(2.0 / 3.0, 1.0, 0.5).to_rgb());
        assert_eq!(Rgb { r: 0, g: 0, b: 0 }, Hsl::new(0.3, 1.0, 0.0).to_rgb());
        assert_eq!(
            Rgb {
                r: 255,
                g: 255,
                b: 255
            },
            Hsl::new(0.0, 0.0, 1.0).to_rgb()
        );
    }

    #[test]
    fn test_rainbow() {
        let colormap = Colormap::rainbow(256);
        assert_eq!(256, colormap.len());
        assert_eq!(Some(&Hsl::new(0.0, 1.0, 0.5)), colormap.get(0));
        let last = colormap.get(255).expect("256 colors");
        assert!((last.h - 1.0).abs() < 1e-9);
        assert!(colormap.get(256).is_none());

        assert_eq!(1, Colormap::rainbow(1).len());
        assert!(Colormap::rainbow(0).is_empty());
    }

    #[test]
    fn test_color() {
        let colormap = Colormap::rainbow(4);
        assert_eq!(Rgb { r: 255, g: 0, b: 0 }, colormap.color(0, 1.0));
        assert_eq!(colormap.color(1, 1.0), colormap.color(5, 1.0));
        assert_eq!(colormap.color(3, 1.0), colormap.color(-1, 1.0));
        assert_eq!(Rgb::default(), colormap.color(2, 0.0));
        assert_eq!(Rgb { r: 127, g: 0, b: 0 }, colormap.color(0, 0.5));

        assert_eq!(Rgb::default(), Colormap::default().color(3, 1.0));
    }
}
