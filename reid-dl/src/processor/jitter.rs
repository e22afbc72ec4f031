//! The random lighting distortion algorithms.

use crate::common::*;

/// The brightness, contrast and channel gain factors of one lighting
/// condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightingPreset {
    /// The brightness multiplier.
    pub brightness: f64,
    /// The contrast blending factor.
    pub contrast: f64,
    /// The red channel gain applied after brightness and contrast.
    pub red_gain: f64,
    /// The blue channel gain applied after brightness and contrast.
    pub blue_gain: f64,
}

/// The lighting preset table indexed by a uniform draw in `[0, 1)`.
pub const LIGHTING_PRESETS: [(Range<f64>, LightingPreset); 6] = [
    // deep blue shadow
    (
        0.0..0.2,
        LightingPreset {
            brightness: 0.6,
            contrast: 0.8,
            red_gain: 0.9,
            blue_gain: 1.3,
        },
    ),
    // mild blue shadow
    (
        0.2..0.4,
        LightingPreset {
            brightness: 0.7,
            contrast: 0.7,
            red_gain: 0.9,
            blue_gain: 1.2,
        },
    ),
    // unchanged
    (
        0.4..0.7,
        LightingPreset {
            brightness: 1.0,
            contrast: 1.0,
            red_gain: 1.0,
            blue_gain: 1.0,
        },
    ),
    // overexposed
    (
        0.7..0.8,
        LightingPreset {
            brightness: 1.2,
            contrast: 1.2,
            red_gain: 1.0,
            blue_gain: 1.0,
        },
    ),
    // mild yellow cast
    (
        0.8..0.9,
        LightingPreset {
            brightness: 0.7,
            contrast: 0.7,
            red_gain: 1.2,
            blue_gain: 0.9,
        },
    ),
    // strong yellow cast
    (
        0.9..1.0,
        LightingPreset {
            brightness: 0.6,
            contrast: 0.6,
            red_gain: 1.4,
            blue_gain: 0.8,
        },
    ),
];

/// Variants of lighting distortion options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JitterInit {
    /// Scale brightness by a random factor in `[1 - strength, 1 + strength]`.
    Brightness { strength: R64 },
    /// Apply a random preset from [LIGHTING_PRESETS].
    Lighting,
}

impl JitterInit {
    pub fn build(self) -> Result<Jitter> {
        let jitter = match self {
            Self::Brightness { strength } => {
                ensure!(
                    strength >= 0.0,
                    "brightness strength must be non-negative, but get {}",
                    strength
                );
                Jitter::Brightness(BrightnessJitter {
                    strength: strength.raw(),
                })
            }
            Self::Lighting => Jitter::Lighting(LightingJitter::default()),
        };
        Ok(jitter)
    }
}

/// Variants of lighting distortion algorithms.
#[derive(Debug, Clone)]
pub enum Jitter {
    Brightness(BrightnessJitter),
    Lighting(LightingJitter),
}

impl Jitter {
    pub fn forward<R>(&self, rgb: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        R: Rng,
    {
        match self {
            Self::Brightness(jitter) => jitter.forward(rgb, rng),
            Self::Lighting(jitter) => jitter.forward(rgb, rng),
        }
    }
}

/// The random brightness distortion.
#[derive(Debug, Clone)]
pub struct BrightnessJitter {
    strength: f64,
}

impl BrightnessJitter {
    pub fn forward<R>(&self, rgb: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        R: Rng,
    {
        tch::no_grad(|| -> Result<_> {
            let (channels, _height, _width) = rgb.size3()?;
            ensure!(channels == 3, "channel size must be 3, but get {}", channels);

            let min_factor = (1.0 - self.strength).max(0.0);
            let max_factor = 1.0 + self.strength;
            let factor = rng.gen_range(min_factor..=max_factor);
            let new_rgb = (rgb * factor).clamp(0.0, 1.0);

            Ok(new_rgb)
        })
    }
}

/// The random lighting distortion with weighted presets.
///
/// A uniform draw in `[0, 1)` selects a preset. The preset scales brightness,
/// blends the image with its luminance mean, and finally scales the red and
/// blue channels without clamping, emulating colored illumination.
#[derive(Debug, Clone)]
pub struct LightingJitter {
    presets: &'static [(Range<f64>, LightingPreset)],
}

impl Default for LightingJitter {
    fn default() -> Self {
        Self {
            presets: &LIGHTING_PRESETS,
        }
    }
}

impl LightingJitter {
    /// Looks up the preset covering the draw value.
    pub fn preset(&self, draw: f64) -> Option<&LightingPreset> {
        self.presets
            .iter()
            .find(|(range, _preset)| range.contains(&draw))
            .map(|(_range, preset)| preset)
    }

    pub fn forward<R>(&self, rgb: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        R: Rng,
    {
        let draw = rng.gen_range(0.0..1.0);
        let preset = *self
            .preset(draw)
            .ok_or_else(|| format_err!("no lighting preset covers the draw {}", draw))?;
        self.apply(rgb, &preset)
    }

    /// Applies one preset deterministically.
    ///
    /// The input must be a `[3, height, width]` float image in `[0, 1]`.
    pub fn apply(&self, rgb: &Tensor, preset: &LightingPreset) -> Result<Tensor> {
        let LightingPreset {
            brightness,
            contrast,
            red_gain,
            blue_gain,
        } = *preset;

        tch::no_grad(|| -> Result<_> {
            let (channels, _height, _width) = rgb.size3()?;
            ensure!(channels == 3, "channel size must be 3, but get {}", channels);

            // scale brightness
            let out = (rgb * brightness).clamp(0.0, 1.0);

            // blend with the luminance mean
            let luminance =
                out.select(0, 0) * 0.299 + out.select(0, 1) * 0.587 + out.select(0, 2) * 0.114;
            let mean = f64::from(&luminance.mean(Kind::Float));
            let out = (out * contrast + mean * (1.0 - contrast)).clamp(0.0, 1.0);

            // scale red and blue channels
            let gains = Tensor::of_slice(&[red_gain as f32, 1.0, blue_gain as f32]).view([3, 1, 1]);
            let out = out * gains;

            Ok(out)
        })
    }
}
