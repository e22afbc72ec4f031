//! The image decoding and transform pipeline.

use crate::{
    common::*,
    processor::{Jitter, JitterInit},
};

/// The extra margin in pixels added by the resize step before a random crop.
pub const CROP_MARGIN: i64 = 50;

/// The ImageNet channel means.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// The ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// The image pipeline initializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagePipelineInit {
    /// The output image height and width in pixels.
    #[serde(default = "default_output_hw")]
    pub output_hw: [NonZeroUsize; 2],
    /// If set, resize with an extra margin, then crop a random window.
    #[serde(default)]
    pub random_crop: bool,
    /// If set, flip the image horizontally with probability 0.5.
    #[serde(default)]
    pub horizontal_flip: bool,
    /// The lighting distortion options.
    #[serde(default)]
    pub jitter: Option<JitterInit>,
    /// If set, standardize channels with the ImageNet statistics.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

impl Default for ImagePipelineInit {
    fn default() -> Self {
        Self {
            output_hw: default_output_hw(),
            random_crop: false,
            horizontal_flip: false,
            jitter: None,
            normalize: true,
        }
    }
}

impl ImagePipelineInit {
    pub fn build(self) -> Result<ImagePipeline> {
        let Self {
            output_hw: [output_h, output_w],
            random_crop,
            horizontal_flip,
            jitter,
            normalize,
        } = self;
        let jitter = jitter.map(JitterInit::build).transpose()?;

        Ok(ImagePipeline {
            output_h: output_h.get() as i64,
            output_w: output_w.get() as i64,
            random_crop,
            horizontal_flip,
            jitter,
            normalize: normalize.then(Normalize::imagenet),
        })
    }
}

fn default_output_hw() -> [NonZeroUsize; 2] {
    [NonZeroUsize::new(224).unwrap(), NonZeroUsize::new(224).unwrap()]
}

fn default_normalize() -> bool {
    true
}

/// The image decoding and transform pipeline.
///
/// The pipeline resizes the decoded image, optionally crops a random window,
/// optionally flips horizontally, scales pixel values to `[0, 1]`, optionally
/// distorts lighting, and optionally standardizes channels.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    output_h: i64,
    output_w: i64,
    random_crop: bool,
    horizontal_flip: bool,
    jitter: Option<Jitter>,
    normalize: Option<Normalize>,
}

impl ImagePipeline {
    /// Decodes the image file and transforms it.
    pub fn load<R>(&self, path: impl AsRef<Path>, rng: &mut R) -> Result<Tensor>
    where
        R: Rng,
    {
        let path = path.as_ref();
        let image = vision::image::load(path)
            .with_context(|| format!("failed to decode image file '{}'", path.display()))?;
        self.forward(&image, rng)
    }

    /// Transforms a `[3, height, width]` byte image.
    pub fn forward<R>(&self, image: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        R: Rng,
    {
        tch::no_grad(|| -> Result<_> {
            let (channels, _height, _width) = image.size3()?;
            ensure!(channels == 3, "channel size must be 3, but get {}", channels);

            // resize, optionally with a random crop
            let image = if self.random_crop {
                let resized = vision::image::resize(
                    image,
                    self.output_w + CROP_MARGIN,
                    self.output_h + CROP_MARGIN,
                )?;
                let top = rng.gen_range(0..=CROP_MARGIN);
                let left = rng.gen_range(0..=CROP_MARGIN);
                resized.i((
                    ..,
                    top..(top + self.output_h),
                    left..(left + self.output_w),
                ))
            } else {
                vision::image::resize(image, self.output_w, self.output_h)?
            };

            // flip horizontally
            let image = if self.horizontal_flip && rng.gen::<bool>() {
                image.flip(&[2])
            } else {
                image
            };

            // scale to [0, 1]
            let image = image.to_kind(Kind::Float) / 255.0;

            // distort lighting
            let image = match &self.jitter {
                Some(jitter) => jitter.forward(&image, rng)?,
                None => image,
            };

            // standardize channels
            let image = match &self.normalize {
                Some(normalize) => normalize.forward(&image),
                None => image,
            };

            Ok(image)
        })
    }

    pub fn output_hw(&self) -> [i64; 2] {
        [self.output_h, self.output_w]
    }
}

/// The per-channel standardization transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalize {
    mean: [f32; 3],
    std: [f32; 3],
}

impl Normalize {
    pub fn imagenet() -> Self {
        Self {
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    pub fn forward(&self, rgb: &Tensor) -> Tensor {
        let mean = Tensor::of_slice(&self.mean).view([3, 1, 1]);
        let std = Tensor::of_slice(&self.std).view([3, 1, 1]);
        (rgb - mean) / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_image(height: i64, width: i64) -> Tensor {
        (Tensor::rand(&[3, height, width], FLOAT_CPU) * 255.0).to_kind(Kind::Uint8)
    }

    #[test]
    fn pipeline_output_shape() -> Result<()> {
        let pipeline = ImagePipelineInit {
            output_hw: [NonZeroUsize::new(64).unwrap(), NonZeroUsize::new(48).unwrap()],
            ..Default::default()
        }
        .build()?;
        assert_eq!(pipeline.output_hw(), [64, 48]);
        let mut rng = StdRng::seed_from_u64(0);

        let output = pipeline.forward(&byte_image(100, 200), &mut rng)?;
        assert_eq!(output.size3()?, (3, 64, 48));
        assert_eq!(output.kind(), Kind::Float);

        Ok(())
    }

    #[test]
    fn pipeline_random_crop_output_shape() -> Result<()> {
        let pipeline = ImagePipelineInit {
            output_hw: [NonZeroUsize::new(32).unwrap(), NonZeroUsize::new(32).unwrap()],
            random_crop: true,
            ..Default::default()
        }
        .build()?;
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..10 {
            let output = pipeline.forward(&byte_image(77, 133), &mut rng)?;
            assert_eq!(output.size3()?, (3, 32, 32));
        }

        Ok(())
    }

    #[test]
    fn pipeline_rejects_non_rgb_input() -> Result<()> {
        let pipeline = ImagePipelineInit::default().build()?;
        let mut rng = StdRng::seed_from_u64(2);
        let gray = (Tensor::rand(&[1, 16, 16], FLOAT_CPU) * 255.0).to_kind(Kind::Uint8);

        assert!(pipeline.forward(&gray, &mut rng).is_err());

        Ok(())
    }

    #[test]
    fn pipeline_is_deterministic_with_fixed_seed() -> Result<()> {
        let pipeline = ImagePipelineInit {
            output_hw: [NonZeroUsize::new(40).unwrap(), NonZeroUsize::new(40).unwrap()],
            random_crop: true,
            horizontal_flip: true,
            jitter: Some(JitterInit::Lighting),
            ..Default::default()
        }
        .build()?;
        let image = byte_image(90, 90);

        let lhs = pipeline.forward(&image, &mut StdRng::seed_from_u64(7))?;
        let rhs = pipeline.forward(&image, &mut StdRng::seed_from_u64(7))?;
        let diff = f64::from(&(&lhs - &rhs).abs().max());
        assert!(abs_diff_eq!(diff, 0.0));

        Ok(())
    }

    #[test]
    fn normalize_standardizes_channels() {
        let rgb = Tensor::ones(&[3, 2, 2], FLOAT_CPU) * 0.5;
        let output = Normalize::imagenet().forward(&rgb);

        let expect = (0.5 - 0.485) / 0.229;
        let value = f64::from(&output.i((0, 0, 0)));
        assert!(abs_diff_eq!(value, expect, epsilon = 1e-6));

        let expect = (0.5 - 0.406) / 0.225;
        let value = f64::from(&output.i((2, 1, 1)));
        assert!(abs_diff_eq!(value, expect, epsilon = 1e-6));
    }
}
