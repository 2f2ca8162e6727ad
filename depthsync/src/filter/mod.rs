//! Depth post-processing.
//!
//! Smoothing works on disparity rather than depth, since disparity noise is roughly uniform
//! over the range of the sensor. The chain converts depth into a [`DisparityImage`], lets the
//! enabled smoothing stages run on it, and converts back. Smoothing stages only accept
//! disparity images, so they cannot run outside the two conversions.

mod disparity;
mod spatial;
mod temporal;

pub use disparity::*;
pub use spatial::*;
pub use temporal::*;

use crate::{Error, FilterSettings, Result};
use depthsync_core::{DepthImage, DisparityImage};
use log::*;

/// The stages of a [`FilterChain`], in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    DepthToDisparity,
    Spatial,
    Temporal,
    DisparityToDepth,
}

impl StageKind {
    pub const ORDER: [Self; 4] = [
        Self::DepthToDisparity,
        Self::Spatial,
        Self::Temporal,
        Self::DisparityToDepth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DepthToDisparity => "Depth_to_Disparity",
            Self::Spatial => "Spatial",
            Self::Temporal => "Temporal",
            Self::DisparityToDepth => "Disparity_to_Depth",
        }
    }
}

/// Checks that the toggles describe a runnable chain.
pub fn validate(settings: &FilterSettings) -> Result<()> {
    if settings.depth_to_disparity != settings.disparity_to_depth {
        return Err(Error::FilterOrder(
            "depth to disparity and disparity to depth must be enabled together",
        ));
    }
    if (settings.spatial || settings.temporal) && !settings.depth_to_disparity {
        return Err(Error::FilterOrder(
            "smoothing stages require the disparity conversions",
        ));
    }
    Ok(())
}

/// The ordered depth post-processing stages of one pipeline.
#[derive(Debug, Clone)]
pub struct FilterChain {
    settings: FilterSettings,
    converter: DisparityConverter,
    spatial: SpatialFilter,
    temporal: TemporalFilter,
    disparity: DisparityImage,
}

impl FilterChain {
    pub fn new(settings: FilterSettings, converter: DisparityConverter) -> Result<Self> {
        validate(&settings)?;
        Ok(Self {
            settings,
            converter,
            spatial: SpatialFilter::default(),
            temporal: TemporalFilter::default(),
            disparity: DisparityImage::new(0, 0),
        })
    }

    pub fn settings(&self) -> FilterSettings {
        self.settings
    }

    /// Replaces which stages are enabled, leaving the chain untouched on error.
    pub fn configure(&mut self, settings: FilterSettings) -> Result<()> {
        validate(&settings)?;
        if !settings.temporal {
            self.temporal.reset();
        }
        self.settings = settings;
        Ok(())
    }

    /// Every stage with whether it is enabled.
    pub fn stages(&self) -> [(StageKind, bool); 4] {
        StageKind::ORDER.map(|stage| {
            let enabled = match stage {
                StageKind::DepthToDisparity => self.settings.depth_to_disparity,
                StageKind::Spatial => self.settings.spatial,
                StageKind::Temporal => self.settings.temporal,
                StageKind::DisparityToDepth => self.settings.disparity_to_depth,
            };
            (stage, enabled)
        })
    }

    pub fn is_active(&self) -> bool {
        self.settings.depth_to_disparity
    }

    /// Runs the enabled stages over `depth` in place.
    pub fn apply(&mut self, depth: &mut DepthImage) {
        if !self.is_active() {
            return;
        }
        self.converter.to_disparity(depth, &mut self.disparity);
        trace!("{} applied", StageKind::DepthToDisparity.name());
        if self.settings.spatial {
            self.spatial.apply(&mut self.disparity);
            trace!("{} applied", StageKind::Spatial.name());
        }
        if self.settings.temporal {
            self.temporal.apply(&mut self.disparity);
            trace!("{} applied", StageKind::Temporal.name());
        }
        self.converter.to_depth(&self.disparity, depth);
        trace!("{} applied", StageKind::DisparityToDepth.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthsync_core::image::Luma;

    fn frame() -> DepthImage {
        DepthImage::from_fn(16, 12, |x, y| {
            if (x + y) % 7 == 0 {
                Luma([0])
            } else {
                Luma([600 + (x * 13 + y * 29) as u16 % 4000])
            }
        })
    }

    fn converter() -> DisparityConverter {
        DisparityConverter::from_calibration(421.0, 0.05, 0.001)
    }

    #[test]
    fn disabled_chain_is_identity() {
        let mut chain = FilterChain::new(FilterSettings::default(), converter()).unwrap();
        let mut depth = frame();
        chain.apply(&mut depth);
        assert_eq!(depth, frame());
    }

    #[test]
    fn conversions_alone_are_identity() {
        let settings = FilterSettings {
            depth_to_disparity: true,
            disparity_to_depth: true,
            ..Default::default()
        };
        let mut chain = FilterChain::new(settings, converter()).unwrap();
        let mut depth = frame();
        chain.apply(&mut depth);
        assert_eq!(depth, frame());
    }

    #[test]
    fn inconsistent_toggles_are_rejected() {
        let half = FilterSettings {
            depth_to_disparity: true,
            ..Default::default()
        };
        assert!(matches!(
            FilterChain::new(half, converter()),
            Err(Error::FilterOrder(_))
        ));
        let smoothing_only = FilterSettings {
            spatial: true,
            ..Default::default()
        };
        assert!(matches!(
            FilterChain::new(smoothing_only, converter()),
            Err(Error::FilterOrder(_))
        ));

        let mut chain = FilterChain::new(FilterSettings::all(), converter()).unwrap();
        assert!(chain.configure(half).is_err());
        assert_eq!(chain.settings(), FilterSettings::all());
    }

    #[test]
    fn stages_are_listed_in_order() {
        let chain = FilterChain::new(FilterSettings::default(), converter()).unwrap();
        let names: Vec<_> = chain.stages().iter().map(|(s, _)| s.name()).collect();
        assert_eq!(
            names,
            ["Depth_to_Disparity", "Spatial", "Temporal", "Disparity_to_Depth"]
        );
        assert!(chain.stages().iter().all(|&(_, enabled)| !enabled));
    }

    #[test]
    fn smoothing_keeps_holes_and_flat_surfaces() {
        let mut chain = FilterChain::new(FilterSettings::all(), converter()).unwrap();
        let mut depth = DepthImage::from_pixel(8, 8, Luma([1500]));
        depth.put_pixel(3, 3, Luma([0]));
        chain.apply(&mut depth);
        chain.apply(&mut depth);
        assert_eq!(depth.get_pixel(3, 3).0[0], 0);
        assert!(depth
            .enumerate_pixels()
            .filter(|&(x, y, _)| (x, y) != (3, 3))
            .all(|(_, _, p)| p.0[0] == 1500));
    }
}
