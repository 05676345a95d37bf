use crate::config::LabelStrategy;
use crate::data::PriceField;
use crate::error::{ForecastError, Result};
use crate::window::Window;

/// Supervised rows and their targets, in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupervisedSet {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

#[cfg(test)]
impl SupervisedSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    pub field: PriceField,
    pub labelling: LabelStrategy,
}

impl FeatureExtractor {
    pub fn new(field: PriceField, labelling: LabelStrategy) -> Self {
        Self { field, labelling }
    }

    pub fn row(&self, window: &Window) -> Vec<f64> {
        window.observations().iter().map(|o| self.field.of(o)).collect()
    }

    /// Target of `window`, whose successor is `next`.
    pub fn target(&self, window: &Window, next: &Window) -> Result<f64> {
        match self.labelling {
            LabelStrategy::NextValue => Ok(self.field.of(next.last())),
            LabelStrategy::WindowAggregate(_) => window.aggregate().ok_or_else(|| {
                ForecastError::Configuration(
                    "windowed-aggregate labels need windows built with an aggregate".into(),
                )
            }),
        }
    }

    /// Pairs every window with its target. The last window has no successor
    /// and is left out.
    pub fn pairs(&self, windows: &[Window]) -> Result<SupervisedSet> {
        let mut set = SupervisedSet::default();
        for pair in windows.windows(2) {
            set.features.push(self.row(&pair[0]));
            set.targets.push(self.target(&pair[0], &pair[1])?);
        }
        Ok(set)
    }

    /// Feature row of the most recent window, the input for the actual forecast.
    pub fn forecast_row(&self, windows: &[Window]) -> Option<Vec<f64>> {
        windows.last().map(|w| self.row(w))
    }
}
