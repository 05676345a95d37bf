use crate::config::AggregateMode;
use crate::data::{Observation, PriceField};

/// `W` consecutive observations, optionally with an aggregate computed at
/// build time.
#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    slice: Vec<Observation>,
    aggregate: Option<f64>,
}

impl Window {
    pub fn observations(&self) -> &[Observation] {
        &self.slice
    }

    pub fn aggregate(&self) -> Option<f64> {
        self.aggregate
    }

    #[cfg(test)]
    pub fn first(&self) -> &Observation {
        &self.slice[0]
    }

    pub fn last(&self) -> &Observation {
        &self.slice[self.slice.len() - 1]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slice.len()
    }
}

/// Aggregate of `field` over a window.
pub fn aggregate(slice: &[Observation], field: PriceField, mode: AggregateMode) -> f64 {
    let n = slice.len() as f64;
    match mode {
        AggregateMode::Literal => {
            // Historic behavior: the index never advances past 0.
            let mut sum = 0.0;
            for _ in 0..slice.len() {
                sum += field.of(&slice[0]);
            }
            sum / n
        }
        AggregateMode::Mean => slice.iter().map(|o| field.of(o)).sum::<f64>() / n,
    }
}

/// Builds every full window of `size` observations, shifted by one each time.
///
/// Returns an empty vector when fewer than `size` observations are available.
pub fn create_windows(
    data: &[Observation],
    size: usize,
    aggregate_with: Option<(PriceField, AggregateMode)>,
) -> Vec<Window> {
    if size == 0 || data.len() < size {
        return Vec::new();
    }
    data.windows(size)
        .map(|slice| Window {
            slice: slice.to_vec(),
            aggregate: aggregate_with.map(|(field, mode)| aggregate(slice, field, mode)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock_series;

    #[test]
    fn test_window_count_and_contents() {
        let data = mock_series(40);
        for size in [1, 5, 12, 40] {
            let windows = create_windows(&data, size, None);
            assert_eq!(windows.len(), data.len() - size + 1);
            for (i, w) in windows.iter().enumerate() {
                assert_eq!(w.len(), size);
                assert_eq!(w.observations(), &data[i..i + size]);
                assert_eq!(w.aggregate(), None);
            }
        }
    }

    #[test]
    fn test_thirteen_observations_make_two_windows() {
        let data = mock_series(13);
        let windows = create_windows(&data, 12, None);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].first(), &data[1]);
        assert_eq!(windows[1].first(), &windows[0].observations()[1]);
        assert_eq!(windows[1].last(), &data[12]);
    }

    #[test]
    fn test_short_series_is_empty() {
        assert!(create_windows(&[], 12, None).is_empty());
        assert!(create_windows(&mock_series(11), 12, None).is_empty());
        assert!(create_windows(&mock_series(5), 0, None).is_empty());
    }

    #[test]
    fn test_literal_aggregate_repeats_first_element() {
        let data = mock_series(12);
        let windows = create_windows(&data, 4, Some((PriceField::Close, AggregateMode::Literal)));
        for w in &windows {
            let first = w.first().close;
            let agg = w.aggregate().unwrap();
            assert!((agg - first).abs() < 1e-9 * first.abs());
        }
    }

    #[test]
    fn test_mean_aggregate() {
        let mut data = mock_series(3);
        data[0].close = 1.0;
        data[1].close = 2.0;
        data[2].close = 6.0;
        let windows = create_windows(&data, 3, Some((PriceField::Close, AggregateMode::Mean)));
        assert_eq!(windows[0].aggregate(), Some(3.0));

        let literal = aggregate(&data, PriceField::Close, AggregateMode::Literal);
        assert_eq!(literal, 1.0);
    }
}
