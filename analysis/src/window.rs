use crate::{
    collaborators::ObservationStore,
    model::{
        ModelId,
        Observation,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use eyre::{
    Result,
    WrapErr,
};
use std::time::Duration;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MIN_SAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum Window {
    Ready(Vec<Observation>),
    /// Expected whenever traffic is light. The cycle is skipped without error.
    Insufficient { found: usize, required: usize },
}

/// Trailing window evaluated fresh on every cycle. Consecutive windows overlap, so
/// one observation can be analyzed several times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSelector {
    window: Duration,
    min_samples: usize,
}

impl Default for WindowSelector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MIN_SAMPLES)
    }
}

impl WindowSelector {
    pub fn new(window: Duration, min_samples: usize) -> Self {
        Self {
            window,
            min_samples: min_samples.max(1),
        }
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Start of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn select(&self, store: &dyn ObservationStore, model_id: &ModelId, now: DateTime<Utc>) -> Result<Window> {
        let since = self.since(now);
        let mut observations = store
            .fetch_window(model_id, since)
            .wrap_err_with(|| format!("failed to fetch the observation window of {model_id}"))?;
        observations.retain(|o| o.ingested_at >= since && &o.model_id == model_id);

        if observations.len() < self.min_samples {
            return Ok(Window::Insufficient {
                found: observations.len(),
                required: self.min_samples,
            });
        }
        Ok(Window::Ready(observations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    struct Fixed(Vec<Observation>);

    impl ObservationStore for Fixed {
        fn fetch_window(&self, _model_id: &ModelId, _since: DateTime<Utc>) -> Result<Vec<Observation>> {
            Ok(self.0.clone())
        }
    }

    fn observation(id: &str, ingested_at: DateTime<Utc>) -> Observation {
        Observation {
            model_id: ModelId::new(id),
            features: BTreeMap::from([("x".to_string(), 1.0)]),
            ground_truth: 0,
            ingested_at,
        }
    }

    #[test]
    fn counts_only_recent_rows_of_the_model() {
        let now = Utc::now();
        let recent = |minutes| now - chrono::Duration::minutes(minutes);
        let store = Fixed(vec![
            observation("m", recent(1)),
            observation("m", recent(59)),
            observation("m", recent(61)),
            observation("other", recent(2)),
            observation("m", recent(3)),
        ]);

        let window = WindowSelector::default().select(&store, &ModelId::new("m"), now).unwrap();
        assert_eq!(
            window,
            Window::Insufficient {
                found: 3,
                required: 5,
            }
        );
    }

    #[test]
    fn exactly_min_samples_is_ready() {
        let now = Utc::now();
        let store = Fixed((0..5).map(|i| observation("m", now - chrono::Duration::minutes(i))).collect());

        match WindowSelector::default().select(&store, &ModelId::new("m"), now).unwrap() {
            Window::Ready(observations) => assert_eq!(observations.len(), 5),
            other => panic!("unexpected window {other:?}"),
        }
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let now = Utc::now();
        let selector = WindowSelector::new(Duration::from_secs(60), 1);
        let store = Fixed(vec![observation("m", now - chrono::Duration::seconds(60))]);

        assert!(matches!(selector.select(&store, &ModelId::new("m"), now).unwrap(), Window::Ready(_)));
    }
}
