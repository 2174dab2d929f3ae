use std::fmt;
use std::sync::Arc;

type Sink = Arc<dyn Fn(f64) + Send + Sync>;

/// Optional progress callback taking a fraction in `[0, 1]`.
///
/// A disabled sink changes nothing but the absence of reports.
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<Sink>,
}

impl Progress {
    pub fn none() -> Self {
        Progress { sink: None }
    }

    pub fn new(f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        Progress {
            sink: Some(Arc::new(f)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn report(&self, fraction: f64) {
        if let Some(sink) = &self.sink {
            sink(fraction.clamp(0.0, 1.0));
        }
    }

    /// Maps this sink's `[0, 1]` onto `[start, end]` of the parent.
    pub fn scoped(&self, start: f64, end: f64) -> Progress {
        let Some(parent) = self.sink.clone() else {
            return Progress::none();
        };
        Progress::new(move |p| parent(start + p.clamp(0.0, 1.0) * (end - start)))
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
