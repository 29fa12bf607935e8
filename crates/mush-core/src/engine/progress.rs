#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards progress events of long-running workflows to an optional callback.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::TaskIncrement);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let seen = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                let tag = match event {
                    Progress::PhaseStart { name } => name.to_string(),
                    Progress::TaskStart { total_steps } => format!("start {}", total_steps),
                    Progress::TaskIncrement => "inc".to_string(),
                    Progress::TaskFinish => "finish".to_string(),
                    Progress::PhaseFinish => "done".to_string(),
                    Progress::Message(msg) => msg,
                };
                seen.lock().unwrap().push(tag);
            }));
            reporter.report(Progress::PhaseStart { name: "Grid" });
            reporter.report(Progress::TaskStart { total_steps: 2 });
            reporter.report(Progress::TaskIncrement);
            reporter.report(Progress::Message("halfway".to_string()));
            reporter.report(Progress::TaskFinish);
            reporter.report(Progress::PhaseFinish);
        }
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["Grid", "start 2", "inc", "halfway", "finish", "done"]
        );
    }
}
