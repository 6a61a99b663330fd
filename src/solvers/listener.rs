use log::{debug, info, trace};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// Importance of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    Info,
    Verbose,
    Progress,
    Debug,
}

/// Observer of a running search. Every event is ignored by default.
pub trait SearchListener: Send + Sync + Debug {
    fn search_started(&self) {}

    fn search_stopped(&self, _elapsed: Duration) {}

    fn message(&self, _level: MessageLevel, _text: &str) {}
}

/// Listeners registered with an engine. Events are delivered under a single lock, so a
/// listener never sees two events at once.
#[derive(Debug, Default)]
pub struct Listeners {
    listeners: Mutex<Vec<Arc<dyn SearchListener>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn SearchListener>) {
        self.listeners.lock().push(listener);
    }

    /// Removes `listener`, compared by identity. Returns whether it was registered.
    pub fn remove(&self, listener: &Arc<dyn SearchListener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn started(&self) {
        info!("search started");
        for l in self.listeners.lock().iter() {
            l.search_started();
        }
    }

    pub fn stopped(&self, elapsed: Duration) {
        info!("search stopped after {}", crate::extra::analysis::format_elapsed(elapsed));
        for l in self.listeners.lock().iter() {
            l.search_stopped(elapsed);
        }
    }

    /// Logs `text` at the level matching `level` and hands it to every listener.
    pub fn message(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Info => info!("{text}"),
            MessageLevel::Verbose | MessageLevel::Progress => debug!("{text}"),
            MessageLevel::Debug => trace!("{text}"),
        }
        for l in self.listeners.lock().iter() {
            l.message(level, text);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts the events it receives.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub(crate) started: AtomicUsize,
        pub(crate) stopped: AtomicUsize,
        pub(crate) messages: Mutex<Vec<(MessageLevel, String)>>,
    }

    impl SearchListener for Recorder {
        fn search_started(&self) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn search_stopped(&self, _elapsed: Duration) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        fn message(&self, level: MessageLevel, text: &str) {
            self.messages.lock().push((level, text.to_owned()));
        }
    }

    #[test]
    fn events_reach_registered_listeners_only() {
        let listeners = Listeners::new();
        let recorder = Arc::new(Recorder::default());
        let as_listener: Arc<dyn SearchListener> = recorder.clone();
        listeners.add(as_listener.clone());
        listeners.started();
        listeners.message(MessageLevel::Progress, "halfway");
        assert!(listeners.remove(&as_listener));
        assert!(!listeners.remove(&as_listener));
        listeners.stopped(Duration::from_millis(5));
        assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.stopped.load(Ordering::SeqCst), 0);
        assert_eq!(
            recorder.messages.lock().as_slice(),
            &[(MessageLevel::Progress, "halfway".to_owned())]
        );
        assert!(listeners.is_empty());
    }
}
