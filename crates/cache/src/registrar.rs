//! Registration surface seen by cached content while it renders.

use crate::entry::{RegisterCall, ValidationEvent};

/// The page-level sink for client registrations.
pub trait ClientRegistrar {
    fn register(&mut self, call: &RegisterCall);

    fn register_for_event_validation(&mut self, unique_id: &str, argument: Option<&str>);

    fn register_css(&mut self, css: &str);
}

/// Everything a fragment registered during one render.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registrations {
    pub calls: Vec<RegisterCall>,
    pub validation: Vec<ValidationEvent>,
    pub css: Option<String>,
}

/// Forwards every registration to the page and records it for replay.
pub struct RecordingRegistrar<'a> {
    inner: &'a mut dyn ClientRegistrar,
    log: &'a mut Registrations,
}

impl<'a> RecordingRegistrar<'a> {
    pub fn new(inner: &'a mut dyn ClientRegistrar, log: &'a mut Registrations) -> Self {
        Self { inner, log }
    }
}

impl ClientRegistrar for RecordingRegistrar<'_> {
    fn register(&mut self, call: &RegisterCall) {
        self.log.calls.push(call.clone());
        self.inner.register(call);
    }

    fn register_for_event_validation(&mut self, unique_id: &str, argument: Option<&str>) {
        self.log
            .validation
            .push((unique_id.to_string(), argument.map(str::to_string)));
        self.inner.register_for_event_validation(unique_id, argument);
    }

    fn register_css(&mut self, css: &str) {
        match &mut self.log.css {
            Some(existing) => existing.push_str(css),
            None => self.log.css = Some(css.to_string()),
        }
        self.inner.register_css(css);
    }
}

/// A registrar that drops everything; used when the page has no client
/// script surface.
#[derive(Debug, Default)]
pub struct NullRegistrar;

impl ClientRegistrar for NullRegistrar {
    fn register(&mut self, _call: &RegisterCall) {}

    fn register_for_event_validation(&mut self, _unique_id: &str, _argument: Option<&str>) {}

    fn register_css(&mut self, _css: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sink {
        calls: usize,
        events: Vec<String>,
        css: String,
    }

    impl ClientRegistrar for Sink {
        fn register(&mut self, _call: &RegisterCall) {
            self.calls += 1;
        }

        fn register_for_event_validation(&mut self, unique_id: &str, _argument: Option<&str>) {
            self.events.push(unique_id.to_string());
        }

        fn register_css(&mut self, css: &str) {
            self.css.push_str(css);
        }
    }

    #[test]
    fn records_and_forwards() {
        let mut sink = Sink::default();
        let mut log = Registrations::default();
        {
            let mut recorder = RecordingRegistrar::new(&mut sink, &mut log);
            recorder.register(&RegisterCall::HiddenField {
                name: "__SCROLL".into(),
                value: "0".into(),
            });
            recorder.register_for_event_validation("Header1$Go", Some("click"));
            recorder.register_css(".a{}");
            recorder.register_css(".b{}");
        }
        assert_eq!(sink.calls, 1);
        assert_eq!(sink.events, vec!["Header1$Go"]);
        assert_eq!(log.calls.len(), 1);
        assert_eq!(
            log.validation,
            vec![("Header1$Go".to_string(), Some("click".to_string()))]
        );
        assert_eq!(log.css.as_deref(), Some(".a{}.b{}"));
        assert_eq!(sink.css, ".a{}.b{}");
    }
}
