//! Scripted and recording port implementations for unit tests.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    time::Duration,
};

use crate::{
    error::{OutputError, TransportError},
    ports::{
        Clock, HttpResponse, HttpTransport, MotionInput, NetworkLink, Outputs, Scheduler,
        TemperatureProbe,
    },
};

/// Replays values in order and keeps returning the last one.
fn next_or_last<T: Copy>(queue: &mut VecDeque<T>, last: &mut Option<T>) -> Option<T> {
    if let Some(value) = queue.pop_front() {
        *last = Some(value);
    }
    *last
}

pub struct ScriptedProbe {
    values: VecDeque<f32>,
    last: Option<f32>,
    conversions: Rc<Cell<usize>>,
}

impl ScriptedProbe {
    pub fn new(values: impl IntoIterator<Item = f32>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: None,
            conversions: Rc::default(),
        }
    }

    pub fn conversions(&self) -> Rc<Cell<usize>> {
        self.conversions.clone()
    }
}

impl TemperatureProbe for ScriptedProbe {
    fn request_conversion(&mut self) {
        self.conversions.set(self.conversions.get() + 1);
    }

    fn read_celsius(&mut self) -> f32 {
        next_or_last(&mut self.values, &mut self.last).unwrap_or(crate::DEVICE_DISCONNECTED_C)
    }
}

pub struct ScriptedMotion {
    values: VecDeque<bool>,
    last: Option<bool>,
}

impl ScriptedMotion {
    pub fn new(values: impl IntoIterator<Item = bool>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: None,
        }
    }
}

impl MotionInput for ScriptedMotion {
    fn is_motion(&mut self) -> bool {
        next_or_last(&mut self.values, &mut self.last).unwrap_or(false)
    }
}

pub struct FixedClock(String);

impl FixedClock {
    pub fn new(timestamp: &str) -> Self {
        Self(timestamp.to_string())
    }
}

impl Clock for FixedClock {
    fn now_iso8601(&mut self) -> String {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct RecordingScheduler {
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl RecordingScheduler {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn handle(&self) -> Rc<RefCell<Vec<Duration>>> {
        self.sleeps.clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Post {
        url: String,
        content_type: String,
        body: Vec<u8>,
    },
    Get {
        url: String,
    },
}

pub struct ScriptedTransport {
    responses: VecDeque<Result<HttpResponse, TransportError>>,
    requests: Rc<RefCell<Vec<Request>>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Result<HttpResponse, TransportError>>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            requests: Rc::default(),
        }
    }

    pub fn requests(&self) -> Rc<RefCell<Vec<Request>>> {
        self.requests.clone()
    }

    fn respond(&mut self) -> Result<HttpResponse, TransportError> {
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("no scripted response".to_string())))
    }
}

impl HttpTransport for ScriptedTransport {
    fn post(
        &mut self,
        url: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(Request::Post {
            url: url.to_string(),
            content_type: content_type.to_string(),
            body: body.to_vec(),
        });
        self.respond()
    }

    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(Request::Get {
            url: url.to_string(),
        });
        self.respond()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputWrite {
    Fan(bool),
    Light(bool),
    Indicator(bool),
}

#[derive(Default)]
pub struct RecordingOutputs {
    writes: Rc<RefCell<Vec<OutputWrite>>>,
    fail_light: bool,
}

impl RecordingOutputs {
    pub fn failing_light() -> Self {
        Self {
            fail_light: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Rc<RefCell<Vec<OutputWrite>>> {
        self.writes.clone()
    }
}

impl Outputs for RecordingOutputs {
    fn set_fan(&mut self, on: bool) -> Result<(), OutputError> {
        self.writes.borrow_mut().push(OutputWrite::Fan(on));
        Ok(())
    }

    fn set_light(&mut self, on: bool) -> Result<(), OutputError> {
        if self.fail_light {
            return Err(OutputError::new("light", "pin driver rejected level"));
        }
        self.writes.borrow_mut().push(OutputWrite::Light(on));
        Ok(())
    }

    fn set_indicator(&mut self, on: bool) -> Result<(), OutputError> {
        self.writes.borrow_mut().push(OutputWrite::Indicator(on));
        Ok(())
    }
}

/// Reports `false` for the first `offline_polls` checks, then `true`.
pub struct ScriptedLink {
    offline_polls: usize,
    polls: Rc<Cell<usize>>,
}

impl ScriptedLink {
    pub fn connected() -> Self {
        Self::after(0)
    }

    pub fn after(offline_polls: usize) -> Self {
        Self {
            offline_polls,
            polls: Rc::default(),
        }
    }

    pub fn polls(&self) -> Rc<Cell<usize>> {
        self.polls.clone()
    }
}

impl NetworkLink for ScriptedLink {
    fn is_connected(&mut self) -> bool {
        let polls = self.polls.get();
        self.polls.set(polls + 1);
        polls >= self.offline_polls
    }

    fn local_address(&mut self) -> Option<String> {
        Some("192.168.4.20".to_string())
    }
}
