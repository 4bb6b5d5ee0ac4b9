#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use temperature_monitor::common::{CurrentTemperature, Granularity, Reading, Window};
use temperature_monitor::services::remote::{Error, TemperatureSource};
use tokio::sync::Semaphore;

/// One scripted answer.
pub struct Step<T> {
    reply: Result<T, String>,
    gate: Option<Arc<Semaphore>>,
}

impl<T> Step<T> {
    pub const fn ok(value: T) -> Self {
        Self {
            reply: Ok(value),
            gate: None,
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            gate: None,
        }
    }

    /// Hold the answer until a permit is added to the returned gate.
    pub fn gated(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

struct Script<T> {
    steps: Mutex<VecDeque<Step<T>>>,
    fallback: Mutex<Option<T>>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    fn fallback_reply(&self) -> Result<T, String> {
        self.fallback
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| "no scripted reply".to_string())
    }

    async fn next(&self) -> Result<T, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();

        let reply = match step {
            Some(Step { reply, gate }) => {
                if let Some(gate) = gate {
                    gate.acquire().await.unwrap().forget();
                }
                reply
            }
            None => self.fallback_reply(),
        };

        reply.map_err(|message| Error::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
        })
    }
}

/// A [`TemperatureSource`] that answers from a script.
pub struct FakeSource {
    current: Script<CurrentTemperature>,
    hourly: Script<Vec<Reading>>,
    daily: Script<Vec<Reading>>,
    windows: Mutex<Vec<Window>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            current: Script::new(),
            hourly: Script::new(),
            daily: Script::new(),
            windows: Mutex::new(Vec::new()),
        }
    }

    const fn history(&self, granularity: Granularity) -> &Script<Vec<Reading>> {
        match granularity {
            Granularity::Hourly => &self.hourly,
            Granularity::Daily => &self.daily,
        }
    }

    pub fn push_current(&self, step: Step<CurrentTemperature>) {
        self.current.steps.lock().unwrap().push_back(step);
    }

    pub fn push_history(&self, granularity: Granularity, step: Step<Vec<Reading>>) {
        self.history(granularity)
            .steps
            .lock()
            .unwrap()
            .push_back(step);
    }

    /// Answer with these values once the script runs out.
    pub fn fallback(&self, current: CurrentTemperature, history: &[Reading]) {
        *self.current.fallback.lock().unwrap() = Some(current);
        *self.hourly.fallback.lock().unwrap() = Some(history.to_vec());
        *self.daily.fallback.lock().unwrap() = Some(history.to_vec());
    }

    pub fn current_calls(&self) -> usize {
        self.current.calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self, granularity: Granularity) -> usize {
        self.history(granularity).calls.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<Window> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemperatureSource for FakeSource {
    async fn fetch_current(&self) -> Result<CurrentTemperature, Error> {
        self.current.next().await
    }

    async fn fetch_history(&self, window: &Window) -> Result<Vec<Reading>, Error> {
        self.windows.lock().unwrap().push(*window);
        self.history(window.granularity).next().await
    }
}

pub const fn current(temperature: f64) -> CurrentTemperature {
    CurrentTemperature {
        temperature,
        timestamp: 1_723_725_296,
    }
}

pub const fn reading(timestamp: i64, temperature: f64) -> Reading {
    Reading {
        timestamp,
        temperature,
    }
}

/// Yield until `condition` holds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}
