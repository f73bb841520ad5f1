//! Worker threads running user code outside the frame loop
//!
//! Three kinds of thread are supported: fire-and-forget, promise (the
//! body's return value is published to a [`Promise`]) and repeating (the
//! body runs every `delay` until stopped). A failing body is diagnosed like
//! any other user error and asks the sketch to terminate.

use crate::diagnostics::Diagnostics;
use crate::sketch::Sketch;
use crate::types::{Result, ScriptError, ScriptResult};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Stop flag a repeating thread waits on between runs
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.cond.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep up to `timeout`; returns true if stopped meanwhile
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

#[derive(Debug)]
enum PromiseState<T> {
    Pending,
    Ready(T),
    Failed,
}

#[derive(Debug)]
struct PromiseInner<T> {
    state: Mutex<PromiseState<T>>,
    cond: Condvar,
}

/// Result slot filled in by a promise thread
#[derive(Debug)]
pub struct Promise<T> {
    inner: Arc<PromiseInner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Promise<T> {
    fn new() -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                state: Mutex::new(PromiseState::Pending),
                cond: Condvar::new(),
            }),
        }
    }

    fn settle(&self, state: PromiseState<T>) {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        self.inner.cond.notify_all();
    }

    /// True once the thread body has returned a value
    pub fn is_ready(&self) -> bool {
        matches!(
            *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()),
            PromiseState::Ready(_)
        )
    }

    /// The value, if the thread body has returned one
    pub fn result(&self) -> Option<T> {
        match &*self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) {
            PromiseState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Block until the body finishes; `None` if it failed
    pub fn wait(&self) -> Option<T> {
        let guard = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let guard = self
            .inner
            .cond
            .wait_while(guard, |state| matches!(state, PromiseState::Pending))
            .unwrap_or_else(|e| e.into_inner());
        match &*guard {
            PromiseState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct WorkerThread {
    handle: JoinHandle<()>,
    /// Only repeating threads can be stopped
    stop: Option<Arc<StopSignal>>,
}

/// Reports failures from thread bodies
#[derive(Clone)]
struct FailureSink {
    sketch: Arc<dyn Sketch>,
    diagnostics: Arc<Diagnostics>,
}

impl FailureSink {
    fn fail(&self, error: &ScriptError) {
        log::error!("Worker thread failed: {}", error);
        self.diagnostics
            .handle_exception(&|text: &str, stderr: bool| self.sketch.println(text, stderr), error);
        self.sketch.terminate_sketch();
    }
}

fn run_guarded<T>(f: impl FnOnce() -> ScriptResult<T>) -> ScriptResult<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(ScriptError::from_panic(payload)))
}

/// Named worker threads launched on behalf of a sketch
pub struct ThreadRegistry {
    sink: FailureSink,
    threads: Mutex<BTreeMap<String, WorkerThread>>,
    counter: AtomicUsize,
}

impl ThreadRegistry {
    /// Create a registry reporting failures through `diagnostics`
    pub fn new(sketch: Arc<dyn Sketch>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            sink: FailureSink {
                sketch,
                diagnostics,
            },
            threads: Mutex::new(BTreeMap::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// Launch a thread that runs `f` once
    ///
    /// # Returns
    /// * `Result<String>` - The thread name (`Thread-N` when `name` is `None`)
    pub fn launch_thread<F>(&self, name: Option<&str>, f: F) -> Result<String>
    where
        F: FnOnce() -> ScriptResult<()> + Send + 'static,
    {
        let sink = self.sink.clone();
        self.spawn(name, None, move || {
            if let Err(error) = run_guarded(f) {
                sink.fail(&error);
            }
        })
    }

    /// Launch a thread whose return value is delivered through a promise
    pub fn launch_promise_thread<T, F>(&self, name: Option<&str>, f: F) -> Result<Promise<T>>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> ScriptResult<T> + Send + 'static,
    {
        let promise = Promise::new();
        let slot = promise.clone();
        let sink = self.sink.clone();
        self.spawn(name, None, move || match run_guarded(f) {
            Ok(value) => slot.settle(PromiseState::Ready(value)),
            Err(error) => {
                slot.settle(PromiseState::Failed);
                sink.fail(&error);
            }
        })?;
        Ok(promise)
    }

    /// Launch a thread that runs `f` every `delay` until stopped
    ///
    /// A live thread with the same name is stopped and joined first. The
    /// delay is measured from the start of one run to the start of the next.
    pub fn launch_repeating_thread<F>(&self, name: Option<&str>, delay: Duration, mut f: F) -> Result<String>
    where
        F: FnMut() -> ScriptResult<()> + Send + 'static,
    {
        if let Some(name) = name {
            if self.has_thread(name) {
                self.stop_thread(name, true);
            }
        }

        let signal = Arc::new(StopSignal::default());
        let stop = Arc::clone(&signal);
        let sink = self.sink.clone();
        self.spawn(name, Some(signal), move || {
            while !stop.is_stopped() {
                let start = Instant::now();
                if let Err(error) = run_guarded(&mut f) {
                    stop.stop();
                    sink.fail(&error);
                    break;
                }
                if stop.wait(delay.saturating_sub(start.elapsed())) {
                    break;
                }
            }
        })
    }

    fn spawn<B>(&self, name: Option<&str>, stop: Option<Arc<StopSignal>>, body: B) -> Result<String>
    where
        B: FnOnce() + Send + 'static,
    {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("Thread-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1),
        };

        let handle = thread::Builder::new().name(name.clone()).spawn(body)?;
        log::debug!("Launched thread {}", name);

        let mut threads = self.lock();
        threads.insert(name.clone(), WorkerThread { handle, stop });
        Ok(name)
    }

    /// True if a live thread is registered under `name`
    pub fn has_thread(&self, name: &str) -> bool {
        let mut threads = self.lock();
        Self::remove_dead(&mut threads);
        threads.contains_key(name)
    }

    /// Stop a thread and forget it; with `wait`, join it first
    ///
    /// Only repeating threads can actually be interrupted; stopping any other
    /// thread just stops tracking it.
    pub fn stop_thread(&self, name: &str, wait: bool) {
        let Some(worker) = self.lock().remove(name) else {
            return;
        };
        if let Some(stop) = &worker.stop {
            stop.stop();
        }
        log::debug!("Stopped thread {}", name);

        if wait && worker.handle.thread().id() != thread::current().id() && worker.handle.join().is_err() {
            log::warn!("Thread {} panicked while stopping", name);
        }
    }

    /// Stop every thread except the calling one
    pub fn stop_all_threads(&self, wait: bool) {
        let current = thread::current().id();
        let names: Vec<String> = {
            let mut threads = self.lock();
            Self::remove_dead(&mut threads);
            threads
                .iter()
                .filter(|(_, worker)| worker.handle.thread().id() != current)
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in names {
            self.stop_thread(&name, wait);
        }
    }

    /// Names of the live threads
    pub fn list_threads(&self) -> Vec<String> {
        let mut threads = self.lock();
        Self::remove_dead(&mut threads);
        threads.keys().cloned().collect()
    }

    fn remove_dead(threads: &mut BTreeMap<String, WorkerThread>) {
        threads.retain(|_, worker| !worker.handle.is_finished());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, WorkerThread>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct QuietSketch {
        terminated: AtomicBool,
        output: Mutex<Vec<String>>,
    }

    impl Sketch for QuietSketch {
        fn println(&self, text: &str, _stderr: bool) {
            self.output.lock().unwrap().push(text.to_string());
        }

        fn terminate_sketch(&self) {
            self.terminated.store(true, Ordering::SeqCst);
        }
    }

    fn registry() -> (Arc<QuietSketch>, ThreadRegistry) {
        let sketch = Arc::new(QuietSketch::default());
        let registry = ThreadRegistry::new(sketch.clone(), Arc::new(Diagnostics::default()));
        (sketch, registry)
    }

    #[test]
    fn test_promise_thread_delivers_value() {
        let (_sketch, registry) = registry();
        let promise = registry.launch_promise_thread(None, || Ok(42)).unwrap();
        assert_eq!(promise.wait(), Some(42));
        assert!(promise.is_ready());
        assert_eq!(promise.result(), Some(42));
    }

    #[test]
    fn test_failing_thread_terminates_sketch() {
        let (sketch, registry) = registry();
        let promise = registry
            .launch_promise_thread::<i32, _>(Some("worker"), || Err(ScriptError::new("ValueError", "bad")))
            .unwrap();
        assert_eq!(promise.wait(), None);
        assert!(!promise.is_ready());

        // the failure is reported right after the promise settles
        let deadline = Instant::now() + Duration::from_secs(5);
        while !sketch.terminated.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(sketch.terminated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_names() {
        let (_sketch, registry) = registry();
        let first = registry.launch_thread(None, || Ok(())).unwrap();
        let second = registry.launch_thread(None, || Ok(())).unwrap();
        assert_eq!(first, "Thread-1");
        assert_eq!(second, "Thread-2");
    }

    #[test]
    fn test_repeating_thread_stops() {
        let (_sketch, registry) = registry();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        registry
            .launch_repeating_thread(Some("ticker"), Duration::from_millis(1), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(registry.has_thread("ticker"));

        registry.stop_thread("ticker", true);
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!registry.has_thread("ticker"));
    }

    #[test]
    fn test_stop_all_threads() {
        let (_sketch, registry) = registry();
        for name in ["a", "b"] {
            registry
                .launch_repeating_thread(Some(name), Duration::from_millis(1), || Ok(()))
                .unwrap();
        }
        registry.stop_all_threads(true);
        assert!(registry.list_threads().is_empty());
    }
}
