//! The isolate host: owns the V8 runtime, enforces resource limits, and is
//! the only caller of user code.
//!
//! Renders are strictly serial. The runtime is reused across renders for
//! JIT warmth; it is discarded only when a render is terminated for
//! exceeding the heap limit or the wall-clock deadline, after which the
//! next render pays a cold start with empty caches.
//!
//! The deadline watchdog is a dedicated OS thread rather than an executor
//! task: a CPU-bound busy loop in user code never yields to the async
//! executor, but it cannot starve another thread. The watchdog's only
//! permitted action is `IsolateHandle::terminate_execution`.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use deno_core::v8;
use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};
use log::{debug, warn};
use serde_json::Value;

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::fetch::FetchPolicy;
use crate::loader::ConfinedModuleLoader;
use crate::ops::{ssr_ops, ConsoleLine, ConsoleSink};
use crate::props;
use crate::resolver::SandboxRoot;

/// A successful render: the body plus every console line the render
/// emitted, in order.
#[derive(Debug)]
pub struct RenderOutput {
    pub body: String,
    pub console: Vec<ConsoleLine>,
}

struct RuntimeSlot {
    js: JsRuntime,
    heap_hit: Arc<AtomicBool>,
}

pub struct IsolateHost {
    config: SandboxConfig,
    runtime: Option<RuntimeSlot>,
}

impl IsolateHost {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            runtime: None,
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Render `entry` with `props`.
    ///
    /// The entry specifier is handed to the frozen dispatcher unresolved;
    /// it reaches the resolver through the engine's dynamic import like
    /// every nested specifier, so resolution failures are negatively
    /// cached exactly like any other load failure.
    pub async fn render(&mut self, entry: &str, props: Value) -> Result<RenderOutput, SandboxError> {
        props::vet(&props).map_err(|e| SandboxError::Props(e.to_string()))?;

        self.ensure_runtime()?;
        let Some(mut slot) = self.runtime.take() else {
            return Err(SandboxError::Bootstrap(
                "runtime construction yielded no runtime".to_string(),
            ));
        };

        // Per-render context: fresh console buffer, then the dispatch call
        // with both arguments embedded as JSON so they cannot break out of
        // the script literal.
        slot.js.op_state().borrow_mut().put(ConsoleSink::default());
        let dispatch = format!(
            "globalThis.__ssr_internal_render__({}, {})",
            serde_json::to_string(entry).map_err(|e| SandboxError::Render(e.to_string()))?,
            serde_json::to_string(&props).map_err(|e| SandboxError::Render(e.to_string()))?,
        );

        let deadline_ms = self.config.render_timeout_ms();
        let timed_out = Arc::new(AtomicBool::new(false));
        let watchdog = deadline_ms.map(|ms| {
            let handle = slot.js.v8_isolate().thread_safe_handle();
            let fired = timed_out.clone();
            let (done_tx, done_rx) = mpsc::channel::<()>();
            let thread = std::thread::spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) =
                    done_rx.recv_timeout(Duration::from_millis(ms))
                {
                    fired.store(true, Ordering::SeqCst);
                    handle.terminate_execution();
                }
            });
            (done_tx, thread)
        });

        let outcome = drive(&mut slot.js, dispatch).await;

        // Retire the watchdog before the runtime can be dropped.
        if let Some((done_tx, thread)) = watchdog {
            let _ = done_tx.send(());
            let _ = thread.join();
        }

        if slot.heap_hit.load(Ordering::SeqCst) {
            warn!("discarding runtime: render exceeded the heap limit");
            return Err(SandboxError::HeapExhausted);
        }
        if timed_out.load(Ordering::SeqCst) {
            if outcome.is_err() {
                let ms = deadline_ms.unwrap_or(0);
                warn!("discarding runtime: render exceeded the {ms} ms deadline");
                return Err(SandboxError::Timeout(ms));
            }
            // The render finished in the window between the deadline
            // elapsing and the termination landing; undo the pending
            // termination and keep the runtime.
            let _ = slot
                .js
                .v8_isolate()
                .thread_safe_handle()
                .cancel_terminate_execution();
        }

        let console = slot
            .js
            .op_state()
            .borrow_mut()
            .borrow_mut::<ConsoleSink>()
            .take();
        self.runtime = Some(slot);

        match outcome {
            Ok(body) => Ok(RenderOutput { body, console }),
            Err(message) => Err(SandboxError::Render(message)),
        }
    }

    fn ensure_runtime(&mut self) -> Result<(), SandboxError> {
        if self.runtime.is_some() {
            return Ok(());
        }
        debug!(
            "cold start: constructing isolate (root: {})",
            self.config.root_dir().display()
        );

        let root = SandboxRoot::new(self.config.root_dir())
            .map_err(|e| SandboxError::Bootstrap(e.to_string()))?;
        let loader = Rc::new(ConfinedModuleLoader::new(root));

        let create_params = self
            .config
            .heap_limit()
            .map(|bytes| v8::Isolate::create_params().heap_limits(0, bytes));

        let mut js = JsRuntime::new(RuntimeOptions {
            module_loader: Some(loader),
            extensions: vec![ssr_ops::init_ops_and_esm()],
            create_params,
            ..Default::default()
        });

        let heap_hit = Arc::new(AtomicBool::new(false));
        if self.config.heap_limit().is_some() {
            let fired = heap_hit.clone();
            let handle = js.v8_isolate().thread_safe_handle();
            js.add_near_heap_limit_callback(move |current_limit, _initial_limit| {
                if !fired.swap(true, Ordering::SeqCst) {
                    warn!("isolate near heap limit; terminating render");
                    handle.terminate_execution();
                }
                // Grant grace so the termination can unwind before V8
                // aborts the process.
                current_limit + 2 * 1024 * 1024
            });
        }

        {
            let state = js.op_state();
            let mut state = state.borrow_mut();
            state.put(ConsoleSink::default());
            state.put(FetchPolicy::new(self.config.allowed_origins().to_vec()));
        }

        self.runtime = Some(RuntimeSlot { js, heap_hit });
        Ok(())
    }
}

/// Evaluate the dispatch expression and run the event loop until the
/// returned promise settles, producing the coerced body string or the
/// stringified JS error.
async fn drive(js: &mut JsRuntime, dispatch: String) -> Result<String, String> {
    let value = js
        .execute_script("<ssr-dispatch>", dispatch)
        .map_err(|e| e.to_string())?;
    js.run_event_loop(PollEventLoopOptions::default())
        .await
        .map_err(|e| e.to_string())?;

    let scope = &mut js.handle_scope();
    let local = v8::Local::new(scope, &value);
    let settled = match v8::Local::<v8::Promise>::try_from(local) {
        Ok(promise) => match promise.state() {
            v8::PromiseState::Fulfilled => promise.result(scope),
            v8::PromiseState::Rejected => {
                return Err(promise.result(scope).to_rust_string_lossy(scope));
            }
            v8::PromiseState::Pending => {
                return Err(
                    "render did not settle: a promise was still pending after the event loop \
                     drained (sandbox timers never fire)"
                        .to_string(),
                );
            }
        },
        Err(_) => local,
    };
    Ok(settled.to_rust_string_lossy(scope))
}
