//! Session controller
//!
//! Owns the debugger state machine, the interpreter-thread rendezvous,
//! breakpoint evaluation and event emission. All client commands funnel
//! here; all engine callbacks funnel here. A single coarse lock guards the
//! controller state — the interpreter thread re-enters only inside
//! callbacks, and it is the only thread that ever blocks on the rendezvous.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::common::{Error, Result};
use crate::engine::{
    BreakKind, DebugHooks, DebugInformation, Engine, Evaluator, ExprEvaluator, Position, StepMode,
    Value,
};

use super::breakpoints::{Breakpoint, BreakpointTable, HitCondition, HitOutcome};
use super::events::{DebugEvent, DebuggerState, StepIntent, StopReason};
use super::registry::ScriptRegistry;
use super::rendezvous::Rendezvous;
use super::variables::{DebugScope, ValueInfo, VariableStore};

/// Per-session behavior knobs, defaulted from the configuration file.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pause_on_entry: bool,
    pub pause_on_exception: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pause_on_entry: true,
            pause_on_exception: false,
        }
    }
}

struct Inner {
    state: DebuggerState,
    launched: bool,
    /// True while the interpreter thread is blocked in the rendezvous.
    paused: bool,
    /// Step mode of the most recent resume; what non-pausing callbacks hand
    /// back so a pending step survives a suppressed breakpoint.
    last_mode: StepMode,
    pause_on_entry: bool,
    pause_on_exception: bool,
    registry: ScriptRegistry,
    breakpoints: BreakpointTable,
    variables: VariableStore,
    /// Snapshot of the current pause; only meaningful while `paused`.
    current: Option<Arc<DebugInformation>>,
}

/// The session controller. One per debug session; a fresh session is a
/// fresh object graph.
pub struct SessionController {
    inner: Mutex<Inner>,
    rendezvous: Rendezvous,
    engine: Arc<Engine>,
    events: UnboundedSender<DebugEvent>,
    evaluator: Arc<dyn Evaluator>,
}

impl SessionController {
    pub fn new(
        engine: Arc<Engine>,
        config: SessionConfig,
    ) -> (Arc<Self>, UnboundedReceiver<DebugEvent>) {
        let (tx, rx) = unbounded_channel();
        let controller = Arc::new(Self {
            inner: Mutex::new(Inner {
                state: DebuggerState::WaitingForUi,
                launched: false,
                paused: false,
                last_mode: StepMode::None,
                pause_on_entry: config.pause_on_entry,
                pause_on_exception: config.pause_on_exception,
                registry: ScriptRegistry::new(),
                breakpoints: BreakpointTable::new(),
                variables: VariableStore::new(),
                current: None,
            }),
            rendezvous: Rendezvous::new(),
            engine,
            events: tx,
            evaluator: Arc::new(ExprEvaluator),
        });
        (controller, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    fn send_event(&self, event: DebugEvent) {
        // A dropped receiver just means the client went away.
        let _ = self.events.send(event);
    }

    // === Public operations (client thread) ===

    /// Parse and register the script, then spawn the interpreter thread. The
    /// thread is held at the rendezvous until [`Self::notify_ui_ready`].
    pub fn execute(
        self: &Arc<Self>,
        source_id: &str,
        source: &str,
        pause_on_entry: Option<bool>,
    ) -> Result<()> {
        let program = Arc::new(crate::engine::parse(source)?);
        {
            let mut inner = self.lock();
            if inner.launched {
                return Err(Error::invalid_state("launch", inner.state));
            }
            inner.registry.register(source_id, program.clone())?;
            if let Some(pause_on_entry) = pause_on_entry {
                inner.pause_on_entry = pause_on_entry;
            }
            inner.launched = true;
            inner.state = DebuggerState::WaitingForUi;
        }
        self.engine.attach(self.clone() as Arc<dyn DebugHooks>)?;

        let controller = self.clone();
        let engine = self.engine.clone();
        let id = source_id.to_string();
        std::thread::Builder::new()
            .name(format!("interp-{id}"))
            .spawn(move || {
                controller.rendezvous.wait();
                let result = if engine.is_cancelled() {
                    Err(Error::Cancelled)
                } else {
                    engine.run(&id, &program)
                };
                // Detach runs on every exit path, fault or not.
                engine.detach();
                let event = match result {
                    Ok(()) if engine.is_cancelled() => DebugEvent::Cancelled,
                    Ok(()) => DebugEvent::Done,
                    Err(Error::Cancelled) => DebugEvent::Cancelled,
                    Err(err) => DebugEvent::Faulted(err.to_string()),
                };
                tracing::debug!(source = %id, "interpreter finished");
                controller.send_event(event);
            })
            .map_err(|e| Error::Internal(format!("failed to spawn interpreter thread: {e}")))?;

        tracing::info!(source = source_id, "execution launched, waiting for client");
        Ok(())
    }

    /// Release the interpreter for its first statement.
    pub fn notify_ui_ready(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if !inner.launched || inner.state != DebuggerState::WaitingForUi {
                return Err(Error::invalid_state("start execution", inner.state));
            }
            inner.state = DebuggerState::Entering;
        }
        self.rendezvous.release(StepIntent::None);
        Ok(())
    }

    /// Request a pause; takes effect at the next statement boundary.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.paused {
            return Err(Error::invalid_state("pause", "paused"));
        }
        match inner.state {
            DebuggerState::Entering | DebuggerState::Running | DebuggerState::Stepping => {
                inner.state = DebuggerState::Pausing;
                // The engine may be free-running with step delivery off.
                self.engine.request_step();
                Ok(())
            }
            DebuggerState::Pausing => Ok(()),
            state => Err(Error::invalid_state("pause", state)),
        }
    }

    /// Resume free running.
    pub fn run(&self) -> Result<()> {
        self.resume("resume", StepIntent::None, DebuggerState::Running)
    }

    pub fn step_over(&self) -> Result<()> {
        self.resume("step", StepIntent::Over, DebuggerState::Stepping)
    }

    pub fn step_into(&self) -> Result<()> {
        self.resume("step", StepIntent::Into, DebuggerState::Stepping)
    }

    pub fn step_out(&self) -> Result<()> {
        self.resume("step", StepIntent::Out, DebuggerState::Stepping)
    }

    fn resume(&self, action: &str, intent: StepIntent, next_state: DebuggerState) -> Result<()> {
        {
            let mut inner = self.lock();
            if !inner.paused {
                return Err(Error::invalid_state(action, inner.state));
            }
            inner.state = next_state;
        }
        self.rendezvous.release(intent);
        Ok(())
    }

    /// Cancel execution. Valid in any state; the cancellation token is
    /// signalled before the state write so callbacks observe it first.
    pub fn terminate(&self) -> Result<()> {
        self.engine.cancel();
        {
            let mut inner = self.lock();
            inner.state = DebuggerState::Terminating;
        }
        self.rendezvous.release(StepIntent::None);
        tracing::info!("termination requested");
        Ok(())
    }

    /// Session teardown: cancel execution and drop all variable handles.
    pub fn shutdown(&self) {
        let _ = self.terminate();
        self.lock().variables.clear();
    }

    /// Snap a breakpoint to a valid position, store it and mirror it (with
    /// its condition) into the engine. Returns the snapped position.
    pub fn set_breakpoint(
        &self,
        source: &str,
        pos: Position,
        condition: Option<String>,
        hit_condition: Option<String>,
        log_message: Option<String>,
    ) -> Result<Position> {
        let hit_condition = match hit_condition {
            Some(text) => Some(HitCondition::parse(&text).ok_or_else(|| {
                Error::Evaluation(format!("invalid hit condition '{text}'"))
            })?),
            None => None,
        };
        let snapped = {
            let mut inner = self.lock();
            let snapped = inner.registry.snap_breakpoint(source, pos)?;
            inner.breakpoints.set(Breakpoint {
                source: source.to_string(),
                position: snapped,
                condition: condition.clone(),
                hit_condition,
                log_message,
                hit_count: 0,
            });
            snapped
        };
        self.engine.set_breakpoint(source, snapped, condition);
        tracing::debug!(source, requested = %pos, snapped = %snapped, "breakpoint set");
        Ok(snapped)
    }

    pub fn clear_breakpoints(&self) {
        self.lock().breakpoints.clear();
        self.engine.clear_breakpoints();
    }

    /// Evaluate a watch expression in the current top frame.
    pub fn evaluate(&self, expression: &str) -> Result<Value> {
        let frame = self.current_top_frame("evaluate")?;
        self.evaluator.evaluate(expression, &frame)
    }

    /// Evaluate and materialize, registering a handle for expandable results.
    pub fn evaluate_info(&self, expression: &str) -> Result<ValueInfo> {
        let value = self.evaluate(expression)?;
        Ok(self.lock().variables.create_value(&value))
    }

    /// The current pause snapshot, if suspended.
    pub fn pause_state(&self) -> Option<Arc<DebugInformation>> {
        let inner = self.lock();
        if inner.paused {
            inner.current.clone()
        } else {
            None
        }
    }

    pub fn state(&self) -> DebuggerState {
        self.lock().state
    }

    /// Register scope containers for a frame of the current pause. Returns
    /// `(name, variable reference)` pairs.
    pub fn scopes(&self, frame_index: usize) -> Result<Vec<(String, i64)>> {
        let mut inner = self.lock();
        if !inner.paused {
            return Err(Error::invalid_state("inspect scopes", inner.state));
        }
        let info = inner
            .current
            .clone()
            .ok_or_else(|| Error::Internal("paused without debug information".to_string()))?;
        let frame = info
            .frames
            .get(frame_index)
            .ok_or_else(|| Error::Internal(format!("no frame {frame_index}")))?;

        let mut root = frame.env.clone();
        loop {
            let parent = root.lock().unwrap().parent.clone();
            match parent {
                Some(parent) => root = parent,
                None => break,
            }
        }

        if Arc::ptr_eq(&root, &frame.env) {
            let global = inner.variables.add_scope(
                DebugScope {
                    name: "Global".to_string(),
                    env: root,
                },
                Some(frame.clone()),
            );
            Ok(vec![("Global".to_string(), global)])
        } else {
            let local = inner.variables.add_scope(
                DebugScope {
                    name: "Local".to_string(),
                    env: frame.env.clone(),
                },
                Some(frame.clone()),
            );
            let global = inner.variables.add_scope(
                DebugScope {
                    name: "Global".to_string(),
                    env: root,
                },
                None,
            );
            Ok(vec![
                ("Local".to_string(), local),
                ("Global".to_string(), global),
            ])
        }
    }

    /// Enumerate a variable container. Valid only while paused.
    pub fn variables(&self, handle: i64) -> Result<Vec<(String, ValueInfo)>> {
        let mut inner = self.lock();
        if !inner.paused {
            return Err(Error::invalid_state("inspect variables", inner.state));
        }
        inner.variables.children(handle, self.evaluator.as_ref())
    }

    /// Assign a member of a container; the value is an expression evaluated
    /// in the current top frame.
    pub fn set_variable(
        &self,
        parent_handle: i64,
        name: &str,
        value_expression: &str,
    ) -> Result<ValueInfo> {
        let frame = self.current_top_frame("set variable")?;
        let value = self.evaluator.evaluate(value_expression, &frame)?;
        self.lock().variables.set_variable(parent_handle, name, value)
    }

    fn current_top_frame(&self, action: &str) -> Result<crate::engine::FrameSnapshot> {
        let inner = self.lock();
        if !inner.paused {
            return Err(Error::invalid_state(action, inner.state));
        }
        inner
            .current
            .as_ref()
            .and_then(|info| info.frames.first().cloned())
            .ok_or_else(|| Error::Internal("paused without a current frame".to_string()))
    }

    // === Interpreter-thread side ===

    /// Run the breakpoint hit evaluation for this statement, emitting a
    /// logpoint event when one fires.
    fn evaluate_hit(
        &self,
        inner: &mut Inner,
        info: &Arc<DebugInformation>,
        breakpoint: Option<Position>,
    ) -> HitOutcome {
        if breakpoint.is_none() {
            return HitOutcome::Continue;
        }
        let Some(frame) = info.frames.first().cloned() else {
            return HitOutcome::Continue;
        };
        let evaluator = self.evaluator.clone();
        let eval = move |expression: &str| evaluator.evaluate(expression, &frame);
        let outcome = inner
            .breakpoints
            .evaluate_hit(&info.source, info.position, breakpoint, &eval);
        if let HitOutcome::Log(message) = &outcome {
            self.send_event(DebugEvent::LogPoint {
                message: message.clone(),
                info: info.clone(),
            });
        }
        outcome
    }

    /// Suspend the interpreter thread until a client command releases it.
    ///
    /// Emits `Stopped` before blocking and `Continued` after waking; the
    /// released step intent becomes the engine's next step mode.
    fn pause_and_wait(
        &self,
        mut guard: MutexGuard<'_, Inner>,
        reason: StopReason,
        info: &Arc<DebugInformation>,
    ) -> Result<StepMode> {
        guard.paused = true;
        guard.current = Some(info.clone());
        tracing::debug!(?reason, position = %info.position, "stopped");
        self.send_event(DebugEvent::Stopped {
            reason,
            info: info.clone(),
        });
        drop(guard);

        let resume = self.rendezvous.wait();

        let mut guard = self.lock();
        guard.paused = false;
        self.send_event(DebugEvent::Continued);
        if guard.state == DebuggerState::Terminating {
            return Err(Error::Cancelled);
        }
        let mode = match resume.intent {
            StepIntent::None => StepMode::None,
            StepIntent::Over => StepMode::Over,
            StepIntent::Into => StepMode::Into,
            StepIntent::Out => StepMode::Out,
        };
        guard.last_mode = mode;
        Ok(mode)
    }
}

impl DebugHooks for SessionController {
    fn on_step(
        &self,
        info: &Arc<DebugInformation>,
        breakpoint: Option<Position>,
    ) -> Result<StepMode> {
        if self.engine.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut inner = self.lock();
        match inner.state {
            DebuggerState::Terminating => Err(Error::Cancelled),
            DebuggerState::WaitingForUi => Err(Error::Internal(
                "step callback before client readiness".to_string(),
            )),
            DebuggerState::Entering => {
                if !inner.pause_on_entry {
                    inner.state = DebuggerState::Running;
                    return Ok(StepMode::None);
                }
                inner.state = DebuggerState::Stepping;
                self.evaluate_hit(&mut inner, info, breakpoint);
                self.pause_and_wait(inner, StopReason::Entry, info)
            }
            DebuggerState::Running => {
                // Evaluated even during free run so logpoints still fire.
                let outcome = self.evaluate_hit(&mut inner, info, breakpoint);
                if outcome == HitOutcome::Break {
                    inner.state = DebuggerState::Stepping;
                    self.pause_and_wait(inner, StopReason::Breakpoint, info)
                } else {
                    Ok(StepMode::None)
                }
            }
            DebuggerState::Pausing => {
                self.evaluate_hit(&mut inner, info, breakpoint);
                inner.state = DebuggerState::Stepping;
                self.pause_and_wait(inner, StopReason::Pause, info)
            }
            DebuggerState::Stepping => {
                self.evaluate_hit(&mut inner, info, breakpoint);
                self.pause_and_wait(inner, StopReason::Step, info)
            }
        }
    }

    fn on_break(&self, info: &Arc<DebugInformation>, kind: BreakKind) -> Result<StepMode> {
        if self.engine.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut inner = self.lock();
        if inner.state == DebuggerState::Terminating {
            return Err(Error::Cancelled);
        }
        match kind {
            BreakKind::DebuggerStatement => {
                inner.state = DebuggerState::Stepping;
                self.pause_and_wait(inner, StopReason::DebuggerStatement, info)
            }
            BreakKind::Breakpoint(position) => {
                let outcome = self.evaluate_hit(&mut inner, info, Some(position));
                if outcome == HitOutcome::Break {
                    inner.state = DebuggerState::Stepping;
                    self.pause_and_wait(inner, StopReason::Breakpoint, info)
                } else {
                    // A suppressed stop must not clobber a pending step.
                    Ok(inner.last_mode)
                }
            }
            BreakKind::Exception(_) => {
                if inner.pause_on_exception {
                    inner.state = DebuggerState::Stepping;
                    self.pause_and_wait(inner, StopReason::Exception, info)
                } else {
                    Ok(inner.last_mode)
                }
            }
        }
    }
}
