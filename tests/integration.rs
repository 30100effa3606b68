//! End-to-end tests for the debug session
//!
//! Drives the session controller and the embedded engine through the public
//! API, asserting on the event stream a DAP client would observe: stop
//! reasons, continued/stopped alternation, logpoint output and termination
//! behavior.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

use script_dap::debugger::{DebugEvent, SessionConfig, SessionController, StopReason};
use script_dap::engine::{DebugInformation, Engine, Position, Value};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

struct Session {
    controller: Arc<SessionController>,
    events: UnboundedReceiver<DebugEvent>,
}

fn launch(source: &str, pause_on_entry: bool) -> Session {
    launch_with(source, pause_on_entry, false)
}

fn launch_with(source: &str, pause_on_entry: bool, pause_on_exception: bool) -> Session {
    let engine = Engine::new();
    let (controller, events) = SessionController::new(
        engine,
        SessionConfig {
            pause_on_entry,
            pause_on_exception,
        },
    );
    controller
        .execute("main.js", source, Some(pause_on_entry))
        .expect("launch failed");
    Session { controller, events }
}

impl Session {
    fn start(&self) {
        self.controller.notify_ui_ready().expect("start failed");
    }

    fn next_event(&mut self) -> DebugEvent {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            match self.events.try_recv() {
                Ok(event) => return event,
                Err(TryRecvError::Empty) => {
                    assert!(Instant::now() < deadline, "timed out waiting for event");
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(TryRecvError::Disconnected) => panic!("event channel closed"),
            }
        }
    }

    fn expect_stopped(&mut self, reason: StopReason) -> Arc<DebugInformation> {
        match self.next_event() {
            DebugEvent::Stopped {
                reason: actual,
                info,
            } => {
                assert_eq!(actual, reason, "unexpected stop reason");
                info
            }
            other => panic!("expected Stopped({reason:?}), got {other:?}"),
        }
    }

    fn expect_continued(&mut self) {
        match self.next_event() {
            DebugEvent::Continued => {}
            other => panic!("expected Continued, got {other:?}"),
        }
    }

    fn expect_done(&mut self) {
        match self.next_event() {
            DebugEvent::Done => {}
            other => panic!("expected Done, got {other:?}"),
        }
    }

    /// Collect every remaining event through session completion.
    fn drain_to_completion(&mut self) -> Vec<DebugEvent> {
        let mut events = Vec::new();
        loop {
            let event = self.next_event();
            let last = matches!(
                event,
                DebugEvent::Done | DebugEvent::Cancelled | DebugEvent::Faulted(_)
            );
            events.push(event);
            if last {
                return events;
            }
        }
    }

    fn eval_number(&self, expression: &str) -> f64 {
        match self.controller.evaluate(expression).expect("evaluate failed") {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }
}

// === Literal end-to-end scenarios ===

#[test]
fn test_pause_on_entry_and_step() {
    let mut session = launch("var x = 1; var y = 2;", true);
    session.start();

    let info = session.expect_stopped(StopReason::Entry);
    assert_eq!(info.position, Position::new(1, 0));

    session.controller.step_over().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.position, Position::new(1, 11));

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_conditional_breakpoint_stops_once() {
    let mut session = launch("for (var i=0;i<3;i++){ x=i; }", false);
    let snapped = session
        .controller
        .set_breakpoint(
            "main.js",
            Position::new(1, 21),
            Some("i === 2".to_string()),
            None,
            None,
        )
        .unwrap();
    assert_eq!(snapped, Position::new(1, 23));
    session.start();

    let info = session.expect_stopped(StopReason::Breakpoint);
    assert_eq!(info.position, Position::new(1, 23));
    assert_eq!(session.eval_number("i"), 2.0);

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_hit_count_breakpoint() {
    let mut session = launch("for (var i=0;i<3;i++){ x=i; }", false);
    session
        .controller
        .set_breakpoint(
            "main.js",
            Position::new(1, 23),
            None,
            Some(">= 2".to_string()),
            None,
        )
        .unwrap();
    session.start();

    // No stop for i = 0 (first hit); stops on the second and third hits.
    session.expect_stopped(StopReason::Breakpoint);
    assert_eq!(session.eval_number("i"), 1.0);
    session.controller.run().unwrap();
    session.expect_continued();

    session.expect_stopped(StopReason::Breakpoint);
    assert_eq!(session.eval_number("i"), 2.0);
    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_logpoint_never_stops() {
    let mut session = launch("for (var i=0;i<3;i++){ x=i; }", false);
    session
        .controller
        .set_breakpoint(
            "main.js",
            Position::new(1, 23),
            None,
            None,
            Some("\"i is \" + i".to_string()),
        )
        .unwrap();
    session.start();

    let events = session.drain_to_completion();
    let messages: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            DebugEvent::LogPoint { message, .. } => Some(message.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(messages, vec!["i is 0", "i is 1", "i is 2"]);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, DebugEvent::Stopped { .. })),
        "logpoint must not stop execution"
    );
    assert!(matches!(events.last(), Some(DebugEvent::Done)));
}

#[test]
fn test_debugger_statement_always_stops() {
    let mut session = launch("var x=1; debugger; var y=2;", false);
    session.start();

    let info = session.expect_stopped(StopReason::DebuggerStatement);
    assert_eq!(info.position, Position::new(1, 9));

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_terminate_mid_pause() {
    let mut session = launch("var x = 1; var y = 2;", true);
    session.start();
    session.expect_stopped(StopReason::Entry);

    session.controller.terminate().unwrap();
    let events = session.drain_to_completion();
    assert!(matches!(events.last(), Some(DebugEvent::Cancelled)));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, DebugEvent::Stopped { .. } | DebugEvent::Done)),
        "no stop or completion may follow a terminate"
    );
}

// === Ordering and lifecycle invariants ===

#[test]
fn test_exactly_one_continued_between_stops() {
    let mut session = launch("for (var i=0;i<4;i++){ x=i; }", false);
    session
        .controller
        .set_breakpoint("main.js", Position::new(1, 23), None, None, None)
        .unwrap();
    session.start();

    let mut transcript = Vec::new();
    loop {
        let event = session.next_event();
        match &event {
            DebugEvent::Stopped { .. } => {
                transcript.push('S');
                session.controller.run().unwrap();
            }
            DebugEvent::Continued => transcript.push('C'),
            DebugEvent::Done => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    let transcript: String = transcript.into_iter().collect();
    assert_eq!(transcript, "SCSCSCSC");
}

#[test]
fn test_pause_during_free_run() {
    let mut session = launch("var i = 0; while (true) { i = i + 1; }", false);
    session.start();

    std::thread::sleep(Duration::from_millis(30));
    session.controller.pause().unwrap();
    session.expect_stopped(StopReason::Pause);
    assert!(session.eval_number("i") >= 0.0);

    session.controller.terminate().unwrap();
    let events = session.drain_to_completion();
    assert!(matches!(events.last(), Some(DebugEvent::Cancelled)));
}

#[test]
fn test_terminate_during_free_run() {
    let mut session = launch("var i = 0; while (true) { i = i + 1; }", false);
    session.start();

    std::thread::sleep(Duration::from_millis(30));
    session.controller.terminate().unwrap();
    let events = session.drain_to_completion();
    assert!(matches!(events.last(), Some(DebugEvent::Cancelled)));
    assert!(!events
        .iter()
        .any(|event| matches!(event, DebugEvent::Stopped { .. })));
}

#[test]
fn test_step_into_and_out_of_calls() {
    let source = "\
function inner() { var a = 1; return a; }
function outer() { var b = inner(); return b; }
var r = outer();
var done = 1;";
    let mut session = launch(source, true);
    session.start();

    // Entry at the first function declaration, then step to the call.
    session.expect_stopped(StopReason::Entry);
    session.controller.step_over().unwrap();
    session.expect_continued();
    session.expect_stopped(StopReason::Step);
    session.controller.step_over().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.position.line, 3);
    assert_eq!(info.frames.len(), 1);

    // Into `outer`.
    session.controller.step_into().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.frames.len(), 2);
    assert_eq!(info.frames[0].name, "outer");

    // Into `inner`.
    session.controller.step_into().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.frames.len(), 3);
    assert_eq!(info.frames[0].name, "inner");

    // Out of `inner` lands at the next statement of `outer`.
    session.controller.step_out().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.frames.len(), 2);
    assert_eq!(info.frames[0].name, "outer");
    assert_eq!(info.position.line, 2);

    // Out again lands back at the top level, past the call.
    session.controller.step_out().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.frames.len(), 1);
    assert_eq!(info.position.line, 4);

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_step_over_skips_call_body() {
    let source = "\
function f() { var a = 1; var b = 2; return a + b; }
var r = f();
var done = 1;";
    let mut session = launch(source, true);
    session.start();

    session.expect_stopped(StopReason::Entry);
    session.controller.step_over().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.position.line, 2);

    // Stepping over the call must not stop inside `f`.
    session.controller.step_over().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Step);
    assert_eq!(info.position.line, 3);
    assert_eq!(info.frames.len(), 1);
    assert_eq!(session.eval_number("r"), 3.0);

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_breakpoint_inside_call_during_step_over() {
    // A breakpoint in a frame being stepped over still stops execution.
    let source = "\
function f() { var a = 1; return a; }
var r = f();
var done = 1;";
    let mut session = launch(source, true);
    session
        .controller
        .set_breakpoint("main.js", Position::new(1, 15), None, None, None)
        .unwrap();
    session.start();

    session.expect_stopped(StopReason::Entry);
    session.controller.step_over().unwrap();
    session.expect_continued();
    session.expect_stopped(StopReason::Step);

    session.controller.step_over().unwrap();
    session.expect_continued();
    let info = session.expect_stopped(StopReason::Breakpoint);
    assert_eq!(info.frames.len(), 2);
    assert_eq!(info.frames[0].name, "f");

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_uncaught_fault_surfaces() {
    let mut session = launch("var x = 1; var y = missing;", false);
    session.start();

    let events = session.drain_to_completion();
    match events.last() {
        Some(DebugEvent::Faulted(message)) => {
            assert!(message.contains("missing is not defined"), "got: {message}");
        }
        other => panic!("expected Faulted, got {other:?}"),
    }
}

#[test]
fn test_pause_on_exception() {
    let mut session = launch_with("var x = 1; var y = missing;", false, true);
    session.start();

    let info = session.expect_stopped(StopReason::Exception);
    assert!(info.exception.as_deref().unwrap().contains("missing"));

    session.controller.run().unwrap();
    session.expect_continued();
    let events = session.drain_to_completion();
    assert!(matches!(events.last(), Some(DebugEvent::Faulted(_))));
}

// === Variable inspection ===

#[test]
fn test_scopes_variables_and_lazy_getters() {
    let source = "\
var obj = { n: 1, get lazy() { return 99; } };
var arr = [1, 2, 3];
debugger;
var end = 1;";
    let mut session = launch(source, false);
    session.start();
    session.expect_stopped(StopReason::DebuggerStatement);

    let scopes = session.controller.scopes(0).unwrap();
    assert_eq!(scopes.len(), 1);
    assert_eq!(scopes[0].0, "Global");
    let scope_handle = scopes[0].1;

    let variables = session.controller.variables(scope_handle).unwrap();
    let names: Vec<&str> = variables.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["obj", "arr"]);

    // Object members: the getter is not invoked during enumeration.
    let obj_handle = variables[0].1.handle();
    assert!(obj_handle > 0);
    let members = session.controller.variables(obj_handle).unwrap();
    assert_eq!(members[0].0, "n");
    assert_eq!(members[0].1.display(), "1");
    assert_eq!(members[1].0, "lazy");
    let getter_handle = members[1].1.handle();
    assert!(getter_handle > 0);

    // Expanding the getter handle runs it.
    let expanded = session.controller.variables(getter_handle).unwrap();
    assert_eq!(expanded[0].0, "(result)");
    assert_eq!(expanded[0].1.display(), "99");

    // Array members.
    let arr_handle = variables[1].1.handle();
    let elements = session.controller.variables(arr_handle).unwrap();
    assert_eq!(elements[0].0, "length");
    assert_eq!(elements[0].1.display(), "3");
    assert_eq!(elements[1].1.display(), "1");

    // setVariable evaluates its value expression and re-materializes.
    let info = session
        .controller
        .set_variable(obj_handle, "n", "40 + 2")
        .unwrap();
    assert_eq!(info.display(), "42");
    assert_eq!(session.eval_number("obj.n"), 42.0);

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_handles_stay_valid_across_pauses() {
    let source = "var obj = { n: 1 }; debugger; debugger; var end = 1;";
    let mut session = launch(source, false);
    session.start();
    session.expect_stopped(StopReason::DebuggerStatement);

    let scope_handle = session.controller.scopes(0).unwrap()[0].1;
    let obj_handle = session.controller.variables(scope_handle).unwrap()[0]
        .1
        .handle();

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_stopped(StopReason::DebuggerStatement);

    // Handles from the previous pause still resolve.
    let members = session.controller.variables(obj_handle).unwrap();
    assert_eq!(members[0].0, "n");

    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_variable_queries_rejected_while_running() {
    let mut session = launch("var i = 0; while (true) { i = i + 1; }", false);
    session.start();

    assert!(session.controller.variables(1).is_err());
    assert!(session.controller.evaluate("i").is_err());

    session.controller.terminate().unwrap();
    session.drain_to_completion();
}

// === Breakpoint table round trips ===

#[test]
fn test_clear_and_reset_breakpoints() {
    let mut session = launch("for (var i=0;i<3;i++){ x=i; }", false);
    let position = Position::new(1, 23);
    session
        .controller
        .set_breakpoint("main.js", position, None, None, None)
        .unwrap();
    session.controller.clear_breakpoints();
    // Clearing twice is a no-op.
    session.controller.clear_breakpoints();
    session
        .controller
        .set_breakpoint("main.js", position, None, None, None)
        .unwrap();
    session.start();

    session.expect_stopped(StopReason::Breakpoint);
    session.controller.run().unwrap();
    session.expect_continued();
    // The table was reset, so hit counting restarted from zero.
    session.expect_stopped(StopReason::Breakpoint);
    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_stopped(StopReason::Breakpoint);
    session.controller.run().unwrap();
    session.expect_continued();
    session.expect_done();
}

#[test]
fn test_cleared_breakpoints_do_not_fire() {
    let mut session = launch("for (var i=0;i<3;i++){ x=i; }", false);
    session
        .controller
        .set_breakpoint("main.js", Position::new(1, 23), None, None, None)
        .unwrap();
    session.controller.clear_breakpoints();
    session.start();

    let events = session.drain_to_completion();
    assert!(matches!(events.last(), Some(DebugEvent::Done)));
    assert!(!events
        .iter()
        .any(|event| matches!(event, DebugEvent::Stopped { .. })));
}

#[test]
fn test_snapped_position_returned_to_client() {
    let session = launch("var x = 1;\n\nvar y = 2;", false);
    let snapped = session
        .controller
        .set_breakpoint("main.js", Position::new(2, 0), None, None, None)
        .unwrap();
    assert_eq!(snapped, Position::new(3, 0));
    session.controller.terminate().unwrap();
}
