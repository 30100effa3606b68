//! DAP TCP server
//!
//! Accepts one client at a time on the configured loopback address. Each
//! connection gets a fresh engine and session controller; a reader task
//! decodes framed requests while the main loop interleaves request handling
//! with controller event forwarding.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::debugger::{DebugEvent, SessionConfig, SessionController, StopReason};
use crate::engine::{Engine, Position};

use super::codec;
use super::types::*;

/// The single script thread exposed to DAP clients.
const THREAD_ID: i64 = 1;

/// Run the DAP server until the process is stopped.
pub async fn serve(config: Config) -> Result<()> {
    let addr = SocketAddr::new(config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "DAP server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::info!(%peer, "client connected");
        let mut connection = Connection::new(&config);
        if let Err(err) = connection.run(stream).await {
            tracing::error!(error = %err, "connection failed");
        }
        connection.controller.shutdown();
        tracing::info!(%peer, "client disconnected");
    }
}

struct Connection {
    seq: i64,
    controller: Arc<SessionController>,
    events: Option<UnboundedReceiver<DebugEvent>>,
    max_message: usize,
    launch_pause_on_entry: bool,
    source_path: Option<String>,
}

impl Connection {
    fn new(config: &Config) -> Self {
        let engine = Engine::new();
        let (controller, events) = SessionController::new(
            engine,
            SessionConfig {
                pause_on_entry: config.defaults.pause_on_entry,
                pause_on_exception: config.defaults.pause_on_exception,
            },
        );
        Self {
            seq: 0,
            controller,
            events: Some(events),
            max_message: config.limits.max_message_mb * 1024 * 1024,
            launch_pause_on_entry: config.defaults.pause_on_entry,
            source_path: None,
        }
    }

    async fn run(&mut self, stream: TcpStream) -> Result<()> {
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let (request_tx, mut request_rx) = mpsc::channel::<RequestMessage>(16);
        let max_message = self.max_message;
        let reader_task = tokio::spawn(async move {
            loop {
                match codec::read_message(&mut reader, max_message).await {
                    Ok(Some(body)) => match serde_json::from_str::<RequestMessage>(&body) {
                        Ok(message) if message.message_type == "request" => {
                            if request_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Ok(message) => {
                            tracing::warn!(kind = %message.message_type, "ignoring message");
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to decode request");
                        }
                    },
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "read failed");
                        break;
                    }
                }
            }
        });

        let mut events = self
            .events
            .take()
            .ok_or_else(|| Error::Internal("connection already ran".to_string()))?;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else { break Ok(()) };
                    match self.handle_request(&mut writer, request).await {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(err) => break Err(err),
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { break Ok(()) };
                    if let Err(err) = self.forward_event(&mut writer, event).await {
                        break Err(err);
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Dispatch one request. Returns `true` when the connection should close.
    async fn handle_request(
        &mut self,
        writer: &mut OwnedWriteHalf,
        request: RequestMessage,
    ) -> Result<bool> {
        tracing::debug!(command = %request.command, seq = request.seq, "request");
        let command = request.command.clone();
        let disconnect = command == "disconnect";

        let outcome = self.dispatch(&request);
        match outcome {
            Ok(body) => {
                self.send_response(writer, &request, true, None, body).await?;
            }
            Err(err) => {
                tracing::debug!(command = %command, error = %err, "request failed");
                self.send_response(writer, &request, false, Some(err.to_string()), None)
                    .await?;
            }
        }

        if command == "initialize" {
            self.send_event(writer, "initialized", None).await?;
        }
        Ok(disconnect)
    }

    fn dispatch(&mut self, request: &RequestMessage) -> Result<Option<serde_json::Value>> {
        match request.command.as_str() {
            "initialize" => {
                let args: InitializeArguments = self.arguments(request)?;
                tracing::info!(
                    client = args.client_id.as_deref().unwrap_or("unknown"),
                    adapter = args.adapter_id.as_deref().unwrap_or(""),
                    "initialize"
                );
                let capabilities = Capabilities {
                    supports_configuration_done_request: true,
                    supports_conditional_breakpoints: true,
                    supports_hit_conditional_breakpoints: true,
                    supports_log_points: true,
                    supports_set_variable: true,
                    supports_terminate_request: true,
                    supports_evaluate_for_hovers: true,
                    supports_function_breakpoints: false,
                    supports_step_back: false,
                };
                Ok(Some(serde_json::to_value(capabilities)?))
            }
            "launch" => {
                let args: LaunchArguments = self.arguments(request)?;
                let source = std::fs::read_to_string(&args.program).map_err(|e| {
                    Error::FileRead {
                        path: args.program.clone(),
                        error: e.to_string(),
                    }
                })?;
                let pause_on_entry = args.stop_on_entry.unwrap_or(self.launch_pause_on_entry);
                self.controller
                    .execute(&args.program, &source, Some(pause_on_entry))?;
                self.source_path = Some(args.program);
                Ok(None)
            }
            "configurationDone" => {
                self.controller.notify_ui_ready()?;
                Ok(None)
            }
            "setBreakpoints" => {
                let args: SetBreakpointsArguments = self.arguments(request)?;
                Ok(Some(serde_json::to_value(self.set_breakpoints(args))?))
            }
            "threads" => {
                let body = ThreadsResponseBody {
                    threads: vec![Thread {
                        id: THREAD_ID,
                        name: "main".to_string(),
                    }],
                };
                Ok(Some(serde_json::to_value(body)?))
            }
            "stackTrace" => {
                let _args: StackTraceArguments = self.arguments(request)?;
                Ok(Some(serde_json::to_value(self.stack_trace()?)?))
            }
            "scopes" => {
                let args: ScopesArguments = self.arguments(request)?;
                let scopes = self
                    .controller
                    .scopes(args.frame_id as usize)?
                    .into_iter()
                    .map(|(name, variables_reference)| Scope {
                        name,
                        variables_reference,
                        expensive: false,
                    })
                    .collect();
                Ok(Some(serde_json::to_value(ScopesResponseBody { scopes })?))
            }
            "variables" => {
                let args: VariablesArguments = self.arguments(request)?;
                let variables = self
                    .controller
                    .variables(args.variables_reference)?
                    .into_iter()
                    .map(|(name, info)| Variable {
                        name,
                        value: info.display(),
                        type_name: Some(info.type_name().to_string()),
                        variables_reference: info.handle(),
                    })
                    .collect();
                Ok(Some(serde_json::to_value(VariablesResponseBody {
                    variables,
                })?))
            }
            "setVariable" => {
                let args: SetVariableArguments = self.arguments(request)?;
                let info = self.controller.set_variable(
                    args.variables_reference,
                    &args.name,
                    &args.value,
                )?;
                let body = SetVariableResponseBody {
                    value: info.display(),
                    type_name: Some(info.type_name().to_string()),
                    variables_reference: info.handle(),
                };
                Ok(Some(serde_json::to_value(body)?))
            }
            "evaluate" => {
                let args: EvaluateArguments = self.arguments(request)?;
                let info = self.controller.evaluate_info(&args.expression)?;
                let body = EvaluateResponseBody {
                    result: info.display(),
                    type_name: Some(info.type_name().to_string()),
                    variables_reference: info.handle(),
                };
                Ok(Some(serde_json::to_value(body)?))
            }
            "continue" => {
                let _args: ContinueArguments = self.arguments(request)?;
                self.controller.run()?;
                let body = ContinueResponseBody {
                    all_threads_continued: true,
                };
                Ok(Some(serde_json::to_value(body)?))
            }
            "next" => {
                let _args: StepArguments = self.arguments(request)?;
                self.controller.step_over()?;
                Ok(None)
            }
            "stepIn" => {
                let _args: StepArguments = self.arguments(request)?;
                self.controller.step_into()?;
                Ok(None)
            }
            "stepOut" => {
                let _args: StepArguments = self.arguments(request)?;
                self.controller.step_out()?;
                Ok(None)
            }
            "pause" => {
                self.controller.pause()?;
                Ok(None)
            }
            "terminate" | "disconnect" => {
                self.controller.terminate()?;
                Ok(None)
            }
            other => Err(Error::UnsupportedRequest(other.to_string())),
        }
    }

    fn arguments<T: serde::de::DeserializeOwned>(&self, request: &RequestMessage) -> Result<T> {
        let arguments = request
            .arguments
            .clone()
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(arguments)
            .map_err(|e| Error::DapProtocol(format!("invalid arguments: {e}")))
    }

    /// DAP replaces the whole breakpoint set per request.
    fn set_breakpoints(&self, args: SetBreakpointsArguments) -> SetBreakpointsResponseBody {
        let source_id = args
            .source
            .path
            .clone()
            .or_else(|| args.source.name.clone())
            .unwrap_or_default();
        self.controller.clear_breakpoints();

        let mut breakpoints = Vec::with_capacity(args.breakpoints.len());
        for bp in &args.breakpoints {
            let column = bp.column.map(|c| c.saturating_sub(1)).unwrap_or(0);
            let requested = Position::new(bp.line, column);
            match self.controller.set_breakpoint(
                &source_id,
                requested,
                bp.condition.clone(),
                bp.hit_condition.clone(),
                bp.log_message.clone(),
            ) {
                Ok(snapped) => breakpoints.push(Breakpoint {
                    verified: true,
                    message: None,
                    line: Some(snapped.line),
                    column: Some(snapped.column + 1),
                }),
                Err(err) => breakpoints.push(Breakpoint {
                    verified: false,
                    message: Some(err.to_string()),
                    line: Some(bp.line),
                    column: bp.column,
                }),
            }
        }
        SetBreakpointsResponseBody { breakpoints }
    }

    fn stack_trace(&self) -> Result<StackTraceResponseBody> {
        let info = self
            .controller
            .pause_state()
            .ok_or_else(|| Error::invalid_state("inspect stack", self.controller.state()))?;
        let source = self.source_path.as_ref().map(|path| Source {
            name: Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            path: Some(path.clone()),
            source_reference: None,
        });
        let stack_frames: Vec<StackFrame> = info
            .frames
            .iter()
            .enumerate()
            .map(|(i, frame)| StackFrame {
                id: i as i64,
                name: frame.name.clone(),
                source: source.clone(),
                line: frame.position.line,
                column: frame.position.column + 1,
            })
            .collect();
        Ok(StackTraceResponseBody {
            total_frames: stack_frames.len() as i64,
            stack_frames,
        })
    }

    // === Wire helpers ===

    fn next_seq(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    async fn send_response(
        &mut self,
        writer: &mut OwnedWriteHalf,
        request: &RequestMessage,
        success: bool,
        message: Option<String>,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        let response = ResponseMessage {
            seq: self.next_seq(),
            message_type: "response".to_string(),
            request_seq: request.seq,
            success,
            command: request.command.clone(),
            message,
            body,
        };
        codec::write_message(writer, &serde_json::to_string(&response)?).await
    }

    async fn send_event(
        &mut self,
        writer: &mut OwnedWriteHalf,
        event: &str,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        let message = EventMessage {
            seq: self.next_seq(),
            message_type: "event".to_string(),
            event: event.to_string(),
            body,
        };
        codec::write_message(writer, &serde_json::to_string(&message)?).await
    }

    async fn forward_event(
        &mut self,
        writer: &mut OwnedWriteHalf,
        event: DebugEvent,
    ) -> Result<()> {
        match event {
            DebugEvent::Stopped { reason, info } => {
                let description = match reason {
                    StopReason::DebuggerStatement => Some("debugger statement".to_string()),
                    StopReason::Exception => info.exception.clone(),
                    _ => None,
                };
                let body = StoppedEventBody {
                    reason: reason.as_dap_str().to_string(),
                    description,
                    thread_id: THREAD_ID,
                    all_threads_stopped: true,
                };
                self.send_event(writer, "stopped", Some(serde_json::to_value(body)?))
                    .await
            }
            DebugEvent::Continued => {
                let body = ContinuedEventBody {
                    thread_id: THREAD_ID,
                    all_threads_continued: true,
                };
                self.send_event(writer, "continued", Some(serde_json::to_value(body)?))
                    .await
            }
            DebugEvent::LogPoint { message, info } => {
                let body = OutputEventBody {
                    category: "console".to_string(),
                    output: format!("{message}\n"),
                    line: Some(info.position.line),
                };
                self.send_event(writer, "output", Some(serde_json::to_value(body)?))
                    .await
            }
            DebugEvent::Done => {
                let exited = ExitedEventBody { exit_code: 0 };
                self.send_event(writer, "exited", Some(serde_json::to_value(exited)?))
                    .await?;
                self.send_event(
                    writer,
                    "terminated",
                    Some(json!(TerminatedEventBody { restart: false })),
                )
                .await
            }
            DebugEvent::Cancelled => {
                self.send_event(
                    writer,
                    "terminated",
                    Some(json!(TerminatedEventBody { restart: false })),
                )
                .await
            }
            DebugEvent::Faulted(message) => {
                let body = OutputEventBody {
                    category: "stderr".to_string(),
                    output: format!("{message}\n"),
                    line: None,
                };
                self.send_event(writer, "output", Some(serde_json::to_value(body)?))
                    .await?;
                self.send_event(
                    writer,
                    "terminated",
                    Some(json!(TerminatedEventBody { restart: false })),
                )
                .await
            }
        }
    }
}
