//! Tree-walking interpreter with debug hook delivery
//!
//! The interpreter runs on a dedicated thread. At every statement it checks
//! the cancellation token, then delivers a step callback (per the current
//! step mode) or a break callback (at registered breakpoints and `debugger`
//! statements). Breakpoint conditions are evaluated here, engine-side, before
//! a break callback fires; a condition that throws counts as not matching.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::common::{Error, Result};

use super::ast::{BinaryOp, Expr, ExprKind, ObjectProp, Position, Program, Stmt, StmtKind, UnaryOp};
use super::hooks::{
    BreakKind, CancelToken, DebugHooks, DebugInformation, Evaluator, FrameSnapshot, StepMode,
};
use super::parser::parse_expression;
use super::value::{
    env_assign, env_define, env_lookup, env_new, format_number, loose_eq, strict_eq, EnvRef,
    FunctionRef, FunctionValue, ObjectData, ObjectKind, ObjectRef, Property, Value,
};

const MAX_CALL_DEPTH: usize = 256;

/// The embedded script engine: callback slots, mirrored breakpoint registry
/// and cancellation input, shared between the interpreter thread and the
/// debugger.
pub struct Engine {
    hooks: Mutex<Option<Arc<dyn DebugHooks>>>,
    breakpoints: Mutex<HashMap<(String, Position), Option<String>>>,
    cancel: CancelToken,
    /// One-shot: force the next statement to deliver a step callback even
    /// when the step mode would skip it. Set by a client pause request.
    force_step: std::sync::atomic::AtomicBool,
}

impl Engine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            hooks: Mutex::new(None),
            breakpoints: Mutex::new(HashMap::new()),
            cancel: CancelToken::new(),
            force_step: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Install the debug callbacks. Fails if callbacks are already installed.
    pub fn attach(&self, hooks: Arc<dyn DebugHooks>) -> Result<()> {
        let mut slot = self.hooks.lock().unwrap();
        if slot.is_some() {
            return Err(Error::AlreadyAttached);
        }
        *slot = Some(hooks);
        Ok(())
    }

    /// Remove the debug callbacks. Idempotent.
    pub fn detach(&self) {
        self.hooks.lock().unwrap().take();
    }

    pub fn is_attached(&self) -> bool {
        self.hooks.lock().unwrap().is_some()
    }

    /// Mirror a breakpoint into the engine so the statement at `pos` counts
    /// as a break location. The optional condition is evaluated in the
    /// current frame before the break callback fires.
    pub fn set_breakpoint(&self, source: &str, pos: Position, condition: Option<String>) {
        self.breakpoints
            .lock()
            .unwrap()
            .insert((source.to_string(), pos), condition);
    }

    pub fn clear_breakpoints(&self) {
        self.breakpoints.lock().unwrap().clear();
    }

    /// Deliver a step callback at the next statement regardless of the
    /// current step mode. Lets a pause request take effect no later than the
    /// next statement boundary.
    pub fn request_step(&self) {
        self.force_step
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Execute a parsed program to completion.
    ///
    /// On an uncaught script error, a single `Exception` break callback is
    /// delivered before the error unwinds to the caller.
    pub fn run(&self, source_id: &str, program: &Program) -> Result<()> {
        let globals = env_new(None);
        let mut interp = Interp {
            engine: Some(self),
            source: source_id.to_string(),
            stack: vec![Frame {
                name: "<script>".to_string(),
                env: globals,
                position: Position::new(1, 0),
            }],
            step_mode: if self.is_attached() {
                StepMode::Into
            } else {
                StepMode::None
            },
            anchor: 1,
        };

        match interp.exec_stmts(&program.body) {
            Ok(_) => Ok(()),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) => {
                let hooks = self.hooks.lock().unwrap().clone();
                if let Some(hooks) = hooks {
                    let message = err.to_string();
                    let info = interp.snapshot(Some(message.clone()));
                    if let Err(hook_err) = hooks.on_break(&info, BreakKind::Exception(message)) {
                        return Err(hook_err);
                    }
                }
                Err(err)
            }
        }
    }
}

/// Statement completion for non-local control flow.
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    name: String,
    env: EnvRef,
    position: Position,
}

struct Interp<'e> {
    engine: Option<&'e Engine>,
    source: String,
    stack: Vec<Frame>,
    step_mode: StepMode,
    /// Frame depth captured when `Over`/`Out` was set.
    anchor: usize,
}

impl<'e> Interp<'e> {
    /// An evaluation-only interpreter: no hook delivery, no cancellation.
    fn detached(env: EnvRef) -> Interp<'static> {
        Interp {
            engine: None,
            source: String::new(),
            stack: vec![Frame {
                name: "<eval>".to_string(),
                env,
                position: Position::new(1, 0),
            }],
            step_mode: StepMode::None,
            anchor: 1,
        }
    }

    fn current_env(&self) -> EnvRef {
        self.stack
            .last()
            .map(|f| f.env.clone())
            .unwrap_or_else(|| env_new(None))
    }

    fn snapshot(&self, exception: Option<String>) -> Arc<DebugInformation> {
        let frames = self
            .stack
            .iter()
            .rev()
            .map(|f| FrameSnapshot {
                name: f.name.clone(),
                position: f.position,
                env: f.env.clone(),
            })
            .collect::<Vec<_>>();
        let position = frames
            .first()
            .map(|f| f.position)
            .unwrap_or(Position::new(1, 0));
        Arc::new(DebugInformation {
            source: self.source.clone(),
            position,
            frames,
            exception,
        })
    }

    // === Hook delivery ===

    fn statement_hook(&mut self, stmt: &Stmt) -> Result<()> {
        let Some(engine) = self.engine else {
            return Ok(());
        };
        if engine.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.position = stmt.pos;
        }
        let hooks = engine.hooks.lock().unwrap().clone();
        let Some(hooks) = hooks else {
            return Ok(());
        };

        let depth = self.stack.len();
        let forced = engine
            .force_step
            .swap(false, std::sync::atomic::Ordering::SeqCst);
        let deliver_step = forced
            || match self.step_mode {
                StepMode::Into => true,
                StepMode::Over => depth <= self.anchor,
                StepMode::Out => depth < self.anchor,
                StepMode::None => false,
            };
        let breakpoint = self.matching_breakpoint(engine, stmt.pos);
        let is_debugger = matches!(stmt.kind, StmtKind::Debugger);

        let mode = if deliver_step {
            let info = self.snapshot(None);
            hooks.on_step(&info, breakpoint)?
        } else if is_debugger {
            let info = self.snapshot(None);
            hooks.on_break(&info, BreakKind::DebuggerStatement)?
        } else if let Some(pos) = breakpoint {
            let info = self.snapshot(None);
            hooks.on_break(&info, BreakKind::Breakpoint(pos))?
        } else {
            return Ok(());
        };

        self.step_mode = mode;
        if matches!(mode, StepMode::Over | StepMode::Out) {
            self.anchor = self.stack.len();
        }
        Ok(())
    }

    /// The registered breakpoint at `pos` with a passing condition, if any.
    fn matching_breakpoint(&self, engine: &Engine, pos: Position) -> Option<Position> {
        let condition = {
            let table = engine.breakpoints.lock().unwrap();
            table.get(&(self.source.clone(), pos))?.clone()
        };
        match condition {
            None => Some(pos),
            Some(src) => {
                let env = self.current_env();
                match eval_in_env(&src, &env) {
                    Ok(value) if value.is_truthy() => Some(pos),
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!(position = %pos, error = %err, "breakpoint condition failed");
                        None
                    }
                }
            }
        }
    }

    // === Statements ===

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.statement_hook(stmt)?;
        self.exec_stmt_inner(stmt)
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::VarDecl { name, init } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Undefined,
                };
                env_define(&self.current_env(), name, value);
                Ok(Flow::Normal)
            }
            StmtKind::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_expr(cond)?.is_truthy() {
                    self.exec_stmts(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmts(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond)?.is_truthy() {
                    match self.exec_stmts(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.exec_stmt_inner(init)?;
                }
                loop {
                    if let Some(cond) = cond {
                        if !self.eval_expr(cond)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_stmts(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval_expr(update)?;
                    }
                }
                Ok(Flow::Normal)
            }
            StmtKind::FunctionDecl(def) => {
                let function = Value::Function(Arc::new(FunctionValue {
                    def: def.clone(),
                    closure: self.current_env(),
                }));
                env_define(
                    &self.current_env(),
                    def.name.as_deref().unwrap_or("(anonymous)"),
                    function,
                );
                Ok(Flow::Normal)
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),
            StmtKind::Debugger => Ok(Flow::Normal),
            StmtKind::Block(body) => self.exec_stmts(body),
        }
    }

    // === Expressions ===

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Ident(name) => env_lookup(&self.current_env(), name)
                .ok_or_else(|| Error::Engine(format!("{name} is not defined"))),
            ExprKind::Assign { target, value } => {
                let value = self.eval_expr(value)?;
                self.assign_target(target, value.clone())?;
                Ok(value)
            }
            ExprKind::Update {
                target,
                increment,
                prefix,
            } => {
                let old = to_number(&self.eval_expr(target)?);
                let new = if *increment { old + 1.0 } else { old - 1.0 };
                self.assign_target(target, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => Ok(Value::Number(-to_number(&value))),
                }
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object)?;
                self.get_member(&object, property)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                self.get_index(&object, &index)
            }
            ExprKind::ObjectLit(props) => {
                let mut data = ObjectData::new_object();
                for prop in props {
                    match prop {
                        ObjectProp::Data { name, value } => {
                            let value = self.eval_expr(value)?;
                            data.set_prop(name, value);
                        }
                        ObjectProp::Getter { name, body } => {
                            let getter = Arc::new(FunctionValue {
                                def: body.clone(),
                                closure: self.current_env(),
                            });
                            data.set_getter(name, getter);
                        }
                    }
                }
                Ok(Value::Object(Arc::new(Mutex::new(data))))
            }
            ExprKind::ArrayLit(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element)?);
                }
                Ok(Value::Object(Arc::new(Mutex::new(ObjectData::new_array(
                    values,
                )))))
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value> {
        // Short-circuit operators evaluate the right side lazily.
        match op {
            BinaryOp::And => {
                let left = self.eval_expr(left)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                return self.eval_expr(right);
            }
            BinaryOp::Or => {
                let left = self.eval_expr(left)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                return self.eval_expr(right);
            }
            _ => {}
        }

        let lhs = self.eval_expr(left)?;
        let rhs = self.eval_expr(right)?;
        let value = match op {
            BinaryOp::Add => match (&lhs, &rhs) {
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Value::Str(format!("{}{}", lhs.to_string_value(), rhs.to_string_value()))
                }
                _ => Value::Number(to_number(&lhs) + to_number(&rhs)),
            },
            BinaryOp::Sub => Value::Number(to_number(&lhs) - to_number(&rhs)),
            BinaryOp::Mul => Value::Number(to_number(&lhs) * to_number(&rhs)),
            BinaryOp::Div => Value::Number(to_number(&lhs) / to_number(&rhs)),
            BinaryOp::Rem => Value::Number(to_number(&lhs) % to_number(&rhs)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let result = match (&lhs, &rhs) {
                    (Value::Str(a), Value::Str(b)) => compare(op, a.cmp(b) as i32 as f64, 0.0),
                    _ => compare(op, to_number(&lhs), to_number(&rhs)),
                };
                Value::Bool(result)
            }
            BinaryOp::EqStrict => Value::Bool(strict_eq(&lhs, &rhs)),
            BinaryOp::NeStrict => Value::Bool(!strict_eq(&lhs, &rhs)),
            BinaryOp::EqLoose => Value::Bool(loose_eq(&lhs, &rhs)),
            BinaryOp::NeLoose => Value::Bool(!loose_eq(&lhs, &rhs)),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(value)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value> {
        let (function, this) = match &callee.kind {
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object)?;
                let member = self.get_member(&object, property)?;
                (member, Some(object))
            }
            _ => (self.eval_expr(callee)?, None),
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg)?);
        }
        match function {
            Value::Function(f) => self.call_function(&f, this, values),
            other => Err(Error::Engine(format!(
                "{} is not a function",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &FunctionRef,
        this: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value> {
        if self.stack.len() >= MAX_CALL_DEPTH {
            return Err(Error::Engine("maximum call depth exceeded".to_string()));
        }
        let env = env_new(Some(function.closure.clone()));
        if let Some(this) = this {
            env_define(&env, "this", this);
        }
        for (i, param) in function.def.params.iter().enumerate() {
            env_define(&env, param, args.get(i).cloned().unwrap_or(Value::Undefined));
        }
        self.stack.push(Frame {
            name: function
                .def
                .name
                .clone()
                .unwrap_or_else(|| "(anonymous)".to_string()),
            env,
            position: function.def.pos,
        });
        let result = self.exec_stmts(&function.def.body);
        self.stack.pop();
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::Undefined),
            Err(err) => Err(err),
        }
    }

    fn get_member(&mut self, object: &Value, property: &str) -> Result<Value> {
        match object {
            Value::Object(obj) => {
                let prop = {
                    let data = obj.lock().unwrap();
                    if property == "length" && data.kind == ObjectKind::Array {
                        return Ok(Value::Number(data.elements.len() as f64));
                    }
                    data.get_prop(property).cloned()
                };
                match prop {
                    Some(Property::Data(value)) => Ok(value),
                    Some(Property::Getter(getter)) => {
                        self.call_function(&getter, Some(Value::Object(obj.clone())), Vec::new())
                    }
                    None => Ok(Value::Undefined),
                }
            }
            Value::Str(s) => {
                if property == "length" {
                    Ok(Value::Number(s.chars().count() as f64))
                } else {
                    Ok(Value::Undefined)
                }
            }
            Value::Undefined | Value::Null => Err(Error::Engine(format!(
                "cannot read property '{property}' of {}",
                object.type_name()
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn get_index(&mut self, object: &Value, index: &Value) -> Result<Value> {
        match object {
            Value::Object(obj) => {
                let is_array = obj.lock().unwrap().kind == ObjectKind::Array;
                if is_array {
                    if let Value::Number(n) = index {
                        let data = obj.lock().unwrap();
                        let i = *n as usize;
                        return Ok(data.elements.get(i).cloned().unwrap_or(Value::Undefined));
                    }
                }
                self.get_member(object, &index.to_string_value())
            }
            Value::Str(s) => {
                if let Value::Number(n) = index {
                    let i = *n as usize;
                    Ok(s.chars()
                        .nth(i)
                        .map(|c| Value::Str(c.to_string()))
                        .unwrap_or(Value::Undefined))
                } else {
                    Ok(Value::Undefined)
                }
            }
            Value::Undefined | Value::Null => Err(Error::Engine(format!(
                "cannot index {}",
                object.type_name()
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<()> {
        match &target.kind {
            ExprKind::Ident(name) => {
                env_assign(&self.current_env(), name, value);
                Ok(())
            }
            ExprKind::Member { object, property } => {
                let object = self.eval_expr(object)?;
                match object {
                    Value::Object(obj) => {
                        obj.lock().unwrap().set_prop(property, value);
                        Ok(())
                    }
                    other => Err(Error::Engine(format!(
                        "cannot set property '{property}' on {}",
                        other.type_name()
                    ))),
                }
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object)?;
                let index = self.eval_expr(index)?;
                match object {
                    Value::Object(obj) => {
                        let mut data = obj.lock().unwrap();
                        if data.kind == ObjectKind::Array {
                            if let Value::Number(n) = index {
                                let i = n as usize;
                                if i >= data.elements.len() {
                                    data.elements.resize(i + 1, Value::Undefined);
                                }
                                data.elements[i] = value;
                                return Ok(());
                            }
                        }
                        data.set_prop(&index.to_string_value(), value);
                        Ok(())
                    }
                    other => Err(Error::Engine(format!(
                        "cannot index {}",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(Error::Engine("invalid assignment target".to_string())),
        }
    }
}

fn compare(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        _ => false,
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) => 0.0,
        Value::Null => 0.0,
        Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Undefined | Value::Function(_) | Value::Object(_) => f64::NAN,
    }
}

/// Evaluate an expression source string against an environment chain,
/// without delivering debug callbacks.
fn eval_in_env(source: &str, env: &EnvRef) -> Result<Value> {
    let expr = parse_expression(source)?;
    Interp::detached(env.clone()).eval_expr(&expr)
}

/// The engine's expression evaluator, handed to the debugger at attach time.
///
/// Evaluation faults are reported as [`Error::Evaluation`] so the session
/// treats them as per-request failures rather than engine faults.
pub struct ExprEvaluator;

impl Evaluator for ExprEvaluator {
    fn evaluate(&self, expression: &str, frame: &FrameSnapshot) -> Result<Value> {
        eval_in_env(expression, &frame.env).map_err(as_evaluation_fault)
    }

    fn invoke_getter(&self, getter: &FunctionRef, owner: &ObjectRef) -> Result<Value> {
        Interp::detached(getter.closure.clone())
            .call_function(getter, Some(Value::Object(owner.clone())), Vec::new())
            .map_err(as_evaluation_fault)
    }
}

fn as_evaluation_fault(err: Error) -> Error {
    match err {
        Error::Evaluation(_) | Error::Cancelled => err,
        other => Error::Evaluation(other.to_string()),
    }
}

/// Render an evaluation result the way log messages do; exposed for display.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_string_value(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::parse;

    fn run_and_get(source: &str, name: &str) -> Value {
        let program = parse(source).unwrap();
        let globals = env_new(None);
        let mut interp = Interp {
            engine: None,
            source: "test".to_string(),
            stack: vec![Frame {
                name: "<script>".to_string(),
                env: globals.clone(),
                position: Position::new(1, 0),
            }],
            step_mode: StepMode::None,
            anchor: 1,
        };
        interp.exec_stmts(&program.body).unwrap();
        env_lookup(&globals, name).unwrap()
    }

    #[test]
    fn test_var_and_arithmetic() {
        let value = run_and_get("var x = 1 + 2 * 3;", "x");
        assert!(matches!(value, Value::Number(n) if n == 7.0));
    }

    #[test]
    fn test_for_loop() {
        let value = run_and_get("var s = 0; for (var i = 0; i < 5; i++) { s = s + i; }", "s");
        assert!(matches!(value, Value::Number(n) if n == 10.0));
    }

    #[test]
    fn test_string_concat() {
        let value = run_and_get("var i = 2; var m = \"i is \" + i;", "m");
        assert!(matches!(value, Value::Str(s) if s == "i is 2"));
    }

    #[test]
    fn test_function_call_and_closure() {
        let value = run_and_get(
            "function add(a, b) { return a + b; } var r = add(2, 3);",
            "r",
        );
        assert!(matches!(value, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn test_undeclared_assignment_reaches_global() {
        let value = run_and_get("function f() { x = 9; } f();", "x");
        assert!(matches!(value, Value::Number(n) if n == 9.0));
    }

    #[test]
    fn test_object_and_array() {
        let value = run_and_get("var o = { a: [1, 2, 3] }; var n = o.a.length;", "n");
        assert!(matches!(value, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_getter_invoked_by_member_access() {
        let value = run_and_get(
            "var o = { get two() { return 2; } }; var r = o.two;",
            "r",
        );
        assert!(matches!(value, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn test_undefined_variable_is_engine_fault() {
        let program = parse("var x = missing;").unwrap();
        let engine = Engine::new();
        let err = engine.run("test", &program).unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
    }

    #[test]
    fn test_cancelled_run() {
        let program = parse("var x = 0; while (true) { x = x + 1; }").unwrap();
        let engine = Engine::new();
        engine.cancel();
        let err = engine.run("test", &program).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_attach_twice_fails() {
        struct NoHooks;
        impl DebugHooks for NoHooks {
            fn on_step(
                &self,
                _info: &Arc<DebugInformation>,
                _breakpoint: Option<Position>,
            ) -> Result<StepMode> {
                Ok(StepMode::None)
            }
            fn on_break(
                &self,
                _info: &Arc<DebugInformation>,
                _kind: BreakKind,
            ) -> Result<StepMode> {
                Ok(StepMode::None)
            }
        }
        let engine = Engine::new();
        engine.attach(Arc::new(NoHooks)).unwrap();
        assert!(matches!(
            engine.attach(Arc::new(NoHooks)),
            Err(Error::AlreadyAttached)
        ));
        engine.detach();
        engine.detach();
        engine.attach(Arc::new(NoHooks)).unwrap();
    }
}
