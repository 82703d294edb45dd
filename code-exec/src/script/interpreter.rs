use std::rc::Rc;

use super::ast::{BinaryOp, Block, ElseBranch, Expr, Program, Stmt, UnaryOp};
use super::budget::{Budget, ScriptLimits};
use super::env::{EnvId, Environments};
use super::error::{RuntimeError, ScriptError, ScriptResult};
use super::token::Position;
use super::value::{Array, Builtin, Closure, Value, MAX_ARRAY_DEPTH};

/// Free native stack required before descending another level. Below it the
/// evaluator continues on a freshly allocated segment.
const RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 1024 * 1024;

/// How control leaves a statement.
#[derive(Debug)]
enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Tree-walking evaluator. One instance evaluates one program; nothing is
/// shared between instances.
pub struct Interpreter {
    envs: Environments,
    budget: Budget,
    stdout: String,
    depth: usize,
    max_call_depth: usize,
    nesting: usize,
    max_nesting: usize,
    output_limit: usize,
}

impl Interpreter {
    pub fn new(limits: &ScriptLimits, budget: Budget) -> Self {
        let globals = Builtin::ALL
            .into_iter()
            .map(|builtin| (builtin.name().to_string(), Value::Builtin(builtin)));
        Self {
            envs: Environments::with_globals(globals),
            budget,
            stdout: String::new(),
            depth: 0,
            max_call_depth: limits.max_call_depth,
            nesting: 0,
            max_nesting: limits.max_nesting,
            output_limit: limits.output_limit,
        }
    }

    /// Evaluate every top-level statement in order. Returns the value of the
    /// final statement when it is an expression producing something other
    /// than unit.
    pub fn run(&mut self, program: &Program) -> ScriptResult<Option<Value>> {
        let mut last = None;
        for stmt in &program.statements {
            last = match stmt {
                Stmt::Expr(expr) => {
                    self.budget.tick()?;
                    Some(self.eval(expr, Environments::GLOBAL)?)
                }
                other => {
                    self.exec(other, Environments::GLOBAL)?;
                    None
                }
            };
        }
        Ok(last.filter(|value| !matches!(value, Value::Unit)))
    }

    /// Text written by `print`/`println` so far.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn into_stdout(self) -> String {
        self.stdout
    }

    pub fn peak_memory(&self) -> u64 {
        self.budget.peak_memory()
    }

    /// Run `f` one evaluation level deeper. Fails once `max_nesting` levels
    /// are live and grows the native stack when it runs low.
    fn descend<T>(
        &mut self,
        position: Position,
        f: impl FnOnce(&mut Self) -> ScriptResult<T>,
    ) -> ScriptResult<T> {
        if self.nesting >= self.max_nesting {
            return Err(ScriptError::runtime(
                RuntimeError::NestingTooDeep(self.max_nesting),
                position,
            ));
        }
        self.nesting += 1;
        let result = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || f(self));
        self.nesting -= 1;
        result
    }

    fn exec(&mut self, stmt: &Stmt, env: EnvId) -> ScriptResult<Flow> {
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.exec_stmt(stmt, env))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: EnvId) -> ScriptResult<Flow> {
        self.budget.tick()?;

        match stmt {
            Stmt::Function(decl) => {
                self.envs.capture(env);
                let closure = Value::Function(Rc::new(Closure {
                    decl: Rc::clone(decl),
                    env,
                }));
                self.envs.define(env, &decl.name, closure, &mut self.budget)?;
            }
            Stmt::Let { name, value, .. } => {
                let value = self.eval(value, env)?;
                self.envs.define(env, name, value, &mut self.budget)?;
            }
            Stmt::Assign {
                name,
                value,
                position,
            } => {
                let value = self.eval(value, env)?;
                if !self.envs.assign(env, name, value, &mut self.budget)? {
                    return Err(ScriptError::runtime(
                        RuntimeError::UndefinedVariable(name.clone()),
                        *position,
                    ));
                }
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Unit,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                position,
            } => {
                let condition = self.eval(condition, env)?;
                if expect_bool(&condition, *position)? {
                    return self.exec_block(then_branch, env);
                }
                return match else_branch {
                    Some(ElseBranch::Block(block)) => self.exec_block(block, env),
                    Some(ElseBranch::If(stmt)) => self.exec(stmt, env),
                    None => Ok(Flow::Normal),
                };
            }
            Stmt::While {
                condition,
                body,
                position,
            } => loop {
                self.budget.tick()?;
                let condition = self.eval(condition, env)?;
                if !expect_bool(&condition, *position)? {
                    break;
                }
                match self.exec_block(body, env)? {
                    Flow::Break => break,
                    Flow::Normal | Flow::Continue => {}
                    flow @ Flow::Return(_) => return Ok(flow),
                }
            },
            Stmt::For {
                init,
                condition,
                update,
                body,
                position,
            } => {
                let scope = self.envs.push(env, &mut self.budget)?;
                let flow = self.exec_for(
                    init.as_deref(),
                    condition.as_ref(),
                    update.as_deref(),
                    body,
                    *position,
                    scope,
                );
                self.envs.release(scope, &mut self.budget);
                return flow;
            }
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
            Stmt::Block(block) => return self.exec_block(block, env),
            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
            }
        }

        Ok(Flow::Normal)
    }

    /// Loop body of a `for`. `scope` holds the initializer's bindings and
    /// lives for the whole loop; each iteration gets its own body scope.
    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        update: Option<&Stmt>,
        body: &Block,
        position: Position,
        scope: EnvId,
    ) -> ScriptResult<Flow> {
        if let Some(init) = init {
            self.exec(init, scope)?;
        }
        loop {
            self.budget.tick()?;
            if let Some(condition) = condition {
                let condition = self.eval(condition, scope)?;
                if !expect_bool(&condition, position)? {
                    break;
                }
            }
            match self.exec_block(body, scope)? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
            if let Some(update) = update {
                self.exec(update, scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    /// Run a block in a fresh scope chained to `parent`.
    fn exec_block(&mut self, block: &Block, parent: EnvId) -> ScriptResult<Flow> {
        self.descend(block.position, |this| {
            let env = this.envs.push(parent, &mut this.budget)?;
            let flow = this.exec_statements(&block.statements, env);
            this.envs.release(env, &mut this.budget);
            flow
        })
    }

    fn exec_statements(&mut self, statements: &[Stmt], env: EnvId) -> ScriptResult<Flow> {
        for stmt in statements {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, env: EnvId) -> ScriptResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(Rc::from(s.as_str()))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Identifier { name, position } => {
                self.envs.lookup(env, name).ok_or_else(|| {
                    ScriptError::runtime(RuntimeError::UndefinedVariable(name.clone()), *position)
                })
            }
            compound => {
                let position = compound.position().unwrap_or_default();
                self.descend(position, |this| this.eval_compound(compound, env))
            }
        }
    }

    fn eval_compound(&mut self, expr: &Expr, env: EnvId) -> ScriptResult<Value> {
        match expr {
            Expr::Unary {
                op,
                operand,
                position,
            } => {
                let operand = self.eval(operand, env)?;
                match (op, operand) {
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (op, operand) => Err(ScriptError::runtime(
                        RuntimeError::UnaryTypeMismatch {
                            op: op.symbol(),
                            operand: operand.type_name(),
                        },
                        *position,
                    )),
                }
            }
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
                position,
            } => {
                let left = self.eval(left, env)?;
                let left = expect_logical_operand(*op, &left, *position)?;
                // Short-circuit: `false && _` and `true || _` skip the right side.
                if left == (*op == BinaryOp::Or) {
                    return Ok(Value::Bool(left));
                }
                let right = self.eval(right, env)?;
                Ok(Value::Bool(expect_logical_operand(*op, &right, *position)?))
            }
            Expr::Binary {
                op,
                left,
                right,
                position,
            } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, left, right, *position)
            }
            Expr::Call {
                callee,
                args,
                position,
            } => {
                let callee = self.eval(callee, env)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, env))
                    .collect::<ScriptResult<Vec<_>>>()?;
                self.call(callee, args, *position)
            }
            Expr::Index {
                target,
                index,
                position,
            } => {
                let target = self.eval(target, env)?;
                let index = self.eval(index, env)?;
                index_value(&target, &index, *position)
            }
            Expr::Array { elements, position } => {
                let items = elements
                    .iter()
                    .map(|element| self.eval(element, env))
                    .collect::<ScriptResult<Vec<_>>>()?;
                self.make_array(items, *position)
            }
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Identifier { .. } => {
                self.eval(expr, env)
            }
        }
    }

    /// Build an array value, charging its full size against the budget.
    fn make_array(&mut self, items: Vec<Value>, position: Position) -> ScriptResult<Value> {
        let array = Array::new(items);
        if array.depth() > MAX_ARRAY_DEPTH {
            return Err(ScriptError::runtime(
                RuntimeError::ArrayTooDeep(MAX_ARRAY_DEPTH),
                position,
            ));
        }
        let value = Value::Array(Rc::new(array));
        self.budget.check_allocation(value.heap_size())?;
        Ok(value)
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: Value,
        right: Value,
        position: Position,
    ) -> ScriptResult<Value> {
        let fail = |error| Err(ScriptError::runtime(error, position));

        let value = match (op, &left, &right) {
            (BinaryOp::Equal, _, _) => Value::Bool(left == right),
            (BinaryOp::NotEqual, _, _) => Value::Bool(left != right),
            (BinaryOp::Add, Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (BinaryOp::Add, Value::Str(a), Value::Str(b)) => {
                let len = (a.len() + b.len()) as u64;
                self.budget.check_allocation(len)?;
                let mut joined = String::with_capacity(len as usize);
                joined.push_str(a);
                joined.push_str(b);
                Value::Str(Rc::from(joined))
            }
            (BinaryOp::Sub, Value::Number(a), Value::Number(b)) => Value::Number(a - b),
            (BinaryOp::Mul, Value::Number(a), Value::Number(b)) => Value::Number(a * b),
            (BinaryOp::Div, Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                return fail(RuntimeError::DivisionByZero);
            }
            (BinaryOp::Div, Value::Number(a), Value::Number(b)) => Value::Number(a / b),
            (BinaryOp::Mod, Value::Number(_), Value::Number(b)) if *b == 0.0 => {
                return fail(RuntimeError::ModuloByZero);
            }
            (BinaryOp::Mod, Value::Number(a), Value::Number(b)) => Value::Number(a % b),
            (BinaryOp::Less, Value::Number(a), Value::Number(b)) => Value::Bool(a < b),
            (BinaryOp::LessEqual, Value::Number(a), Value::Number(b)) => Value::Bool(a <= b),
            (BinaryOp::Greater, Value::Number(a), Value::Number(b)) => Value::Bool(a > b),
            (BinaryOp::GreaterEqual, Value::Number(a), Value::Number(b)) => Value::Bool(a >= b),
            (BinaryOp::Less, Value::Str(a), Value::Str(b)) => Value::Bool(a < b),
            (BinaryOp::LessEqual, Value::Str(a), Value::Str(b)) => Value::Bool(a <= b),
            (BinaryOp::Greater, Value::Str(a), Value::Str(b)) => Value::Bool(a > b),
            (BinaryOp::GreaterEqual, Value::Str(a), Value::Str(b)) => Value::Bool(a >= b),
            _ => {
                return fail(RuntimeError::BinaryTypeMismatch {
                    op: op.symbol(),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        };
        Ok(value)
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, position: Position) -> ScriptResult<Value> {
        self.budget.tick()?;

        let closure = match callee {
            Value::Function(closure) => closure,
            Value::Builtin(builtin) => return self.call_builtin(builtin, args, position),
            other => {
                return Err(ScriptError::runtime(
                    RuntimeError::NotCallable(other.type_name()),
                    position,
                ));
            }
        };

        let decl = &closure.decl;
        if args.len() != decl.params.len() {
            return Err(ScriptError::runtime(
                RuntimeError::ArityMismatch {
                    name: decl.name.clone(),
                    expected: decl.params.len(),
                    found: args.len(),
                },
                position,
            ));
        }
        if self.depth >= self.max_call_depth {
            return Err(ScriptError::runtime(
                RuntimeError::StackOverflow(self.max_call_depth),
                position,
            ));
        }

        let env = self.envs.push(closure.env, &mut self.budget)?;
        for (param, arg) in decl.params.iter().zip(args) {
            self.envs.define(env, param, arg, &mut self.budget)?;
        }

        self.depth += 1;
        let flow = self.exec_statements(&decl.body.statements, env);
        self.depth -= 1;
        self.envs.release(env, &mut self.budget);

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Unit),
        }
    }

    fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: Vec<Value>,
        position: Position,
    ) -> ScriptResult<Value> {
        match builtin {
            Builtin::Println | Builtin::Print => {
                let limit = self.output_limit;
                let room = limit.saturating_sub(self.stdout.len());
                let overflow =
                    || ScriptError::runtime(RuntimeError::OutputLimitExceeded(limit), position);
                let mut text = args
                    .iter()
                    .map(|arg| arg.render_capped(room).ok_or_else(overflow))
                    .collect::<ScriptResult<Vec<_>>>()?
                    .join(" ");
                if builtin == Builtin::Println {
                    text.push('\n');
                }
                self.write_stdout(&text, position)?;
                Ok(Value::Unit)
            }
            Builtin::Str => {
                let [value] = single_arg(builtin, args, position)?;
                let room = self.budget.available_memory();
                match value.render_capped(usize::try_from(room).unwrap_or(usize::MAX)) {
                    Some(text) => Ok(Value::Str(Rc::from(text))),
                    None => Err(self.budget.exhausted(room.saturating_add(1))),
                }
            }
            Builtin::Len => match single_arg(builtin, args, position)? {
                [Value::Str(s)] => Ok(Value::Number(s.chars().count() as f64)),
                [Value::Array(array)] => Ok(Value::Number(array.len() as f64)),
                [other] => Err(ScriptError::runtime(
                    RuntimeError::Builtin(
                        "len",
                        format!("expected a string or array, found {}", other.type_name()),
                    ),
                    position,
                )),
            },
            Builtin::Push => {
                let [array, item] = two_args(builtin, args, position)?;
                let Value::Array(array) = array else {
                    return Err(ScriptError::runtime(
                        RuntimeError::Builtin(
                            "push",
                            format!("expected an array, found {}", array.type_name()),
                        ),
                        position,
                    ));
                };
                let mut items = Vec::with_capacity(array.len() + 1);
                items.extend_from_slice(array.items());
                items.push(item);
                self.make_array(items, position)
            }
        }
    }

    fn write_stdout(&mut self, text: &str, position: Position) -> ScriptResult<()> {
        if self.stdout.len() + text.len() > self.output_limit {
            return Err(ScriptError::runtime(
                RuntimeError::OutputLimitExceeded(self.output_limit),
                position,
            ));
        }
        self.stdout.push_str(text);
        Ok(())
    }
}

fn single_arg(builtin: Builtin, args: Vec<Value>, position: Position) -> ScriptResult<[Value; 1]> {
    let found = args.len();
    <[Value; 1]>::try_from(args).map_err(|_| {
        ScriptError::runtime(
            RuntimeError::ArityMismatch {
                name: builtin.name().to_string(),
                expected: 1,
                found,
            },
            position,
        )
    })
}

fn two_args(builtin: Builtin, args: Vec<Value>, position: Position) -> ScriptResult<[Value; 2]> {
    let found = args.len();
    <[Value; 2]>::try_from(args).map_err(|_| {
        ScriptError::runtime(
            RuntimeError::ArityMismatch {
                name: builtin.name().to_string(),
                expected: 2,
                found,
            },
            position,
        )
    })
}

/// `target[index]` for arrays and strings. Strings index by character.
fn index_value(target: &Value, index: &Value, position: Position) -> ScriptResult<Value> {
    let fail = |error| Err(ScriptError::runtime(error, position));

    if !matches!(target, Value::Array(_) | Value::Str(_)) {
        return fail(RuntimeError::NotIndexable(target.type_name()));
    }
    let slot = match index {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => *n,
        Value::Number(n) => return fail(RuntimeError::InvalidIndex(n.to_string())),
        other => return fail(RuntimeError::InvalidIndex(other.type_name().to_string())),
    };

    let (found, len) = match target {
        Value::Array(array) => (array.items().get(slot as usize).cloned(), array.len()),
        Value::Str(s) => (
            s.chars()
                .nth(slot as usize)
                .map(|c| Value::Str(Rc::from(c.to_string()))),
            s.chars().count(),
        ),
        _ => (None, 0),
    };
    match found {
        Some(value) => Ok(value),
        None => fail(RuntimeError::IndexOutOfBounds { index: slot, len }),
    }
}

fn expect_bool(value: &Value, position: Position) -> ScriptResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ScriptError::runtime(
            RuntimeError::NonBooleanCondition(other.type_name()),
            position,
        )),
    }
}

fn expect_logical_operand(op: BinaryOp, value: &Value, position: Position) -> ScriptResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(ScriptError::runtime(
            RuntimeError::NonBooleanOperand {
                op: op.symbol(),
                found: other.type_name(),
            },
            position,
        )),
    }
}
