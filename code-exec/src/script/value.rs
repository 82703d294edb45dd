use std::fmt::{self, Write};
use std::rc::Rc;

use super::ast::FunctionDecl;
use super::env::EnvId;

/// Runtime value of the custom language.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Str(Rc<str>),
    Bool(bool),
    Array(Rc<Array>),
    Function(Rc<Closure>),
    Builtin(Builtin),
    Unit,
}

/// Bytes charged per array slot. Covers the slot itself and the widest
/// rendering of any non-string element.
pub const ARRAY_SLOT_COST: u64 = 32;

/// Arrays may contain arrays at most this many levels deep.
pub const MAX_ARRAY_DEPTH: usize = 64;

/// Immutable array. Size and depth are computed once at construction so
/// charging a value never walks its contents.
#[derive(Debug)]
pub struct Array {
    items: Vec<Value>,
    size: u64,
    depth: usize,
}

impl Array {
    pub fn new(items: Vec<Value>) -> Self {
        let mut size = ARRAY_SLOT_COST.saturating_mul(items.len() as u64);
        let mut depth = 1;
        for item in &items {
            size = size.saturating_add(item.heap_size());
            if let Value::Array(inner) = item {
                depth = depth.max(inner.depth + 1);
            }
        }
        Self { items, size, depth }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Nesting depth; an array of scalars has depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A user function paired with the environment it was declared in.
#[derive(Debug)]
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub env: EnvId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Println,
    Print,
    Str,
    Len,
    Push,
}

impl Builtin {
    pub const ALL: [Builtin; 5] = [
        Builtin::Println,
        Builtin::Print,
        Builtin::Str,
        Builtin::Len,
        Builtin::Push,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Println => "println",
            Builtin::Print => "print",
            Builtin::Str => "str",
            Builtin::Len => "len",
            Builtin::Push => "push",
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Array(_) => "array",
            Value::Function(_) | Value::Builtin(_) => "function",
            Value::Unit => "unit",
        }
    }

    /// Bytes owned by the value beyond its inline representation.
    pub fn heap_size(&self) -> u64 {
        match self {
            Value::Str(s) => s.len() as u64,
            Value::Array(array) => array.size,
            _ => 0,
        }
    }

    /// Display the value, giving up once the text would pass `limit` bytes.
    pub fn render_capped(&self, limit: usize) -> Option<String> {
        let mut sink = CappedWriter {
            text: String::new(),
            limit,
        };
        write!(sink, "{self}").ok()?;
        Some(sink.text)
    }
}

struct CappedWriter {
    text: String,
    limit: usize,
}

impl Write for CappedWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.text.len() + s.len() > self.limit {
            return Err(fmt::Error);
        }
        self.text.push_str(s);
        Ok(())
    }
}

impl PartialEq for Value {
    /// Language-level equality: values of different types are never equal,
    /// functions compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.items == b.items,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Unit, Value::Unit) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(array) => {
                f.write_char('[')?;
                for (i, item) in array.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "\"{s}\"")?,
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_char(']')
            }
            Value::Function(closure) => write!(f, "<fn {}>", closure.decl.name),
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
            Value::Unit => f.write_str("()"),
        }
    }
}
