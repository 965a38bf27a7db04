//! Script values and the accessors the debugger reads them through

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::message::SymbolId;

/// Shared, mutable list storage
pub type ListHandle = Arc<RwLock<Vec<Value>>>;

/// Converts a value to the string shown to the controller
pub type StringGenerator = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Value held by a program variable
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(ListHandle),
}

impl Value {
    pub fn new_list(values: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(values)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::List(list) => {
                let list = list.read();
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Read access to one program variable
pub trait VarAccessor: Send + Sync {
    fn id(&self) -> SymbolId;
    fn get(&self) -> Value;
}

/// Scalar variable cell
pub struct ScalarVar {
    id: SymbolId,
    value: RwLock<Value>,
}

impl ScalarVar {
    pub fn new(id: impl Into<SymbolId>, value: Value) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            value: RwLock::new(value),
        })
    }

    pub fn set(&self, value: Value) {
        *self.value.write() = value;
    }
}

impl VarAccessor for ScalarVar {
    fn id(&self) -> SymbolId {
        self.id.clone()
    }

    fn get(&self) -> Value {
        self.value.read().clone()
    }
}

/// List variable backed by a shared handle
pub struct ListVar {
    id: SymbolId,
    list: ListHandle,
}

impl ListVar {
    pub fn new(id: impl Into<SymbolId>, values: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            list: Arc::new(RwLock::new(values)),
        })
    }

    pub fn handle(&self) -> ListHandle {
        self.list.clone()
    }
}

impl VarAccessor for ListVar {
    fn id(&self) -> SymbolId {
        self.id.clone()
    }

    fn get(&self) -> Value {
        Value::List(self.list.clone())
    }
}
