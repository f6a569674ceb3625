//! In-memory model of a parsed QIR module.

use rustc_hash::FxHashMap;

use crate::error::{ParseError, ParseResult};

/// Attribute marking the invocable kernel of a module.
pub const ENTRY_POINT_ATTR: &str = "entry_point";

/// Substring identifying the attribute that carries the kernel's qubit count.
pub const REQUIRED_QUBITS_ATTR: &str = "requiredQubits";

/// A single function attribute, either `"key"` or `"key"="value"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl Attribute {
    /// Create a key-only attribute.
    pub fn flag(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    /// Create a key/value attribute.
    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

/// An `attributes #N = { ... }` group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeGroup {
    pub id: u32,
    pub attributes: Vec<Attribute>,
}

impl AttributeGroup {
    /// Check whether the group carries an attribute with this exact key.
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key == key)
    }
}

/// A statically addressed operand of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `null` pointer, i.e. address 0.
    Null,
    /// `inttoptr (i64 N to ...)`.
    Address(u64),
    /// Floating point constant.
    Float(f64),
    /// Integer constant.
    Int(i64),
    /// `i1` constant `true` or `false`.
    Bool(bool),
    /// SSA value such as `%0`.
    Local(String),
    /// Anything else (globals, expressions).
    Other,
}

impl Operand {
    /// Interpret the operand as a static qubit or result address.
    pub fn as_address(&self) -> Option<u64> {
        match self {
            Operand::Null => Some(0),
            Operand::Address(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Interpret the operand as a floating point constant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// Kinds of instruction recognised in a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// `call` to a named function, with the SSA value it defines if any.
    Call {
        dest: Option<String>,
        callee: String,
        args: Vec<Operand>,
    },
    /// Unconditional `br label %target`.
    Branch(String),
    /// `br i1 %cond, label %if_true, label %if_false`.
    CondBranch {
        condition: Operand,
        if_true: String,
        if_false: String,
    },
    /// `ret`.
    Ret,
    /// Basic block label.
    Label(String),
    /// Anything else.
    Other,
}

/// One line of a function body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// 1-based source line.
    pub line: usize,
    /// Source text of the instruction.
    pub text: String,
    pub kind: InstructionKind,
}

/// A `define` or `declare` item.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Attribute groups referenced as `#N` in the header.
    pub attribute_groups: Vec<u32>,
    /// String attributes written directly in the header.
    pub attributes: Vec<Attribute>,
    /// Body instructions; `None` for declarations.
    pub body: Option<Vec<Instruction>>,
}

impl Function {
    /// A declaration has no body.
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}

/// A parsed QIR module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub source_filename: Option<String>,
    pub functions: Vec<Function>,
    pub attribute_groups: FxHashMap<u32, AttributeGroup>,
}

impl Module {
    /// Check whether the module carries an entry point marker.
    pub fn has_entry_point(&self) -> bool {
        self.attribute_groups
            .values()
            .any(|g| g.contains(ENTRY_POINT_ATTR))
            || self
                .functions
                .iter()
                .any(|f| f.attributes.iter().any(|a| a.key == ENTRY_POINT_ATTR))
    }

    /// The kernel: first function in the module that has a body.
    pub fn kernel(&self) -> Option<&Function> {
        self.functions.iter().find(|f| !f.is_declaration())
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Iterate over functions that have a body.
    pub fn defined_functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    /// All attributes attached to `function`: inline ones first, then
    /// those of its attribute groups.
    pub fn attributes<'a>(&'a self, function: &'a Function) -> impl Iterator<Item = &'a Attribute> {
        let grouped = function
            .attribute_groups
            .iter()
            .filter_map(|id| self.attribute_groups.get(id))
            .flat_map(|g| g.attributes.iter());
        function.attributes.iter().chain(grouped)
    }

    /// Qubit count declared on `function`, if any.
    ///
    /// Looks for the first attribute whose key contains `requiredQubits` and
    /// parses its value as an integer.
    pub fn required_qubits(&self, function: &Function) -> ParseResult<Option<u32>> {
        let Some(attr) = self
            .attributes(function)
            .find(|a| a.key.contains(REQUIRED_QUBITS_ATTR))
        else {
            return Ok(None);
        };

        let value = attr.value.as_deref().unwrap_or_default();
        value
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ParseError::InvalidAttribute {
                key: attr.key.clone(),
                value: value.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module_with(attrs: Vec<Attribute>) -> Module {
        let mut module = Module::default();
        module.attribute_groups.insert(
            0,
            AttributeGroup {
                id: 0,
                attributes: attrs,
            },
        );
        module.functions.push(Function {
            name: "decl".into(),
            attribute_groups: vec![],
            attributes: vec![],
            body: None,
        });
        module.functions.push(Function {
            name: "kernel".into(),
            attribute_groups: vec![0],
            attributes: vec![],
            body: Some(vec![]),
        });
        module
    }

    #[test]
    fn test_kernel_skips_declarations() {
        let module = module_with(vec![Attribute::flag(ENTRY_POINT_ATTR)]);
        assert_eq!(module.kernel().unwrap().name, "kernel");
        assert!(module.has_entry_point());
    }

    #[test]
    fn test_required_qubits() {
        let module = module_with(vec![
            Attribute::flag(ENTRY_POINT_ATTR),
            Attribute::pair("requiredQubits", "3"),
        ]);
        let kernel = module.kernel().unwrap();
        assert_eq!(module.required_qubits(kernel).unwrap(), Some(3));
    }

    #[test]
    fn test_required_qubits_absent() {
        let module = module_with(vec![Attribute::flag(ENTRY_POINT_ATTR)]);
        let kernel = module.kernel().unwrap();
        assert_eq!(module.required_qubits(kernel).unwrap(), None);
    }

    #[test]
    fn test_required_qubits_not_numeric() {
        let module = module_with(vec![Attribute::pair("requiredQubits", "two")]);
        let kernel = module.kernel().unwrap();
        assert!(matches!(
            module.required_qubits(kernel),
            Err(ParseError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_inline_attributes_take_precedence() {
        let mut module = module_with(vec![Attribute::pair("requiredQubits", "3")]);
        assert!(!module.has_entry_point());

        module.functions[1].attributes = vec![
            Attribute::flag(ENTRY_POINT_ATTR),
            Attribute::pair("requiredQubits", "5"),
        ];
        assert!(module.has_entry_point());
        let kernel = module.kernel().unwrap();
        assert_eq!(module.required_qubits(kernel).unwrap(), Some(5));
        assert_eq!(module.attributes(kernel).count(), 3);
    }

    #[test]
    fn test_operand_addresses() {
        assert_eq!(Operand::Null.as_address(), Some(0));
        assert_eq!(Operand::Address(4).as_address(), Some(4));
        assert_eq!(Operand::Float(0.5).as_address(), None);
        assert_eq!(Operand::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Operand::Local("0".into()).as_address(), None);
    }
}
