//! Parser recovering module structure from textual QIR.
//!
//! The parser is line oriented: top-level items it does not model (type
//! definitions, globals, declarations of metadata) are skipped up to the next
//! newline. Function bodies are split into one [`Instruction`] per line.

use rustc_hash::FxHashMap;

use crate::error::{ParseError, ParseResult};
use crate::lexer::{SpannedToken, Token, tokenize};
use crate::module::{
    Attribute, AttributeGroup, Function, Instruction, InstructionKind, Module, Operand,
};

/// Magic number of a raw LLVM bitcode file.
const BITCODE_MAGIC: [u8; 4] = [0x42, 0x43, 0xC0, 0xDE];

/// Magic number of a bitcode wrapper header.
const BITCODE_WRAPPER_MAGIC: [u8; 4] = [0xDE, 0xC0, 0x17, 0x0B];

/// Decode a module from a raw payload.
pub fn decode_module(bytes: &[u8]) -> ParseResult<Module> {
    if bytes.starts_with(&BITCODE_MAGIC) || bytes.starts_with(&BITCODE_WRAPPER_MAGIC) {
        return Err(ParseError::Bitcode);
    }
    let source = std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    parse_module(source)
}

/// Parse a textual QIR module.
pub fn parse_module(source: &str) -> ParseResult<Module> {
    let mut parser = Parser::new(source)?;
    parser.parse_module()
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> ParseResult<Self> {
        let mut tokens = Vec::new();
        for result in tokenize(source) {
            match result {
                Ok(t) => tokens.push(t),
                Err((span, msg)) => {
                    return Err(ParseError::LexerError {
                        position: span.start,
                        message: msg,
                    });
                }
            }
        }

        Ok(Self {
            source,
            tokens,
            pos: 0,
            line: 1,
        })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.is_eof() {
            return None;
        }
        let token = self.tokens[self.pos].token.clone();
        if token == Token::Newline {
            self.line += 1;
        }
        self.pos += 1;
        Some(token)
    }

    fn unexpected(&self, expected: &str, found: Option<Token>) -> ParseError {
        match found {
            Some(found) => ParseError::UnexpectedToken {
                line: self.line,
                expected: expected.to_string(),
                found: found.to_string(),
            },
            None => ParseError::UnexpectedEof(expected.to_string()),
        }
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        let found = self.advance();
        match found {
            Some(ref t) if std::mem::discriminant(t) == std::mem::discriminant(expected) => Ok(()),
            other => Err(self.unexpected(&expected.to_string(), other)),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.advance();
        }
    }

    /// Skip to just past the next newline.
    fn skip_line(&mut self) {
        while let Some(token) = self.advance() {
            if token == Token::Newline {
                break;
            }
        }
    }

    /// Skip a balanced `open ... close` group starting at the current token.
    fn skip_balanced(&mut self, open: &Token, close: &Token) -> ParseResult<()> {
        self.expect(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.advance() {
                Some(ref t) if t == open => depth += 1,
                Some(ref t) if t == close => depth -= 1,
                Some(_) => {}
                None => return Err(ParseError::UnexpectedEof(format!("closing '{close}'"))),
            }
        }
        Ok(())
    }

    fn parse_module(&mut self) -> ParseResult<Module> {
        let mut module = Module::default();
        let mut groups = FxHashMap::default();

        loop {
            self.skip_newlines();
            let word = match self.peek() {
                Some(Token::Word(word)) => word.clone(),
                Some(_) => {
                    self.skip_line();
                    continue;
                }
                None => break,
            };

            match word.as_str() {
                "define" => module.functions.push(self.parse_function(true)?),
                "declare" => module.functions.push(self.parse_function(false)?),
                "attributes" => {
                    let group = self.parse_attribute_group()?;
                    groups.insert(group.id, group);
                }
                "source_filename" => {
                    self.advance();
                    self.expect(&Token::Eq)?;
                    match self.advance() {
                        Some(Token::Str(name)) => module.source_filename = Some(name),
                        other => return Err(self.unexpected("source file name", other)),
                    }
                }
                _ => self.skip_line(),
            }
        }

        module.attribute_groups = groups;
        Ok(module)
    }

    fn parse_function(&mut self, has_body: bool) -> ParseResult<Function> {
        // `define` / `declare`
        self.advance();

        let name = loop {
            match self.advance() {
                Some(Token::Global(name)) => break name,
                Some(Token::Newline) | None => {
                    return Err(ParseError::UnexpectedEof("function name".into()));
                }
                Some(_) => {}
            }
        };

        self.skip_balanced(&Token::LParen, &Token::RParen)?;

        let mut attribute_groups = Vec::new();
        let mut attributes = Vec::new();
        loop {
            match self.peek() {
                Some(Token::AttrGroup(id)) => {
                    attribute_groups.push(*id);
                    self.advance();
                }
                Some(Token::Str(_)) => attributes.push(self.parse_string_attribute()?),
                Some(Token::LBrace) if has_body => {
                    self.advance();
                    break;
                }
                Some(Token::LParen) => self.skip_balanced(&Token::LParen, &Token::RParen)?,
                Some(Token::Newline) | None => {
                    if has_body {
                        let found = self.advance();
                        return Err(self.unexpected("'{' opening function body", found));
                    }
                    break;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }

        let body = if has_body {
            Some(self.parse_body()?)
        } else {
            None
        };

        Ok(Function {
            name,
            attribute_groups,
            attributes,
            body,
        })
    }

    /// Parse `"key"` or `"key"="value"` starting at a string token.
    fn parse_string_attribute(&mut self) -> ParseResult<Attribute> {
        let key = match self.advance() {
            Some(Token::Str(key)) => key,
            other => return Err(self.unexpected("attribute", other)),
        };
        if self.peek() != Some(&Token::Eq) {
            return Ok(Attribute::flag(key));
        }
        self.advance();
        match self.advance() {
            Some(Token::Str(value)) => Ok(Attribute::pair(key, value)),
            other => Err(self.unexpected("attribute value", other)),
        }
    }

    fn parse_body(&mut self) -> ParseResult<Vec<Instruction>> {
        let mut instructions = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => return Err(ParseError::UnexpectedEof("'}' closing function body".into())),
                Some(Token::RBrace) => {
                    self.advance();
                    return Ok(instructions);
                }
                Some(_) => instructions.push(self.parse_instruction()),
            }
        }
    }

    fn parse_instruction(&mut self) -> Instruction {
        let line = self.line;
        let start = self.pos;
        while !matches!(self.peek(), None | Some(Token::Newline)) {
            self.advance();
        }
        let end = self.pos;

        let spans = &self.tokens[start..end];
        let text = match (spans.first(), spans.last()) {
            (Some(first), Some(last)) => self.source[first.span.start..last.span.end].to_string(),
            _ => String::new(),
        };
        let tokens: Vec<Token> = spans.iter().map(|t| t.token.clone()).collect();

        Instruction {
            line,
            text,
            kind: classify(&tokens),
        }
    }

    fn parse_attribute_group(&mut self) -> ParseResult<AttributeGroup> {
        // `attributes`
        self.advance();

        let id = match self.advance() {
            Some(Token::AttrGroup(id)) => id,
            other => return Err(self.unexpected("attribute group id", other)),
        };
        self.expect(&Token::Eq)?;
        self.expect(&Token::LBrace)?;

        let mut attributes = Vec::new();
        loop {
            if let Some(Token::Str(_)) = self.peek() {
                attributes.push(self.parse_string_attribute()?);
                continue;
            }
            match self.advance() {
                Some(Token::RBrace) => break,
                Some(Token::Word(key)) => {
                    // Enum attributes such as `memory(none)` or `alignstack=4`.
                    match self.peek() {
                        Some(Token::LParen) => {
                            self.skip_balanced(&Token::LParen, &Token::RParen)?;
                        }
                        Some(Token::Eq) => {
                            self.advance();
                            self.advance();
                        }
                        _ => {}
                    }
                    attributes.push(Attribute::flag(key));
                }
                Some(_) => {}
                None => return Err(ParseError::UnexpectedEof("'}' closing attribute group".into())),
            }
        }

        Ok(AttributeGroup { id, attributes })
    }
}

/// Classify one body line.
fn classify(tokens: &[Token]) -> InstructionKind {
    match tokens {
        [Token::Word(label) | Token::Str(label), Token::Colon] => {
            return InstructionKind::Label(label.clone());
        }
        [Token::Int(label), Token::Colon] => return InstructionKind::Label(label.to_string()),
        [Token::Word(w), ..] if w == "ret" => return InstructionKind::Ret,
        [Token::Word(br), Token::Word(label), Token::Local(target)]
            if br == "br" && label == "label" =>
        {
            return InstructionKind::Branch(target.clone());
        }
        [
            Token::Word(br),
            Token::Word(ty),
            condition,
            Token::Comma,
            Token::Word(l1),
            Token::Local(if_true),
            Token::Comma,
            Token::Word(l2),
            Token::Local(if_false),
        ] if br == "br" && ty == "i1" && l1 == "label" && l2 == "label" => {
            return InstructionKind::CondBranch {
                condition: classify_operand(std::slice::from_ref(condition)),
                if_true: if_true.clone(),
                if_false: if_false.clone(),
            };
        }
        _ => {}
    }

    let dest = match tokens {
        [Token::Local(dest), Token::Eq, ..] => Some(dest.clone()),
        _ => None,
    };

    let Some(call_at) = tokens
        .iter()
        .position(|t| matches!(t, Token::Word(w) if w == "call"))
    else {
        return InstructionKind::Other;
    };

    // Callee is the first global directly followed by an argument list.
    let rest = &tokens[call_at + 1..];
    let Some(callee_at) = rest
        .windows(2)
        .position(|w| matches!(w, [Token::Global(_), Token::LParen]))
    else {
        return InstructionKind::Other;
    };
    let Token::Global(callee) = &rest[callee_at] else {
        return InstructionKind::Other;
    };

    match split_arguments(&rest[callee_at + 2..]) {
        Some(args) => InstructionKind::Call {
            dest,
            callee: callee.clone(),
            args: args.iter().map(|a| classify_operand(a)).collect(),
        },
        None => InstructionKind::Other,
    }
}

/// Split the tokens after an opening `(` into top-level arguments.
///
/// Returns `None` if the closing parenthesis is missing.
fn split_arguments(tokens: &[Token]) -> Option<Vec<&[Token]>> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace | Token::Lt => depth += 1,
            Token::RParen if depth == 0 => {
                if i > start {
                    args.push(&tokens[start..i]);
                }
                return Some(args);
            }
            Token::RParen | Token::RBracket | Token::RBrace | Token::Gt => {
                depth = depth.saturating_sub(1);
            }
            Token::Comma if depth == 0 => {
                args.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    None
}

fn classify_operand(tokens: &[Token]) -> Operand {
    let is_word = |t: &Token, w: &str| matches!(t, Token::Word(x) if x == w);

    if let Some(at) = tokens.iter().position(|t| is_word(t, "inttoptr")) {
        return tokens[at..]
            .iter()
            .find_map(|t| match t {
                Token::Int(v) => u64::try_from(*v).ok(),
                _ => None,
            })
            .map_or(Operand::Other, Operand::Address);
    }
    if tokens.iter().any(|t| is_word(t, "null")) {
        return Operand::Null;
    }
    match tokens.last() {
        Some(Token::Float(v)) => Operand::Float(*v),
        Some(Token::Int(v)) => Operand::Int(*v),
        Some(Token::Local(name)) => Operand::Local(name.clone()),
        Some(Token::Word(w)) if w == "true" => Operand::Bool(true),
        Some(Token::Word(w)) if w == "false" => Operand::Bool(false),
        _ => Operand::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BELL: &str = r#"; ModuleID = 'LLVMDialectModule'
source_filename = "LLVMDialectModule"

%Qubit = type opaque
%Result = type opaque

@cstr.r00000 = private constant [7 x i8] c"r00000\00"

define void @__nvqpp__mlirgen__bell() local_unnamed_addr #0 {
  tail call void @__quantum__qis__h__body(%Qubit* null)
  tail call void @__quantum__qis__cnot__body(%Qubit* null, %Qubit* nonnull inttoptr (i64 1 to %Qubit*))
  tail call void @__quantum__qis__mz__body(%Qubit* null, %Result* writeonly null)
  tail call void @__quantum__rt__result_record_output(%Result* null, i8* nonnull getelementptr inbounds ([7 x i8], [7 x i8]* @cstr.r00000, i64 0, i64 0))
  ret void
}

declare void @__quantum__qis__h__body(%Qubit*) local_unnamed_addr

attributes #0 = { "entry_point" "output_names"="[[[0,[0,\22r00000\22]]]]" "qir_profiles"="adaptive_profile" "requiredQubits"="2" "requiredResults"="1" }

!llvm.module.flags = !{!0}
!0 = !{i32 1, !"qir_major_version", i32 1}
"#;

    #[test]
    fn test_parse_bell_module() {
        let module = parse_module(BELL).unwrap();
        assert_eq!(module.source_filename.as_deref(), Some("LLVMDialectModule"));
        assert_eq!(module.functions.len(), 2);
        assert!(module.has_entry_point());

        let kernel = module.kernel().unwrap();
        assert_eq!(kernel.name, "__nvqpp__mlirgen__bell");
        assert_eq!(kernel.attribute_groups, vec![0]);
        assert_eq!(module.required_qubits(kernel).unwrap(), Some(2));

        let body = kernel.body.as_ref().unwrap();
        assert_eq!(body.len(), 5);
        assert_eq!(body[4].kind, InstructionKind::Ret);
        assert_eq!(
            body[1].kind,
            InstructionKind::Call {
                dest: None,
                callee: "__quantum__qis__cnot__body".into(),
                args: vec![Operand::Null, Operand::Address(1)],
            }
        );
    }

    #[test]
    fn test_instruction_lines_and_text() {
        let module = parse_module(BELL).unwrap();
        let body = module.kernel().unwrap().body.clone().unwrap();
        assert_eq!(body[0].line, 10);
        assert_eq!(
            body[0].text,
            "tail call void @__quantum__qis__h__body(%Qubit* null)"
        );
    }

    #[test]
    fn test_opaque_pointers_and_rotation() {
        let source = r#"
define void @rot() #0 {
entry:
  call void @__quantum__qis__rx__body(double 0x3FF921FB54442D18, ptr inttoptr (i64 2 to ptr))
  br label %exit
exit:
  ret void
}
attributes #0 = { "entry_point" }
"#;
        let module = parse_module(source).unwrap();
        let body = module.kernel().unwrap().body.clone().unwrap();
        assert_eq!(body[0].kind, InstructionKind::Label("entry".into()));
        match &body[1].kind {
            InstructionKind::Call { callee, args, .. } => {
                assert_eq!(callee, "__quantum__qis__rx__body");
                let theta = args[0].as_f64().unwrap();
                assert!((theta - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
                assert_eq!(args[1], Operand::Address(2));
            }
            other => panic!("expected call, got {other:?}"),
        }
        assert_eq!(body[2].kind, InstructionKind::Branch("exit".into()));
    }

    #[test]
    fn test_inline_header_attributes() {
        let source = r#"
define void @k() local_unnamed_addr "entry_point" "requiredQubits"="1" {
  call void @__quantum__qis__h__body(ptr null)
  ret void
}
"#;
        let module = parse_module(source).unwrap();
        assert!(module.has_entry_point());

        let kernel = module.kernel().unwrap();
        assert!(kernel.attribute_groups.is_empty());
        assert_eq!(
            kernel.attributes,
            vec![
                Attribute::flag("entry_point"),
                Attribute::pair("requiredQubits", "1"),
            ]
        );
        assert_eq!(module.required_qubits(kernel).unwrap(), Some(1));
    }

    #[test]
    fn test_read_result_and_conditional_branch() {
        let source = r#"
define void @k() #0 {
entry:
  %0 = call i1 @__quantum__qis__read_result__body(ptr null)
  br i1 %0, label %then, label %continue
then:
  br label %continue
continue:
  br i1 true, label %exit, label %exit
exit:
  ret void
}
"#;
        let module = parse_module(source).unwrap();
        let body = module.kernel().unwrap().body.clone().unwrap();
        assert_eq!(
            body[1].kind,
            InstructionKind::Call {
                dest: Some("0".into()),
                callee: "__quantum__qis__read_result__body".into(),
                args: vec![Operand::Null],
            }
        );
        assert_eq!(
            body[2].kind,
            InstructionKind::CondBranch {
                condition: Operand::Local("0".into()),
                if_true: "then".into(),
                if_false: "continue".into(),
            }
        );
        assert!(matches!(
            &body[6].kind,
            InstructionKind::CondBranch { condition: Operand::Bool(true), .. }
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let source = "define void @k() {\n  ret void\n}\n";
        let module = parse_module(source).unwrap();
        assert!(!module.has_entry_point());
        assert!(module.kernel().is_some());
    }

    #[test]
    fn test_declarations_only() {
        let source = "declare void @__quantum__qis__h__body(ptr)\nattributes #0 = { \"entry_point\" }\n";
        let module = parse_module(source).unwrap();
        assert!(module.has_entry_point());
        assert!(module.kernel().is_none());
    }

    #[test]
    fn test_unterminated_body() {
        let source = "define void @k() #0 {\n  ret void\n";
        assert!(matches!(
            parse_module(source),
            Err(ParseError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_bitcode_rejected() {
        let bytes = [0x42, 0x43, 0xC0, 0xDE, 0x35, 0x14];
        assert!(matches!(decode_module(&bytes), Err(ParseError::Bitcode)));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let bytes = [0xFF, 0xFE, 0x00];
        assert!(matches!(
            decode_module(&bytes),
            Err(ParseError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_enum_attributes_are_skipped() {
        let source = "attributes #1 = { nounwind memory(none) \"requiredQubits\"=\"4\" }\n";
        let module = parse_module(source).unwrap();
        let group = &module.attribute_groups[&1];
        assert!(group.contains("nounwind"));
        assert!(group.contains("memory"));
        assert!(group.contains("requiredQubits"));
    }
}
