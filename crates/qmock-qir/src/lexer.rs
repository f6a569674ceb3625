//! Lexer for textual QIR (LLVM assembly).
//!
//! Only the token classes needed to recover module structure are
//! distinguished. Everything else lexes as a bare [`Token::Word`].

use logos::Logos;

/// Tokens for textual LLVM IR.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("\n")]
    Newline,

    // Identifiers
    #[regex(r"@[A-Za-z0-9_.$-]+", |lex| lex.slice()[1..].to_string())]
    #[regex(r#"@"[^"]*""#, |lex| {
        let s = lex.slice();
        s[2..s.len()-1].to_string()
    })]
    Global(String),

    #[regex(r"%[A-Za-z0-9_.$-]+", |lex| lex.slice()[1..].to_string())]
    #[regex(r#"%"[^"]*""#, |lex| {
        let s = lex.slice();
        s[2..s.len()-1].to_string()
    })]
    Local(String),

    #[regex(r"#[0-9]+", |lex| lex.slice()[1..].parse::<u32>().ok())]
    AttrGroup(u32),

    #[regex(r"![A-Za-z0-9_.-]+", |lex| lex.slice()[1..].to_string())]
    Metadata(String),

    // Literals
    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        s[1..s.len()-1].to_string()
    })]
    #[regex(r#"c"[^"]*""#, |lex| {
        let s = lex.slice();
        s[2..s.len()-1].to_string()
    })]
    Str(String),

    #[regex(r"-?[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"0x[0-9A-Fa-f]{16}", |lex| {
        u64::from_str_radix(&lex.slice()[2..], 16).ok().map(f64::from_bits)
    })]
    Float(f64),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$.]*", |lex| lex.slice().to_string())]
    Word(String),

    // Punctuation
    #[token("=")]
    Eq,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token(",")]
    Comma,

    #[token("*")]
    Star,

    #[token(":")]
    Colon,

    #[token("!")]
    Bang,

    #[token("...")]
    Ellipsis,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Newline => write!(f, "newline"),
            Token::Global(name) => write!(f, "@{name}"),
            Token::Local(name) => write!(f, "%{name}"),
            Token::AttrGroup(id) => write!(f, "#{id}"),
            Token::Metadata(name) => write!(f, "!{name}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Float(v) => write!(f, "{v}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Word(w) => write!(f, "{w}"),
            Token::Eq => write!(f, "="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Bang => write!(f, "!"),
            Token::Ellipsis => write!(f, "..."),
        }
    }
}

/// A token with its byte span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

/// Tokenize a textual QIR module.
pub fn tokenize(source: &str) -> Vec<Result<SpannedToken, (std::ops::Range<usize>, String)>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        if let Ok(token) = result {
            tokens.push(Ok(SpannedToken { token, span }));
        } else {
            let slice = &source[span.clone()];
            tokens.push(Err((span, format!("Invalid token: '{slice}'"))));
        }
    }

    tokens
}
