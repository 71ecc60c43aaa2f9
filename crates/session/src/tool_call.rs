//! The textual tool-call protocol.
//!
//! The model invokes a tool by writing a call on its own:
//!
//! ```text
//! sum(1, 2)
//! do_x()
//! fetch_html('https://example.com')
//! send_text_file("notes.md", "line one\nline two")
//! ```
//!
//! Names are `[A-Za-z0-9_]+`. An argument is either a bare token of
//! alphanumerics and `. _ - : /`, or a single/double-quoted string that may
//! span lines and use backslash escapes. Whitespace between tokens is
//! ignored, and so is anything after the closing parenthesis.

use std::iter::Peekable;
use std::str::CharIndices;

use minerva_core::error::ToolError;
use minerva_core::tool::{ParamType, Tool, ToolCall, ToolRegistry};

/// Describe a tool for the system prompt.
pub fn format_tool(tool: &dyn Tool) -> String {
    format!(
        "Name: {}\nSignature: {}\nDescription: {}\n",
        tool.name(),
        signature(tool),
        tool.description()
    )
}

/// `(a: int, b: int) -> str`
pub fn signature(tool: &dyn Tool) -> String {
    let params = tool
        .parameters()
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ");
    format!("({params}) -> {}", ParamType::Str)
}

/// Parse a call and resolve it against the registry.
pub fn parse_tool_call(text: &str, registry: &ToolRegistry) -> Result<ToolCall, ToolError> {
    // Arguments arrive unquoted; the declared type decides what they become
    let (tool_name, raw_args) = CallScanner::new(text).scan()?;

    let tool = registry
        .get(&tool_name)
        .ok_or_else(|| ToolError::NotFound(tool_name.clone()))?;

    let params = tool.parameters();
    if raw_args.len() != params.len() {
        return Err(ToolError::Arity {
            tool_name,
            expected: params.len(),
            got: raw_args.len(),
        });
    }

    let args = raw_args
        .iter()
        .zip(params)
        .map(|(raw, param)| {
            param.ty.coerce(raw).map_err(|reason| ToolError::ArgType {
                tool_name: tool_name.clone(),
                param: param.name.to_string(),
                expected: param.ty.to_string(),
                value: raw.clone(),
                reason,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ToolCall { tool, args })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_bare_arg_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '/')
}

/// Single-pass scanner over the call grammar.
struct CallScanner<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> CallScanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices().peekable(),
            len: text.len(),
        }
    }

    fn scan(mut self) -> Result<(String, Vec<String>), ToolError> {
        self.skip_whitespace();
        let name = self.take_while(is_name_char);
        if name.is_empty() {
            return Err(self.error("expected a tool name"));
        }

        self.skip_whitespace();
        self.expect('(')?;
        self.skip_whitespace();

        let mut args = Vec::new();
        if self.eat(')') {
            return Ok((name, args));
        }

        loop {
            self.skip_whitespace();
            args.push(self.arg()?);
            self.skip_whitespace();
            if self.eat(')') {
                return Ok((name, args));
            }
            self.expect(',')?;
        }
    }

    fn arg(&mut self) -> Result<String, ToolError> {
        match self.chars.peek().map(|&(_, c)| c) {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                self.quoted(quote)
            }
            Some(c) if is_bare_arg_char(c) => Ok(self.take_while(is_bare_arg_char)),
            _ => Err(self.error("expected an argument")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, ToolError> {
        let mut text = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, escaped @ ('\\' | '"' | '\''))) => text.push(escaped),
                    // Unknown escapes are kept verbatim
                    Some((_, other)) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                },
                c if c == quote => return Ok(text),
                c => text.push(c),
            }
        }
        Err(self.error("unterminated string"))
    }

    fn take_while(&mut self, pred: fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.chars.next();
        }
        out
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<(), ToolError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn error(&mut self, what: &str) -> ToolError {
        match self.chars.peek() {
            Some(&(at, c)) => ToolError::Syntax(format!("{what} at position {at}, found '{c}'")),
            None => ToolError::Syntax(format!("{what} at position {}, found end of input", self.len)),
        }
    }
}
