//! Parameterised capability templates
//!
//! Implements the terminfo `%` language used by strings such as `cup`
//! (`\x1b[%i%p1%d;%p2%dH`). Parameters are integers; `%s` prints its operand
//! in decimal.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("stack underflow at offset {0}")]
    StackUnderflow(usize),

    #[error("division by zero at offset {0}")]
    DivisionByZero(usize),

    #[error("unknown operator `%{op}` at offset {offset}")]
    UnknownOperator { op: char, offset: usize },

    #[error("template ends inside an operator at offset {0}")]
    Truncated(usize),

    #[error("{0} parameters given, at most 9 are supported")]
    TooManyParameters(usize),

    #[error("field width or precision above 1024 at offset {0}")]
    FieldTooWide(usize),
}

/// Largest width or precision a `%d`-style conversion may ask for.
pub const MAX_FIELD: usize = 1024;

/// A capability string that may take parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template<'a> {
    source: &'a str,
}

impl<'a> Template<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// True when the template never reads a parameter.
    pub fn is_literal(&self) -> bool {
        !self.source.contains('%')
    }

    pub fn expand(&self, params: &[i32]) -> Result<String, TemplateError> {
        expand(self.source, params)
    }

    pub fn expand_with(
        &self,
        params: &[i32],
        vars: &mut Variables,
    ) -> Result<String, TemplateError> {
        expand_with(self.source, params, vars)
    }
}

/// Static variables (`%PA`..`%PZ`) that persist between expansions.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    statics: [i32; 26],
}

pub fn expand(template: &str, params: &[i32]) -> Result<String, TemplateError> {
    expand_with(template, params, &mut Variables::default())
}

#[derive(Debug, Default)]
struct Layout {
    left: bool,
    plus: bool,
    space: bool,
    alternate: bool,
    zero: bool,
    width: usize,
    precision: Option<usize>,
}

pub fn expand_with(
    template: &str,
    params: &[i32],
    vars: &mut Variables,
) -> Result<String, TemplateError> {
    if params.len() > 9 {
        return Err(TemplateError::TooManyParameters(params.len()));
    }
    let mut p = [0i32; 9];
    p[..params.len()].copy_from_slice(params);

    let src: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len() + 8);
    let mut stack: Vec<i32> = Vec::new();
    let mut dynamic = [0i32; 26];
    let mut i = 0;

    let next = |i: &mut usize, at: usize| -> Result<char, TemplateError> {
        let c = *src.get(*i).ok_or(TemplateError::Truncated(at))?;
        *i += 1;
        Ok(c)
    };

    while i < src.len() {
        let c = src[i];
        i += 1;
        if c != '%' {
            out.push(c);
            continue;
        }
        let at = i - 1;
        let op = next(&mut i, at)?;
        match op {
            '%' => out.push('%'),
            'c' => {
                let v = pop(&mut stack, at)?;
                if let Some(ch) = u32::try_from(v).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            'p' => {
                let d = next(&mut i, at)?;
                let n = d
                    .to_digit(10)
                    .filter(|n| (1..=9).contains(n))
                    .ok_or(TemplateError::UnknownOperator { op: d, offset: at })?;
                stack.push(p[n as usize - 1]);
            }
            'P' | 'g' => {
                let name = next(&mut i, at)?;
                let slot = match name {
                    'a'..='z' => &mut dynamic[name as usize - 'a' as usize],
                    'A'..='Z' => &mut vars.statics[name as usize - 'A' as usize],
                    _ => return Err(TemplateError::UnknownOperator { op: name, offset: at }),
                };
                if op == 'P' {
                    *slot = pop(&mut stack, at)?;
                } else {
                    stack.push(*slot);
                }
            }
            '\'' => {
                let ch = next(&mut i, at)?;
                if next(&mut i, at)? != '\'' {
                    return Err(TemplateError::Truncated(at));
                }
                stack.push(ch as i32);
            }
            '{' => {
                let mut value: i32 = 0;
                loop {
                    let d = next(&mut i, at)?;
                    if d == '}' {
                        break;
                    }
                    let digit = d
                        .to_digit(10)
                        .ok_or(TemplateError::UnknownOperator { op: d, offset: at })?;
                    value = value.wrapping_mul(10).wrapping_add(digit as i32);
                }
                stack.push(value);
            }
            'l' => {
                let v = pop(&mut stack, at)?;
                stack.push(v.to_string().len() as i32);
            }
            '+' | '-' | '*' | '/' | 'm' | '&' | '|' | '^' | '=' | '>' | '<' | 'A' | 'O' => {
                let b = pop(&mut stack, at)?;
                let a = pop(&mut stack, at)?;
                let r = match op {
                    '+' => a.wrapping_add(b),
                    '-' => a.wrapping_sub(b),
                    '*' => a.wrapping_mul(b),
                    '/' => a.checked_div(b).ok_or(TemplateError::DivisionByZero(at))?,
                    'm' => a.checked_rem(b).ok_or(TemplateError::DivisionByZero(at))?,
                    '&' => a & b,
                    '|' => a | b,
                    '^' => a ^ b,
                    '=' => i32::from(a == b),
                    '>' => i32::from(a > b),
                    '<' => i32::from(a < b),
                    'A' => i32::from(a != 0 && b != 0),
                    _ => i32::from(a != 0 || b != 0),
                };
                stack.push(r);
            }
            '!' => {
                let v = pop(&mut stack, at)?;
                stack.push(i32::from(v == 0));
            }
            '~' => {
                let v = pop(&mut stack, at)?;
                stack.push(!v);
            }
            'i' => {
                p[0] = p[0].wrapping_add(1);
                p[1] = p[1].wrapping_add(1);
            }
            '?' | ';' => {}
            't' => {
                if pop(&mut stack, at)? == 0 {
                    i = skip_branch(&src, i, true);
                }
            }
            'e' => i = skip_branch(&src, i, false),
            _ => {
                let mut layout = Layout::default();
                let mut conv = op;
                if conv == ':' {
                    conv = next(&mut i, at)?;
                    while matches!(conv, '-' | '+' | '#' | ' ') {
                        set_flag(&mut layout, conv);
                        conv = next(&mut i, at)?;
                    }
                } else {
                    while matches!(conv, '#' | ' ') {
                        set_flag(&mut layout, conv);
                        conv = next(&mut i, at)?;
                    }
                }
                if conv == '0' {
                    layout.zero = true;
                }
                while let Some(d) = conv.to_digit(10) {
                    layout.width = push_digit(layout.width, d, at)?;
                    conv = next(&mut i, at)?;
                }
                if conv == '.' {
                    let mut precision = 0;
                    conv = next(&mut i, at)?;
                    while let Some(d) = conv.to_digit(10) {
                        precision = push_digit(precision, d, at)?;
                        conv = next(&mut i, at)?;
                    }
                    layout.precision = Some(precision);
                }
                if !matches!(conv, 'd' | 'o' | 'x' | 'X' | 's') {
                    return Err(TemplateError::UnknownOperator { op: conv, offset: at });
                }
                let v = pop(&mut stack, at)?;
                out.push_str(&format_number(v, conv, &layout));
            }
        }
    }
    Ok(out)
}

fn pop(stack: &mut Vec<i32>, at: usize) -> Result<i32, TemplateError> {
    stack.pop().ok_or(TemplateError::StackUnderflow(at))
}

fn push_digit(value: usize, digit: u32, at: usize) -> Result<usize, TemplateError> {
    value
        .checked_mul(10)
        .and_then(|v| v.checked_add(digit as usize))
        .filter(|&v| v <= MAX_FIELD)
        .ok_or(TemplateError::FieldTooWide(at))
}

fn set_flag(layout: &mut Layout, flag: char) {
    match flag {
        '-' => layout.left = true,
        '+' => layout.plus = true,
        '#' => layout.alternate = true,
        _ => layout.space = true,
    }
}

/// Skip a conditional branch starting at `i`, returning the index after the
/// `%e` (when `to_else`) or `%;` that ends it at the current nesting level.
fn skip_branch(src: &[char], mut i: usize, to_else: bool) -> usize {
    let mut depth = 0usize;
    while i < src.len() {
        if src[i] != '%' {
            i += 1;
            continue;
        }
        let op = src.get(i + 1).copied();
        i += 2;
        match op {
            Some('?') => depth += 1,
            Some(';') if depth == 0 => return i,
            Some(';') => depth -= 1,
            Some('e') if depth == 0 && to_else => return i,
            _ => {}
        }
    }
    src.len()
}

fn format_number(v: i32, conv: char, layout: &Layout) -> String {
    let mut digits = match conv {
        'o' => format!("{:o}", v as u32),
        'x' => format!("{:x}", v as u32),
        'X' => format!("{:X}", v as u32),
        _ => v.unsigned_abs().to_string(),
    };
    if let Some(precision) = layout.precision {
        if digits.len() < precision {
            digits = format!("{}{digits}", "0".repeat(precision - digits.len()));
        }
    }

    let signed = matches!(conv, 'd' | 's');
    let prefix = match conv {
        _ if signed && v < 0 => "-",
        _ if signed && layout.plus => "+",
        _ if signed && layout.space => " ",
        'o' if layout.alternate && !digits.starts_with('0') => "0",
        'x' if layout.alternate && v != 0 => "0x",
        'X' if layout.alternate && v != 0 => "0X",
        _ => "",
    };

    let len = prefix.len() + digits.len();
    if len >= layout.width {
        return format!("{prefix}{digits}");
    }
    let pad = layout.width - len;
    if layout.left {
        format!("{prefix}{digits}{}", " ".repeat(pad))
    } else if layout.zero && layout.precision.is_none() {
        format!("{prefix}{}{digits}", "0".repeat(pad))
    } else {
        format!("{}{prefix}{digits}", " ".repeat(pad))
    }
}
