// Primitives shared by the readers.

use std::path::{Path, PathBuf};

/// A value written in the literal syntax used by the reducer inside CSV cells,
/// for example `[['3', '3', '4']]` or `[{'a1f': 2, 'None': 1}]`.
#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// The entries in the order in which they were written.
    Dict(Vec<(Literal, Literal)>),
}

pub fn parse_literal(s: &str) -> Result<Literal, String> {
    let mut parser = LiteralParser {
        chars: s.chars().collect(),
        pos: 0,
    };
    let lit = parser.value()?;
    parser.skip_whitespace();
    if parser.pos != parser.chars.len() {
        return Err(format!("trailing characters at position {}", parser.pos));
    }
    Ok(lit)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        self.skip_whitespace();
        match self.peek() {
            Some(x) if x == c => {
                self.pos += 1;
                Ok(())
            }
            x => Err(format!("expected {:?} at position {}, found {:?}", c, self.pos, x)),
        }
    }

    fn value(&mut self) -> Result<Literal, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('[') => self.sequence('[', ']').map(Literal::List),
            Some('(') => self.sequence('(', ')').map(Literal::List),
            Some('{') => self.dict(),
            Some(q) if q == '\'' || q == '"' => self.string(q).map(Literal::Str),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => self.identifier(),
            x => Err(format!("unexpected {:?} at position {}", x, self.pos)),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Vec<Literal>, String> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                x => return Err(format!("expected ',' or {:?}, found {:?}", close, x)),
            }
        }
    }

    fn dict(&mut self) -> Result<Literal, String> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Literal::Dict(entries));
            }
            let key = self.value()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                x => return Err(format!("expected ',' or '}}', found {:?}", x)),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            let c = self.peek().ok_or("unterminated string")?;
            self.pos += 1;
            match c {
                '\\' => {
                    let e = self.peek().ok_or("unterminated escape")?;
                    self.pos += 1;
                    match e {
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        'r' => s.push('\r'),
                        '\\' | '\'' | '"' => s.push(e),
                        'x' => s.push(self.code_point(2)?),
                        'u' => s.push(self.code_point(4)?),
                        _ => {
                            s.push('\\');
                            s.push(e);
                        }
                    }
                }
                c if c == quote => return Ok(s),
                c => s.push(c),
            }
        }
    }

    fn code_point(&mut self, digits: usize) -> Result<char, String> {
        let end = self.pos + digits;
        if end > self.chars.len() {
            return Err("truncated escape".to_string());
        }
        let hex: String = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or(format!("bad escape {:?}", hex))
    }

    fn number(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || "+-.eE".contains(c)) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Literal::Int(i));
        }
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|_| format!("bad number {:?}", text))
    }

    fn identifier(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            "nan" => Ok(Literal::Float(f64::NAN)),
            _ => Err(format!("unknown identifier {:?}", word)),
        }
    }
}

fn scalar_text(lit: &Literal) -> Result<String, String> {
    match lit {
        Literal::Str(s) => Ok(s.clone()),
        Literal::None => Ok("".to_string()),
        Literal::Int(i) => Ok(i.to_string()),
        Literal::Float(f) => Ok(f.to_string()),
        x => Err(format!("expected a string, found {:?}", x)),
    }
}

/// Reads aligned transcriptions: a list of groups, each a list of strings.
pub fn aligned_groups(lit: &Literal) -> Result<Vec<Vec<String>>, String> {
    match lit {
        Literal::List(groups) => groups
            .iter()
            .map(|g| match g {
                Literal::List(entries) => entries.iter().map(scalar_text).collect(),
                x => Err(format!("expected a group, found {:?}", x)),
            })
            .collect(),
        x => Err(format!("expected a list of groups, found {:?}", x)),
    }
}

/// Reads dropdown selections: a list of maps from code to votes. The code `None`
/// is an abstention.
pub fn selection_groups(lit: &Literal) -> Result<Vec<Vec<(Option<String>, u64)>>, String> {
    let groups = match lit {
        Literal::List(groups) => groups,
        x => return Err(format!("expected a list of selections, found {:?}", x)),
    };
    let mut res = Vec::with_capacity(groups.len());
    for g in groups {
        let entries = match g {
            Literal::Dict(entries) => entries,
            x => return Err(format!("expected a map of selections, found {:?}", x)),
        };
        let mut group = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            let code = match k {
                Literal::None => None,
                Literal::Str(s) if s == "None" => None,
                k => Some(scalar_text(k)?),
            };
            let votes = match v {
                Literal::Int(n) if *n >= 0 => *n as u64,
                Literal::Float(f) if *f >= 0.0 && f.fract() == 0.0 => *f as u64,
                x => return Err(format!("expected a number of votes, found {:?}", x)),
            };
            group.push((code, votes));
        }
        res.push(group);
    }
    Ok(res)
}

/// Reads a task label such as `T3`. Plain numbers are accepted too.
pub fn parse_task(label: &str) -> Option<u32> {
    let label = label.trim();
    label
        .strip_prefix('T')
        .unwrap_or(label)
        .parse::<u32>()
        .ok()
}

/// Resolves a path relative to a base directory. Absolute paths are kept.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_text() {
        let lit = parse_literal("[['3', '3', '4'], [\"It's\", '', None]]").unwrap();
        assert_eq!(
            aligned_groups(&lit).unwrap(),
            vec![
                vec!["3".to_string(), "3".to_string(), "4".to_string()],
                vec!["It's".to_string(), "".to_string(), "".to_string()],
            ]
        );
        assert_eq!(aligned_groups(&parse_literal("[]").unwrap()).unwrap().len(), 0);
    }

    #[test]
    fn selections_keep_their_order() {
        let lit = parse_literal("[{'b2e': 2, 'None': 1, 'a1f': 2}]").unwrap();
        assert_eq!(
            selection_groups(&lit).unwrap(),
            vec![vec![
                (Some("b2e".to_string()), 2),
                (None, 1),
                (Some("a1f".to_string()), 2)
            ]]
        );
    }

    #[test]
    fn escapes_and_numbers() {
        assert_eq!(
            parse_literal(r"'a\'b\\c\x41'").unwrap(),
            Literal::Str("a'b\\cA".to_string())
        );
        assert_eq!(parse_literal("-12").unwrap(), Literal::Int(-12));
        assert_eq!(parse_literal("2.5").unwrap(), Literal::Float(2.5));
        assert_eq!(
            parse_literal("(1, True,)").unwrap(),
            Literal::List(vec![Literal::Int(1), Literal::Bool(true)])
        );
    }

    #[test]
    fn malformed_literals() {
        assert!(parse_literal("[['3', '4']").is_err());
        assert!(parse_literal("['3'] x").is_err());
        assert!(parse_literal("{'a' 1}").is_err());
        assert!(selection_groups(&parse_literal("[{'a': -1}]").unwrap()).is_err());
        assert!(aligned_groups(&parse_literal("['3']").unwrap()).is_err());
    }

    #[test]
    fn task_labels() {
        assert_eq!(parse_task("T0"), Some(0));
        assert_eq!(parse_task("T24"), Some(24));
        assert_eq!(parse_task("7"), Some(7));
        assert_eq!(parse_task("Tx"), None);
    }
}
