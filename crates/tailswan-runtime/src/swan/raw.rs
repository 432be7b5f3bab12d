//! Parser for `swanctl --raw` output.
//!
//! Each streamed VICI message is printed on one line as
//! `<name> event {key=value section {…} list=[a b]}`. Every event line becomes
//! one JSON object: sections map to objects, lists to arrays of strings and
//! plain values to strings. Reply lines (`<cmd> reply {…}`) carry no listing
//! data and are skipped.
//!
//! Values are printed unquoted and may contain spaces (distinguished names such
//! as `C=CH, O=strongSwan Project, CN=moon`). A value ends at `}` or `]`, or at
//! whitespace followed by the next `key=` or `key {`; whitespace right after a
//! comma always belongs to the value. List items are separated by whitespace.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::Value;
use tailswan_core::{ControlError, JsonMap};

/// Parse every event line of a raw dump.
pub fn parse_events(output: &str) -> Result<Vec<JsonMap>, ControlError> {
    let mut events = Vec::new();
    for (number, line) in output.lines().enumerate() {
        let line = line.trim();
        let Some(open) = line.find('{') else {
            continue;
        };
        if !line[..open].trim_end().ends_with("event") {
            continue;
        }

        let body = &line[open..];
        let map = Parser::new(body)
            .section()
            .map_err(|e| ControlError::Protocol(format!("line {}: {e}", number + 1)))?;
        events.push(map);
    }
    Ok(events)
}

struct Parser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|&(_, c)| c.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, want: char) -> Result<(), String> {
        self.skip_ws();
        match self.chars.next() {
            Some((_, c)) if c == want => Ok(()),
            Some((at, c)) => Err(format!("expected '{want}' at {at}, found '{c}'")),
            None => Err(format!("expected '{want}', found end of input")),
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.position();
        let mut end = start;
        while let Some((i, c)) = self
            .chars
            .next_if(|&(_, c)| !c.is_whitespace() && !matches!(c, '{' | '}' | '[' | ']' | '='))
        {
            end = i + c.len_utf8();
        }
        &self.input[start..end]
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn value(&mut self) -> &'a str {
        let start = self.position();
        let end = start + value_len(&self.input[start..]);
        while self.chars.next_if(|&(i, _)| i < end).is_some() {}
        &self.input[start..end]
    }

    fn list_item(&mut self) -> &'a str {
        let start = self.position();
        let mut end = start;
        while let Some((i, c)) = self
            .chars
            .next_if(|&(_, c)| !c.is_whitespace() && !matches!(c, '}' | ']'))
        {
            end = i + c.len_utf8();
        }
        &self.input[start..end]
    }

    fn section(&mut self) -> Result<JsonMap, String> {
        self.expect('{')?;
        let mut map = JsonMap::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                None => return Err("unterminated section".to_string()),
                Some((_, '}')) => {
                    self.chars.next();
                    return Ok(map);
                }
                Some(_) => {}
            }

            let key = self.word();
            if key.is_empty() {
                let found = self.chars.peek().map_or(' ', |(_, c)| *c);
                return Err(format!("expected key, found '{found}'"));
            }

            self.skip_ws();
            let value = match self.chars.peek() {
                Some((_, '{')) => Value::Object(self.section()?),
                Some((_, '=')) => {
                    self.chars.next();
                    if matches!(self.chars.peek(), Some((_, '['))) {
                        self.list()?
                    } else {
                        Value::String(self.value().to_string())
                    }
                }
                Some((_, '[')) => self.list()?,
                _ => return Err(format!("expected value for '{key}'")),
            };
            map.insert(key.to_string(), value);
        }
    }

    fn list(&mut self) -> Result<Value, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                None => return Err("unterminated list".to_string()),
                Some((_, ']')) => {
                    self.chars.next();
                    return Ok(Value::Array(items));
                }
                Some(_) => {
                    let item = self.list_item();
                    if item.is_empty() {
                        return Err("malformed list item".to_string());
                    }
                    items.push(Value::String(item.to_string()));
                }
            }
        }
    }
}

/// Byte length of the value at the start of `rest`, trailing whitespace excluded.
fn value_len(rest: &str) -> usize {
    let mut end = 0;
    for (i, c) in rest.char_indices() {
        match c {
            '}' | ']' => return end,
            c if c.is_whitespace() => {
                if !rest[..end].ends_with(',') && starts_entry(&rest[i..]) {
                    return end;
                }
            }
            c => end = i + c.len_utf8(),
        }
    }
    end
}

/// Whether `rest` (leading whitespace allowed) begins a new entry or closes
/// the enclosing section.
fn starts_entry(rest: &str) -> bool {
    let rest = rest.trim_start();
    let key_len = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '='))
        .unwrap_or(rest.len());
    if key_len == 0 {
        return rest.is_empty() || rest.starts_with(['}', ']']);
    }
    matches!(rest[key_len..].trim_start().chars().next(), Some('=' | '{'))
}
