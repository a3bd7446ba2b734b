//! Regular expressions over names.
//!
//! A pattern is a sequence of component matchers:
//!
//! - `<re>` matches one component whose URI form matches the regex `re`
//!   (`<>` matches any component)
//! - `[<a><b>]` matches one component matching any listed pattern, and
//!   `[^<a><b>]` one matching none of them
//! - `(...)` groups a sub-pattern and captures the components it matched;
//!   groups are numbered from 1 by their opening parenthesis
//! - `*`, `+`, `?`, `{n}`, `{n,}`, `{,m}` and `{n,m}` repeat the preceding
//!   item (greedily)
//! - `^` and `$` anchor the match; without them the pattern may match any
//!   contiguous run of components
//!
//! After a match, [`RegexMatch::expand`] builds a name from a template that
//! mixes back-references (`\1`) and literal components (`<ndn>`).

use std::fmt;

use ndn_packet::{Component, Name};

use crate::error::{Result, TrustError};

#[derive(Debug, Clone)]
enum ComponentPattern {
    Any,
    Regex(regex::Regex),
}

impl ComponentPattern {
    fn compile(inner: &str) -> Result<Self> {
        if inner.is_empty() {
            return Ok(Self::Any);
        }
        regex::Regex::new(&format!("^(?:{inner})$"))
            .map(Self::Regex)
            .map_err(|e| TrustError::regex(format!("component pattern `<{inner}>`: {e}")))
    }

    fn matches(&self, component: &Component) -> bool {
        match self {
            Self::Any => true,
            Self::Regex(re) => re.is_match(&component.to_uri()),
        }
    }
}

/// Tests a single component.
#[derive(Debug, Clone)]
enum Matcher {
    One(ComponentPattern),
    Set {
        negated: bool,
        patterns: Vec<ComponentPattern>,
    },
}

impl Matcher {
    fn matches(&self, component: &Component) -> bool {
        match self {
            Self::One(pattern) => pattern.matches(component),
            Self::Set { negated, patterns } => {
                patterns.iter().any(|p| p.matches(component)) != *negated
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Test(Matcher),
    Group { index: usize, items: Vec<Item> },
}

#[derive(Debug, Clone)]
struct Item {
    node: Node,
    min: usize,
    max: Option<usize>,
}

type Captures = Vec<Option<(usize, usize)>>;

/// Largest repeat bound a pattern may spell out.
const MAX_REPEAT: usize = 1024;

/// Largest compiled program accepted.
const MAX_PROGRAM: usize = 1 << 14;

/// One step of the backtracking program a pattern compiles to.
#[derive(Debug, Clone)]
enum Inst {
    /// Consume one component if it matches.
    Test(Matcher),
    /// Try the first target, falling back to the second.
    Split(usize, usize),
    Jump(usize),
    /// Record the current position in a capture slot.
    Save(usize),
    Match,
}

/// A compiled name pattern.
#[derive(Debug, Clone)]
pub struct NameRegex {
    source: String,
    program: Vec<Inst>,
    anchored_start: bool,
    anchored_end: bool,
    groups: usize,
}

/// The outcome of a successful match.
#[derive(Debug, Clone)]
pub struct RegexMatch<'a> {
    name: &'a Name,
    captures: Captures,
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
    groups: usize,
}

impl Parser<'_> {
    fn error(&self, msg: &str) -> TrustError {
        TrustError::regex(format!("{msg} at offset {} in `{}`", self.pos, self.source))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Items until end of input, `)` or `$`.
    fn parse_sequence(&mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        while let Some(c) = self.peek() {
            if c == ')' || c == '$' {
                break;
            }
            let node = self.parse_atom()?;
            let (min, max) = self.parse_repeat()?;
            items.push(Item { node, min, max });
        }
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Node> {
        match self.bump() {
            Some('<') => Ok(Node::Test(Matcher::One(self.parse_component_body()?))),
            Some('[') => {
                let negated = self.eat('^');
                let mut patterns = Vec::new();
                while self.eat('<') {
                    patterns.push(self.parse_component_body()?);
                }
                if !self.eat(']') || patterns.is_empty() {
                    return Err(self.error("malformed component set"));
                }
                Ok(Node::Test(Matcher::Set { negated, patterns }))
            }
            Some('(') => {
                self.groups += 1;
                let index = self.groups;
                let items = self.parse_sequence()?;
                if !self.eat(')') {
                    return Err(self.error("unclosed group"));
                }
                Ok(Node::Group { index, items })
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("unexpected character"))
            }
            None => Err(self.error("unexpected end of pattern")),
        }
    }

    /// Text after `<` up to the matching `>`.
    fn parse_component_body(&mut self) -> Result<ComponentPattern> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Some('<') => depth += 1,
                Some('>') if depth == 0 => break,
                Some('>') => depth -= 1,
                Some(_) => {}
                None => return Err(self.error("unclosed component pattern")),
            }
        }
        let inner: String = self.chars[start..self.pos - 1].iter().collect();
        ComponentPattern::compile(&inner)
    }

    fn parse_number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .parse()
            .ok()
    }

    fn parse_repeat(&mut self) -> Result<(usize, Option<usize>)> {
        let bounds = match self.peek() {
            Some('*') => (0, None),
            Some('+') => (1, None),
            Some('?') => (0, Some(1)),
            Some('{') => {
                self.pos += 1;
                let min = self.parse_number();
                let bounds = if self.eat(',') {
                    (min.unwrap_or(0), self.parse_number())
                } else {
                    let exact = min.ok_or_else(|| self.error("empty repeat bound"))?;
                    (exact, Some(exact))
                };
                if !self.eat('}') {
                    return Err(self.error("unclosed repeat"));
                }
                if bounds.1.is_some_and(|max| max < bounds.0) {
                    return Err(self.error("repeat maximum below minimum"));
                }
                if bounds.0 > MAX_REPEAT || bounds.1.is_some_and(|max| max > MAX_REPEAT) {
                    return Err(self.error("repeat bound too large"));
                }
                return Ok(bounds);
            }
            _ => return Ok((1, Some(1))),
        };
        self.pos += 1;
        Ok(bounds)
    }
}

impl NameRegex {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Regex` if the pattern is malformed.
    pub fn new(pattern: &str) -> Result<Self> {
        let mut parser = Parser {
            chars: pattern.chars().collect(),
            pos: 0,
            source: pattern,
            groups: 0,
        };

        let anchored_start = parser.eat('^');
        let items = parser.parse_sequence()?;
        let anchored_end = parser.eat('$');
        if parser.peek().is_some() {
            return Err(parser.error("unbalanced `)` or trailing input"));
        }

        let mut program = Vec::new();
        compile_items(&items, &mut program);
        program.push(Inst::Match);
        if program.len() > MAX_PROGRAM {
            return Err(TrustError::regex(format!(
                "pattern `{pattern}` expands to {} steps",
                program.len()
            )));
        }

        Ok(Self {
            source: pattern.to_owned(),
            program,
            anchored_start,
            anchored_end,
            groups: parser.groups,
        })
    }

    /// The pattern text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Number of capturing groups.
    #[must_use]
    pub const fn group_count(&self) -> usize {
        self.groups
    }

    #[must_use]
    pub fn matches(&self, name: &Name) -> bool {
        self.match_name(name).is_some()
    }

    /// Match `name`, returning the captured groups on success.
    ///
    /// Runs in time and memory proportional to the program size times the
    /// name length, with no recursion.
    #[must_use]
    pub fn match_name<'a>(&self, name: &'a Name) -> Option<RegexMatch<'a>> {
        let components = name.components();
        let last_start = if self.anchored_start { 0 } else { components.len() };
        // A (step, position) pair that failed once fails from every start.
        let mut visited = vec![false; self.program.len() * (components.len() + 1)];

        for start in 0..=last_start {
            let mut slots = vec![None; 2 * (self.groups + 1)];
            slots[0] = Some(start);
            if self.run(components, start, &mut visited, &mut slots) {
                let captures = slots
                    .chunks(2)
                    .map(|pair| pair[0].zip(pair[1]))
                    .collect();
                return Some(RegexMatch { name, captures });
            }
        }
        None
    }

    fn run(
        &self,
        components: &[Component],
        start: usize,
        visited: &mut [bool],
        slots: &mut [Option<usize>],
    ) -> bool {
        enum Frame {
            Step(usize, usize),
            Restore(usize, Option<usize>),
        }

        let width = components.len() + 1;
        let mut stack = vec![Frame::Step(0, start)];
        while let Some(frame) = stack.pop() {
            let (mut pc, mut pos) = match frame {
                Frame::Step(pc, pos) => (pc, pos),
                Frame::Restore(slot, value) => {
                    slots[slot] = value;
                    continue;
                }
            };
            loop {
                let seen = &mut visited[pc * width + pos];
                if *seen {
                    break;
                }
                *seen = true;

                match &self.program[pc] {
                    Inst::Test(matcher) => {
                        if !components.get(pos).is_some_and(|c| matcher.matches(c)) {
                            break;
                        }
                        pc += 1;
                        pos += 1;
                    }
                    Inst::Split(first, second) => {
                        stack.push(Frame::Step(*second, pos));
                        pc = *first;
                    }
                    Inst::Jump(target) => pc = *target,
                    Inst::Save(slot) => {
                        stack.push(Frame::Restore(*slot, slots[*slot]));
                        slots[*slot] = Some(pos);
                        pc += 1;
                    }
                    Inst::Match => {
                        if self.anchored_end && pos != components.len() {
                            break;
                        }
                        slots[1] = Some(pos);
                        return true;
                    }
                }
            }
        }
        false
    }
}

impl fmt::Display for NameRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn compile_items(items: &[Item], program: &mut Vec<Inst>) {
    for item in items {
        for _ in 0..item.min {
            compile_node(&item.node, program);
        }
        match item.max {
            None => {
                let split = program.len();
                program.push(Inst::Split(0, 0));
                compile_node(&item.node, program);
                program.push(Inst::Jump(split));
                let end = program.len();
                program[split] = Inst::Split(split + 1, end);
            }
            Some(max) => {
                let mut splits = Vec::with_capacity(max - item.min);
                for _ in item.min..max {
                    splits.push(program.len());
                    program.push(Inst::Split(0, 0));
                    compile_node(&item.node, program);
                }
                let end = program.len();
                for split in splits {
                    program[split] = Inst::Split(split + 1, end);
                }
            }
        }
    }
}

fn compile_node(node: &Node, program: &mut Vec<Inst>) {
    match node {
        Node::Test(matcher) => program.push(Inst::Test(matcher.clone())),
        Node::Group { index, items } => {
            program.push(Inst::Save(2 * index));
            compile_items(items, program);
            program.push(Inst::Save(2 * index + 1));
        }
    }
}

impl RegexMatch<'_> {
    /// Components captured by group `index` (0 is the whole match).
    #[must_use]
    pub fn group(&self, index: usize) -> Option<Name> {
        let (start, end) = self.captures.get(index).copied().flatten()?;
        Some(self.name.get_sub_name(start, end - start))
    }

    /// Build a name from `template`: `\N` inserts group `N` (an unmatched
    /// group inserts nothing) and `<text>` inserts a literal component.
    ///
    /// # Errors
    ///
    /// Returns `TrustError::Regex` for malformed templates or references to
    /// groups the pattern does not have.
    pub fn expand(&self, template: &str) -> Result<Name> {
        let mut out = Name::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                        digits.push(*d);
                        chars.next();
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| TrustError::regex(format!("bad back-reference in `{template}`")))?;
                    if index >= self.captures.len() {
                        return Err(TrustError::regex(format!(
                            "template `{template}` references missing group {index}"
                        )));
                    }
                    if let Some(group) = self.group(index) {
                        out = out.append_name(&group);
                    }
                }
                '<' => {
                    let literal: String = chars.by_ref().take_while(|&c| c != '>').collect();
                    out.push(Component::from_escaped(&literal)?);
                }
                c if c.is_whitespace() => {}
                other => {
                    return Err(TrustError::regex(format!(
                        "unexpected `{other}` in template `{template}`"
                    )))
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    #[test]
    fn anchored_component_patterns() {
        let re = NameRegex::new("^<ndn><edu>$").unwrap();
        assert!(re.matches(&name("/ndn/edu")));
        assert!(!re.matches(&name("/ndn/edu/ucla")));
        assert!(!re.matches(&name("/ndn")));
    }

    #[test]
    fn unanchored_patterns_match_anywhere() {
        let re = NameRegex::new("<KEY><>").unwrap();
        assert!(re.matches(&name("/a/b/KEY/ksk-1/ID-CERT")));
        assert!(!re.matches(&name("/a/b/KEY")));

        let prefix = NameRegex::new("^<a>").unwrap();
        assert!(prefix.matches(&name("/a/b/c")));
        assert!(!prefix.matches(&name("/b/a")));
    }

    #[test]
    fn component_regex_uses_uri_form() {
        let re = NameRegex::new("^<ksk-.*>$").unwrap();
        assert!(re.matches(&name("/ksk-123")));
        assert!(!re.matches(&name("/dsk-123")));

        let escaped = NameRegex::new("^<%FD.*>$").unwrap();
        assert!(escaped.matches(&Name::new().append(Component::from_version(1))));
    }

    #[test]
    fn sets_and_repeats() {
        let re = NameRegex::new("^[^<KEY>]*<KEY>$").unwrap();
        assert!(re.matches(&name("/a/b/KEY")));
        assert!(!re.matches(&name("/a/KEY/b/KEY")));

        let bounded = NameRegex::new("^<a>{2,3}$").unwrap();
        assert!(!bounded.matches(&name("/a")));
        assert!(bounded.matches(&name("/a/a")));
        assert!(bounded.matches(&name("/a/a/a")));
        assert!(!bounded.matches(&name("/a/a/a/a")));

        let optional = NameRegex::new("^<a>?<b>+$").unwrap();
        assert!(optional.matches(&name("/b/b")));
        assert!(optional.matches(&name("/a/b")));
        assert!(!optional.matches(&name("/a")));
    }

    #[test]
    fn hierarchical_key_expansion() {
        let re = NameRegex::new("^([^<KEY>]*)<KEY>(<>*)<ksk-.*><ID-CERT>$").unwrap();
        let cert = name("/ndn/ucla/KEY/alice/ksk-123/ID-CERT");
        let m = re.match_name(&cert).unwrap();
        assert_eq!(m.group(1).unwrap().to_uri(), "/ndn/ucla");
        assert_eq!(m.group(2).unwrap().to_uri(), "/alice");
        assert_eq!(m.expand("\\1\\2").unwrap().to_uri(), "/ndn/ucla/alice");
    }

    #[test]
    fn whole_name_capture() {
        let re = NameRegex::new("^(<>*)$").unwrap();
        let packet = name("/ndn/ucla/alice/data");
        let m = re.match_name(&packet).unwrap();
        assert_eq!(m.expand("\\1").unwrap(), packet);
        assert_eq!(m.expand("<prefix>\\1").unwrap().len(), 5);

        let empty = Name::new();
        assert_eq!(re.match_name(&empty).unwrap().expand("\\1").unwrap(), empty);
    }

    #[test]
    fn nested_groups_number_by_open_paren() {
        let re = NameRegex::new("^(<a>(<b>))<c>$").unwrap();
        assert_eq!(re.group_count(), 2);
        let n = name("/a/b/c");
        let m = re.match_name(&n).unwrap();
        assert_eq!(m.group(1).unwrap().to_uri(), "/a/b");
        assert_eq!(m.group(2).unwrap().to_uri(), "/b");
        assert_eq!(m.group(0).unwrap(), n);
    }

    #[test]
    fn backtracking_through_groups() {
        let re = NameRegex::new("^(<>*)<x>(<>*)$").unwrap();
        let n = name("/a/x/b/x/c");
        let m = re.match_name(&n).unwrap();
        assert_eq!(m.group(1).unwrap().to_uri(), "/a/x/b");
        assert_eq!(m.group(2).unwrap().to_uri(), "/c");
    }

    #[test]
    fn long_names_match_without_recursion() {
        let mut long = Name::parse("/root").unwrap();
        for i in 0..50_000 {
            long.push(Component::from_number(i));
        }

        let whole = NameRegex::new("^(<>*)$").unwrap();
        let m = whole.match_name(&long).unwrap();
        assert_eq!(m.expand("\\1").unwrap(), long);

        let key = NameRegex::new("^([^<KEY>]*)<KEY>(<>*)<ksk-.*><ID-CERT>$").unwrap();
        assert!(!key.matches(&long));

        let unanchored = NameRegex::new("<KEY><>").unwrap();
        assert!(!unanchored.matches(&long));
    }

    #[test]
    fn nested_repeats_terminate() {
        let re = NameRegex::new("^(<a>*)*<b>$").unwrap();
        assert!(re.matches(&name("/a/a/b")));
        assert!(!re.matches(&name("/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/a/c")));
        assert!(matches!(NameRegex::new("<a>{5000}"), Err(TrustError::Regex(_))));
        assert!(matches!(
            NameRegex::new("(<a>{200}){200}"),
            Err(TrustError::Regex(_))
        ));
    }

    #[test]
    fn malformed_patterns() {
        for bad in ["^<a", "(<a>", "<a>)", "[<a>", "[]", "<a>{3,1}", "<(>", "x", "<a>{}"] {
            assert!(
                matches!(NameRegex::new(bad), Err(TrustError::Regex(_))),
                "pattern {bad} should fail"
            );
        }
    }

    #[test]
    fn bad_templates() {
        let re = NameRegex::new("^(<>)$").unwrap();
        let n = name("/a");
        let m = re.match_name(&n).unwrap();
        assert!(m.expand("\\5").is_err());
        assert!(m.expand("\\x").is_err());
        assert!(m.expand("abc").is_err());
    }
}
