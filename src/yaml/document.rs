//! Span-carrying YAML document tree.
//!
//! Built from `yaml-rust2` parser events. Every scalar records the byte range
//! it occupies in the source text, which is what lets the editor rewrite a
//! single value without touching the comments and layout around it.

use crate::yaml::errors::YamlError;
use crate::yaml::query::KeyPath;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Byte range `[start, end)` in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl From<TScalarStyle> for ScalarStyle {
    fn from(style: TScalarStyle) -> Self {
        match style {
            TScalarStyle::Plain => ScalarStyle::Plain,
            TScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            TScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            TScalarStyle::Literal => ScalarStyle::Literal,
            _ => ScalarStyle::Folded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
    /// Explicit tag as written or resolved by the parser, e.g. `!!str`.
    pub tag: Option<String>,
    pub span: Span,
}

impl Scalar {
    /// Whether the scalar resolves to a string.
    ///
    /// Quoted and block scalars are always strings. Plain scalars are strings
    /// unless they read as null, a boolean, an integer or a float.
    pub fn is_string(&self) -> bool {
        if let Some(tag) = &self.tag {
            return matches!(tag.as_str(), "!!str" | "tag:yaml.org,2002:str" | "!");
        }
        match self.style {
            ScalarStyle::Plain => resolves_to_string(&self.value),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    /// Key/value pairs in source order.
    pub entries: Vec<(Node, Node)>,
    /// Written as `{ ... }` (or nested inside a flow collection).
    pub flow: bool,
}

impl Mapping {
    /// Value of the first entry whose key is a scalar equal to `key`.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| matches!(k, Node::Scalar(s) if s.value == key))
            .map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
    Alias,
}

impl Node {
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Descend through mappings one key per path segment.
    ///
    /// Anything that is not a mapping along the way ends the walk with `None`.
    pub fn lookup(&self, path: &KeyPath) -> Option<&Node> {
        path.parts()
            .iter()
            .try_fold(self, |node, segment| node.as_mapping()?.get(segment))
    }
}

/// The first document of a YAML stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

const BYTE_ORDER_MARK: char = '\u{feff}';

impl Document {
    /// Parse the first document of `content`.
    ///
    /// A leading byte order mark is skipped; spans still index into `content`.
    pub fn parse(content: &str) -> Result<Self, YamlError> {
        let base = if content.starts_with(BYTE_ORDER_MARK) {
            BYTE_ORDER_MARK.len_utf8()
        } else {
            0
        };

        let mut collector = EventCollector::default();
        let mut parser = Parser::new_from_str(&content[base..]);
        // false = single document only
        parser.load(&mut collector, false)?;

        let builder = TreeBuilder::new(content, base);
        let root = builder.build(collector.events)?;

        if let Node::Scalar(scalar) = &root {
            // `---` with nothing after it
            if scalar.style == ScalarStyle::Plain && scalar.span.is_empty() {
                return Err(YamlError::EmptyDocument);
            }
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn lookup(&self, path: &KeyPath) -> Option<&Node> {
        self.root.lookup(path)
    }
}

#[derive(Default)]
struct EventCollector {
    events: Vec<(Event, Marker)>,
}

impl MarkedEventReceiver for EventCollector {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        self.events.push((ev, marker));
    }
}

enum Frame {
    Sequence {
        items: Vec<Node>,
        flow: bool,
    },
    Mapping {
        entries: Vec<(Node, Node)>,
        pending_key: Option<Node>,
        flow: bool,
    },
}

impl Frame {
    fn flow(&self) -> bool {
        match self {
            Frame::Sequence { flow, .. } | Frame::Mapping { flow, .. } => *flow,
        }
    }
}

struct TreeBuilder<'a> {
    source: &'a str,
    /// Byte offset of every char after `base`, plus one past the end. Markers
    /// count chars from where the parser started.
    offsets: Vec<usize>,
    stack: Vec<Frame>,
    root: Option<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str, base: usize) -> Self {
        let offsets = source[base..]
            .char_indices()
            .map(|(offset, _)| base + offset)
            .chain(std::iter::once(source.len()))
            .collect();
        Self {
            source,
            offsets,
            stack: Vec::new(),
            root: None,
        }
    }

    fn byte_offset(&self, marker: &Marker) -> usize {
        self.offsets
            .get(marker.index())
            .copied()
            .unwrap_or(self.source.len())
    }

    fn in_flow(&self) -> bool {
        self.stack.last().is_some_and(Frame::flow)
    }

    fn opens_flow(&self, offset: usize) -> bool {
        self.in_flow() || matches!(self.source.as_bytes().get(offset), Some(b'{' | b'['))
    }

    fn build(mut self, events: Vec<(Event, Marker)>) -> Result<Node, YamlError> {
        let bounds: Vec<usize> = events
            .iter()
            .skip(1)
            .map(|(_, marker)| self.byte_offset(marker))
            .chain(std::iter::once(self.source.len()))
            .collect();

        let mut floor = 0;
        for ((event, marker), bound) in events.into_iter().zip(bounds) {
            let offset = self.byte_offset(&marker);
            let previous = std::mem::replace(&mut floor, offset);
            match event {
                Event::Scalar(value, style, _anchor_id, tag) => {
                    let style = ScalarStyle::from(style);
                    let start = match style {
                        ScalarStyle::Literal | ScalarStyle::Folded => {
                            block_start(self.source, previous, offset)
                        }
                        _ => offset,
                    };
                    let end = scalar_end(self.source, start, bound, style, &value, self.in_flow());
                    let scalar = Scalar {
                        value,
                        style,
                        tag: tag.map(|tag| format!("{}{}", tag.handle, tag.suffix)),
                        span: Span { start, end },
                    };
                    self.push_complete(Node::Scalar(scalar));
                }
                Event::SequenceStart(_anchor_id, _tag) => {
                    let flow = self.opens_flow(offset);
                    self.stack.push(Frame::Sequence {
                        items: Vec::new(),
                        flow,
                    });
                }
                Event::MappingStart(_anchor_id, _tag) => {
                    let flow = self.opens_flow(offset);
                    self.stack.push(Frame::Mapping {
                        entries: Vec::new(),
                        pending_key: None,
                        flow,
                    });
                }
                Event::SequenceEnd | Event::MappingEnd => {
                    let node = match self.stack.pop() {
                        Some(Frame::Sequence { items, .. }) => Node::Sequence(items),
                        Some(Frame::Mapping {
                            entries,
                            pending_key: None,
                            flow,
                        }) => Node::Mapping(Mapping { entries, flow }),
                        _ => return Err(unbalanced()),
                    };
                    self.push_complete(node);
                }
                Event::Alias(_anchor_id) => self.push_complete(Node::Alias),
                _ => {}
            }
        }

        if !self.stack.is_empty() {
            return Err(unbalanced());
        }
        self.root.ok_or(YamlError::EmptyDocument)
    }

    fn push_complete(&mut self, node: Node) {
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
        }
    }
}

fn unbalanced() -> YamlError {
    YamlError::InvalidYamlSyntax {
        message: "unbalanced collection events".to_string(),
    }
}

/// End of the scalar that starts at `start`. `bound` is where the next parser
/// event begins, so the scalar text lies somewhere in `[start, bound)`.
fn scalar_end(
    source: &str,
    start: usize,
    bound: usize,
    style: ScalarStyle,
    value: &str,
    flow: bool,
) -> usize {
    let bound = bound.clamp(start, source.len());
    match style {
        ScalarStyle::DoubleQuoted => quoted_end(source, start, bound, b'"'),
        ScalarStyle::SingleQuoted => quoted_end(source, start, bound, b'\''),
        ScalarStyle::Plain => plain_end(source, start, bound, value, flow),
        ScalarStyle::Literal | ScalarStyle::Folded => block_end(source, start, bound),
    }
}

fn quoted_end(source: &str, start: usize, bound: usize, quote: u8) -> usize {
    let bytes = source.as_bytes();
    let mut idx = start + 1;
    while idx < bound {
        match bytes[idx] {
            b'\\' if quote == b'"' => idx += 2,
            b'\'' if quote == b'\'' && bytes.get(idx + 1) == Some(&b'\'') => idx += 2,
            byte if byte == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    bound
}

fn plain_end(source: &str, start: usize, bound: usize, value: &str, flow: bool) -> usize {
    let region = &source[start..bound];
    if !value.is_empty() && region.starts_with(value) {
        return start + value.len();
    }

    // Multi-line plain scalar: stop at a comment, a `key:` separator, a new
    // entry indicator on a following line, or a flow indicator.
    let bytes = region.as_bytes();
    let mut cut = region.len();
    for (idx, ch) in region.char_indices() {
        let prev_blank = idx == 0 || matches!(bytes[idx - 1], b' ' | b'\t' | b'\n' | b'\r');
        let next_blank = matches!(bytes.get(idx + 1), None | Some(b' ' | b'\t' | b'\n' | b'\r'));
        let stop = match ch {
            '#' => prev_blank,
            ':' => next_blank,
            ',' | '[' | ']' | '{' | '}' => flow,
            '\n' => {
                let next_line = region[idx + 1..].trim_start_matches([' ', '\t']);
                next_line.starts_with(['-', '?', '#'])
                    || next_line.starts_with("---")
                    || next_line.starts_with("...")
            }
            _ => false,
        };
        if stop {
            cut = idx;
            break;
        }
    }

    start + region[..cut].trim_end().len()
}

/// Block scalar events are marked at their content, past the `|`/`>` header.
/// Walk back from `marker` (no further than `floor`, the previous event) to
/// the indicator so the span covers the header and its comment too.
fn block_start(source: &str, floor: usize, marker: usize) -> usize {
    let bytes = source.as_bytes();
    if matches!(bytes.get(marker), Some(b'|' | b'>')) {
        return marker;
    }

    let floor = floor.min(marker);
    source[floor..marker]
        .rmatch_indices(['|', '>'])
        .map(|(idx, _)| floor + idx)
        .find(|&idx| {
            let after_blank = idx == 0 || matches!(bytes[idx - 1], b' ' | b'\t' | b'\n');
            after_blank && is_block_header(&source[idx + 1..])
        })
        .unwrap_or(marker)
}

/// `rest` follows a `|` or `>`: optional chomping/indent indicators, then
/// only blanks or a comment up to the end of the line.
fn is_block_header(rest: &str) -> bool {
    let line = rest.split('\n').next().unwrap_or_default();
    let indicators = line
        .chars()
        .take_while(|c| matches!(c, '+' | '-' | '1'..='9'))
        .count();
    let tail = &line[indicators..];
    let trimmed = tail.trim_start_matches([' ', '\t', '\r']);
    indicators <= 2
        && (trimmed.is_empty() || (trimmed.starts_with('#') && trimmed.len() < tail.len()))
}

fn block_end(source: &str, start: usize, bound: usize) -> usize {
    let region = &source[start..bound];
    let Some(header_len) = region.find('\n') else {
        return start + region.trim_end().len();
    };

    let mut end = start + region[..header_len].trim_end().len();
    let mut offset = start + header_len + 1;
    let mut content_indent = None;

    for line in region[header_len + 1..].split_inclusive('\n') {
        let text = line.trim_end_matches(['\n', '\r']);
        let line_start = offset;
        offset += line.len();

        if text.trim().is_empty() {
            continue;
        }
        let indent = text.len() - text.trim_start_matches(' ').len();
        match content_indent {
            None => content_indent = Some(indent),
            Some(expected) if indent < expected => break,
            Some(_) => {}
        }
        end = line_start + text.len();
    }

    end
}

/// Implicit typing of untagged plain scalars.
fn resolves_to_string(value: &str) -> bool {
    match value {
        "" | "~" | "null" | "Null" | "NULL" => return false,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => return false,
        _ => {}
    }
    if !value.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
        return true;
    }

    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    if matches!(unsigned, ".inf" | ".Inf" | ".INF") || matches!(value, ".nan" | ".NaN" | ".NAN") {
        return false;
    }

    // `_` separates digit groups in both ints and floats
    let plain = value.replace('_', "");
    !(is_int(&plain) || is_float(&plain))
}

/// Sign, then `0x`, `0o`, `0b`, a leading-zero octal or plain decimal digits.
fn is_int(plain: &str) -> bool {
    let digits = plain.strip_prefix(['+', '-']).unwrap_or(plain);
    let (radix, body) = if let Some(rest) =
        digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, rest)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    !body.is_empty() && body.chars().all(|c| c.is_digit(radix))
}

/// `[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?`
fn is_float(plain: &str) -> bool {
    let all_digits = |text: &str| text.chars().all(|c| c.is_ascii_digit());
    let unsigned = plain.strip_prefix(['+', '-']).unwrap_or(plain);

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(idx) => (&unsigned[..idx], Some(&unsigned[idx + 1..])),
        None => (unsigned, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some(("", frac)) => !frac.is_empty() && all_digits(frac),
        Some((int, frac)) => all_digits(int) && all_digits(frac),
        None => !mantissa.is_empty() && all_digits(mantissa),
    };
    let exponent_ok = exponent.map_or(true, |exp| {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !digits.is_empty() && all_digits(digits)
    });
    mantissa_ok && exponent_ok
}
