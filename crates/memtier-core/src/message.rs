//! Fixed log message formats.
//!
//! Every line the tiering layer writes is `<level prefix><body>`. Bodies are
//! rendered from the types below so the write side and the audit side
//! ([`classify_line`]) cannot drift apart.

use std::fmt;

use serde::Serialize;

use crate::config::{KindName, PmemSize, TierSpec};
use crate::log_level::LogLevel;

/// Banner written at INFO level once initialization succeeds.
pub const LOADED_BANNER: &str = "Memkind memtier lib loaded!";

/// Common prefix of every tiering log line.
pub const LINE_PREFIX: &str = "MEMKIND_MEM_TIERING_LOG";

/// Pointer value rendered as `0x<hex>` or `(nil)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ptr(pub usize);

impl fmt::Display for Ptr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            f.write_str("(nil)")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// One intercepted allocation call and its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum AllocEvent {
    Malloc { size: usize, result: Ptr },
    Calloc { num: usize, size: usize, result: Ptr },
    Realloc { ptr: Ptr, size: usize, result: Ptr },
    Memalign { alignment: usize, size: usize, result: Ptr },
    PosixMemalign { alignment: usize, size: usize, result: Ptr },
    Free { ptr: Ptr },
}

impl AllocEvent {
    /// Symbol name of the intercepted call.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Malloc { .. } => "malloc",
            Self::Calloc { .. } => "calloc",
            Self::Realloc { .. } => "realloc",
            Self::Memalign { .. } => "memalign",
            Self::PosixMemalign { .. } => "posix_memalign",
            Self::Free { .. } => "free",
        }
    }
}

impl fmt::Display for AllocEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malloc { size, result } => write!(f, "malloc({size}) = {result}"),
            Self::Calloc { num, size, result } => write!(f, "calloc({num}, {size}) = {result}"),
            Self::Realloc { ptr, size, result } => write!(f, "realloc({ptr}, {size}) = {result}"),
            Self::Memalign {
                alignment,
                size,
                result,
            } => write!(f, "memalign({alignment}, {size}) = {result}"),
            Self::PosixMemalign {
                alignment,
                size,
                result,
            } => write!(f, "posix_memalign({alignment}, {size}) = {result}"),
            Self::Free { ptr } => write!(f, "free({ptr})"),
        }
    }
}

/// Messages written while the layer initializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMessage<'a> {
    SettingLogLevel(LogLevel),
    Loaded,
    KindName(KindName),
    PmemPath(&'a str),
    PmemSize(&'a PmemSize),
    RatioValue(u32),
}

impl InitMessage<'_> {
    /// Level the message is written at.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        match self {
            Self::Loaded => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

impl fmt::Display for InitMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SettingLogLevel(level) => write!(f, "Setting log level to: {level}"),
            Self::Loaded => f.write_str(LOADED_BANNER),
            Self::KindName(kind) => write!(f, "kind_name: {kind}"),
            Self::PmemPath(path) => write!(f, "pmem_path: {path}"),
            Self::PmemSize(size) => write!(f, "pmem_size: {size}"),
            Self::RatioValue(ratio) => write!(f, "ratio_value: {ratio}"),
        }
    }
}

/// Debug lines describing one configured tier, in output order.
#[must_use]
pub fn describe_tier(spec: &TierSpec) -> Vec<InitMessage<'_>> {
    let mut lines = vec![InitMessage::KindName(spec.kind())];
    if let TierSpec::FsDax { path, size, .. } = spec {
        lines.push(InitMessage::PmemPath(path));
        lines.push(InitMessage::PmemSize(size));
    }
    lines.push(InitMessage::RatioValue(spec.ratio()));
    lines
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Init message shapes recognised by [`classify_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitKind {
    SettingLogLevel,
    Loaded,
    KindName,
    PmemPath,
    PmemSize,
    RatioValue,
}

/// What a line of captured program output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// Not written by the tiering layer.
    Application,
    /// An ERROR line (any body).
    Error,
    Init(InitKind),
    Call(AllocEvent),
    /// Carries the tiering prefix but matches no documented pattern.
    Malformed,
}

/// Classify one line (without its trailing newline).
#[must_use]
pub fn classify_line(line: &str) -> LineClass {
    if !line.starts_with(LINE_PREFIX) {
        return LineClass::Application;
    }
    if let Some(body) = line.strip_prefix(LogLevel::Error.prefix()) {
        return if body.is_empty() {
            LineClass::Malformed
        } else {
            LineClass::Error
        };
    }
    if let Some(body) = line.strip_prefix(LogLevel::Info.prefix()) {
        return if body == LOADED_BANNER {
            LineClass::Init(InitKind::Loaded)
        } else {
            LineClass::Malformed
        };
    }
    let Some(body) = line.strip_prefix(LogLevel::Debug.prefix()) else {
        return LineClass::Malformed;
    };
    classify_debug_body(body).unwrap_or(LineClass::Malformed)
}

fn classify_debug_body(body: &str) -> Option<LineClass> {
    if let Some(rest) = body.strip_prefix("Setting log level to: ") {
        return matches!(rest, "0" | "1" | "2").then_some(LineClass::Init(InitKind::SettingLogLevel));
    }
    if let Some(rest) = body.strip_prefix("kind_name: ") {
        let word = !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
        return word.then_some(LineClass::Init(InitKind::KindName));
    }
    if body.starts_with("pmem_path: ") {
        return Some(LineClass::Init(InitKind::PmemPath));
    }
    if let Some(rest) = body.strip_prefix("pmem_size: ") {
        let valid = crate::config::parse_pmem_size(rest).is_ok();
        return valid.then_some(LineClass::Init(InitKind::PmemSize));
    }
    if let Some(rest) = body.strip_prefix("ratio_value: ") {
        let mut cursor = Cursor::new(rest);
        cursor.number()?;
        cursor.end()?;
        return Some(LineClass::Init(InitKind::RatioValue));
    }
    parse_call(body).map(LineClass::Call)
}

/// Parse a per-call debug body back into the event it was rendered from.
#[must_use]
pub fn parse_call(body: &str) -> Option<AllocEvent> {
    let mut c = Cursor::new(body);
    let symbol = c.take_until('(')?;
    let event = match symbol {
        "malloc" => {
            let size = c.number()?;
            c.lit(") = ")?;
            AllocEvent::Malloc {
                size,
                result: c.ptr()?,
            }
        }
        "calloc" => {
            let num = c.number()?;
            c.lit(", ")?;
            let size = c.number()?;
            c.lit(") = ")?;
            AllocEvent::Calloc {
                num,
                size,
                result: c.ptr()?,
            }
        }
        "realloc" => {
            let ptr = c.ptr()?;
            c.lit(", ")?;
            let size = c.number()?;
            c.lit(") = ")?;
            AllocEvent::Realloc {
                ptr,
                size,
                result: c.ptr()?,
            }
        }
        "memalign" | "posix_memalign" => {
            let alignment = c.number()?;
            c.lit(", ")?;
            let size = c.number()?;
            c.lit(") = ")?;
            let result = c.ptr()?;
            if symbol == "memalign" {
                AllocEvent::Memalign {
                    alignment,
                    size,
                    result,
                }
            } else {
                AllocEvent::PosixMemalign {
                    alignment,
                    size,
                    result,
                }
            }
        }
        "free" => {
            let ptr = c.ptr()?;
            c.lit(")")?;
            AllocEvent::Free { ptr }
        }
        _ => return None,
    };
    c.end()?;
    Some(event)
}

struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn lit(&mut self, expected: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(expected)?;
        Some(())
    }

    /// Consume up to and including `delim`, returning the text before it.
    fn take_until(&mut self, delim: char) -> Option<&'a str> {
        let (head, tail) = self.rest.split_once(delim)?;
        self.rest = tail;
        Some(head)
    }

    fn number(&mut self) -> Option<usize> {
        let end = self
            .rest
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(self.rest.len());
        let value = self.rest[..end].parse().ok()?;
        self.rest = &self.rest[end..];
        Some(value)
    }

    fn ptr(&mut self) -> Option<Ptr> {
        if self.lit("(nil)").is_some() {
            return Some(Ptr(0));
        }
        let hex = self
            .rest
            .strip_prefix("0x")
            .or_else(|| self.rest.strip_prefix("0X"))?;
        let end = hex
            .bytes()
            .position(|b| !b.is_ascii_hexdigit())
            .unwrap_or(hex.len());
        let value = usize::from_str_radix(&hex[..end], 16).ok()?;
        self.rest = &hex[end..];
        Some(Ptr(value))
    }

    fn end(&self) -> Option<()> {
        self.rest.is_empty().then_some(())
    }
}
