use bytes::Bytes;

/// One typed message argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// 32-bit signed integer, tag `i`.
    Int(i32),
    /// 32-bit IEEE-754 float, tag `f`.
    Float(f32),
    /// UTF-8 string without NUL bytes, tag `s`.
    String(String),
    /// Opaque byte blob, tag `b`.
    Blob(Bytes),
}

impl Argument {
    /// The type tag character written for this argument.
    pub fn type_tag(&self) -> char {
        match self {
            Argument::Int(_) => 'i',
            Argument::Float(_) => 'f',
            Argument::String(_) => 's',
            Argument::Blob(_) => 'b',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Argument::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_owned())
    }
}

impl From<Bytes> for Argument {
    fn from(v: Bytes) -> Self {
        Argument::Blob(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Blob(Bytes::from(v))
    }
}

/// An address plus an ordered argument list.
///
/// A message with no arguments is a read request for the addressed property.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub address: String,
    pub args: Vec<Argument>,
}

impl Message {
    /// Create a message with no arguments.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    /// Builder-style argument append.
    pub fn with_arg(mut self, arg: impl Into<Argument>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn push_arg(&mut self, arg: impl Into<Argument>) {
        self.args.push(arg.into());
    }

    /// `true` when the message carries no arguments.
    pub fn is_query(&self) -> bool {
        self.args.is_empty()
    }

    /// The type tag string as written on the wire, including the leading `,`.
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(Argument::type_tag));
        tags
    }
}

/// 64-bit NTP-style bundle timetag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeTag(pub u64);

impl TimeTag {
    /// The "execute immediately" timetag.
    pub const IMMEDIATE: TimeTag = TimeTag(1);

    pub fn from_parts(seconds: u32, fraction: u32) -> Self {
        TimeTag((u64::from(seconds) << 32) | u64::from(fraction))
    }

    pub fn seconds(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn fraction(self) -> u32 {
        self.0 as u32
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        TimeTag::IMMEDIATE
    }
}

/// Messages delivered together in one packet. Elements are always plain messages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bundle {
    pub timetag: TimeTag,
    pub messages: Vec<Message>,
}

impl Bundle {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            timetag: TimeTag::IMMEDIATE,
            messages,
        }
    }

    pub fn with_timetag(timetag: TimeTag, messages: Vec<Message>) -> Self {
        Self { timetag, messages }
    }
}

/// Whatever one wire packet decodes to.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl Packet {
    /// Build the packet that carries `messages`: a plain message for one element,
    /// an immediate bundle for several, `None` for an empty list.
    pub fn from_messages(mut messages: Vec<Message>) -> Option<Packet> {
        match messages.len() {
            0 => None,
            1 => messages.pop().map(Packet::Message),
            _ => Some(Packet::Bundle(Bundle::new(messages))),
        }
    }

    /// The messages in delivery order.
    pub fn messages(&self) -> &[Message] {
        match self {
            Packet::Message(m) => std::slice::from_ref(m),
            Packet::Bundle(b) => &b.messages,
        }
    }

    pub fn into_messages(self) -> Vec<Message> {
        match self {
            Packet::Message(m) => vec![m],
            Packet::Bundle(b) => b.messages,
        }
    }
}

impl From<Message> for Packet {
    fn from(m: Message) -> Self {
        Packet::Message(m)
    }
}

impl From<Bundle> for Packet {
    fn from(b: Bundle) -> Self {
        Packet::Bundle(b)
    }
}
