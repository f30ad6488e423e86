use nestbus::MessageBus;

/// Messages of mixed shape, the way callers model "any value".
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
}

pub fn text(s: &str) -> Msg {
    Msg::Text(s.to_string())
}

pub fn is_text(m: &Msg) -> bool {
    matches!(m, Msg::Text(_))
}

/// Everything currently waiting in a bus's fallback channel.
pub fn drain<M>(bus: &MessageBus<M>) -> Vec<M> {
    let mut out = Vec::new();
    while let Some(m) = bus.try_receive() {
        out.push(m);
    }
    out
}
