//! Query-string decoding and request classification.
use crate::fetch::FetchRequest;
/// Decoded `application/x-www-form-urlencoded` parameters, in arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
/// `+` becomes a space and `%XX` a byte; malformed escapes are kept as written.
pub fn decode_component(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(hex_value);
                let lo = bytes.get(i + 2).copied().and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
                out.push(b'%');
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
impl QueryParams {
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .split(['&', ';'])
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((name, value)) => (decode_component(name), decode_component(value)),
                None => (decode_component(part), String::new()),
            })
            .collect();
        Self { pairs }
    }
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }
    /// Builds the fetch parameters: `signal`, `annotator`, `t0` and `dt`.
    pub fn fetch_request(&self) -> FetchRequest {
        let owned = |name: &str| -> Vec<String> {
            self.all(name).into_iter().map(str::to_string).collect()
        };
        FetchRequest {
            signals: owned("signal"),
            annotators: owned("annotator"),
            start: self.get("t0").map(str::to_string),
            duration: self.get("dt").map(str::to_string),
        }
    }
}
/// What the client asked the server to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    DatabaseList,
    RecordList,
    AnnotatorList,
    Info,
    Fetch,
}
impl RequestKind {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "dblist" => Some(Self::DatabaseList),
            "rlist" => Some(Self::RecordList),
            "alist" => Some(Self::AnnotatorList),
            "info" => Some(Self::Info),
            "fetch" => Some(Self::Fetch),
            _ => None,
        }
    }
    pub fn needs_database(self) -> bool {
        self != Self::DatabaseList
    }
    pub fn needs_record(self) -> bool {
        matches!(self, Self::Info | Self::Fetch)
    }
}
