use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Key prefix of the member that opens an inactive entry.
pub const INACTIVE_START: &str = "__inactiveStart";
/// Key prefix of the member that closes an inactive entry.
pub const INACTIVE_END: &str = "__inactiveEnd";

static MARKER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__inactive(Start|End)_\d+$").unwrap());

/// Activation flag carried by almost every node of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Active,
    Inactive,
}

impl Activation {
    /// A missing flag means the node is active.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(false) => Self::Inactive,
            _ => Self::Active,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    pub fn as_flag(self) -> bool {
        self.is_active()
    }
}

impl Serialize for Activation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(self.as_flag())
    }
}

impl<'de> Deserialize<'de> for Activation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<bool>::deserialize(deserializer).map(Self::from_flag)
    }
}

/// Which side of an inactive entry a marker sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerEdge {
    Start,
    End,
}

impl MarkerEdge {
    fn prefix(self) -> &'static str {
        match self {
            Self::Start => INACTIVE_START,
            Self::End => INACTIVE_END,
        }
    }
}

/// Marker text; `index` only has to be unique inside one object or array.
pub fn marker(edge: MarkerEdge, index: usize) -> String {
    format!("{}_{}", edge.prefix(), index)
}

pub fn parse_marker(text: &str) -> Option<MarkerEdge> {
    let captures = MARKER_REGEX.captures(text)?;
    match captures.get(1)?.as_str() {
        "Start" => Some(MarkerEdge::Start),
        _ => Some(MarkerEdge::End),
    }
}

/// Insert a member, surrounding it with marker members when it is inactive.
pub fn insert_member(map: &mut Map<String, Value>, key: String, value: Value, activation: Activation) {
    if activation.is_active() {
        map.insert(key, value);
        return;
    }
    let index = map.len();
    map.insert(marker(MarkerEdge::Start, index), Value::Bool(true));
    map.insert(key, value);
    map.insert(marker(MarkerEdge::End, index), Value::Bool(true));
}

/// Append an element, surrounding it with marker elements when it is inactive.
pub fn push_element(list: &mut Vec<Value>, value: Value, activation: Activation) {
    if activation.is_active() {
        list.push(value);
        return;
    }
    let index = list.len();
    list.push(Value::String(marker(MarkerEdge::Start, index)));
    list.push(value);
    list.push(Value::String(marker(MarkerEdge::End, index)));
}

/// Members of an object with their activation, markers removed.
pub fn members(map: &Map<String, Value>) -> Vec<(&String, &Value, Activation)> {
    let mut pending = Activation::Active;
    let mut result = Vec::with_capacity(map.len());

    for (key, value) in map {
        match parse_marker(key) {
            Some(MarkerEdge::Start) => pending = Activation::Inactive,
            Some(MarkerEdge::End) => pending = Activation::Active,
            None => result.push((key, value, pending)),
        }
    }

    result
}

/// Elements of an array with their activation, markers removed.
pub fn elements(list: &[Value]) -> Vec<(&Value, Activation)> {
    let mut pending = Activation::Active;
    let mut result = Vec::with_capacity(list.len());

    for value in list {
        match value.as_str().and_then(parse_marker) {
            Some(MarkerEdge::Start) => pending = Activation::Inactive,
            Some(MarkerEdge::End) => pending = Activation::Active,
            None => result.push((value, pending)),
        }
    }

    result
}

/// Copy of `value` holding only its active subtree.
pub fn strip_inactive(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            members(map)
                .into_iter()
                .filter(|(_, _, activation)| activation.is_active())
                .map(|(key, child, _)| (key.clone(), strip_inactive(child)))
                .collect(),
        ),
        Value::Array(list) => Value::Array(
            elements(list)
                .into_iter()
                .filter(|(_, activation)| activation.is_active())
                .map(|(child, _)| strip_inactive(child))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Ordered map whose inactive entries serialize between marker members.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMap<T> {
    entries: IndexMap<String, (T, Activation)>,
}

impl<T> Default for ActiveMap<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T> ActiveMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T, activation: Activation) {
        self.entries.insert(key.into(), (value, activation));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Serialize> Serialize for ActiveMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (index, (key, (value, activation))) in self.entries.iter().enumerate() {
            if activation.is_active() {
                map.serialize_entry(key, value)?;
            } else {
                map.serialize_entry(&marker(MarkerEdge::Start, index), &true)?;
                map.serialize_entry(key, value)?;
                map.serialize_entry(&marker(MarkerEdge::End, index), &true)?;
            }
        }
        map.end()
    }
}

/// Ordered list whose inactive elements serialize between marker elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveList<T> {
    items: Vec<(T, Activation)>,
}

impl<T> Default for ActiveList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> ActiveList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: T, activation: Activation) {
        self.items.push((value, activation));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Serialize> Serialize for ActiveList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for (index, (value, activation)) in self.items.iter().enumerate() {
            if activation.is_active() {
                seq.serialize_element(value)?;
            } else {
                seq.serialize_element(&marker(MarkerEdge::Start, index))?;
                seq.serialize_element(value)?;
                seq.serialize_element(&marker(MarkerEdge::End, index))?;
            }
        }
        seq.end()
    }
}
