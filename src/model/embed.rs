use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeMap;

/// Which relations the encoder expands into relationships (and `included`).
///
/// `All` is the root-level "embed everything that is loaded" switch. Inside a
/// `Paths` tree a relation mapped to an empty `Paths` is expanded while none of
/// its own relations are.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Embed {
    #[default]
    None,
    All,
    Paths(BTreeMap<String, Embed>),
}

impl Embed {
    /// Build a tree from dot-joined paths such as `["gallery", "images_tags.tag"]`
    pub fn paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut tree = BTreeMap::new();
        for path in paths {
            insert_path(&mut tree, path.as_ref().split('.').filter(|s| !s.is_empty()));
        }
        Embed::Paths(tree)
    }

    /// Accepts `true`, `false`/`null`, an array of dotted paths or a nested
    /// object whose leaves are `true`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Embed::All,
            other => Self::from_nested(other).unwrap_or_default(),
        }
    }

    fn from_nested(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(true) => Some(Embed::Paths(BTreeMap::new())),
            Value::String(path) => Some(Self::paths(&[path.as_str()])),
            Value::Array(items) => {
                let paths = items.iter().filter_map(Value::as_str).collect_vec();
                Some(Self::paths(&paths))
            }
            Value::Object(map) => Some(Embed::Paths(
                map.iter()
                    .filter_map(|(name, child)| Self::from_nested(child).map(|e| (name.clone(), e)))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Embed tree for a relation, or `None` when the relation is not expanded
    pub fn child(&self, relation: &str) -> Option<Embed> {
        match self {
            Embed::None => None,
            Embed::All => Some(Embed::All),
            Embed::Paths(tree) => tree.get(relation).cloned(),
        }
    }
}

fn insert_path<'a>(tree: &mut BTreeMap<String, Embed>, mut segments: impl Iterator<Item = &'a str>) {
    let Some(head) = segments.next() else {
        return;
    };
    let entry = tree
        .entry(head.to_string())
        .or_insert_with(|| Embed::Paths(BTreeMap::new()));
    if let Embed::Paths(children) = entry {
        insert_path(children, segments);
    }
}
