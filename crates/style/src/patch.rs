//! Path-addressed partial updates of JSON property values.
//!
//! A [`Patch`] is a list of [`PatchOp`]s, each naming a path of object keys
//! and array indices. Patches are applied atomically: either every op
//! succeeds or the target is left untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSeg {
    Index(usize),
    Key(String),
}

impl From<&str> for PathSeg {
    fn from(k: &str) -> Self {
        PathSeg::Key(k.to_string())
    }
}

impl From<String> for PathSeg {
    fn from(k: String) -> Self {
        PathSeg::Key(k)
    }
}

impl From<usize> for PathSeg {
    fn from(i: usize) -> Self {
        PathSeg::Index(i)
    }
}

/// Builds a `Vec<PathSeg>` from keys and indices: `path!["layers", 0, "paint"]`.
#[macro_export]
macro_rules! path {
    ($($seg:expr),* $(,)?) => {
        vec![$($crate::patch::PathSeg::from($seg)),*]
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchKind {
    Set,
    Insert,
    Remove,
    Append,
    Merge,
}

impl PatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PatchKind::Set => "set",
            PatchKind::Insert => "insert",
            PatchKind::Remove => "remove",
            PatchKind::Append => "append",
            PatchKind::Merge => "merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub path: Vec<PathSeg>,
    pub op: PatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("path {path} not found")]
    PathNotFound { path: String },

    #[error("index {index} out of bounds (len {len}) at {path}")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("value at {path} is not an object or array")]
    NotAContainer { path: String },

    #[error("{op} at {path} requires a value")]
    MissingValue { path: String, op: &'static str },

    #[error("{op} at {path} expects {expected}")]
    TypeMismatch {
        path: String,
        op: &'static str,
        expected: &'static str,
    },
}

pub fn render_path(path: &[PathSeg]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = String::new();
    for seg in path {
        out.push('/');
        match seg {
            PathSeg::Index(i) => out.push_str(&i.to_string()),
            PathSeg::Key(k) => out.push_str(k),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    pub fn set(self, path: Vec<PathSeg>, value: Value) -> Self {
        self.with(path, PatchKind::Set, Some(value))
    }

    pub fn insert(self, path: Vec<PathSeg>, value: Value) -> Self {
        self.with(path, PatchKind::Insert, Some(value))
    }

    pub fn remove(self, path: Vec<PathSeg>) -> Self {
        self.with(path, PatchKind::Remove, None)
    }

    pub fn append(self, path: Vec<PathSeg>, value: Value) -> Self {
        self.with(path, PatchKind::Append, Some(value))
    }

    pub fn merge(self, path: Vec<PathSeg>, value: Value) -> Self {
        self.with(path, PatchKind::Merge, Some(value))
    }

    fn with(mut self, path: Vec<PathSeg>, op: PatchKind, value: Option<Value>) -> Self {
        self.ops.push(PatchOp { path, op, value });
        self
    }

    /// Applies every op in order. On error `target` is unchanged.
    pub fn apply(&self, target: &mut Value) -> Result<(), PatchError> {
        let mut work = target.clone();
        for op in &self.ops {
            op.apply(&mut work)?;
        }
        *target = work;
        Ok(())
    }

    /// Structural patch turning `prev` into `next`.
    ///
    /// Objects are compared key by key and arrays of equal length index by
    /// index; anything else that differs is replaced with a `set`.
    pub fn between(prev: &Value, next: &Value) -> Patch {
        let mut patch = Patch::new();
        diff_into(&mut Vec::new(), prev, next, &mut patch.ops);
        patch
    }
}

fn diff_into(path: &mut Vec<PathSeg>, prev: &Value, next: &Value, ops: &mut Vec<PatchOp>) {
    if prev == next {
        return;
    }
    match (prev, next) {
        (Value::Object(a), Value::Object(b)) => {
            for k in a.keys() {
                if !b.contains_key(k) {
                    let mut p = path.clone();
                    p.push(PathSeg::Key(k.clone()));
                    ops.push(PatchOp {
                        path: p,
                        op: PatchKind::Remove,
                        value: None,
                    });
                }
            }
            for (k, bv) in b {
                path.push(PathSeg::Key(k.clone()));
                match a.get(k) {
                    Some(av) => diff_into(path, av, bv, ops),
                    None => ops.push(PatchOp {
                        path: path.clone(),
                        op: PatchKind::Set,
                        value: Some(bv.clone()),
                    }),
                }
                path.pop();
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (av, bv)) in a.iter().zip(b).enumerate() {
                path.push(PathSeg::Index(i));
                diff_into(path, av, bv, ops);
                path.pop();
            }
        }
        _ => ops.push(PatchOp {
            path: path.clone(),
            op: PatchKind::Set,
            value: Some(next.clone()),
        }),
    }
}

impl PatchOp {
    pub fn apply(&self, root: &mut Value) -> Result<(), PatchError> {
        match self.op {
            PatchKind::Set => {
                let value = self.require_value()?;
                let Some((last, parent_path)) = self.path.split_last() else {
                    *root = value.clone();
                    return Ok(());
                };
                let parent = walk_mut(root, parent_path, true)?;
                self.put(parent, last, value.clone(), false)
            }
            PatchKind::Insert => {
                let value = self.require_value()?;
                let Some((last, parent_path)) = self.path.split_last() else {
                    return Err(PatchError::TypeMismatch {
                        path: render_path(&self.path),
                        op: "insert",
                        expected: "a non-empty path",
                    });
                };
                let parent = walk_mut(root, parent_path, true)?;
                self.put(parent, last, value.clone(), true)
            }
            PatchKind::Remove => {
                let Some((last, parent_path)) = self.path.split_last() else {
                    *root = Value::Null;
                    return Ok(());
                };
                let parent = walk_mut(root, parent_path, false)?;
                match (parent, last) {
                    (Value::Object(map), PathSeg::Key(k)) => match map.remove(k) {
                        Some(_) => Ok(()),
                        None => Err(PatchError::PathNotFound {
                            path: render_path(&self.path),
                        }),
                    },
                    (Value::Array(items), PathSeg::Index(i)) => {
                        if *i < items.len() {
                            items.remove(*i);
                            Ok(())
                        } else {
                            Err(PatchError::IndexOutOfBounds {
                                path: render_path(parent_path),
                                index: *i,
                                len: items.len(),
                            })
                        }
                    }
                    _ => Err(PatchError::NotAContainer {
                        path: render_path(parent_path),
                    }),
                }
            }
            PatchKind::Append => {
                let value = self.require_value()?;
                let target = walk_mut(root, &self.path, true)?;
                if target.is_null() {
                    *target = Value::Array(Vec::new());
                }
                match target {
                    Value::Array(items) => {
                        items.push(value.clone());
                        Ok(())
                    }
                    _ => Err(PatchError::TypeMismatch {
                        path: render_path(&self.path),
                        op: "append",
                        expected: "an array",
                    }),
                }
            }
            PatchKind::Merge => {
                let Value::Object(incoming) = self.require_value()? else {
                    return Err(PatchError::TypeMismatch {
                        path: render_path(&self.path),
                        op: "merge",
                        expected: "an object value",
                    });
                };
                let target = walk_mut(root, &self.path, true)?;
                if target.is_null() {
                    *target = Value::Object(Map::new());
                }
                match target {
                    Value::Object(map) => {
                        for (k, v) in incoming {
                            map.insert(k.clone(), v.clone());
                        }
                        Ok(())
                    }
                    _ => Err(PatchError::TypeMismatch {
                        path: render_path(&self.path),
                        op: "merge",
                        expected: "an object",
                    }),
                }
            }
        }
    }

    fn require_value(&self) -> Result<&Value, PatchError> {
        self.value.as_ref().ok_or_else(|| PatchError::MissingValue {
            path: render_path(&self.path),
            op: self.op.as_str(),
        })
    }

    fn put(
        &self,
        parent: &mut Value,
        last: &PathSeg,
        value: Value,
        shift: bool,
    ) -> Result<(), PatchError> {
        let parent_path = &self.path[..self.path.len() - 1];
        if parent.is_null() {
            *parent = match last {
                PathSeg::Key(_) => Value::Object(Map::new()),
                PathSeg::Index(_) => Value::Array(Vec::new()),
            };
        }
        match (parent, last) {
            (Value::Object(map), PathSeg::Key(k)) => {
                map.insert(k.clone(), value);
                Ok(())
            }
            (Value::Array(items), PathSeg::Index(i)) => {
                let len = items.len();
                if shift && *i <= len {
                    items.insert(*i, value);
                    Ok(())
                } else if *i < len {
                    items[*i] = value;
                    Ok(())
                } else if *i == len {
                    items.push(value);
                    Ok(())
                } else {
                    Err(PatchError::IndexOutOfBounds {
                        path: render_path(parent_path),
                        index: *i,
                        len,
                    })
                }
            }
            _ => Err(PatchError::NotAContainer {
                path: render_path(parent_path),
            }),
        }
    }
}

/// Walks `path` from `root`. With `create`, missing object keys are created
/// as `null` and `null` values on the way become objects.
fn walk_mut<'a>(
    root: &'a mut Value,
    path: &[PathSeg],
    create: bool,
) -> Result<&'a mut Value, PatchError> {
    let mut cur = root;
    for (depth, seg) in path.iter().enumerate() {
        cur = match seg {
            PathSeg::Key(k) => {
                if create && cur.is_null() {
                    *cur = Value::Object(Map::new());
                }
                match cur {
                    Value::Object(map) => {
                        if create {
                            map.entry(k.clone()).or_insert(Value::Null)
                        } else {
                            map.get_mut(k).ok_or_else(|| PatchError::PathNotFound {
                                path: render_path(&path[..=depth]),
                            })?
                        }
                    }
                    _ => {
                        return Err(PatchError::NotAContainer {
                            path: render_path(&path[..depth]),
                        });
                    }
                }
            }
            PathSeg::Index(i) => match cur {
                Value::Array(items) => {
                    let len = items.len();
                    items.get_mut(*i).ok_or(PatchError::IndexOutOfBounds {
                        path: render_path(&path[..depth]),
                        index: *i,
                        len,
                    })?
                }
                _ => {
                    return Err(PatchError::NotAContainer {
                        path: render_path(&path[..depth]),
                    });
                }
            },
        };
    }
    Ok(cur)
}
